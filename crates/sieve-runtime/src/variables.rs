//! The variables store (§4.9 "Match values", "variables" extension):
//! named variables set by `set`, plus the per-interpreter capture store
//! holding the last `:matches`/`:regex` groups, referenced as `${N}`.
//! Capacity is bounded (§4.9/§9: "bound memory under adversarial keys");
//! overflow silently truncates the capture index rather than growing
//! without bound or erroring.

use std::collections::HashMap;

/// Capture slots `${0}`..`${CAPACITY - 1}`; `${0}` is the whole match.
pub const CAPTURE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct VariableStore {
    named: HashMap<String, String>,
    captures: Vec<Option<String>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self {
            named: HashMap::new(),
            captures: vec![None; CAPTURE_CAPACITY],
        }
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: String) {
        self.named.insert(name.to_ascii_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// Replace the capture set after a successful `:matches`/`:regex`.
    /// Entries past [`CAPTURE_CAPACITY`] are silently dropped.
    pub fn set_captures(&mut self, captures: Vec<Option<String>>) {
        for slot in self.captures.iter_mut() {
            *slot = None;
        }
        for (i, value) in captures.into_iter().enumerate() {
            if i >= CAPTURE_CAPACITY {
                break;
            }
            self.captures[i] = value;
        }
    }

    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).and_then(|v| v.as_deref())
    }

    /// Expand every `${name}` / `${N}` reference in `s`. Unknown
    /// variables and out-of-range/unset captures expand to the empty
    /// string, matching the `variables` extension's documented behavior
    /// rather than erroring at runtime.
    pub fn interpolate(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
                if let Some(end) = s[i + 2..].find('}') {
                    let name = &s[i + 2..i + 2 + end];
                    out.push_str(&self.resolve(name));
                    i += 2 + end + 1;
                    continue;
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        }
        out
    }

    fn resolve(&self, name: &str) -> String {
        if let Ok(index) = name.parse::<usize>() {
            return self.capture(index).unwrap_or("").to_owned();
        }
        self.get(name).unwrap_or("").to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_named_variable() {
        let mut vars = VariableStore::new();
        vars.set("folder", "Junk".into());
        assert_eq!(vars.interpolate("Sub/${folder}"), "Sub/Junk");
    }

    #[test]
    fn interpolates_capture_groups() {
        let mut vars = VariableStore::new();
        vars.set_captures(vec![
            Some("user+news@example.com".into()),
            Some("user".into()),
            Some("news".into()),
        ]);
        assert_eq!(vars.interpolate("Sub/${1}/${2}"), "Sub/user/news");
    }

    #[test]
    fn unknown_and_overflowing_references_expand_empty() {
        let vars = VariableStore::new();
        assert_eq!(vars.interpolate("${missing}"), "");
        assert_eq!(vars.interpolate("${9999}"), "");
    }

    #[test]
    fn capture_overflow_is_silently_truncated() {
        let mut vars = VariableStore::new();
        let many: Vec<Option<String>> = (0..CAPTURE_CAPACITY + 10)
            .map(|i| Some(i.to_string()))
            .collect();
        vars.set_captures(many);
        assert_eq!(vars.capture(CAPTURE_CAPACITY - 1), Some((CAPTURE_CAPACITY - 1).to_string().as_str()));
        assert_eq!(vars.capture(CAPTURE_CAPACITY), None);
    }
}
