//! Extension + object registry (§4.4): the Instance-scoped set of loaded
//! extensions and their stable numeric ids.
//!
//! Per the Design Note in spec.md §9, this is Instance-scoped rather than
//! process-global so tests can spin up isolated engines without sharing
//! mutable state.

use indexmap::IndexMap;

/// Stable numeric id assigned to an extension at registration time. This is
/// how operations and operands are resolved at execute time (§4.4): a
/// binary's extension table maps `ext_id -> name`, and opcodes above 0x80
/// carry `(ext_id, sub_code)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtensionId(pub u32);

/// The names of every extension this implementation knows how to load,
/// alongside the deprecated aliases the Open Question in spec.md §9
/// requires accepting. Used by the validator to reject unknown `require`
/// entries and to detect alias conflicts.
pub const KNOWN_EXTENSIONS: &[&str] = &[
    "fileinto",
    "reject",
    "envelope",
    "encoded-character",
    "vacation",
    "vacation-seconds",
    "imap4flags",
    "imapflags",
    "notify",
    "enotify",
    "subaddress",
    "comparator-i;ascii-numeric",
    "relational",
    "regex",
    "variables",
    "body",
    "duplicate",
    "vnd.dovecot.duplicate",
    "mailbox",
    "mboxmetadata",
    "servermetadata",
    "date",
    "index",
    "copy",
    "include",
    "environment",
    "ihave",
    "extlists",
    "spamtest",
    "virustest",
    "editheader",
    "special-use",
];

/// Pairs of extension names that implement the same feature under two
/// identifiers (§9 Open Question 2). Requiring both in one script is a
/// validate error.
pub const DEPRECATED_ALIAS_PAIRS: &[(&str, &str)] = &[
    ("imapflags", "imap4flags"),
    ("notify", "enotify"),
    ("vnd.dovecot.duplicate", "duplicate"),
];

pub fn is_known_extension(name: &str) -> bool {
    KNOWN_EXTENSIONS.contains(&name)
}

/// Static definition supplied when registering an extension.
#[derive(Debug, Clone)]
pub struct ExtensionDef {
    pub name: String,
    pub version: (u16, u16),
}

impl ExtensionDef {
    pub fn new(name: impl Into<String>, version: (u16, u16)) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

#[derive(Debug, Clone)]
struct ExtensionEntry {
    id: ExtensionId,
    version: (u16, u16),
    /// Incremented each time a script `require`s this extension; the
    /// binary emits an extension's dedicated block only when this is > 0.
    required_count: u32,
}

/// The Instance-scoped registry of loaded extensions.
#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, ExtensionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension (idempotent by name), returning its stable id.
    pub fn register(&mut self, def: ExtensionDef) -> ExtensionId {
        if let Some(entry) = self.entries.get(&def.name) {
            return entry.id;
        }
        let id = ExtensionId(self.entries.len() as u32);
        self.entries.insert(
            def.name.clone(),
            ExtensionEntry {
                id,
                version: def.version,
                required_count: 0,
            },
        );
        id
    }

    /// Mark an extension as required by the script currently being
    /// validated/compiled, registering it first if necessary. Returns the
    /// extension id.
    pub fn require(&mut self, name: &str) -> ExtensionId {
        if !self.entries.contains_key(name) {
            self.register(ExtensionDef::new(name, (1, 0)));
        }
        let entry = self.entries.get_mut(name).expect("just inserted");
        entry.required_count += 1;
        entry.id
    }

    pub fn id_of(&self, name: &str) -> Option<ExtensionId> {
        self.entries.get(name).map(|e| e.id)
    }

    pub fn name_of(&self, id: ExtensionId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| e.id == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.required_count > 0)
    }

    pub fn version_of(&self, name: &str) -> Option<(u16, u16)> {
        self.entries.get(name).map(|e| e.version)
    }

    /// All extensions ever registered, in registration order, as
    /// `(name, version, id)` — directly usable to build a Binary's
    /// extension table (§4.6).
    pub fn iter(&self) -> impl Iterator<Item = (&str, (u16, u16), ExtensionId)> {
        self.entries
            .iter()
            .map(|(name, e)| (name.as_str(), e.version, e.id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_by_name() {
        let mut reg = Registry::new();
        let a = reg.register(ExtensionDef::new("fileinto", (1, 0)));
        let b = reg.register(ExtensionDef::new("fileinto", (1, 0)));
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn require_counts_and_auto_registers() {
        let mut reg = Registry::new();
        assert!(!reg.is_required("vacation"));
        reg.require("vacation");
        reg.require("vacation");
        assert!(reg.is_required("vacation"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn known_extension_pairs_are_detected() {
        assert!(is_known_extension("imap4flags"));
        assert!(!is_known_extension("not-a-real-extension"));
        assert!(DEPRECATED_ALIAS_PAIRS
            .iter()
            .any(|(a, b)| *a == "notify" && *b == "enotify"));
    }
}
