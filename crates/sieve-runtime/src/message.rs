//! The mail message interface (spec.md §1 "Mail message access"): a
//! narrow read collaborator the host implements. The core only ever
//! consumes a message through this trait plus the optional edit-header
//! facility — storage, transport and parsing all live outside this
//! crate's boundary.

/// Read access to one message, plus the per-message attribute store used
/// by tests like `duplicate` and by the `vacation`/`notify` actions to
/// remember things across a single execution.
pub trait Message {
    /// All values of header `name` in message order. Header-name lookup
    /// is case-insensitive, per RFC 5322/Sieve convention.
    fn header(&self, name: &str) -> Vec<String>;

    /// Envelope field values (`"from"` / `"to"`), distinct from header
    /// lookup since the envelope is transport metadata, not a message
    /// header.
    fn envelope(&self, part: &str) -> Vec<String>;

    /// Body content, optionally filtered to parts whose MIME content
    /// type matches `content_type` (empty string: the extension's
    /// default, effectively "text parts").
    fn body(&self, content_type: &str) -> Vec<String>;

    /// Message size in octets, for `size :over`/`:under`.
    fn size(&self) -> u64;

    /// Read a per-message attribute (`vnd.dovecot.duplicate`'s dedup
    /// keys, `notify`/`vacation` bookkeeping the host wants scoped to
    /// one message rather than the whole script run).
    fn attribute(&self, key: &str) -> Option<String>;

    /// Optional edit-header facility (§1): default no-op so read-only
    /// message implementations (e.g. the `test`/`dump` CLI harness) are
    /// not forced to support mutation.
    fn add_header(&mut self, _name: &str, _value: &str) {}

    fn delete_header(&mut self, _name: &str) {}
}

/// A simple in-memory [`Message`] used by tests and the `sieve test`
/// CLI subcommand.
#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    pub headers: Vec<(String, String)>,
    pub envelope: Vec<(String, String)>,
    pub body_text: String,
    pub attributes: std::collections::HashMap<String, String>,
}

impl MemoryMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_envelope(mut self, part: impl Into<String>, value: impl Into<String>) -> Self {
        self.envelope.push((part.into(), value.into()));
        self
    }

    pub fn with_body(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }
}

impl Message for MemoryMessage {
    fn header(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn envelope(&self, part: &str) -> Vec<String> {
        self.envelope
            .iter()
            .filter(|(p, _)| p.eq_ignore_ascii_case(part))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn body(&self, _content_type: &str) -> Vec<String> {
        if self.body_text.is_empty() {
            Vec::new()
        } else {
            vec![self.body_text.clone()]
        }
    }

    fn size(&self) -> u64 {
        let header_bytes: usize = self
            .headers
            .iter()
            .map(|(n, v)| n.len() + v.len() + 4)
            .sum();
        (header_bytes + self.body_text.len()) as u64
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).cloned()
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    fn delete_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let msg = MemoryMessage::new().with_header("Subject", "Summer sale");
        assert_eq!(msg.header("subject"), vec!["Summer sale".to_owned()]);
    }

    #[test]
    fn delete_header_removes_all_matching_values() {
        let mut msg = MemoryMessage::new()
            .with_header("X-Spam", "yes")
            .with_header("X-Spam", "maybe");
        msg.delete_header("x-spam");
        assert!(msg.header("X-Spam").is_empty());
    }

    #[test]
    fn envelope_lookup_is_separate_from_headers() {
        let msg = MemoryMessage::new()
            .with_header("To", "list@example.com")
            .with_envelope("to", "user+news@example.com");
        assert_eq!(msg.envelope("to"), vec!["user+news@example.com".to_owned()]);
        assert_eq!(msg.header("to"), vec!["list@example.com".to_owned()]);
    }
}
