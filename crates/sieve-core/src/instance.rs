//! The process-wide engine handle (§3 "Instance").
//!
//! Owns the configured extension set, the error/event infrastructure
//! default handler, and the acting user's identity. Created once per
//! process (or per isolated test); all other long-lived objects hold a
//! back-reference via `Rc`.

use std::rc::Rc;

use crate::diag::{ErrorHandler, TracingSink};
use crate::registry::Registry;

/// Configuration knobs that bound runaway or adversarial scripts (§4.8,
/// §5): execution fuel, include depth/total, and the compile error
/// ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_errors: u32,
    pub max_include_depth: u32,
    pub max_include_scripts: u32,
    pub exec_fuel: u64,
    pub max_actions: u32,
    pub max_redirects: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_errors: 25,
            max_include_depth: 10,
            max_include_scripts: 50,
            exec_fuel: 1_000_000,
            max_actions: 256,
            max_redirects: 8,
        }
    }
}

/// The process-wide engine handle.
pub struct Instance {
    username: String,
    home_dir: String,
    registry: Registry,
    default_handler: ErrorHandler,
    limits: Limits,
}

impl Instance {
    /// The sole constructor: there is no global/static registry to fall
    /// back on.
    pub fn new(username: impl Into<String>, home_dir: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            home_dir: home_dir.into(),
            registry: Registry::new(),
            default_handler: Rc::new(TracingSink),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_default_handler(mut self, handler: ErrorHandler) -> Self {
        self.default_handler = handler;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn home_dir(&self) -> &str {
        &self.home_dir
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn default_handler(&self) -> ErrorHandler {
        self.default_handler.clone()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_are_isolated() {
        let mut a = Instance::new("alice", "/home/alice");
        let b = Instance::new("bob", "/home/bob");
        a.registry_mut().require("vacation");
        assert!(a.registry().is_required("vacation"));
        assert!(!b.registry().is_required("vacation"));
    }

    #[test]
    fn default_limits_are_sane() {
        let limits = Limits::default();
        assert!(limits.exec_fuel > 0);
        assert!(limits.max_include_depth > 0);
    }
}
