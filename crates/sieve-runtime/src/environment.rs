//! Per-execution runtime state (§3 "Runtime environment"): everything
//! that lives for exactly one script run and is threaded through the
//! interpreter by `&mut` reference rather than stashed as globals.

use crate::variables::VariableStore;

/// The IMAP flags register mutated by `setflag`/`addflag`/`removeflag`
/// and read by `hasflag` (§4.8 "state"). Distinct from a committed
/// action's own `:flags` side effect, which snapshots this register at
/// the point `keep`/`fileinto`/`redirect` executes.
#[derive(Debug, Clone, Default)]
pub struct FlagsRegister(Vec<String>);

impl FlagsRegister {
    pub fn set(&mut self, flags: Vec<String>) {
        self.0 = flags;
    }

    pub fn add(&mut self, flags: Vec<String>) {
        for f in flags {
            if !self.0.contains(&f) {
                self.0.push(f);
            }
        }
    }

    pub fn remove(&mut self, flags: &[String]) {
        self.0.retain(|f| !flags.contains(f));
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Per-execution state: variables, the flags register, and the fuel
/// counter the interpreter decrements at every opcode (§4.8, §5 "fuel").
pub struct RuntimeEnvironment {
    pub variables: VariableStore,
    pub flags: FlagsRegister,
    pub fuel_remaining: u64,
    pub steps_taken: u64,
}

impl RuntimeEnvironment {
    pub fn new(fuel: u64) -> Self {
        Self {
            variables: VariableStore::new(),
            flags: FlagsRegister::default(),
            fuel_remaining: fuel,
            steps_taken: 0,
        }
    }

    /// Consume one unit of fuel; `Err` once exhausted (§5: "a
    /// pathological script cannot run the interpreter forever").
    pub fn tick(&mut self) -> Result<(), crate::error::RuntimeError> {
        self.steps_taken += 1;
        if self.fuel_remaining == 0 {
            return Err(crate::error::RuntimeError::FuelExhausted(self.steps_taken));
        }
        self.fuel_remaining -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_register_add_is_set_like() {
        let mut flags = FlagsRegister::default();
        flags.add(vec!["\\Seen".into(), "\\Seen".into()]);
        assert_eq!(flags.as_slice(), &["\\Seen".to_owned()]);
    }

    #[test]
    fn flags_register_remove_drops_named_flags() {
        let mut flags = FlagsRegister::default();
        flags.set(vec!["\\Seen".into(), "\\Flagged".into()]);
        flags.remove(&["\\Seen".to_owned()]);
        assert_eq!(flags.as_slice(), &["\\Flagged".to_owned()]);
    }

    #[test]
    fn fuel_exhausts_after_configured_steps() {
        let mut env = RuntimeEnvironment::new(2);
        assert!(env.tick().is_ok());
        assert!(env.tick().is_ok());
        assert!(env.tick().is_err());
    }
}
