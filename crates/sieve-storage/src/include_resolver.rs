//! Wires a [`crate::Storage`] into the interpreter's
//! [`sieve_runtime::IncludeResolver`] (spec.md §4.8 `include`/`return`,
//! §4.11): resolves an included script name to a compiled
//! [`sieve_bytecode::Binary`], preferring an up-to-date cached binary
//! over recompiling the source every time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sieve_bytecode::Binary;
use sieve_core::registry::is_known_extension;
use sieve_core::{Diagnostics, Instance};
use sieve_runtime::{IncludeResolver, Result as RuntimeResult, RuntimeError};

use crate::script::BinaryStatus;
use crate::storage::Storage;

/// Resolves `include` targets against one [`Storage`], recompiling
/// from source on a cache miss or a stale/corrupt cached binary and
/// writing the freshly compiled binary back (best effort: a failure to
/// persist the cache does not fail the include itself).
pub struct StorageIncludeResolver {
    storage: Box<dyn Storage>,
    instance: Rc<RefCell<Instance>>,
    cache: HashMap<String, Rc<Binary>>,
}

impl StorageIncludeResolver {
    pub fn new(storage: Box<dyn Storage>, instance: Rc<RefCell<Instance>>) -> Self {
        Self { storage, instance, cache: HashMap::new() }
    }

    fn compile_from_source(&self, name: &str, source: &str) -> RuntimeResult<Binary> {
        let mut instance = self.instance.borrow_mut();
        let handler = instance.default_handler();
        let max_errors = instance.limits().max_errors;
        let mut diag = Diagnostics::new(handler, max_errors);
        let ast = sieve_syntax::parse_script(source, name, &mut diag);
        sieve_compile::compile(&ast, &mut instance, name, &mut diag)
            .ok_or_else(|| RuntimeError::IncludeNotFound(format!("{name}: failed to compile")))
    }
}

impl IncludeResolver for StorageIncludeResolver {
    fn resolve(&mut self, name: &str) -> RuntimeResult<Rc<Binary>> {
        if let Some(binary) = self.cache.get(name) {
            return Ok(binary.clone());
        }

        let script = self
            .storage
            .get_script(name)
            .map_err(|e| RuntimeError::IncludeNotFound(format!("{name}: {e}")))?;

        let cached = matches!(script.binary_status(), Ok(BinaryStatus::UpToDate))
            .then(|| script.binary_load(&is_known_extension).ok())
            .flatten();

        let binary = match cached {
            Some(binary) => binary,
            None => {
                let source = script
                    .open()
                    .map_err(|e| RuntimeError::IncludeNotFound(format!("{name}: {e}")))?;
                let binary = self.compile_from_source(name, &source)?;
                let _ = script.binary_save(&binary);
                binary
            }
        };

        let binary = Rc::new(binary);
        self.cache.insert(name.to_owned(), binary.clone());
        Ok(binary)
    }
}
