#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Validator and code generator (spec.md §4.5, §4.7): turns a parsed
//! [`sieve_syntax::ast::Ast`] into a [`sieve_bytecode::Binary`], or a list
//! of diagnostics if the script does not validate.

pub mod codegen;
pub mod context;
pub mod error;
pub mod objects;
pub mod tags;
pub mod validator;

pub use codegen::CodeGenerator;
pub use context::MatchContext;
pub use error::ValidateError;
pub use validator::{validate, ValidatorOptions};

use sieve_bytecode::{Binary, ExtTableEntry};
use sieve_core::diag::Diagnostics;
use sieve_core::instance::Instance;
use sieve_syntax::ast::Ast;

/// Validate and compile one script's AST against `instance`'s registry,
/// returning the binary on success. On validation failure, returns `None`
/// after reporting every diagnostic into `diag` (§4.5: validation is
/// additive, so callers see every mistake in one pass, not just the
/// first).
pub fn compile(ast: &Ast, instance: &mut Instance, filename: &str, diag: &mut Diagnostics) -> Option<Binary> {
    let opts = ValidatorOptions::default();
    if !validate(ast, instance.registry_mut(), filename, diag, &opts) {
        return None;
    }

    let mut binary = Binary::new();
    for (name, version, _id) in instance.registry().iter() {
        binary.ext_table.push(ExtTableEntry {
            name: name.to_owned(),
            version,
            block_id: 0,
        });
    }
    binary.metadata.script_name = filename.to_owned();
    Some(CodeGenerator::new(ast).generate(binary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_syntax::parse_script;
    use std::rc::Rc;

    #[test]
    fn compile_rejects_script_missing_require() {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(r#"fileinto "Junk";"#, "t.sieve", &mut diag);
        let mut instance = Instance::new("u", "/home/u");
        assert!(compile(&ast, &mut instance, "t.sieve", &mut diag).is_none());
    }

    #[test]
    fn compile_produces_a_binary_with_jumps_intact() {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(
            r#"require ["fileinto"];
               if header :contains "Subject" "sale" { fileinto "Junk"; } else { keep; }"#,
            "t.sieve",
            &mut diag,
        );
        let mut instance = Instance::new("u", "/home/u");
        let binary = compile(&ast, &mut instance, "t.sieve", &mut diag).expect("should compile");
        binary.validate_jumps().expect("jumps stay in block");
        assert_eq!(binary.metadata.script_name, "t.sieve");
    }
}
