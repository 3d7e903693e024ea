#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Lexer, arena AST and recursive-descent parser for Sieve script source
//! (spec.md §4.2/§4.3).
//!
//! This crate only turns source text into an [`Ast`]; it does not know
//! about extensions, commands, or validity — that is `sieve-compile`'s job.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Ast, Node, NodeId, NodeKind};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use sieve_core::diag::Diagnostics;

/// Lex and parse `src`, returning the arena AST. Errors are reported into
/// `diag`; this never panics and always returns a (possibly partial) tree.
pub fn parse_script(src: &str, filename: &str, diag: &mut Diagnostics) -> Ast {
    let tokens = Lexer::new(src, filename).tokenize(diag);
    Parser::new(tokens, filename, diag).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn parse_script_end_to_end() {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(r#"require ["fileinto"]; fileinto "Junk";"#, "t.sieve", &mut diag);
        assert!(diag.ok());
        assert_eq!(ast.roots.len(), 2);
    }
}
