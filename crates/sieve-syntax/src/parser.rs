//! Recursive-descent parser (§4.3): turns the token stream into the AST.
//!
//! Grammar (informal): a script is a list of commands. A command is
//! `identifier arguments testpart? (block | ';')` where arguments is zero
//! or more strings/string-lists/numbers/tags, and testpart is present only
//! for `if`/`elsif` (a single following test). Tests nest through `not`
//! (one subtest) and `anyof`/`allof` (a parenthesized, comma-separated test
//! list); any other test identifier takes an argument list like a command.

use sieve_core::diag::Diagnostics;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::token::{Token, TokenKind};

/// Commands that are followed directly by a single test (no parens): core
/// Sieve control flow, independent of which extensions are loaded.
const TEST_BEARING_COMMANDS: &[&str] = &["if", "elsif"];

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
    diag: &'a mut Diagnostics,
    filename: String,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, filename: impl Into<String>, diag: &'a mut Diagnostics) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
            diag,
            filename: filename.into(),
        }
    }

    /// Parse a complete script, returning the arena. Errors are reported
    /// into `diag`; parsing never panics and always returns a (possibly
    /// partial) AST.
    pub fn parse(mut self) -> Ast {
        while !self.at(TokenKind::Eof) {
            if let Some(cmd) = self.parse_command() {
                self.ast.roots.push(cmd);
            }
        }
        self.ast.build_parents();
        self.ast
    }

    // ---- token cursor helpers ----

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn at(&self, kind: TokenKind) -> bool {
        *self.peek() == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&mut self, line: u32, message: impl Into<String>) {
        self.diag.error(&self.filename, line, message);
    }

    /// Skip forward past any unbalanced tokens until a `;` at depth 0
    /// (consumed) or a `}`/EOF at depth 0 (left for the caller).
    fn resync(&mut self) {
        let mut depth: i32 = 0;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth -= 1;
                    self.bump();
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    // ---- grammar productions ----

    fn parse_command(&mut self) -> Option<NodeId> {
        let line = self.peek_line();
        let identifier = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                name
            }
            other => {
                self.error(line, format!("expected a command identifier, found {other:?}"));
                self.resync();
                return None;
            }
        };

        let arguments = self.parse_arguments();

        let tests = if TEST_BEARING_COMMANDS.contains(&identifier.as_str()) {
            match self.parse_test() {
                Some(t) => vec![t],
                None => {
                    self.resync();
                    return None;
                }
            }
        } else {
            Vec::new()
        };

        let block = if self.at(TokenKind::LBrace) {
            Some(self.parse_block())
        } else if self.at(TokenKind::Semicolon) {
            self.bump();
            None
        } else {
            self.error(
                self.peek_line(),
                format!("expected ';' or '{{' after command '{identifier}', found {:?}", self.peek()),
            );
            self.resync();
            None
        };

        Some(self.ast.alloc(
            NodeKind::Command {
                identifier,
                arguments,
                tests,
                block,
            },
            line,
        ))
    }

    fn parse_block(&mut self) -> Vec<NodeId> {
        self.bump(); // '{'
        let mut commands = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if let Some(cmd) = self.parse_command() {
                commands.push(cmd);
            }
        }
        if self.at(TokenKind::RBrace) {
            self.bump();
        } else {
            self.error(self.peek_line(), "unbalanced braces: expected '}'");
        }
        commands
    }

    fn parse_test(&mut self) -> Option<NodeId> {
        let line = self.peek_line();
        let identifier = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                name
            }
            other => {
                self.error(line, format!("expected a test, found {other:?}"));
                return None;
            }
        };

        match identifier.as_str() {
            "not" => {
                let sub = self.parse_test()?;
                Some(self.ast.alloc(
                    NodeKind::Test {
                        identifier,
                        arguments: Vec::new(),
                        tests: vec![sub],
                    },
                    line,
                ))
            }
            "anyof" | "allof" => {
                if !self.at(TokenKind::LParen) {
                    self.error(self.peek_line(), format!("expected '(' after '{identifier}'"));
                    return None;
                }
                self.bump();
                let mut tests = vec![self.parse_test()?];
                while self.at(TokenKind::Comma) {
                    self.bump();
                    tests.push(self.parse_test()?);
                }
                if self.at(TokenKind::RParen) {
                    self.bump();
                } else {
                    self.error(self.peek_line(), "expected ')' to close test list");
                }
                Some(self.ast.alloc(
                    NodeKind::Test {
                        identifier,
                        arguments: Vec::new(),
                        tests,
                    },
                    line,
                ))
            }
            _ => {
                let arguments = self.parse_arguments();
                Some(self.ast.alloc(
                    NodeKind::Test {
                        identifier,
                        arguments,
                        tests: Vec::new(),
                    },
                    line,
                ))
            }
        }
    }

    fn parse_arguments(&mut self) -> Vec<NodeId> {
        let mut args = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::QuotedString(s) => {
                    let line = self.peek_line();
                    self.bump();
                    args.push(self.ast.alloc(NodeKind::String(s), line));
                }
                TokenKind::Number(n) => {
                    let line = self.peek_line();
                    self.bump();
                    args.push(self.ast.alloc(NodeKind::Number(n), line));
                }
                TokenKind::Tag(name) => {
                    let line = self.peek_line();
                    self.bump();
                    args.push(self.ast.alloc(
                        NodeKind::Tag {
                            name,
                            params: Vec::new(),
                        },
                        line,
                    ));
                }
                TokenKind::LBracket => {
                    args.push(self.parse_string_list());
                }
                _ => break,
            }
        }
        args
    }

    fn parse_string_list(&mut self) -> NodeId {
        let line = self.peek_line();
        self.bump(); // '['
        let mut items = Vec::new();
        if !self.at(TokenKind::RBracket) {
            loop {
                match self.peek().clone() {
                    TokenKind::QuotedString(s) => {
                        let item_line = self.peek_line();
                        self.bump();
                        items.push(self.ast.alloc(NodeKind::String(s), item_line));
                    }
                    other => {
                        self.error(self.peek_line(), format!("expected string in string-list, found {other:?}"));
                        break;
                    }
                }
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if self.at(TokenKind::RBracket) {
            self.bump();
        } else {
            self.error(self.peek_line(), "expected ']' to close string-list");
        }
        self.ast.alloc(NodeKind::StringList(items), line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use std::rc::Rc;

    fn parse(src: &str) -> (Ast, u32) {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let tokens = Lexer::new(src, "t.sieve").tokenize(&mut diag);
        let ast = Parser::new(tokens, "t.sieve", &mut diag).parse();
        (ast, diag.error_count())
    }

    #[test]
    fn parses_simple_fileinto() {
        let (ast, errs) = parse(r#"require ["fileinto"]; fileinto "Junk";"#);
        assert_eq!(errs, 0);
        assert_eq!(ast.roots.len(), 2);
    }

    #[test]
    fn parses_if_with_header_test() {
        let (ast, errs) = parse(
            r#"if header :contains "Subject" "sale" { fileinto "Junk"; stop; }"#,
        );
        assert_eq!(errs, 0);
        let NodeKind::Command { identifier, tests, block, .. } = &ast.get(ast.roots[0]).kind
        else {
            panic!("expected command");
        };
        assert_eq!(identifier, "if");
        assert_eq!(tests.len(), 1);
        assert_eq!(block.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn parses_anyof_allof_nesting() {
        let (ast, errs) = parse(
            r#"if anyof (not exists "X-A", allof(true, false)) { discard; }"#,
        );
        assert_eq!(errs, 0);
        let NodeKind::Command { tests, .. } = &ast.get(ast.roots[0]).kind else {
            panic!()
        };
        let NodeKind::Test { identifier, tests: sub, .. } = &ast.get(tests[0]).kind else {
            panic!()
        };
        assert_eq!(identifier, "anyof");
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn missing_semicolon_is_an_error_with_resync() {
        let (ast, errs) = parse("keep stop;");
        assert!(errs >= 1);
        // resync lands after the ';', so nothing further is parsed here.
        assert_eq!(ast.roots.len(), 1);
    }

    #[test]
    fn parses_string_list_argument() {
        let (ast, errs) = parse(r#"require ["fileinto", "reject"];"#);
        assert_eq!(errs, 0);
        let NodeKind::Command { arguments, .. } = &ast.get(ast.roots[0]).kind else {
            panic!()
        };
        let NodeKind::StringList(items) = &ast.get(arguments[0]).kind else {
            panic!()
        };
        assert_eq!(items.len(), 2);
    }
}
