//! Lexer: tokenises Sieve source per the grammar in spec.md §4.2/§6.
//!
//! Token recognition is delegated to [`logos`]; this module post-processes
//! the raw token stream for cases a single regex-per-token can't express —
//! splitting quoted-string escapes, decoding dot-stuffed `text:` literals,
//! and coalescing a run of unrecognised bytes into one diagnostic.
//!
//! On a lexical error, emits one diagnostic and resynchronises to the next
//! `;`, `{` or `}` (§4.2 Failure).

use logos::Logos;

use sieve_core::diag::Diagnostics;

use crate::token::{Token, TokenKind};

/// Raw token kinds recognised by the generated DFA. `QuotedStringRaw` still
/// carries its surrounding quotes and escapes undecoded; `TextColon` marks
/// the start of a `text:` multi-line literal, whose body isn't regular (it
/// ends at a line containing only `.`) and is scanned by hand afterwards.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
enum Raw {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,

    #[regex(r":[A-Za-z_][A-Za-z0-9_.\-]*")]
    Tag,

    #[regex(r"[0-9]+[KkMmGg]?")]
    Number,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    QuotedStringRaw,

    #[token("text:")]
    TextColon,

    #[regex(r"[A-Za-z_][A-Za-z0-9_.\-]*")]
    Identifier,
}

pub struct Lexer<'src> {
    src: &'src str,
    filename: String,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str, filename: impl Into<String>) -> Self {
        Self {
            src,
            filename: filename.into(),
        }
    }

    /// Tokenise the entire input, reporting lexical errors into `diag` and
    /// resynchronising rather than aborting.
    pub fn tokenize(self, diag: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut lexer = Raw::lexer(self.src);
        let mut error_start: Option<usize> = None;

        loop {
            match lexer.next() {
                Some(Ok(raw)) => {
                    if let Some(start) = error_start.take() {
                        let line = line_at(self.src, start);
                        let end = lexer.span().start;
                        diag.error(
                            &self.filename,
                            line,
                            format!("unexpected character '{}'", self.src[start..end].chars().next().unwrap_or('?')),
                        );
                        if self.resync_from(&mut lexer, end) {
                            continue;
                        }
                        break;
                    }

                    let line = line_at(self.src, lexer.span().start);
                    match self.finish_token(raw, &mut lexer, diag, line) {
                        Some(tok) => tokens.push(tok),
                        None => continue,
                    }
                }
                Some(Err(())) => {
                    if error_start.is_none() {
                        error_start = Some(lexer.span().start);
                    }
                }
                None => {
                    if let Some(start) = error_start.take() {
                        let line = line_at(self.src, start);
                        diag.error(
                            &self.filename,
                            line,
                            format!("unexpected character '{}'", self.src[start..].chars().next().unwrap_or('?')),
                        );
                    }
                    break;
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: line_at(self.src, self.src.len()),
        });
        tokens
    }

    /// Turns a recognised raw token into the decoded [`TokenKind`], handling
    /// the non-regular cases (quoted-string escapes, `text:` literals).
    /// Returns `None` when a multi-line literal failed to terminate and the
    /// remainder of the input has already been consumed.
    fn finish_token(
        &self,
        raw: Raw,
        lexer: &mut logos::Lexer<'src, Raw>,
        diag: &mut Diagnostics,
        line: u32,
    ) -> Option<Token> {
        let text = lexer.slice();
        let kind = match raw {
            Raw::LBrace => TokenKind::LBrace,
            Raw::RBrace => TokenKind::RBrace,
            Raw::LBracket => TokenKind::LBracket,
            Raw::RBracket => TokenKind::RBracket,
            Raw::LParen => TokenKind::LParen,
            Raw::RParen => TokenKind::RParen,
            Raw::Comma => TokenKind::Comma,
            Raw::Semicolon => TokenKind::Semicolon,
            Raw::Tag => TokenKind::Tag(text[1..].to_owned()),
            Raw::Number => match decode_number(text) {
                Some(n) => TokenKind::Number(n),
                None => {
                    diag.error(&self.filename, line, "number literal overflows after suffix");
                    return None;
                }
            },
            Raw::QuotedStringRaw => TokenKind::QuotedString(decode_escapes(&text[1..text.len() - 1])),
            Raw::TextColon => match scan_multiline_string(lexer) {
                Some(s) => TokenKind::QuotedString(s),
                None => {
                    diag.error(&self.filename, line, "unterminated multi-line string literal");
                    return None;
                }
            },
            Raw::Identifier => TokenKind::Identifier(text.to_owned()),
        };
        Some(Token { kind, line })
    }

    /// Skip forward to (and past) the next `;`, `{` or `}` following a
    /// coalesced run of unrecognised bytes, matching the "resynchronise to
    /// the next semicolon or brace" contract (§4.2 Failure). Rebuilds the
    /// lexer over the full source and `bump`s its cursor so span offsets
    /// stay absolute. Returns `false` once input is exhausted.
    fn resync_from(&self, lexer: &mut logos::Lexer<'src, Raw>, end: usize) -> bool {
        let remainder = &self.src[end..];
        *lexer = Raw::lexer(self.src);
        match remainder.find([';', '{', '}']) {
            Some(rel) => {
                lexer.bump(end + rel + 1);
                true
            }
            None => {
                lexer.bump(self.src.len());
                false
            }
        }
    }
}

fn decode_number(text: &str) -> Option<u64> {
    let (digits, mult) = match text.as_bytes().last() {
        Some(b'K') | Some(b'k') => (&text[..text.len() - 1], 1024u64),
        Some(b'M') | Some(b'm') => (&text[..text.len() - 1], 1024u64 * 1024),
        Some(b'G') | Some(b'g') => (&text[..text.len() - 1], 1024u64 * 1024 * 1024),
        _ => (text, 1u64),
    };
    let base: u64 = digits.parse().ok()?;
    base.checked_mul(mult)
}

/// Resolves `\\` and `\"` escapes; any other escaped character is kept
/// literally (backslash included), matching the hand-written scanner this
/// replaced.
fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `text:` multi-line literal body: optional trailing comment to end of
/// line, then lines up to a line containing only `.`, with dot-stuffing
/// reversed (a leading `..` on a line decodes to a single leading `.`).
/// Consumes the literal's source out of `lexer`'s remainder via `bump`,
/// the escape hatch `logos` offers for constructs a regex can't bound.
fn scan_multiline_string(lexer: &mut logos::Lexer<'_, Raw>) -> Option<String> {
    let remainder = lexer.remainder();
    let after_header = remainder.find('\n').map(|i| i + 1)?;
    let mut consumed = after_header;
    let mut out = String::new();
    let mut first_line = true;
    loop {
        let rest = &remainder[consumed..];
        if rest.is_empty() {
            lexer.bump(consumed);
            return None;
        }
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let raw_line = &rest[..line_end];
        let has_newline = line_end < rest.len();
        consumed += line_end + usize::from(has_newline);

        if raw_line == "." {
            lexer.bump(consumed);
            return Some(out);
        }
        if !has_newline {
            lexer.bump(consumed);
            return None;
        }
        let decoded = raw_line.strip_prefix('.').unwrap_or(raw_line);
        if !first_line {
            out.push('\n');
        }
        out.push_str(decoded);
        first_line = false;
    }
}

fn line_at(src: &str, offset: usize) -> u32 {
    1 + src.as_bytes()[..offset.min(src.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn lex(src: &str) -> (Vec<Token>, u32) {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let tokens = Lexer::new(src, "t.sieve").tokenize(&mut diag);
        (tokens, diag.error_count())
    }

    #[test]
    fn lexes_basic_command() {
        let (tokens, errs) = lex(r#"keep;"#);
        assert_eq!(errs, 0);
        assert_eq!(
            tokens,
            vec![
                Token { kind: TokenKind::Identifier("keep".into()), line: 1 },
                Token { kind: TokenKind::Semicolon, line: 1 },
                Token { kind: TokenKind::Eof, line: 1 },
            ]
        );
    }

    #[test]
    fn lexes_number_suffixes() {
        let (tokens, _) = lex("size :over 1M;");
        let nums: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Number(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(nums, vec![1024 * 1024]);
    }

    #[test]
    fn lexes_quoted_string_escapes() {
        let (tokens, _) = lex(r#""he said \"hi\"";"#);
        assert_eq!(
            tokens[0].kind,
            TokenKind::QuotedString("he said \"hi\"".into())
        );
    }

    #[test]
    fn lexes_multiline_text_with_dot_stuffing() {
        let (tokens, _) = lex("text:\nhello\n..world\n.\n");
        assert_eq!(
            tokens[0].kind,
            TokenKind::QuotedString("hello\n.world".into())
        );
    }

    #[test]
    fn lexes_tag() {
        let (tokens, _) = lex(":comparator");
        assert_eq!(tokens[0].kind, TokenKind::Tag("comparator".into()));
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, _) = lex("# a comment\nkeep; /* block */ stop;");
        let idents: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Identifier(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["keep", "stop"]);
    }

    #[test]
    fn unexpected_character_resyncs_to_semicolon() {
        let (tokens, errs) = lex("keep $ junk; stop;");
        assert_eq!(errs, 1);
        let idents: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Identifier(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["keep", "stop"]);
    }
}
