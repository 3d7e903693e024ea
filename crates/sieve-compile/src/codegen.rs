//! Code generator (§4.7): walks the validated AST and emits the main
//! block (plus, in a full extension ABI, extension sub-blocks — this
//! workspace's extensions all declare `block_id = 0`, so only the main
//! block is ever populated).
//!
//! Control flow mirrors the spec's pseudocode almost directly:
//! - `if`/`elsif`/`else`: each arm's test jumps past its body on false;
//!   a non-final arm's body ends with an unconditional jump to the
//!   construct's exit, resolved once every arm has been emitted.
//! - `anyof`/`allof`: short-circuit by threading a `want_true` flag and a
//!   shared [`JumpTarget`] through the test tree (`not` simply flips the
//!   flag). See `generate_test` for the four-case table this implements.

use sieve_bytecode::{Binary, BlockWriter, Label, Opcode, Operand};
use sieve_core::diag::Diagnostics;
use sieve_syntax::ast::{Ast, NodeId, NodeKind};

use crate::tags::{scan_arguments, ArgScan};

/// A jump instruction's target, possibly shared by several jump sites
/// (e.g. every leaf of an `anyof` that jumps to the same "test is true"
/// destination). Collects placeholders and patches them all at once.
#[derive(Default)]
struct JumpTarget {
    pending: Vec<Label>,
}

impl JumpTarget {
    fn add(&mut self, w: &mut BlockWriter, opcode: Opcode) {
        w.emit_opcode(opcode);
        self.pending.push(w.emit_jump_placeholder());
    }

    fn resolve(self, w: &mut BlockWriter) {
        let here = w.position();
        for label in self.pending {
            w.resolve(label, here);
        }
    }
}

pub struct CodeGenerator<'a> {
    ast: &'a Ast,
    writer: BlockWriter,
    diag: Diagnostics,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            writer: BlockWriter::new(),
            diag: Diagnostics::new(std::rc::Rc::new(sieve_core::diag::MemorySink::default()), 0),
        }
    }

    /// Generate the whole script into a fresh [`Binary`]'s main block.
    /// `arguments`/tests are assumed already validated: any tag-parsing
    /// diagnostic raised here would indicate the validator let something
    /// through it shouldn't have.
    pub fn generate(mut self, mut binary: Binary) -> Binary {
        let roots = self.ast.roots.clone();
        self.generate_command_list(&roots);
        self.writer.emit_opcode(Opcode::Stop);
        binary.blocks[sieve_bytecode::MAIN_BLOCK_ID as usize].payload = self.writer.into_bytes();
        binary
    }

    fn scan(&mut self, arguments: &[NodeId]) -> ArgScan {
        scan_arguments(self.ast, arguments, "", &mut self.diag)
    }

    fn generate_command_list(&mut self, commands: &[NodeId]) {
        let mut i = 0;
        while i < commands.len() {
            let id = commands[i];
            let NodeKind::Command { identifier, .. } = &self.ast.get(id).kind else {
                i += 1;
                continue;
            };
            if identifier == "require" {
                i += 1;
                continue;
            }
            if identifier == "if" {
                let mut arm_end = i + 1;
                while arm_end < commands.len() {
                    let NodeKind::Command { identifier: next, .. } = &self.ast.get(commands[arm_end]).kind
                    else {
                        break;
                    };
                    if next == "elsif" || next == "else" {
                        arm_end += 1;
                    } else {
                        break;
                    }
                }
                self.generate_if_chain(&commands[i..arm_end]);
                i = arm_end;
                continue;
            }
            self.generate_command(id);
            i += 1;
        }
    }

    fn generate_if_chain(&mut self, arms: &[NodeId]) {
        let mut exits = JumpTarget::default();
        for (idx, &arm) in arms.iter().enumerate() {
            let is_last = idx + 1 == arms.len();
            let NodeKind::Command {
                identifier, tests, block, ..
            } = self.ast.get(arm).kind.clone()
            else {
                continue;
            };
            let body = block.unwrap_or_default();
            if identifier == "else" {
                self.generate_command_list(&body);
                continue;
            }
            let test = tests[0];
            let mut jfalse = JumpTarget::default();
            self.generate_test(test, &mut jfalse, false);
            self.generate_command_list(&body);
            if !is_last {
                self.writer.emit_opcode(Opcode::Jmp);
                exits.pending.push(self.writer.emit_jump_placeholder());
            }
            jfalse.resolve(&mut self.writer);
        }
        exits.resolve(&mut self.writer);
    }

    /// Compile `test_id` so that control reaches `target` iff the test's
    /// boolean value equals `want_true`; otherwise control falls through.
    fn generate_test(&mut self, test_id: NodeId, target: &mut JumpTarget, want_true: bool) {
        let NodeKind::Test {
            identifier, tests, ..
        } = self.ast.get(test_id).kind.clone()
        else {
            return;
        };
        match identifier.as_str() {
            "not" => self.generate_test(tests[0], target, !want_true),
            "anyof" => {
                if want_true {
                    for sub in tests {
                        self.generate_test(sub, target, true);
                    }
                } else {
                    let mut true_landing = JumpTarget::default();
                    for sub in tests {
                        self.generate_test(sub, &mut true_landing, true);
                    }
                    self.writer.emit_opcode(Opcode::Jmp);
                    target.pending.push(self.writer.emit_jump_placeholder());
                    true_landing.resolve(&mut self.writer);
                }
            }
            "allof" => {
                if want_true {
                    let mut false_landing = JumpTarget::default();
                    for sub in &tests {
                        self.generate_test(*sub, &mut false_landing, false);
                    }
                    self.writer.emit_opcode(Opcode::Jmp);
                    target.pending.push(self.writer.emit_jump_placeholder());
                    false_landing.resolve(&mut self.writer);
                } else {
                    for sub in tests {
                        self.generate_test(sub, target, false);
                    }
                }
            }
            _ => {
                self.generate_leaf_test(test_id);
                target.add(&mut self.writer, if want_true { Opcode::JmpTrue } else { Opcode::JmpFalse });
            }
        }
    }

    fn generate_leaf_test(&mut self, test_id: NodeId) {
        let NodeKind::Test {
            identifier, arguments, ..
        } = self.ast.get(test_id).kind.clone()
        else {
            return;
        };
        let scan = self.scan(&arguments);

        match identifier.as_str() {
            "true" => self.writer.emit_opcode(Opcode::True),
            "false" => self.writer.emit_opcode(Opcode::False),
            "exists" => {
                self.writer.emit_opcode(Opcode::Exists);
                self.writer
                    .emit_operand(&Operand::StringList(scan.positional_string_list(self.ast, 0)));
            }
            "size" => {
                let over = scan.has_bare("over");
                let num = scan.positional_number(self.ast, 0).unwrap_or(0);
                self.writer.emit_opcode(if over { Opcode::SizeOver } else { Opcode::SizeUnder });
                self.writer.emit_operand(&Operand::Number(num));
            }
            "header" => {
                self.writer.emit_opcode(Opcode::Header);
                self.emit_match_ctx(&scan, false);
                self.emit_two_string_lists(&scan);
            }
            "address" => {
                self.writer.emit_opcode(Opcode::Address);
                self.emit_match_ctx(&scan, true);
                self.emit_two_string_lists(&scan);
            }
            "envelope" => {
                self.writer.emit_opcode(Opcode::Envelope);
                self.emit_match_ctx(&scan, true);
                self.emit_two_string_lists(&scan);
            }
            "body" => {
                self.writer.emit_opcode(Opcode::Body);
                self.emit_match_ctx(&scan, false);
                let content_type = scan.tag_string(self.ast, "content").unwrap_or_default();
                self.writer.emit_operand(&Operand::String(content_type));
                self.writer
                    .emit_operand(&Operand::StringList(scan.positional_string_list(self.ast, 0)));
            }
            "hasflag" => {
                self.writer.emit_opcode(Opcode::HasFlag);
                self.emit_match_ctx(&scan, false);
                self.emit_two_string_lists(&scan);
            }
            "string" => {
                self.writer.emit_opcode(Opcode::StringTest);
                self.emit_match_ctx(&scan, false);
                self.emit_two_string_lists(&scan);
            }
            _ => {
                // Unknown to this generator: emit `false` so bytecode stays
                // well-formed even if validation somehow let it through.
                self.writer.emit_opcode(Opcode::False);
            }
        }
    }

    fn emit_match_ctx(&mut self, scan: &ArgScan, with_address_part: bool) {
        self.writer
            .emit_operand(&Operand::Comparator(scan.match_ctx.comparator.name().to_owned()));
        self.writer
            .emit_operand(&Operand::MatchType(scan.match_ctx.match_type.to_wire()));
        if with_address_part {
            self.writer
                .emit_operand(&Operand::AddressPart(scan.match_ctx.address_part.to_wire().to_owned()));
        }
    }

    /// Emits the two positional string-lists every two-list test (header,
    /// address, envelope, hasflag, string) carries after its match context.
    /// Single positionals are one-element lists in the grammar already
    /// (`exists "X-A"` produces the same AST as `exists ["X-A"]`), so this
    /// just forwards whichever of the first two positionals are present.
    fn emit_two_string_lists(&mut self, scan: &ArgScan) {
        let first = scan.positional_string_list(self.ast, 0);
        let second = scan.positional_string_list(self.ast, 1);
        self.writer.emit_operand(&Operand::StringList(first));
        self.writer.emit_operand(&Operand::StringList(second));
    }

    fn generate_command(&mut self, id: NodeId) {
        let NodeKind::Command {
            identifier, arguments, ..
        } = self.ast.get(id).kind.clone()
        else {
            return;
        };
        let scan = self.scan(&arguments);
        match identifier.as_str() {
            "stop" => self.writer.emit_opcode(Opcode::Stop),
            "keep" => {
                let flags = scan.tag_string_list(self.ast, "flags").unwrap_or_default();
                self.writer.emit_opcode(Opcode::Keep);
                self.writer.emit_operand(&Operand::SideEffectList(flags));
            }
            "discard" => self.writer.emit_opcode(Opcode::Discard),
            "redirect" => {
                let addr = scan.positional_string(self.ast, 0).unwrap_or_default();
                let mut effects = scan.tag_string_list(self.ast, "flags").unwrap_or_default();
                if scan.has_bare("copy") {
                    effects.push(":copy".to_owned());
                }
                self.writer.emit_opcode(Opcode::Redirect);
                self.writer.emit_operand(&Operand::String(addr));
                self.writer.emit_operand(&Operand::SideEffectList(effects));
            }
            "fileinto" => {
                let mailbox = scan.positional_string(self.ast, 0).unwrap_or_default();
                let mut effects = scan.tag_string_list(self.ast, "flags").unwrap_or_default();
                if scan.has_bare("copy") {
                    effects.push(":copy".to_owned());
                }
                self.writer.emit_opcode(Opcode::FileInto);
                self.writer.emit_operand(&Operand::String(mailbox));
                self.writer.emit_operand(&Operand::SideEffectList(effects));
            }
            "reject" | "ereject" => {
                let reason = scan.positional_string(self.ast, 0).unwrap_or_default();
                self.writer.emit_opcode(Opcode::Reject);
                self.writer.emit_operand(&Operand::String(reason));
            }
            "vacation" => {
                let reason = scan.positional_string(self.ast, 0).unwrap_or_default();
                let subject = scan.tag_string(self.ast, "subject").unwrap_or_default();
                let handle = scan.tag_string(self.ast, "handle").unwrap_or_default();
                let days = scan.tag_number(self.ast, "days").unwrap_or(7);
                self.writer.emit_opcode(Opcode::Vacation);
                self.writer.emit_operand(&Operand::String(reason));
                self.writer.emit_operand(&Operand::String(subject));
                self.writer.emit_operand(&Operand::String(handle));
                self.writer.emit_operand(&Operand::Number(days));
                self.writer.emit_operand(&Operand::SideEffectList(Vec::new()));
            }
            "notify" => {
                let method = scan.positional_string(self.ast, 0).unwrap_or_default();
                let options = scan.tag_string_list(self.ast, "options").unwrap_or_default();
                let message = scan.tag_string(self.ast, "message").unwrap_or_default();
                self.writer.emit_opcode(Opcode::Notify);
                self.writer.emit_operand(&Operand::String(method));
                self.writer.emit_operand(&Operand::StringList(options));
                self.writer.emit_operand(&Operand::String(message));
            }
            "addheader" => {
                self.writer.emit_opcode(Opcode::AddHeader);
                self.writer
                    .emit_operand(&Operand::String(scan.positional_string(self.ast, 0).unwrap_or_default()));
                self.writer
                    .emit_operand(&Operand::String(scan.positional_string(self.ast, 1).unwrap_or_default()));
            }
            "deleteheader" => {
                let name = scan.positional_string(self.ast, 0).unwrap_or_default();
                self.writer.emit_opcode(Opcode::DeleteHeader);
                self.writer.emit_operand(&Operand::String(name));
            }
            "setflag" | "addflag" | "removeflag" => {
                let flags = scan.positional_string_list(self.ast, 0);
                let op = match identifier.as_str() {
                    "setflag" => Opcode::SetFlag,
                    "addflag" => Opcode::AddFlag,
                    _ => Opcode::RemoveFlag,
                };
                self.writer.emit_opcode(op);
                self.writer.emit_operand(&Operand::StringList(flags));
            }
            "include" => {
                let name = scan.positional_string(self.ast, 0).unwrap_or_default();
                self.writer.emit_opcode(Opcode::Include);
                self.writer.emit_operand(&Operand::String(name));
            }
            "return" => self.writer.emit_opcode(Opcode::Return),
            "set" => {
                self.writer.emit_opcode(Opcode::Set);
                self.writer
                    .emit_operand(&Operand::String(scan.positional_string(self.ast, 0).unwrap_or_default()));
                self.writer
                    .emit_operand(&Operand::String(scan.positional_string(self.ast, 1).unwrap_or_default()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_bytecode::dump_binary;
    use sieve_core::instance::Instance;
    use sieve_syntax::parse_script;
    use std::rc::Rc;

    fn compile(src: &str) -> Binary {
        let sink = Rc::new(sieve_core::diag::MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(src, "t.sieve", &mut diag);
        let mut instance = Instance::new("u", "/home/u");
        let ok = crate::validator::validate(
            &ast,
            instance.registry_mut(),
            "t.sieve",
            &mut diag,
            &crate::validator::ValidatorOptions::default(),
        );
        assert!(ok, "validation failed");
        let mut binary = Binary::new();
        for (name, version, _id) in instance.registry().iter() {
            binary.ext_table.push(sieve_bytecode::ExtTableEntry {
                name: name.to_owned(),
                version,
                block_id: 0,
            });
        }
        CodeGenerator::new(&ast).generate(binary)
    }

    #[test]
    fn scenario_a_compiles_to_fileinto_and_addflag() {
        let binary = compile(
            r#"require ["fileinto", "imap4flags"];
               if header :contains "Subject" "sale" {
                   addflag "\\Seen";
                   fileinto "Junk";
                   stop;
               }"#,
        );
        let text = dump_binary(&binary);
        assert!(text.contains("Header"));
        assert!(text.contains("AddFlag"));
        assert!(text.contains("FileInto"));
        assert!(text.contains("Stop"));
        binary.validate_jumps().expect("jumps stay in-block");
    }

    #[test]
    fn allof_short_circuit_compiles_without_out_of_block_jumps() {
        let binary = compile(r#"if allof (size :over 1000000, header :is "X-Spam" "yes") { discard; }"#);
        binary.validate_jumps().expect("jumps stay in-block");
        let text = dump_binary(&binary);
        assert!(text.contains("SizeOver"));
        assert!(text.contains("Discard"));
    }

    #[test]
    fn if_elsif_else_chain_has_valid_jumps() {
        let binary = compile(r#"if false { stop; } elsif true { discard; } else { keep; }"#);
        binary.validate_jumps().expect("jumps stay in-block");
    }

    #[test]
    fn vacation_tags_and_trailing_reason_do_not_cross_wire() {
        let binary = compile(
            r#"require ["vacation"];
               vacation :subject "Away" :days 5 "I am away, back soon.";"#,
        );
        let text = dump_binary(&binary);
        assert!(text.contains("Vacation"));
        binary.validate_jumps().expect("jumps stay in-block");
    }
}
