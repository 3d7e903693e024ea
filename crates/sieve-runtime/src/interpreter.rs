//! The stack-free bytecode interpreter (§4.8): a `pc`-based dispatch
//! loop over one block at a time. Tests set a "last test result"
//! register instead of pushing a boolean onto an operand stack; the
//! `JmpTrue`/`JmpFalse` that the code generator always places
//! immediately after a leaf test's operands consumes that register.
//!
//! Grounded in `plotnik_vm::engine::Interpreter`'s register-based
//! dispatch loop, generalized from Plotnik's single-block program to
//! Sieve's include-call stack of blocks.

use std::collections::HashSet;
use std::io::Cursor;
use std::rc::Rc;

use sieve_bytecode::{Binary, Opcode, Operand};
use sieve_core::instance::Limits;
use sieve_core::primitives::{AddressPart, Comparator, MatchType};

use crate::actions::{side_effects_from_wire, Action, SideEffect};
use crate::environment::RuntimeEnvironment;
use crate::error::{Result, RuntimeError};
use crate::match_type::evaluate as evaluate_match;
use crate::message::Message;
use crate::result::{DuplicateTracker, NoopDuplicateTracker, PendingAction, ResultAccumulator};
use crate::tracer::{NoopTracer, Tracer};

/// Resolves an `include` target to its compiled script (§4.11 Included
/// script). Implemented by the storage layer, never by this crate — the
/// interpreter only knows how to call it and enforce the limits around
/// it.
pub trait IncludeResolver {
    fn resolve(&mut self, name: &str) -> Result<Rc<Binary>>;
}

/// An `IncludeResolver` for scripts with no `include` support at all;
/// every lookup fails as "not found" rather than panicking, so a host
/// that never wires up storage can still run self-contained scripts.
#[derive(Debug, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve(&mut self, name: &str) -> Result<Rc<Binary>> {
        Err(RuntimeError::IncludeNotFound(name.to_owned()))
    }
}

struct Frame {
    binary: Rc<Binary>,
    pc: usize,
    script_name: String,
}

/// Everything the interpreter needs beyond the compiled program: the
/// message to test against, the places to report progress/duplicates,
/// and how to resolve includes. Bundled so `Interpreter::run`'s
/// signature stays a handful of arguments instead of a dozen.
pub struct ExecutionContext<'a> {
    pub message: &'a mut dyn Message,
    pub tracer: Box<dyn Tracer>,
    pub duplicates: Box<dyn DuplicateTracker>,
    pub includes: Box<dyn IncludeResolver>,
    pub limits: Limits,
}

impl<'a> ExecutionContext<'a> {
    /// A context with no tracer, no include support and no cross-run
    /// vacation dedup — the common case for one-off/test executions.
    pub fn new(message: &'a mut dyn Message, limits: Limits) -> Self {
        Self {
            message,
            tracer: Box::new(NoopTracer),
            duplicates: Box::new(NoopDuplicateTracker),
            includes: Box::new(NoIncludes),
            limits,
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_includes(mut self, includes: Box<dyn IncludeResolver>) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_duplicates(mut self, duplicates: Box<dyn DuplicateTracker>) -> Self {
        self.duplicates = duplicates;
        self
    }
}

pub struct Interpreter {
    env: RuntimeEnvironment,
    result: ResultAccumulator,
    include_stack: Vec<Frame>,
    include_names: HashSet<String>,
    includes_loaded: u32,
    last_test: bool,
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        Self {
            env: RuntimeEnvironment::new(limits.exec_fuel),
            result: ResultAccumulator::new(),
            include_stack: Vec::new(),
            include_names: HashSet::new(),
            includes_loaded: 0,
            last_test: false,
        }
    }

    /// Execute `program` to completion, returning the committed action
    /// list (§4.10). `script_name` is used only for include-cycle
    /// diagnostics.
    pub fn run(
        mut self,
        program: Rc<Binary>,
        script_name: &str,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Vec<PendingAction>> {
        let mut binary = program;
        let mut cur = Cursor::new(binary.main_block().payload.clone());
        self.include_names.insert(script_name.to_owned());

        'outer: loop {
            self.env.tick()?;
            if cur.position() as usize >= cur.get_ref().len() {
                // Fell off the end of a block without `Stop`/`Return`;
                // codegen always appends `Stop`, so this only happens for
                // a hand-assembled or truncated binary.
                if self.pop_frame(&mut binary, &mut cur) {
                    continue;
                }
                break;
            }
            let pos_before = cur.position();
            let mut tag = [0u8; 1];
            std::io::Read::read_exact(&mut cur, &mut tag).map_err(|e| {
                RuntimeError::BinCorrupt(format!("truncated opcode at {pos_before}: {e}"))
            })?;
            if tag[0] & Opcode::EXT_TAG_BIT != 0 {
                return Err(RuntimeError::BinCorrupt(format!(
                    "extension opcode 0x{:02x} has no registered handler",
                    tag[0]
                )));
            }
            let op = Opcode::from_tag(tag[0])
                .ok_or_else(|| RuntimeError::BinCorrupt(format!("unknown opcode tag 0x{:02x}", tag[0])))?;
            ctx.tracer.on_opcode(pos_before as usize, op);

            match op {
                Opcode::Stop => break 'outer,
                Opcode::Return => {
                    if !self.pop_frame(&mut binary, &mut cur) {
                        break 'outer;
                    }
                }
                Opcode::Jmp => {
                    let delta = self.read_offset(&mut cur)?;
                    self.apply_jump(&mut cur, delta)?;
                }
                Opcode::JmpTrue => {
                    let delta = self.read_offset(&mut cur)?;
                    if self.last_test {
                        self.apply_jump(&mut cur, delta)?;
                    }
                }
                Opcode::JmpFalse => {
                    let delta = self.read_offset(&mut cur)?;
                    if !self.last_test {
                        self.apply_jump(&mut cur, delta)?;
                    }
                }
                Opcode::True => self.last_test = true,
                Opcode::False => self.last_test = false,
                Opcode::Address => self.last_test = self.exec_address_like(&mut cur, ctx, true, false)?,
                Opcode::Envelope => self.last_test = self.exec_address_like(&mut cur, ctx, true, true)?,
                Opcode::Header => self.last_test = self.exec_address_like(&mut cur, ctx, false, false)?,
                Opcode::HasFlag => self.last_test = self.exec_hasflag(&mut cur)?,
                Opcode::StringTest => self.last_test = self.exec_string_test(&mut cur)?,
                Opcode::Body => self.last_test = self.exec_body(&mut cur, ctx)?,
                Opcode::Exists => {
                    let names = self.read_string_list(&mut cur)?;
                    self.last_test = names.iter().all(|n| !ctx.message.header(n).is_empty());
                }
                Opcode::SizeOver => {
                    let n = self.read_number(&mut cur)?;
                    self.last_test = ctx.message.size() > n;
                }
                Opcode::SizeUnder => {
                    let n = self.read_number(&mut cur)?;
                    self.last_test = ctx.message.size() < n;
                }
                Opcode::Keep => {
                    let effects = self.effects_with_implicit_flags(&mut cur)?;
                    self.result.add(Action::Keep, effects, ctx.limits.max_redirects)?;
                }
                Opcode::Discard => {
                    self.result.add(Action::Discard, Vec::new(), ctx.limits.max_redirects)?;
                }
                Opcode::Redirect => {
                    let address = self.read_interpolated_string(&mut cur)?;
                    let effects = self.effects_with_implicit_flags(&mut cur)?;
                    self.result
                        .add(Action::Redirect { address }, effects, ctx.limits.max_redirects)?;
                }
                Opcode::FileInto => {
                    let mailbox = self.read_interpolated_string(&mut cur)?;
                    let effects = self.effects_with_implicit_flags(&mut cur)?;
                    self.result
                        .add(Action::FileInto { mailbox }, effects, ctx.limits.max_redirects)?;
                }
                Opcode::Reject => {
                    let reason = self.read_interpolated_string(&mut cur)?;
                    self.result.add(Action::Reject { reason }, Vec::new(), ctx.limits.max_redirects)?;
                }
                Opcode::Vacation => {
                    let reason = self.read_interpolated_string(&mut cur)?;
                    let subject = self.read_interpolated_string(&mut cur)?;
                    let handle = self.read_interpolated_string(&mut cur)?;
                    let days = self.read_number(&mut cur)?;
                    let _effects = self.read_side_effect_list(&mut cur)?;
                    let key = if handle.is_empty() { reason.clone() } else { handle.clone() };
                    if !ctx.duplicates.seen_recently(&key) {
                        self.result.add(
                            Action::Vacation { reason, subject, handle, days },
                            Vec::new(),
                            ctx.limits.max_redirects,
                        )?;
                    }
                }
                Opcode::Notify => {
                    let method = self.read_interpolated_string(&mut cur)?;
                    let options = self.read_string_list(&mut cur)?;
                    let message = self.read_interpolated_string(&mut cur)?;
                    self.result
                        .add(Action::Notify { method, options, message }, Vec::new(), ctx.limits.max_redirects)?;
                }
                Opcode::AddHeader => {
                    let name = self.read_interpolated_string(&mut cur)?;
                    let value = self.read_interpolated_string(&mut cur)?;
                    ctx.message.add_header(&name, &value);
                    self.result
                        .add(Action::AddHeader { name, value }, Vec::new(), ctx.limits.max_redirects)?;
                }
                Opcode::DeleteHeader => {
                    let name = self.read_interpolated_string(&mut cur)?;
                    ctx.message.delete_header(&name);
                    self.result.add(Action::DeleteHeader { name }, Vec::new(), ctx.limits.max_redirects)?;
                }
                Opcode::SetFlag => {
                    let flags = self.read_string_list(&mut cur)?;
                    self.env.flags.set(flags);
                }
                Opcode::AddFlag => {
                    let flags = self.read_string_list(&mut cur)?;
                    self.env.flags.add(flags);
                }
                Opcode::RemoveFlag => {
                    let flags = self.read_string_list(&mut cur)?;
                    self.env.flags.remove(&flags);
                }
                Opcode::Include => {
                    let name = self.read_interpolated_string(&mut cur)?;
                    self.exec_include(&name, &mut binary, &mut cur, ctx)?;
                }
                Opcode::Set => {
                    let name = self.read_string(&mut cur)?;
                    let value = self.read_interpolated_string(&mut cur)?;
                    self.env.variables.set(&name, value);
                }
            }
        }
        Ok(self.result.commit(self.env.flags.as_slice()))
    }

    /// Reads a `keep`/`fileinto`'s wire side-effect list and, when it
    /// carries no explicit `:flags` tag, falls back to the imap4flags
    /// register so `addflag`/`setflag` still reach the delivered message
    /// (RFC 5232 §3: "the flags ... at the time of its execution").
    fn effects_with_implicit_flags(&self, cur: &mut Cursor<Vec<u8>>) -> Result<Vec<SideEffect>> {
        let mut effects = side_effects_from_wire(self.read_side_effect_list(cur)?);
        let has_explicit_flags = effects.iter().any(|e| matches!(e, SideEffect::Flags(_)));
        if !has_explicit_flags {
            let flags = self.env.flags.as_slice();
            if !flags.is_empty() {
                effects.push(SideEffect::Flags(flags.to_vec()));
            }
        }
        Ok(effects)
    }

    fn pop_frame(&mut self, binary: &mut Rc<Binary>, cur: &mut Cursor<Vec<u8>>) -> bool {
        let Some(frame) = self.include_stack.pop() else {
            return false;
        };
        self.include_names.remove(&frame.script_name);
        *binary = frame.binary;
        *cur = Cursor::new(binary.main_block().payload.clone());
        cur.set_position(frame.pc as u64);
        true
    }

    fn exec_include(
        &mut self,
        name: &str,
        binary: &mut Rc<Binary>,
        cur: &mut Cursor<Vec<u8>>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<()> {
        if self.include_names.contains(name) {
            return Err(RuntimeError::IncludeCycle(name.to_owned()));
        }
        if self.include_stack.len() as u32 >= ctx.limits.max_include_depth {
            return Err(RuntimeError::IncludeDepthExceeded(ctx.limits.max_include_depth));
        }
        if self.includes_loaded >= ctx.limits.max_include_scripts {
            return Err(RuntimeError::IncludeCountExceeded(ctx.limits.max_include_scripts));
        }
        let included = ctx.includes.resolve(name)?;
        self.includes_loaded += 1;
        self.include_names.insert(name.to_owned());
        self.include_stack.push(Frame {
            binary: std::mem::replace(binary, included.clone()),
            pc: cur.position() as usize,
            script_name: name.to_owned(),
        });
        *cur = Cursor::new(binary.main_block().payload.clone());
        Ok(())
    }

    fn apply_jump(&self, cur: &mut Cursor<Vec<u8>>, delta: i32) -> Result<()> {
        let site = cur.position() as i64;
        let target = site + delta as i64;
        if target < 0 || target as usize > cur.get_ref().len() {
            return Err(RuntimeError::BinCorrupt(format!(
                "jump target {target} outside block of length {}",
                cur.get_ref().len()
            )));
        }
        cur.set_position(target as u64);
        Ok(())
    }

    // -- operand readers --

    fn read_operand(&self, cur: &mut Cursor<Vec<u8>>) -> Result<Operand> {
        Operand::read(cur).map_err(|e| RuntimeError::BinCorrupt(e.to_string()))
    }

    fn read_offset(&self, cur: &mut Cursor<Vec<u8>>) -> Result<i32> {
        match self.read_operand(cur)? {
            Operand::Offset(d) => Ok(d),
            other => Err(RuntimeError::BinCorrupt(format!("expected Offset operand, got {other:?}"))),
        }
    }

    fn read_number(&self, cur: &mut Cursor<Vec<u8>>) -> Result<u64> {
        match self.read_operand(cur)? {
            Operand::Number(n) => Ok(n),
            other => Err(RuntimeError::BinCorrupt(format!("expected Number operand, got {other:?}"))),
        }
    }

    fn read_string(&self, cur: &mut Cursor<Vec<u8>>) -> Result<String> {
        match self.read_operand(cur)? {
            Operand::String(s) => Ok(s),
            other => Err(RuntimeError::BinCorrupt(format!("expected String operand, got {other:?}"))),
        }
    }

    fn read_interpolated_string(&self, cur: &mut Cursor<Vec<u8>>) -> Result<String> {
        Ok(self.env.variables.interpolate(&self.read_string(cur)?))
    }

    fn read_string_list(&self, cur: &mut Cursor<Vec<u8>>) -> Result<Vec<String>> {
        match self.read_operand(cur)? {
            Operand::StringList(items) => Ok(items.into_iter().map(|s| self.env.variables.interpolate(&s)).collect()),
            other => Err(RuntimeError::BinCorrupt(format!("expected StringList operand, got {other:?}"))),
        }
    }

    fn read_side_effect_list(&self, cur: &mut Cursor<Vec<u8>>) -> Result<Vec<String>> {
        match self.read_operand(cur)? {
            Operand::SideEffectList(items) => Ok(items),
            other => Err(RuntimeError::BinCorrupt(format!("expected SideEffectList operand, got {other:?}"))),
        }
    }

    fn read_comparator(&self, cur: &mut Cursor<Vec<u8>>) -> Result<Comparator> {
        match self.read_operand(cur)? {
            Operand::Comparator(s) => Ok(Comparator::from_name(&s)),
            other => Err(RuntimeError::BinCorrupt(format!("expected Comparator operand, got {other:?}"))),
        }
    }

    fn read_match_type(&self, cur: &mut Cursor<Vec<u8>>) -> Result<MatchType> {
        match self.read_operand(cur)? {
            Operand::MatchType(s) => MatchType::from_wire(&s)
                .ok_or_else(|| RuntimeError::BinCorrupt(format!("unknown match type {s:?}"))),
            other => Err(RuntimeError::BinCorrupt(format!("expected MatchType operand, got {other:?}"))),
        }
    }

    fn read_address_part(&self, cur: &mut Cursor<Vec<u8>>) -> Result<AddressPart> {
        match self.read_operand(cur)? {
            Operand::AddressPart(s) => AddressPart::from_wire(&s)
                .ok_or_else(|| RuntimeError::BinCorrupt(format!("unknown address part {s:?}"))),
            other => Err(RuntimeError::BinCorrupt(format!("expected AddressPart operand, got {other:?}"))),
        }
    }

    // -- leaf test execution --

    fn exec_address_like(
        &mut self,
        cur: &mut Cursor<Vec<u8>>,
        ctx: &mut ExecutionContext<'_>,
        is_address: bool,
        is_envelope: bool,
    ) -> Result<bool> {
        let cmp = self.read_comparator(cur)?;
        let match_type = self.read_match_type(cur)?;
        let part = if is_address {
            self.read_address_part(cur)?
        } else {
            AddressPart::All
        };
        let fields = self.read_string_list(cur)?;
        let keys = self.read_string_list(cur)?;
        let mut values = Vec::new();
        for field in &fields {
            let raw = if is_envelope {
                ctx.message.envelope(field)
            } else {
                ctx.message.header(field)
            };
            for v in raw {
                values.push(if is_address { crate::address_part::extract(&part, &v) } else { v });
            }
        }
        let outcome = evaluate_match(&match_type, &cmp, &values, &keys);
        if outcome.matched && !outcome.captures.is_empty() {
            self.env.variables.set_captures(outcome.captures);
        }
        ctx.tracer.on_test_result(outcome.matched);
        Ok(outcome.matched)
    }

    /// `hasflag` always tests against the current flags register
    /// (§4.8); this workspace does not model separate named
    /// flag-variables, so both string-list operands the code generator
    /// emits (the optional variable-name list, then the key list) are
    /// read and concatenated into one key set rather than one being
    /// mistaken for a second source of flag values.
    fn exec_hasflag(&mut self, cur: &mut Cursor<Vec<u8>>) -> Result<bool> {
        let cmp = self.read_comparator(cur)?;
        let match_type = self.read_match_type(cur)?;
        let mut keys = self.read_string_list(cur)?;
        keys.extend(self.read_string_list(cur)?);
        let values = self.env.flags.as_slice().to_vec();
        let outcome = evaluate_match(&match_type, &cmp, &values, &keys);
        Ok(outcome.matched)
    }

    fn exec_string_test(&mut self, cur: &mut Cursor<Vec<u8>>) -> Result<bool> {
        let cmp = self.read_comparator(cur)?;
        let match_type = self.read_match_type(cur)?;
        let values = self.read_string_list(cur)?;
        let keys = self.read_string_list(cur)?;
        let outcome = evaluate_match(&match_type, &cmp, &values, &keys);
        if outcome.matched && !outcome.captures.is_empty() {
            self.env.variables.set_captures(outcome.captures);
        }
        Ok(outcome.matched)
    }

    fn exec_body(&mut self, cur: &mut Cursor<Vec<u8>>, ctx: &mut ExecutionContext<'_>) -> Result<bool> {
        let cmp = self.read_comparator(cur)?;
        let match_type = self.read_match_type(cur)?;
        let content_type = self.read_interpolated_string(cur)?;
        let keys = self.read_string_list(cur)?;
        let values = ctx.message.body(&content_type);
        let outcome = evaluate_match(&match_type, &cmp, &values, &keys);
        Ok(outcome.matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MemoryMessage;
    use sieve_compile::compile;
    use sieve_core::diag::{Diagnostics, MemorySink};
    use sieve_core::instance::Instance;
    use sieve_syntax::parse_script;

    fn run_script_full(src: &str, msg: &mut MemoryMessage) -> Vec<PendingAction> {
        let sink = Rc::new(MemorySink::default());
        let mut diag = Diagnostics::new(sink, 0);
        let ast = parse_script(src, "t.sieve", &mut diag);
        let mut instance = Instance::new("u", "/home/u");
        let binary = compile(&ast, &mut instance, "t.sieve", &mut diag).expect("compiles");
        let limits = instance.limits();
        let interp = Interpreter::new(limits);
        let mut ctx = ExecutionContext::new(msg, limits);
        interp.run(Rc::new(binary), "t.sieve", &mut ctx).expect("runs")
    }

    fn run_script(src: &str, msg: &mut MemoryMessage) -> Vec<Action> {
        run_script_full(src, msg).into_iter().map(|p| p.action).collect()
    }

    #[test]
    fn scenario_a_fileinto_and_flags() {
        let mut msg = MemoryMessage::new().with_header("Subject", "Summer sale!");
        let pending = run_script_full(
            r#"require ["fileinto", "imap4flags"];
               if header :contains "Subject" "sale" {
                   addflag "\\Seen";
                   fileinto "Junk";
                   stop;
               }"#,
            &mut msg,
        );
        let fileinto = pending
            .iter()
            .find(|p| matches!(p.action, Action::FileInto { ref mailbox } if mailbox == "Junk"))
            .expect("fileinto Junk");
        assert_eq!(fileinto.effects, vec![SideEffect::Flags(vec!["\\Seen".to_owned()])]);
        assert!(!pending.iter().any(|p| matches!(p.action, Action::Keep)));
    }

    #[test]
    fn empty_script_implicit_keeps() {
        let mut msg = MemoryMessage::new();
        let actions = run_script("", &mut msg);
        assert_eq!(actions, vec![Action::Keep]);
    }

    #[test]
    fn envelope_matches_captures_into_variables() {
        let mut msg = MemoryMessage::new().with_envelope("to", "user+news@example.com");
        let actions = run_script(
            r#"require ["envelope", "variables", "fileinto"];
               if envelope :matches "to" "*+*@example.com" {
                   fileinto "Sub/${1}/${2}";
               }"#,
            &mut msg,
        );
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::FileInto { mailbox } if mailbox == "Sub/user/news")));
    }

    #[test]
    fn scenario_d_allof_short_circuit() {
        // 500-KiB message: size :over 1M is false, so allof must short
        // circuit before evaluating the second test — which would itself be
        // true — and the if-block's discard must never run. Per spec
        // Scenario D: no action is appended, implicit keep is committed.
        let mut msg = MemoryMessage::new()
            .with_header("X-Spam", "yes")
            .with_body("x".repeat(500 * 1024));
        let actions = run_script(
            r#"if allof (size :over 1M, header :is "X-Spam" "yes") { discard; }"#,
            &mut msg,
        );
        assert_eq!(actions, vec![Action::Keep]);
    }

    #[test]
    fn allof_runs_body_when_all_tests_pass() {
        let mut msg = MemoryMessage::new()
            .with_header("X-Spam", "yes")
            .with_body("x".repeat(2 * 1024 * 1024));
        let actions = run_script(
            r#"if allof (size :over 1M, header :is "X-Spam" "yes") { discard; }"#,
            &mut msg,
        );
        assert_eq!(actions, vec![Action::Discard]);
    }
}
