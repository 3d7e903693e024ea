//! Execution tracer (SPEC_FULL §4.8 [ADDED]): grounded directly in
//! `plotnik_vm::engine::trace` — a trait the interpreter calls at each
//! opcode boundary, with a silent default and a `--trace`-style printer
//! used by the CLI.

use sieve_bytecode::Opcode;

pub trait Tracer {
    fn on_opcode(&mut self, pc: usize, opcode: Opcode) {
        let _ = (pc, opcode);
    }

    fn on_test_result(&mut self, matched: bool) {
        let _ = matched;
    }
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Prints one line per opcode to stderr, used by `sieve test --trace`.
#[derive(Debug, Default)]
pub struct PrintTracer;

impl Tracer for PrintTracer {
    fn on_opcode(&mut self, pc: usize, opcode: Opcode) {
        eprintln!("{pc:>6}: {opcode:?}");
    }

    fn on_test_result(&mut self, matched: bool) {
        eprintln!("        -> {matched}");
    }
}
