#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Stack-free bytecode interpreter, match engine and action accumulator
//! (spec.md §4.8, §4.9, §4.10): executes a [`sieve_bytecode::Binary`]
//! against one [`Message`] and produces a committed [`Action`] list.
//!
//! Layers:
//! - [`comparator`]/[`address_part`]/[`match_type`]: the match engine,
//!   shared by every test opcode.
//! - [`actions`]/[`result`]: the `Action` vocabulary and the dedup/
//!   merge/conflict/implicit-keep accumulator.
//! - [`message`]/[`variables`]/[`environment`]: the host collaborators
//!   and per-execution mutable state the interpreter threads through.
//! - [`tracer`]: optional per-opcode progress reporting.
//! - [`interpreter`]: the dispatch loop itself, plus [`IncludeResolver`]
//!   for the `include` extension (implemented by `sieve-storage`).

pub mod actions;
pub mod address_part;
pub mod comparator;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod match_type;
pub mod message;
pub mod result;
pub mod tracer;
pub mod variables;

pub use actions::{Action, DuplicatePolicy, SideEffect};
pub use environment::{FlagsRegister, RuntimeEnvironment};
pub use error::{Result, RuntimeError};
pub use interpreter::{ExecutionContext, IncludeResolver, Interpreter, NoIncludes};
pub use message::{MemoryMessage, Message};
pub use result::{DuplicateTracker, NoopDuplicateTracker, PendingAction, ResultAccumulator};
pub use tracer::{NoopTracer, PrintTracer, Tracer};
pub use variables::VariableStore;
