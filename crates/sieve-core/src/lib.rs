#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Shared primitives for the Sieve engine.
//!
//! Layers:
//! - **Interning** (`interner`): cheap integer handles for repeated identifiers.
//! - **Registry** (`registry`): the Instance-scoped table of loaded extensions
//!   and the commands/tests/tags/comparators/match-types/address-parts/
//!   actions/side-effects they contribute.
//! - **Diagnostics** (`diag`): the error sink shared by every compile phase.
//! - **Primitives** (`primitives`): `Comparator`, `MatchType`, `AddressPart`
//!   identifiers and `ScriptName` validation.
//! - **Instance** (`instance`): the process-wide engine handle.

pub mod diag;
pub mod instance;
pub mod interner;
pub mod primitives;
pub mod registry;

pub use diag::{Diagnostic, Diagnostics, ErrorHandler, Severity};
pub use instance::Instance;
pub use interner::{Interner, Symbol};
pub use primitives::{AddressPart, Comparator, MatchType, ScriptName};
pub use registry::{ExtensionDef, ExtensionId, Registry};
