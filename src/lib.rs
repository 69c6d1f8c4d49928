//! Generator catalog and selection engine for a mutation-based script
//! fuzzer.
//!
//! A [`ProgramBuilder`] grows a [`Program`] one step at a time: it filters
//! the [`Catalog`] by the current context, draws type-compatible inputs from
//! the visible variables, runs one [`CodeGenerator`], and lets generators
//! that open nested bodies re-enter the engine under a bounded budget.

pub mod builder;
pub mod catalog;
pub mod context;
pub mod driver;
pub mod environment;
pub mod error;
pub mod generators;
pub mod lift;
pub mod manifest;
pub mod profile;
pub mod program;
pub mod random;
pub mod resolver;
pub mod rule;
pub mod types;
pub mod variables;

pub use builder::{ProgramBuilder, Step};
pub use catalog::Catalog;
pub use context::{ContextFlag, ContextSet, ContextStack};
pub use error::{GenError, GenResult};
pub use profile::{GenerationConfig, GenerationMode, Profile, SelectionPolicy};
pub use program::{Operation, Program, Variable};
pub use resolver::{ResolvedParams, resolve};
pub use rule::{CodeGenerator, InputSpec, Inputs, Param, ParamValue, Params};
pub use types::{Capability, TypeOracle, TypeTracker, ValueType};
