//! Fatal faults of the generation core.
//!
//! Only invariant violations live here. An inapplicable generator, an
//! elective no-op or an exhausted recursion budget are ordinary outcomes
//! (see [`Step`](crate::builder::Step)) and never surface as errors.

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::Diagnostic;
use thiserror::Error;

use crate::context::{ContextFlag, ContextSet};
use crate::program::{ProgramError, Variable};
use crate::rule::InputSpec;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum GenError {
    #[error("unknown code generator '{name}'")]
    #[diagnostic(
        code(G001),
        help("generator names are fixed when the catalog is built; check the profile's prefix and rule tables")
    )]
    UnknownGenerator { name: String },

    #[error("code generator '{name}' is registered twice")]
    #[diagnostic(code(G002))]
    DuplicateGenerator { name: String },

    #[error("generator '{generator}' requires context {required} but the current context is {current}")]
    #[diagnostic(code(G003))]
    ContextViolation {
        generator: String,
        required: ContextSet,
        current: ContextSet,
    },

    #[error("context pop of {expected} does not match the innermost frame ({found:?})")]
    #[diagnostic(code(G004))]
    ContextMismatch {
        expected: ContextFlag,
        found: Option<ContextFlag>,
    },

    #[error("cannot choose from an empty domain")]
    #[diagnostic(code(G005))]
    EmptyDomain,

    #[error("generator '{generator}' declares inputs {expected} but was handed {found}")]
    #[diagnostic(code(G006))]
    InputMismatch {
        generator: String,
        expected: InputSpec,
        found: String,
    },

    #[error("{variable} is not a phi variable in scope")]
    #[diagnostic(code(G007))]
    NotAPhi { variable: Variable },

    #[error("variable scope closed without a matching open")]
    #[diagnostic(code(G008))]
    ScopeUnderflow,

    #[error("generated program is malformed")]
    #[diagnostic(code(G009))]
    InvalidProgram(#[from] ProgramError),
}

pub type GenResult<T> = Result<T, GenError>;
