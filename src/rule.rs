//! Core generator trait and parameter system.
//!
//! A code generator knows how to emit one kind of program fragment. It
//! declares the context it may run in, the shape of the inputs it consumes,
//! and the tunable parameters it reads from the profile. The selection engine
//! in [`builder`](crate::builder) does everything else.

use std::collections::HashMap;
use std::fmt;

use crate::builder::ProgramBuilder;
use crate::context::ContextSet;
use crate::error::{GenError, GenResult};
use crate::program::Variable;
use crate::types::Capability;

// ---------------------------------------------------------------------------
// Input shapes
// ---------------------------------------------------------------------------

/// Arity of a generator together with the constraint on every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSpec {
    Arity0,
    Arity1(Capability),
    Arity2(Capability, Capability),
}

impl InputSpec {
    pub fn arity(self) -> usize {
        match self {
            InputSpec::Arity0 => 0,
            InputSpec::Arity1(_) => 1,
            InputSpec::Arity2(..) => 2,
        }
    }

    /// Constraints in slot order.
    pub fn slots(self) -> Vec<Capability> {
        match self {
            InputSpec::Arity0 => vec![],
            InputSpec::Arity1(a) => vec![a],
            InputSpec::Arity2(a, b) => vec![a, b],
        }
    }
}

impl fmt::Display for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSpec::Arity0 => write!(f, "()"),
            InputSpec::Arity1(a) => write!(f, "({a})"),
            InputSpec::Arity2(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

/// Variables drawn for a generator's input slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inputs {
    None,
    One(Variable),
    Two(Variable, Variable),
}

impl Inputs {
    pub fn from_slice(vars: &[Variable]) -> Option<Self> {
        match *vars {
            [] => Some(Inputs::None),
            [a] => Some(Inputs::One(a)),
            [a, b] => Some(Inputs::Two(a, b)),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Inputs::None => 0,
            Inputs::One(_) => 1,
            Inputs::Two(..) => 2,
        }
    }

    pub fn to_vec(self) -> Vec<Variable> {
        match self {
            Inputs::None => vec![],
            Inputs::One(a) => vec![a],
            Inputs::Two(a, b) => vec![a, b],
        }
    }

    /// The single input of an arity-1 generator.
    pub fn one(self, generator: &str, spec: InputSpec) -> GenResult<Variable> {
        match self {
            Inputs::One(a) => Ok(a),
            other => Err(other.mismatch(generator, spec)),
        }
    }

    /// Both inputs of an arity-2 generator.
    pub fn two(self, generator: &str, spec: InputSpec) -> GenResult<(Variable, Variable)> {
        match self {
            Inputs::Two(a, b) => Ok((a, b)),
            other => Err(other.mismatch(generator, spec)),
        }
    }

    fn mismatch(self, generator: &str, expected: InputSpec) -> GenError {
        GenError::InputMismatch {
            generator: generator.to_string(),
            expected,
            found: self.to_string(),
        }
    }
}

impl fmt::Display for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inputs::None => write!(f, "no inputs"),
            Inputs::One(a) => write!(f, "({a})"),
            Inputs::Two(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter value types
// ---------------------------------------------------------------------------

/// A single parameter value resolved from a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A probability in `0.0..=1.0`.
    Probability(f64),
    /// An inclusive range `(min, max)` for randomised counts.
    Range(usize, usize),
    /// A fixed count.
    Count(usize),
    /// A boolean toggle.
    Flag(bool),
}

/// Declaration of a parameter a generator expects, with its default value.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub default: ParamValue,
}

impl Param {
    pub fn prob(name: &'static str, default: f64) -> Self {
        Self {
            name,
            default: ParamValue::Probability(default),
        }
    }

    pub fn range(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            default: ParamValue::Range(min, max),
        }
    }

    pub fn count(name: &'static str, default: usize) -> Self {
        Self {
            name,
            default: ParamValue::Count(default),
        }
    }

    pub fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            default: ParamValue::Flag(default),
        }
    }
}

/// Name of the implicit selection weight every generator carries.
pub const WEIGHT_PARAM: &str = "weight";

// ---------------------------------------------------------------------------
// Resolved parameter bag
// ---------------------------------------------------------------------------

/// Resolved parameters for a single generator.
///
/// Generators receive a `&Params` and pull values out by name through typed
/// accessors. The accessors panic on a missing key or a wrong variant: both
/// mean the generator reads a parameter it never declared.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<&'static str, ParamValue>,
}

impl Params {
    pub fn from_iter(iter: impl IntoIterator<Item = (&'static str, ParamValue)>) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, key: &'static str, value: ParamValue) {
        self.values.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// # Panics
    ///
    /// Panics if the key is missing or holds a non-`Probability` variant.
    pub fn prob(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(ParamValue::Probability(p)) => *p,
            Some(other) => panic!("param '{key}' is {other:?}, expected Probability"),
            None => panic!("param '{key}' not found"),
        }
    }

    /// # Panics
    ///
    /// Panics if the key is missing or holds a non-`Range` variant.
    pub fn range(&self, key: &str) -> (usize, usize) {
        match self.values.get(key) {
            Some(ParamValue::Range(lo, hi)) => (*lo, *hi),
            Some(other) => panic!("param '{key}' is {other:?}, expected Range"),
            None => panic!("param '{key}' not found"),
        }
    }

    /// # Panics
    ///
    /// Panics if the key is missing or holds a non-`Count` variant.
    pub fn count(&self, key: &str) -> usize {
        match self.values.get(key) {
            Some(ParamValue::Count(n)) => *n,
            Some(other) => panic!("param '{key}' is {other:?}, expected Count"),
            None => panic!("param '{key}' not found"),
        }
    }

    /// # Panics
    ///
    /// Panics if the key is missing or holds a non-`Flag` variant.
    pub fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(ParamValue::Flag(b)) => *b,
            Some(other) => panic!("param '{key}' is {other:?}, expected Flag"),
            None => panic!("param '{key}' not found"),
        }
    }

    /// Selection weight; generators without an explicit weight count as 1.
    pub fn weight(&self) -> usize {
        match self.values.get(WEIGHT_PARAM) {
            Some(ParamValue::Count(n)) => *n,
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// A named, preconditioned routine that emits program fragments.
pub trait CodeGenerator: Send + Sync {
    /// Unique name used in profiles, prefixes and diagnostics.
    fn name(&self) -> &'static str;

    /// Context flags that must all be in effect for this generator to run.
    fn required_context(&self) -> ContextSet {
        ContextSet::EMPTY
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity0
    }

    /// Parameters this generator reads from the profile.
    fn params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Default selection weight under the weighted policy.
    fn default_weight(&self) -> usize {
        10
    }

    /// Emit the fragment.
    ///
    /// `inputs` always matches [`inputs`](CodeGenerator::inputs) and the
    /// required context is in effect. Emitting nothing is a legal outcome.
    fn generate(&self, b: &mut ProgramBuilder<'_>, inputs: Inputs, params: &Params)
    -> GenResult<()>;
}
