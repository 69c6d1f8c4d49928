//! Lexical and control-flow context of the current generation point.
//!
//! The engine pushes a [`ContextFlag`] when it enters a nested body and pops
//! it when the body is complete. Generators only ever read the stack, through
//! the [`ContextSet`] returned by [`ContextStack::current`].
//!
//! Entering a function body starts a new activation: loop, generator, async
//! and try flags of the enclosing code no longer apply inside it, while the
//! lexical flags (`Function`, `With`) stay visible. The frames themselves are
//! never dropped early, only the effective query changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};

/// A construct the generation point can be nested inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextFlag {
    Function,
    Generator,
    Async,
    Loop,
    With,
    Try,
}

impl ContextFlag {
    pub const ALL: [ContextFlag; 6] = [
        ContextFlag::Function,
        ContextFlag::Generator,
        ContextFlag::Async,
        ContextFlag::Loop,
        ContextFlag::With,
        ContextFlag::Try,
    ];

    const fn bit(self) -> u8 {
        match self {
            ContextFlag::Function => 1 << 0,
            ContextFlag::Generator => 1 << 1,
            ContextFlag::Async => 1 << 2,
            ContextFlag::Loop => 1 << 3,
            ContextFlag::With => 1 << 4,
            ContextFlag::Try => 1 << 5,
        }
    }

    /// Whether the flag stays in effect inside a nested function body.
    pub const fn is_lexical(self) -> bool {
        matches!(self, ContextFlag::Function | ContextFlag::With)
    }

    fn label(self) -> &'static str {
        match self {
            ContextFlag::Function => "function",
            ContextFlag::Generator => "generator",
            ContextFlag::Async => "async",
            ContextFlag::Loop => "loop",
            ContextFlag::With => "with",
            ContextFlag::Try => "try",
        }
    }
}

impl fmt::Display for ContextFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of context flags, used both for a generator's required context and
/// for the effective context at a generation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextSet(u8);

impl ContextSet {
    pub const EMPTY: ContextSet = ContextSet(0);

    pub const fn of(flag: ContextFlag) -> Self {
        ContextSet(flag.bit())
    }

    pub fn from_flags(flags: &[ContextFlag]) -> Self {
        flags.iter().fold(Self::EMPTY, |set, f| set.with(*f))
    }

    pub const fn with(self, flag: ContextFlag) -> Self {
        ContextSet(self.0 | flag.bit())
    }

    pub const fn contains(self, flag: ContextFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// `self ⊆ other`.
    pub const fn is_subset_of(self, other: ContextSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = ContextFlag> {
        ContextFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(ContextFlag::label).collect();
        write!(f, "{{{}}}", labels.join(", "))
    }
}

/// LIFO stack of the flags pushed by every enclosing nested body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStack {
    frames: Vec<ContextFlag>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, flag: ContextFlag) {
        self.frames.push(flag);
    }

    /// Pop the innermost frame, which must be `flag`.
    ///
    /// A mismatch means the composition protocol is broken and is reported
    /// as a fatal [`GenError::ContextMismatch`]; the stack is left untouched.
    pub fn pop(&mut self, flag: ContextFlag) -> GenResult<()> {
        match self.frames.last() {
            Some(top) if *top == flag => {
                self.frames.pop();
                Ok(())
            }
            found => Err(GenError::ContextMismatch {
                expected: flag,
                found: found.copied(),
            }),
        }
    }

    /// The effective context at the current generation point.
    pub fn current(&self) -> ContextSet {
        let mut set = ContextSet::EMPTY;
        let mut crossed_function = false;
        for flag in self.frames.iter().rev() {
            if !crossed_function || flag.is_lexical() {
                set = set.with(*flag);
            }
            if *flag == ContextFlag::Function {
                crossed_function = true;
            }
        }
        set
    }

    pub fn contains(&self, flag: ContextFlag) -> bool {
        self.current().contains(flag)
    }

    pub fn contains_all(&self, required: ContextSet) -> bool {
        required.is_subset_of(self.current())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
