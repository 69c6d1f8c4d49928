//! The program under construction: an append-only list of operations plus a
//! variable allocator.
//!
//! Operations are flat. Nested bodies are delimited by `Begin*`/`End*` pairs,
//! which keeps emission append-only while the engine recurses.

#![allow(unused_assignments)] // False positives from thiserror derive

use std::fmt;

use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::context::{ContextFlag, ContextSet};

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Opaque handle to a value produced by the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(u32);

impl Variable {
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Inc,
    Dec,
    LogicalNot,
    BitwiseNot,
    Plus,
    Minus,
}

impl UnaryOperator {
    pub const ALL: [UnaryOperator; 6] = [
        UnaryOperator::Inc,
        UnaryOperator::Dec,
        UnaryOperator::LogicalNot,
        UnaryOperator::BitwiseNot,
        UnaryOperator::Plus,
        UnaryOperator::Minus,
    ];

    pub fn token(self) -> &'static str {
        match self {
            UnaryOperator::Inc => "++",
            UnaryOperator::Dec => "--",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    Xor,
    LogicAnd,
    LogicOr,
    LShift,
    RShift,
    UnRShift,
    Exp,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 14] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::BitAnd,
        BinaryOperator::BitOr,
        BinaryOperator::Xor,
        BinaryOperator::LogicAnd,
        BinaryOperator::LogicOr,
        BinaryOperator::LShift,
        BinaryOperator::RShift,
        BinaryOperator::UnRShift,
        BinaryOperator::Exp,
    ];

    pub fn token(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::LogicAnd => "&&",
            BinaryOperator::LogicOr => "||",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::UnRShift => ">>>",
            BinaryOperator::Exp => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparator {
    pub const ALL: [Comparator; 8] = [
        Comparator::Equal,
        Comparator::StrictEqual,
        Comparator::NotEqual,
        Comparator::StrictNotEqual,
        Comparator::LessThan,
        Comparator::LessThanOrEqual,
        Comparator::GreaterThan,
        Comparator::GreaterThanOrEqual,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::StrictEqual => "===",
            Comparator::NotEqual => "!=",
            Comparator::StrictNotEqual => "!==",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
        }
    }
}

/// The flavour of a function definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Plain,
    Strict,
    Arrow,
    Generator,
    Async,
}

impl FunctionKind {
    /// Context flags opened by a body of this kind, outermost first.
    pub fn context_flags(self) -> &'static [ContextFlag] {
        match self {
            FunctionKind::Plain | FunctionKind::Strict | FunctionKind::Arrow => {
                &[ContextFlag::Function]
            }
            FunctionKind::Generator => &[ContextFlag::Function, ContextFlag::Generator],
            FunctionKind::Async => &[ContextFlag::Function, ContextFlag::Async],
        }
    }

    /// Whether `new` may be applied to functions of this kind.
    pub fn is_constructor(self) -> bool {
        matches!(self, FunctionKind::Plain | FunctionKind::Strict)
    }
}

/// Parameter shape of a function defined by the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    pub parameter_count: usize,
    pub has_rest: bool,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    LoadInt { output: Variable, value: i64 },
    LoadBigInt { output: Variable, value: i64 },
    LoadFloat { output: Variable, value: f64 },
    LoadString { output: Variable, value: String },
    LoadBool { output: Variable, value: bool },
    LoadUndefined { output: Variable },
    LoadNull { output: Variable },
    LoadRegExp { output: Variable, pattern: String, flags: String },
    LoadBuiltin { output: Variable, name: String },

    CreateObject {
        output: Variable,
        properties: Vec<(String, Variable)>,
        spreads: Vec<Variable>,
    },
    CreateArray {
        output: Variable,
        elements: Vec<Variable>,
        spreads: Vec<bool>,
    },

    BeginFunction {
        output: Variable,
        kind: FunctionKind,
        parameters: Vec<Variable>,
        has_rest: bool,
    },
    EndFunction,
    Return { value: Variable },
    Yield { value: Variable, delegate: bool },
    Await { output: Variable, value: Variable },

    LoadProperty { output: Variable, object: Variable, name: String },
    StoreProperty { object: Variable, name: String, value: Variable },
    DeleteProperty { object: Variable, name: String },
    LoadElement { output: Variable, object: Variable, index: i64 },
    StoreElement { object: Variable, index: i64, value: Variable },
    DeleteElement { object: Variable, index: i64 },
    LoadComputedProperty { output: Variable, object: Variable, name: Variable },
    StoreComputedProperty { object: Variable, name: Variable, value: Variable },
    DeleteComputedProperty { object: Variable, name: Variable },

    TypeOf { output: Variable, value: Variable },
    InstanceOf { output: Variable, value: Variable, constructor: Variable },
    In { output: Variable, property: Variable, object: Variable },

    CallMethod {
        output: Variable,
        object: Variable,
        method: String,
        arguments: Vec<Variable>,
    },
    CallFunction {
        output: Variable,
        function: Variable,
        arguments: Vec<Variable>,
        spreads: Vec<bool>,
    },
    Construct {
        output: Variable,
        constructor: Variable,
        arguments: Vec<Variable>,
    },

    Unary { output: Variable, op: UnaryOperator, value: Variable },
    Binary { output: Variable, lhs: Variable, op: BinaryOperator, rhs: Variable },
    Compare { output: Variable, lhs: Variable, comparator: Comparator, rhs: Variable },

    /// Defines a join-point variable holding `initial` until a merge.
    Phi { output: Variable, initial: Variable },
    /// Merges `value` into the phi `target`.
    Copy { target: Variable, value: Variable },

    BeginIf { condition: Variable },
    BeginElse,
    EndIf,
    BeginWhile { lhs: Variable, comparator: Comparator, rhs: Variable },
    EndWhile,
    BeginDoWhile,
    EndDoWhile { lhs: Variable, comparator: Comparator, rhs: Variable },
    /// Counting loop. The header updates the counter with `counter op step`
    /// after every iteration, `continue` included; the update is the
    /// iteration's merge into the counter phi.
    BeginFor {
        counter: Variable,
        comparator: Comparator,
        end: Variable,
        op: BinaryOperator,
        step: Variable,
    },
    EndFor,
    BeginForIn { output: Variable, object: Variable },
    EndForIn,
    BeginForOf { output: Variable, iterable: Variable },
    EndForOf,
    Break,
    Continue,

    BeginTry,
    BeginCatch { exception: Variable },
    EndTryCatch,
    Throw { value: Variable },

    BeginWith { object: Variable },
    EndWith,
    LoadFromScope { output: Variable, name: String },
    StoreToScope { name: String, value: Variable },
}

impl Operation {
    /// The variable this operation defines in the enclosing scope, if any.
    ///
    /// Variables defined for a nested body only (function parameters, loop
    /// variables, caught exceptions) are reported by [`inner_outputs`].
    ///
    /// [`inner_outputs`]: Operation::inner_outputs
    pub fn output(&self) -> Option<Variable> {
        use Operation::*;
        match self {
            LoadInt { output, .. }
            | LoadBigInt { output, .. }
            | LoadFloat { output, .. }
            | LoadString { output, .. }
            | LoadBool { output, .. }
            | LoadUndefined { output }
            | LoadNull { output }
            | LoadRegExp { output, .. }
            | LoadBuiltin { output, .. }
            | CreateObject { output, .. }
            | CreateArray { output, .. }
            | BeginFunction { output, .. }
            | Await { output, .. }
            | LoadProperty { output, .. }
            | LoadElement { output, .. }
            | LoadComputedProperty { output, .. }
            | TypeOf { output, .. }
            | InstanceOf { output, .. }
            | In { output, .. }
            | CallMethod { output, .. }
            | CallFunction { output, .. }
            | Construct { output, .. }
            | Unary { output, .. }
            | Binary { output, .. }
            | Compare { output, .. }
            | Phi { output, .. }
            | LoadFromScope { output, .. } => Some(*output),
            _ => None,
        }
    }

    /// Variables that only exist inside the body this operation opens.
    pub fn inner_outputs(&self) -> Vec<Variable> {
        match self {
            Operation::BeginFunction { parameters, .. } => parameters.clone(),
            Operation::BeginForIn { output, .. } | Operation::BeginForOf { output, .. } => {
                vec![*output]
            }
            Operation::BeginCatch { exception } => vec![*exception],
            _ => Vec::new(),
        }
    }

    /// Every variable this operation reads.
    pub fn inputs(&self) -> Vec<Variable> {
        use Operation::*;
        match self {
            CreateObject {
                properties,
                spreads,
                ..
            } => properties
                .iter()
                .map(|(_, v)| *v)
                .chain(spreads.iter().copied())
                .collect(),
            CreateArray { elements, .. } => elements.clone(),
            Return { value }
            | Yield { value, .. }
            | Await { value, .. }
            | TypeOf { value, .. }
            | Unary { value, .. }
            | Throw { value }
            | StoreToScope { value, .. } => vec![*value],
            LoadProperty { object, .. }
            | DeleteProperty { object, .. }
            | LoadElement { object, .. }
            | DeleteElement { object, .. }
            | BeginWith { object }
            | BeginForIn { object, .. } => vec![*object],
            BeginForOf { iterable, .. } => vec![*iterable],
            StoreProperty { object, value, .. } | StoreElement { object, value, .. } => {
                vec![*object, *value]
            }
            LoadComputedProperty { object, name, .. } | DeleteComputedProperty { object, name } => {
                vec![*object, *name]
            }
            StoreComputedProperty {
                object,
                name,
                value,
            } => vec![*object, *name, *value],
            InstanceOf {
                value, constructor, ..
            } => vec![*value, *constructor],
            In {
                property, object, ..
            } => vec![*property, *object],
            CallMethod {
                object, arguments, ..
            } => std::iter::once(*object)
                .chain(arguments.iter().copied())
                .collect(),
            CallFunction {
                function,
                arguments,
                ..
            } => std::iter::once(*function)
                .chain(arguments.iter().copied())
                .collect(),
            Construct {
                constructor,
                arguments,
                ..
            } => std::iter::once(*constructor)
                .chain(arguments.iter().copied())
                .collect(),
            Binary { lhs, rhs, .. }
            | Compare { lhs, rhs, .. }
            | BeginWhile { lhs, rhs, .. }
            | EndDoWhile { lhs, rhs, .. } => vec![*lhs, *rhs],
            BeginFor {
                counter, end, step, ..
            } => vec![*counter, *end, *step],
            Phi { initial, .. } => vec![*initial],
            Copy { target, value } => vec![*target, *value],
            BeginIf { condition } => vec![*condition],
            _ => Vec::new(),
        }
    }

    pub fn is_block_begin(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            BeginFunction { .. }
                | BeginIf { .. }
                | BeginElse
                | BeginWhile { .. }
                | BeginDoWhile
                | BeginFor { .. }
                | BeginForIn { .. }
                | BeginForOf { .. }
                | BeginTry
                | BeginCatch { .. }
                | BeginWith { .. }
        )
    }

    pub fn is_block_end(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            EndFunction
                | BeginElse
                | EndIf
                | EndWhile
                | EndDoWhile { .. }
                | EndFor
                | EndForIn
                | EndForOf
                | BeginCatch { .. }
                | EndTryCatch
                | EndWith
        )
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// The append-only sink generators emit into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    operations: Vec<Operation>,
    next_variable: u32,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable handle.
    pub fn new_variable(&mut self) -> Variable {
        let var = Variable(self.next_variable);
        self.next_variable += 1;
        var
    }

    pub fn emit(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn variable_count(&self) -> u32 {
        self.next_variable
    }
}

// ---------------------------------------------------------------------------
// Well-formedness
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ProgramError {
    #[error("operation {index} closes a block that was never opened")]
    #[diagnostic(code(P001))]
    UnbalancedBlock { index: usize },

    #[error("program ends with {open} unclosed block(s)")]
    #[diagnostic(code(P002))]
    UnclosedBlock { open: usize },

    #[error("operation {index} reads {variable} which is not in scope")]
    #[diagnostic(code(P003))]
    UndefinedVariable { index: usize, variable: Variable },

    #[error("operation {index} merges into {variable} which is not a phi")]
    #[diagnostic(code(P004))]
    CopyIntoNonPhi { index: usize, variable: Variable },

    #[error("operation {index} requires context {required} but is emitted in {found}")]
    #[diagnostic(code(P005))]
    IllegalContext {
        index: usize,
        required: ContextSet,
        found: ContextSet,
    },
}

/// One open block during checking.
struct CheckFrame {
    flags: Vec<ContextFlag>,
    defined: FxHashSet<Variable>,
    pending_function: Option<Variable>,
}

impl Program {
    /// Verify block structure, lexical scoping of every variable use, phi
    /// merges, and the context legality of context-restricted operations.
    pub fn check(&self) -> Result<(), ProgramError> {
        let mut frames = vec![CheckFrame {
            flags: Vec::new(),
            defined: FxHashSet::default(),
            pending_function: None,
        }];
        let mut phis = FxHashSet::default();

        for (index, op) in self.operations.iter().enumerate() {
            let visible = |v: &Variable, frames: &[CheckFrame]| {
                frames.iter().any(|f| f.defined.contains(v))
            };
            for input in op.inputs() {
                if !visible(&input, &frames) {
                    return Err(ProgramError::UndefinedVariable {
                        index,
                        variable: input,
                    });
                }
            }
            if let Operation::Copy { target, .. }
            | Operation::BeginFor {
                counter: target, ..
            } = op
                && !phis.contains(target)
            {
                return Err(ProgramError::CopyIntoNonPhi {
                    index,
                    variable: *target,
                });
            }

            let required = required_context(op);
            if !required.is_empty() {
                let mut stack = crate::context::ContextStack::new();
                for flag in frames.iter().flat_map(|f| f.flags.iter()) {
                    stack.push(*flag);
                }
                if !stack.contains_all(required) {
                    return Err(ProgramError::IllegalContext {
                        index,
                        required,
                        found: stack.current(),
                    });
                }
            }

            if op.is_block_end() {
                if frames.len() <= 1 {
                    return Err(ProgramError::UnbalancedBlock { index });
                }
                let closed = frames.pop().ok_or(ProgramError::UnbalancedBlock { index })?;
                if let Some(function) = closed.pending_function
                    && let Some(outer) = frames.last_mut()
                {
                    outer.defined.insert(function);
                }
            }

            if op.is_block_begin() {
                let flags = block_flags(op);
                let mut defined = FxHashSet::default();
                defined.extend(op.inner_outputs());
                let pending_function = match op {
                    Operation::BeginFunction { output, .. } => Some(*output),
                    _ => None,
                };
                frames.push(CheckFrame {
                    flags,
                    defined,
                    pending_function,
                });
            } else if let Some(output) = op.output()
                && let Some(frame) = frames.last_mut()
            {
                frame.defined.insert(output);
                if matches!(op, Operation::Phi { .. }) {
                    phis.insert(output);
                }
            }
        }

        if frames.len() > 1 {
            return Err(ProgramError::UnclosedBlock {
                open: frames.len() - 1,
            });
        }
        Ok(())
    }
}

/// Context an operation may only appear in.
fn required_context(op: &Operation) -> ContextSet {
    match op {
        Operation::Break | Operation::Continue => ContextSet::of(ContextFlag::Loop),
        Operation::Return { .. } => ContextSet::of(ContextFlag::Function),
        Operation::Yield { .. } => ContextSet::of(ContextFlag::Generator),
        Operation::Await { .. } => ContextSet::of(ContextFlag::Async),
        Operation::LoadFromScope { .. } | Operation::StoreToScope { .. } => {
            ContextSet::of(ContextFlag::With)
        }
        _ => ContextSet::EMPTY,
    }
}

/// Flags opened by a block-begin operation. `BeginElse` and `BeginCatch`
/// open plain blocks.
fn block_flags(op: &Operation) -> Vec<ContextFlag> {
    match op {
        Operation::BeginFunction { kind, .. } => kind.context_flags().to_vec(),
        Operation::BeginWhile { .. }
        | Operation::BeginDoWhile
        | Operation::BeginFor { .. }
        | Operation::BeginForIn { .. }
        | Operation::BeginForOf { .. } => vec![ContextFlag::Loop],
        Operation::BeginTry => vec![ContextFlag::Try],
        Operation::BeginWith { .. } => vec![ContextFlag::With],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_variable_is_unique() {
        let mut program = Program::new();
        let a = program.new_variable();
        let b = program.new_variable();
        assert_ne!(a, b);
        assert_eq!(program.variable_count(), 2);
        assert_eq!(a.to_string(), "v0");
    }

    #[test]
    fn check_accepts_well_formed_program() {
        let mut p = Program::new();
        let start = p.new_variable();
        let end = p.new_variable();
        let counter = p.new_variable();
        let next = p.new_variable();
        p.emit(Operation::LoadInt { output: start, value: 0 });
        p.emit(Operation::LoadInt { output: end, value: 3 });
        p.emit(Operation::Phi { output: counter, initial: start });
        p.emit(Operation::BeginWhile {
            lhs: counter,
            comparator: Comparator::LessThan,
            rhs: end,
        });
        p.emit(Operation::Break);
        p.emit(Operation::Unary {
            output: next,
            op: UnaryOperator::Inc,
            value: counter,
        });
        p.emit(Operation::Copy {
            target: counter,
            value: next,
        });
        p.emit(Operation::EndWhile);
        assert_eq!(p.check(), Ok(()));
    }

    #[test]
    fn check_rejects_out_of_scope_use() {
        let mut p = Program::new();
        let obj = p.new_variable();
        let key = p.new_variable();
        let out = p.new_variable();
        p.emit(Operation::CreateObject {
            output: obj,
            properties: vec![],
            spreads: vec![],
        });
        p.emit(Operation::BeginForIn { output: key, object: obj });
        p.emit(Operation::EndForIn);
        p.emit(Operation::TypeOf { output: out, value: key });
        assert!(matches!(
            p.check(),
            Err(ProgramError::UndefinedVariable { variable, .. }) if variable == key
        ));
    }

    #[test]
    fn check_rejects_break_in_function_inside_loop() {
        let mut p = Program::new();
        let cond = p.new_variable();
        let f = p.new_variable();
        p.emit(Operation::LoadBool { output: cond, value: true });
        p.emit(Operation::BeginWhile {
            lhs: cond,
            comparator: Comparator::Equal,
            rhs: cond,
        });
        p.emit(Operation::BeginFunction {
            output: f,
            kind: FunctionKind::Plain,
            parameters: vec![],
            has_rest: false,
        });
        p.emit(Operation::Break);
        p.emit(Operation::EndFunction);
        p.emit(Operation::EndWhile);
        assert!(matches!(
            p.check(),
            Err(ProgramError::IllegalContext { index: 3, .. })
        ));
    }

    #[test]
    fn check_rejects_copy_into_non_phi() {
        let mut p = Program::new();
        let a = p.new_variable();
        let b = p.new_variable();
        p.emit(Operation::LoadInt { output: a, value: 1 });
        p.emit(Operation::LoadInt { output: b, value: 2 });
        p.emit(Operation::Copy { target: a, value: b });
        assert!(matches!(
            p.check(),
            Err(ProgramError::CopyIntoNonPhi { index: 2, .. })
        ));
    }

    #[test]
    fn check_rejects_for_counter_that_is_not_a_phi() {
        let mut p = Program::new();
        let counter = p.new_variable();
        let end = p.new_variable();
        p.emit(Operation::LoadInt { output: counter, value: 0 });
        p.emit(Operation::LoadInt { output: end, value: 3 });
        p.emit(Operation::BeginFor {
            counter,
            comparator: Comparator::LessThan,
            end,
            op: BinaryOperator::Add,
            step: end,
        });
        p.emit(Operation::EndFor);
        assert!(matches!(
            p.check(),
            Err(ProgramError::CopyIntoNonPhi { index: 2, variable }) if variable == counter
        ));
    }

    #[test]
    fn check_rejects_unbalanced_blocks() {
        let mut p = Program::new();
        p.emit(Operation::EndIf);
        assert_eq!(p.check(), Err(ProgramError::UnbalancedBlock { index: 0 }));

        let mut p = Program::new();
        p.emit(Operation::BeginTry);
        assert_eq!(p.check(), Err(ProgramError::UnclosedBlock { open: 1 }));
    }

    #[test]
    fn function_variable_is_visible_after_its_body() {
        let mut p = Program::new();
        let f = p.new_variable();
        let arg = p.new_variable();
        let out = p.new_variable();
        p.emit(Operation::BeginFunction {
            output: f,
            kind: FunctionKind::Arrow,
            parameters: vec![arg],
            has_rest: false,
        });
        p.emit(Operation::Return { value: arg });
        p.emit(Operation::EndFunction);
        p.emit(Operation::CallFunction {
            output: out,
            function: f,
            arguments: vec![],
            spreads: vec![],
        });
        assert_eq!(p.check(), Ok(()));
    }
}
