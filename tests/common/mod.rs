//! Shared helpers for the integration tests: owned builder inputs and a
//! small reference evaluator for the integer/boolean fragment of the IL,
//! including `break` and `continue`.

#![allow(dead_code)]

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;

use proto_stress::program::{BinaryOperator, Comparator, UnaryOperator};
use proto_stress::{
    Catalog, GenerationConfig, Operation, Program, ProgramBuilder, ResolvedParams, Variable,
    resolver,
};

// ---------------------------------------------------------------------------
// Builder inputs
// ---------------------------------------------------------------------------

/// Everything a builder borrows. Fields are borrowed one by one so a test
/// can keep reading the catalog while a builder is alive.
pub struct Parts {
    pub rng: StdRng,
    pub catalog: Catalog,
    pub params: ResolvedParams,
    pub config: GenerationConfig,
}

impl Parts {
    pub fn subset(names: &[&str], seed: u64) -> Self {
        let catalog = Catalog::subset(names).expect("known generator names");
        Self::from_catalog(catalog, seed)
    }

    pub fn standard(seed: u64) -> Self {
        let catalog = Catalog::standard().expect("standard catalog");
        Self::from_catalog(catalog, seed)
    }

    fn from_catalog(catalog: Catalog, seed: u64) -> Self {
        let params = resolver::resolve(&catalog, None);
        Self {
            rng: StdRng::seed_from_u64(seed),
            catalog,
            params,
            config: GenerationConfig::default(),
        }
    }

    pub fn builder(&mut self) -> ProgramBuilder<'_> {
        ProgramBuilder::new(&mut self.rng, &self.catalog, &self.params, &self.config)
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    fn number(self) -> i64 {
        match self {
            Value::Int(n) => n,
            Value::Bool(b) => i64::from(b),
        }
    }

    fn truthy(self) -> bool {
        match self {
            Value::Int(n) => n != 0,
            Value::Bool(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The operation at this index is outside the supported fragment.
    Unsupported(usize),
    Undefined(Variable),
    OutOfFuel,
}

/// One executed `Copy` into a phi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merge {
    pub index: usize,
    pub target: Variable,
    pub value: Value,
}

/// What an evaluation observed.
#[derive(Debug, Default)]
pub struct Trace {
    pub values: HashMap<Variable, Value>,
    /// Executed merges in execution order.
    pub merges: Vec<Merge>,
    /// For every block opener its partner: `BeginIf` to `BeginElse`,
    /// `BeginElse` to `EndIf`, loop heads to their end.
    pub partners: HashMap<usize, usize>,
}

impl Trace {
    pub fn merges_into(&self, phi: Variable) -> Vec<Merge> {
        self.merges
            .iter()
            .copied()
            .filter(|m| m.target == phi)
            .collect()
    }

    pub fn value(&self, var: Variable) -> Option<Value> {
        self.values.get(&var).copied()
    }
}

/// Run `program` with at most `fuel` executed operations.
pub fn evaluate(program: &Program, fuel: usize) -> Result<Trace, EvalError> {
    let ops = program.operations();
    let mut eval = Evaluator {
        ops,
        fuel,
        trace: Trace {
            partners: partners(ops)?,
            ..Trace::default()
        },
    };
    eval.run(0, ops.len())?;
    Ok(eval.trace)
}

fn partners(ops: &[Operation]) -> Result<HashMap<usize, usize>, EvalError> {
    let mut open = Vec::new();
    let mut partners = HashMap::new();
    for (index, op) in ops.iter().enumerate() {
        match op {
            Operation::BeginIf { .. }
            | Operation::BeginWhile { .. }
            | Operation::BeginDoWhile
            | Operation::BeginFor { .. } => open.push(index),
            Operation::BeginElse
            | Operation::EndIf
            | Operation::EndWhile
            | Operation::EndDoWhile { .. }
            | Operation::EndFor => {
                let begin = open.pop().ok_or(EvalError::Unsupported(index))?;
                partners.insert(begin, index);
                if matches!(op, Operation::BeginElse) {
                    open.push(index);
                }
            }
            _ => {}
        }
    }
    Ok(partners)
}

/// How a block was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

enum Next {
    At(usize),
    Leave(Flow),
}

struct Evaluator<'p> {
    ops: &'p [Operation],
    fuel: usize,
    trace: Trace,
}

impl Evaluator<'_> {
    fn get(&self, var: Variable) -> Result<Value, EvalError> {
        self.trace.value(var).ok_or(EvalError::Undefined(var))
    }

    fn partner(&self, index: usize) -> Result<usize, EvalError> {
        self.trace
            .partners
            .get(&index)
            .copied()
            .ok_or(EvalError::Unsupported(index))
    }

    fn compare(
        &self,
        lhs: Variable,
        comparator: Comparator,
        rhs: Variable,
    ) -> Result<bool, EvalError> {
        let (l, r) = (self.get(lhs)?, self.get(rhs)?);
        let same_kind = matches!(
            (l, r),
            (Value::Int(_), Value::Int(_)) | (Value::Bool(_), Value::Bool(_))
        );
        let (a, b) = (l.number(), r.number());
        Ok(match comparator {
            Comparator::Equal => a == b,
            Comparator::StrictEqual => same_kind && a == b,
            Comparator::NotEqual => a != b,
            Comparator::StrictNotEqual => !same_kind || a != b,
            Comparator::LessThan => a < b,
            Comparator::LessThanOrEqual => a <= b,
            Comparator::GreaterThan => a > b,
            Comparator::GreaterThanOrEqual => a >= b,
        })
    }

    /// Execute `ops[start..end]`, stopping early on `break` or `continue`.
    fn run(&mut self, start: usize, end: usize) -> Result<Flow, EvalError> {
        let mut index = start;
        while index < end {
            self.fuel = self.fuel.checked_sub(1).ok_or(EvalError::OutOfFuel)?;
            match self.step(index)? {
                Next::At(next) => index = next,
                Next::Leave(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn add(
        &self,
        lhs: Variable,
        op: BinaryOperator,
        rhs: Variable,
        index: usize,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOperator::Add => {
                let sum = self.get(lhs)?.number().wrapping_add(self.get(rhs)?.number());
                Ok(Value::Int(sum))
            }
            _ => Err(EvalError::Unsupported(index)),
        }
    }

    fn merge(&mut self, index: usize, target: Variable, value: Value) {
        self.trace.values.insert(target, value);
        self.trace.merges.push(Merge {
            index,
            target,
            value,
        });
    }

    /// Execute the operation at `index`.
    fn step(&mut self, index: usize) -> Result<Next, EvalError> {
        let ops = self.ops;
        match &ops[index] {
            Operation::LoadInt { output, value } => {
                self.trace.values.insert(*output, Value::Int(*value));
            }
            Operation::LoadBool { output, value } => {
                self.trace.values.insert(*output, Value::Bool(*value));
            }
            Operation::Phi { output, initial } => {
                let value = self.get(*initial)?;
                self.trace.values.insert(*output, value);
            }
            Operation::Copy { target, value } => {
                let value = self.get(*value)?;
                self.merge(index, *target, value);
            }
            Operation::Unary {
                output,
                op: UnaryOperator::Inc,
                value,
            } => {
                let n = self.get(*value)?.number();
                self.trace.values.insert(*output, Value::Int(n.wrapping_add(1)));
            }
            Operation::Binary {
                output,
                lhs,
                op,
                rhs,
            } => {
                let value = self.add(*lhs, *op, *rhs, index)?;
                self.trace.values.insert(*output, value);
            }
            Operation::Compare {
                output,
                lhs,
                comparator,
                rhs,
            } => {
                let result = self.compare(*lhs, *comparator, *rhs)?;
                self.trace.values.insert(*output, Value::Bool(result));
            }
            Operation::Break => return Ok(Next::Leave(Flow::Break)),
            Operation::Continue => return Ok(Next::Leave(Flow::Continue)),
            Operation::BeginIf { condition } => {
                let else_index = self.partner(index)?;
                let end_index = self.partner(else_index)?;
                let flow = if self.get(*condition)?.truthy() {
                    self.run(index + 1, else_index)?
                } else {
                    self.run(else_index + 1, end_index)?
                };
                if flow != Flow::Normal {
                    return Ok(Next::Leave(flow));
                }
                return Ok(Next::At(end_index + 1));
            }
            Operation::BeginWhile {
                lhs,
                comparator,
                rhs,
            } => {
                let end_index = self.partner(index)?;
                while self.compare(*lhs, *comparator, *rhs)? {
                    if self.run(index + 1, end_index)? == Flow::Break {
                        break;
                    }
                }
                return Ok(Next::At(end_index + 1));
            }
            Operation::BeginDoWhile => {
                let end_index = self.partner(index)?;
                let Operation::EndDoWhile {
                    lhs,
                    comparator,
                    rhs,
                } = &ops[end_index]
                else {
                    return Err(EvalError::Unsupported(end_index));
                };
                loop {
                    if self.run(index + 1, end_index)? == Flow::Break {
                        break;
                    }
                    if !self.compare(*lhs, *comparator, *rhs)? {
                        break;
                    }
                }
                return Ok(Next::At(end_index + 1));
            }
            Operation::BeginFor {
                counter,
                comparator,
                end,
                op,
                step,
            } => {
                let end_index = self.partner(index)?;
                while self.compare(*counter, *comparator, *end)? {
                    if self.run(index + 1, end_index)? == Flow::Break {
                        break;
                    }
                    let next = self.add(*counter, *op, *step, index)?;
                    self.merge(index, *counter, next);
                }
                return Ok(Next::At(end_index + 1));
            }
            _ => return Err(EvalError::Unsupported(index)),
        }
        Ok(Next::At(index + 1))
    }
}
