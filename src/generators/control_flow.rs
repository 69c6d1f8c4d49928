//! Branches, loops, exception handling and `with` scopes.
//!
//! Every construct with more than one path into its end defines a phi
//! first, seals it for the duration of the construct, and merges into it
//! exactly once at the end of each path.

use crate::builder::ProgramBuilder;
use crate::context::{ContextFlag, ContextSet};
use crate::error::GenResult;
use crate::program::{BinaryOperator, Comparator, UnaryOperator, Variable};
use crate::rule::{CodeGenerator, InputSpec, Inputs, Param, Params};
use crate::types::Capability;

pub(super) fn all() -> Vec<Box<dyn CodeGenerator>> {
    vec![
        Box::new(IfElse),
        Box::new(WhileLoop),
        Box::new(DoWhileLoop),
        Box::new(ForLoop),
        Box::new(ForInLoop),
        Box::new(ForOfLoop),
        Box::new(Break),
        Box::new(Continue),
        Box::new(TryCatch),
        Box::new(Throw),
        Box::new(WithStatement),
        Box::new(LoadFromScope),
        Box::new(StoreToScope),
    ]
}

/// A nested body followed by the path's single merge into `phi`.
fn merging_body(b: &mut ProgramBuilder<'_>, phi: Variable) -> GenResult<()> {
    b.generate_recursive()?;
    let value = b.rand_var();
    b.merge_into(phi, value)
}

/// A nested body that advances the loop counter before anything else, so a
/// `continue` generated inside it cannot skip the update.
fn counting_body(b: &mut ProgramBuilder<'_>, counter: Variable) -> GenResult<()> {
    let next = b.unary(UnaryOperator::Inc, counter);
    b.merge_into(counter, next)?;
    b.generate_recursive()?;
    Ok(())
}

/// Loop bound drawn from the `iterations` range.
fn loop_bounds(b: &mut ProgramBuilder<'_>, params: &Params) -> (Variable, Variable) {
    let (min, max) = params.range("iterations");
    let iterations = b.random_in(min, max) as i64;
    let start = b.load_int(0);
    let end = b.load_int(iterations);
    (start, end)
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

pub struct IfElse;

impl CodeGenerator for IfElse {
    fn name(&self) -> &'static str {
        "if_else"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Boolean)
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let condition = inputs.one(self.name(), self.inputs())?;
        let initial = b.rand_var();
        let phi = b.define_phi(initial);
        b.sealed(phi, |b| {
            b.if_else(
                condition,
                |b| merging_body(b, phi),
                |b| merging_body(b, phi),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

pub struct WhileLoop;

impl CodeGenerator for WhileLoop {
    fn name(&self) -> &'static str {
        "while_loop"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("iterations", 0, 10)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (start, end) = loop_bounds(b, params);
        let counter = b.define_phi(start);
        b.sealed(counter, |b| {
            b.while_loop(counter, Comparator::LessThan, end, |b| {
                counting_body(b, counter)
            })
        })
    }
}

pub struct DoWhileLoop;

impl CodeGenerator for DoWhileLoop {
    fn name(&self) -> &'static str {
        "do_while_loop"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("iterations", 0, 10)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (start, end) = loop_bounds(b, params);
        let counter = b.define_phi(start);
        b.sealed(counter, |b| {
            b.do_while_loop(counter, Comparator::LessThan, end, |b| {
                counting_body(b, counter)
            })
        })
    }
}

pub struct ForLoop;

impl CodeGenerator for ForLoop {
    fn name(&self) -> &'static str {
        "for_loop"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("iterations", 0, 10)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (start, end) = loop_bounds(b, params);
        let step = b.load_int(1);
        b.for_loop(
            start,
            Comparator::LessThan,
            end,
            BinaryOperator::Add,
            step,
            |b, _| b.generate_recursive().map(|_| ()),
        )?;
        Ok(())
    }
}

pub struct ForInLoop;

impl CodeGenerator for ForInLoop {
    fn name(&self) -> &'static str {
        "for_in_loop"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Object)
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        b.for_in_loop(object, |b, _| b.generate_recursive().map(|_| ()))
    }
}

pub struct ForOfLoop;

impl CodeGenerator for ForOfLoop {
    fn name(&self) -> &'static str {
        "for_of_loop"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Object)
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let iterable = inputs.one(self.name(), self.inputs())?;
        b.for_of_loop(iterable, |b, _| b.generate_recursive().map(|_| ()))
    }
}

pub struct Break;

impl CodeGenerator for Break {
    fn name(&self) -> &'static str {
        "break"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::Loop)
    }

    fn default_weight(&self) -> usize {
        2
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        b.break_loop()
    }
}

pub struct Continue;

impl CodeGenerator for Continue {
    fn name(&self) -> &'static str {
        "continue"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::Loop)
    }

    fn default_weight(&self) -> usize {
        2
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        b.continue_loop()
    }
}

// ---------------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------------

pub struct TryCatch;

impl CodeGenerator for TryCatch {
    fn name(&self) -> &'static str {
        "try_catch"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let initial = b.rand_var();
        let phi = b.define_phi(initial);
        b.sealed(phi, |b| {
            b.try_catch(|b| merging_body(b, phi), |b, _| merging_body(b, phi))
        })
    }
}

pub struct Throw;

impl CodeGenerator for Throw {
    fn name(&self) -> &'static str {
        "throw"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Anything)
    }

    fn default_weight(&self) -> usize {
        1
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        b.throw(value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// `with` scopes
// ---------------------------------------------------------------------------

pub struct WithStatement;

impl CodeGenerator for WithStatement {
    fn name(&self) -> &'static str {
        "with_statement"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Object)
    }

    fn default_weight(&self) -> usize {
        2
    }

    /// `load`: chance the body opens with a scope load rather than a store.
    fn params(&self) -> Vec<Param> {
        vec![Param::prob("load", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let load = b.probability(params.prob("load"));
        let name = match b.random_property(object) {
            Some(name) => name,
            None => b.gen_property_name_for_read(),
        };
        b.with_statement(object, |b| {
            if load {
                b.load_from_scope(name)?;
            } else {
                let value = b.rand_var();
                b.store_to_scope(name, value)?;
            }
            b.generate_recursive()?;
            Ok(())
        })
    }
}

pub struct LoadFromScope;

impl CodeGenerator for LoadFromScope {
    fn name(&self) -> &'static str {
        "load_from_scope"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::With)
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let name = b.gen_property_name_for_read();
        b.load_from_scope(name)?;
        Ok(())
    }
}

pub struct StoreToScope;

impl CodeGenerator for StoreToScope {
    fn name(&self) -> &'static str {
        "store_to_scope"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::With)
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Anything)
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        let name = b.gen_property_name_for_write();
        b.store_to_scope(name, value)
    }
}
