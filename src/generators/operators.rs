//! Operators, type tests and explicit phi handling.

use crate::builder::ProgramBuilder;
use crate::environment::TYPE_NAMES;
use crate::error::GenResult;
use crate::program::{BinaryOperator, Comparator, UnaryOperator};
use crate::rule::{CodeGenerator, InputSpec, Inputs, Params};
use crate::types::Capability;

pub(super) fn all() -> Vec<Box<dyn CodeGenerator>> {
    vec![
        Box::new(UnaryOperation),
        Box::new(BinaryOperation),
        Box::new(Comparison),
        Box::new(Phi),
        Box::new(Reassignment),
        Box::new(TypeTest),
        Box::new(InstanceOf),
        Box::new(In),
    ]
}

const ANY: InputSpec = InputSpec::Arity1(Capability::Anything);
const ANY2: InputSpec = InputSpec::Arity2(Capability::Anything, Capability::Anything);

pub struct UnaryOperation;

impl CodeGenerator for UnaryOperation {
    fn name(&self) -> &'static str {
        "unary_operation"
    }

    fn inputs(&self) -> InputSpec {
        ANY
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        let op = b.choose(&UnaryOperator::ALL)?;
        b.unary(op, value);
        Ok(())
    }
}

pub struct BinaryOperation;

impl CodeGenerator for BinaryOperation {
    fn name(&self) -> &'static str {
        "binary_operation"
    }

    fn inputs(&self) -> InputSpec {
        ANY2
    }

    fn default_weight(&self) -> usize {
        15
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let (lhs, rhs) = inputs.two(self.name(), self.inputs())?;
        let op = b.choose(&BinaryOperator::ALL)?;
        b.binary(lhs, op, rhs);
        Ok(())
    }
}

pub struct Comparison;

impl CodeGenerator for Comparison {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn inputs(&self) -> InputSpec {
        ANY2
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let (lhs, rhs) = inputs.two(self.name(), self.inputs())?;
        let comparator = b.choose(&Comparator::ALL)?;
        b.compare(lhs, comparator, rhs);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phis
// ---------------------------------------------------------------------------

pub struct Phi;

impl CodeGenerator for Phi {
    fn name(&self) -> &'static str {
        "phi"
    }

    fn inputs(&self) -> InputSpec {
        ANY
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
        let initial = inputs.one(self.name(), self.inputs())?;
        b.define_phi(initial);
        Ok(())
    }
}

/// Merges the input into a random open phi; does nothing when none is open.
pub struct Reassignment;

impl CodeGenerator for Reassignment {
    fn name(&self) -> &'static str {
        "reassignment"
    }

    fn inputs(&self) -> InputSpec {
        ANY
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        match b.rand_phi() {
            Some(phi) => b.merge_into(phi, value),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Type tests
// ---------------------------------------------------------------------------

pub struct TypeTest;

impl CodeGenerator for TypeTest {
    fn name(&self) -> &'static str {
        "type_test"
    }

    fn inputs(&self) -> InputSpec {
        ANY
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
        let type_name = b.type_of_value(value);
        let expected = b.choose(TYPE_NAMES)?;
        let expected = b.load_string(expected);
        b.compare(type_name, Comparator::StrictEqual, expected);
        Ok(())
    }
}

pub struct InstanceOf;

impl CodeGenerator for InstanceOf {
    fn name(&self) -> &'static str {
        "instance_of"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity2(Capability::Anything, Capability::Constructor)
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
        let (value, constructor) = inputs.two(self.name(), self.inputs())?;
        b.instance_of(value, constructor);
        Ok(())
    }
}

pub struct In;

impl CodeGenerator for In {
    fn name(&self) -> &'static str {
        "in"
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
        let name = match b.random_property(object) {
            Some(name) => name,
            None => b.gen_property_name_for_read(),
        };
        let property = b.load_string(name);
        b.is_in(property, object);
        Ok(())
    }
}
