//! Literal and builtin loads.

use crate::builder::ProgramBuilder;
use crate::error::GenResult;
use crate::rule::{CodeGenerator, Inputs, Param, Params};

pub(super) fn all() -> Vec<Box<dyn CodeGenerator>> {
    vec![
        Box::new(Integer),
        Box::new(BigInt),
        Box::new(RegExp),
        Box::new(Float),
        Box::new(StringLiteral),
        Box::new(Boolean),
        Box::new(Undefined),
        Box::new(Null),
        Box::new(Builtin),
    ]
}

pub struct Integer;

impl CodeGenerator for Integer {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn default_weight(&self) -> usize {
        15
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = b.gen_int();
        b.load_int(value);
        Ok(())
    }
}

pub struct BigInt;

impl CodeGenerator for BigInt {
    fn name(&self) -> &'static str {
        "bigint"
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
        let value = b.gen_int();
        b.load_bigint(value);
        Ok(())
    }
}

pub struct RegExp;

impl CodeGenerator for RegExp {
    fn name(&self) -> &'static str {
        "regexp"
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
        let (pattern, flags) = b.gen_regexp();
        b.load_regexp(pattern, flags);
        Ok(())
    }
}

pub struct Float;

impl CodeGenerator for Float {
    fn name(&self) -> &'static str {
        "float"
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = b.gen_float();
        b.load_float(value);
        Ok(())
    }
}

pub struct StringLiteral;

impl CodeGenerator for StringLiteral {
    fn name(&self) -> &'static str {
        "string"
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = b.gen_string();
        b.load_string(value);
        Ok(())
    }
}

pub struct Boolean;

impl CodeGenerator for Boolean {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::prob("true_probability", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let value = b.probability(params.prob("true_probability"));
        b.load_bool(value);
        Ok(())
    }
}

pub struct Undefined;

impl CodeGenerator for Undefined {
    fn name(&self) -> &'static str {
        "undefined"
    }

    fn default_weight(&self) -> usize {
        3
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        b.load_undefined();
        Ok(())
    }
}

pub struct Null;

impl CodeGenerator for Null {
    fn name(&self) -> &'static str {
        "null"
    }

    fn default_weight(&self) -> usize {
        3
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        b.load_null();
        Ok(())
    }
}

pub struct Builtin;

impl CodeGenerator for Builtin {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let name = b.gen_builtin_name();
        b.load_builtin(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::Step;
    use crate::builder::testing::Fixture;
    use crate::program::Operation;

    fn single_op(name: &str) -> Operation {
        let mut fx = Fixture::new(&[name]);
        let mut b = fx.builder();
        match b.run_generator(name).unwrap() {
            Step::Applied { generator, emitted } => {
                assert_eq!(generator, name);
                assert_eq!(emitted, 1);
            }
            other => panic!("{name}: unexpected {other:?}"),
        }
        b.finish().operations()[0].clone()
    }

    #[test]
    fn literals_emit_one_load() {
        assert!(matches!(single_op("integer"), Operation::LoadInt { .. }));
        assert!(matches!(single_op("bigint"), Operation::LoadBigInt { .. }));
        assert!(matches!(single_op("regexp"), Operation::LoadRegExp { .. }));
        assert!(matches!(single_op("float"), Operation::LoadFloat { .. }));
        assert!(matches!(single_op("string"), Operation::LoadString { .. }));
        assert!(matches!(single_op("boolean"), Operation::LoadBool { .. }));
        assert!(matches!(single_op("undefined"), Operation::LoadUndefined { .. }));
        assert!(matches!(single_op("null"), Operation::LoadNull { .. }));
    }

    #[test]
    fn builtin_loads_a_known_global() {
        match single_op("builtin") {
            Operation::LoadBuiltin { name, .. } => {
                assert!(crate::environment::BUILTINS.contains(&name.as_str()))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn loaded_literal_joins_the_pool() {
        let mut fx = Fixture::new(&["integer"]);
        let mut b = fx.builder();
        b.run_generator("integer").unwrap();
        assert_eq!(b.pool().len(), 1);
    }
}
