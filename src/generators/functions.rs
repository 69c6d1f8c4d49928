//! Function definitions, calls, and the context-restricted
//! return/yield/await generators.

use crate::builder::ProgramBuilder;
use crate::context::{ContextFlag, ContextSet};
use crate::error::GenResult;
use crate::profile::GenerationMode;
use crate::program::{FunctionKind, FunctionSignature};
use crate::rule::{CodeGenerator, InputSpec, Inputs, Param, Params};
use crate::types::Capability;

pub(super) fn all() -> Vec<Box<dyn CodeGenerator>> {
    vec![
        Box::new(FunctionDefinition::PLAIN),
        Box::new(FunctionDefinition::STRICT),
        Box::new(FunctionDefinition::ARROW),
        Box::new(FunctionDefinition::GENERATOR),
        Box::new(FunctionDefinition::ASYNC),
        Box::new(FunctionReturn),
        Box::new(Yield),
        Box::new(Await),
        Box::new(MethodCall),
        Box::new(FunctionCall),
        Box::new(ConstructorCall),
        Box::new(FunctionCallWithSpread),
        Box::new(Promise),
    ]
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Defines a function of one kind. The body is a nested generation round
/// followed by a yield or await where the kind allows it, then a return.
pub struct FunctionDefinition {
    name: &'static str,
    kind: FunctionKind,
}

impl FunctionDefinition {
    const PLAIN: Self = Self::new("plain_function", FunctionKind::Plain);
    const STRICT: Self = Self::new("strict_function", FunctionKind::Strict);
    const ARROW: Self = Self::new("arrow_function", FunctionKind::Arrow);
    const GENERATOR: Self = Self::new("generator_function", FunctionKind::Generator);
    const ASYNC: Self = Self::new("async_function", FunctionKind::Async);

    const fn new(name: &'static str, kind: FunctionKind) -> Self {
        Self { name, kind }
    }
}

impl CodeGenerator for FunctionDefinition {
    fn name(&self) -> &'static str {
        self.name
    }

    fn default_weight(&self) -> usize {
        match self.kind {
            FunctionKind::Plain => 10,
            _ => 5,
        }
    }

    /// Generator functions add `delegate`: chance that the closing yield is
    /// `yield*`.
    fn params(&self) -> Vec<Param> {
        let mut params = vec![
            Param::range("parameters", 2, 5),
            Param::prob("rest_parameter", 0.1),
        ];
        if matches!(self.kind, FunctionKind::Generator) {
            params.push(Param::prob("delegate", 0.5));
        }
        params
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("parameters");
        let signature = FunctionSignature {
            parameter_count: b.random_in(min, max),
            has_rest: b.probability(params.prob("rest_parameter")),
        };
        let kind = self.kind;
        let delegate = match kind {
            FunctionKind::Generator => params.prob("delegate"),
            _ => 0.0,
        };
        b.define_function(kind, signature, |b, _| {
            b.generate_recursive()?;
            match kind {
                FunctionKind::Generator => {
                    let value = b.rand_var();
                    let delegate = b.probability(delegate);
                    b.yield_value(value, delegate)?;
                }
                FunctionKind::Async => {
                    let value = b.rand_var();
                    b.await_value(value)?;
                }
                _ => {}
            }
            let value = b.rand_var();
            b.return_value(value)
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context-restricted
// ---------------------------------------------------------------------------

pub struct FunctionReturn;

impl CodeGenerator for FunctionReturn {
    fn name(&self) -> &'static str {
        "function_return"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::Function)
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Anything)
    }

    fn default_weight(&self) -> usize {
        3
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        b.return_value(value)
    }
}

pub struct Yield;

impl CodeGenerator for Yield {
    fn name(&self) -> &'static str {
        "yield"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::Generator)
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Anything)
    }

    /// `delegate`: chance of emitting `yield*` instead of `yield`.
    fn params(&self) -> Vec<Param> {
        vec![Param::prob("delegate", 0.1)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        let delegate = b.probability(params.prob("delegate"));
        b.yield_value(value, delegate)
    }
}

pub struct Await;

impl CodeGenerator for Await {
    fn name(&self) -> &'static str {
        "await"
    }

    fn required_context(&self) -> ContextSet {
        ContextSet::of(ContextFlag::Async)
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Anything)
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let value = inputs.one(self.name(), self.inputs())?;
        b.await_value(value)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

pub struct MethodCall;

impl CodeGenerator for MethodCall {
    fn name(&self) -> &'static str {
        "method_call"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Object)
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
        let object = inputs.one(self.name(), self.inputs())?;
        let method = match b.random_method(object) {
            Some(method) => method,
            None if b.mode() == GenerationMode::Conservative => return Ok(()),
            None => b.gen_method_name(),
        };
        let Some(arguments) = b.generate_method_arguments(object, &method) else {
            return Ok(());
        };
        b.call_method(object, method, arguments);
        Ok(())
    }
}

pub struct FunctionCall;

impl CodeGenerator for FunctionCall {
    fn name(&self) -> &'static str {
        "function_call"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Function)
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let function = inputs.one(self.name(), self.inputs())?;
        let Some(arguments) = b.generate_call_arguments(function) else {
            return Ok(());
        };
        b.call_function(function, arguments);
        Ok(())
    }
}

pub struct ConstructorCall;

impl CodeGenerator for ConstructorCall {
    fn name(&self) -> &'static str {
        "constructor_call"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Constructor)
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let constructor = inputs.one(self.name(), self.inputs())?;
        let Some(arguments) = b.generate_call_arguments(constructor) else {
            return Ok(());
        };
        b.construct(constructor, arguments);
        Ok(())
    }
}

pub struct FunctionCallWithSpread;

impl CodeGenerator for FunctionCallWithSpread {
    fn name(&self) -> &'static str {
        "function_call_with_spread"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity1(Capability::Function)
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::prob("spread", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let function = inputs.one(self.name(), self.inputs())?;
        // Spreading changes the effective arity, so the signature is not used.
        let Some(arguments) = b.generate_unknown_arguments() else {
            return Ok(());
        };
        let spreads = arguments
            .iter()
            .map(|_| b.probability(params.prob("spread")))
            .collect();
        b.call_function_with_spread(function, arguments, spreads);
        Ok(())
    }
}

pub struct Promise;

impl CodeGenerator for Promise {
    fn name(&self) -> &'static str {
        "promise"
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
        let signature = FunctionSignature {
            parameter_count: 2,
            has_rest: false,
        };
        let executor = b.define_function(FunctionKind::Arrow, signature, |b, settle| {
            b.generate_recursive()?;
            let settle = b.choose(settle)?;
            let value = b.rand_var();
            b.call_function(settle, vec![value]);
            Ok(())
        })?;
        let promise = b.load_builtin("Promise");
        b.construct(promise, vec![executor]);
        Ok(())
    }
}
