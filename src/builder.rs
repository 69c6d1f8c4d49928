//! The [`ProgramBuilder`] -- selection and execution engine plus the
//! emission surface generators write through.
//!
//! A builder owns everything one program needs: the random source, the
//! program under construction, the context stack, the variable pool and the
//! type oracle. Nothing is shared between builders, so independent programs
//! can be generated on independent threads.
//!
//! Generators never touch the context stack or the pool directly. Nested
//! bodies go through the block helpers ([`if_else`](ProgramBuilder::if_else),
//! [`while_loop`](ProgramBuilder::while_loop), ...), which push the body's
//! flags, open a variable scope, run the body and undo both in LIFO order.

use rand::RngCore;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::context::{ContextFlag, ContextSet, ContextStack};
use crate::environment;
use crate::error::{GenError, GenResult};
use crate::profile::{GenerationConfig, GenerationMode, SelectionPolicy};
use crate::program::{
    BinaryOperator, Comparator, FunctionKind, FunctionSignature, Operation, Program,
    UnaryOperator, Variable,
};
use crate::random;
use crate::resolver::ResolvedParams;
use crate::rule::{CodeGenerator, InputSpec, Inputs};
use crate::types::{Capability, TypeOracle, TypeTracker, ValueType};
use crate::variables::VariablePool;

// ---------------------------------------------------------------------------
// Step outcome
// ---------------------------------------------------------------------------

/// Result of one selection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A generator ran and emitted `emitted` operations.
    Applied {
        generator: &'static str,
        emitted: usize,
    },
    /// A generator ran and elected to emit nothing.
    NoOp { generator: &'static str },
    /// No generator was eligible at this point.
    Inapplicable,
}

impl Step {
    pub fn is_applied(self) -> bool {
        matches!(self, Step::Applied { .. })
    }
}

/// Variables matching each capability at one generation point.
struct CandidateIndex {
    slots: [Vec<Variable>; 5],
    pool_empty: bool,
}

impl CandidateIndex {
    fn slot(capability: Capability) -> usize {
        match capability {
            Capability::Anything => 0,
            Capability::Object => 1,
            Capability::Function => 2,
            Capability::Constructor => 3,
            Capability::Boolean => 4,
        }
    }

    fn matches(&self, capability: Capability) -> &[Variable] {
        &self.slots[Self::slot(capability)]
    }

    /// Whether every slot of `spec` can be filled.
    fn admits(&self, spec: InputSpec) -> bool {
        spec.slots().into_iter().all(|cap| {
            !self.matches(cap).is_empty() || (cap == Capability::Anything && self.pool_empty)
        })
    }
}

// ---------------------------------------------------------------------------
// ProgramBuilder
// ---------------------------------------------------------------------------

pub struct ProgramBuilder<'a> {
    rng: &'a mut dyn RngCore,
    catalog: &'a Catalog,
    params: &'a ResolvedParams,
    config: &'a GenerationConfig,
    program: Program,
    types: Box<dyn TypeOracle + 'a>,
    context: ContextStack,
    pool: VariablePool,
    /// Remaining nesting allowance for `generate_recursive`.
    budget: usize,
    nesting: usize,
    deepest_nesting: usize,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(
        rng: &'a mut dyn RngCore,
        catalog: &'a Catalog,
        params: &'a ResolvedParams,
        config: &'a GenerationConfig,
    ) -> Self {
        Self {
            rng,
            catalog,
            params,
            config,
            program: Program::new(),
            types: Box::new(TypeTracker::new()),
            context: ContextStack::new(),
            pool: VariablePool::new(),
            budget: config.recursion_budget,
            nesting: 0,
            deepest_nesting: 0,
        }
    }

    /// Replace the default [`TypeTracker`] with another oracle.
    pub fn with_oracle(mut self, oracle: Box<dyn TypeOracle + 'a>) -> Self {
        self.types = oracle;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn finish(self) -> Program {
        self.program
    }

    pub fn context(&self) -> &ContextStack {
        &self.context
    }

    pub fn current_context(&self) -> ContextSet {
        self.context.current()
    }

    pub fn pool(&self) -> &VariablePool {
        &self.pool
    }

    pub fn config(&self) -> &GenerationConfig {
        self.config
    }

    pub fn mode(&self) -> GenerationMode {
        self.config.mode
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn nesting(&self) -> usize {
        self.nesting
    }

    /// Deepest nesting of `generate_recursive` reached so far.
    pub fn deepest_nesting(&self) -> usize {
        self.deepest_nesting
    }
}

// ---------------------------------------------------------------------------
// Selection and execution
// ---------------------------------------------------------------------------

impl<'a> ProgramBuilder<'a> {
    /// Try to apply exactly one generator.
    ///
    /// Filters the catalog by context, drops generators whose inputs cannot
    /// be drawn or whose weight is zero, selects one by the configured
    /// policy, draws its inputs and runs it. An empty candidate set is
    /// [`Step::Inapplicable`], never an error.
    pub fn run_one_step(&mut self) -> GenResult<Step> {
        let catalog: &'a Catalog = self.catalog;
        let params: &'a ResolvedParams = self.params;
        let current = self.context.current();
        let index = self.candidate_index();

        let mut candidates: Vec<(&'a dyn CodeGenerator, usize)> = Vec::new();
        for generator in catalog.iter() {
            if !generator.required_context().is_subset_of(current) {
                continue;
            }
            let weight = params.for_rule(generator.name()).weight();
            if weight == 0 {
                continue;
            }
            if !index.admits(generator.inputs()) {
                trace!(generator = generator.name(), "no instantiable inputs");
                continue;
            }
            candidates.push((generator, weight));
        }

        if candidates.is_empty() {
            trace!(context = %current, "no eligible generator");
            return Ok(Step::Inapplicable);
        }

        let (generator, _) = match self.config.selection {
            SelectionPolicy::Uniform => *random::choose_uniform(&mut *self.rng, &candidates)?,
            SelectionPolicy::Weighted => {
                *random::choose_weighted(&mut *self.rng, &candidates, |(_, w)| *w)?
            }
        };

        let inputs = self.draw_inputs(generator.inputs(), &index)?;
        self.execute(generator, inputs)
    }

    /// Names of the generators `run_one_step` could pick right now.
    pub fn eligible_generators(&self) -> Vec<&'static str> {
        let current = self.context.current();
        let index = self.candidate_index();
        self.catalog
            .iter()
            .filter(|g| g.required_context().is_subset_of(current))
            .filter(|g| self.params.for_rule(g.name()).weight() > 0)
            .filter(|g| index.admits(g.inputs()))
            .map(|g| g.name())
            .collect()
    }

    /// Run the named generator with freshly drawn inputs.
    ///
    /// Unknown names fail before anything is emitted. A generator whose
    /// inputs cannot be drawn yields [`Step::Inapplicable`]; one whose
    /// context is not in effect is a [`GenError::ContextViolation`].
    pub fn run_generator(&mut self, name: &str) -> GenResult<Step> {
        let catalog: &'a Catalog = self.catalog;
        let generator = catalog.lookup(name)?;
        self.check_context(generator)?;
        let index = self.candidate_index();
        if !index.admits(generator.inputs()) {
            return Ok(Step::Inapplicable);
        }
        let inputs = self.draw_inputs(generator.inputs(), &index)?;
        self.execute(generator, inputs)
    }

    /// Run the named generator on caller-chosen inputs.
    pub fn run_generator_with(&mut self, name: &str, inputs: Inputs) -> GenResult<Step> {
        let catalog: &'a Catalog = self.catalog;
        let generator = catalog.lookup(name)?;
        let spec = generator.inputs();
        let slots = spec.slots();
        let vars = inputs.to_vec();
        let fits = slots.len() == vars.len()
            && slots.iter().zip(&vars).all(|(cap, var)| {
                self.pool.contains(*var) && cap.admits(&self.types.type_of(*var))
            });
        if !fits {
            return Err(GenError::InputMismatch {
                generator: name.to_string(),
                expected: spec,
                found: inputs.to_string(),
            });
        }
        self.execute(generator, inputs)
    }

    /// Generate a nested body: a bounded number of engine steps one level
    /// deeper.
    ///
    /// With no budget left this returns immediately having run nothing; the
    /// calling generator carries on. Steps also stop once the program holds
    /// `program_size` operations. Returns the number of steps that applied a
    /// generator.
    pub fn generate_recursive(&mut self) -> GenResult<usize> {
        if self.budget == 0 {
            trace!(nesting = self.nesting, "recursion budget exhausted");
            return Ok(0);
        }
        self.budget -= 1;
        self.nesting += 1;
        self.deepest_nesting = self.deepest_nesting.max(self.nesting);

        let (min, max) = self.config.recursive_steps;
        let steps = random::random_in(&mut *self.rng, min, max);
        let mut applied = 0;
        for _ in 0..steps {
            if self.program.len() >= self.config.program_size {
                trace!(size = self.program.len(), "program size reached, nested steps stop");
                break;
            }
            if self.run_one_step()?.is_applied() {
                applied += 1;
            }
        }

        self.nesting -= 1;
        self.budget += 1;
        Ok(applied)
    }

    fn check_context(&self, generator: &dyn CodeGenerator) -> GenResult<()> {
        let required = generator.required_context();
        let current = self.context.current();
        if required.is_subset_of(current) {
            Ok(())
        } else {
            Err(GenError::ContextViolation {
                generator: generator.name().to_string(),
                required,
                current,
            })
        }
    }

    fn execute(&mut self, generator: &dyn CodeGenerator, inputs: Inputs) -> GenResult<Step> {
        self.check_context(generator)?;
        let params: &'a ResolvedParams = self.params;
        let before = self.program.len();
        generator.generate(self, inputs, params.for_rule(generator.name()))?;
        let emitted = self.program.len() - before;
        if emitted == 0 {
            trace!(generator = generator.name(), "elective no-op");
            Ok(Step::NoOp {
                generator: generator.name(),
            })
        } else {
            debug!(
                generator = generator.name(),
                emitted,
                nesting = self.nesting,
                "applied generator"
            );
            Ok(Step::Applied {
                generator: generator.name(),
                emitted,
            })
        }
    }

    fn candidate_index(&self) -> CandidateIndex {
        let mut slots: [Vec<Variable>; 5] = Default::default();
        let capabilities = [
            Capability::Anything,
            Capability::Object,
            Capability::Function,
            Capability::Constructor,
            Capability::Boolean,
        ];
        for var in self.pool.visible() {
            let ty = self.types.type_of(var);
            for cap in capabilities {
                if cap.admits(&ty) {
                    slots[CandidateIndex::slot(cap)].push(var);
                }
            }
        }
        CandidateIndex {
            slots,
            pool_empty: self.pool.is_empty(),
        }
    }

    fn draw_inputs(&mut self, spec: InputSpec, index: &CandidateIndex) -> GenResult<Inputs> {
        let mut drawn = Vec::with_capacity(spec.arity());
        for cap in spec.slots() {
            let matches = index.matches(cap);
            let var = if matches.is_empty() && cap == Capability::Anything {
                self.synthesize_value()
            } else {
                *random::choose_uniform(&mut *self.rng, matches)?
            };
            drawn.push(var);
        }
        Inputs::from_slice(&drawn).ok_or(GenError::EmptyDomain)
    }

    /// Fresh literal used when the pool has nothing to offer.
    fn synthesize_value(&mut self) -> Variable {
        let value = self.gen_int();
        self.load_int(value)
    }
}

// ---------------------------------------------------------------------------
// Randomness and naming
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    pub fn probability(&mut self, p: f64) -> bool {
        random::probability(&mut *self.rng, p)
    }

    pub fn random_in(&mut self, min: usize, max: usize) -> usize {
        random::random_in(&mut *self.rng, min, max)
    }

    pub fn choose<T: Clone>(&mut self, items: &[T]) -> GenResult<T> {
        random::choose_uniform(&mut *self.rng, items).cloned()
    }

    pub fn gen_int(&mut self) -> i64 {
        if self.probability(0.5) {
            let i = self.random_in(0, environment::INTERESTING_INTEGERS.len() - 1);
            environment::INTERESTING_INTEGERS[i]
        } else {
            self.random_in(0, 0x1000) as i64 - 0x800
        }
    }

    pub fn gen_float(&mut self) -> f64 {
        if self.probability(0.5) {
            let i = self.random_in(0, environment::INTERESTING_FLOATS.len() - 1);
            environment::INTERESTING_FLOATS[i]
        } else {
            self.gen_int() as f64 + self.random_in(0, 1000) as f64 / 1000.0
        }
    }

    pub fn gen_string(&mut self) -> String {
        if self.probability(0.5) {
            let i = self.random_in(0, environment::INTERESTING_STRINGS.len() - 1);
            environment::INTERESTING_STRINGS[i].to_string()
        } else {
            const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
            let len = self.random_in(1, 8);
            (0..len)
                .map(|_| ALPHABET[self.random_in(0, ALPHABET.len() - 1)] as char)
                .collect()
        }
    }

    /// Pattern and flags of a regular expression literal.
    pub fn gen_regexp(&mut self) -> (String, String) {
        let p = self.random_in(0, environment::REGEXP_PATTERNS.len() - 1);
        let f = self.random_in(0, environment::REGEXP_FLAGS.len() - 1);
        (
            environment::REGEXP_PATTERNS[p].to_string(),
            environment::REGEXP_FLAGS[f].to_string(),
        )
    }

    /// An array index, usually small.
    pub fn gen_index(&mut self) -> i64 {
        if self.probability(0.8) {
            self.random_in(0, 10) as i64
        } else {
            self.gen_int()
        }
    }

    pub fn gen_property_name_for_read(&mut self) -> String {
        let i = self.random_in(0, environment::READ_PROPERTY_NAMES.len() - 1);
        environment::READ_PROPERTY_NAMES[i].to_string()
    }

    pub fn gen_property_name_for_write(&mut self) -> String {
        let i = self.random_in(0, environment::WRITE_PROPERTY_NAMES.len() - 1);
        environment::WRITE_PROPERTY_NAMES[i].to_string()
    }

    pub fn gen_method_name(&mut self) -> String {
        let i = self.random_in(0, environment::METHOD_NAMES.len() - 1);
        environment::METHOD_NAMES[i].to_string()
    }

    pub fn gen_builtin_name(&mut self) -> String {
        let i = self.random_in(0, environment::BUILTINS.len() - 1);
        environment::BUILTINS[i].to_string()
    }
}

// ---------------------------------------------------------------------------
// Variable access and type queries
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    /// A random visible variable, synthesizing a literal if there is none.
    pub fn rand_var(&mut self) -> Variable {
        let visible: Vec<Variable> = self.pool.visible().collect();
        match random::choose_uniform(&mut *self.rng, &visible) {
            Ok(var) => *var,
            Err(_) => self.synthesize_value(),
        }
    }

    /// A random visible variable admitted by `capability`, if any.
    pub fn rand_var_of(&mut self, capability: Capability) -> Option<Variable> {
        let matches: Vec<Variable> = self
            .pool
            .visible()
            .filter(|v| capability.admits(&self.types.type_of(*v)))
            .collect();
        random::choose_uniform(&mut *self.rng, &matches).ok().copied()
    }

    /// A random phi that is open for reassignment, if any.
    pub fn rand_phi(&mut self) -> Option<Variable> {
        let phis = self.pool.open_phis();
        random::choose_uniform(&mut *self.rng, &phis).ok().copied()
    }

    pub fn type_of(&self, var: Variable) -> ValueType {
        self.types.type_of(var)
    }

    pub fn random_property(&mut self, var: Variable) -> Option<String> {
        self.types.random_property(var, &mut *self.rng)
    }

    pub fn random_method(&mut self, var: Variable) -> Option<String> {
        self.types.random_method(var, &mut *self.rng)
    }

    /// Arguments for calling `function`.
    ///
    /// Follows the function's signature when one is known. Without one, the
    /// aggressive mode draws a few arbitrary arguments and the conservative
    /// mode declines with `None`.
    pub fn generate_call_arguments(&mut self, function: Variable) -> Option<Vec<Variable>> {
        let count = match self.type_of(function).signature() {
            Some(FunctionSignature {
                parameter_count,
                has_rest,
            }) => {
                let extra = if has_rest { self.random_in(0, 2) } else { 0 };
                parameter_count + extra
            }
            None => self.unknown_arity()?,
        };
        Some((0..count).map(|_| self.rand_var()).collect())
    }

    /// Arguments for a method call. Methods known on the receiver are called
    /// freely; unknown ones follow the same rule as unknown signatures.
    pub fn generate_method_arguments(
        &mut self,
        object: Variable,
        method: &str,
    ) -> Option<Vec<Variable>> {
        let known = self.type_of(object).methods().iter().any(|m| m == method);
        let count = if known {
            self.random_in(0, 3)
        } else {
            self.unknown_arity()?
        };
        Some((0..count).map(|_| self.rand_var()).collect())
    }

    /// Arguments for a callee whose signature is deliberately ignored.
    pub fn generate_unknown_arguments(&mut self) -> Option<Vec<Variable>> {
        let count = self.unknown_arity()?;
        Some((0..count).map(|_| self.rand_var()).collect())
    }

    fn unknown_arity(&mut self) -> Option<usize> {
        match self.mode() {
            GenerationMode::Conservative => None,
            GenerationMode::Aggressive => Some(self.random_in(0, 3)),
        }
    }

    /// Fail unless `flag` is in effect.
    pub fn require_context(&self, flag: ContextFlag, operation: &str) -> GenResult<()> {
        let current = self.context.current();
        if current.contains(flag) {
            Ok(())
        } else {
            Err(GenError::ContextViolation {
                generator: operation.to_string(),
                required: ContextSet::of(flag),
                current,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Emission: values
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    fn append(&mut self, op: Operation) {
        self.types.observe(&op);
        self.program.emit(op);
    }

    /// Emit an operation defining a fresh variable in the current scope.
    fn define(&mut self, build: impl FnOnce(Variable) -> Operation) -> Variable {
        let output = self.program.new_variable();
        self.append(build(output));
        self.pool.add(output);
        output
    }

    pub fn load_int(&mut self, value: i64) -> Variable {
        self.define(|output| Operation::LoadInt { output, value })
    }

    pub fn load_bigint(&mut self, value: i64) -> Variable {
        self.define(|output| Operation::LoadBigInt { output, value })
    }

    pub fn load_float(&mut self, value: f64) -> Variable {
        self.define(|output| Operation::LoadFloat { output, value })
    }

    pub fn load_string(&mut self, value: impl Into<String>) -> Variable {
        let value = value.into();
        self.define(|output| Operation::LoadString { output, value })
    }

    pub fn load_bool(&mut self, value: bool) -> Variable {
        self.define(|output| Operation::LoadBool { output, value })
    }

    pub fn load_undefined(&mut self) -> Variable {
        self.define(|output| Operation::LoadUndefined { output })
    }

    pub fn load_null(&mut self) -> Variable {
        self.define(|output| Operation::LoadNull { output })
    }

    pub fn load_regexp(&mut self, pattern: String, flags: String) -> Variable {
        self.define(|output| Operation::LoadRegExp {
            output,
            pattern,
            flags,
        })
    }

    pub fn load_builtin(&mut self, name: impl Into<String>) -> Variable {
        let name = name.into();
        self.define(|output| Operation::LoadBuiltin { output, name })
    }

    pub fn create_object(&mut self, properties: Vec<(String, Variable)>) -> Variable {
        self.create_object_with_spread(properties, Vec::new())
    }

    pub fn create_object_with_spread(
        &mut self,
        properties: Vec<(String, Variable)>,
        spreads: Vec<Variable>,
    ) -> Variable {
        self.define(|output| Operation::CreateObject {
            output,
            properties,
            spreads,
        })
    }

    pub fn create_array(&mut self, elements: Vec<Variable>) -> Variable {
        let spreads = vec![false; elements.len()];
        self.create_array_with_spread(elements, spreads)
    }

    pub fn create_array_with_spread(
        &mut self,
        elements: Vec<Variable>,
        spreads: Vec<bool>,
    ) -> Variable {
        self.define(|output| Operation::CreateArray {
            output,
            elements,
            spreads,
        })
    }
}

// ---------------------------------------------------------------------------
// Emission: property access, calls and operators
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    pub fn load_property(&mut self, object: Variable, name: impl Into<String>) -> Variable {
        let name = name.into();
        self.define(|output| Operation::LoadProperty {
            output,
            object,
            name,
        })
    }

    pub fn store_property(&mut self, object: Variable, name: impl Into<String>, value: Variable) {
        self.append(Operation::StoreProperty {
            object,
            name: name.into(),
            value,
        });
    }

    pub fn delete_property(&mut self, object: Variable, name: impl Into<String>) {
        self.append(Operation::DeleteProperty {
            object,
            name: name.into(),
        });
    }

    pub fn load_element(&mut self, object: Variable, index: i64) -> Variable {
        self.define(|output| Operation::LoadElement {
            output,
            object,
            index,
        })
    }

    pub fn store_element(&mut self, object: Variable, index: i64, value: Variable) {
        self.append(Operation::StoreElement {
            object,
            index,
            value,
        });
    }

    pub fn delete_element(&mut self, object: Variable, index: i64) {
        self.append(Operation::DeleteElement { object, index });
    }

    pub fn load_computed_property(&mut self, object: Variable, name: Variable) -> Variable {
        self.define(|output| Operation::LoadComputedProperty {
            output,
            object,
            name,
        })
    }

    pub fn store_computed_property(&mut self, object: Variable, name: Variable, value: Variable) {
        self.append(Operation::StoreComputedProperty {
            object,
            name,
            value,
        });
    }

    pub fn delete_computed_property(&mut self, object: Variable, name: Variable) {
        self.append(Operation::DeleteComputedProperty { object, name });
    }

    pub fn type_of_value(&mut self, value: Variable) -> Variable {
        self.define(|output| Operation::TypeOf { output, value })
    }

    pub fn instance_of(&mut self, value: Variable, constructor: Variable) -> Variable {
        self.define(|output| Operation::InstanceOf {
            output,
            value,
            constructor,
        })
    }

    pub fn is_in(&mut self, property: Variable, object: Variable) -> Variable {
        self.define(|output| Operation::In {
            output,
            property,
            object,
        })
    }

    pub fn call_method(
        &mut self,
        object: Variable,
        method: impl Into<String>,
        arguments: Vec<Variable>,
    ) -> Variable {
        let method = method.into();
        self.define(|output| Operation::CallMethod {
            output,
            object,
            method,
            arguments,
        })
    }

    pub fn call_function(&mut self, function: Variable, arguments: Vec<Variable>) -> Variable {
        let spreads = vec![false; arguments.len()];
        self.call_function_with_spread(function, arguments, spreads)
    }

    pub fn call_function_with_spread(
        &mut self,
        function: Variable,
        arguments: Vec<Variable>,
        spreads: Vec<bool>,
    ) -> Variable {
        self.define(|output| Operation::CallFunction {
            output,
            function,
            arguments,
            spreads,
        })
    }

    pub fn construct(&mut self, constructor: Variable, arguments: Vec<Variable>) -> Variable {
        self.define(|output| Operation::Construct {
            output,
            constructor,
            arguments,
        })
    }

    pub fn unary(&mut self, op: UnaryOperator, value: Variable) -> Variable {
        self.define(|output| Operation::Unary { output, op, value })
    }

    pub fn binary(&mut self, lhs: Variable, op: BinaryOperator, rhs: Variable) -> Variable {
        self.define(|output| Operation::Binary {
            output,
            lhs,
            op,
            rhs,
        })
    }

    pub fn compare(&mut self, lhs: Variable, comparator: Comparator, rhs: Variable) -> Variable {
        self.define(|output| Operation::Compare {
            output,
            lhs,
            comparator,
            rhs,
        })
    }

    pub fn throw(&mut self, value: Variable) {
        self.append(Operation::Throw { value });
    }
}

// ---------------------------------------------------------------------------
// Phis
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    /// Define a join-point variable seeded with `initial`.
    pub fn define_phi(&mut self, initial: Variable) -> Variable {
        let output = self.program.new_variable();
        self.append(Operation::Phi { output, initial });
        self.pool.add_phi(output);
        output
    }

    /// Merge `value` into `phi` at the end of the current path.
    pub fn merge_into(&mut self, phi: Variable, value: Variable) -> GenResult<()> {
        if !self.pool.is_phi(phi) || !self.pool.contains(phi) {
            return Err(GenError::NotAPhi { variable: phi });
        }
        self.append(Operation::Copy { target: phi, value });
        Ok(())
    }

    /// Run `f` with `phi` protected from the reassignment generator.
    ///
    /// Control-flow constructs seal their own phi so that each path merges
    /// into it exactly once.
    pub fn sealed<T>(
        &mut self,
        phi: Variable,
        f: impl FnOnce(&mut Self) -> GenResult<T>,
    ) -> GenResult<T> {
        let was_sealed = self.pool.is_sealed(phi);
        self.pool.seal(phi);
        let result = f(self)?;
        if !was_sealed {
            self.pool.unseal(phi);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Nested bodies
// ---------------------------------------------------------------------------

impl ProgramBuilder<'_> {
    /// Run `body` with `flags` pushed and a fresh variable scope open.
    pub fn nested<T>(
        &mut self,
        flags: &[ContextFlag],
        body: impl FnOnce(&mut Self) -> GenResult<T>,
    ) -> GenResult<T> {
        for flag in flags {
            self.context.push(*flag);
        }
        self.pool.open_scope();
        let result = body(self)?;
        self.pool.close_scope()?;
        for flag in flags.iter().rev() {
            self.context.pop(*flag)?;
        }
        Ok(result)
    }

    /// Define a function and return the variable holding it.
    ///
    /// `body` receives the parameter variables. The function variable only
    /// becomes visible once the body is closed.
    pub fn define_function(
        &mut self,
        kind: FunctionKind,
        signature: FunctionSignature,
        body: impl FnOnce(&mut Self, &[Variable]) -> GenResult<()>,
    ) -> GenResult<Variable> {
        let output = self.program.new_variable();
        let parameters: Vec<Variable> = (0..signature.parameter_count)
            .map(|_| self.program.new_variable())
            .collect();
        self.append(Operation::BeginFunction {
            output,
            kind,
            parameters: parameters.clone(),
            has_rest: signature.has_rest,
        });
        self.nested(kind.context_flags(), |b| {
            for param in &parameters {
                b.pool.add(*param);
            }
            body(b, &parameters)
        })?;
        self.append(Operation::EndFunction);
        self.pool.add(output);
        Ok(output)
    }

    pub fn return_value(&mut self, value: Variable) -> GenResult<()> {
        self.require_context(ContextFlag::Function, "return")?;
        self.append(Operation::Return { value });
        Ok(())
    }

    pub fn yield_value(&mut self, value: Variable, delegate: bool) -> GenResult<()> {
        self.require_context(ContextFlag::Generator, "yield")?;
        self.append(Operation::Yield { value, delegate });
        Ok(())
    }

    pub fn await_value(&mut self, value: Variable) -> GenResult<Variable> {
        self.require_context(ContextFlag::Async, "await")?;
        Ok(self.define(|output| Operation::Await { output, value }))
    }

    pub fn if_else(
        &mut self,
        condition: Variable,
        then_body: impl FnOnce(&mut Self) -> GenResult<()>,
        else_body: impl FnOnce(&mut Self) -> GenResult<()>,
    ) -> GenResult<()> {
        self.append(Operation::BeginIf { condition });
        self.nested(&[], then_body)?;
        self.append(Operation::BeginElse);
        self.nested(&[], else_body)?;
        self.append(Operation::EndIf);
        Ok(())
    }

    pub fn while_loop(
        &mut self,
        lhs: Variable,
        comparator: Comparator,
        rhs: Variable,
        body: impl FnOnce(&mut Self) -> GenResult<()>,
    ) -> GenResult<()> {
        self.append(Operation::BeginWhile {
            lhs,
            comparator,
            rhs,
        });
        self.nested(&[ContextFlag::Loop], body)?;
        self.append(Operation::EndWhile);
        Ok(())
    }

    pub fn do_while_loop(
        &mut self,
        lhs: Variable,
        comparator: Comparator,
        rhs: Variable,
        body: impl FnOnce(&mut Self) -> GenResult<()>,
    ) -> GenResult<()> {
        self.append(Operation::BeginDoWhile);
        self.nested(&[ContextFlag::Loop], body)?;
        self.append(Operation::EndDoWhile {
            lhs,
            comparator,
            rhs,
        });
        Ok(())
    }

    /// Counting loop over a phi seeded with `start`.
    ///
    /// The header advances the counter with `op step` after every iteration,
    /// so a `continue` in the body still reaches the update. Returns the
    /// counter.
    pub fn for_loop(
        &mut self,
        start: Variable,
        comparator: Comparator,
        end: Variable,
        op: BinaryOperator,
        step: Variable,
        body: impl FnOnce(&mut Self, Variable) -> GenResult<()>,
    ) -> GenResult<Variable> {
        let counter = self.define_phi(start);
        self.sealed(counter, |b| {
            b.append(Operation::BeginFor {
                counter,
                comparator,
                end,
                op,
                step,
            });
            b.nested(&[ContextFlag::Loop], |b| body(b, counter))?;
            b.append(Operation::EndFor);
            Ok(())
        })?;
        Ok(counter)
    }

    pub fn for_in_loop(
        &mut self,
        object: Variable,
        body: impl FnOnce(&mut Self, Variable) -> GenResult<()>,
    ) -> GenResult<()> {
        let output = self.program.new_variable();
        self.append(Operation::BeginForIn { output, object });
        self.nested(&[ContextFlag::Loop], |b| {
            b.pool.add(output);
            body(b, output)
        })?;
        self.append(Operation::EndForIn);
        Ok(())
    }

    pub fn for_of_loop(
        &mut self,
        iterable: Variable,
        body: impl FnOnce(&mut Self, Variable) -> GenResult<()>,
    ) -> GenResult<()> {
        let output = self.program.new_variable();
        self.append(Operation::BeginForOf { output, iterable });
        self.nested(&[ContextFlag::Loop], |b| {
            b.pool.add(output);
            body(b, output)
        })?;
        self.append(Operation::EndForOf);
        Ok(())
    }

    pub fn break_loop(&mut self) -> GenResult<()> {
        self.require_context(ContextFlag::Loop, "break")?;
        self.append(Operation::Break);
        Ok(())
    }

    pub fn continue_loop(&mut self) -> GenResult<()> {
        self.require_context(ContextFlag::Loop, "continue")?;
        self.append(Operation::Continue);
        Ok(())
    }

    pub fn try_catch(
        &mut self,
        try_body: impl FnOnce(&mut Self) -> GenResult<()>,
        catch_body: impl FnOnce(&mut Self, Variable) -> GenResult<()>,
    ) -> GenResult<()> {
        self.append(Operation::BeginTry);
        self.nested(&[ContextFlag::Try], try_body)?;
        let exception = self.program.new_variable();
        self.append(Operation::BeginCatch { exception });
        self.nested(&[], |b| {
            b.pool.add(exception);
            catch_body(b, exception)
        })?;
        self.append(Operation::EndTryCatch);
        Ok(())
    }

    pub fn with_statement(
        &mut self,
        object: Variable,
        body: impl FnOnce(&mut Self) -> GenResult<()>,
    ) -> GenResult<()> {
        self.append(Operation::BeginWith { object });
        self.nested(&[ContextFlag::With], body)?;
        self.append(Operation::EndWith);
        Ok(())
    }

    pub fn load_from_scope(&mut self, name: impl Into<String>) -> GenResult<Variable> {
        self.require_context(ContextFlag::With, "load from scope")?;
        let name = name.into();
        Ok(self.define(|output| Operation::LoadFromScope { output, name }))
    }

    pub fn store_to_scope(&mut self, name: impl Into<String>, value: Variable) -> GenResult<()> {
        self.require_context(ContextFlag::With, "store to scope")?;
        self.append(Operation::StoreToScope {
            name: name.into(),
            value,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::ProgramBuilder;
    use crate::catalog::Catalog;
    use crate::profile::GenerationConfig;
    use crate::resolver::{self, ResolvedParams};

    /// Everything a builder borrows, owned in one place.
    pub struct Fixture {
        pub rng: StdRng,
        pub catalog: Catalog,
        pub params: ResolvedParams,
        pub config: GenerationConfig,
    }

    impl Fixture {
        pub fn new(names: &[&str]) -> Self {
            let catalog = Catalog::subset(names).expect("known generator names");
            let params = resolver::resolve(&catalog, None);
            Self {
                rng: StdRng::seed_from_u64(42),
                catalog,
                params,
                config: GenerationConfig::default(),
            }
        }

        pub fn standard() -> Self {
            let catalog = Catalog::standard().expect("standard catalog");
            let params = resolver::resolve(&catalog, None);
            Self {
                rng: StdRng::seed_from_u64(42),
                catalog,
                params,
                config: GenerationConfig::default(),
            }
        }

        pub fn builder(&mut self) -> ProgramBuilder<'_> {
            ProgramBuilder::new(&mut self.rng, &self.catalog, &self.params, &self.config)
        }
    }
}
