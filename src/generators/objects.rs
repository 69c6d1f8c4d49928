//! Object and array construction, member access, and the generators that
//! poke at object shape: prototypes, accessors, proxies, lengths.

use crate::builder::ProgramBuilder;
use crate::environment::{PROXY_HOOKS, TYPED_ARRAYS, WELL_KNOWN_SYMBOLS};
use crate::error::GenResult;
use crate::program::Variable;
use crate::random;
use crate::rule::{CodeGenerator, InputSpec, Inputs, Param, Params};
use crate::types::Capability;

pub(super) fn all() -> Vec<Box<dyn CodeGenerator>> {
    vec![
        Box::new(Object),
        Box::new(Array),
        Box::new(ObjectWithSpread),
        Box::new(ArrayWithSpread),
        Box::new(TypedArray),
        Box::new(FloatArray),
        Box::new(IntArray),
        Box::new(ObjectArray),
        Box::new(PropertyRetrieval),
        Box::new(PropertyAssignment),
        Box::new(PropertyRemoval),
        Box::new(ElementRetrieval),
        Box::new(ElementAssignment),
        Box::new(ElementRemoval),
        Box::new(ComputedPropertyRetrieval),
        Box::new(ComputedPropertyAssignment),
        Box::new(ComputedPropertyRemoval),
        Box::new(WellKnownPropertyLoad),
        Box::new(WellKnownPropertyStore),
        Box::new(PrototypeAccess),
        Box::new(PrototypeOverwrite),
        Box::new(CallbackProperty),
        Box::new(PropertyAccessor),
        Box::new(Proxy),
        Box::new(LengthChange),
        Box::new(ElementKindChange),
    ]
}

const OBJECT: InputSpec = InputSpec::Arity1(Capability::Object);

/// Insert or replace `name` so property lists stay duplicate-free.
fn set_property(properties: &mut Vec<(String, Variable)>, name: String, value: Variable) {
    match properties.iter_mut().find(|(n, _)| *n == name) {
        Some(entry) => entry.1 = value,
        None => properties.push((name, value)),
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub struct Object;

impl CodeGenerator for Object {
    fn name(&self) -> &'static str {
        "object"
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("properties", 0, 10)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("properties");
        let mut properties = Vec::new();
        for _ in 0..b.random_in(min, max) {
            let name = b.gen_property_name_for_write();
            let value = b.rand_var();
            set_property(&mut properties, name, value);
        }
        b.create_object(properties);
        Ok(())
    }
}

pub struct Array;

impl CodeGenerator for Array {
    fn name(&self) -> &'static str {
        "array"
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("elements", 0, 10)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("elements");
        let count = b.random_in(min, max);
        let elements = (0..count).map(|_| b.rand_var()).collect();
        b.create_array(elements);
        Ok(())
    }
}

pub struct ObjectWithSpread;

impl CodeGenerator for ObjectWithSpread {
    fn name(&self) -> &'static str {
        "object_with_spread"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("properties", 0, 10), Param::prob("spread", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("properties");
        let mut properties = Vec::new();
        let mut spreads = Vec::new();
        for _ in 0..b.random_in(min, max) {
            if b.probability(params.prob("spread")) {
                spreads.push(b.rand_var());
            } else {
                let name = b.gen_property_name_for_write();
                let value = b.rand_var();
                set_property(&mut properties, name, value);
            }
        }
        b.create_object_with_spread(properties, spreads);
        Ok(())
    }
}

pub struct ArrayWithSpread;

impl CodeGenerator for ArrayWithSpread {
    fn name(&self) -> &'static str {
        "array_with_spread"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("elements", 0, 10), Param::prob("spread", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("elements");
        let count = b.random_in(min, max);
        let elements: Vec<_> = (0..count).map(|_| b.rand_var()).collect();
        let spreads = elements
            .iter()
            .map(|_| b.probability(params.prob("spread")))
            .collect();
        b.create_array_with_spread(elements, spreads);
        Ok(())
    }
}

pub struct TypedArray;

impl CodeGenerator for TypedArray {
    fn name(&self) -> &'static str {
        "typed_array"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("size", 0, 0x10000)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let (min, max) = params.range("size");
        let size = b.random_in(min, max) as i64;
        let size = b.load_int(size);
        let constructor = b.choose(TYPED_ARRAYS)?;
        let constructor = b.load_builtin(constructor);
        b.construct(constructor, vec![size]);
        Ok(())
    }
}

/// Arrays holding one repeated value of a single element kind.
fn uniform_array(b: &mut ProgramBuilder<'_>, params: &Params, value: Variable) {
    let (min, max) = params.range("elements");
    let count = b.random_in(min, max);
    b.create_array(vec![value; count]);
}

pub struct FloatArray;

impl CodeGenerator for FloatArray {
    fn name(&self) -> &'static str {
        "float_array"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("elements", 1, 5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let value = b.load_float(13.37);
        uniform_array(b, params, value);
        Ok(())
    }
}

pub struct IntArray;

impl CodeGenerator for IntArray {
    fn name(&self) -> &'static str {
        "int_array"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("elements", 1, 5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let value = b.load_int(1337);
        uniform_array(b, params, value);
        Ok(())
    }
}

pub struct ObjectArray;

impl CodeGenerator for ObjectArray {
    fn name(&self) -> &'static str {
        "object_array"
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::range("elements", 1, 5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        _inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let value = b.create_object(Vec::new());
        uniform_array(b, params, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Named properties
// ---------------------------------------------------------------------------

pub struct PropertyRetrieval;

impl CodeGenerator for PropertyRetrieval {
    fn name(&self) -> &'static str {
        "property_retrieval"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    /// `use_known`: chance of reading a property the oracle knows exists.
    fn params(&self) -> Vec<Param> {
        vec![Param::prob("use_known", 0.9)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let known = if b.probability(params.prob("use_known")) {
            b.random_property(object)
        } else {
            None
        };
        let name = match known {
            Some(name) => name,
            None => b.gen_property_name_for_read(),
        };
        b.load_property(object, name);
        Ok(())
    }
}

pub struct PropertyAssignment;

impl CodeGenerator for PropertyAssignment {
    fn name(&self) -> &'static str {
        "property_assignment"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    /// `use_known`: chance of overwriting an existing property instead of
    /// defining a new one.
    fn params(&self) -> Vec<Param> {
        vec![Param::prob("use_known", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let known = if b.probability(params.prob("use_known")) {
            b.random_property(object)
        } else {
            None
        };
        let name = match known {
            Some(name) => name,
            None => b.gen_property_name_for_write(),
        };
        let value = b.rand_var();
        b.store_property(object, name, value);
        Ok(())
    }
}

pub struct PropertyRemoval;

impl CodeGenerator for PropertyRemoval {
    fn name(&self) -> &'static str {
        "property_removal"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
            None => b.gen_property_name_for_write(),
        };
        b.delete_property(object, name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Elements and computed properties
// ---------------------------------------------------------------------------

pub struct ElementRetrieval;

impl CodeGenerator for ElementRetrieval {
    fn name(&self) -> &'static str {
        "element_retrieval"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let index = b.gen_index();
        b.load_element(object, index);
        Ok(())
    }
}

pub struct ElementAssignment;

impl CodeGenerator for ElementAssignment {
    fn name(&self) -> &'static str {
        "element_assignment"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let index = b.gen_index();
        let value = b.rand_var();
        b.store_element(object, index, value);
        Ok(())
    }
}

pub struct ElementRemoval;

impl CodeGenerator for ElementRemoval {
    fn name(&self) -> &'static str {
        "element_removal"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let index = b.gen_index();
        b.delete_element(object, index);
        Ok(())
    }
}

pub struct ComputedPropertyRetrieval;

impl CodeGenerator for ComputedPropertyRetrieval {
    fn name(&self) -> &'static str {
        "computed_property_retrieval"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let name = b.rand_var();
        b.load_computed_property(object, name);
        Ok(())
    }
}

pub struct ComputedPropertyAssignment;

impl CodeGenerator for ComputedPropertyAssignment {
    fn name(&self) -> &'static str {
        "computed_property_assignment"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        _params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let name = b.rand_var();
        let value = b.rand_var();
        b.store_computed_property(object, name, value);
        Ok(())
    }
}

pub struct ComputedPropertyRemoval;

impl CodeGenerator for ComputedPropertyRemoval {
    fn name(&self) -> &'static str {
        "computed_property_removal"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let name = b.rand_var();
        b.delete_computed_property(object, name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Symbols, prototypes and callbacks
// ---------------------------------------------------------------------------

pub struct WellKnownPropertyLoad;

impl CodeGenerator for WellKnownPropertyLoad {
    fn name(&self) -> &'static str {
        "well_known_property_load"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let symbol = b.load_builtin("Symbol");
        let name = b.choose(WELL_KNOWN_SYMBOLS)?;
        let key = b.load_property(symbol, name);
        b.load_computed_property(object, key);
        Ok(())
    }
}

pub struct WellKnownPropertyStore;

impl CodeGenerator for WellKnownPropertyStore {
    fn name(&self) -> &'static str {
        "well_known_property_store"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let symbol = b.load_builtin("Symbol");
        let name = b.choose(WELL_KNOWN_SYMBOLS)?;
        let key = b.load_property(symbol, name);
        let value = b.rand_var();
        b.store_computed_property(object, key, value);
        Ok(())
    }
}

pub struct PrototypeAccess;

impl CodeGenerator for PrototypeAccess {
    fn name(&self) -> &'static str {
        "prototype_access"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        b.load_property(object, "__proto__");
        Ok(())
    }
}

pub struct PrototypeOverwrite;

impl CodeGenerator for PrototypeOverwrite {
    fn name(&self) -> &'static str {
        "prototype_overwrite"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity2(Capability::Object, Capability::Object)
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
        let (object, proto) = inputs.two(self.name(), self.inputs())?;
        b.store_property(object, "__proto__", proto);
        Ok(())
    }
}

pub struct CallbackProperty;

impl CodeGenerator for CallbackProperty {
    fn name(&self) -> &'static str {
        "callback_property"
    }

    fn inputs(&self) -> InputSpec {
        InputSpec::Arity2(Capability::Object, Capability::Function)
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
        let (object, callback) = inputs.two(self.name(), self.inputs())?;
        let name = b.choose(&["valueOf", "toString"])?;
        b.store_property(object, name, callback);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Accessor {
    Getter,
    Setter,
    Both,
}

pub struct PropertyAccessor;

impl CodeGenerator for PropertyAccessor {
    fn name(&self) -> &'static str {
        "property_accessor"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let key = if b.probability(0.5) {
            let name = b.gen_property_name_for_write();
            b.load_string(name)
        } else {
            let index = b.gen_index();
            b.load_int(index)
        };

        let kinds: Vec<Box<dyn FnOnce() -> Accessor>> = vec![
            Box::new(|| Accessor::Getter),
            Box::new(|| Accessor::Setter),
            Box::new(|| Accessor::Both),
        ];
        let accessor = random::with_equal_probability(b.rng(), kinds)?;
        let mut descriptor = Vec::new();
        if matches!(accessor, Accessor::Getter | Accessor::Both)
            && let Some(getter) = b.rand_var_of(Capability::Function)
        {
            descriptor.push(("get".to_string(), getter));
        }
        if matches!(accessor, Accessor::Setter | Accessor::Both)
            && let Some(setter) = b.rand_var_of(Capability::Function)
        {
            descriptor.push(("set".to_string(), setter));
        }
        let descriptor = b.create_object(descriptor);

        let builtin = b.load_builtin("Object");
        b.call_method(builtin, "defineProperty", vec![object, key, descriptor]);
        Ok(())
    }
}

pub struct Proxy;

impl CodeGenerator for Proxy {
    fn name(&self) -> &'static str {
        "proxy"
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
        let target = b.rand_var();
        let mut hooks: Vec<&str> = PROXY_HOOKS.to_vec();
        let mut handler = Vec::new();
        for _ in 0..b.random_in(0, PROXY_HOOKS.len() - 1) {
            let hook = hooks.remove(b.random_in(0, hooks.len() - 1));
            if let Some(function) = b.rand_var_of(Capability::Function) {
                handler.push((hook.to_string(), function));
            }
        }
        let handler = b.create_object(handler);
        let proxy = b.load_builtin("Proxy");
        b.construct(proxy, vec![target, handler]);
        Ok(())
    }
}

pub struct LengthChange;

impl CodeGenerator for LengthChange {
    fn name(&self) -> &'static str {
        "length_change"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
    }

    fn default_weight(&self) -> usize {
        5
    }

    fn params(&self) -> Vec<Param> {
        vec![Param::prob("shrink", 0.5)]
    }

    fn generate(
        &self,
        b: &mut ProgramBuilder<'_>,
        inputs: Inputs,
        params: &Params,
    ) -> GenResult<()> {
        let object = inputs.one(self.name(), self.inputs())?;
        let length = if b.probability(params.prob("shrink")) {
            b.random_in(0, 2) as i64
        } else {
            b.gen_index()
        };
        let length = b.load_int(length);
        b.store_property(object, "length", length);
        Ok(())
    }
}

pub struct ElementKindChange;

impl CodeGenerator for ElementKindChange {
    fn name(&self) -> &'static str {
        "element_kind_change"
    }

    fn inputs(&self) -> InputSpec {
        OBJECT
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
        let value = b.rand_var();
        let index = b.random_in(0, 9) as i64;
        b.store_element(object, index, value);
        Ok(())
    }
}
