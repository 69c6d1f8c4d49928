//! Capability classification of produced values.
//!
//! The engine never reasons about types beyond the [`Capability`] predicates.
//! Everything richer lives behind the [`TypeOracle`] trait; [`TypeTracker`] is
//! the default oracle and infers a [`ValueType`] per variable from the
//! operations as they are emitted.

use std::fmt;
use std::ops::BitOr;

use rand::RngCore;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::environment;
use crate::program::{BinaryOperator, FunctionSignature, Operation, UnaryOperator, Variable};
use crate::random;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Constraint on the variable that may fill an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// No constraint.
    Anything,
    Object,
    Function,
    Constructor,
    Boolean,
}

impl Capability {
    pub fn admits(self, ty: &ValueType) -> bool {
        match self {
            Capability::Anything => true,
            Capability::Object => ty.is_object_like(),
            Capability::Function => ty.is_function_like(),
            Capability::Constructor => ty.is_constructor_like(),
            Capability::Boolean => ty.is_boolean_like(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Anything => "anything",
            Capability::Object => "object",
            Capability::Function => "function",
            Capability::Constructor => "constructor",
            Capability::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Set of primitive kinds a value may have at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeKinds(u16);

impl TypeKinds {
    pub const NONE: TypeKinds = TypeKinds(0);
    pub const UNDEFINED: TypeKinds = TypeKinds(1 << 0);
    pub const NULL: TypeKinds = TypeKinds(1 << 1);
    pub const BOOLEAN: TypeKinds = TypeKinds(1 << 2);
    pub const INTEGER: TypeKinds = TypeKinds(1 << 3);
    pub const FLOAT: TypeKinds = TypeKinds(1 << 4);
    pub const BIGINT: TypeKinds = TypeKinds(1 << 5);
    pub const STRING: TypeKinds = TypeKinds(1 << 6);
    pub const OBJECT: TypeKinds = TypeKinds(1 << 7);
    pub const FUNCTION: TypeKinds = TypeKinds(1 << 8);
    pub const CONSTRUCTOR: TypeKinds = TypeKinds(1 << 9);
    pub const UNKNOWN: TypeKinds = TypeKinds(1 << 10);

    pub const NUMBER: TypeKinds = TypeKinds(Self::INTEGER.0 | Self::FLOAT.0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_subset_of(self, other: TypeKinds) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn intersects(self, other: TypeKinds) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for TypeKinds {
    type Output = TypeKinds;

    fn bitor(self, rhs: TypeKinds) -> TypeKinds {
        TypeKinds(self.0 | rhs.0)
    }
}

type Names = SmallVec<[String; 4]>;

/// What the oracle believes about one variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueType {
    kinds: TypeKinds,
    properties: Names,
    methods: Names,
    signature: Option<FunctionSignature>,
}

impl ValueType {
    pub fn of(kinds: TypeKinds) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    pub fn unknown() -> Self {
        Self::of(TypeKinds::UNKNOWN)
    }

    pub fn integer() -> Self {
        Self::of(TypeKinds::INTEGER)
    }

    pub fn float() -> Self {
        Self::of(TypeKinds::FLOAT)
    }

    pub fn number() -> Self {
        Self::of(TypeKinds::NUMBER)
    }

    pub fn bigint() -> Self {
        Self::of(TypeKinds::BIGINT)
    }

    pub fn string() -> Self {
        Self::of(TypeKinds::STRING).with_properties(&["length"])
    }

    pub fn boolean() -> Self {
        Self::of(TypeKinds::BOOLEAN)
    }

    pub fn undefined() -> Self {
        Self::of(TypeKinds::UNDEFINED)
    }

    pub fn null() -> Self {
        Self::of(TypeKinds::NULL)
    }

    pub fn object() -> Self {
        Self::of(TypeKinds::OBJECT)
    }

    pub fn function(signature: Option<FunctionSignature>) -> Self {
        Self {
            signature,
            ..Self::of(TypeKinds::FUNCTION)
        }
    }

    pub fn constructor(signature: Option<FunctionSignature>) -> Self {
        Self {
            signature,
            ..Self::of(TypeKinds::CONSTRUCTOR)
        }
    }

    pub fn with_properties(mut self, names: &[&str]) -> Self {
        for name in names {
            self.add_property(name);
        }
        self
    }

    pub fn with_methods(mut self, names: &[&str]) -> Self {
        for name in names {
            self.add_method(name);
        }
        self
    }

    pub fn kinds(&self) -> TypeKinds {
        self.kinds
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn signature(&self) -> Option<FunctionSignature> {
        self.signature
    }

    pub fn is_object_like(&self) -> bool {
        !self.kinds.is_empty()
            && self
                .kinds
                .is_subset_of(TypeKinds::OBJECT | TypeKinds::FUNCTION | TypeKinds::CONSTRUCTOR)
    }

    pub fn is_function_like(&self) -> bool {
        !self.kinds.is_empty()
            && self
                .kinds
                .is_subset_of(TypeKinds::FUNCTION | TypeKinds::CONSTRUCTOR)
    }

    pub fn is_constructor_like(&self) -> bool {
        self.kinds == TypeKinds::CONSTRUCTOR
    }

    pub fn is_boolean_like(&self) -> bool {
        self.kinds == TypeKinds::BOOLEAN
    }

    pub fn add_property(&mut self, name: &str) {
        if !self.properties.iter().any(|p| p == name) {
            self.properties.push(name.to_string());
        }
    }

    pub fn add_method(&mut self, name: &str) {
        if !self.methods.iter().any(|m| m == name) {
            self.methods.push(name.to_string());
        }
    }

    pub fn remove_member(&mut self, name: &str) {
        self.properties.retain(|p| p != name);
        self.methods.retain(|m| m != name);
    }

    /// The type of a value that is one of `self` or `other`.
    ///
    /// Kinds are united, members intersected: only names known on both sides
    /// stay known.
    pub fn union(&self, other: &ValueType) -> ValueType {
        let keep = |ours: &Names, theirs: &Names| -> Names {
            ours.iter().filter(|n| theirs.contains(n)).cloned().collect()
        };
        ValueType {
            kinds: self.kinds | other.kinds,
            properties: keep(&self.properties, &other.properties),
            methods: keep(&self.methods, &other.methods),
            signature: if self.signature == other.signature {
                self.signature
            } else {
                None
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Source of type information consulted by the engine and the generators.
pub trait TypeOracle {
    /// Current belief about `var`. Unseen variables are [`ValueType::unknown`].
    fn type_of(&self, var: Variable) -> ValueType;

    /// Update beliefs after `op` has been appended to the program.
    fn observe(&mut self, op: &Operation);

    /// A property name known to exist on `var`, if any.
    fn random_property(&self, var: Variable, rng: &mut dyn RngCore) -> Option<String> {
        let ty = self.type_of(var);
        random::choose_uniform(rng, ty.properties()).ok().cloned()
    }

    /// A method name known to exist on `var`, if any.
    fn random_method(&self, var: Variable, rng: &mut dyn RngCore) -> Option<String> {
        let ty = self.type_of(var);
        random::choose_uniform(rng, ty.methods()).ok().cloned()
    }
}

/// Default oracle: forward inference over emitted operations.
#[derive(Debug, Default)]
pub struct TypeTracker {
    types: FxHashMap<Variable, ValueType>,
}

impl TypeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, var: Variable, ty: ValueType) {
        self.types.insert(var, ty);
    }

    fn get(&self, var: Variable) -> ValueType {
        self.types.get(&var).cloned().unwrap_or_else(ValueType::unknown)
    }

    fn update(&mut self, var: Variable, f: impl FnOnce(&mut ValueType)) {
        if let Some(ty) = self.types.get_mut(&var)
            && ty.is_object_like()
        {
            f(ty);
        }
    }

    fn binary_result(&self, lhs: Variable, op: BinaryOperator, rhs: Variable) -> ValueType {
        let (l, r) = (self.get(lhs), self.get(rhs));
        match op {
            BinaryOperator::LogicAnd | BinaryOperator::LogicOr => l.union(&r),
            BinaryOperator::Add
                if l.kinds.intersects(TypeKinds::STRING) || r.kinds.intersects(TypeKinds::STRING) =>
            {
                ValueType::string()
            }
            _ if l.kinds == TypeKinds::BIGINT && r.kinds == TypeKinds::BIGINT => ValueType::bigint(),
            BinaryOperator::BitAnd
            | BinaryOperator::BitOr
            | BinaryOperator::Xor
            | BinaryOperator::LShift
            | BinaryOperator::RShift
            | BinaryOperator::UnRShift => ValueType::integer(),
            _ => ValueType::number(),
        }
    }
}

impl TypeOracle for TypeTracker {
    fn type_of(&self, var: Variable) -> ValueType {
        self.get(var)
    }

    fn observe(&mut self, op: &Operation) {
        use Operation::*;
        match op {
            LoadInt { output, .. } => self.set(*output, ValueType::integer()),
            LoadBigInt { output, .. } => self.set(*output, ValueType::bigint()),
            LoadFloat { output, .. } => self.set(*output, ValueType::float()),
            LoadString { output, .. } => self.set(*output, ValueType::string()),
            LoadBool { output, .. } => self.set(*output, ValueType::boolean()),
            LoadUndefined { output } => self.set(*output, ValueType::undefined()),
            LoadNull { output } => self.set(*output, ValueType::null()),
            LoadRegExp { output, .. } => self.set(*output, environment::regexp_type()),
            LoadBuiltin { output, name } => self.set(*output, environment::builtin_type(name)),
            CreateObject {
                output,
                properties,
                spreads,
            } => {
                let mut ty = ValueType::object();
                for spread in spreads {
                    for name in self.get(*spread).properties() {
                        ty.add_property(name);
                    }
                }
                for (name, value) in properties {
                    ty.add_property(name);
                    if self.get(*value).is_function_like() {
                        ty.add_method(name);
                    }
                }
                self.set(*output, ty);
            }
            CreateArray { output, .. } => self.set(*output, environment::array_type()),
            BeginFunction {
                output,
                kind,
                parameters,
                has_rest,
            } => {
                let signature = Some(FunctionSignature {
                    parameter_count: parameters.len(),
                    has_rest: *has_rest,
                });
                let ty = if kind.is_constructor() {
                    ValueType::constructor(signature)
                } else {
                    ValueType::function(signature)
                };
                self.set(*output, ty.with_properties(&["length", "name"]));
                for param in parameters {
                    self.set(*param, ValueType::unknown());
                }
            }
            StoreProperty {
                object,
                name,
                value,
            } => {
                let is_fn = self.get(*value).is_function_like();
                self.update(*object, |ty| {
                    ty.add_property(name);
                    if is_fn {
                        ty.add_method(name);
                    }
                });
            }
            DeleteProperty { object, name } => self.update(*object, |ty| ty.remove_member(name)),
            TypeOf { output, .. } => self.set(*output, ValueType::string()),
            InstanceOf { output, .. } | In { output, .. } | Compare { output, .. } => {
                self.set(*output, ValueType::boolean())
            }
            Construct { output, .. } => self.set(*output, ValueType::object()),
            Unary { output, op, value } => {
                let ty = match op {
                    UnaryOperator::LogicalNot => ValueType::boolean(),
                    UnaryOperator::BitwiseNot => ValueType::integer(),
                    _ if self.get(*value).kinds == TypeKinds::BIGINT => ValueType::bigint(),
                    UnaryOperator::Inc | UnaryOperator::Dec
                        if self.get(*value).kinds == TypeKinds::INTEGER =>
                    {
                        ValueType::integer()
                    }
                    _ => ValueType::number(),
                };
                self.set(*output, ty);
            }
            Binary {
                output,
                lhs,
                op,
                rhs,
            } => {
                let ty = self.binary_result(*lhs, *op, *rhs);
                self.set(*output, ty);
            }
            Phi { output, initial } => {
                let ty = self.get(*initial);
                self.set(*output, ty);
            }
            Copy { target, value } => {
                let widened = self.get(*target).union(&self.get(*value));
                self.set(*target, widened);
            }
            BeginFor {
                counter, op, step, ..
            } => {
                let next = self.binary_result(*counter, *op, *step);
                let widened = self.get(*counter).union(&next);
                self.set(*counter, widened);
            }
            BeginForIn { output, .. } => self.set(*output, ValueType::string()),
            _ => {
                if let Some(output) = op.output() {
                    self.set(output, ValueType::unknown());
                }
                for inner in op.inner_outputs() {
                    self.set(inner, ValueType::unknown());
                }
            }
        }
    }
}
