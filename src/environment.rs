//! Static knowledge about the target language runtime: builtins, member
//! names, and literal pools the generators draw from.

use crate::program::FunctionSignature;
use crate::types::ValueType;

/// Global builtins a program may load by name.
pub const BUILTINS: &[&str] = &[
    "Object", "Array", "Function", "Boolean", "Number", "String", "Symbol", "Promise", "Proxy",
    "Reflect", "Math", "JSON", "Map", "Set", "WeakMap", "WeakSet", "ArrayBuffer", "DataView",
    "Uint8Array", "Int8Array", "Uint16Array", "Int16Array", "Uint32Array", "Int32Array",
    "Float32Array", "Float64Array", "Uint8ClampedArray", "RegExp", "Date", "Error",
    "parseInt", "parseFloat", "isNaN", "isFinite", "eval",
];

/// Constructors accepted by the typed array generator.
pub const TYPED_ARRAYS: &[&str] = &[
    "Uint8Array", "Int8Array", "Uint16Array", "Int16Array", "Uint32Array", "Int32Array",
    "Float32Array", "Float64Array", "Uint8ClampedArray", "DataView",
];

pub const WELL_KNOWN_SYMBOLS: &[&str] = &[
    "isConcatSpreadable", "iterator", "match", "replace", "search", "species", "split",
    "toPrimitive", "toStringTag", "unscopables",
];

pub const PROXY_HOOKS: &[&str] = &[
    "getPrototypeOf", "setPrototypeOf", "isExtensible", "preventExtensions",
    "getOwnPropertyDescriptor", "defineProperty", "has", "get", "set", "deleteProperty",
    "ownKeys", "apply", "call", "construct",
];

/// Results of `typeof`.
pub const TYPE_NAMES: &[&str] = &[
    "undefined", "boolean", "number", "string", "symbol", "function", "object", "bigint",
];

/// Property names used when a read has no better candidate.
pub const READ_PROPERTY_NAMES: &[&str] = &[
    "a", "b", "c", "d", "e", "length", "constructor", "prototype", "__proto__", "valueOf",
    "toString", "size", "byteLength", "buffer", "source", "flags", "lastIndex", "name",
];

/// Property names used when defining new properties.
pub const WRITE_PROPERTY_NAMES: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h", "length"];

pub const METHOD_NAMES: &[&str] = &[
    "toString", "valueOf", "hasOwnProperty", "push", "pop", "shift", "unshift", "slice",
    "splice", "concat", "indexOf", "includes", "join", "reverse", "sort", "fill", "map",
    "filter", "reduce", "forEach", "keys", "values", "entries", "apply", "call", "bind",
];

pub const INTERESTING_INTEGERS: &[i64] = &[
    -9007199254740993, -9007199254740992, -4294967297, -4294967296, -2147483649, -2147483648,
    -1073741824, -65537, -65536, -4096, -1024, -256, -128, -2, -1, 0, 1, 2, 3, 4, 5, 6, 7, 8,
    9, 10, 16, 64, 127, 128, 255, 256, 1024, 4096, 65535, 65536, 1073741823, 1073741824,
    2147483647, 2147483648, 4294967295, 4294967296, 9007199254740991, 9007199254740992,
];

pub const INTERESTING_FLOATS: &[f64] = &[
    -1e-15, -1e12, -1e9, -1e6, -1e3, -5.0, -4.0, -3.0, -2.0, -1.0, -0.0, 0.0, 1.0, 2.0, 3.0,
    4.0, 5.0, 1e3, 1e6, 1e9, 1e12, 1e-15, f64::MIN_POSITIVE, f64::MAX, f64::EPSILON,
    f64::INFINITY, f64::NEG_INFINITY, f64::NAN,
];

pub const INTERESTING_STRINGS: &[&str] = &[
    "", "a", "foo", "bar", "length", "__proto__", "constructor", "valueOf", "toString",
    "0", "1", "-1", "NaN", "Infinity", "undefined", "null", "function", "object",
];

pub const REGEXP_PATTERNS: &[&str] = &[
    "a", "[a-z]+", "\\d+", "(a|b)*c", "^foo$", "(?:x)+?", "\\bword\\b", "(.)\\1", "[^]",
    "a{2,5}", "(?<name>\\w)", "\\u{1F600}", ".*",
];

pub const REGEXP_FLAGS: &[&str] = &["", "g", "i", "m", "s", "u", "y", "gi", "gm", "gimsuy"];

const OBJECT_METHODS: &[&str] = &["toString", "valueOf", "hasOwnProperty", "isPrototypeOf"];

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "slice", "splice", "concat", "indexOf", "includes",
    "join", "reverse", "sort", "fill", "map", "filter", "reduce", "forEach", "keys", "values",
    "entries",
];

/// Type of an array literal.
pub fn array_type() -> ValueType {
    ValueType::object()
        .with_properties(&["length"])
        .with_methods(ARRAY_METHODS)
}

/// Type of a regular expression literal.
pub fn regexp_type() -> ValueType {
    ValueType::object()
        .with_properties(&["source", "flags", "lastIndex", "global"])
        .with_methods(&["exec", "test", "toString"])
}

fn takes(parameter_count: usize) -> Option<FunctionSignature> {
    Some(FunctionSignature {
        parameter_count,
        has_rest: false,
    })
}

/// Type of the named global builtin.
pub fn builtin_type(name: &str) -> ValueType {
    match name {
        "Object" => ValueType::constructor(takes(1))
            .with_properties(&["prototype"])
            .with_methods(&[
                "assign", "create", "defineProperty", "freeze", "getPrototypeOf", "keys",
                "setPrototypeOf", "seal",
            ]),
        "Array" => ValueType::constructor(takes(1))
            .with_properties(&["prototype"])
            .with_methods(&["from", "isArray", "of"]),
        "Promise" => ValueType::constructor(takes(1))
            .with_properties(&["prototype"])
            .with_methods(&["all", "race", "reject", "resolve"]),
        "Proxy" => ValueType::constructor(takes(2)).with_methods(&["revocable"]),
        "Reflect" => ValueType::object().with_methods(&[
            "apply", "construct", "defineProperty", "get", "getPrototypeOf", "has", "ownKeys",
            "set",
        ]),
        "Math" => ValueType::object()
            .with_properties(&["PI", "E"])
            .with_methods(&["abs", "ceil", "floor", "max", "min", "pow", "random", "round", "sqrt"]),
        "JSON" => ValueType::object().with_methods(&["parse", "stringify"]),
        "Symbol" => ValueType::function(takes(1))
            .with_properties(WELL_KNOWN_SYMBOLS)
            .with_methods(&["for", "keyFor"]),
        "parseInt" => ValueType::function(takes(2)),
        "parseFloat" | "isNaN" | "isFinite" | "eval" => ValueType::function(takes(1)),
        "Boolean" | "Number" | "String" | "RegExp" | "Date" | "Error" => {
            ValueType::constructor(takes(1))
                .with_properties(&["prototype"])
                .with_methods(OBJECT_METHODS)
        }
        _ if TYPED_ARRAYS.contains(&name) => ValueType::constructor(takes(1))
            .with_properties(&["prototype", "BYTES_PER_ELEMENT"])
            .with_methods(&["from", "of"]),
        _ if BUILTINS.contains(&name) => ValueType::constructor(None)
            .with_properties(&["prototype"])
            .with_methods(OBJECT_METHODS),
        _ => ValueType::unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_has_a_known_type() {
        for name in BUILTINS {
            let ty = builtin_type(name);
            assert!(ty.is_object_like(), "{name} should be object-like");
        }
    }

    #[test]
    fn typed_arrays_are_constructors() {
        for name in TYPED_ARRAYS {
            assert!(builtin_type(name).is_constructor_like(), "{name}");
        }
    }

    #[test]
    fn symbol_exposes_well_known_symbols() {
        let symbol = builtin_type("Symbol");
        assert!(symbol.is_function_like());
        assert!(symbol.properties().iter().any(|p| p == "iterator"));
    }

    #[test]
    fn common_callables_have_signatures() {
        let arity = |name| builtin_type(name).signature().map(|s| s.parameter_count);
        assert_eq!(arity("parseInt"), Some(2));
        assert_eq!(arity("parseFloat"), Some(1));
        assert_eq!(arity("isNaN"), Some(1));
        assert_eq!(arity("Proxy"), Some(2));
        assert_eq!(arity("Number"), Some(1));
        assert_eq!(arity("Uint8Array"), Some(1));
        assert_eq!(arity("WeakMap"), None);
        assert_eq!(builtin_type("Math").signature(), None);
    }

    #[test]
    fn unknown_builtin_is_unknown() {
        assert!(!builtin_type("NoSuchGlobal").is_object_like());
    }
}
