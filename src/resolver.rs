//! Profile resolver -- merges generator-declared param defaults with TOML
//! profile overrides into an immutable [`ResolvedParams`] map.
//!
//! Built once at startup and shared by every [`ProgramBuilder`] of the run.
//!
//! [`ProgramBuilder`]: crate::builder::ProgramBuilder

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::warn;

use crate::catalog::Catalog;
use crate::rule::{Param, ParamValue, Params, WEIGHT_PARAM};

// ---------------------------------------------------------------------------
// RuleOverrides (TOML-deserializable)
// ---------------------------------------------------------------------------

/// Per-generator parameter overrides loaded from a TOML `[rules]` section.
///
/// ```toml
/// [rules.property_retrieval]
/// use_known = 0.95
/// weight = 20
///
/// [rules.object]
/// properties = [0, 4]
/// ```
pub type RuleOverrides = HashMap<String, HashMap<String, toml::Value>>;

// ---------------------------------------------------------------------------
// ResolvedParams
// ---------------------------------------------------------------------------

/// Map from generator name to its resolved parameter bag.
#[derive(Debug, Clone, Default)]
pub struct ResolvedParams {
    inner: HashMap<String, Params>,
}

impl ResolvedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert resolved params for a generator.
    pub fn insert(&mut self, name: impl Into<String>, params: Params) {
        self.inner.insert(name.into(), params);
    }

    pub fn get(&self, name: &str) -> Option<&Params> {
        self.inner.get(name)
    }

    /// The resolved params for the named generator, or an empty bag.
    pub fn for_rule(&self, name: &str) -> &Params {
        static EMPTY: OnceLock<Params> = OnceLock::new();
        self.inner
            .get(name)
            .unwrap_or_else(|| EMPTY.get_or_init(Params::default))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Build [`ResolvedParams`] for every generator in `catalog`.
///
/// Each generator gets its declared defaults plus the implicit `weight`
/// count, then any TOML overrides on top. Unknown generator names or param
/// keys are warned about and ignored.
pub fn resolve(catalog: &Catalog, overrides: Option<&RuleOverrides>) -> ResolvedParams {
    let mut map = HashMap::new();

    for generator in catalog.iter() {
        let name = generator.name();
        let mut declared = generator.params();
        declared.push(Param::count(WEIGHT_PARAM, generator.default_weight()));
        let params = resolve_one(name, &declared, overrides.and_then(|o| o.get(name)));
        map.insert(name.to_string(), params);
    }

    if let Some(overrides) = overrides {
        for name in overrides.keys() {
            if !catalog.contains(name) {
                warn!(generator = %name, "unknown generator in profile overrides (ignored)");
            }
        }
    }

    ResolvedParams { inner: map }
}

fn resolve_one(
    name: &str,
    declared: &[Param],
    overrides: Option<&HashMap<String, toml::Value>>,
) -> Params {
    let mut params = Params::from_iter(declared.iter().map(|d| (d.name, d.default.clone())));

    let Some(overrides) = overrides else {
        return params;
    };

    for (key, value) in overrides {
        let Some(decl) = declared.iter().find(|d| d.name == key.as_str()) else {
            warn!(generator = name, param = %key, "unknown param in profile (ignored)");
            continue;
        };

        match convert_toml_value(value) {
            Some(pv) if same_kind(&pv, &decl.default) => params.insert(decl.name, pv),
            _ => {
                warn!(
                    generator = name,
                    param = %key,
                    value = %value,
                    "cannot use TOML value for param (ignored)"
                );
            }
        }
    }

    params
}

fn same_kind(a: &ParamValue, b: &ParamValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Convert a [`toml::Value`] to a [`ParamValue`].
///
/// - Float -> Probability
/// - Integer -> Count
/// - Boolean -> Flag
/// - Array of exactly 2 integers -> Range
fn convert_toml_value(value: &toml::Value) -> Option<ParamValue> {
    match value {
        toml::Value::Float(f) => Some(ParamValue::Probability(*f)),
        toml::Value::Integer(i) => usize::try_from(*i).ok().map(ParamValue::Count),
        toml::Value::Boolean(b) => Some(ParamValue::Flag(*b)),
        toml::Value::Array(arr) if arr.len() == 2 => {
            let lo = arr[0].as_integer().and_then(|i| usize::try_from(i).ok())?;
            let hi = arr[1].as_integer().and_then(|i| usize::try_from(i).ok())?;
            Some(ParamValue::Range(lo, hi))
        }
        _ => None,
    }
}
