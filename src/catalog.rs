//! Generator catalog -- owns every registered [`CodeGenerator`] and resolves
//! names to generators.
//!
//! The catalog is built once at startup and shared read-only by every engine
//! instance. Names are unique; looking up a name that was never registered
//! is a configuration fault.

use rustc_hash::FxHashMap;

use crate::error::{GenError, GenResult};
use crate::generators;
use crate::rule::CodeGenerator;

pub struct Catalog {
    generators: Vec<Box<dyn CodeGenerator>>,
    index: FxHashMap<&'static str, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate names.
    pub fn new(generators: Vec<Box<dyn CodeGenerator>>) -> GenResult<Self> {
        let mut index = FxHashMap::default();
        for (i, generator) in generators.iter().enumerate() {
            if index.insert(generator.name(), i).is_some() {
                return Err(GenError::DuplicateGenerator {
                    name: generator.name().to_string(),
                });
            }
        }
        Ok(Self { generators, index })
    }

    /// The full catalog of built-in generators.
    pub fn standard() -> GenResult<Self> {
        Self::new(generators::all())
    }

    /// The built-in generators restricted to `names`.
    ///
    /// Fails on the first name the standard catalog does not know.
    pub fn subset(names: &[&str]) -> GenResult<Self> {
        let mut all: Vec<Option<Box<dyn CodeGenerator>>> =
            generators::all().into_iter().map(Some).collect();
        let mut picked = Vec::with_capacity(names.len());
        for name in names {
            let slot = all
                .iter_mut()
                .find(|g| matches!(g, Some(g) if g.name() == *name))
                .ok_or_else(|| GenError::UnknownGenerator {
                    name: name.to_string(),
                })?;
            if let Some(generator) = slot.take() {
                picked.push(generator);
            }
        }
        Self::new(picked)
    }

    /// Resolve a generator by name.
    pub fn lookup(&self, name: &str) -> GenResult<&dyn CodeGenerator> {
        self.index
            .get(name)
            .map(|&i| self.generators[i].as_ref())
            .ok_or_else(|| GenError::UnknownGenerator {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Generators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn CodeGenerator> {
        self.generators.iter().map(|g| g.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}
