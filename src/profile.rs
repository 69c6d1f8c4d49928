//! Generation profiles.
//!
//! A profile fixes the engine's knobs (budgets, selection policy, mode) and
//! optionally overrides per-generator parameters. Profiles are TOML files
//! embedded in the binary at compile time; fields omitted from a file take
//! the `Default` values below, which are also the "default" profile.

#![allow(unused_assignments)] // False positives from thiserror derive

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::RuleOverrides;

/// How freely generators may invent names the type oracle does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum GenerationMode {
    /// Synthesize plausible member names and argument lists when nothing is
    /// known.
    #[default]
    Aggressive,
    /// Only use what the oracle knows; otherwise do nothing.
    Conservative,
}

/// How `run_one_step` chooses among eligible generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Uniform,
    /// Proportional to each generator's `weight` param.
    #[default]
    Weighted,
}

/// Engine configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum nesting of recursively generated bodies.
    pub recursion_budget: usize,
    /// Target number of operations per program.
    pub program_size: usize,
    /// Inclusive range of engine steps per nested body.
    pub recursive_steps: (usize, usize),
    pub mode: GenerationMode,
    pub selection: SelectionPolicy,
    /// Generators run once at program start to seed the variable pool.
    pub prefix: Vec<String>,
    /// Give up on a program after this many steps in a row apply nothing.
    pub max_stalled_steps: usize,
    /// Run the well-formedness check on every finished program.
    pub validate: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            recursion_budget: 4,
            program_size: 60,
            recursive_steps: (1, 3),
            mode: GenerationMode::Aggressive,
            selection: SelectionPolicy::Weighted,
            prefix: ["integer", "string", "object", "boolean", "plain_function"]
                .map(String::from)
                .to_vec(),
            max_stalled_steps: 32,
            validate: true,
        }
    }
}

/// A generation profile: engine configuration plus parameter overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub generation: GenerationConfig,
    pub rules: RuleOverrides,
}

#[derive(Error, Debug, Diagnostic)]
pub enum ProfileError {
    #[error("unknown profile '{name}', available profiles: {available}")]
    #[diagnostic(code(S001))]
    Unknown { name: String, available: String },

    #[error("failed to parse profile '{name}'")]
    #[diagnostic(code(S002))]
    Parse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read profile file '{path}'")]
    #[diagnostic(code(S003))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// Embedded profile TOML data (compiled into the binary).
static PROFILES: &[(&str, &str)] = &[
    ("default", include_str!("../profiles/default.toml")),
    ("conservative", include_str!("../profiles/conservative.toml")),
    ("deep-nesting", include_str!("../profiles/deep-nesting.toml")),
    ("flat", include_str!("../profiles/flat.toml")),
];

pub fn available_profiles() -> Vec<&'static str> {
    PROFILES.iter().map(|(name, _)| *name).collect()
}

fn parse_profile(name: &str, toml_str: &str) -> Result<Profile, ProfileError> {
    toml::from_str(toml_str).map_err(|source| ProfileError::Parse {
        name: name.to_string(),
        source,
    })
}

/// Look up an embedded profile by name.
pub fn get_profile(name: &str) -> Result<Profile, ProfileError> {
    PROFILES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, toml_str)| parse_profile(n, toml_str))
        .unwrap_or_else(|| {
            Err(ProfileError::Unknown {
                name: name.to_string(),
                available: available_profiles().join(", "),
            })
        })
}

/// Load a profile from a TOML file on disk.
pub fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: display.clone(),
        source,
    })?;
    parse_profile(&display, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn every_embedded_profile_parses() {
        for name in available_profiles() {
            let profile = get_profile(name).unwrap_or_else(|e| panic!("{name}: {e}"));
            let (min, max) = profile.generation.recursive_steps;
            assert!(min <= max, "{name}: recursive_steps out of order");
        }
    }

    #[test]
    fn default_profile_matches_default_impl() {
        let profile = get_profile("default").unwrap();
        assert_eq!(profile.generation, GenerationConfig::default());
    }

    #[test]
    fn conservative_profile_sets_mode() {
        let profile = get_profile("conservative").unwrap();
        assert_eq!(profile.generation.mode, GenerationMode::Conservative);
    }

    #[test]
    fn deep_nesting_allows_more_recursion() {
        let deep = get_profile("deep-nesting").unwrap();
        assert!(deep.generation.recursion_budget > GenerationConfig::default().recursion_budget);
    }

    #[test]
    fn flat_profile_disables_recursion() {
        let flat = get_profile("flat").unwrap();
        assert_eq!(flat.generation.recursion_budget, 0);
    }

    #[test]
    fn prefixes_name_known_generators() {
        let catalog = Catalog::standard().unwrap();
        for name in available_profiles() {
            let profile = get_profile(name).unwrap();
            for generator in &profile.generation.prefix {
                assert!(catalog.contains(generator), "{name}: unknown prefix {generator}");
            }
            for generator in profile.rules.keys() {
                assert!(catalog.contains(generator), "{name}: unknown rule {generator}");
            }
        }
    }

    #[test]
    fn unknown_profile_lists_available() {
        let err = get_profile("nonexistent").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nonexistent"));
        assert!(msg.contains("default"));
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let profile: Profile = toml::from_str("[generation]\nprogram_size = 7\n").unwrap();
        assert_eq!(profile.generation.program_size, 7);
        assert_eq!(
            profile.generation.recursion_budget,
            GenerationConfig::default().recursion_budget
        );
        assert!(profile.rules.is_empty());
    }
}
