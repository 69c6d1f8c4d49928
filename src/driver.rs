//! Per-program generation loop.
//!
//! One call builds one program with its own engine instance and random
//! source. Programs share nothing but the read-only catalog, parameters and
//! configuration, so callers may generate many in parallel.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error};

use crate::builder::ProgramBuilder;
use crate::catalog::Catalog;
use crate::error::GenResult;
use crate::profile::GenerationConfig;
use crate::program::Program;
use crate::resolver::ResolvedParams;

/// A finished program and a few facts about how it was built.
#[derive(Debug, Clone)]
pub struct Generated {
    pub seed: u64,
    pub program: Program,
    /// Top-level steps that applied a generator, prefix included.
    pub applied_steps: usize,
    pub deepest_nesting: usize,
    /// Generation stopped early because nothing applied for too long.
    pub stalled: bool,
}

/// Generate one program from `seed`.
///
/// Runs the configured prefix, then top-level steps until the program
/// reaches `program_size` operations or `max_stalled_steps` steps in a row
/// apply nothing. Any fatal fault aborts this program only.
pub fn generate(
    seed: u64,
    catalog: &Catalog,
    params: &ResolvedParams,
    config: &GenerationConfig,
) -> GenResult<Generated> {
    let _span = tracing::info_span!("generate", seed).entered();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = ProgramBuilder::new(&mut rng, catalog, params, config);

    let result = run(&mut builder, config);
    let (applied_steps, stalled) = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(seed, error = %err, "program aborted");
            return Err(err);
        }
    };

    let deepest_nesting = builder.deepest_nesting();
    let program = builder.finish();
    if config.validate {
        program.check()?;
    }
    debug!(
        seed,
        operations = program.len(),
        applied_steps,
        deepest_nesting,
        stalled,
        "program generated"
    );
    Ok(Generated {
        seed,
        program,
        applied_steps,
        deepest_nesting,
        stalled,
    })
}

fn run(builder: &mut ProgramBuilder<'_>, config: &GenerationConfig) -> GenResult<(usize, bool)> {
    let mut applied = 0;
    for name in &config.prefix {
        if builder.run_generator(name)?.is_applied() {
            applied += 1;
        }
    }

    let mut stalled_steps = 0;
    while builder.program().len() < config.program_size {
        if builder.run_one_step()?.is_applied() {
            applied += 1;
            stalled_steps = 0;
        } else {
            stalled_steps += 1;
            if stalled_steps >= config.max_stalled_steps {
                return Ok((applied, true));
            }
        }
    }
    Ok((applied, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenError;
    use crate::resolver;

    fn standard() -> (Catalog, ResolvedParams) {
        let catalog = Catalog::standard().unwrap();
        let params = resolver::resolve(&catalog, None);
        (catalog, params)
    }

    #[test]
    fn same_seed_same_program() {
        let (catalog, params) = standard();
        let config = GenerationConfig::default();
        let a = generate(7, &catalog, &params, &config).unwrap();
        let b = generate(7, &catalog, &params, &config).unwrap();
        assert_eq!(a.program, b.program);
    }

    #[test]
    fn reaches_program_size() {
        let (catalog, params) = standard();
        let config = GenerationConfig::default();
        let generated = generate(1, &catalog, &params, &config).unwrap();
        assert!(generated.program.len() >= config.program_size);
        assert!(!generated.stalled);
    }

    #[test]
    fn unknown_prefix_is_fatal() {
        let (catalog, params) = standard();
        let config = GenerationConfig {
            prefix: vec!["no_such_generator".to_string()],
            ..GenerationConfig::default()
        };
        assert!(matches!(
            generate(1, &catalog, &params, &config),
            Err(GenError::UnknownGenerator { .. })
        ));
    }

    #[test]
    fn stalls_when_nothing_applies() {
        let catalog = Catalog::subset(&["break"]).unwrap();
        let params = resolver::resolve(&catalog, None);
        let config = GenerationConfig {
            prefix: Vec::new(),
            max_stalled_steps: 3,
            ..GenerationConfig::default()
        };
        let generated = generate(1, &catalog, &params, &config).unwrap();
        assert!(generated.stalled);
        assert!(generated.program.is_empty());
    }
}
