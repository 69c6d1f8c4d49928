//! Laws of the selection engine, checked on generated programs.

mod common;

use proptest::prelude::*;

use common::{Parts, Value, evaluate};
use proto_stress::driver;
use proto_stress::lift::lift;
use proto_stress::profile;
use proto_stress::program::{BinaryOperator, Comparator};
use proto_stress::{
    Capability, ContextFlag, ContextSet, GenError, Inputs, Operation, ProgramBuilder, Step,
    resolver,
};

const FUEL: usize = 5_000_000;

/// Integer/boolean fragment the evaluator understands.
const ARITHMETIC: &[&str] = &["integer", "boolean", "comparison", "phi", "reassignment"];

fn with_arithmetic(extra: &[&'static str]) -> Vec<&'static str> {
    let mut names = extra.to_vec();
    names.extend_from_slice(ARITHMETIC);
    names
}

// ---------------------------------------------------------------------------
// Context filtering
// ---------------------------------------------------------------------------

#[test]
fn only_generators_legal_in_the_current_context_run() {
    for mask in 0u8..64 {
        let flags: Vec<ContextFlag> = ContextFlag::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, f)| *f)
            .collect();
        let expected = ContextSet::from_flags(&flags);

        let mut parts = Parts::standard(u64::from(mask));
        let catalog = &parts.catalog;
        let mut b = ProgramBuilder::new(&mut parts.rng, catalog, &parts.params, &parts.config);
        b.load_int(1);
        b.load_bool(true);
        b.create_object(Vec::new());

        b.nested(&flags, |b| {
            assert_eq!(b.current_context(), expected);
            for name in b.eligible_generators() {
                let required = catalog.lookup(name)?.required_context();
                assert!(
                    required.is_subset_of(expected),
                    "{name} eligible in {expected}"
                );
            }
            for generator in catalog.iter() {
                if !generator.required_context().is_subset_of(expected) {
                    let err = b.run_generator(generator.name()).unwrap_err();
                    assert!(
                        matches!(err, GenError::ContextViolation { .. }),
                        "{}: {err}",
                        generator.name()
                    );
                }
            }
            if let Step::Applied { generator, .. } | Step::NoOp { generator } =
                b.run_one_step()?
            {
                let required = catalog.lookup(generator)?.required_context();
                assert!(required.is_subset_of(expected));
            }
            Ok(())
        })
        .unwrap();

        assert!(b.context().is_empty(), "mask {mask:#08b}");
    }
}

#[test]
fn function_body_hides_enclosing_loop() {
    let mut parts = Parts::standard(1);
    let mut b = parts.builder();
    b.nested(&[ContextFlag::Loop, ContextFlag::With], |b| {
        b.nested(&[ContextFlag::Function], |b| {
            let current = b.current_context();
            assert!(current.contains(ContextFlag::Function));
            assert!(current.contains(ContextFlag::With));
            assert!(!current.contains(ContextFlag::Loop));
            assert!(!b.eligible_generators().contains(&"break"));
            Ok(())
        })
    })
    .unwrap();
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

fn needs_more_than_anything(parts: &Parts, name: &str) -> bool {
    let generator = parts.catalog.lookup(name).unwrap();
    generator
        .inputs()
        .slots()
        .into_iter()
        .any(|cap| cap != Capability::Anything)
}

#[test]
fn empty_pool_admits_only_unconstrained_generators() {
    let mut parts = Parts::standard(3);
    let eligible = parts.builder().eligible_generators();
    assert!(!eligible.is_empty());
    for name in eligible {
        assert!(!needs_more_than_anything(&parts, name), "{name}");
    }
}

#[test]
fn primitive_pool_never_selects_object_generators() {
    let mut parts = Parts::standard(4);
    let eligible = {
        let mut b = parts.builder();
        b.load_int(1);
        b.load_string("s");
        b.load_float(0.5);
        b.eligible_generators()
    };
    for name in eligible {
        assert!(!needs_more_than_anything(&parts, name), "{name}");
    }
}

// ---------------------------------------------------------------------------
// Phi merges
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn if_else_phi_holds_the_taken_branch_merge(seed in any::<u64>(), taken in any::<bool>()) {
        let mut parts = Parts::subset(&with_arithmetic(&["if_else"]), seed);
        parts.config.recursion_budget = 3;
        let mut b = parts.builder();
        b.load_int(7);
        let condition = b.load_bool(taken);
        let step = b.run_generator_with("if_else", Inputs::One(condition)).unwrap();
        prop_assert!(step.is_applied());
        let program = b.finish();

        let ops = program.operations();
        let begin = ops
            .iter()
            .position(|op| matches!(op, Operation::BeginIf { .. }))
            .unwrap();
        let Operation::Phi { output: phi, .. } = ops[begin - 1] else {
            panic!("if_else must define its phi first");
        };

        let trace = evaluate(&program, FUEL).unwrap();
        let else_index = trace.partners[&begin];
        let merges = trace.merges_into(phi);
        prop_assert_eq!(merges.len(), 1);
        prop_assert_eq!(merges[0].index < else_index, taken);
        prop_assert_eq!(trace.value(phi), Some(merges[0].value));
    }

    #[test]
    fn loop_phi_holds_the_final_iteration_merge(seed in any::<u64>(), kind in 0usize..3) {
        let name = ["while_loop", "do_while_loop", "for_loop"][kind];
        let mut parts = Parts::subset(&with_arithmetic(&[name, "if_else", "continue"]), seed);
        parts.config.recursion_budget = 3;
        let mut b = parts.builder();
        prop_assert!(b.run_generator(name).unwrap().is_applied());
        let program = b.finish();

        let trace = evaluate(&program, FUEL).unwrap();
        let ops = program.operations();
        let head = ops
            .iter()
            .position(|op| {
                matches!(
                    op,
                    Operation::BeginWhile { .. }
                        | Operation::BeginDoWhile
                        | Operation::BeginFor { .. }
                )
            })
            .unwrap();
        let (counter, end) = match &ops[head] {
            Operation::BeginWhile { lhs, rhs, .. } => (*lhs, *rhs),
            Operation::BeginFor { counter, end, .. } => (*counter, *end),
            _ => match &ops[trace.partners[&head]] {
                Operation::EndDoWhile { lhs, rhs, .. } => (*lhs, *rhs),
                other => panic!("unexpected loop end {other:?}"),
            },
        };

        let Some(Value::Int(bound)) = trace.value(end) else {
            panic!("loop bound must be an integer");
        };
        let iterations = if name == "do_while_loop" { bound.max(1) } else { bound };
        let merges = trace.merges_into(counter);
        prop_assert_eq!(merges.len() as i64, iterations);

        let expected = merges.last().map_or(Value::Int(0), |m| m.value);
        prop_assert_eq!(trace.value(counter), Some(expected));
        prop_assert_eq!(expected, Value::Int(iterations));
    }
}

#[test]
fn continue_in_for_body_still_advances_the_counter() {
    let mut parts = Parts::subset(&["continue"], 2);
    let mut b = parts.builder();
    let start = b.load_int(0);
    let end = b.load_int(5);
    let step = b.load_int(1);
    let counter = b
        .for_loop(start, Comparator::LessThan, end, BinaryOperator::Add, step, |b, _| {
            assert!(b.run_generator("continue")?.is_applied());
            Ok(())
        })
        .unwrap();
    let program = b.finish();
    assert_eq!(program.check(), Ok(()));
    assert!(lift(&program).contains("for (; v3 < v1; v3 = v3 + v2) {\n    continue;\n}"));

    let trace = evaluate(&program, 1_000).unwrap();
    assert_eq!(trace.merges_into(counter).len(), 5);
    assert_eq!(trace.value(counter), Some(Value::Int(5)));
}

#[test]
fn continue_never_starves_generated_loops() {
    for name in ["while_loop", "do_while_loop", "for_loop"] {
        for seed in 0..20 {
            let mut parts = Parts::subset(&[name, "continue", "integer"], seed);
            let mut b = parts.builder();
            b.run_generator(name).unwrap();
            let program = b.finish();
            assert!(
                evaluate(&program, FUEL).is_ok(),
                "{name} seed {seed}:\n{}",
                lift(&program)
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Budget and stack discipline
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn nesting_never_exceeds_budget(seed in any::<u64>(), budget in 0usize..6) {
        let mut parts = Parts::standard(seed);
        parts.config.recursion_budget = budget;
        parts.config.program_size = 40;
        let generated = driver::generate(seed, &parts.catalog, &parts.params, &parts.config).unwrap();
        prop_assert!(generated.deepest_nesting <= budget);
    }

    #[test]
    fn every_step_leaves_the_engine_at_top_level(seed in any::<u64>()) {
        let mut parts = Parts::standard(seed);
        let budget = parts.config.recursion_budget;
        let mut b = parts.builder();
        for _ in 0..30 {
            b.run_one_step().unwrap();
            prop_assert!(b.context().is_empty());
            prop_assert_eq!(b.pool().scope_depth(), 1);
            prop_assert_eq!(b.nesting(), 0);
            prop_assert_eq!(b.budget(), budget);
        }
        prop_assert!(b.program().check().is_ok());
    }

    #[test]
    fn same_seed_builds_the_same_program(seed in any::<u64>()) {
        let parts = Parts::standard(seed);
        let a = driver::generate(seed, &parts.catalog, &parts.params, &parts.config).unwrap();
        let b = driver::generate(seed, &parts.catalog, &parts.params, &parts.config).unwrap();
        prop_assert_eq!(a.program, b.program);
    }
}

#[test]
fn nested_growth_stops_near_program_size() {
    let profile = profile::get_profile("deep-nesting").unwrap();
    let parts = Parts::standard(0);
    let params = resolver::resolve(&parts.catalog, Some(&profile.rules));
    let config = profile.generation;
    for seed in 0..20 {
        let generated = driver::generate(seed, &parts.catalog, &params, &config).unwrap();
        assert!(
            generated.program.len() <= 2 * config.program_size,
            "seed {seed}: {} operations",
            generated.program.len()
        );
    }
}

#[test]
fn zero_budget_bodies_hold_only_their_merge() {
    let mut parts = Parts::subset(&with_arithmetic(&["if_else"]), 9);
    parts.config.recursion_budget = 0;
    let mut b = parts.builder();
    let condition = b.load_bool(true);
    b.run_generator_with("if_else", Inputs::One(condition))
        .unwrap();
    assert_eq!(b.deepest_nesting(), 0);

    let program = b.finish();
    let ops = program.operations();
    let begin = ops
        .iter()
        .position(|op| matches!(op, Operation::BeginIf { .. }))
        .unwrap();
    assert!(matches!(ops[begin + 1], Operation::Copy { .. }));
    assert!(matches!(ops[begin + 2], Operation::BeginElse));
    assert!(matches!(ops[begin + 3], Operation::Copy { .. }));
    assert!(matches!(ops[begin + 4], Operation::EndIf));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn unknown_generator_changes_nothing() {
    let mut parts = Parts::standard(5);
    let mut b = parts.builder();
    b.load_int(1);
    let before = b.program().clone();
    let visible = b.pool().len();

    let err = b.run_generator("NoSuchGenerator").unwrap_err();
    assert!(matches!(err, GenError::UnknownGenerator { .. }));
    assert_eq!(b.program(), &before);
    assert_eq!(b.pool().len(), visible);
}

#[test]
fn if_else_bodies_each_end_in_one_merge() {
    let mut parts = Parts::standard(11);
    let mut b = parts.builder();
    b.load_bool(false);
    let value = b.load_int(1);
    b.create_object(vec![("x".to_string(), value)]);
    assert!(b.run_generator("if_else").unwrap().is_applied());
    let program = b.finish();

    let ops = program.operations();
    let begin = ops
        .iter()
        .position(|op| matches!(op, Operation::BeginIf { .. }))
        .unwrap();
    let Operation::Phi { output: phi, .. } = ops[begin - 1] else {
        panic!("if_else must define its phi first");
    };
    let mut depth = 0usize;
    let else_index = (begin + 1..ops.len())
        .find(|&i| match ops[i] {
            Operation::BeginIf { .. } => {
                depth += 1;
                false
            }
            Operation::EndIf => {
                depth -= 1;
                false
            }
            Operation::BeginElse => depth == 0,
            _ => false,
        })
        .unwrap();
    let end_index = ops.len() - 1;
    assert!(matches!(ops[end_index], Operation::EndIf));
    assert!(matches!(ops[else_index - 1], Operation::Copy { target, .. } if target == phi));
    assert!(matches!(ops[end_index - 1], Operation::Copy { target, .. } if target == phi));
    let merges = ops
        .iter()
        .filter(|op| matches!(op, Operation::Copy { target, .. } if *target == phi))
        .count();
    assert_eq!(merges, 2);
}

#[test]
fn property_retrieval_prefers_known_names() {
    let trials = 400;
    let mut known = 0;
    for seed in 0..trials {
        let mut parts = Parts::subset(&["property_retrieval"], seed);
        let mut b = parts.builder();
        let value = b.load_int(1);
        let object = b.create_object(vec![("x".to_string(), value)]);
        b.run_generator_with("property_retrieval", Inputs::One(object))
            .unwrap();
        let program = b.finish();
        if let Some(Operation::LoadProperty { name, .. }) = program.operations().last()
            && name == "x"
        {
            known += 1;
        }
    }
    let ratio = f64::from(known) / trials as f64;
    assert!((0.8..=0.97).contains(&ratio), "ratio {ratio}");
}

#[test]
fn embedded_profiles_produce_well_formed_programs() {
    for name in profile::available_profiles() {
        let profile = profile::get_profile(name).unwrap();
        let parts = Parts::standard(0);
        let params = resolver::resolve(&parts.catalog, Some(&profile.rules));
        let mut config = profile.generation;
        config.validate = true;
        for seed in 0..5 {
            let generated = driver::generate(seed, &parts.catalog, &params, &config)
                .unwrap_or_else(|e| panic!("{name} seed {seed}: {e}"));
            assert!(generated.program.check().is_ok());
        }
    }
}
