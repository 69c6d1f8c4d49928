//! Random primitives shared by the engine and the generator catalog.
//!
//! All functions take the random source explicitly. There is no ambient RNG:
//! an engine instance owns exactly one source, so a fixed seed reproduces a
//! program exactly.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{GenError, GenResult};

/// Pick one element uniformly at random.
///
/// Fails with [`GenError::EmptyDomain`] when `items` is empty.
pub fn choose_uniform<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> GenResult<&'a T> {
    if items.is_empty() {
        return Err(GenError::EmptyDomain);
    }
    Ok(&items[rng.gen_range(0..items.len())])
}

/// Pick an element with probability proportional to its weight.
///
/// Zero-weight elements are never chosen. Fails when `items` is empty or
/// every weight is zero.
pub fn choose_weighted<'a, T, R, F>(rng: &mut R, items: &'a [T], weight: F) -> GenResult<&'a T>
where
    R: Rng + ?Sized,
    F: Fn(&T) -> usize,
{
    let dist = WeightedIndex::new(items.iter().map(weight)).map_err(|_| GenError::EmptyDomain)?;
    Ok(&items[dist.sample(rng)])
}

/// Return `true` with probability `p`.
///
/// `p` is clamped to `0.0..=1.0`.
pub fn probability<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen_bool(p.clamp(0.0, 1.0))
}

/// Evaluate `then` with probability `p`, otherwise `otherwise`.
pub fn with_probability<R, T>(
    rng: &mut R,
    p: f64,
    then: impl FnOnce() -> T,
    otherwise: impl FnOnce() -> T,
) -> T
where
    R: Rng + ?Sized,
{
    if probability(rng, p) {
        then()
    } else {
        otherwise()
    }
}

/// Evaluate exactly one of `routines`, each with equal probability.
pub fn with_equal_probability<'a, R, T>(
    rng: &mut R,
    routines: Vec<Box<dyn FnOnce() -> T + 'a>>,
) -> GenResult<T>
where
    R: Rng + ?Sized,
{
    if routines.is_empty() {
        return Err(GenError::EmptyDomain);
    }
    let idx = rng.gen_range(0..routines.len());
    let routine = routines
        .into_iter()
        .nth(idx)
        .ok_or(GenError::EmptyDomain)?;
    Ok(routine())
}

/// A random `usize` in the inclusive range `[min, max]`.
///
/// Returns `min` when the range is empty or degenerate.
pub fn random_in<R: Rng + ?Sized>(rng: &mut R, min: usize, max: usize) -> usize {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::cell::Cell;

    fn test_rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn choose_uniform_rejects_empty_domain() {
        let mut rng = test_rng();
        let empty: [u8; 0] = [];
        assert_eq!(choose_uniform(&mut rng, &empty), Err(GenError::EmptyDomain));
    }

    #[test]
    fn choose_uniform_covers_every_element() {
        let mut rng = test_rng();
        let items = ["a", "b", "c"];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let picked = choose_uniform(&mut rng, &items).unwrap();
            let idx = items.iter().position(|i| i == picked).unwrap();
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn choose_weighted_never_picks_zero_weight() {
        let mut rng = test_rng();
        let items = [("never", 0usize), ("always", 5)];
        for _ in 0..100 {
            let (name, _) = choose_weighted(&mut rng, &items, |(_, w)| *w).unwrap();
            assert_eq!(*name, "always");
        }
    }

    #[test]
    fn choose_weighted_all_zero_is_empty_domain() {
        let mut rng = test_rng();
        let items = [0usize, 0];
        assert_eq!(
            choose_weighted(&mut rng, &items, |w| *w),
            Err(GenError::EmptyDomain)
        );
    }

    #[test]
    fn probability_extremes() {
        let mut rng = test_rng();
        for _ in 0..50 {
            assert!(probability(&mut rng, 1.0));
            assert!(!probability(&mut rng, 0.0));
            // Out-of-range values are clamped rather than panicking.
            assert!(probability(&mut rng, 7.0));
            assert!(!probability(&mut rng, -1.0));
        }
    }

    #[test]
    fn with_probability_runs_exactly_one_branch() {
        let mut rng = test_rng();
        for p in [0.0, 0.3, 1.0] {
            let calls = Cell::new(0);
            with_probability(
                &mut rng,
                p,
                || calls.set(calls.get() + 1),
                || calls.set(calls.get() + 1),
            );
            assert_eq!(calls.get(), 1);
        }
    }

    #[test]
    fn with_equal_probability_runs_only_the_selected_routine() {
        let mut rng = test_rng();
        let hits = [Cell::new(0), Cell::new(0), Cell::new(0)];
        for _ in 0..300 {
            let routines: Vec<Box<dyn FnOnce() -> usize + '_>> = vec![
                Box::new(|| {
                    hits[0].set(hits[0].get() + 1);
                    0
                }),
                Box::new(|| {
                    hits[1].set(hits[1].get() + 1);
                    1
                }),
                Box::new(|| {
                    hits[2].set(hits[2].get() + 1);
                    2
                }),
            ];
            let picked = with_equal_probability(&mut rng, routines).unwrap();
            assert!(picked < 3);
        }
        let total: i32 = hits.iter().map(Cell::get).sum();
        assert_eq!(total, 300);
        assert!(hits.iter().all(|h| h.get() > 50));
    }

    #[test]
    fn with_equal_probability_rejects_empty() {
        let mut rng = test_rng();
        let routines: Vec<Box<dyn FnOnce() -> u8>> = Vec::new();
        assert_eq!(
            with_equal_probability(&mut rng, routines),
            Err(GenError::EmptyDomain)
        );
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = test_rng();
        let mut b = test_rng();
        let items: Vec<u32> = (0..100).collect();
        for _ in 0..50 {
            assert_eq!(
                choose_uniform(&mut a, &items).unwrap(),
                choose_uniform(&mut b, &items).unwrap()
            );
        }
    }

    #[test]
    fn random_in_degenerate_range() {
        let mut rng = test_rng();
        assert_eq!(random_in(&mut rng, 4, 4), 4);
        assert_eq!(random_in(&mut rng, 5, 2), 5);
        for _ in 0..50 {
            let v = random_in(&mut rng, 1, 3);
            assert!((1..=3).contains(&v));
        }
    }
}
