// Creative-direction sampling
//
// Each generation call gets a fresh random subset of guidance phrases from the
// persona's catalog so successive calls steer the model toward different angles.

use rand::seq::SliceRandom;
use rand::Rng;

/// Pick `count` distinct entries from `catalog`, uniformly without replacement.
///
/// The catalog must already be free of duplicates; `RefineLoop::new` runs
/// `Persona::normalize_directions` before any sampling.
///
/// Asking for more entries than the catalog holds returns the whole catalog
/// in random order; callers validate the count up front.
pub fn sample_directions(catalog: &[String], count: usize) -> Vec<String> {
    sample_directions_with(&mut rand::thread_rng(), catalog, count)
}

/// Same as [`sample_directions`] with a caller-supplied RNG.
pub fn sample_directions_with<R: Rng + ?Sized>(
    rng: &mut R,
    catalog: &[String],
    count: usize,
) -> Vec<String> {
    if count > catalog.len() {
        tracing::warn!(
            requested = count,
            available = catalog.len(),
            "Direction count exceeds catalog size; using the whole catalog"
        );
    }
    catalog
        .choose_multiple(rng, count.min(catalog.len()))
        .cloned()
        .collect()
}

/// Render sampled directions as a numbered list for a prompt.
pub fn format_directions(directions: &[String]) -> String {
    directions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {}", i + 1, d))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn catalog(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("direction {i}")).collect()
    }

    #[test]
    fn test_sample_returns_distinct_members() {
        let cat = catalog(12);
        for _ in 0..50 {
            let picked = sample_directions(&cat, 4);
            assert_eq!(picked.len(), 4);
            let unique: HashSet<&String> = picked.iter().collect();
            assert_eq!(unique.len(), 4);
            assert!(picked.iter().all(|d| cat.contains(d)));
        }
    }

    #[test]
    fn test_sample_varies_between_calls() {
        let cat = catalog(20);
        let first = sample_directions(&cat, 5);
        // 20C5 = 15504 subsets; 20 identical draws in a row would mean no randomness
        let all_same = (0..20).all(|_| {
            let mut a = first.clone();
            let mut b = sample_directions(&cat, 5);
            a.sort();
            b.sort();
            a == b
        });
        assert!(!all_same);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let cat = catalog(10);
        let a = sample_directions_with(&mut SmallRng::seed_from_u64(7), &cat, 3);
        let b = sample_directions_with(&mut SmallRng::seed_from_u64(7), &cat, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_count_above_catalog_is_clamped() {
        let cat = catalog(3);
        assert_eq!(sample_directions(&cat, 10).len(), 3);
        assert!(sample_directions(&[], 2).is_empty());
        assert!(sample_directions(&cat, 0).is_empty());
    }

    #[test]
    fn test_format_directions_numbered() {
        let text = format_directions(&["Go small".to_string(), "Go big".to_string()]);
        assert_eq!(text, "1. Go small\n2. Go big");
    }
}
