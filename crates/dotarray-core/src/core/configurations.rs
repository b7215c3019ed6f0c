use super::VectorList;
use itertools::Itertools;
use nalgebra::DVector;
use thiserror::Error;

/// Upper bound on the number of configurations the brute-force generators will build.
pub const MAX_BRUTE_FORCE_CONFIGURATIONS: usize = 1 << 22;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error(
        "Brute-force enumeration of {n_dot} dots with up to {n_max} charges each needs more than {limit} configurations"
    )]
    TooManyConfigurations {
        n_dot: usize,
        n_max: u32,
        limit: usize,
    },
}

fn brute_force_size(n_dot: usize, n_max: u32) -> Option<usize> {
    let base = usize::try_from(n_max).ok()?.checked_add(1)?;
    let exponent = u32::try_from(n_dot).ok()?;
    base.checked_pow(exponent)
}

/// Every occupation vector with `0 <= n_i <= n_max` on each of `n_dot` dots.
///
/// Vectors are produced in lexicographic order with the last dot varying fastest, so the
/// first vector is all zeros.
pub fn open_configurations(n_dot: usize, n_max: u32) -> Result<VectorList, GenerationError> {
    match brute_force_size(n_dot, n_max) {
        Some(size) if size <= MAX_BRUTE_FORCE_CONFIGURATIONS => {}
        _ => {
            return Err(GenerationError::TooManyConfigurations {
                n_dot,
                n_max,
                limit: MAX_BRUTE_FORCE_CONFIGURATIONS,
            });
        }
    }

    Ok((0..n_dot)
        .map(|_| 0..=n_max)
        .multi_cartesian_product()
        .map(|occupation| DVector::from_iterator(n_dot, occupation.into_iter().map(f64::from)))
        .collect())
}

/// Every occupation vector with `0 <= n_i <= min(n_charge, n_max)` whose total is `n_charge`.
///
/// The order is that of [`open_configurations`] with the non-conserving vectors removed.
pub fn closed_configurations_brute_force(
    n_dot: usize,
    n_charge: u32,
    n_max: Option<u32>,
) -> Result<VectorList, GenerationError> {
    let per_dot = n_max.map_or(n_charge, |n_max| n_max.min(n_charge));
    let target = f64::from(n_charge);
    Ok(open_configurations(n_dot, per_dot)?
        .into_iter()
        .filter(|n| n.sum() == target)
        .collect())
}

/// Closed-array configurations adjacent to a continuous occupation.
///
/// Each dot takes either `floor(n_i)` or `floor(n_i) + 1`, and only the combinations holding
/// exactly `n_charge` charges are kept. The order is lexicographic over the binary choice
/// (floor before floor + 1, last dot varying fastest).
///
/// Returns an empty list when the achievable totals do not bracket `n_charge`.
pub fn closed_configurations(n_continuous: &DVector<f64>, n_charge: u32) -> VectorList {
    let n_dot = n_continuous.len();
    let floor = n_continuous.map(f64::floor);
    let floor_total = floor.sum();
    let missing = f64::from(n_charge) - floor_total;

    if missing < 0.0 || missing > n_dot as f64 {
        return Vec::new();
    }

    // `combinations` walks index sets in ascending order, which is the reverse of the
    // lexicographic order of the binary choice vectors.
    let mut increments: Vec<Vec<usize>> = (0..n_dot).combinations(missing as usize).collect();
    increments.reverse();

    increments
        .into_iter()
        .map(|indices| {
            let mut occupation = floor.clone();
            for idx in indices {
                occupation[idx] += 1.0;
            }
            occupation
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn open_configurations_enumerates_full_cartesian_product() {
        let configurations = open_configurations(2, 2).unwrap();
        assert_eq!(configurations.len(), 9);
        assert_eq!(configurations[0], vector(&[0.0, 0.0]));
        assert_eq!(configurations[1], vector(&[0.0, 1.0]));
        assert_eq!(configurations[3], vector(&[1.0, 0.0]));
        assert_eq!(configurations[8], vector(&[2.0, 2.0]));
    }

    #[test]
    fn open_configurations_refuses_combinatorial_blow_up() {
        assert!(matches!(
            open_configurations(40, 3),
            Err(GenerationError::TooManyConfigurations { n_dot: 40, .. })
        ));
    }

    #[test]
    fn closed_brute_force_keeps_only_conserving_vectors() {
        let configurations = closed_configurations_brute_force(3, 2, None).unwrap();
        assert_eq!(configurations.len(), 6);
        assert!(configurations.iter().all(|n| n.sum() == 2.0));
        assert_eq!(configurations[0], vector(&[0.0, 0.0, 2.0]));
    }

    #[test]
    fn closed_brute_force_respects_per_dot_bound() {
        let configurations = closed_configurations_brute_force(2, 2, Some(1)).unwrap();
        assert_eq!(configurations, vec![vector(&[1.0, 1.0])]);
    }

    #[test]
    fn closed_brute_force_is_empty_when_charge_exceeds_capacity() {
        let configurations = closed_configurations_brute_force(2, 3, Some(1)).unwrap();
        assert!(configurations.is_empty());
    }

    #[test]
    fn closed_configurations_follow_binary_lexicographic_order() {
        let configurations = closed_configurations(&vector(&[0.4, 0.5, 0.6]), 2);
        assert_eq!(
            configurations,
            vec![
                vector(&[0.0, 1.0, 1.0]),
                vector(&[1.0, 0.0, 1.0]),
                vector(&[1.0, 1.0, 0.0]),
            ]
        );
    }

    #[test]
    fn closed_configurations_start_from_floor_values() {
        let configurations = closed_configurations(&vector(&[1.2, 0.7]), 2);
        assert_eq!(
            configurations,
            vec![vector(&[1.0, 1.0]), vector(&[2.0, 0.0])]
        );
    }

    #[test]
    fn closed_configurations_accept_exact_integer_input() {
        let configurations = closed_configurations(&vector(&[1.0, 0.0]), 1);
        assert_eq!(configurations, vec![vector(&[1.0, 0.0])]);
    }

    #[test]
    fn closed_configurations_empty_when_floor_total_too_large() {
        assert!(closed_configurations(&vector(&[2.5, 1.5]), 2).is_empty());
    }

    #[test]
    fn closed_configurations_empty_when_ceiling_total_too_small() {
        assert!(closed_configurations(&vector(&[0.2, 0.3]), 3).is_empty());
    }
}
