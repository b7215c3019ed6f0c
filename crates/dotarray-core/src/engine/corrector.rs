use super::config::ClosedCorrection;
use super::error::EngineError;
use crate::core::VectorList;
use crate::core::configurations::closed_configurations;
use crate::core::energy::{FreeEnergy, select_configuration};
use itertools::Itertools;
use nalgebra::DVector;
use tracing::trace;

/// Dots that are always branched in a closed array, whatever the threshold.
const MIN_CLOSED_BRANCHED_DOTS: usize = 3;

#[inline]
fn distance_from_half(value: f64) -> f64 {
    (value - value.floor() - 0.5).abs()
}

/// Candidates that branch floor/ceil over `branched` and round every other dot.
///
/// Rounding is half-to-even. The floor choice precedes the ceil choice and the last branched
/// dot varies fastest, so the first candidate floors every branched dot.
fn branch_candidates(n_continuous: &DVector<f64>, branched: &[usize]) -> VectorList {
    let base = n_continuous.map(f64::round_ties_even);

    if branched.is_empty() {
        return vec![base];
    }

    branched
        .iter()
        .map(|_| [false, true])
        .multi_cartesian_product()
        .map(|choices| {
            let mut candidate = base.clone();
            for (&dot, ceil) in branched.iter().zip(choices) {
                candidate[dot] = if ceil {
                    n_continuous[dot].ceil()
                } else {
                    n_continuous[dot].floor()
                };
            }
            candidate
        })
        .collect()
}

/// Open-array neighbourhood: a dot branches when `|remainder - 0.5| < threshold / 2`.
pub fn open_candidates(n_continuous: &DVector<f64>, threshold: f64) -> VectorList {
    let branched: Vec<usize> = n_continuous
        .iter()
        .positions(|&value| distance_from_half(value) < threshold / 2.0)
        .collect();
    branch_candidates(n_continuous, &branched)
}

/// Closed-array branching neighbourhood.
///
/// Dots are ranked by how close their remainder is to one half. The
/// `max(#(distance <= threshold / 2), min(n_dot, 3))` least certain dots branch; the branched
/// set is then enumerated in dot order. Candidates are not filtered by total charge here.
pub fn closed_branching_candidates(n_continuous: &DVector<f64>, threshold: f64) -> VectorList {
    let n_dot = n_continuous.len();
    let distances: Vec<f64> = n_continuous.iter().map(|&v| distance_from_half(v)).collect();

    let mut ranked: Vec<usize> = (0..n_dot).collect();
    ranked.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

    let implied = distances.iter().filter(|&&d| d <= threshold / 2.0).count();
    let n_branched = implied.max(n_dot.min(MIN_CLOSED_BRANCHED_DOTS));

    let mut branched = ranked[..n_branched].to_vec();
    branched.sort_unstable();
    branch_candidates(n_continuous, &branched)
}

/// Recovers an integer (or, at finite temperature, thermally averaged) occupation from a
/// relaxed one by scoring a small neighbourhood of integer candidates.
#[derive(Debug, Clone, Copy)]
pub struct IntegerCorrector<'a> {
    energy: FreeEnergy<'a>,
    threshold: f64,
    temperature: f64,
    max_charge_carriers: Option<u32>,
}

impl<'a> IntegerCorrector<'a> {
    pub fn new(
        energy: FreeEnergy<'a>,
        threshold: f64,
        temperature: f64,
        max_charge_carriers: Option<u32>,
    ) -> Self {
        Self {
            energy,
            threshold,
            temperature,
            max_charge_carriers,
        }
    }

    fn within_bound(&self, candidate: &DVector<f64>) -> bool {
        self.max_charge_carriers
            .is_none_or(|n_max| candidate.iter().all(|&n| n <= f64::from(n_max)))
    }

    fn select(&self, candidates: &[DVector<f64>], v: &DVector<f64>) -> Option<DVector<f64>> {
        let energies = self.energy.evaluate_all(candidates, v);
        select_configuration(candidates, &energies, self.temperature)
    }

    pub fn correct_open(
        &self,
        n_continuous: &DVector<f64>,
        v: &DVector<f64>,
    ) -> Result<DVector<f64>, EngineError> {
        let candidates = open_candidates(n_continuous, self.threshold);
        trace!(candidates = candidates.len(), "Scoring open-array candidates.");
        self.select(&candidates, v).ok_or_else(|| {
            EngineError::Internal("open-array candidate set is never empty".to_string())
        })
    }

    pub fn correct_closed(
        &self,
        n_continuous: &DVector<f64>,
        v: &DVector<f64>,
        n_charge: u32,
        strategy: ClosedCorrection,
    ) -> Result<DVector<f64>, EngineError> {
        let target = f64::from(n_charge);

        let mut candidates: VectorList = match strategy {
            ClosedCorrection::Combinatorial => Vec::new(),
            ClosedCorrection::Branching => closed_branching_candidates(n_continuous, self.threshold)
                .into_iter()
                .filter(|candidate| candidate.sum() == target && self.within_bound(candidate))
                .collect(),
        };

        if candidates.is_empty() {
            if strategy == ClosedCorrection::Branching {
                trace!("No branched candidate conserves charge, using the combinatorial set.");
            }
            candidates = closed_configurations(n_continuous, n_charge)
                .into_iter()
                .filter(|candidate| self.within_bound(candidate))
                .collect();
        }

        trace!(candidates = candidates.len(), "Scoring closed-array candidates.");
        self.select(&candidates, v)
            .ok_or_else(|| EngineError::Infeasible {
                n_charge,
                reason: format!(
                    "no floor/ceil combination of {:?} sums to the target",
                    n_continuous.as_slice()
                ),
            })
    }
}
