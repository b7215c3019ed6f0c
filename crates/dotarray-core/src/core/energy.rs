use nalgebra::{DMatrix, DVector};

/// The electrostatic free energy `F(n) = (n - v)ᵀ Cdd⁻¹ (n - v)` of a dot array.
///
/// `v = Cgd · vg` is the voltage-induced charge target. This is the single place the energy
/// of a charge configuration is evaluated: the relaxation minimizes it over continuous
/// occupations and the integer correction ranks candidates with it.
#[derive(Debug, Clone, Copy)]
pub struct FreeEnergy<'a> {
    cdd_inv: &'a DMatrix<f64>,
}

impl<'a> FreeEnergy<'a> {
    pub fn new(cdd_inv: &'a DMatrix<f64>) -> Self {
        Self { cdd_inv }
    }

    #[inline]
    pub fn evaluate(&self, n: &DVector<f64>, v: &DVector<f64>) -> f64 {
        let delta = n - v;
        delta.dot(&(self.cdd_inv * &delta))
    }

    pub fn evaluate_all(&self, candidates: &[DVector<f64>], v: &DVector<f64>) -> Vec<f64> {
        candidates.iter().map(|n| self.evaluate(n, v)).collect()
    }
}

/// Picks the configuration to report from a scored candidate set.
///
/// At zero temperature this is the minimum-energy candidate; ties go to the candidate that
/// appears first, so the generation order of the candidates fixes the result. At a positive
/// temperature the result is the Boltzmann-weighted average `Σ n · softmax(-F/T)`, which is
/// in general not an integer vector.
///
/// Returns `None` for an empty candidate set.
pub fn select_configuration(
    candidates: &[DVector<f64>],
    energies: &[f64],
    temperature: f64,
) -> Option<DVector<f64>> {
    debug_assert_eq!(candidates.len(), energies.len());

    let mut best: Option<(usize, f64)> = None;
    for (idx, &energy) in energies.iter().enumerate() {
        if energy.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, best_energy)| energy < best_energy) {
            best = Some((idx, energy));
        }
    }
    let (min_idx, min_energy) = best?;

    if temperature <= 0.0 {
        return Some(candidates[min_idx].clone());
    }

    // Shifting by the minimum keeps the largest weight at exactly one.
    let weights: Vec<f64> = energies
        .iter()
        .map(|&e| (-(e - min_energy) / temperature).exp())
        .collect();
    let total: f64 = weights.iter().filter(|w| w.is_finite()).sum();

    let mut average = DVector::zeros(candidates[min_idx].len());
    for (candidate, &weight) in candidates.iter().zip(&weights) {
        if weight.is_finite() && weight > 0.0 {
            average.axpy(weight / total, candidate, 1.0);
        }
    }
    Some(average)
}
