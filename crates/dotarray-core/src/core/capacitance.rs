use nalgebra::{DMatrix, DVector};
use thiserror::Error;

const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum CapacitanceError {
    #[error("Matrix '{name}' must be square, got {rows}x{cols}")]
    NotSquare {
        name: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("Cgd has {cgd_rows} rows but Cdd describes {n_dot} dots")]
    DimensionMismatch { n_dot: usize, cgd_rows: usize },

    #[error("Cdd is not symmetric (max asymmetry {asymmetry:.3e})")]
    NotSymmetric { asymmetry: f64 },

    #[error("Cdd is not positive definite")]
    NotPositiveDefinite,

    #[error("Capacitance matrices must contain at least one dot and one gate")]
    Empty,

    #[error("Capacitance matrix '{0}' contains non-finite entries")]
    NonFinite(&'static str),

    #[error("Pseudo-inverse failed: {0}")]
    PseudoInverse(&'static str),
}

/// The Maxwell-form capacitance description of a dot array.
///
/// Holds the dot-dot matrix `Cdd`, its cached inverse and the gate-dot coupling `Cgd`.
/// The model is immutable once built; solvers only ever borrow it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacitanceModel {
    cdd: DMatrix<f64>,
    cdd_inv: DMatrix<f64>,
    cgd: DMatrix<f64>,
}

impl CapacitanceModel {
    /// Builds a model from matrices already in Maxwell form.
    ///
    /// `cdd` must be a symmetric positive-definite `n_dot x n_dot` matrix and `cgd` an
    /// `n_dot x n_gate` matrix.
    pub fn new(cdd: DMatrix<f64>, cgd: DMatrix<f64>) -> Result<Self, CapacitanceError> {
        Self::check_shapes(&cdd, &cgd)?;
        let cdd_inv = Self::spd_inverse(&cdd)?;
        Ok(Self { cdd, cdd_inv, cgd })
    }

    /// Builds a model from `Cdd⁻¹` and `Cgd`, recovering `Cdd` by inversion.
    pub fn from_inverse(
        cdd_inv: DMatrix<f64>,
        cgd: DMatrix<f64>,
    ) -> Result<Self, CapacitanceError> {
        Self::check_shapes(&cdd_inv, &cgd)?;
        let cdd = Self::spd_inverse(&cdd_inv)?;
        Ok(Self { cdd, cdd_inv, cgd })
    }

    /// Builds a model from the raw (non-Maxwell) coupling capacitances.
    ///
    /// The Maxwell dot-dot matrix carries each dot's total capacitance on the diagonal:
    /// `Cdd = diag(Σ_j cdd_ij + Σ_k cgd_ik) - cdd`. The gate coupling keeps its sign, so a
    /// positive gate voltage attracts charge into the dots it couples to.
    pub fn from_non_maxwell(
        cdd_non_maxwell: DMatrix<f64>,
        cgd_non_maxwell: DMatrix<f64>,
    ) -> Result<Self, CapacitanceError> {
        Self::check_shapes(&cdd_non_maxwell, &cgd_non_maxwell)?;

        let total = cdd_non_maxwell.column_sum() + cgd_non_maxwell.column_sum();
        let cdd = DMatrix::from_diagonal(&total) - &cdd_non_maxwell;

        Self::new(cdd, cgd_non_maxwell)
    }

    fn spd_inverse(m: &DMatrix<f64>) -> Result<DMatrix<f64>, CapacitanceError> {
        let asymmetry = (m - m.transpose()).amax();
        if asymmetry > SYMMETRY_TOLERANCE {
            return Err(CapacitanceError::NotSymmetric { asymmetry });
        }
        let cholesky = m
            .clone()
            .cholesky()
            .ok_or(CapacitanceError::NotPositiveDefinite)?;
        Ok(cholesky.inverse())
    }

    fn check_shapes(cdd: &DMatrix<f64>, cgd: &DMatrix<f64>) -> Result<(), CapacitanceError> {
        if cdd.is_empty() || cgd.ncols() == 0 {
            return Err(CapacitanceError::Empty);
        }
        if !cdd.is_square() {
            return Err(CapacitanceError::NotSquare {
                name: "Cdd",
                rows: cdd.nrows(),
                cols: cdd.ncols(),
            });
        }
        if cgd.nrows() != cdd.nrows() {
            return Err(CapacitanceError::DimensionMismatch {
                n_dot: cdd.nrows(),
                cgd_rows: cgd.nrows(),
            });
        }
        if cdd.iter().any(|x| !x.is_finite()) {
            return Err(CapacitanceError::NonFinite("Cdd"));
        }
        if cgd.iter().any(|x| !x.is_finite()) {
            return Err(CapacitanceError::NonFinite("Cgd"));
        }
        Ok(())
    }

    #[inline]
    pub fn n_dot(&self) -> usize {
        self.cdd.nrows()
    }

    #[inline]
    pub fn n_gate(&self) -> usize {
        self.cgd.ncols()
    }

    pub fn cdd(&self) -> &DMatrix<f64> {
        &self.cdd
    }

    pub fn cdd_inv(&self) -> &DMatrix<f64> {
        &self.cdd_inv
    }

    pub fn cgd(&self) -> &DMatrix<f64> {
        &self.cgd
    }

    /// The voltage-induced charge target `v = Cgd · vg`.
    #[inline]
    pub fn induced_charge(&self, vg: &DVector<f64>) -> DVector<f64> {
        &self.cgd * vg
    }

    /// Gate voltages that place the continuous minimum of the free energy at `n_target`.
    ///
    /// Solves the least-squares problem through `pinv(Cgdᵀ Cdd⁻¹ Cgd) Cgdᵀ Cdd⁻¹`, discarding
    /// singular values below `rcond` times the largest one.
    pub fn optimal_vg(
        &self,
        n_target: &DVector<f64>,
        rcond: f64,
    ) -> Result<DVector<f64>, CapacitanceError> {
        if n_target.len() != self.n_dot() {
            return Err(CapacitanceError::DimensionMismatch {
                n_dot: self.n_dot(),
                cgd_rows: n_target.len(),
            });
        }

        let cgd_t_cinv = self.cgd.transpose() * &self.cdd_inv;
        let normal = &cgd_t_cinv * &self.cgd;
        let svd = normal.svd(true, true);
        let cutoff = rcond * svd.singular_values.max();
        let pinv = svd
            .pseudo_inverse(cutoff)
            .map_err(CapacitanceError::PseudoInverse)?;

        Ok(pinv * cgd_t_cinv * n_target)
    }

    /// A threshold large enough to capture the interdot coupling of this array.
    ///
    /// Twice the largest off-diagonal entry of `Cdd` relative to its row's diagonal, clamped
    /// to `[0, 1]`.
    pub fn suggested_threshold(&self) -> f64 {
        let n = self.n_dot();
        let mut max_ratio: f64 = 0.0;
        for i in 0..n {
            let diag = self.cdd[(i, i)];
            for j in 0..n {
                if i != j {
                    max_ratio = max_ratio.max((self.cdd[(i, j)] / diag).abs());
                }
            }
        }
        (2.0 * max_ratio).clamp(0.0, 1.0)
    }
}
