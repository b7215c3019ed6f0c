//! Continuous relaxation of the ground-state problem.
//!
//! The free energy is minimized over real-valued occupations as the convex quadratic program
//!
//! ```text
//! minimize   ½ xᵀ P x + qᵀ x
//! subject to l <= A x <= u
//! ```
//!
//! with `P = Cdd⁻¹` and `q = -Cdd⁻¹ Cgd vg`. Only `q` depends on the gate voltages, so a
//! [`QpWorkspace`] sets up an OSQP problem once and re-solves it for every voltage vector of a
//! batch, warm-started from the previous solution.

use super::config::SolverSettings;
use crate::core::capacitance::CapacitanceModel;
use nalgebra::{DMatrix, DVector};
use osqp::{CscMatrix, PolishStatus, Problem, Settings, Status};
use std::borrow::Cow;
use thiserror::Error;
use tracing::{trace, warn};

/// Iteration cap multiplier of the single escalated re-solve.
const ESCALATION_FACTOR: u32 = 10;
/// Bounds at or beyond this magnitude are treated as infinite by OSQP.
const OSQP_INFINITY: f64 = 1e30;

#[derive(Debug, Error, PartialEq)]
pub enum RelaxError {
    #[error("QP solver did not converge after {iterations} iterations")]
    NotConverged { iterations: u32 },

    #[error("QP solver stopped with status '{0}'")]
    Failed(&'static str),

    #[error("Linear term has length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Gate voltages or linear term contain non-finite values")]
    NonFinite,

    #[error("QP setup failed: {0}")]
    Setup(String),
}

/// The fixed structure of a relaxation problem: `P`, `A` and the bounds `l`, `u`.
#[derive(Debug, Clone, PartialEq)]
pub struct QpProblem {
    p: DMatrix<f64>,
    a: DMatrix<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
    /// Per-dot upper bound applied when clipping a relaxed solution.
    dot_upper: f64,
    /// Total charge of a closed array.
    total: Option<f64>,
}

impl QpProblem {
    /// `n >= 0`, and `n <= n_max` per dot when a bound is given.
    pub fn open(cdd_inv: &DMatrix<f64>, n_max: Option<u32>) -> Self {
        let n_dot = cdd_inv.nrows();
        let dot_upper = n_max.map_or(f64::INFINITY, f64::from);
        Self {
            p: cdd_inv.clone(),
            a: DMatrix::identity(n_dot, n_dot),
            lower: DVector::zeros(n_dot),
            upper: DVector::from_element(n_dot, dot_upper),
            dot_upper,
            total: None,
        }
    }

    /// `Σ n = n_charge` and `0 <= n <= min(n_charge, n_max)` per dot.
    pub fn closed(cdd_inv: &DMatrix<f64>, n_charge: u32, n_max: Option<u32>) -> Self {
        let n_dot = cdd_inv.nrows();
        let total = f64::from(n_charge);
        let dot_upper = n_max.map_or(total, |n_max| f64::from(n_max).min(total));

        let mut a = DMatrix::zeros(n_dot + 1, n_dot);
        a.row_mut(0).fill(1.0);
        a.view_mut((1, 0), (n_dot, n_dot))
            .copy_from(&DMatrix::identity(n_dot, n_dot));

        let mut lower = DVector::zeros(n_dot + 1);
        let mut upper = DVector::from_element(n_dot + 1, dot_upper);
        lower[0] = total;
        upper[0] = total;

        Self {
            p: cdd_inv.clone(),
            a,
            lower,
            upper,
            dot_upper,
            total: Some(total),
        }
    }

    #[inline]
    pub fn n_variables(&self) -> usize {
        self.p.nrows()
    }

    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.a.nrows()
    }

    /// Clips a relaxed solution into the per-dot box `[0, dot_upper]`.
    pub fn clip(&self, x: &DVector<f64>) -> DVector<f64> {
        x.map(|value| value.max(0.0).min(self.dot_upper))
    }

    /// The minimizer with every box constraint inactive, if it lies inside the box.
    ///
    /// Open arrays minimize at `n = v`; closed arrays at
    /// `n = v + Cdd·1 (N - 1ᵀv) / (1ᵀ Cdd 1)`. Either point is the exact optimum whenever it is
    /// feasible.
    pub fn interior_minimum(&self, cdd: &DMatrix<f64>, v: &DVector<f64>) -> Option<DVector<f64>> {
        let n = match self.total {
            None => v.clone(),
            Some(total) => {
                let c_one = cdd.column_sum();
                let lambda = (total - v.sum()) / c_one.sum();
                v + c_one * lambda
            }
        };
        n.iter()
            .all(|&value| (0.0..=self.dot_upper).contains(&value))
            .then_some(n)
    }
}

/// Dense column-major storage of `m`, or of its upper triangle.
fn to_csc(m: &DMatrix<f64>, upper_triangle: bool) -> CscMatrix<'static> {
    let mut indptr = Vec::with_capacity(m.ncols() + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);
    for j in 0..m.ncols() {
        let rows = if upper_triangle { 0..(j + 1).min(m.nrows()) } else { 0..m.nrows() };
        for i in rows {
            indices.push(i);
            data.push(m[(i, j)]);
        }
        indptr.push(indices.len());
    }
    CscMatrix {
        nrows: m.nrows(),
        ncols: m.ncols(),
        indptr: Cow::Owned(indptr),
        indices: Cow::Owned(indices),
        data: Cow::Owned(data),
    }
}

fn finite_bounds(bounds: &DVector<f64>) -> Vec<f64> {
    bounds
        .iter()
        .map(|value| value.clamp(-OSQP_INFINITY, OSQP_INFINITY))
        .collect()
}

/// Outcome of a single QP solve.
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub x: DVector<f64>,
    pub iterations: u32,
    /// Whether OSQP's polish step produced the reported point.
    pub polished: bool,
}

/// Scoped solver state for one regime: the OSQP problem with its factorization and iterate.
///
/// A workspace is created once per batch (or per chunk of a batch) and dropped at its end.
/// It is not shared between threads; every worker acquires its own.
pub struct QpWorkspace<'a> {
    problem: &'a QpProblem,
    solver: Problem,
    max_iterations: u32,
    polish: bool,
}

impl<'a> QpWorkspace<'a> {
    pub fn new(
        problem: &'a QpProblem,
        settings: SolverSettings,
        polish: bool,
    ) -> Result<Self, RelaxError> {
        let max_iterations = u32::try_from(settings.max_iterations).unwrap_or(u32::MAX);
        let osqp_settings = Settings::default()
            .max_iter(max_iterations)
            .eps_abs(settings.eps_abs)
            .eps_rel(settings.eps_rel)
            .rho(settings.rho)
            .sigma(settings.sigma)
            .alpha(settings.alpha)
            .warm_start(settings.warm_start)
            .polish(polish)
            .verbose(false);

        let q = vec![0.0; problem.n_variables()];
        let solver = Problem::new(
            to_csc(&problem.p, true),
            &q,
            to_csc(&problem.a, false),
            &finite_bounds(&problem.lower),
            &finite_bounds(&problem.upper),
            &osqp_settings,
        )
        .map_err(|e| RelaxError::Setup(format!("{e:?}")))?;

        Ok(Self {
            problem,
            solver,
            max_iterations,
            polish,
        })
    }

    pub fn polishes(&self) -> bool {
        self.polish
    }

    /// Replaces the linear term `q`; the factorization and iterate are kept.
    pub fn update_linear_term(&mut self, q: DVector<f64>) -> Result<(), RelaxError> {
        if q.len() != self.problem.n_variables() {
            return Err(RelaxError::DimensionMismatch {
                expected: self.problem.n_variables(),
                actual: q.len(),
            });
        }
        if q.iter().any(|value| !value.is_finite()) {
            return Err(RelaxError::NonFinite);
        }
        self.solver.update_lin_cost(q.as_slice());
        Ok(())
    }

    /// Solves the problem for the current linear term.
    ///
    /// If the iteration cap is hit, the solve continues once with a ten times larger cap
    /// before giving up with [`RelaxError::NotConverged`].
    pub fn solve(&mut self) -> Result<QpSolution, RelaxError> {
        match Self::solution(self.solver.solve())? {
            Some(solution) => Ok(solution),
            None => {
                let escalated_cap = self.max_iterations.saturating_mul(ESCALATION_FACTOR);
                warn!(
                    iterations = self.max_iterations,
                    "QP solver hit its iteration cap, retrying once with a larger cap."
                );
                self.solver.update_max_iter(escalated_cap);
                let outcome = Self::solution(self.solver.solve());
                self.solver.update_max_iter(self.max_iterations);
                outcome?.ok_or(RelaxError::NotConverged {
                    iterations: escalated_cap,
                })
            }
        }
    }

    /// `None` when the iteration cap was reached.
    fn solution(status: Status<'_>) -> Result<Option<QpSolution>, RelaxError> {
        let iterations = status.iter();
        let solution = match status {
            Status::Solved(solution) | Status::SolvedInaccurate(solution) => solution,
            Status::MaxIterationsReached(_) => return Ok(None),
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                return Err(RelaxError::Failed("primal infeasible"));
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                return Err(RelaxError::Failed("dual infeasible"));
            }
            _ => return Err(RelaxError::Failed("unsolved")),
        };
        let polished = matches!(solution.polish_status(), PolishStatus::Successful);
        trace!(iterations, polished, "QP solved.");
        Ok(Some(QpSolution {
            x: DVector::from_column_slice(solution.x()),
            iterations,
            polished,
        }))
    }
}

/// Relaxes one voltage vector at a time against a fixed capacitance model.
pub struct ContinuousRelaxer<'a> {
    model: &'a CapacitanceModel,
    workspace: QpWorkspace<'a>,
}

impl<'a> ContinuousRelaxer<'a> {
    pub fn new(
        model: &'a CapacitanceModel,
        problem: &'a QpProblem,
        settings: SolverSettings,
        polish: bool,
    ) -> Result<Self, RelaxError> {
        Ok(Self {
            model,
            workspace: QpWorkspace::new(problem, settings, polish)?,
        })
    }

    /// Returns the clipped continuous occupation and the induced charge `v = Cgd · vg`.
    ///
    /// An unpolished solution is only accurate to the solver tolerances, which scale with
    /// `‖q‖`; it is replaced by the closed-form minimizer whenever that one is feasible.
    pub fn relax(&mut self, vg: &DVector<f64>) -> Result<(DVector<f64>, DVector<f64>), RelaxError> {
        if vg.iter().any(|value| !value.is_finite()) {
            return Err(RelaxError::NonFinite);
        }
        let v = self.model.induced_charge(vg);
        let q = -(self.model.cdd_inv() * &v);
        self.workspace.update_linear_term(q)?;
        let solution = self.workspace.solve()?;

        let problem = self.workspace.problem;
        if !solution.polished {
            if let Some(exact) = problem.interior_minimum(self.model.cdd(), &v) {
                trace!(
                    iterations = solution.iterations,
                    "Unpolished QP solution replaced by the interior minimum."
                );
                return Ok((exact, v));
            }
        }
        Ok((problem.clip(&solution.x), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_dot() -> CapacitanceModel {
        CapacitanceModel::from_non_maxwell(
            DMatrix::from_row_slice(2, 2, &[0.0, 0.1, 0.1, 0.0]),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 1.0]),
        )
        .unwrap()
    }

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn closed_problem_stacks_total_charge_row_over_identity() {
        let cdd_inv = DMatrix::identity(2, 2);
        let problem = QpProblem::closed(&cdd_inv, 3, None);
        assert_eq!(problem.n_constraints(), 3);
        assert_eq!(problem.a.row(0).sum(), 2.0);
        assert_eq!(problem.lower, vector(&[3.0, 0.0, 0.0]));
        assert_eq!(problem.upper, vector(&[3.0, 3.0, 3.0]));
    }

    #[test]
    fn closed_problem_tightens_box_with_charge_bound() {
        let cdd_inv = DMatrix::identity(2, 2);
        let problem = QpProblem::closed(&cdd_inv, 3, Some(2));
        assert_eq!(problem.upper, vector(&[3.0, 2.0, 2.0]));
    }

    #[test]
    fn clip_bounds_values_to_the_dot_box() {
        let cdd_inv = DMatrix::identity(2, 2);
        let problem = QpProblem::closed(&cdd_inv, 2, None);
        assert_eq!(problem.clip(&vector(&[-0.1, 2.4])), vector(&[0.0, 2.0]));
    }

    #[test]
    fn open_relaxation_matches_unconstrained_minimum_when_inside_the_box() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), None);
        let mut relaxer =
            ContinuousRelaxer::new(&model, &problem, SolverSettings::default(), true).unwrap();

        let (n, v) = relaxer.relax(&vector(&[1.3, 0.6])).unwrap();
        assert!((&n - &v).amax() < 1e-6, "n = {n}, v = {v}");
    }

    #[test]
    fn open_relaxation_clips_negative_charge() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), None);
        let mut relaxer =
            ContinuousRelaxer::new(&model, &problem, SolverSettings::default(), true).unwrap();

        let (n, _) = relaxer.relax(&vector(&[-1.0, -1.0])).unwrap();
        assert!(n.iter().all(|&value| value >= 0.0));
        assert!(n.amax() < 1e-6);
    }

    #[test]
    fn closed_relaxation_conserves_total_charge() {
        let model = double_dot();
        let problem = QpProblem::closed(model.cdd_inv(), 1, None);
        let mut relaxer =
            ContinuousRelaxer::new(&model, &problem, SolverSettings::default(), true).unwrap();

        let (n, _) = relaxer.relax(&vector(&[1.0, 0.0])).unwrap();
        assert!((n.sum() - 1.0).abs() < 1e-5);
        assert!((n[0] - 0.9).abs() < 1e-4, "n = {n}");
    }

    #[test]
    fn polish_recovers_exact_constrained_minimum() {
        let model = double_dot();
        let problem = QpProblem::closed(model.cdd_inv(), 1, None);
        let settings = SolverSettings {
            eps_abs: 1e-3,
            eps_rel: 1e-3,
            ..SolverSettings::default()
        };
        let mut workspace = QpWorkspace::new(&problem, settings, true).unwrap();
        let v = model.induced_charge(&vector(&[1.0, 0.0]));
        workspace
            .update_linear_term(-(model.cdd_inv() * &v))
            .unwrap();

        let solution = workspace.solve().unwrap();
        assert!(solution.polished);
        assert!((solution.x[0] - 0.9).abs() < 1e-7, "x = {}", solution.x);
        assert!((solution.x[1] - 0.1).abs() < 1e-7, "x = {}", solution.x);
    }

    #[test]
    fn workspace_without_polish_reports_unpolished_solution() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), None);
        let mut workspace = QpWorkspace::new(&problem, SolverSettings::default(), false).unwrap();
        assert!(!workspace.polishes());
        workspace.update_linear_term(vector(&[-0.5, -0.5])).unwrap();
        let solution = workspace.solve().unwrap();
        assert!(!solution.polished);
    }

    #[test]
    fn warm_started_resolve_converges_faster_than_cold_start() {
        let model = double_dot();
        let problem = QpProblem::closed(model.cdd_inv(), 2, None);
        let q = -(model.cdd_inv() * model.induced_charge(&vector(&[0.8, 1.1])));

        let mut workspace = QpWorkspace::new(&problem, SolverSettings::default(), false).unwrap();
        workspace.update_linear_term(q.clone()).unwrap();
        let cold = workspace.solve().unwrap();
        workspace.update_linear_term(q).unwrap();
        let warm = workspace.solve().unwrap();

        assert!(warm.iterations <= cold.iterations);
        assert!((warm.x - cold.x).amax() < 1e-3);
    }

    #[test]
    fn update_linear_term_rejects_wrong_length_and_non_finite_values() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), None);
        let mut workspace = QpWorkspace::new(&problem, SolverSettings::default(), true).unwrap();

        assert_eq!(
            workspace.update_linear_term(vector(&[1.0, 2.0, 3.0])),
            Err(RelaxError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            workspace.update_linear_term(vector(&[f64::NAN, 0.0])),
            Err(RelaxError::NonFinite)
        );
    }

    #[test]
    fn iteration_cap_surfaces_as_not_converged() {
        let model = double_dot();
        let problem = QpProblem::closed(model.cdd_inv(), 3, None);
        let settings = SolverSettings {
            max_iterations: 1,
            eps_abs: 1e-14,
            eps_rel: 1e-14,
            warm_start: false,
            ..SolverSettings::default()
        };
        let mut workspace = QpWorkspace::new(&problem, settings, false).unwrap();
        workspace
            .update_linear_term(-(model.cdd_inv() * model.induced_charge(&vector(&[0.3, 2.1]))))
            .unwrap();

        assert_eq!(
            workspace.solve(),
            Err(RelaxError::NotConverged { iterations: 10 })
        );
    }

    #[test]
    fn interior_minimum_of_closed_problem_conserves_charge() {
        let model = double_dot();
        let problem = QpProblem::closed(model.cdd_inv(), 1, None);
        let v = model.induced_charge(&vector(&[1.0, 0.0]));

        let n = problem.interior_minimum(model.cdd(), &v).unwrap();
        assert!((n.sum() - 1.0).abs() < 1e-12);
        assert!((n[0] - 0.9).abs() < 1e-12, "n = {n}");
    }

    #[test]
    fn interior_minimum_is_rejected_outside_the_box() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), Some(2));
        assert!(problem.interior_minimum(model.cdd(), &vector(&[-0.5, 1.0])).is_none());
        assert!(problem.interior_minimum(model.cdd(), &vector(&[2.5, 1.0])).is_none());
        assert_eq!(
            problem.interior_minimum(model.cdd(), &vector(&[1.5, 1.0])),
            Some(vector(&[1.5, 1.0]))
        );
    }

    #[test]
    fn unpolished_relaxation_is_exact_for_large_voltages() {
        let model = double_dot();
        let problem = QpProblem::open(model.cdd_inv(), None);
        let mut relaxer =
            ContinuousRelaxer::new(&model, &problem, SolverSettings::default(), false).unwrap();

        let (n, v) = relaxer.relax(&vector(&[1e6, 0.0])).unwrap();
        assert_eq!(n, v);
        assert_eq!(n[0], 1e6);
    }

    #[test]
    fn upper_triangle_storage_skips_the_lower_half() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, -0.5, -0.5, 3.0]);
        let csc = to_csc(&m, true);
        assert_eq!(csc.indptr.as_ref(), &[0, 1, 3]);
        assert_eq!(csc.indices.as_ref(), &[0, 0, 1]);
        assert_eq!(csc.data.as_ref(), &[2.0, -0.5, 3.0]);
    }
}
