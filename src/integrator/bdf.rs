//! Variable-order, variable-step backward differentiation formulas
//!
//! Quasi-constant step size BDF of orders 1 to 5 with the NDF modification
//! (Klopfenstein-Shampine `kappa` coefficients), in the form used by MATLAB's
//! `ode15s` and SciPy's `BDF`:
//!
//! - the solution history is kept as backward differences `D`, rescaled
//!   whenever the step size changes
//! - each step predicts from `D`, then corrects with a simplified Newton
//!   iteration on `(I - c*J) dy = c*f(y) - psi - d`
//! - the local error is `error_const[order] * d` where `d` is the total
//!   Newton correction, measured in the weighted RMS norm
//! - after `order + 1` steps of equal size, orders `k - 1`, `k` and `k + 1`
//!   are compared and the one allowing the largest next step wins
//!
//! # References
//! - Shampine, L. F., & Reichelt, M. W. (1997). "The MATLAB ODE Suite".
//!   SIAM Journal on Scientific Computing, 18(1), 1-22.
//! - Hairer, E., & Wanner, G. (1996). "Solving Ordinary Differential
//!   Equations II: Stiff and Differential-Algebraic Problems". Springer.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use nalgebra::linalg::LU;
use nalgebra::Dyn;
use serde::{Deserialize, Serialize};

use super::{IntegrationStats, Integrator, OdeSystem, Trajectory};
use crate::error::{FailureReason, SimError, SimResult};
use crate::math::{rms_norm, Mat, Vec};

const MAX_ORDER: usize = 5;
const NEWTON_MAXITER: usize = 4;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// NDF modification of the BDF coefficients, indexed by order
const KAPPA: [f64; MAX_ORDER + 1] = [0.0, -0.1850, -1.0 / 9.0, -0.0823, -0.0415, 0.0];

type Factorization = LU<f64, Dyn, Dyn>;

/// Order-dependent constants of the method
struct Coefficients {
    gamma: [f64; MAX_ORDER + 1],
    alpha: [f64; MAX_ORDER + 1],
    error_const: [f64; MAX_ORDER + 1],
}

impl Coefficients {
    fn new() -> Self {
        let mut gamma = [0.0; MAX_ORDER + 1];
        for k in 1..=MAX_ORDER {
            gamma[k] = gamma[k - 1] + 1.0 / k as f64;
        }

        let mut alpha = [0.0; MAX_ORDER + 1];
        let mut error_const = [0.0; MAX_ORDER + 1];
        for k in 0..=MAX_ORDER {
            alpha[k] = (1.0 - KAPPA[k]) * gamma[k];
            error_const[k] = KAPPA[k] * gamma[k] + 1.0 / (k + 1) as f64;
        }

        Self {
            gamma,
            alpha,
            error_const,
        }
    }
}

/// Stiff integrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bdf {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Maximum number of accepted steps
    pub max_steps: usize,
    /// Optional wall-clock budget
    pub max_wall_time: Option<Duration>,
    /// Upper bound on the step size
    pub max_step: f64,
}

impl Default for Bdf {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            max_steps: 100_000,
            max_wall_time: None,
            max_step: f64::INFINITY,
        }
    }
}

impl Bdf {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_wall_time(mut self, budget: Duration) -> Self {
        self.max_wall_time = Some(budget);
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    fn validate(&self) -> SimResult<f64> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(SimError::invalid("rtol", format!("must be positive, got {}", self.rtol)));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(SimError::invalid("atol", format!("must be positive, got {}", self.atol)));
        }
        if !(self.max_step > 0.0) {
            return Err(SimError::invalid(
                "max_step",
                format!("must be positive, got {}", self.max_step),
            ));
        }

        let rtol_min = 100.0 * f64::EPSILON;
        if self.rtol < rtol_min {
            warn!("rtol {} too small, using {}", self.rtol, rtol_min);
            Ok(rtol_min)
        } else {
            Ok(self.rtol)
        }
    }
}

/// Rescaling matrix of the backward differences for a step ratio `factor`
fn compute_r(order: usize, factor: f64) -> Mat {
    let mut m = Mat::zeros(order + 1, order + 1);
    for j in 0..=order {
        m[(0, j)] = 1.0;
    }
    for i in 1..=order {
        for j in 1..=order {
            m[(i, j)] = (i as f64 - 1.0 - factor * j as f64) / i as f64;
        }
    }

    // Cumulative product down each column
    for i in 1..=order {
        for j in 0..=order {
            m[(i, j)] *= m[(i - 1, j)];
        }
    }

    m
}

/// Rewrite `d[0..=order]` for a step size multiplied by `factor`
fn change_d(d: &mut [Vec], order: usize, factor: f64) {
    let ru = compute_r(order, factor) * compute_r(order, 1.0);
    let old: std::vec::Vec<Vec> = d[..=order].to_vec();

    for (i, slot) in d.iter_mut().take(order + 1).enumerate() {
        let mut acc = Vec::zeros(old[0].len());
        for (j, dj) in old.iter().enumerate() {
            acc.axpy(ru[(j, i)], dj, 1.0);
        }
        *slot = acc;
    }
}

/// Evaluate the interpolating polynomial held in `d` at `t_eval`
fn dense_output(d: &[Vec], order: usize, t: f64, h: f64, t_eval: f64) -> Vec {
    let mut y = d[0].clone();
    let mut p = 1.0;
    for j in 0..order {
        let t_shift = t - h * j as f64;
        let denom = h * (j + 1) as f64;
        p *= (t_eval - t_shift) / denom;
        y.axpy(p, &d[j + 1], 1.0);
    }
    y
}

/// Distance from `t` to the next representable number
fn spacing(t: f64) -> f64 {
    (f64::from_bits(t.to_bits() + 1) - t).abs()
}

struct NewtonOutcome {
    converged: bool,
    /// The iteration stopped on a NaN or infinite derivative or correction
    non_finite: bool,
    iterations: usize,
    y: Vec,
    d: Vec,
}

#[allow(clippy::too_many_arguments)]
fn solve_bdf_system<S: OdeSystem + ?Sized>(
    system: &S,
    t_new: f64,
    y_predict: &Vec,
    c: f64,
    psi: &Vec,
    lu: &Factorization,
    scale: &Vec,
    tol: f64,
    stats: &mut IntegrationStats,
) -> SimResult<NewtonOutcome> {
    let mut d = Vec::zeros(y_predict.len());
    let mut y = y_predict.clone();
    let mut dy_norm_old: Option<f64> = None;
    let mut converged = false;
    let mut non_finite = false;
    let mut iterations = 0;

    for k in 0..NEWTON_MAXITER {
        iterations = k + 1;

        let f = system.derivative(t_new, &y)?;
        stats.rhs_evals += 1;
        if !f.iter().all(|v| v.is_finite()) {
            non_finite = true;
            break;
        }

        let rhs = f * c - psi - &d;
        let Some(dy) = lu.solve(&rhs) else {
            break;
        };
        if !dy.iter().all(|v| v.is_finite()) {
            non_finite = true;
            break;
        }
        let dy_norm = rms_norm(&dy.component_div(scale));

        let rate = dy_norm_old.map(|old| dy_norm / old);
        if let Some(rate) = rate {
            let remaining = (NEWTON_MAXITER - k) as i32;
            if rate >= 1.0 || rate.powi(remaining) / (1.0 - rate) * dy_norm > tol {
                break;
            }
        }

        y += &dy;
        d += &dy;

        if dy_norm == 0.0 || rate.is_some_and(|rate| rate / (1.0 - rate) * dy_norm < tol) {
            converged = true;
            break;
        }

        dy_norm_old = Some(dy_norm);
    }

    Ok(NewtonOutcome {
        converged,
        non_finite,
        iterations,
        y,
        d,
    })
}

/// Initial step from the size of the solution and its first two derivatives
#[allow(clippy::too_many_arguments)]
fn select_initial_step<S: OdeSystem + ?Sized>(
    system: &S,
    t0: f64,
    y0: &Vec,
    f0: &Vec,
    t_bound: f64,
    max_step: f64,
    rtol: f64,
    atol: f64,
    stats: &mut IntegrationStats,
) -> SimResult<f64> {
    let interval = t_bound - t0;
    if y0.is_empty() {
        return Ok(interval);
    }

    let scale = y0.map(|v| atol + rtol * v.abs());
    let d0 = rms_norm(&y0.component_div(&scale));
    let d1 = rms_norm(&f0.component_div(&scale));

    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let h0 = h0.min(interval);

    let y1 = y0 + f0 * h0;
    let f1 = system.derivative(t0 + h0, &y1)?;
    stats.rhs_evals += 1;
    let d2 = rms_norm(&(f1 - f0).component_div(&scale)) / h0;

    // Order 1 start
    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(0.5)
    };

    Ok((100.0 * h0).min(h1).min(interval).min(max_step))
}

impl Integrator for Bdf {
    fn integrate<S: OdeSystem + ?Sized>(
        &self,
        system: &S,
        y0: &Vec,
        t_span: (f64, f64),
        sample_times: &[f64],
    ) -> SimResult<Trajectory> {
        let (t0, t_bound) = t_span;
        if !(t0.is_finite() && t_bound.is_finite() && t_bound > t0) {
            return Err(SimError::InvalidInput(format!(
                "time span [{}, {}] is empty or not finite",
                t0, t_bound
            )));
        }
        if y0.len() != system.dimension() {
            return Err(SimError::DimensionMismatch {
                expected: system.dimension(),
                found: y0.len(),
            });
        }
        if sample_times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidInput("sample times must be strictly ascending".to_string()));
        }
        if sample_times.iter().any(|&s| !(s >= t0 && s <= t_bound)) {
            return Err(SimError::InvalidInput(format!(
                "sample times must lie within [{}, {}]",
                t0, t_bound
            )));
        }

        let rtol = self.validate()?;
        let atol = self.atol;
        let n = y0.len();
        let coeffs = Coefficients::new();
        let newton_tol = (10.0 * f64::EPSILON / rtol).max(0.03_f64.min(rtol.sqrt()));
        let started = Instant::now();

        let mut stats = IntegrationStats::default();
        let mut trajectory = Trajectory::with_capacity(sample_times.len());
        let mut next_sample = 0;
        while next_sample < sample_times.len() && sample_times[next_sample] <= t0 {
            trajectory.push(sample_times[next_sample], y0.clone());
            next_sample += 1;
        }

        let fail = |t: f64, reason: FailureReason, mut partial: Trajectory, stats: IntegrationStats| {
            partial.stats = stats;
            SimError::IntegrationFailure {
                time: t,
                reason,
                requested: sample_times.len(),
                partial: Box::new(partial),
            }
        };

        let f0 = system.derivative(t0, y0)?;
        stats.rhs_evals += 1;

        let mut h_abs = select_initial_step(
            system,
            t0,
            y0,
            &f0,
            t_bound,
            self.max_step,
            rtol,
            atol,
            &mut stats,
        )?;

        let mut d: std::vec::Vec<Vec> = vec![Vec::zeros(n); MAX_ORDER + 3];
        d[0] = y0.clone();
        d[1] = &f0 * h_abs;

        let mut order = 1;
        let mut n_equal_steps = 0;
        let mut jac = system.jacobian(t0, y0)?;
        stats.jacobian_evals += 1;
        let mut lu: Option<Factorization> = None;
        let mut t = t0;
        let identity = Mat::identity(n, n);

        debug!(
            "BDF start: n = {}, span = [{}, {}], h0 = {:.3e}, rtol = {:.1e}, atol = {:.1e}",
            n, t0, t_bound, h_abs, rtol, atol
        );

        while t < t_bound {
            if stats.steps >= self.max_steps {
                let reason = FailureReason::StepBudgetExceeded(self.max_steps);
                return Err(fail(t, reason, trajectory, stats));
            }
            if let Some(budget) = self.max_wall_time {
                if started.elapsed() > budget {
                    return Err(fail(t, FailureReason::WallTimeExceeded, trajectory, stats));
                }
            }

            let min_step = 10.0 * spacing(t);
            if h_abs > self.max_step {
                change_d(&mut d, order, self.max_step / h_abs);
                h_abs = self.max_step;
                n_equal_steps = 0;
                lu = None;
            } else if h_abs < min_step {
                change_d(&mut d, order, min_step / h_abs);
                h_abs = min_step;
                n_equal_steps = 0;
                lu = None;
            }

            let mut current_jac = false;
            // Set while the latest rejection came from a non-finite evaluation
            let mut non_finite = false;

            // Attempt steps until one passes both the Newton and the error test
            let (t_new, outcome, error_norm, safety, scale) = loop {
                if h_abs < min_step {
                    let reason = if non_finite {
                        FailureReason::NonFiniteState
                    } else {
                        FailureReason::StepSizeTooSmall
                    };
                    return Err(fail(t, reason, trajectory, stats));
                }

                let mut t_new = t + h_abs;
                if t_new > t_bound {
                    t_new = t_bound;
                    change_d(&mut d, order, (t_new - t) / h_abs);
                    n_equal_steps = 0;
                    lu = None;
                }
                let h = t_new - t;
                h_abs = h;

                let mut y_predict = d[0].clone();
                for dj in d.iter().take(order + 1).skip(1) {
                    y_predict += dj;
                }
                let scale = y_predict.map(|v| atol + rtol * v.abs());

                let mut psi = Vec::zeros(n);
                for j in 1..=order {
                    psi.axpy(coeffs.gamma[j], &d[j], 1.0);
                }
                psi /= coeffs.alpha[order];

                let c = h / coeffs.alpha[order];

                let outcome = loop {
                    if lu.is_none() {
                        stats.lu_decompositions += 1;
                    }
                    let factor = lu.get_or_insert_with(|| (&identity - &jac * c).lu());

                    let outcome = solve_bdf_system(
                        system, t_new, &y_predict, c, &psi, factor, &scale, newton_tol, &mut stats,
                    )?;

                    if outcome.converged || current_jac {
                        break outcome;
                    }

                    jac = system.jacobian(t_new, &y_predict)?;
                    stats.jacobian_evals += 1;
                    lu = None;
                    current_jac = true;
                };

                if !outcome.converged {
                    non_finite = outcome.non_finite;
                    h_abs *= 0.5;
                    change_d(&mut d, order, 0.5);
                    n_equal_steps = 0;
                    lu = None;
                    stats.rejected += 1;
                    trace!("t = {:.6}: Newton failed, halving step to {:.3e}", t, h_abs);
                    continue;
                }

                let safety = 0.9 * (2 * NEWTON_MAXITER + 1) as f64
                    / (2 * NEWTON_MAXITER + outcome.iterations) as f64;

                let scale = outcome.y.map(|v| atol + rtol * v.abs());
                let error = &outcome.d * coeffs.error_const[order];
                let error_norm = rms_norm(&error.component_div(&scale));

                if !error_norm.is_finite() {
                    return Err(fail(t, FailureReason::NonFiniteState, trajectory, stats));
                }

                if error_norm > 1.0 {
                    non_finite = false;
                    let factor = MIN_FACTOR.max(safety * error_norm.powf(-1.0 / (order + 1) as f64));
                    h_abs *= factor;
                    change_d(&mut d, order, factor);
                    n_equal_steps = 0;
                    stats.rejected += 1;
                    trace!("t = {:.6}: error {:.3e} rejected, step -> {:.3e}", t, error_norm, h_abs);
                    // The Newton iteration converged, so the factorization is kept
                    continue;
                }

                break (t_new, outcome, error_norm, safety, scale);
            };

            stats.steps += 1;
            n_equal_steps += 1;
            t = t_new;
            let y = outcome.y;

            // D^{j+1} y_n = D^j y_n - D^j y_{n-1}, with d = D^{k+1} y_n
            d[order + 2] = &outcome.d - &d[order + 1];
            d[order + 1] = outcome.d;
            for i in (0..=order).rev() {
                let (lo, hi) = d.split_at_mut(i + 1);
                lo[i] += &hi[0];
            }

            if n_equal_steps >= order + 1 {
                let error_m_norm = if order > 1 {
                    rms_norm(&(&d[order] * coeffs.error_const[order - 1]).component_div(&scale))
                } else {
                    f64::INFINITY
                };
                let error_p_norm = if order < MAX_ORDER {
                    rms_norm(&(&d[order + 2] * coeffs.error_const[order + 1]).component_div(&scale))
                } else {
                    f64::INFINITY
                };

                let norms = [error_m_norm, error_norm, error_p_norm];
                let mut best = 0;
                let mut best_factor = f64::NEG_INFINITY;
                for (k, norm) in norms.iter().enumerate() {
                    let factor = norm.powf(-1.0 / (order + k) as f64);
                    if factor > best_factor {
                        best = k;
                        best_factor = factor;
                    }
                }

                let new_order = order + best - 1;
                if new_order != order {
                    debug!("t = {:.6}: order {} -> {}", t, order, new_order);
                }
                order = new_order;

                let factor = MAX_FACTOR.min(safety * best_factor);
                h_abs *= factor;
                change_d(&mut d, order, factor);
                n_equal_steps = 0;
                lu = None;
            }

            while next_sample < sample_times.len() && sample_times[next_sample] <= t {
                let ts = sample_times[next_sample];
                let ys = if ts == t {
                    y.clone()
                } else {
                    dense_output(&d, order, t, h_abs, ts)
                };
                trajectory.push(ts, ys);
                next_sample += 1;
            }
        }

        trajectory.stats = stats;

        if stats.rejected > stats.steps {
            warn!(
                "{} of {} step attempts rejected; tolerances may be too tight for this system",
                stats.rejected,
                stats.steps + stats.rejected
            );
        }

        debug!(
            "BDF done in {:.3?}: {} steps ({} rejected), {} RHS evals, {} Jacobians, {} LU",
            started.elapsed(),
            stats.steps,
            stats.rejected,
            stats.rhs_evals,
            stats.jacobian_evals,
            stats.lu_decompositions
        );

        Ok(trajectory)
    }
}
