// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Calibration Loop
// ─────────────────────────────────────────────────────────────────────
//! Fits the 6 log-space parameters of the stressor perturbation unit to
//! observed choice frequencies. Everything else (connectivity, sign mask,
//! magnitude table) stays frozen.
//!
//! Gradients come either from forward-mode dual numbers pushed through
//! perturbation → field → integrator → readout, or from central
//! differences over the 6 parameters (cross-check).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use hotco_dynamics::{softmax, Dual, ParamVector, Scalar, N_PARAMS};
use hotco_types::{HotcoError, HotcoResult, N_ACTIONS, N_STRESSORS};

use crate::engine::ChoiceEngine;
use crate::input::AgentInput;

const LOG_EPS: f64 = 1e-8;

type Grad = Dual<N_PARAMS>;

/// One agent with its observed choice distribution (car, bike, pt, walk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub input: AgentInput,
    pub target: [f64; N_ACTIONS],
}

/// Row-normalize raw choice counts into soft targets. All-zero rows
/// become uniform.
pub fn soft_targets_from_frequencies(counts: &[[f64; N_ACTIONS]]) -> Vec<[f64; N_ACTIONS]> {
    counts
        .iter()
        .map(|row| {
            let total: f64 = row.iter().map(|c| c.max(0.0)).sum();
            if total > 0.0 {
                row.map(|c| c.max(0.0) / total)
            } else {
                [1.0 / N_ACTIONS as f64; N_ACTIONS]
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// −Σ target · ln(p + 1e-8), averaged over samples.
    CrossEntropy,
    /// Squared error averaged over samples and modes.
    MeanSquaredError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMethod {
    /// Exact derivatives via dual numbers.
    ForwardSensitivity,
    /// Central differences, one pair of simulations per parameter.
    FiniteDifference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Plain gradient-descent step on the log parameters.
    /// Default: 0.05.
    pub learning_rate: f64,
    /// Default: 50.
    pub epochs: usize,
    pub loss: LossKind,
    pub gradient_method: GradientMethod,
    /// Half-width of the central difference.
    /// Default: 1e-4.
    pub fd_eps: f64,
    /// Stop once |Δloss| between epochs falls below this.
    /// Default: 1e-7.
    pub tolerance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 50,
            loss: LossKind::CrossEntropy,
            gradient_method: GradientMethod::ForwardSensitivity,
            fd_eps: 1e-4,
            tolerance: 1e-7,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> HotcoResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(HotcoError::Config(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(HotcoError::Config("epochs must be >= 1".to_string()));
        }
        if !(self.fd_eps.is_finite() && self.fd_eps > 0.0) {
            return Err(HotcoError::Config(format!(
                "fd_eps must be finite and > 0, got {}",
                self.fd_eps
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(HotcoError::Config(format!(
                "tolerance must be >= 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Per-epoch record. `loss` and `grad_norm` are measured before the
/// update; the parameters are the ones after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStepLog {
    pub epoch: usize,
    pub loss: f64,
    pub grad_norm: f64,
    pub stressor_scale: [f64; N_STRESSORS],
    pub global_magnitude: f64,
}

fn sample_loss<T: Scalar>(probs: &[T; N_ACTIONS], target: &[f64; N_ACTIONS], kind: LossKind) -> T {
    let mut acc = T::zero();
    match kind {
        LossKind::CrossEntropy => {
            for (p, &t) in probs.iter().zip(target.iter()) {
                if t != 0.0 {
                    acc += -((*p + LOG_EPS).ln() * t);
                }
            }
        }
        LossKind::MeanSquaredError => {
            for (p, &t) in probs.iter().zip(target.iter()) {
                let d = *p - t;
                acc += d * d;
            }
            acc = acc / N_ACTIONS as f64;
        }
    }
    acc
}

pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> HotcoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Mean loss at the engine's current parameters.
    pub fn loss(&self, engine: &ChoiceEngine, samples: &[CalibrationSample]) -> HotcoResult<f64> {
        check_samples(samples)?;
        let params = engine.perturbation().params();
        let loss = self.loss_at(engine, samples, &params);
        ensure_finite(loss)?;
        Ok(loss)
    }

    /// Mean loss and its gradient with respect to the 6 log parameters.
    pub fn loss_and_gradient(
        &self,
        engine: &ChoiceEngine,
        samples: &[CalibrationSample],
    ) -> HotcoResult<(f64, ParamVector)> {
        check_samples(samples)?;
        let params = engine.perturbation().params();
        let (loss, grad) = match self.config.gradient_method {
            GradientMethod::ForwardSensitivity => self.forward_gradient(engine, samples, &params),
            GradientMethod::FiniteDifference => self.fd_gradient(engine, samples, &params),
        };
        ensure_finite(loss)?;
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(HotcoError::Calibration(format!(
                "non-finite gradient {grad:?}"
            )));
        }
        log::debug!(
            "calibration gradient ({:?}): loss={loss:.6} |g|={:.3e}",
            self.config.gradient_method,
            norm(&grad)
        );
        Ok((loss, grad))
    }

    /// Gradient descent on the engine's perturbation parameters.
    pub fn fit(
        &self,
        engine: &mut ChoiceEngine,
        samples: &[CalibrationSample],
    ) -> HotcoResult<Vec<CalibrationStepLog>> {
        let mut history = Vec::with_capacity(self.config.epochs);
        let mut previous: Option<f64> = None;

        for epoch in 0..self.config.epochs {
            let (loss, grad) = self.loss_and_gradient(engine, samples)?;
            let mut params = engine.perturbation().params();
            for (p, g) in params.iter_mut().zip(grad.iter()) {
                *p -= self.config.learning_rate * g;
            }
            engine.perturbation_mut().set_params(&params)?;

            let step = CalibrationStepLog {
                epoch,
                loss,
                grad_norm: norm(&grad),
                stressor_scale: engine.perturbation().stressor_scale(),
                global_magnitude: engine.perturbation().global_magnitude(),
            };
            log::info!(
                "calibration epoch {epoch}: loss={loss:.6} |g|={:.3e} global={:.4}",
                step.grad_norm,
                step.global_magnitude
            );
            history.push(step);

            if previous.is_some_and(|prev| (prev - loss).abs() < self.config.tolerance) {
                log::info!("calibration converged after {} epochs", epoch + 1);
                break;
            }
            previous = Some(loss);
        }
        Ok(history)
    }

    /// Per-sample losses at `log_params`, summed on the rayon pool when
    /// the engine runs in parallel.
    fn total_loss<T: Scalar>(
        &self,
        engine: &ChoiceEngine,
        samples: &[CalibrationSample],
        log_params: &[T; N_PARAMS],
    ) -> T {
        let temperature = engine.config().probability_temperature;
        let per_sample = |s: &CalibrationSample| {
            let actions = engine.final_actions_with(&s.input, log_params);
            sample_loss(&softmax(&actions, temperature), &s.target, self.config.loss)
        };
        if engine.config().parallel {
            samples.par_iter().map(per_sample).reduce(T::zero, |a, b| a + b)
        } else {
            samples.iter().map(per_sample).fold(T::zero(), |a, b| a + b)
        }
    }

    fn loss_at(
        &self,
        engine: &ChoiceEngine,
        samples: &[CalibrationSample],
        params: &ParamVector,
    ) -> f64 {
        self.total_loss(engine, samples, params) / samples.len() as f64
    }

    fn forward_gradient(
        &self,
        engine: &ChoiceEngine,
        samples: &[CalibrationSample],
        params: &ParamVector,
    ) -> (f64, ParamVector) {
        let seeded: [Grad; N_PARAMS] = std::array::from_fn(|i| Grad::variable(params[i], i));
        let total = self.total_loss(engine, samples, &seeded);
        let n = samples.len() as f64;
        (total.re / n, total.eps.map(|d| d / n))
    }

    fn fd_gradient(
        &self,
        engine: &ChoiceEngine,
        samples: &[CalibrationSample],
        params: &ParamVector,
    ) -> (f64, ParamVector) {
        let h = self.config.fd_eps;
        let loss = self.loss_at(engine, samples, params);
        let grad = std::array::from_fn(|i| {
            let mut up = *params;
            let mut down = *params;
            up[i] += h;
            down[i] -= h;
            (self.loss_at(engine, samples, &up) - self.loss_at(engine, samples, &down)) / (2.0 * h)
        });
        (loss, grad)
    }
}

fn check_samples(samples: &[CalibrationSample]) -> HotcoResult<()> {
    if samples.is_empty() {
        return Err(HotcoError::Calibration("no calibration samples".to_string()));
    }
    for (i, s) in samples.iter().enumerate() {
        s.input
            .validate()
            .map_err(|e| HotcoError::Validation(format!("sample {i}: {e}")))?;
        if s.target.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(HotcoError::Validation(format!(
                "sample {i}: target must be finite and non-negative, got {:?}",
                s.target
            )));
        }
    }
    Ok(())
}

fn ensure_finite(loss: f64) -> HotcoResult<()> {
    if loss.is_finite() {
        Ok(())
    } else {
        Err(HotcoError::Calibration(format!("loss diverged: {loss}")))
    }
}

fn norm(v: &ParamVector) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
