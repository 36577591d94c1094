//! Statistical significance testing for prompt experiments
//!
//! This module contains the pure decision math: the two-proportion z-test,
//! a rational approximation of the standard normal tail, Wald confidence
//! intervals, and the composite `analyze_experiment` function that applies
//! the winner-determination gates.

use prompt_optimizer_types::{
    experiments::{Arm, ArmMetrics, ExperimentAnalysis},
    strategies::ExperimentSettings,
};

/// Abramowitz & Stegun 26.2.17 coefficients
const B1: f64 = 0.3193815;
const B2: f64 = -0.3565638;
const B3: f64 = 1.781478;
const B4: f64 = -1.821256;
const B5: f64 = 1.330274;
const P: f64 = 0.2316419;
const INV_SQRT_2PI: f64 = 0.3989423;

/// z multiplier for the 95% Wald interval
const Z_95: f64 = 1.96;

/// Upper-tail probability P(Z > z) for the standard normal, via the
/// Abramowitz & Stegun 26.2.17 rational approximation.
///
/// The approximation (absolute error below 7.5e-8) is kept instead of a
/// library CDF so p-values match the original decision engine bit for bit
/// near the 0.05 boundary.
pub fn normal_upper_tail(z: f64) -> f64 {
    let z_abs = z.abs();
    let t = 1.0 / (1.0 + P * z_abs);
    let d = INV_SQRT_2PI * (-z_abs * z_abs / 2.0).exp();
    let tail = d * t * (B1 + t * (B2 + t * (B3 + t * (B4 + t * B5))));
    if z >= 0.0 {
        tail
    } else {
        1.0 - tail
    }
}

/// Two-tailed p-value for a z-score
pub fn two_tailed_p_value(z: f64) -> f64 {
    (2.0 * normal_upper_tail(z.abs())).min(1.0)
}

/// 95% Wald confidence interval for a proportion, clamped to [0, 1]
pub fn wald_interval(p: f64, n: u64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let margin = Z_95 * (p * (1.0 - p) / n as f64).sqrt();
    ((p - margin).max(0.0), (p + margin).min(1.0))
}

/// Two-proportion z-test comparing control and treatment conversion rates
///
/// Tests the null hypothesis that the two proportions are equal, using the
/// pooled standard-error estimate.
#[derive(Debug, Clone)]
pub struct ProportionZTest {
    /// Successes in the control arm
    pub control_successes: u64,
    /// Impressions in the control arm
    pub control_trials: u64,
    /// Successes in the treatment arm
    pub treatment_successes: u64,
    /// Impressions in the treatment arm
    pub treatment_trials: u64,
}

impl ProportionZTest {
    /// Create a new z-test
    pub fn new(
        control_successes: u64,
        control_trials: u64,
        treatment_successes: u64,
        treatment_trials: u64,
    ) -> Self {
        Self {
            control_successes,
            control_trials,
            treatment_successes,
            treatment_trials,
        }
    }

    /// Sample proportions (control, treatment); 0 with no impressions
    pub fn proportions(&self) -> (f64, f64) {
        let p_control = if self.control_trials > 0 {
            self.control_successes as f64 / self.control_trials as f64
        } else {
            0.0
        };
        let p_treatment = if self.treatment_trials > 0 {
            self.treatment_successes as f64 / self.treatment_trials as f64
        } else {
            0.0
        };
        (p_control, p_treatment)
    }

    /// Weighted-average success rate across both arms
    pub fn pooled_proportion(&self) -> f64 {
        let total_trials = self.control_trials + self.treatment_trials;
        if total_trials > 0 {
            (self.control_successes + self.treatment_successes) as f64 / total_trials as f64
        } else {
            0.0
        }
    }

    /// z = (p_treatment - p_control) / se, or 0 when either arm is empty
    /// or the pooled standard error collapses to zero
    pub fn z_statistic(&self) -> f64 {
        if self.control_trials == 0 || self.treatment_trials == 0 {
            return 0.0;
        }

        let (p_control, p_treatment) = self.proportions();
        let pooled = self.pooled_proportion();
        let n_control = self.control_trials as f64;
        let n_treatment = self.treatment_trials as f64;

        let se = (pooled * (1.0 - pooled) * (1.0 / n_control + 1.0 / n_treatment)).sqrt();
        if se == 0.0 {
            return 0.0;
        }

        (p_treatment - p_control) / se
    }

    /// Two-tailed p-value of the test
    pub fn p_value(&self) -> f64 {
        two_tailed_p_value(self.z_statistic())
    }
}

/// Relative improvement of treatment over control
///
/// 1.0 when control has no conversions but treatment does; 0.0 when
/// neither converts.
pub fn relative_improvement(control_rate: f64, treatment_rate: f64) -> f64 {
    if control_rate > 0.0 {
        (treatment_rate - control_rate) / control_rate
    } else if treatment_rate > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Run the full analysis over both arms and apply the winner gates.
///
/// A winner is declared only when all three gates hold: both arms reached
/// the minimum sample size, the two-tailed p-value is below the
/// significance level, and the absolute relative improvement reaches the
/// minimum effect size. Otherwise `winner` is `None` and `reason` names
/// the first failed gate, in that priority order.
pub fn analyze_experiment(
    control: &ArmMetrics,
    treatment: &ArmMetrics,
    settings: &ExperimentSettings,
) -> ExperimentAnalysis {
    let test = ProportionZTest::new(
        control.successes,
        control.impressions,
        treatment.successes,
        treatment.impressions,
    );

    let (control_rate, treatment_rate) = test.proportions();
    let z_score = test.z_statistic();
    let p_value = test.p_value();
    let improvement = relative_improvement(control_rate, treatment_rate);

    let has_sufficient_samples = control.impressions >= settings.min_sample_size
        && treatment.impressions >= settings.min_sample_size;
    let is_significant = p_value < settings.significance_level;
    let has_minimum_effect = improvement.abs() >= settings.min_effect_size;

    let (winner, reason) = if !has_sufficient_samples {
        (
            None,
            format!(
                "insufficient samples: each arm needs at least {} impressions",
                settings.min_sample_size
            ),
        )
    } else if !is_significant {
        (
            None,
            format!(
                "not significant: p={:.4} is above the {:.2} threshold",
                p_value, settings.significance_level
            ),
        )
    } else if !has_minimum_effect {
        (
            None,
            format!(
                "effect too small: |{:.4}| relative improvement is below {:.2}",
                improvement, settings.min_effect_size
            ),
        )
    } else if treatment_rate > control_rate {
        (Some(Arm::Treatment), "treatment outperforms control".to_string())
    } else {
        (Some(Arm::Control), "control outperforms treatment".to_string())
    };

    ExperimentAnalysis {
        control_rate,
        treatment_rate,
        control_interval: wald_interval(control_rate, control.impressions),
        treatment_interval: wald_interval(treatment_rate, treatment.impressions),
        z_score,
        p_value,
        confidence: 1.0 - p_value,
        relative_improvement: improvement,
        quality_delta: treatment.avg_quality() - control.avg_quality(),
        latency_delta_ms: treatment.avg_latency_ms() - control.avg_latency_ms(),
        has_sufficient_samples,
        is_significant,
        has_minimum_effect,
        winner,
        reason,
    }
}
