// src/quality/mod.rs

//! Data quality checks used as task bodies.
//!
//! A check measures something (a count, optionally out of a total) and the
//! result is judged against a configured threshold. Whether a miss fails
//! the task or is only logged is the check's [`Severity`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::config::model::CheckConfig;
use crate::errors::{DaglineError, Result};
use crate::types::Severity;

pub mod body;
pub mod command_check;

pub use body::ValidationBody;
pub use command_check::CommandCheck;

/// Raw result of a check: `observed` items, optionally out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub observed: u64,
    pub total: Option<u64>,
}

impl Measurement {
    pub fn count(observed: u64) -> Self {
        Self {
            observed,
            total: None,
        }
    }

    pub fn of(observed: u64, total: u64) -> Self {
        Self {
            observed,
            total: Some(total),
        }
    }

    /// `observed / total`; 0 when there is no (or a zero) total.
    pub fn ratio(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => self.observed as f64 / total as f64,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "{}/{} ({:.1}%)", self.observed, total, self.ratio() * 100.0),
            None => write!(f, "{}", self.observed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    MinCount(u64),
    MinRatio(f64),
}

impl Threshold {
    pub fn is_met(&self, m: &Measurement) -> bool {
        match *self {
            Threshold::MinCount(min) => m.observed >= min,
            Threshold::MinRatio(min) => m.ratio() >= min,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::MinCount(min) => write!(f, "at least {min}"),
            Threshold::MinRatio(min) => write!(f, "at least {:.1}%", min * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckPolicy {
    pub threshold: Threshold,
    pub severity: Severity,
}

impl CheckPolicy {
    pub fn new(threshold: Threshold, severity: Severity) -> Self {
        Self {
            threshold,
            severity,
        }
    }

    /// Exactly one of `min_count` / `min_ratio` must be set, and a ratio
    /// must lie in `[0, 1]`.
    pub fn from_config(cfg: &CheckConfig) -> Result<Self> {
        let threshold = match (cfg.min_count, cfg.min_ratio) {
            (Some(count), None) => Threshold::MinCount(count),
            (None, Some(ratio)) => {
                if !(0.0..=1.0).contains(&ratio) {
                    return Err(DaglineError::ConfigError(format!(
                        "check '{}': min_ratio {ratio} is outside 0.0..=1.0",
                        cfg.name
                    )));
                }
                Threshold::MinRatio(ratio)
            }
            (Some(_), Some(_)) => {
                return Err(DaglineError::ConfigError(format!(
                    "check '{}': set only one of min_count or min_ratio",
                    cfg.name
                )));
            }
            (None, None) => {
                return Err(DaglineError::ConfigError(format!(
                    "check '{}': needs min_count or min_ratio",
                    cfg.name
                )));
            }
        };
        Ok(Self::new(threshold, cfg.severity))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckVerdict {
    Passed,
    /// Threshold missed on a `warn` check.
    Warned(String),
    /// Threshold missed on a `hard` check.
    Failed(String),
}

impl CheckVerdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckVerdict::Failed(_))
    }
}

/// Judge a measurement against a check's policy.
pub fn judge(name: &str, policy: &CheckPolicy, measurement: &Measurement) -> CheckVerdict {
    if policy.threshold.is_met(measurement) {
        return CheckVerdict::Passed;
    }
    let message = format!(
        "{name}: observed {measurement}, expected {}",
        policy.threshold
    );
    miss(policy.severity, message)
}

/// Verdict for a miss (threshold or measurement error) under `severity`.
pub fn miss(severity: Severity, message: String) -> CheckVerdict {
    match severity {
        Severity::Hard => CheckVerdict::Failed(message),
        Severity::Warn => CheckVerdict::Warned(message),
    }
}

/// A typed validation query.
pub trait ValidationCheck: Send + Sync {
    fn name(&self) -> &str;

    fn policy(&self) -> &CheckPolicy;

    fn measure<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Measurement>> + Send + 'a>>;
}
