//! Solver configuration with serde support and a builder.
//!
//! The configuration system is designed to be:
//! - **Serializable** - Load/save configurations from TOML files
//! - **Validated** - Invalid configurations are rejected before iterating
//! - **Defaulted** - Sensible defaults work well for most ground programs
//!
//! # Example
//!
//! ```rust
//! use consensus_admm_rs::config::{AdmmConfig, InitialValue};
//!
//! // Using defaults
//! let config = AdmmConfig::default();
//!
//! // Using the builder
//! let config = AdmmConfig::builder()
//!     .step_size(2.0)
//!     .max_iterations(5_000)
//!     .initial_consensus(InitialValue::Atom)
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AdmmError, Result};

/// Starting-value policy for consensus values and local copies.
///
/// - `Zero` - 0.
/// - `Random` - uniform sample in [0, 1) from the seeded generator.
/// - `Atom` - the current value of the atom backing the variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialValue {
    /// Start from zero.
    Zero,
    /// Start from a seeded uniform sample in [0, 1).
    Random,
    /// Start from the backing atom's current value.
    Atom,
}

/// Configuration for the consensus-ADMM reasoner.
///
/// # Defaults
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `step_size` | 1.0 | ADMM augmentation penalty ρ |
/// | `max_iterations` | 25000 | hard bound on iterations |
/// | `compute_period` | 50 | iterations between objective computations |
/// | `epsilon_abs` | 1e-5 | absolute tolerance |
/// | `epsilon_rel` | 1e-3 | relative tolerance |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmmConfig {
    /// ADMM step size (the augmentation penalty, sometimes called eta or rho).
    ///
    /// Fixed for the duration of a solve. Must be positive.
    #[serde(default = "default_step_size")]
    pub step_size: f32,

    /// Upper bound on iterations.
    ///
    /// Optimization always stops once this many iterations have run, whether
    /// or not the residual tests pass.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Iterations between full objective computations.
    ///
    /// The objective is only needed for progress traces and for the
    /// `objective_break` test, so it is computed periodically rather than
    /// every iteration.
    #[serde(default = "default_compute_period")]
    pub compute_period: usize,

    /// Absolute convergence tolerance.
    #[serde(default = "default_epsilon_abs")]
    pub epsilon_abs: f32,

    /// Relative convergence tolerance.
    #[serde(default = "default_epsilon_rel")]
    pub epsilon_rel: f32,

    /// Stop when the objective stops moving between compute periods.
    ///
    /// Adds an objective computation every `compute_period` iterations.
    #[serde(default)]
    pub objective_break: bool,

    /// Starting-value policy for the consensus values.
    #[serde(default = "default_initial_consensus")]
    pub initial_consensus: InitialValue,

    /// Starting-value policy for the per-term local copies.
    #[serde(default = "default_initial_local")]
    pub initial_local: InitialValue,

    /// Worker-pool width for the term and variable phases.
    ///
    /// One worker is always valid; results for a fixed seed do not depend on
    /// scheduling, only on the block layout this width implies.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Seed for the `Random` initialization policies.
    ///
    /// Exposed so that randomized starts are reproducible.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

// Default value functions for serde
fn default_step_size() -> f32 {
    1.0
}
fn default_max_iterations() -> usize {
    25_000
}
fn default_compute_period() -> usize {
    50
}
fn default_epsilon_abs() -> f32 {
    1e-5
}
fn default_epsilon_rel() -> f32 {
    1e-3
}
fn default_initial_consensus() -> InitialValue {
    InitialValue::Zero
}
fn default_initial_local() -> InitialValue {
    InitialValue::Random
}
fn default_num_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
fn default_random_seed() -> u64 {
    42
}

impl Default for AdmmConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            max_iterations: default_max_iterations(),
            compute_period: default_compute_period(),
            epsilon_abs: default_epsilon_abs(),
            epsilon_rel: default_epsilon_rel(),
            objective_break: false,
            initial_consensus: default_initial_consensus(),
            initial_local: default_initial_local(),
            num_threads: default_num_threads(),
            random_seed: default_random_seed(),
        }
    }
}

impl AdmmConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> AdmmConfigBuilder {
        AdmmConfigBuilder::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AdmmError::InvalidConfig {
                detail: format!("failed to read config file: {e}"),
            }
        })?;

        toml::from_str(&content).map_err(|e| AdmmError::InvalidConfig {
            detail: format!("failed to parse config: {e}"),
        })
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidConfig`] if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AdmmError::InvalidConfig {
            detail: format!("failed to serialize config: {e}"),
        })?;

        std::fs::write(path.as_ref(), content).map_err(|e| AdmmError::InvalidConfig {
            detail: format!("failed to write config file: {e}"),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidConfig`] describing the first parameter
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(AdmmError::InvalidConfig {
                detail: format!("step_size must be positive and finite, got {}", self.step_size),
            });
        }

        if self.max_iterations == 0 {
            return Err(AdmmError::InvalidConfig {
                detail: "max_iterations must be > 0".to_string(),
            });
        }

        if self.compute_period == 0 {
            return Err(AdmmError::InvalidConfig {
                detail: "compute_period must be > 0".to_string(),
            });
        }

        if !self.epsilon_abs.is_finite() || self.epsilon_abs <= 0.0 {
            return Err(AdmmError::InvalidConfig {
                detail: format!("epsilon_abs must be positive and finite, got {}", self.epsilon_abs),
            });
        }

        if !self.epsilon_rel.is_finite() || self.epsilon_rel <= 0.0 {
            return Err(AdmmError::InvalidConfig {
                detail: format!("epsilon_rel must be positive and finite, got {}", self.epsilon_rel),
            });
        }

        if self.num_threads == 0 {
            return Err(AdmmError::InvalidConfig {
                detail: "num_threads must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`AdmmConfig`].
#[derive(Debug, Default)]
pub struct AdmmConfigBuilder {
    step_size: Option<f32>,
    max_iterations: Option<usize>,
    compute_period: Option<usize>,
    epsilon_abs: Option<f32>,
    epsilon_rel: Option<f32>,
    objective_break: Option<bool>,
    initial_consensus: Option<InitialValue>,
    initial_local: Option<InitialValue>,
    num_threads: Option<usize>,
    random_seed: Option<u64>,
}

impl AdmmConfigBuilder {
    /// Sets the ADMM step size ρ.
    #[must_use]
    pub fn step_size(mut self, step_size: f32) -> Self {
        self.step_size = Some(step_size);
        self
    }

    /// Sets the iteration bound.
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Sets the objective computation period.
    #[must_use]
    pub fn compute_period(mut self, compute_period: usize) -> Self {
        self.compute_period = Some(compute_period);
        self
    }

    /// Sets the absolute tolerance.
    #[must_use]
    pub fn epsilon_abs(mut self, epsilon_abs: f32) -> Self {
        self.epsilon_abs = Some(epsilon_abs);
        self
    }

    /// Sets the relative tolerance.
    #[must_use]
    pub fn epsilon_rel(mut self, epsilon_rel: f32) -> Self {
        self.epsilon_rel = Some(epsilon_rel);
        self
    }

    /// Sets whether to stop once the objective stops moving.
    #[must_use]
    pub fn objective_break(mut self, objective_break: bool) -> Self {
        self.objective_break = Some(objective_break);
        self
    }

    /// Sets the consensus initialization policy.
    #[must_use]
    pub fn initial_consensus(mut self, policy: InitialValue) -> Self {
        self.initial_consensus = Some(policy);
        self
    }

    /// Sets the local-copy initialization policy.
    #[must_use]
    pub fn initial_local(mut self, policy: InitialValue) -> Self {
        self.initial_local = Some(policy);
        self
    }

    /// Sets the worker-pool width.
    #[must_use]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Sets the seed for randomized initialization.
    #[must_use]
    pub fn random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = Some(random_seed);
        self
    }

    /// Builds the configuration with defaults for unset values.
    #[must_use]
    pub fn build(self) -> AdmmConfig {
        AdmmConfig {
            step_size: self.step_size.unwrap_or_else(default_step_size),
            max_iterations: self.max_iterations.unwrap_or_else(default_max_iterations),
            compute_period: self.compute_period.unwrap_or_else(default_compute_period),
            epsilon_abs: self.epsilon_abs.unwrap_or_else(default_epsilon_abs),
            epsilon_rel: self.epsilon_rel.unwrap_or_else(default_epsilon_rel),
            objective_break: self.objective_break.unwrap_or(false),
            initial_consensus: self
                .initial_consensus
                .unwrap_or_else(default_initial_consensus),
            initial_local: self.initial_local.unwrap_or_else(default_initial_local),
            num_threads: self.num_threads.unwrap_or_else(default_num_threads),
            random_seed: self.random_seed.unwrap_or_else(default_random_seed),
        }
    }
}
