//! # consensus-admm-rs
//!
//! Parallel consensus-ADMM solver for weighted-rule soft logic inference.
//!
//! ## Overview
//!
//! Soft-logic inference compiles weighted first-order rules plus observed and
//! unobserved atoms into one continuous convex program whose variables are
//! atom truth values in `[0, 1]`. This crate is the numerical core of that
//! pipeline: it owns the ground terms a grounding layer produces - hinge and
//! squared-hinge penalties and hard linear constraints, each a hyperplane over
//! a handful of variables - and minimizes their sum with the alternating
//! direction method of multipliers over shared consensus variables.
//!
//! Everything around the core stays external: rule grounding, the logic DSL,
//! disk-backed atom stores, weight learning, and evaluators all live on the
//! other side of the [`TermStore`] and [`AtomStore`] seams.
//!
//! ## Iteration structure
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │  term phase (parallel)       │
//!            │  y ← y + ρ(x − z)            │
//!            │  x ← argmin term + ρ/2‖x−u‖² │
//!            └──────────────┬───────────────┘
//!                           ▼
//!            ┌──────────────────────────────┐
//!            │  variable phase (parallel)   │
//!            │  z[g] ← clip(mean(x + y/ρ))  │
//!            │  accumulate residuals        │
//!            └──────────────┬───────────────┘
//!                           ▼
//!                 residual + objective tests
//! ```
//!
//! Each term's x-subproblem has a closed-form solution (at most a rank-1
//! update along the hyperplane normal), so an iteration is two data-parallel
//! sweeps with no linear algebra.
//!
//! ## Quick start
//!
//! ```
//! use consensus_admm_rs::prelude::*;
//!
//! // One weighted rule ground to the hinge max(0, x0 + x1 - 1) and one hard
//! // equality tying x0 to x2.
//! let atoms = DenseAtomStore::new(vec![0.0; 3]);
//! let mut store = TermStore::new(atoms);
//! store.add_term(
//!     TermKind::Hinge { weight: 1.0 },
//!     Hyperplane::new(vec![1.0, 1.0], 1.0),
//!     &[0, 1],
//! )?;
//! store.add_term(
//!     TermKind::LinearEquality,
//!     Hyperplane::new(vec![1.0, -1.0], 0.0),
//!     &[0, 2],
//! )?;
//!
//! let reasoner = AdmmReasoner::new(AdmmConfig::default())?;
//! let report = reasoner.optimize(&mut store)?;
//!
//! assert_eq!(report.violated_constraints, 0);
//! assert!(store.atoms().values().iter().all(|&v| (0.0..=1.0).contains(&v)));
//! # Ok::<(), consensus_admm_rs::AdmmError>(())
//! ```
//!
//! ## Guarantees
//!
//! - Consensus values are always inside `[0, 1]` after a solve.
//! - A fixed `random_seed` reproduces a solve bit for bit; block partials are
//!   reduced in a fixed order, so scheduling never changes the result.
//! - Hard constraints converge to feasibility up to the configured
//!   tolerances; if the constraint set is infeasible the solver still returns
//!   its best effort and reports the violation count.
//!
//! ## Modules
//!
//! - [`config`] - solver configuration, TOML loading, and the builder
//! - [`error`] - error types and the crate-wide `Result` alias
//! - [`term`] - hyperplanes, local copies, term variants, and the store
//! - [`reasoner`] - the ADMM loop and its telemetry
//! - [`parallel`] - the worker-pool adapter the phases run on

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
// Allow precision loss casts - acceptable in f32 numerical code
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod parallel;
pub mod reasoner;
pub mod term;

mod math;

pub use config::{AdmmConfig, AdmmConfigBuilder, InitialValue};
pub use error::{AdmmError, Result};
pub use parallel::ParallelRuntime;
pub use reasoner::{AdmmReasoner, SolveReport};
pub use term::{
    AtomStore, DenseAtomStore, Hyperplane, LocalVariable, ObjectiveTerm, Sense, TermHandle,
    TermKind, TermStore,
};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use consensus_admm_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AdmmConfig, AdmmError, AdmmReasoner, AtomStore, DenseAtomStore, Hyperplane, InitialValue,
        LocalVariable, ObjectiveTerm, Result, Sense, SolveReport, TermHandle, TermKind, TermStore,
    };
}
