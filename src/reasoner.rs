//! The consensus-ADMM reasoner: iteration protocol, residual bookkeeping, and
//! termination logic.
//!
//! Each iteration is bulk-synchronous with two barriers:
//!
//! 1. **Term phase** - every term updates its Lagrange multipliers and solves
//!    its x-subproblem against a read-only view of the consensus values.
//! 2. **Variable phase** - every consensus variable is re-averaged from its
//!    local copies, clipped to `[0, 1]`, and the primal/dual residual partials
//!    are accumulated per block.
//!
//! Block partials come back in block order and are reduced on the calling
//! thread, so a fixed seed reproduces the same values bit for bit.
//!
//! Optimization stops when the iteration budget runs out, when both residuals
//! fall under their thresholds with no violated constraints, or (optionally)
//! when the objective stops moving. Whenever the loop decides to stop, the
//! objective is recomputed and the decision is re-checked once: constraints
//! that turn out to be violated veto the stop unless the budget is exhausted.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::config::AdmmConfig;
use crate::error::Result;
use crate::math;
use crate::parallel::ParallelRuntime;
use crate::term::{AtomStore, LocalRef, ObjectiveTerm, TermHandle, TermStore};

const LOWER_BOUND: f32 = 0.0;
const UPPER_BOUND: f32 = 1.0;

/// Telemetry from one solve.
///
/// Non-convergence is not an error: the best-effort values are written back
/// regardless, and this report carries what the loop knew when it stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    /// Iterations actually run.
    pub iterations: usize,

    /// Final objective: the sum of every weighted term's penalty at the final
    /// consensus values.
    pub objective: f32,

    /// Number of constraint terms still violated at exit.
    pub violated_constraints: usize,

    /// True when both residual tests passed and no constraint was violated.
    pub converged: bool,

    /// Final primal residual `√Σ (x_i − z[g_i])²`.
    pub primal_residual: f32,

    /// Final dual residual `ρ · √Σ |locals[g]| · (z_new − z_old)²`.
    pub dual_residual: f32,

    /// Primal threshold the residual was last compared against.
    pub epsilon_primal: f32,

    /// Dual threshold the residual was last compared against.
    pub epsilon_dual: f32,

    /// Final Lagrangian penalty `Σ y_i · (x_i − z[g_i])`.
    pub lagrange_penalty: f32,

    /// Final augmented Lagrangian penalty `ρ/2 · Σ (x_i − z[g_i])²`.
    pub augmented_lagrange_penalty: f32,
}

/// Objective value plus the violated-constraint count at one consensus state.
#[derive(Debug, Clone, Copy)]
struct ObjectiveReport {
    objective: f32,
    violated_constraints: usize,
}

/// Residuals and thresholds from the most recent iteration.
#[derive(Debug, Clone, Copy, Default)]
struct ResidualState {
    primal: f32,
    dual: f32,
    epsilon_primal: f32,
    epsilon_dual: f32,
}

impl ResidualState {
    fn converged(&self) -> bool {
        self.primal < self.epsilon_primal && self.dual < self.epsilon_dual
    }
}

/// Per-block accumulator for the variable phase, reduced in block order by
/// the caller.
#[derive(Debug, Clone, Copy, Default)]
struct VariablePartial {
    primal_res: f32,
    dual_res: f32,
    ax_norm: f32,
    ay_norm: f32,
    bz_norm: f32,
    lagrange_penalty: f32,
    augmented_lagrange_penalty: f32,
}

impl VariablePartial {
    fn merge(&mut self, other: &VariablePartial) {
        self.primal_res += other.primal_res;
        self.dual_res += other.dual_res;
        self.ax_norm += other.ax_norm;
        self.ay_norm += other.ay_norm;
        self.bz_norm += other.bz_norm;
        self.lagrange_penalty += other.lagrange_penalty;
        self.augmented_lagrange_penalty += other.augmented_lagrange_penalty;
    }
}

/// Minimizes a [`TermStore`]'s terms by consensus ADMM.
pub struct AdmmReasoner {
    config: AdmmConfig,
    runtime: ParallelRuntime,
}

impl AdmmReasoner {
    /// Creates a reasoner with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidConfig`](crate::AdmmError::InvalidConfig)
    /// when the configuration fails validation or the worker pool cannot be
    /// built.
    pub fn new(config: AdmmConfig) -> Result<Self> {
        config.validate()?;
        let runtime = ParallelRuntime::new(config.num_threads)?;

        Ok(Self { config, runtime })
    }

    /// The configuration this reasoner was built with.
    #[must_use]
    pub fn config(&self) -> &AdmmConfig {
        &self.config
    }

    /// Runs the ADMM loop over the store's terms and writes the final
    /// consensus values back into the backing atoms.
    ///
    /// Initialization follows the configured policies; randomized policies
    /// draw from a generator seeded with `random_seed`, so repeated solves of
    /// the same store are reproducible.
    ///
    /// # Errors
    ///
    /// Fails before the first iteration when the store is empty or leaves a
    /// consensus index unreferenced. Non-convergence and residual constraint
    /// violations are reported through the returned [`SolveReport`], not as
    /// errors.
    pub fn optimize<A: AtomStore>(&self, store: &mut TermStore<A>) -> Result<SolveReport> {
        store.validate()?;

        let step_size = self.config.step_size;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);

        store.reset_local_variables(self.config.initial_local, &mut rng);

        let num_terms = store.num_terms();
        let num_variables = store.num_global_variables();
        debug!(num_variables, num_terms, "performing optimization");

        let mut consensus = Vec::new();
        store.init_consensus(self.config.initial_consensus, &mut rng, &mut consensus);

        let threads = self.runtime.num_threads();
        let term_block_size = num_terms / (threads * 4) + 1;
        let variable_block_size = num_variables / (threads * 4) + 1;

        // The absolute threshold scales with the local-copy count, not the
        // consensus-variable count.
        let epsilon_abs_term =
            (store.num_local_variables() as f64).sqrt() as f32 * self.config.epsilon_abs;

        let mut objective: Option<ObjectiveReport> = None;
        let mut old_objective: Option<ObjectiveReport> = None;

        if tracing::enabled!(tracing::Level::TRACE) {
            let report = compute_objective(store, &consensus, false);
            trace!(
                iteration = 0usize,
                objective = report.objective,
                feasible = report.violated_constraints == 0,
                "starting objective"
            );
            objective = Some(report);
        }

        let mut residuals = ResidualState::default();
        let mut totals = VariablePartial::default();

        let mut iteration = 1usize;
        loop {
            // Term phase: minimize each term against a read-only consensus.
            {
                let consensus_view: &[f32] = &consensus;
                self.runtime
                    .map_blocks(store.terms_mut(), term_block_size, |_, block| {
                        for term in block {
                            term.update_lagrange(step_size, consensus_view);
                            term.minimize(step_size, consensus_view);
                        }
                    });
            }

            // Variable phase: re-average each consensus value from its local
            // copies and gather residual partials per block.
            let partials = {
                let terms = store.terms();
                let index = store.local_index();
                self.runtime
                    .map_blocks(&mut consensus, variable_block_size, |block_index, block| {
                        update_consensus_block(
                            terms,
                            index,
                            step_size,
                            block_index * variable_block_size,
                            block,
                        )
                    })
            };

            totals = VariablePartial::default();
            for partial in &partials {
                totals.merge(partial);
            }

            residuals.primal = f64::from(totals.primal_res).sqrt() as f32;
            residuals.dual = step_size * f64::from(totals.dual_res).sqrt() as f32;
            residuals.epsilon_primal = epsilon_abs_term
                + self.config.epsilon_rel
                    * f64::from(totals.ax_norm)
                        .sqrt()
                        .max(f64::from(totals.bz_norm).sqrt()) as f32;
            residuals.epsilon_dual =
                epsilon_abs_term + self.config.epsilon_rel * f64::from(totals.ay_norm).sqrt() as f32;

            if iteration % self.config.compute_period == 0 {
                if self.config.objective_break {
                    old_objective = objective.take();
                    let report = compute_objective(store, &consensus, false);
                    trace!(
                        iteration,
                        objective = report.objective,
                        feasible = report.violated_constraints == 0,
                        primal_res = residuals.primal,
                        dual_res = residuals.dual,
                        epsilon_primal = residuals.epsilon_primal,
                        epsilon_dual = residuals.epsilon_dual,
                        "iteration progress"
                    );
                    objective = Some(report);
                } else {
                    trace!(
                        iteration,
                        primal_res = residuals.primal,
                        dual_res = residuals.dual,
                        epsilon_primal = residuals.epsilon_primal,
                        epsilon_dual = residuals.epsilon_dual,
                        "iteration progress"
                    );
                }
            }

            iteration += 1;

            if self.should_break(iteration, objective.as_ref(), old_objective.as_ref(), residuals) {
                // Before stopping, recompute the objective to look for
                // violated constraints, then ask once more.
                objective = Some(compute_objective(store, &consensus, false));
                if self.should_break(iteration, objective.as_ref(), old_objective.as_ref(), residuals)
                {
                    break;
                }
            }
        }

        let final_objective =
            objective.unwrap_or_else(|| compute_objective(store, &consensus, false));
        let iterations = iteration - 1;

        info!(
            iterations,
            objective = final_objective.objective,
            feasible = final_objective.violated_constraints == 0,
            primal_res = residuals.primal,
            dual_res = residuals.dual,
            "optimization complete"
        );

        if final_objective.violated_constraints > 0 {
            warn!(
                violated_constraints = final_objective.violated_constraints,
                "no feasible solution found"
            );
            compute_objective(store, &consensus, true);
        }

        store.write_back(&consensus);

        Ok(SolveReport {
            iterations,
            objective: final_objective.objective,
            violated_constraints: final_objective.violated_constraints,
            converged: residuals.converged() && final_objective.violated_constraints == 0,
            primal_residual: residuals.primal,
            dual_residual: residuals.dual,
            epsilon_primal: residuals.epsilon_primal,
            epsilon_dual: residuals.epsilon_dual,
            lagrange_penalty: totals.lagrange_penalty,
            augmented_lagrange_penalty: totals.augmented_lagrange_penalty,
        })
    }

    /// Evaluates one term at the current atom values with the term's own
    /// local copies substituted in.
    ///
    /// `scratch` is a caller-provided buffer so repeated calls (one per term
    /// of a rule, summed by the caller) allocate at most once; it is resized
    /// to the store's consensus width.
    pub fn dual_incompatibility<A: AtomStore>(
        &self,
        store: &TermStore<A>,
        term: TermHandle,
        scratch: &mut Vec<f32>,
    ) -> f32 {
        scratch.clear();
        scratch.resize(store.num_global_variables(), 0.0);
        store.get_atom_values(scratch);

        for local in store.local_variables(term) {
            scratch[local.global_index()] = local.value();
        }

        store.term(term).evaluate(scratch)
    }

    fn should_break(
        &self,
        iteration: usize,
        objective: Option<&ObjectiveReport>,
        old_objective: Option<&ObjectiveReport>,
        residuals: ResidualState,
    ) -> bool {
        // The iteration budget always wins.
        if iteration > self.config.max_iterations {
            return true;
        }

        // Violated constraints veto every other stop condition.
        if let Some(report) = objective {
            if report.violated_constraints > 0 {
                return false;
            }
        }

        if iteration > 1 && residuals.converged() {
            return true;
        }

        if self.config.objective_break {
            if let (Some(current), Some(previous)) = (objective, old_objective) {
                if math::is_equal(current.objective, previous.objective) {
                    return true;
                }
            }
        }

        false
    }
}

/// Re-averages one block of consensus variables from their local copies.
///
/// The first pass over each variable's copies builds the new consensus value
/// and the `Ax`/`Ay` norms; the second measures primal drift and the
/// Lagrangian penalties against the value just stored.
fn update_consensus_block(
    terms: &[ObjectiveTerm],
    index: &[Vec<LocalRef>],
    step_size: f32,
    block_start: usize,
    block: &mut [f32],
) -> VariablePartial {
    let mut partial = VariablePartial::default();

    for (offset, consensus_value) in block.iter_mut().enumerate() {
        let refs = &index[block_start + offset];
        let count = refs.len() as f32;

        let mut total = 0.0f32;
        for local_ref in refs {
            let local =
                &terms[local_ref.term as usize].local_variables()[local_ref.slot as usize];
            total += local.value() + local.lagrange() / step_size;

            partial.ax_norm += local.value() * local.value();
            partial.ay_norm += local.lagrange() * local.lagrange();
        }

        let new_value = (total / count).clamp(LOWER_BOUND, UPPER_BOUND);

        let moved = *consensus_value - new_value;
        partial.dual_res += moved * moved * count;
        partial.bz_norm += new_value * new_value * count;
        *consensus_value = new_value;

        for local_ref in refs {
            let local =
                &terms[local_ref.term as usize].local_variables()[local_ref.slot as usize];
            let gap = local.value() - new_value;

            partial.primal_res += gap * gap;
            partial.lagrange_penalty += local.lagrange() * gap;
            partial.augmented_lagrange_penalty += 0.5 * step_size * gap * gap;
        }
    }

    partial
}

fn compute_objective<A: AtomStore>(
    store: &TermStore<A>,
    consensus: &[f32],
    log_violations: bool,
) -> ObjectiveReport {
    let mut objective = 0.0f32;
    let mut violated_constraints = 0usize;

    for term in store.terms() {
        if term.kind().is_constraint() {
            if term.evaluate(consensus) > 0.0 {
                violated_constraints += 1;

                if log_violations {
                    trace!(term = %term, "violated constraint");
                }
            }
        } else {
            objective += term.evaluate(consensus);
        }
    }

    ObjectiveReport {
        objective,
        violated_constraints,
    }
}
