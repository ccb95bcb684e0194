//! Objective and constraint terms with their closed-form ADMM subproblems.
//!
//! Every term couples a [`Hyperplane`] with the local copies of the consensus
//! variables it touches. The per-iteration contract is:
//!
//! 1. `update_lagrange` moves each multiplier toward the current consensus gap.
//! 2. `minimize` solves the term's x-subproblem in closed form, writing only
//!    the term's own local copies.
//!
//! With `u_i = z[g_i] − y_i/ρ`, each kind reduces to at most a rank-1 update
//! along the hyperplane normal, so no linear system is ever solved. The box
//! `[0, 1]` is not enforced here; it is applied when local copies are averaged
//! into the consensus values.

use std::fmt;

use crate::math;
use crate::term::hyperplane::{Hyperplane, LocalVariable};

/// Direction of a linear inequality constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// `aᵀx ≤ c`.
    LessEqual,
    /// `aᵀx ≥ c`.
    GreaterEqual,
}

impl Sense {
    fn symbol(self) -> &'static str {
        match self {
            Sense::LessEqual => "<=",
            Sense::GreaterEqual => ">=",
        }
    }
}

/// The term variants the reasoner can minimize.
///
/// Weighted kinds carry a finite, non-negative weight; constraint kinds carry
/// none by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermKind {
    /// Penalty `w · max(0, aᵀx − c)`.
    Hinge {
        /// Rule weight, ≥ 0.
        weight: f32,
    },
    /// Penalty `w · max(0, aᵀx − c)²`.
    SquaredHinge {
        /// Rule weight, ≥ 0.
        weight: f32,
    },
    /// Hard constraint `aᵀx = c`.
    LinearEquality,
    /// Hard constraint `aᵀx ≤ c` or `aᵀx ≥ c`.
    LinearInequality {
        /// Direction of the inequality.
        sense: Sense,
    },
}

impl TermKind {
    /// The rule weight for objective kinds, `None` for constraints.
    #[must_use]
    pub fn weight(&self) -> Option<f32> {
        match *self {
            TermKind::Hinge { weight } | TermKind::SquaredHinge { weight } => Some(weight),
            TermKind::LinearEquality | TermKind::LinearInequality { .. } => None,
        }
    }

    /// True for the hard-constraint kinds.
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            TermKind::LinearEquality | TermKind::LinearInequality { .. }
        )
    }
}

/// One ground term: a tagged kind, its hyperplane, and the local copies of
/// every consensus variable the hyperplane references.
#[derive(Debug, Clone)]
pub struct ObjectiveTerm {
    kind: TermKind,
    hyperplane: Hyperplane,
    locals: Vec<LocalVariable>,
    squared_norm: f32,
}

impl ObjectiveTerm {
    pub(crate) fn new(kind: TermKind, hyperplane: Hyperplane, global_indices: &[u32]) -> Self {
        let locals = global_indices
            .iter()
            .map(|&g| LocalVariable::new(g))
            .collect();
        let squared_norm = hyperplane.squared_norm();

        Self {
            kind,
            hyperplane,
            locals,
            squared_norm,
        }
    }

    /// The term's kind tag.
    #[must_use]
    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    /// The term's hyperplane.
    #[must_use]
    pub fn hyperplane(&self) -> &Hyperplane {
        &self.hyperplane
    }

    /// The local copies, in variable-slot order.
    #[must_use]
    pub fn local_variables(&self) -> &[LocalVariable] {
        &self.locals
    }

    pub(crate) fn local_variables_mut(&mut self) -> &mut [LocalVariable] {
        &mut self.locals
    }

    /// `y_i ← y_i + ρ · (x_i − z[g_i])` for every slot.
    pub(crate) fn update_lagrange(&mut self, step_size: f32, consensus: &[f32]) {
        for local in &mut self.locals {
            local.lagrange += step_size * (local.value - consensus[local.global_index()]);
        }
    }

    /// Solves the term's ADMM x-subproblem at the current consensus.
    ///
    /// Writes only this term's local values; the consensus slice is read-only.
    pub(crate) fn minimize(&mut self, step_size: f32, consensus: &[f32]) {
        // Every branch starts from the penalty-free optimum u = z - y/rho.
        for local in &mut self.locals {
            local.value = consensus[local.global_index()] - local.lagrange / step_size;
        }
        let total = self.dot();
        let constant = self.hyperplane.constant();

        match self.kind {
            TermKind::LinearEquality => self.project_onto_hyperplane(total),
            TermKind::LinearInequality { sense } => {
                let violated = match sense {
                    Sense::LessEqual => total > constant,
                    Sense::GreaterEqual => total < constant,
                };
                if violated {
                    self.project_onto_hyperplane(total);
                }
            }
            TermKind::Hinge { weight } => {
                // The active-region candidate x = u - (w/rho)a lands at
                // a.x = a.u - (w/rho)|a|^2, so the region test needs no
                // tentative write.
                let shrink = weight / step_size;
                if total - shrink * self.squared_norm >= constant {
                    for (local, &coeff) in self
                        .locals
                        .iter_mut()
                        .zip(self.hyperplane.coefficients())
                    {
                        local.value -= shrink * coeff;
                    }
                } else if total > constant {
                    // Neither flat region holds; the minimum sits on the crease.
                    self.project_onto_hyperplane(total);
                }
            }
            TermKind::SquaredHinge { weight } => {
                if total > constant {
                    let scale =
                        2.0 * weight * (total - constant) / (step_size + 2.0 * weight * self.squared_norm);
                    for (local, &coeff) in self
                        .locals
                        .iter_mut()
                        .zip(self.hyperplane.coefficients())
                    {
                        local.value -= scale * coeff;
                    }
                }
            }
        }
    }

    /// The term's contribution at the given consensus values: weighted penalty
    /// for objective kinds, violation magnitude for constraints.
    ///
    /// Constraint violations within floating-point tolerance count as zero.
    #[must_use]
    pub fn evaluate(&self, consensus: &[f32]) -> f32 {
        let total: f32 = self
            .locals
            .iter()
            .zip(self.hyperplane.coefficients())
            .map(|(local, &coeff)| coeff * consensus[local.global_index()])
            .sum();
        let margin = total - self.hyperplane.constant();

        match self.kind {
            TermKind::Hinge { weight } => weight * margin.max(0.0),
            TermKind::SquaredHinge { weight } => {
                let hinge = margin.max(0.0);
                weight * hinge * hinge
            }
            TermKind::LinearEquality => snap_violation(margin.abs()),
            TermKind::LinearInequality { sense } => {
                let violation = match sense {
                    Sense::LessEqual => margin.max(0.0),
                    Sense::GreaterEqual => (-margin).max(0.0),
                };
                snap_violation(violation)
            }
        }
    }

    fn dot(&self) -> f32 {
        self.locals
            .iter()
            .zip(self.hyperplane.coefficients())
            .map(|(local, &coeff)| coeff * local.value)
            .sum()
    }

    /// `x ← x − ((aᵀx − c)/‖a‖²) · a`. A zero-norm hyperplane has nothing to
    /// project onto, so the values stand.
    fn project_onto_hyperplane(&mut self, total: f32) {
        if self.squared_norm <= 0.0 {
            return;
        }

        let scale = (total - self.hyperplane.constant()) / self.squared_norm;
        for (local, &coeff) in self.locals.iter_mut().zip(self.hyperplane.coefficients()) {
            local.value -= scale * coeff;
        }
    }
}

fn snap_violation(violation: f32) -> f32 {
    if math::is_zero(violation) {
        0.0
    } else {
        violation
    }
}

impl fmt::Display for ObjectiveTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lhs = String::new();
        for (slot, (local, coeff)) in self
            .locals
            .iter()
            .zip(self.hyperplane.coefficients())
            .enumerate()
        {
            if slot > 0 {
                lhs.push_str(" + ");
            }
            lhs.push_str(&format!("{coeff}*x{}", local.global_index()));
        }
        let constant = self.hyperplane.constant();

        match self.kind {
            TermKind::Hinge { weight } => write!(f, "{weight} * max(0, {lhs} - {constant})"),
            TermKind::SquaredHinge { weight } => {
                write!(f, "{weight} * max(0, {lhs} - {constant})^2")
            }
            TermKind::LinearEquality => write!(f, "{lhs} = {constant}"),
            TermKind::LinearInequality { sense } => {
                write!(f, "{lhs} {} {constant}", sense.symbol())
            }
        }
    }
}
