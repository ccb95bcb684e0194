//! The term model: hyperplanes, local copies, term variants, and the store.
//!
//! Grounding produces one term per instantiated rule. Each term is a convex
//! piece over a handful of consensus variables:
//!
//! - [`Hyperplane`] is the immutable `(a, c)` pair defining `aᵀx − c`.
//! - [`LocalVariable`] is a term's private copy of one consensus variable
//!   together with its Lagrange multiplier.
//! - [`ObjectiveTerm`] tags the hyperplane with a [`TermKind`] (hinge,
//!   squared hinge, or a linear constraint) and knows how to minimize its own
//!   block and evaluate its contribution.
//! - [`TermStore`] owns the terms, the inverted consensus-to-local index, and
//!   the [`AtomStore`] backing the variables.

mod hyperplane;
mod objective;
mod store;

pub use hyperplane::{Hyperplane, LocalVariable};
pub use objective::{ObjectiveTerm, Sense, TermKind};
pub use store::{AtomStore, DenseAtomStore, TermHandle, TermStore};

pub(crate) use store::LocalRef;
