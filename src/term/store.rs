//! Term storage, the consensus-to-local index, and atom write-back.
//!
//! The store owns everything the solve mutates: the terms (and through them
//! every local copy) plus the backing atoms. Consensus values themselves live
//! in a buffer the reasoner owns for the duration of a solve; the store fills
//! it at initialization and pushes it back to the atoms afterwards.
//!
//! The inverted index `global index -> [local copies]` is what the variable
//! phase walks: for each consensus variable it visits every term slot that
//! references it, without touching the terms' own layout.

use rand::Rng;

use crate::config::InitialValue;
use crate::error::{AdmmError, Result};
use crate::term::hyperplane::{Hyperplane, LocalVariable};
use crate::term::objective::{ObjectiveTerm, TermKind};

/// External atom storage the solver reads initial values from and writes
/// results back into.
///
/// Implementations are indexed by the same dense global indices the terms
/// use. The solver calls `set_atom_value` exactly once per index after a
/// solve.
pub trait AtomStore {
    /// Current truth value of the atom backing global index `index`.
    fn atom_value(&self, index: usize) -> f32;

    /// Receives the final consensus value for global index `index`.
    fn set_atom_value(&mut self, index: usize, value: f32);
}

/// Flat in-memory [`AtomStore`] over a `Vec<f32>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseAtomStore {
    values: Vec<f32>,
}

impl DenseAtomStore {
    /// Creates a store holding the given atom values.
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// The current atom values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the store holds no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AtomStore for DenseAtomStore {
    fn atom_value(&self, index: usize) -> f32 {
        self.values[index]
    }

    fn set_atom_value(&mut self, index: usize, value: f32) {
        self.values[index] = value;
    }
}

/// Location of one local copy: which term and which slot within it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalRef {
    pub(crate) term: u32,
    pub(crate) slot: u32,
}

/// Handle to a registered term, returned by [`TermStore::add_term`].
///
/// The handle stays valid for the lifetime of the store; terms are never
/// removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermHandle(usize);

impl TermHandle {
    /// The term's position in registration order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns the ground terms, their local copies, and the backing atoms.
#[derive(Debug)]
pub struct TermStore<A> {
    atoms: A,
    terms: Vec<ObjectiveTerm>,
    local_index: Vec<Vec<LocalRef>>,
    num_local_variables: usize,
}

impl<A: AtomStore> TermStore<A> {
    /// Creates an empty store over the given atom backing.
    #[must_use]
    pub fn new(atoms: A) -> Self {
        Self {
            atoms,
            terms: Vec::new(),
            local_index: Vec::new(),
            num_local_variables: 0,
        }
    }

    /// Registers a ground term.
    ///
    /// `global_indices` names the consensus variable behind each hyperplane
    /// slot; a fresh local copy is created per slot and indexed under its
    /// global variable.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidTerm`] for an empty hyperplane, a
    /// coefficient/index arity mismatch, or a negative or non-finite weight.
    pub fn add_term(
        &mut self,
        kind: TermKind,
        hyperplane: Hyperplane,
        global_indices: &[u32],
    ) -> Result<TermHandle> {
        if hyperplane.is_empty() {
            return Err(AdmmError::InvalidTerm {
                detail: "hyperplane has no coefficients".to_string(),
            });
        }

        if hyperplane.len() != global_indices.len() {
            return Err(AdmmError::InvalidTerm {
                detail: format!(
                    "{} coefficients but {} variable indices",
                    hyperplane.len(),
                    global_indices.len()
                ),
            });
        }

        if let Some(weight) = kind.weight() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AdmmError::InvalidTerm {
                    detail: format!("weight must be finite and non-negative, got {weight}"),
                });
            }
        }

        let term_index = self.terms.len();
        for (slot, &global) in global_indices.iter().enumerate() {
            let global = global as usize;
            if global >= self.local_index.len() {
                self.local_index.resize_with(global + 1, Vec::new);
            }
            self.local_index[global].push(LocalRef {
                term: term_index as u32,
                slot: slot as u32,
            });
        }
        self.num_local_variables += global_indices.len();
        self.terms
            .push(ObjectiveTerm::new(kind, hyperplane, global_indices));

        Ok(TermHandle(term_index))
    }

    /// The term behind a handle.
    #[must_use]
    pub fn term(&self, handle: TermHandle) -> &ObjectiveTerm {
        &self.terms[handle.0]
    }

    /// The local copies created for a registered term, in slot order.
    #[must_use]
    pub fn local_variables(&self, handle: TermHandle) -> &[LocalVariable] {
        self.terms[handle.0].local_variables()
    }

    /// Number of registered terms.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Number of consensus variables (one past the highest referenced index).
    #[must_use]
    pub fn num_global_variables(&self) -> usize {
        self.local_index.len()
    }

    /// Total number of local copies across all terms.
    #[must_use]
    pub fn num_local_variables(&self) -> usize {
        self.num_local_variables
    }

    /// Number of local copies registered under one consensus variable.
    #[must_use]
    pub fn num_local_copies(&self, global: usize) -> usize {
        self.local_index[global].len()
    }

    /// The backing atoms.
    #[must_use]
    pub fn atoms(&self) -> &A {
        &self.atoms
    }

    /// Consumes the store and returns the backing atoms.
    #[must_use]
    pub fn into_atoms(self) -> A {
        self.atoms
    }

    /// Resets every local copy: `x` per the policy, `y` to zero.
    pub fn reset_local_variables<R: Rng>(&mut self, policy: InitialValue, rng: &mut R) {
        let atoms = &self.atoms;
        for term in &mut self.terms {
            for local in term.local_variables_mut() {
                local.value = match policy {
                    InitialValue::Zero => 0.0,
                    InitialValue::Random => rng.gen(),
                    InitialValue::Atom => atoms.atom_value(local.global_index()),
                };
                local.lagrange = 0.0;
            }
        }
    }

    /// Fills `consensus` with one starting value per consensus variable.
    pub fn init_consensus<R: Rng>(
        &self,
        policy: InitialValue,
        rng: &mut R,
        consensus: &mut Vec<f32>,
    ) {
        consensus.clear();
        consensus.resize(self.num_global_variables(), 0.0);

        match policy {
            InitialValue::Zero => {}
            InitialValue::Random => {
                for value in consensus.iter_mut() {
                    *value = rng.gen();
                }
            }
            InitialValue::Atom => self.get_atom_values(consensus),
        }
    }

    /// Copies the current atom values into `consensus`.
    pub fn get_atom_values(&self, consensus: &mut [f32]) {
        for (global, value) in consensus.iter_mut().enumerate() {
            *value = self.atoms.atom_value(global);
        }
    }

    /// Pushes the final consensus values into the backing atoms.
    pub fn write_back(&mut self, consensus: &[f32]) {
        for (global, &value) in consensus.iter().enumerate() {
            self.atoms.set_atom_value(global, value);
        }
    }

    /// Entry checks the reasoner runs before iterating: the store must hold
    /// terms, and every index in `[0, num_globals)` must be referenced.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.terms.is_empty() {
            return Err(AdmmError::EmptyTermStore);
        }

        for (global, refs) in self.local_index.iter().enumerate() {
            if refs.is_empty() {
                return Err(AdmmError::UnreferencedVariable { index: global });
            }
        }

        Ok(())
    }

    pub(crate) fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    pub(crate) fn terms_mut(&mut self) -> &mut [ObjectiveTerm] {
        &mut self.terms
    }

    pub(crate) fn local_index(&self) -> &[Vec<LocalRef>] {
        &self.local_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::objective::Sense;
    use rand_chacha::ChaCha8Rng;
    use rand::SeedableRng;

    fn store_with_two_terms() -> (TermStore<DenseAtomStore>, TermHandle, TermHandle) {
        let mut store = TermStore::new(DenseAtomStore::new(vec![0.1, 0.2, 0.3]));
        let first = store
            .add_term(
                TermKind::Hinge { weight: 1.0 },
                Hyperplane::new(vec![1.0, 1.0], 1.0),
                &[0, 1],
            )
            .unwrap();
        let second = store
            .add_term(
                TermKind::LinearEquality,
                Hyperplane::new(vec![1.0, -1.0], 0.0),
                &[1, 2],
            )
            .unwrap();
        (store, first, second)
    }

    #[test]
    fn registration_tracks_counts_and_index() {
        let (store, first, second) = store_with_two_terms();

        assert_eq!(store.num_terms(), 2);
        assert_eq!(store.num_global_variables(), 3);
        assert_eq!(store.num_local_variables(), 4);
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);

        // Variable 1 is shared by both terms through distinct local copies.
        assert_eq!(store.num_local_copies(1), 2);
        assert_eq!(store.num_local_copies(0), 1);
        assert_eq!(store.local_variables(first).len(), 2);
        assert_eq!(store.local_variables(second)[1].global_index(), 2);
    }

    #[test]
    fn add_rejects_malformed_terms() {
        let mut store = TermStore::new(DenseAtomStore::new(vec![0.0; 2]));

        let err = store.add_term(
            TermKind::Hinge { weight: -1.0 },
            Hyperplane::new(vec![1.0], 0.0),
            &[0],
        );
        assert!(matches!(err, Err(AdmmError::InvalidTerm { .. })));

        let err = store.add_term(
            TermKind::SquaredHinge { weight: f32::NAN },
            Hyperplane::new(vec![1.0], 0.0),
            &[0],
        );
        assert!(matches!(err, Err(AdmmError::InvalidTerm { .. })));

        let err = store.add_term(
            TermKind::LinearEquality,
            Hyperplane::new(vec![1.0, 1.0], 0.0),
            &[0],
        );
        assert!(matches!(err, Err(AdmmError::InvalidTerm { .. })));

        let err = store.add_term(
            TermKind::LinearEquality,
            Hyperplane::new(Vec::new(), 0.0),
            &[],
        );
        assert!(matches!(err, Err(AdmmError::InvalidTerm { .. })));
    }

    #[test]
    fn validate_flags_empty_and_gappy_stores() {
        let store: TermStore<DenseAtomStore> = TermStore::new(DenseAtomStore::new(Vec::new()));
        assert!(matches!(store.validate(), Err(AdmmError::EmptyTermStore)));

        let mut store = TermStore::new(DenseAtomStore::new(vec![0.0; 3]));
        store
            .add_term(
                TermKind::LinearInequality { sense: Sense::LessEqual },
                Hyperplane::new(vec![1.0, 1.0], 1.0),
                &[0, 2],
            )
            .unwrap();
        assert!(matches!(
            store.validate(),
            Err(AdmmError::UnreferencedVariable { index: 1 })
        ));
    }

    #[test]
    fn reset_policies_cover_locals() {
        let (mut store, first, second) = store_with_two_terms();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        store.reset_local_variables(InitialValue::Atom, &mut rng);
        assert!((store.local_variables(first)[0].value() - 0.1).abs() < 1e-6);
        assert!((store.local_variables(second)[0].value() - 0.2).abs() < 1e-6);
        assert_eq!(store.local_variables(first)[0].lagrange(), 0.0);

        store.reset_local_variables(InitialValue::Random, &mut rng);
        for handle in [first, second] {
            for local in store.local_variables(handle) {
                assert!((0.0..1.0).contains(&local.value()));
                assert_eq!(local.lagrange(), 0.0);
            }
        }

        store.reset_local_variables(InitialValue::Zero, &mut rng);
        assert!(store
            .local_variables(first)
            .iter()
            .all(|local| local.value() == 0.0));
    }

    #[test]
    fn consensus_init_and_write_back_roundtrip() {
        let (mut store, _, _) = store_with_two_terms();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut consensus = Vec::new();

        store.init_consensus(InitialValue::Atom, &mut rng, &mut consensus);
        assert_eq!(consensus, vec![0.1, 0.2, 0.3]);

        store.init_consensus(InitialValue::Zero, &mut rng, &mut consensus);
        assert_eq!(consensus, vec![0.0, 0.0, 0.0]);

        store.init_consensus(InitialValue::Random, &mut rng, &mut consensus);
        assert!(consensus.iter().all(|v| (0.0..1.0).contains(v)));

        store.write_back(&[0.4, 0.5, 0.6]);
        assert_eq!(store.atoms().values(), &[0.4, 0.5, 0.6]);
    }
}
