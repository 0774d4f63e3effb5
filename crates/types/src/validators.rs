//! Weighted validator sets.

use crate::{ValidatorId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An immutable weighted validator set for one epoch.
///
/// Validators are indexed `0..len()` sorted by weight (descending), then by
/// ID (ascending). The index, not the ID, is what vector clocks and root keys
/// use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(ValidatorId, Weight)>", into = "Vec<(ValidatorId, Weight)>")]
pub struct Validators {
    ids: Vec<ValidatorId>,
    weights: Vec<Weight>,
    indexes: HashMap<ValidatorId, usize>,
    total_weight: Weight,
}

impl Validators {
    /// Build from `(id, weight)` pairs. Zero weights are dropped; a repeated
    /// ID keeps the last weight.
    pub fn new(pairs: impl IntoIterator<Item = (ValidatorId, Weight)>) -> Self {
        let mut builder = ValidatorsBuilder::new();
        for (id, weight) in pairs {
            builder.set(id, weight);
        }
        builder.build()
    }

    /// Build a set where every validator has weight 1.
    pub fn equal(ids: impl IntoIterator<Item = ValidatorId>) -> Self {
        Self::new(ids.into_iter().map(|id| (id, 1)))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// IDs in index order.
    pub fn sorted_ids(&self) -> &[ValidatorId] {
        &self.ids
    }

    /// Weights in index order.
    pub fn sorted_weights(&self) -> &[Weight] {
        &self.weights
    }

    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Minimum weight required for quorum (> 2/3 of total).
    pub fn quorum(&self) -> Weight {
        // 2 * total must not overflow
        (u128::from(self.total_weight) * 2 / 3 + 1) as Weight
    }

    pub fn exists(&self, id: ValidatorId) -> bool {
        self.indexes.contains_key(&id)
    }

    pub fn index_of(&self, id: ValidatorId) -> Option<usize> {
        self.indexes.get(&id).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<ValidatorId> {
        self.ids.get(index).copied()
    }

    /// Weight of a validator (0 if unknown).
    pub fn weight(&self, id: ValidatorId) -> Weight {
        self.index_of(id).map_or(0, |i| self.weights[i])
    }

    /// Weight at an index (0 if out of range).
    pub fn weight_at(&self, index: usize) -> Weight {
        self.weights.get(index).copied().unwrap_or(0)
    }

    /// Start a fresh weight counter over this set.
    pub fn counter(&self) -> WeightCounter<'_> {
        WeightCounter {
            validators: self,
            already: vec![false; self.len()],
            sum: 0,
            quorum: self.quorum(),
        }
    }

    /// Builder seeded with this set's validators.
    pub fn builder(&self) -> ValidatorsBuilder {
        let mut builder = ValidatorsBuilder::new();
        for (id, weight) in self.ids.iter().zip(&self.weights) {
            builder.set(*id, *weight);
        }
        builder
    }
}

impl From<Vec<(ValidatorId, Weight)>> for Validators {
    fn from(pairs: Vec<(ValidatorId, Weight)>) -> Self {
        Validators::new(pairs)
    }
}

impl From<Validators> for Vec<(ValidatorId, Weight)> {
    fn from(validators: Validators) -> Self {
        validators.ids.into_iter().zip(validators.weights).collect()
    }
}

/// Mutable accumulator for [`Validators`].
#[derive(Debug, Clone, Default)]
pub struct ValidatorsBuilder {
    weights: BTreeMap<ValidatorId, Weight>,
}

impl ValidatorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a validator's weight; zero removes it.
    pub fn set(&mut self, id: ValidatorId, weight: Weight) -> &mut Self {
        if weight == 0 {
            self.weights.remove(&id);
        } else {
            self.weights.insert(id, weight);
        }
        self
    }

    pub fn build(&self) -> Validators {
        let mut pairs: Vec<(ValidatorId, Weight)> =
            self.weights.iter().map(|(id, w)| (*id, *w)).collect();
        pairs.sort_by(|(id_a, w_a), (id_b, w_b)| w_b.cmp(w_a).then(id_a.cmp(id_b)));

        let ids: Vec<ValidatorId> = pairs.iter().map(|(id, _)| *id).collect();
        let weights: Vec<Weight> = pairs.iter().map(|(_, w)| *w).collect();
        let indexes = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let total_weight = weights.iter().sum();

        Validators {
            ids,
            weights,
            indexes,
            total_weight,
        }
    }
}

/// Weighted vote counter that counts every validator at most once.
#[derive(Debug, Clone)]
pub struct WeightCounter<'a> {
    validators: &'a Validators,
    already: Vec<bool>,
    sum: Weight,
    quorum: Weight,
}

impl WeightCounter<'_> {
    /// Count a validator's weight. Returns false if it was already counted
    /// or isn't in the set.
    pub fn count(&mut self, id: ValidatorId) -> bool {
        match self.validators.index_of(id) {
            Some(index) => self.count_by_index(index),
            None => false,
        }
    }

    /// Count the validator at `index`. Returns false if already counted.
    pub fn count_by_index(&mut self, index: usize) -> bool {
        match self.already.get_mut(index) {
            Some(seen) if !*seen => {
                *seen = true;
                self.sum += self.validators.weight_at(index);
                true
            }
            _ => false,
        }
    }

    pub fn sum(&self) -> Weight {
        self.sum
    }

    pub fn has_quorum(&self) -> bool {
        self.sum >= self.quorum
    }

    pub fn quorum(&self) -> Weight {
        self.quorum
    }
}
