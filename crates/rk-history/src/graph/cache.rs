//! Cached child lists and insertion ranks, rebuilt on demand

use std::collections::HashMap;

use crate::feature::FeatureId;

#[derive(Debug, Clone, Default)]
pub(super) struct ChildCache {
    /// Direct dependents of each feature, in insertion order
    pub children: HashMap<FeatureId, Vec<FeatureId>>,
    /// Position of each feature in insertion order
    pub rank: HashMap<FeatureId, usize>,
    /// Whether cache is valid
    pub valid: bool,
}

impl ChildCache {
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn rebuild(&mut self, order: &[FeatureId], parents: &HashMap<FeatureId, Vec<FeatureId>>) {
        self.children.clear();
        self.rank.clear();

        for (index, id) in order.iter().enumerate() {
            self.rank.insert(id.clone(), index);
            self.children.entry(id.clone()).or_default();
        }

        for id in order {
            for parent in parents.get(id).into_iter().flatten() {
                let list = self.children.entry(parent.clone()).or_default();
                // A parent listed twice still yields one child entry
                if list.last() != Some(id) {
                    list.push(id.clone());
                }
            }
        }

        self.valid = true;
    }

    pub fn rank_of(&self, id: &FeatureId) -> usize {
        self.rank.get(id).copied().unwrap_or(usize::MAX)
    }
}
