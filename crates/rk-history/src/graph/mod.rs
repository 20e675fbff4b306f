//! Dependency Graph
//!
//! Directed acyclic graph over feature IDs. Parent edges are the only
//! authoritative edges; child lists are derived and cached, and the cache is
//! invalidated on every structural edit.

mod cache;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{HistoryError, HistoryResult};
use crate::feature::FeatureId;

use cache::ChildCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Feature dependency graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Feature IDs in insertion order (tie-breaker for ordering)
    order: Vec<FeatureId>,
    /// Parent edges: feature -> ordered inputs
    parents: HashMap<FeatureId, Vec<FeatureId>>,
    /// Derived child lists (interior mutability for lazy evaluation)
    cache: RefCell<ChildCache>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.parents.contains_key(id)
    }

    /// All feature IDs in insertion order
    pub fn ids(&self) -> &[FeatureId] {
        &self.order
    }

    /// Position of a feature in insertion order
    pub fn position(&self, id: &FeatureId) -> Option<usize> {
        self.ensure_cache_valid();
        self.cache.borrow().rank.get(id).copied()
    }

    /// Ordered parents of a feature
    pub fn parents_of(&self, id: &FeatureId) -> Option<&[FeatureId]> {
        self.parents.get(id).map(Vec::as_slice)
    }

    /// Direct dependents of a feature, in insertion order
    pub fn children_of(&self, id: &FeatureId) -> Vec<FeatureId> {
        self.ensure_cache_valid();
        self.cache
            .borrow()
            .children
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Features without parents, in insertion order
    pub fn roots(&self) -> Vec<FeatureId> {
        self.order
            .iter()
            .filter(|id| self.parents.get(*id).is_none_or(Vec::is_empty))
            .cloned()
            .collect()
    }

    /// Append a node with its parents
    pub fn add_node(&mut self, id: FeatureId, parents: Vec<FeatureId>) -> HistoryResult<()> {
        self.insert_node(self.order.len(), id, parents)
    }

    /// Insert a node at a position in insertion order
    ///
    /// Parents must already exist, so a new node can never close a cycle
    /// except by naming itself.
    pub fn insert_node(
        &mut self,
        index: usize,
        id: FeatureId,
        parents: Vec<FeatureId>,
    ) -> HistoryResult<()> {
        if self.contains(&id) {
            return Err(HistoryError::DuplicateFeature(id));
        }
        for parent in &parents {
            if *parent == id {
                return Err(HistoryError::Cycle {
                    path: vec![id.clone(), id],
                });
            }
            if !self.contains(parent) {
                return Err(HistoryError::FeatureNotFound(parent.clone()));
            }
        }

        let index = index.min(self.order.len());
        self.order.insert(index, id.clone());
        self.parents.insert(id, parents);
        self.invalidate_cache();
        Ok(())
    }

    /// Make `child` depend on `parent`
    ///
    /// Fails with `Cycle` and leaves the graph untouched if `parent` already
    /// depends on `child`. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, child: &FeatureId, parent: &FeatureId) -> HistoryResult<()> {
        self.require(child)?;
        self.require(parent)?;

        if let Some(path) = self.cycle_path(child, parent) {
            return Err(HistoryError::Cycle { path });
        }

        let list = self
            .parents
            .get_mut(child)
            .ok_or_else(|| HistoryError::FeatureNotFound(child.clone()))?;
        if !list.contains(parent) {
            list.push(parent.clone());
            self.invalidate_cache();
        }
        Ok(())
    }

    /// Drop the edge `child -> parent`; returns whether it existed
    pub fn remove_edge(&mut self, child: &FeatureId, parent: &FeatureId) -> HistoryResult<bool> {
        let list = self
            .parents
            .get_mut(child)
            .ok_or_else(|| HistoryError::FeatureNotFound(child.clone()))?;
        let before = list.len();
        list.retain(|p| p != parent);
        let removed = list.len() != before;
        if removed {
            self.invalidate_cache();
        }
        Ok(removed)
    }

    /// Replace the parents of a node, all-or-nothing
    pub fn set_parents(&mut self, id: &FeatureId, parents: Vec<FeatureId>) -> HistoryResult<()> {
        self.require(id)?;
        for parent in &parents {
            self.require(parent)?;
            if let Some(path) = self.cycle_path(id, parent) {
                return Err(HistoryError::Cycle { path });
            }
        }

        self.parents.insert(id.clone(), parents);
        self.invalidate_cache();
        Ok(())
    }

    /// Remove a node that nothing depends on
    pub fn remove_node(&mut self, id: &FeatureId) -> HistoryResult<()> {
        self.require(id)?;

        let dependents = self.children_of(id);
        if !dependents.is_empty() {
            return Err(HistoryError::InUse {
                id: id.clone(),
                dependents,
            });
        }

        self.order.retain(|other| other != id);
        self.parents.remove(id);
        self.invalidate_cache();
        Ok(())
    }

    /// Order the given features so that every parent precedes its children
    ///
    /// Iterative depth-first traversal with three-colour marking. Ties are
    /// broken by insertion order, so an unchanged graph always yields the
    /// same order. Dependencies through features outside `ids` are honored.
    pub fn topological_order(&self, ids: &[FeatureId]) -> HistoryResult<Vec<FeatureId>> {
        for id in ids {
            self.require(id)?;
        }

        self.ensure_cache_valid();
        let cache = self.cache.borrow();

        let wanted: HashSet<&FeatureId> = ids.iter().collect();
        let mut starts: Vec<&FeatureId> = wanted.iter().copied().collect();
        starts.sort_by_key(|id| cache.rank_of(id));

        let mut marks: HashMap<&FeatureId, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(starts.len());

        for start in starts {
            if marks.contains_key(start) {
                continue;
            }

            marks.insert(start, Mark::InProgress);
            let mut stack: Vec<(&FeatureId, Vec<&FeatureId>, usize)> =
                vec![(start, self.sorted_parents(&cache, start), 0)];

            while let Some(frame) = stack.last_mut() {
                if let Some(&parent) = frame.1.get(frame.2) {
                    frame.2 += 1;
                    match marks.get(parent) {
                        None => {
                            marks.insert(parent, Mark::InProgress);
                            stack.push((parent, self.sorted_parents(&cache, parent), 0));
                        }
                        Some(Mark::InProgress) => {
                            let from = stack
                                .iter()
                                .position(|(id, _, _)| *id == parent)
                                .unwrap_or(0);
                            let mut path: Vec<FeatureId> =
                                stack[from..].iter().map(|(id, _, _)| (*id).clone()).collect();
                            path.push(parent.clone());
                            return Err(HistoryError::Cycle { path });
                        }
                        Some(Mark::Done) => {}
                    }
                } else {
                    let node = frame.0;
                    marks.insert(node, Mark::Done);
                    if wanted.contains(node) {
                        order.push(node.clone());
                    }
                    stack.pop();
                }
            }
        }

        Ok(order)
    }

    /// Every feature in insertion-tie-broken dependency order
    pub fn full_order(&self) -> HistoryResult<Vec<FeatureId>> {
        self.topological_order(&self.order)
    }

    /// All transitive dependents of a feature (excluding itself)
    pub fn descendants_of(&self, id: &FeatureId) -> HashSet<FeatureId> {
        self.ensure_cache_valid();
        let cache = self.cache.borrow();

        let mut found = HashSet::new();
        let mut queue: VecDeque<&FeatureId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in cache.children.get(current).into_iter().flatten() {
                if found.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        found
    }

    /// All transitive inputs of a feature (excluding itself)
    pub fn ancestors_of(&self, id: &FeatureId) -> HashSet<FeatureId> {
        let mut found = HashSet::new();
        let mut queue: VecDeque<&FeatureId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for parent in self.parents.get(current).into_iter().flatten() {
                if found.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }
        found
    }

    fn sorted_parents<'a>(&'a self, cache: &ChildCache, id: &FeatureId) -> Vec<&'a FeatureId> {
        let mut parents: Vec<&FeatureId> = self.parents.get(id).into_iter().flatten().collect();
        parents.sort_by_key(|p| cache.rank_of(p));
        parents
    }

    fn require(&self, id: &FeatureId) -> HistoryResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(HistoryError::FeatureNotFound(id.clone()))
        }
    }

    /// Path proving that `child -> parent` would close a cycle
    ///
    /// Walks parent edges from `parent` looking for `child`. The returned
    /// path starts and ends with `child`; each entry depends on the next.
    fn cycle_path(&self, child: &FeatureId, parent: &FeatureId) -> Option<Vec<FeatureId>> {
        let mut previous: HashMap<&FeatureId, &FeatureId> = HashMap::new();
        let mut seen: HashSet<&FeatureId> = HashSet::from([parent]);
        let mut queue: VecDeque<&FeatureId> = VecDeque::from([parent]);

        while let Some(current) = queue.pop_front() {
            if current == child {
                let mut chain = vec![current.clone()];
                let mut cursor = current;
                while let Some(&prev) = previous.get(cursor) {
                    chain.push(prev.clone());
                    cursor = prev;
                }
                // chain runs child .. parent; the cycle reads child -> parent -> .. -> child
                chain.reverse();
                let mut path = vec![child.clone()];
                path.extend(chain);
                return Some(path);
            }
            for next in self.parents.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    previous.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn invalidate_cache(&self) {
        self.cache.borrow_mut().invalidate();
    }

    fn ensure_cache_valid(&self) {
        let mut cache = self.cache.borrow_mut();
        if !cache.valid {
            cache.rebuild(&self.order, &self.parents);
        }
    }
}
