//! AND-groups and the OR-tree of predicates
//!
//! A [`FilterGroup`] is the full constraint of one drawn shape. A
//! [`FilterTree`] ORs all groups together; the empty tree passes everything.

use std::fmt;
use std::sync::Arc;

use super::operand::Operand;
use super::predicate::Predicate;
use crate::domain::{Crs, Shape};
use crate::error::{FilterError, Result};
use crate::session::messages::OperatorSpec;

/// Ordered, non-empty set of AND-combined predicates
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    predicates: Vec<Predicate>,
}

impl FilterGroup {
    /// Build a group; an empty predicate list is rejected
    pub fn new(predicates: Vec<Predicate>) -> Result<Self> {
        if predicates.is_empty() {
            return Err(FilterError::InvalidPredicate(
                "a filter group needs at least one predicate".into(),
            ));
        }
        Ok(Self { predicates })
    }

    /// Group holding a single predicate
    pub fn single(predicate: Predicate) -> Self {
        Self {
            predicates: vec![predicate],
        }
    }

    /// Build a single-predicate group from an operand name
    pub fn parse(operand: &str, subject: Arc<Shape>, distance: Option<f64>) -> Result<Self> {
        let operand: Operand = operand.parse()?;
        Ok(Self::single(Predicate::new(operand, subject, distance)?))
    }

    /// Single-predicate group binding `shape` under an operator
    pub fn from_spec(spec: &OperatorSpec, shape: Arc<Shape>) -> Result<Self> {
        Ok(Self::single(Predicate::new(spec.operand, shape, spec.distance)?))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn has_distance_predicates(&self) -> bool {
        self.predicates.iter().any(|p| p.operand().is_distance())
    }
}

/// Identifier of a group within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Ordered set of OR-combined groups, authored in one working CRS
#[derive(Debug, Clone)]
pub struct FilterTree {
    crs: Crs,
    entries: Vec<(TreeId, FilterGroup)>,
    next_id: u64,
}

impl FilterTree {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Append a group, returning its id
    pub fn add_group(&mut self, group: FilterGroup) -> TreeId {
        let id = TreeId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, group));
        id
    }

    /// Remove a group, preserving the order of the rest
    pub fn remove_group(&mut self, id: TreeId) -> Option<FilterGroup> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    /// Swap the group stored under `id` in place
    pub fn replace_group(&mut self, id: TreeId, group: FilterGroup) -> Option<FilterGroup> {
        let slot = self.entries.iter_mut().find(|(entry, _)| *entry == id)?;
        Some(std::mem::replace(&mut slot.1, group))
    }

    pub fn get(&self, id: TreeId) -> Option<&FilterGroup> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, group)| group)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = &FilterGroup> {
        self.entries.iter().map(|(_, group)| group)
    }

    pub fn entries(&self) -> &[(TreeId, FilterGroup)] {
        &self.entries
    }

    pub fn working_crs(&self) -> &Crs {
        &self.crs
    }

    pub fn has_distance_predicates(&self) -> bool {
        self.groups().any(FilterGroup::has_distance_predicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(operand: &str) -> FilterGroup {
        let shape = Arc::new(Shape::point(0.0, 0.0, Crs::wgs84()).unwrap());
        FilterGroup::parse(operand, shape, None).unwrap()
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(matches!(
            FilterGroup::new(vec![]),
            Err(FilterError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn test_parse_unknown_operand() {
        let shape = Arc::new(Shape::point(0.0, 0.0, Crs::wgs84()).unwrap());
        assert!(matches!(
            FilterGroup::parse("touches", shape, None),
            Err(FilterError::UnknownOperand(_))
        ));
    }

    #[test]
    fn test_add_remove_preserves_order() {
        let mut tree = FilterTree::new(Crs::wgs84());
        assert!(tree.is_empty());

        let a = tree.add_group(group("intersects"));
        let b = tree.add_group(group("within"));
        let c = tree.add_group(group("contains"));
        assert_eq!(tree.len(), 3);
        assert_ne!(a, b);

        assert!(tree.remove_group(b).is_some());
        assert!(tree.remove_group(b).is_none());
        let ids: Vec<_> = tree.entries().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, c]);

        let operands: Vec<_> = tree
            .groups()
            .map(|g| g.predicates()[0].operand())
            .collect();
        assert_eq!(operands, vec![Operand::Intersects, Operand::Contains]);
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let mut tree = FilterTree::new(Crs::wgs84());
        let a = tree.add_group(group("intersects"));
        tree.clear();
        assert!(tree.is_empty());
        let b = tree.add_group(group("intersects"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_replace_group() {
        let mut tree = FilterTree::new(Crs::wgs84());
        let id = tree.add_group(group("intersects"));
        let old = tree.replace_group(id, group("disjoint")).unwrap();
        assert_eq!(old.predicates()[0].operand(), Operand::Intersects);
        assert_eq!(
            tree.get(id).unwrap().predicates()[0].operand(),
            Operand::Disjoint
        );
    }
}
