//! The set of active state nodes.

use super::node::NodeId;
use std::collections::BTreeSet;

/// Active nodes: every active leaf plus its whole ancestor chain.
///
/// Backed by an ordered set so iteration follows document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration(BTreeSet<NodeId>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.0.contains(&node)
    }

    pub fn insert(&mut self, node: NodeId) -> bool {
        self.0.insert(node)
    }

    pub fn remove(&mut self, node: NodeId) -> bool {
        self.0.remove(&node)
    }

    /// Active nodes in document order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<NodeId> for Configuration {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_document_order() {
        let config: Configuration = [5, 0, 3].into_iter().collect();
        assert_eq!(config.iter().collect::<Vec<_>>(), vec![0, 3, 5]);
        assert_eq!(config.iter().rev().collect::<Vec<_>>(), vec![5, 3, 0]);
    }

    #[test]
    fn insert_and_remove() {
        let mut config = Configuration::new();
        assert!(config.insert(2));
        assert!(!config.insert(2));
        assert!(config.contains(2));
        assert!(config.remove(2));
        assert!(config.is_empty());
    }
}
