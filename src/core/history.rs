//! History records.
//!
//! When a state with history children is exited, each history child records
//! what was active beneath the parent: the active children for shallow
//! history, the active atomic descendants for deep history. Re-entering the
//! history node later restores that configuration.
//!
//! Records are immutable values: [`HistoryRecords::record`] returns a new set
//! of records and leaves the original untouched.

use super::node::NodeId;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryRecords {
    records: BTreeMap<NodeId, Vec<NodeId>>,
}

impl HistoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the configuration remembered by `history_node`, returning new
    /// records.
    pub fn record(&self, history_node: NodeId, states: Vec<NodeId>) -> Self {
        let mut records = self.records.clone();
        records.insert(history_node, states);
        Self { records }
    }

    /// The remembered states of a history node, if it was ever recorded.
    pub fn get(&self, history_node: NodeId) -> Option<&[NodeId]> {
        self.records.get(&history_node).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> {
        self.records
            .iter()
            .map(|(node, states)| (*node, states.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(NodeId, Vec<NodeId>)> for HistoryRecords {
    fn from_iter<I: IntoIterator<Item = (NodeId, Vec<NodeId>)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
