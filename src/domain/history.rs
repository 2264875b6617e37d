use std::collections::VecDeque;

use super::tx::TransactionRecord;

/// In-memory transaction history, newest first.
#[derive(Debug, Default, Clone)]
pub struct TransactionHistory {
    records: VecDeque<TransactionRecord>,
}

impl TransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TransactionRecord) {
        self.records.push_front(record);
    }

    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    /// Snapshot of all records, newest first.
    pub fn snapshot(&self) -> Vec<TransactionRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
