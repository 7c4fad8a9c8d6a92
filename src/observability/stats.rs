//! Bounded buffer of recent operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// One finished GraphQL operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub operation_name: Option<String>,
    pub operation_kind: Option<&'static str>,
    pub depth: Option<usize>,
    pub complexity: Option<u64>,
    pub subgraphs: Vec<String>,
    pub outcome: &'static str,
    pub error_code: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub capacity: usize,
    pub recorded: usize,
    pub outcomes: BTreeMap<&'static str, usize>,
    pub average_duration_ms: f64,
    pub max_complexity_seen: Option<u64>,
    pub recent: Vec<OperationRecord>,
}

/// Ring buffer; the oldest record is dropped when full.
pub struct OperationStats {
    capacity: usize,
    records: Mutex<VecDeque<OperationRecord>>,
}

impl OperationStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn record(&self, record: OperationRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate view plus the `recent` newest records, newest first.
    pub fn snapshot(&self, recent: usize) -> StatsSnapshot {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        let mut outcomes = BTreeMap::new();
        let mut total_ms = 0u64;
        for record in records.iter() {
            *outcomes.entry(record.outcome).or_insert(0) += 1;
            total_ms = total_ms.saturating_add(record.duration_ms);
        }
        let average_duration_ms = if records.is_empty() {
            0.0
        } else {
            total_ms as f64 / records.len() as f64
        };

        StatsSnapshot {
            capacity: self.capacity,
            recorded: records.len(),
            outcomes,
            average_duration_ms,
            max_complexity_seen: records.iter().filter_map(|r| r.complexity).max(),
            recent: records.iter().rev().take(recent).cloned().collect(),
        }
    }
}
