//! The append-only session log.
//!
//! The core only ever appends finished sessions and reads the whole log
//! back for statistics. [`SessionStore`] is the seam; [`Database`] is the
//! SQLite implementation and [`MemoryStore`] keeps records in process.
//!
//! [`Database`]: super::Database

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::timer::SessionType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub session_type: SessionType,
    pub completed: bool,
}

impl SessionRecord {
    /// A phase that ran to its natural end.
    pub fn completed(
        session_type: SessionType,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            duration_secs,
            session_type,
            completed: true,
        }
    }
}

pub trait SessionStore: Send {
    fn append(&mut self, record: &SessionRecord) -> Result<(), DatabaseError>;

    /// Every record, in no particular order.
    fn query_all(&self) -> Result<Vec<SessionRecord>, DatabaseError>;
}

/// In-process store. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<SessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SessionRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn append(&mut self, record: &SessionRecord) -> Result<(), DatabaseError> {
        self.lock().push(record.clone());
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<SessionRecord>, DatabaseError> {
        Ok(self.lock().clone())
    }
}
