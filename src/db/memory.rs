// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory record store.
//!
//! Nothing persists across restarts. Used in tests and for local runs
//! without a Firestore emulator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::RecordStore;
use crate::error::{PatronError, Result};
use crate::models::PledgeRecord;

/// Records keyed by username, with an external ID index.
#[derive(Debug, Default)]
struct MemoryState {
    by_username: HashMap<String, PledgeRecord>,
    username_by_external_id: HashMap<String, String>,
}

/// In-memory record store.
///
/// A single write lock covers both maps, so the uniqueness checks and the
/// write in `upsert` happen atomically.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_username.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_username.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_username(&self, username_lower: &str) -> Result<Option<PledgeRecord>> {
        Ok(self.inner.read().await.by_username.get(username_lower).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PledgeRecord>> {
        let state = self.inner.read().await;
        Ok(state
            .username_by_external_id
            .get(external_id)
            .and_then(|username| state.by_username.get(username))
            .cloned())
    }

    async fn upsert(&self, record: &PledgeRecord) -> Result<()> {
        let mut state = self.inner.write().await;

        if let Some(existing) = state.by_username.get(&record.username_lower) {
            if existing.external_id != record.external_id {
                return Err(PatronError::MultiplePatronsForUser {
                    username: record.username_lower.clone(),
                });
            }
        }

        if let Some(owner) = state.username_by_external_id.get(&record.external_id) {
            if owner != &record.username_lower {
                return Err(PatronError::MultipleUsersForPatron {
                    external_id: record.external_id.clone(),
                });
            }
        }

        state
            .username_by_external_id
            .insert(record.external_id.clone(), record.username_lower.clone());
        state
            .by_username
            .insert(record.username_lower.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, username_lower: &str) -> Result<bool> {
        let mut state = self.inner.write().await;
        match state.by_username.remove(username_lower) {
            Some(removed) => {
                state.username_by_external_id.remove(&removed.external_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
