// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record store layer (Firestore, plus an in-memory store).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreRecordStore;
pub use memory::MemoryRecordStore;

use crate::error::Result;
use crate::models::PledgeRecord;
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Pledge records keyed by lower-cased username
    pub const PATRON_LINKS: &str = "patron_links";
    /// Index of Patreon user ID -> username, kept in step with `PATRON_LINKS`
    pub const PATRON_EXTERNAL_IDS: &str = "patron_external_ids";
}

/// Storage for pledge records.
///
/// Implementations must enforce both uniqueness constraints atomically in
/// `upsert`: a username maps to one external ID, and an external ID to one
/// username. Concurrent links are resolved here, not by the caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find the record for a lower-cased username.
    async fn find_by_username(&self, username_lower: &str) -> Result<Option<PledgeRecord>>;

    /// Find the record bound to a Patreon user ID.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PledgeRecord>>;

    /// Create or replace the record for `record.username_lower`.
    ///
    /// Fails with `MultiplePatronsForUser` or `MultipleUsersForPatron` if the
    /// write would break either uniqueness constraint.
    async fn upsert(&self, record: &PledgeRecord) -> Result<()>;

    /// Delete the record for a username. Returns true if one was removed.
    async fn delete(&self, username_lower: &str) -> Result<bool>;
}
