// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed record store.
//!
//! Records live in `patron_links/{username_lower}`. Firestore has no unique
//! constraint on non-key fields, so `patron_external_ids/{external_id}` holds
//! the owning username and every write touching a record updates both
//! documents in one transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{collections, RecordStore};
use crate::error::{PatronError, Result};
use crate::models::PledgeRecord;

/// Index document mapping a Patreon user ID to its owning username.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExternalIdOwner {
    username_lower: String,
}

/// Firestore record store.
#[derive(Clone)]
pub struct FirestoreRecordStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreRecordStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| PatronError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            PatronError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All operations return a `Database` error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| PatronError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_record(
        db: &firestore::FirestoreDb,
        username_lower: &str,
    ) -> Result<Option<PledgeRecord>> {
        db.fluent()
            .select()
            .by_id_in(collections::PATRON_LINKS)
            .obj()
            .one(username_lower)
            .await
            .map_err(|e| PatronError::Database(e.to_string()))
    }

    async fn get_owner(
        db: &firestore::FirestoreDb,
        external_id: &str,
    ) -> Result<Option<ExternalIdOwner>> {
        db.fluent()
            .select()
            .by_id_in(collections::PATRON_EXTERNAL_IDS)
            .obj()
            .one(external_id)
            .await
            .map_err(|e| PatronError::Database(e.to_string()))
    }

    /// Client whose reads run inside `transaction` and register for conflict
    /// detection.
    fn transaction_db(
        client: &firestore::FirestoreDb,
        transaction: &firestore::FirestoreTransaction<'_>,
    ) -> firestore::FirestoreDb {
        client.clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ))
    }

    /// Check uniqueness and stage both writes for an upsert.
    async fn stage_upsert(
        client: &firestore::FirestoreDb,
        transaction: &mut firestore::FirestoreTransaction<'_>,
        record: &PledgeRecord,
    ) -> Result<()> {
        let tx_db = Self::transaction_db(client, transaction);

        if let Some(existing) = Self::get_record(&tx_db, &record.username_lower).await? {
            if existing.external_id != record.external_id {
                return Err(PatronError::MultiplePatronsForUser {
                    username: record.username_lower.clone(),
                });
            }
        }

        if let Some(owner) = Self::get_owner(&tx_db, &record.external_id).await? {
            if owner.username_lower != record.username_lower {
                return Err(PatronError::MultipleUsersForPatron {
                    external_id: record.external_id.clone(),
                });
            }
        }

        client
            .fluent()
            .update()
            .in_col(collections::PATRON_LINKS)
            .document_id(&record.username_lower)
            .object(record)
            .add_to_transaction(transaction)
            .map_err(|e| {
                PatronError::Database(format!("Failed to add record to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::PATRON_EXTERNAL_IDS)
            .document_id(&record.external_id)
            .object(&ExternalIdOwner {
                username_lower: record.username_lower.clone(),
            })
            .add_to_transaction(transaction)
            .map_err(|e| {
                PatronError::Database(format!("Failed to add index to transaction: {}", e))
            })?;

        Ok(())
    }

    /// Stage deletion of a record and its index entry. Returns false if there
    /// is no record.
    async fn stage_delete(
        client: &firestore::FirestoreDb,
        transaction: &mut firestore::FirestoreTransaction<'_>,
        username_lower: &str,
    ) -> Result<bool> {
        let tx_db = Self::transaction_db(client, transaction);

        let existing = match Self::get_record(&tx_db, username_lower).await? {
            Some(record) => record,
            None => return Ok(false),
        };

        client
            .fluent()
            .delete()
            .from(collections::PATRON_LINKS)
            .document_id(username_lower)
            .add_to_transaction(transaction)
            .map_err(|e| {
                PatronError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        client
            .fluent()
            .delete()
            .from(collections::PATRON_EXTERNAL_IDS)
            .document_id(&existing.external_id)
            .add_to_transaction(transaction)
            .map_err(|e| {
                PatronError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        Ok(true)
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn find_by_username(&self, username_lower: &str) -> Result<Option<PledgeRecord>> {
        Self::get_record(self.get_client()?, username_lower).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PledgeRecord>> {
        let client = self.get_client()?;
        let owner = match Self::get_owner(client, external_id).await? {
            Some(owner) => owner,
            None => return Ok(None),
        };

        // Index and record are written together, but guard against a stale index.
        Ok(Self::get_record(client, &owner.username_lower)
            .await?
            .filter(|record| record.external_id == external_id))
    }

    async fn upsert(&self, record: &PledgeRecord) -> Result<()> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| PatronError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let Err(e) = Self::stage_upsert(client, &mut transaction, record).await {
            let _ = transaction.rollback().await;
            return Err(e);
        }

        transaction
            .commit()
            .await
            .map_err(|e| PatronError::Database(format!("Failed to commit upsert: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, username_lower: &str) -> Result<bool> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| PatronError::Database(format!("Failed to begin transaction: {}", e)))?;

        match Self::stage_delete(client, &mut transaction, username_lower).await {
            Ok(true) => {}
            Ok(false) => {
                let _ = transaction.rollback().await;
                return Ok(false);
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| PatronError::Database(format!("Failed to commit deletion: {}", e)))?;

        Ok(true)
    }
}
