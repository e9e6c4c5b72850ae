// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pledge reconciliation: linking Patreon identities to users and keeping
//! cached pledge state current.
//!
//! Each record is either FRESH (served from storage without I/O) or STALE
//! (refresh tokens, re-fetch membership, then update or delete). Records are
//! only ever stored for paying patrons.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::db::RecordStore;
use crate::error::{PatronError, Result};
use crate::models::{normalize_username, PledgeRecord, PublicDetails};
use crate::services::patreon::PatronProvider;
use crate::time_utils::format_optional;

/// Reconciles Patreon memberships with internal accounts.
#[derive(Clone)]
pub struct PledgeService {
    provider: Arc<dyn PatronProvider>,
    store: Arc<dyn RecordStore>,
    /// Margin before access token expiry at which cached data goes stale.
    refresh_margin: Duration,
}

impl PledgeService {
    /// Create a new pledge service.
    pub fn new(
        provider: Arc<dyn PatronProvider>,
        store: Arc<dyn RecordStore>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            refresh_margin,
        }
    }

    /// Create a pledge service using the configured refresh margin.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn PatronProvider>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self::new(provider, store, config.token_refresh_margin())
    }

    /// URL to send a user to for linking their Patreon account.
    pub fn login_url(&self) -> String {
        self.provider.login_url()
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Link a user to the Patreon account that authorized `code`.
    ///
    /// Non-paying identities are rejected with `NotPaidPatron` and nothing is
    /// stored. A user already linked to a different Patreon account, or a
    /// Patreon account already linked to a different user, is rejected
    /// without writing.
    pub async fn link(&self, username: &str, code: &str) -> Result<PublicDetails> {
        let username_lower = normalize_username(username);

        let tokens = self.provider.exchange_code_for_tokens(code).await?;

        let paid = match self
            .provider
            .get_paid_patron_details(&tokens.access_token)
            .await?
        {
            Some(paid) => paid,
            None => {
                tracing::info!(
                    username = %username_lower,
                    "Patreon link rejected, not a paid patron"
                );
                return Err(PatronError::NotPaidPatron);
            }
        };

        let existing = self.store.find_by_username(&username_lower).await?;
        if let Some(existing) = &existing {
            if existing.external_id != paid.external_id {
                tracing::warn!(
                    username = %username_lower,
                    linked_external_id = %existing.external_id,
                    attempted_external_id = %paid.external_id,
                    "Attempted to link a second Patreon account to a user"
                );
                return Err(PatronError::MultiplePatronsForUser {
                    username: username_lower,
                });
            }
        }

        if let Some(owner) = self.store.find_by_external_id(&paid.external_id).await? {
            if owner.username_lower != username_lower {
                tracing::warn!(
                    username = %username_lower,
                    external_id = %paid.external_id,
                    "Attempted to link a Patreon account already used by another user"
                );
                return Err(PatronError::MultipleUsersForPatron {
                    external_id: paid.external_id,
                });
            }
        }

        let now = Utc::now();
        let record = match existing {
            Some(mut record) => {
                record.apply_tokens(&tokens);
                record.apply_paid_details(&paid, now);
                record
            }
            None => PledgeRecord::new(&username_lower, &tokens, &paid, now),
        };

        // Only links with a paid period still running are stored.
        if !record.is_pledge_active(now) {
            tracing::info!(
                username = %username_lower,
                external_id = %record.external_id,
                pledge_expiry = %format_optional(record.pledge_expiry_date),
                "Patreon link rejected, paid period already ended"
            );
            return Err(PatronError::NotPaidPatron);
        }

        self.store.upsert(&record).await?;

        let details = record.public_details(now);
        tracing::info!(
            username = %username_lower,
            external_id = %record.external_id,
            is_pledge_active = details.is_pledge_active,
            amount_cents = details.amount_cents,
            pledge_expiry = %format_optional(record.pledge_expiry_date),
            "Linked Patreon account"
        );

        Ok(details)
    }

    // ─── Cached Details ──────────────────────────────────────────────────────

    /// Current pledge details for a user, or `None` if they have no link.
    ///
    /// Fresh records are served from storage. Stale records are refreshed:
    /// tokens are rotated and persisted, membership is re-fetched, and the
    /// record is either updated or deleted if the patron stopped paying.
    /// A failed token refresh is returned to the caller, which usually means
    /// the user revoked access and should link again.
    pub async fn get_current_details(&self, username: &str) -> Result<Option<PublicDetails>> {
        let username_lower = normalize_username(username);

        let mut record = match self.store.find_by_username(&username_lower).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let now = Utc::now();
        if record.is_fresh(now, self.refresh_margin) {
            tracing::debug!(username = %username_lower, "Serving cached Patreon details");
            return Ok(Some(record.public_details(now)));
        }

        tracing::info!(
            username = %username_lower,
            external_id = %record.external_id,
            "Patreon details stale, refreshing tokens"
        );

        let tokens = self.provider.refresh_tokens(&record.refresh_token).await?;

        // The old refresh token is now dead; persist the new pair before anything else.
        record.apply_tokens(&tokens);
        self.store.upsert(&record).await?;

        let paid = self
            .provider
            .get_paid_patron_details(&record.access_token)
            .await?;
        let now = Utc::now();

        match paid {
            Some(paid) if paid.external_id != record.external_id => {
                tracing::error!(
                    username = %username_lower,
                    stored_external_id = %record.external_id,
                    returned_external_id = %paid.external_id,
                    "Refreshed tokens returned a different Patreon identity"
                );
                Err(PatronError::MultiplePatronsForUser {
                    username: username_lower,
                })
            }
            Some(paid) if paid.pledge_expiry_date > now => {
                record.apply_paid_details(&paid, now);
                self.store.upsert(&record).await?;

                let details = record.public_details(now);
                tracing::info!(
                    username = %username_lower,
                    external_id = %record.external_id,
                    amount_cents = details.amount_cents,
                    pledge_expiry = %format_optional(record.pledge_expiry_date),
                    "Refreshed Patreon details"
                );
                Ok(Some(details))
            }
            // Not paid, or paid only through a period that has already ended.
            _ => {
                self.store.delete(&username_lower).await?;
                tracing::info!(
                    username = %username_lower,
                    external_id = %record.external_id,
                    "Patreon pledge no longer paid, record deleted"
                );
                Ok(Some(PublicDetails::inactive(record.external_id)))
            }
        }
    }

    /// Remove a user's link. Returns true if a record was removed.
    pub async fn unlink(&self, username: &str) -> Result<bool> {
        let username_lower = normalize_username(username);
        let removed = self.store.delete(&username_lower).await?;
        if removed {
            tracing::info!(username = %username_lower, "Unlinked Patreon account");
        }
        Ok(removed)
    }
}
