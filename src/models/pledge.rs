// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pledge record model for storage and the public projection served to callers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Link between a Patreon identity and an internal user, stored in Firestore.
///
/// One record per `username_lower`, and one per `external_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeRecord {
    /// Patreon user ID (immutable once set)
    pub external_id: String,
    /// Internal username, lower-cased (also used as document ID)
    pub username_lower: String,
    /// Patreon OAuth access token
    pub access_token: String,
    /// Patreon OAuth refresh token (single use, rotates on refresh)
    pub refresh_token: String,
    /// When the access token expires
    pub access_token_expiry: DateTime<Utc>,
    /// Last known entitled pledge amount in cents
    pub amount_cents: u32,
    /// When the current paid period ends; None if not known to be paid
    pub pledge_expiry_date: Option<DateTime<Utc>>,
}

impl PledgeRecord {
    /// Build a record from freshly obtained tokens and paid details.
    pub fn new(
        username_lower: &str,
        tokens: &UserTokens,
        paid: &PaidDetails,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            external_id: paid.external_id.clone(),
            username_lower: username_lower.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            access_token_expiry: tokens.access_token_expiry,
            amount_cents: 0,
            pledge_expiry_date: None,
        };
        record.apply_paid_details(paid, now);
        record
    }

    /// True if the pledge is known to be paid through a future instant.
    pub fn is_pledge_active(&self, now: DateTime<Utc>) -> bool {
        self.pledge_expiry_date.is_some_and(|expiry| expiry > now)
    }

    /// True if cached data can be served without contacting Patreon.
    ///
    /// Fresh while the access token is outside the refresh margin, or while the
    /// known paid period has not elapsed.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.access_token_expiry || self.is_pledge_active(now)
    }

    /// Replace the token triple after an exchange or refresh.
    pub fn apply_tokens(&mut self, tokens: &UserTokens) {
        self.access_token = tokens.access_token.clone();
        self.refresh_token = tokens.refresh_token.clone();
        self.access_token_expiry = tokens.access_token_expiry;
    }

    /// Apply newly derived paid details.
    ///
    /// The stored pledge expiry never moves backwards, and the amount is 0
    /// unless the resulting expiry is after `now`.
    pub fn apply_paid_details(&mut self, paid: &PaidDetails, now: DateTime<Utc>) {
        self.pledge_expiry_date = Some(later_expiry(
            self.pledge_expiry_date,
            paid.pledge_expiry_date,
        ));
        self.amount_cents = if self.is_pledge_active(now) {
            paid.amount_cents
        } else {
            0
        };
    }

    /// Project to the caller-facing view. The amount is zeroed when not active.
    pub fn public_details(&self, now: DateTime<Utc>) -> PublicDetails {
        let is_pledge_active = self.is_pledge_active(now);
        PublicDetails {
            external_id: self.external_id.clone(),
            is_pledge_active,
            amount_cents: if is_pledge_active {
                self.amount_cents
            } else {
                0
            },
        }
    }
}

/// Pick the later of a stored expiry and a newly reported one.
pub fn later_expiry(existing: Option<DateTime<Utc>>, new: DateTime<Utc>) -> DateTime<Utc> {
    match existing {
        Some(existing) if existing > new => existing,
        _ => new,
    }
}

/// Pledge state as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDetails {
    pub external_id: String,
    pub is_pledge_active: bool,
    pub amount_cents: u32,
}

impl PublicDetails {
    /// Details for an identity that is linked but no longer paying.
    pub fn inactive(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            is_pledge_active: false,
            amount_cents: 0,
        }
    }
}

/// Normalized OAuth token triple returned by the provider client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expiry: DateTime<Utc>,
}

/// Details of a patron with a currently paid membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidDetails {
    pub external_id: String,
    pub amount_cents: u32,
    pub pledge_expiry_date: DateTime<Utc>,
}

/// Normalize a username for lookups and storage.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
