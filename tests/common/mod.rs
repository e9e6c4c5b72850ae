// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use patron_link::db::{FirestoreRecordStore, MemoryRecordStore, RecordStore};
use patron_link::error::{PatronError, Result};
use patron_link::models::{PaidDetails, PledgeRecord, UserTokens};
use patron_link::services::patreon::parse_identity_response;
use patron_link::services::{PatronProvider, PledgeService};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreRecordStore {
    FirestoreRecordStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique suffix for test isolation.
#[allow(dead_code)]
pub fn unique_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

#[allow(dead_code)]
pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

#[allow(dead_code)]
pub fn tokens(access: &str, refresh: &str, expiry: DateTime<Utc>) -> UserTokens {
    UserTokens {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        access_token_expiry: expiry,
    }
}

#[allow(dead_code)]
pub fn paid(external_id: &str, amount_cents: u32, expiry: DateTime<Utc>) -> PaidDetails {
    PaidDetails {
        external_id: external_id.to_string(),
        amount_cents,
        pledge_expiry_date: expiry,
    }
}

#[allow(dead_code)]
pub fn record(
    username: &str,
    external_id: &str,
    access_expiry: DateTime<Utc>,
    amount_cents: u32,
    pledge_expiry: Option<DateTime<Utc>>,
) -> PledgeRecord {
    PledgeRecord {
        external_id: external_id.to_string(),
        username_lower: username.to_string(),
        access_token: "oldAccessToken".to_string(),
        refresh_token: "oldRefreshToken".to_string(),
        access_token_expiry: access_expiry,
        amount_cents,
        pledge_expiry_date: pledge_expiry,
    }
}

/// What the fake returns for an identity lookup.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Membership {
    Paid(PaidDetails),
    NotPaid,
    Multiple(usize),
    /// Raw identity response body, parsed like a live API response.
    Identity(String),
}

/// Scripted provider. Codes and refresh tokens are single use, like Patreon's.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeProvider {
    codes: Mutex<HashMap<String, UserTokens>>,
    refreshes: Mutex<HashMap<String, UserTokens>>,
    memberships: Mutex<HashMap<String, Membership>>,
    pub exchange_calls: Mutex<Vec<String>>,
    pub refresh_calls: Mutex<Vec<String>>,
    pub details_calls: Mutex<Vec<String>>,
    network_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(self, code: &str, tokens: UserTokens) -> Self {
        self.codes.lock().unwrap().insert(code.to_string(), tokens);
        self
    }

    pub fn with_refresh(self, refresh_token: &str, tokens: UserTokens) -> Self {
        self.refreshes
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), tokens);
        self
    }

    pub fn with_membership(self, access_token: &str, membership: Membership) -> Self {
        self.memberships
            .lock()
            .unwrap()
            .insert(access_token.to_string(), membership);
        self
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatronProvider for FakeProvider {
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<UserTokens> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_calls.lock().unwrap().push(code.to_string());
        self.codes
            .lock()
            .unwrap()
            .remove(code)
            .ok_or_else(|| PatronError::AuthExchange("invalid_grant".to_string()))
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<UserTokens> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_calls
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.refreshes
            .lock()
            .unwrap()
            .remove(refresh_token)
            .ok_or_else(|| PatronError::AuthExchange("invalid_grant".to_string()))
    }

    async fn get_paid_patron_details(&self, access_token: &str) -> Result<Option<PaidDetails>> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        self.details_calls
            .lock()
            .unwrap()
            .push(access_token.to_string());
        match self.memberships.lock().unwrap().get(access_token).cloned() {
            Some(Membership::Paid(details)) => Ok(Some(details)),
            Some(Membership::NotPaid) => Ok(None),
            Some(Membership::Multiple(n)) => Err(PatronError::UnexpectedMembershipCount(n)),
            Some(Membership::Identity(body)) => parse_identity_response(&body, Utc::now()),
            None => Err(PatronError::AuthExchange("401 Unauthorized".to_string())),
        }
    }

    fn login_url(&self) -> String {
        "https://www.patreon.com/oauth2/authorize?client_id=fake".to_string()
    }
}

/// Identity response body for a user with a single membership.
#[allow(dead_code)]
pub fn identity_body(
    external_id: &str,
    last_charge_status: &str,
    last_charge_date: DateTime<Utc>,
    next_charge_date: DateTime<Utc>,
    amount_cents: u32,
) -> String {
    serde_json::json!({
        "data": {"id": external_id, "type": "user"},
        "included": [{
            "id": "member-1",
            "type": "member",
            "attributes": {
                "last_charge_status": last_charge_status,
                "last_charge_date": last_charge_date.to_rfc3339(),
                "next_charge_date": next_charge_date.to_rfc3339(),
                "currently_entitled_amount_cents": amount_cents
            }
        }]
    })
    .to_string()
}

/// Build a pledge service over a fake provider and an in-memory store.
#[allow(dead_code)]
pub fn test_service(provider: Arc<FakeProvider>, store: MemoryRecordStore) -> PledgeService {
    let store: Arc<dyn RecordStore> = Arc::new(store);
    PledgeService::new(provider, store, Duration::minutes(5))
}
