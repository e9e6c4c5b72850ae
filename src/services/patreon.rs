// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patreon API client.
//!
//! Handles:
//! - Authorization code exchange and token refresh
//! - Identity + membership lookup
//! - Deciding whether a membership counts as currently paid
//!
//! Raw JSON:API shapes stay in this module; callers only see
//! [`UserTokens`] and [`PaidDetails`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{PatronError, Result};
use crate::models::{PaidDetails, UserTokens};

const AUTHORIZE_URL: &str = "https://www.patreon.com/oauth2/authorize";
const TOKEN_URL: &str = "https://www.patreon.com/api/oauth2/token";
const IDENTITY_URL: &str = "https://www.patreon.com/api/oauth2/v2/identity";
const IDENTITY_MEMBER_FIELDS: &str =
    "last_charge_status,next_charge_date,last_charge_date,currently_entitled_amount_cents";
const OAUTH_SCOPE: &str = "identity identity.memberships";
const OAUTH_STATE: &str = "patreon-link";

/// A charge older than this no longer counts as paying for the current period.
pub const PAID_CHARGE_WINDOW_DAYS: i64 = 30;

/// Charge status Patreon reports for a successful payment.
pub const PAID_CHARGE_STATUS: &str = "Paid";

/// Operations the pledge service needs from the membership provider.
#[async_trait]
pub trait PatronProvider: Send + Sync {
    /// Exchange a single-use authorization code for a token pair.
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<UserTokens>;

    /// Exchange a refresh token for a new token pair. The old refresh token is
    /// invalidated by the provider.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<UserTokens>;

    /// Fetch paid membership details, or `None` if the identity is not a
    /// currently paid patron.
    async fn get_paid_patron_details(&self, access_token: &str) -> Result<Option<PaidDetails>>;

    /// URL the user is sent to in order to authorize linking.
    fn login_url(&self) -> String;
}

/// Patreon OAuth + API client.
#[derive(Clone)]
pub struct PatreonClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl PatreonClient {
    /// Create a new Patreon client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_url,
        }
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.patreon_client_id.clone(),
            config.patreon_client_secret.clone(),
            config.patreon_redirect_url.clone(),
        )
    }

    /// POST to the token endpoint and normalize the response.
    async fn request_tokens(&self, form: &[(&str, &str)], context: &str) -> Result<UserTokens> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(form)
            .send()
            .await
            .map_err(|e| PatronError::AuthExchange(format!("{} request failed: {}", context, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Patreon {} rejected", context);
            return Err(PatronError::AuthExchange(format!(
                "{} failed with status {}",
                context, status
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            PatronError::AuthExchange(format!("Failed to parse {} response: {}", context, e))
        })?;

        token_response.into_user_tokens(Utc::now())
    }
}

#[async_trait]
impl PatronProvider for PatreonClient {
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<UserTokens> {
        self.request_tokens(
            &[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
            ],
            "token exchange",
        )
        .await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<UserTokens> {
        self.request_tokens(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
            "token refresh",
        )
        .await
    }

    async fn get_paid_patron_details(&self, access_token: &str) -> Result<Option<PaidDetails>> {
        let response = self
            .http
            .get(IDENTITY_URL)
            .bearer_auth(access_token)
            .query(&[
                ("include", "memberships"),
                ("fields[member]", IDENTITY_MEMBER_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| PatronError::AuthExchange(format!("Identity request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(PatronError::AuthExchange(format!(
                "Identity request failed with status {}",
                status
            )));
        }

        let body = response.text().await.map_err(|e| {
            PatronError::AuthExchange(format!("Failed to read identity response: {}", e))
        })?;

        parse_identity_response(&body, Utc::now())
    }

    fn login_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode(OAUTH_SCOPE),
            OAUTH_STATE
        )
    }
}

/// Token response from Patreon OAuth.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Lifetime of the access token in seconds
    expires_in: i64,
}

impl TokenResponse {
    fn into_user_tokens(self, now: DateTime<Utc>) -> Result<UserTokens> {
        let access_token_expiry = Duration::try_seconds(self.expires_in)
            .filter(|lifetime| *lifetime >= Duration::zero())
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                PatronError::AuthExchange(format!(
                    "Invalid expires_in in token response: {}",
                    self.expires_in
                ))
            })?;

        Ok(UserTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            access_token_expiry,
        })
    }
}

/// Identity response (JSON:API) with included memberships.
#[derive(Debug, Clone, Deserialize)]
struct IdentityResponse {
    data: IdentityData,
    #[serde(default)]
    included: Option<Vec<IncludedMember>>,
}

#[derive(Debug, Clone, Deserialize)]
struct IdentityData {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct IncludedMember {
    attributes: MemberAttributes,
}

/// Membership fields used to decide whether a patron is currently paid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberAttributes {
    #[serde(default)]
    pub last_charge_status: Option<String>,
    #[serde(default)]
    pub last_charge_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_charge_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currently_entitled_amount_cents: Option<u32>,
}

impl IdentityResponse {
    fn paid_details(self, now: DateTime<Utc>) -> Result<Option<PaidDetails>> {
        let members = match self.included {
            Some(members) if !members.is_empty() => members,
            _ => return Ok(None),
        };

        if members.len() != 1 {
            tracing::error!(
                external_id = %self.data.id,
                memberships = members.len(),
                "Unexpected number of Patreon memberships received"
            );
            return Err(PatronError::UnexpectedMembershipCount(members.len()));
        }

        Ok(derive_paid_details(
            &self.data.id,
            &members[0].attributes,
            now,
        ))
    }
}

/// Parse an identity response body and derive paid details from it.
///
/// Returns `None` for identities without a paid membership, and
/// `UnexpectedMembershipCount` when more than one membership is included.
pub fn parse_identity_response(body: &str, now: DateTime<Utc>) -> Result<Option<PaidDetails>> {
    let identity: IdentityResponse = serde_json::from_str(body).map_err(|e| {
        PatronError::AuthExchange(format!("Failed to parse identity response: {}", e))
    })?;

    identity.paid_details(now)
}

/// Decide whether a membership counts as currently paid.
///
/// Paid requires a `"Paid"` last charge within the last 30 days; the pledge
/// then runs until the next charge date. A member without a next charge date
/// has no period to trust and is treated as unpaid.
pub fn derive_paid_details(
    external_id: &str,
    member: &MemberAttributes,
    now: DateTime<Utc>,
) -> Option<PaidDetails> {
    let window_start = now - Duration::days(PAID_CHARGE_WINDOW_DAYS);

    let has_paid = member.last_charge_status.as_deref() == Some(PAID_CHARGE_STATUS)
        && member
            .last_charge_date
            .is_some_and(|charged| charged > window_start);

    if !has_paid {
        return None;
    }

    let pledge_expiry_date = member.next_charge_date?;

    Some(PaidDetails {
        external_id: external_id.to_string(),
        amount_cents: member.currently_entitled_amount_cents.unwrap_or(0),
        pledge_expiry_date,
    })
}
