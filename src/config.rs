// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Configuration loaded from environment variables.
//!
//! Secrets are read once at startup; Cloud Run injects them as env vars.

use std::env;

/// Default margin before access token expiry at which cached data is treated as stale.
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Patreon OAuth client ID (public)
    pub patreon_client_id: String,
    /// Redirect URL registered with Patreon for the OAuth callback
    pub patreon_redirect_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Seconds before access token expiry at which we refresh
    pub token_refresh_margin_secs: i64,

    // --- Secrets ---
    /// Patreon OAuth client secret
    pub patreon_client_secret: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            patreon_client_id: "test_client_id".to_string(),
            patreon_redirect_url: "http://localhost:3000/patreon/callback".to_string(),
            gcp_project_id: "test-project".to_string(),
            token_refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
            patreon_client_secret: "test_secret".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            patreon_client_id: env::var("PATREON_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("PATREON_CLIENT_ID"))?,
            patreon_redirect_url: env::var("PATREON_REDIRECT_URL")
                .map_err(|_| ConfigError::Missing("PATREON_REDIRECT_URL"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            token_refresh_margin_secs: env::var("TOKEN_REFRESH_MARGIN_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_TOKEN_REFRESH_MARGIN_SECS),
            patreon_client_secret: env::var("PATREON_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PATREON_CLIENT_SECRET"))?,
        })
    }

    /// Refresh margin as a chrono duration.
    pub fn token_refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_refresh_margin_secs.max(0))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
