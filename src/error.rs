// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for patron linking and pledge reconciliation.

/// Error type shared by the provider client, record stores and services.
#[derive(Debug, thiserror::Error)]
pub enum PatronError {
    /// Provider rejected a code or refresh token, or the exchange failed in transit.
    #[error("Patreon auth exchange failed: {0}")]
    AuthExchange(String),

    #[error("Patreon account has no active paid pledge")]
    NotPaidPatron,

    /// The internal account is already linked to another external identity.
    #[error("User {username} is already linked to a different Patreon account")]
    MultiplePatronsForUser { username: String },

    /// The external identity already backs another internal account.
    #[error("Patreon account {external_id} is already linked to a different user")]
    MultipleUsersForPatron { external_id: String },

    #[error("Unexpected number of Patreon memberships: {0}")]
    UnexpectedMembershipCount(usize),

    #[error("Database error: {0}")]
    Database(String),
}

impl PatronError {
    /// Returns true if the provider refused our credentials or could not be reached.
    ///
    /// Callers typically respond by prompting the user to link again.
    pub fn is_auth_exchange_error(&self) -> bool {
        matches!(self, PatronError::AuthExchange(_))
    }

    /// Returns true for either direction of the one-to-one link constraint.
    pub fn is_cardinality_violation(&self) -> bool {
        matches!(
            self,
            PatronError::MultiplePatronsForUser { .. } | PatronError::MultipleUsersForPatron { .. }
        )
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PatronError>;
