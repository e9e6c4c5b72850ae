// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod pledge;
pub mod reward;

pub use pledge::{
    normalize_username, PaidDetails, PledgeRecord, PublicDetails, UserTokens,
};
pub use reward::RewardTier;
