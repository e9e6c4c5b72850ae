// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Patron-Link: reconcile Patreon memberships with internal user accounts
//!
//! This crate links a Patreon identity to exactly one internal user, caches
//! the pledge state, refreshes it when stale, and maps active pledges to
//! reward tiers. Web routing is left to the caller.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod time_utils;

pub use error::{PatronError, Result};
pub use models::{PublicDetails, RewardTier};
pub use services::{PledgeService, RewardService};
