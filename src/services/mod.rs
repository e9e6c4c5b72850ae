// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod patreon;
pub mod pledge;
pub mod rewards;

pub use patreon::{PatreonClient, PatronProvider};
pub use pledge::PledgeService;
pub use rewards::RewardService;
