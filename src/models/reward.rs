// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patreon reward tiers and their pledge thresholds.

use serde::{Deserialize, Serialize};

/// Reward unlocked by pledging at least a tier's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    Tier1Badge,
    Tier2Badge,
    Tier3Badge,
    Tier4Badge,
}

impl RewardTier {
    /// All Patreon reward tiers, lowest threshold first.
    pub const ALL: [RewardTier; 4] = [
        RewardTier::Tier1Badge,
        RewardTier::Tier2Badge,
        RewardTier::Tier3Badge,
        RewardTier::Tier4Badge,
    ];

    /// Minimum pledge in cents.
    pub fn donation_req(self) -> u32 {
        match self {
            RewardTier::Tier1Badge => 100,
            RewardTier::Tier2Badge => 300,
            RewardTier::Tier3Badge => 500,
            RewardTier::Tier4Badge => 1000,
        }
    }

    /// Tiers satisfied by a pledge of `amount_cents`.
    pub fn satisfied_by(amount_cents: u32) -> impl Iterator<Item = RewardTier> {
        Self::ALL
            .into_iter()
            .filter(move |tier| tier.donation_req() <= amount_cents)
    }
}
