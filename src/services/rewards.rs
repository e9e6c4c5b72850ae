// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Patreon reward entitlements derived from current pledge details.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::{PublicDetails, RewardTier};
use crate::services::PledgeService;

/// Maps a user's active pledge to the reward tiers it satisfies.
#[derive(Clone)]
pub struct RewardService {
    pledges: PledgeService,
}

impl RewardService {
    pub fn new(pledges: PledgeService) -> Self {
        Self { pledges }
    }

    /// All Patreon reward tiers the user currently qualifies for.
    ///
    /// Empty if the user has no link or the pledge is not active.
    pub async fn get_entitlements(&self, username: &str) -> Result<BTreeSet<RewardTier>> {
        let details = self.pledges.get_current_details(username).await?;
        Ok(entitlements_for(details.as_ref()))
    }

    /// Whether the user currently qualifies for a specific tier.
    pub async fn has_reward(&self, username: &str, tier: RewardTier) -> Result<bool> {
        Ok(self.get_entitlements(username).await?.contains(&tier))
    }
}

/// Reward tiers satisfied by a set of pledge details.
pub fn entitlements_for(details: Option<&PublicDetails>) -> BTreeSet<RewardTier> {
    match details {
        Some(details) if details.is_pledge_active => {
            RewardTier::satisfied_by(details.amount_cents).collect()
        }
        _ => BTreeSet::new(),
    }
}
