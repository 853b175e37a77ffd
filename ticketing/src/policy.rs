//! Staff tiers and role-based authorization.
//!
//! Every check is a pure predicate over an explicit [`RoleSet`]; nothing here
//! talks to the platform. Tiers are independent ceilings, not a ladder: a
//! member is allowed a ticket when *any* staff role they hold covers it.

use serde::{Deserialize, Serialize};

use crate::ids::{RoleId, RoleSet};
use crate::request::SpawnerAmount;

/// Staff capacity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffTier {
    /// May claim single-spawner tickets.
    Tier1,
    /// May claim tickets of up to three spawners.
    Tier2,
    /// May claim any ticket.
    Tier3,
}

impl StaffTier {
    pub const ALL: [StaffTier; 3] = [Self::Tier1, Self::Tier2, Self::Tier3];

    /// Largest ticket amount this tier may claim.
    pub fn ceiling(self) -> u8 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 3,
            Self::Tier3 => 5,
        }
    }
}

impl std::fmt::Display for StaffTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier1 => write!(f, "tier1"),
            Self::Tier2 => write!(f, "tier2"),
            Self::Tier3 => write!(f, "tier3"),
        }
    }
}

/// Role ids backing each staff tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRoles {
    pub tier1: RoleId,
    pub tier2: RoleId,
    pub tier3: RoleId,
}

impl StaffRoles {
    pub fn role_for(&self, tier: StaffTier) -> RoleId {
        match tier {
            StaffTier::Tier1 => self.tier1,
            StaffTier::Tier2 => self.tier2,
            StaffTier::Tier3 => self.tier3,
        }
    }

    /// `(role, tier)` pairs in tier order.
    pub fn entries(&self) -> impl Iterator<Item = (RoleId, StaffTier)> + '_ {
        StaffTier::ALL.into_iter().map(|t| (self.role_for(t), t))
    }
}

/// Process-wide authorization policy, built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    /// Role required to post the buy/sell menu.
    pub menu_role: RoleId,
    pub staff: StaffRoles,
    /// Role mentioned when a buyer reports a scam.
    pub alert_role: RoleId,
}

impl RolePolicy {
    /// True iff some staff role held covers `amount`.
    pub fn can_claim(&self, roles: &RoleSet, amount: SpawnerAmount) -> bool {
        self.staff
            .entries()
            .any(|(role, tier)| roles.contains(role) && amount.get() <= tier.ceiling())
    }

    /// Closing has no capacity gate: any staff role will do.
    pub fn can_close(&self, roles: &RoleSet) -> bool {
        self.staff.entries().any(|(role, _)| roles.contains(role))
    }

    pub fn can_invoke_menu(&self, roles: &RoleSet) -> bool {
        can_invoke_menu(roles, self.menu_role)
    }

    /// Staff roles present in `roles`, in tier order.
    pub fn staff_roles_held(&self, roles: &RoleSet) -> Vec<RoleId> {
        self.staff
            .entries()
            .map(|(role, _)| role)
            .filter(|role| roles.contains(*role))
            .collect()
    }
}

pub fn can_invoke_menu(roles: &RoleSet, required: RoleId) -> bool {
    roles.contains(required)
}

#[cfg(test)]
pub(crate) fn test_policy() -> RolePolicy {
    RolePolicy {
        menu_role: RoleId(100),
        staff: StaffRoles {
            tier1: RoleId(1),
            tier2: RoleId(2),
            tier3: RoleId(3),
        },
        alert_role: RoleId(900),
    }
}
