use serde::Serialize;
use uuid::Uuid;

use crate::models::ShareWeight;
use crate::services::membership::Participant;

/// Fixed cut of the profit pool directed to the organization's founder.
pub const FOUNDER_SHARE_RATE: f64 = 0.70;
/// Remainder distributed among the project's working members.
pub const TEAM_POOL_RATE: f64 = 0.30;
/// Carve-out from the team pool for the designated project owner.
pub const OWNER_BONUS_RATE: f64 = 0.03;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payout {
    pub user_id: Uuid,
    /// Proportional share plus, for the owner, the owner bonus.
    pub amount: f64,
    pub proportional_share: f64,
    pub owner_bonus: f64,
    pub is_owner: bool,
    pub working_days: i64,
    pub weight: ShareWeight,
    pub joined_date: chrono::NaiveDate,
    pub left_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FounderShare {
    pub user_id: Uuid,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub profit: f64,
    /// The founder's assigned cut. `None` either because profit ≤ 0 or
    /// because no active founder exists; in the latter case the 70% is
    /// deliberately not distributed to anyone (see `founder_missing`).
    pub founder: Option<FounderShare>,
    pub founder_share: f64,
    pub team_pool: f64,
    pub owner_bonus: f64,
    pub payouts: Vec<Payout>,
}

impl Distribution {
    fn empty(profit: f64) -> Self {
        Self {
            profit,
            founder: None,
            founder_share: 0.0,
            team_pool: 0.0,
            owner_bonus: 0.0,
            payouts: Vec::new(),
        }
    }

    /// True when there is profit to share but no active founder to receive
    /// the founder cut. The amount stays unassigned on purpose; callers
    /// must surface this in audit output rather than swallow it.
    pub fn founder_missing(&self) -> bool {
        self.profit > 0.0 && self.founder.is_none()
    }
}

/// Split a profit figure into the founder share, the owner bonus, and
/// weight-proportional team payouts.
///
/// Invariant (founder present): `founder_share + Σ payout amounts == profit`
/// within floating-point tolerance — the owner bonus is carved from the
/// team pool, never added on top of it.
pub fn distribute(
    profit: f64,
    founder_user_id: Option<Uuid>,
    participants: &[Participant],
) -> Distribution {
    if profit <= 0.0 {
        return Distribution::empty(profit);
    }

    let founder_share = profit * FOUNDER_SHARE_RATE;
    let team_pool = profit * TEAM_POOL_RATE;

    let has_owner = participants.iter().any(|p| p.is_owner);
    let owner_bonus = if has_owner {
        team_pool * OWNER_BONUS_RATE
    } else {
        0.0
    };
    let split_pool = team_pool - owner_bonus;

    let total_weight: f64 = participants
        .iter()
        .filter(|p| p.working_days > 0)
        .map(participant_weight)
        .sum();

    let payouts = participants
        .iter()
        .map(|participant| {
            let proportional_share = if total_weight > 0.0 {
                split_pool * participant_weight(participant) / total_weight
            } else {
                0.0
            };
            let bonus = if participant.is_owner { owner_bonus } else { 0.0 };
            Payout {
                user_id: participant.user_id,
                amount: proportional_share + bonus,
                proportional_share,
                owner_bonus: bonus,
                is_owner: participant.is_owner,
                working_days: participant.working_days,
                weight: participant.weight,
                joined_date: participant.joined_date,
                left_date: participant.left_date,
            }
        })
        .collect();

    Distribution {
        profit,
        founder: founder_user_id.map(|user_id| FounderShare {
            user_id,
            amount: founder_share,
        }),
        founder_share,
        team_pool,
        owner_bonus,
        payouts,
    }
}

fn participant_weight(participant: &Participant) -> f64 {
    participant.weight.value() * participant.working_days as f64
}

#[cfg(test)]
mod tests {
    use super::{distribute, OWNER_BONUS_RATE};
    use crate::models::ShareWeight;
    use crate::services::membership::Participant;
    use chrono::NaiveDate;
    use uuid::Uuid;

    const EPSILON: f64 = 1e-6;

    fn participant(working_days: i64, weight: ShareWeight, is_owner: bool) -> Participant {
        Participant {
            user_id: Uuid::new_v4(),
            working_days,
            weight,
            is_owner,
            joined_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            left_date: None,
        }
    }

    #[test]
    fn worked_example_from_the_payroll_rules() {
        // profit 100 000, founder present, two equal-weight full-period
        // participants, one of whom is the owner:
        // founder 70 000; owner bonus 900 (3% of 30 000); remaining
        // 29 100 split evenly -> owner 15 450, other 14 550.
        let founder = Uuid::new_v4();
        let owner = participant(30, ShareWeight::Default, true);
        let other = participant(30, ShareWeight::Default, false);

        let dist = distribute(100_000.0, Some(founder), &[owner, other]);

        assert!((dist.founder_share - 70_000.0).abs() < EPSILON);
        assert!((dist.owner_bonus - 900.0).abs() < EPSILON);
        assert!((dist.payouts[0].amount - 15_450.0).abs() < EPSILON);
        assert!((dist.payouts[1].amount - 14_550.0).abs() < EPSILON);
    }

    #[test]
    fn conserves_the_profit_pool() {
        let founder = Uuid::new_v4();
        let members = vec![
            participant(12, ShareWeight::Configured(35.0), true),
            participant(30, ShareWeight::Configured(20.0), false),
            participant(7, ShareWeight::Default, false),
        ];

        let profit = 87_654.32;
        let dist = distribute(profit, Some(founder), &members);
        let paid: f64 = dist.payouts.iter().map(|p| p.amount).sum();

        assert!((dist.founder_share + paid - profit).abs() < 1e-6);
    }

    #[test]
    fn zero_or_negative_profit_yields_empty_distribution() {
        let members = vec![participant(30, ShareWeight::Default, true)];

        let zero = distribute(0.0, Some(Uuid::new_v4()), &members);
        assert!(zero.payouts.is_empty());
        assert_eq!(zero.founder_share, 0.0);
        assert!(!zero.founder_missing());

        let negative = distribute(-500.0, None, &members);
        assert!(negative.payouts.is_empty());
        assert!(!negative.founder_missing());
    }

    #[test]
    fn missing_founder_leaves_share_unassigned_and_flagged() {
        let members = vec![participant(30, ShareWeight::Default, false)];
        let dist = distribute(10_000.0, None, &members);

        assert!(dist.founder.is_none());
        assert!(dist.founder_missing());
        // The 70% is computed for audit display but assigned to nobody.
        assert!((dist.founder_share - 7_000.0).abs() < EPSILON);
        let paid: f64 = dist.payouts.iter().map(|p| p.amount).sum();
        assert!((paid - 3_000.0).abs() < EPSILON);
    }

    #[test]
    fn shares_are_proportional_to_weights() {
        let a = participant(20, ShareWeight::Configured(60.0), false);
        let b = participant(20, ShareWeight::Configured(15.0), false);
        let dist = distribute(40_000.0, Some(Uuid::new_v4()), &[a, b]);

        let ratio = dist.payouts[0].amount / dist.payouts[1].amount;
        assert!((ratio - 4.0).abs() < EPSILON);
    }

    #[test]
    fn owner_bonus_is_exactly_three_percent_of_team_pool() {
        let owner = participant(10, ShareWeight::Default, true);
        let other = participant(10, ShareWeight::Default, false);
        let dist = distribute(50_000.0, Some(Uuid::new_v4()), &[owner, other]);

        let expected_bonus = dist.team_pool * OWNER_BONUS_RATE;
        assert!((dist.payouts[0].owner_bonus - expected_bonus).abs() < EPSILON);
        assert_eq!(dist.payouts[1].owner_bonus, 0.0);
        assert!(
            (dist.payouts[0].amount
                - (dist.payouts[0].proportional_share + expected_bonus))
                .abs()
                < EPSILON
        );
    }

    #[test]
    fn no_owner_means_full_pool_is_split() {
        let a = participant(15, ShareWeight::Default, false);
        let b = participant(15, ShareWeight::Default, false);
        let dist = distribute(10_000.0, Some(Uuid::new_v4()), &[a, b]);

        assert_eq!(dist.owner_bonus, 0.0);
        let paid: f64 = dist.payouts.iter().map(|p| p.amount).sum();
        assert!((paid - dist.team_pool).abs() < EPSILON);
    }

    #[test]
    fn zero_total_weight_pays_nothing_to_participants() {
        let a = participant(10, ShareWeight::Configured(0.0), false);
        let b = participant(20, ShareWeight::Configured(0.0), false);
        let dist = distribute(10_000.0, Some(Uuid::new_v4()), &[a, b]);

        assert!(dist.payouts.iter().all(|p| p.amount == 0.0));
    }
}
