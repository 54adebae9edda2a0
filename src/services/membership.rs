use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PayPeriod, ProjectMember, ShareWeight};

/// A roster member with at least one elapsed working day in the period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub working_days: i64,
    pub weight: ShareWeight,
    pub is_owner: bool,
    pub joined_date: NaiveDate,
    pub left_date: Option<NaiveDate>,
}

/// Resolve which roster members participated in the period and for how many
/// whole days each. Pure date arithmetic; callers pass `today` so the logic
/// is testable without wall-clock time.
///
/// The effective period end is capped at `today`: a still-open current
/// period is evaluated only up to now, so not-yet-elapsed days never
/// contribute weight. The founder is paid from the founder share, not the
/// team pool, and is skipped here even if also listed on the roster.
pub fn resolve_participants(
    roster: &[ProjectMember],
    owner_user_id: Option<Uuid>,
    founder_user_id: Option<Uuid>,
    period: &PayPeriod,
    today: NaiveDate,
) -> Vec<Participant> {
    let effective_end = period.end.min(today);

    roster
        .iter()
        .filter_map(|member| {
            if founder_user_id == Some(member.user_id) {
                return None;
            }
            // Deactivated without a recorded departure means removed from
            // the roster outright.
            if !member.is_active && member.left_date.is_none() {
                return None;
            }
            if member.joined_date > effective_end {
                return None;
            }
            if member
                .left_date
                .is_some_and(|left| left < period.start)
            {
                return None;
            }

            let start = member.joined_date.max(period.start);
            let end = member
                .left_date
                .unwrap_or(effective_end)
                .min(effective_end);
            let working_days = (end - start).num_days().max(0);
            if working_days == 0 {
                return None;
            }

            Some(Participant {
                user_id: member.user_id,
                working_days,
                weight: ShareWeight::from_percent(member.share_percent),
                is_owner: owner_user_id == Some(member.user_id),
                joined_date: member.joined_date,
                left_date: member.left_date,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::resolve_participants;
    use crate::models::{PayPeriod, ProjectMember, ShareWeight};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(
        user_id: Uuid,
        joined: NaiveDate,
        left: Option<NaiveDate>,
        share: Option<f64>,
    ) -> ProjectMember {
        ProjectMember {
            project_id: Uuid::new_v4(),
            user_id,
            joined_date: joined,
            left_date: left,
            is_active: true,
            share_percent: share,
        }
    }

    fn july() -> PayPeriod {
        PayPeriod::from_label("2026-07").unwrap()
    }

    #[test]
    fn full_period_member_gets_whole_span() {
        let user = Uuid::new_v4();
        let roster = vec![member(user, date(2026, 1, 1), None, Some(40.0))];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 8, 20));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].working_days, 30); // Jul 1 .. Jul 31
        assert_eq!(out[0].weight, ShareWeight::Configured(40.0));
        assert!(!out[0].is_owner);
    }

    #[test]
    fn mid_period_join_and_leave_are_clamped() {
        let user = Uuid::new_v4();
        let roster = vec![member(
            user,
            date(2026, 7, 10),
            Some(date(2026, 7, 20)),
            None,
        )];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 8, 1));

        assert_eq!(out[0].working_days, 10);
        assert_eq!(out[0].weight, ShareWeight::Default);
    }

    #[test]
    fn open_period_is_capped_at_today() {
        let user = Uuid::new_v4();
        let roster = vec![member(user, date(2026, 7, 1), None, None)];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 7, 15));

        assert_eq!(out[0].working_days, 14);
    }

    #[test]
    fn joined_after_effective_end_is_excluded() {
        let user = Uuid::new_v4();
        let roster = vec![member(user, date(2026, 7, 20), None, None)];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 7, 10));

        assert!(out.is_empty());
    }

    #[test]
    fn left_before_period_start_is_excluded() {
        let user = Uuid::new_v4();
        let roster = vec![member(
            user,
            date(2026, 1, 1),
            Some(date(2026, 6, 15)),
            Some(50.0),
        )];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 8, 1));

        assert!(out.is_empty());
    }

    #[test]
    fn founder_is_excluded_even_when_on_roster() {
        let founder = Uuid::new_v4();
        let other = Uuid::new_v4();
        let roster = vec![
            member(founder, date(2026, 7, 1), None, Some(30.0)),
            member(other, date(2026, 7, 1), None, None),
        ];
        let out = resolve_participants(&roster, None, Some(founder), &july(), date(2026, 8, 1));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].user_id, other);
    }

    #[test]
    fn owner_flag_follows_project_owner() {
        let owner = Uuid::new_v4();
        let roster = vec![member(owner, date(2026, 7, 1), None, None)];
        let out = resolve_participants(&roster, Some(owner), None, &july(), date(2026, 8, 1));

        assert!(out[0].is_owner);
    }

    #[test]
    fn deactivated_member_without_departure_is_excluded() {
        let user = Uuid::new_v4();
        let mut entry = member(user, date(2026, 7, 1), None, None);
        entry.is_active = false;
        let out = resolve_participants(&[entry], None, None, &july(), date(2026, 8, 1));

        assert!(out.is_empty());
    }

    #[test]
    fn negative_share_falls_back_to_default_weight() {
        let user = Uuid::new_v4();
        let roster = vec![member(user, date(2026, 7, 1), None, Some(-10.0))];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 8, 1));

        assert_eq!(out[0].weight, ShareWeight::Default);
    }

    #[test]
    fn same_day_join_contributes_zero_days_and_is_excluded() {
        let user = Uuid::new_v4();
        let roster = vec![member(user, date(2026, 7, 31), None, None)];
        let out = resolve_participants(&roster, None, None, &july(), date(2026, 7, 31));

        assert!(out.is_empty());
    }
}
