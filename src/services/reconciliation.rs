use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{net_amount, PayPeriod, PayrollRecord, Project};
use crate::repository::payroll::{NewPayrollRecord, PayrollPatch};
use crate::repository::{ledger, payroll, users};
use crate::services::aggregation::PeriodFinancials;
use crate::services::distribution::Distribution;

/// Amounts closer than this are treated as unchanged when deciding whether
/// a record needs rewriting.
const AMOUNT_TOLERANCE: f64 = 1e-9;

/// Store mutations needed to make persisted payroll match a distribution.
/// Computed without touching the database so the protection rules are unit
/// testable.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub to_create: Vec<NewPayrollRecord>,
    pub to_update: Vec<PayrollPatch>,
    pub to_delete: Vec<Uuid>,
    /// Paid records left untouched: ineligible history, or eligible rows
    /// whose monetary fields are frozen.
    pub kept_paid: Vec<Uuid>,
    /// Eligible non-paid records already numerically up to date.
    pub unchanged: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub kept_paid: usize,
    pub unchanged: usize,
}

/// Decide, per existing record and per payout, whether to create, update,
/// delete, or leave alone.
///
/// Rules:
/// - an existing record whose user is no longer eligible is deleted, unless
///   `status = paid` — paid rows are historical and never touched;
/// - an eligible user with a non-paid record gets its computed fields
///   rewritten (manually managed `bonuses`/`deductions`/`base_salary` are
///   preserved and the net re-derived around them);
/// - an eligible user with a paid record is skipped entirely;
/// - an eligible user without a record gets a fresh `pending` row seeded
///   with the user's configured base salary (default 0);
/// - the founder's cut is itself a recipient row: the founder's record for
///   the period carries `profit_share = founder_share` (zero working days,
///   no owner bonus) under the same protection rules, so the persisted set
///   accounts for the whole profit pool.
///
/// Re-running with unchanged inputs produces an empty plan apart from
/// `unchanged`/`kept_paid` counts, which is what makes the pipeline safely
/// re-runnable at any time.
pub fn plan_reconciliation(
    existing: &[PayrollRecord],
    distribution: &Distribution,
    base_salaries: &HashMap<Uuid, f64>,
    project: &Project,
    period: &PayPeriod,
    financials: PeriodFinancials,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let mut eligible: HashSet<Uuid> = distribution.payouts.iter().map(|p| p.user_id).collect();
    if let Some(founder) = &distribution.founder {
        eligible.insert(founder.user_id);
    }
    let by_user: HashMap<Uuid, &PayrollRecord> =
        existing.iter().map(|record| (record.user_id, record)).collect();

    for record in existing {
        if eligible.contains(&record.user_id) {
            continue;
        }
        if record.status.is_paid() {
            plan.kept_paid.push(record.id);
        } else {
            plan.to_delete.push(record.id);
        }
    }

    for payout in &distribution.payouts {
        match by_user.get(&payout.user_id) {
            Some(record) if record.status.is_paid() => {
                plan.kept_paid.push(record.id);
            }
            Some(record) => {
                let net = net_amount(
                    record.base_salary,
                    payout.proportional_share,
                    payout.owner_bonus,
                    record.bonuses,
                    record.deductions,
                );
                let patch = PayrollPatch {
                    record_id: record.id,
                    profit_share: payout.proportional_share,
                    net_amount: net,
                    work_duration_days: payout.working_days as i32,
                    member_joined_date: payout.joined_date,
                    member_left_date: payout.left_date,
                    is_project_owner: payout.is_owner,
                    owner_bonus: payout.owner_bonus,
                    share_percent: payout.weight.configured_percent(),
                    project_income: financials.total_income,
                    project_expenses: financials.total_expenses,
                    net_profit: financials.profit,
                };
                if patch_changes_record(record, &patch) {
                    plan.to_update.push(patch);
                } else {
                    plan.unchanged += 1;
                }
            }
            None => {
                let base_salary = base_salaries
                    .get(&payout.user_id)
                    .copied()
                    .unwrap_or(0.0);
                plan.to_create.push(NewPayrollRecord {
                    user_id: payout.user_id,
                    project_id: project.id,
                    period: period.label.clone(),
                    base_salary,
                    profit_share: payout.proportional_share,
                    net_amount: net_amount(
                        base_salary,
                        payout.proportional_share,
                        payout.owner_bonus,
                        0.0,
                        0.0,
                    ),
                    work_duration_days: payout.working_days as i32,
                    member_joined_date: payout.joined_date,
                    member_left_date: payout.left_date,
                    is_project_owner: payout.is_owner,
                    owner_bonus: payout.owner_bonus,
                    share_percent: payout.weight.configured_percent(),
                    project_income: financials.total_income,
                    project_expenses: financials.total_expenses,
                    net_profit: financials.profit,
                });
            }
        }
    }

    if let Some(founder) = &distribution.founder {
        // The founder is paid by role, not roster membership, so the record
        // carries no working-day span or owner bonus of its own.
        let is_project_owner = project.owner_user_id == Some(founder.user_id);
        match by_user.get(&founder.user_id) {
            Some(record) if record.status.is_paid() => {
                plan.kept_paid.push(record.id);
            }
            Some(record) => {
                let net = net_amount(
                    record.base_salary,
                    founder.amount,
                    0.0,
                    record.bonuses,
                    record.deductions,
                );
                let patch = PayrollPatch {
                    record_id: record.id,
                    profit_share: founder.amount,
                    net_amount: net,
                    work_duration_days: 0,
                    member_joined_date: period.start,
                    member_left_date: None,
                    is_project_owner,
                    owner_bonus: 0.0,
                    share_percent: None,
                    project_income: financials.total_income,
                    project_expenses: financials.total_expenses,
                    net_profit: financials.profit,
                };
                if patch_changes_record(record, &patch) {
                    plan.to_update.push(patch);
                } else {
                    plan.unchanged += 1;
                }
            }
            None => {
                let base_salary = base_salaries
                    .get(&founder.user_id)
                    .copied()
                    .unwrap_or(0.0);
                plan.to_create.push(NewPayrollRecord {
                    user_id: founder.user_id,
                    project_id: project.id,
                    period: period.label.clone(),
                    base_salary,
                    profit_share: founder.amount,
                    net_amount: net_amount(base_salary, founder.amount, 0.0, 0.0, 0.0),
                    work_duration_days: 0,
                    member_joined_date: period.start,
                    member_left_date: None,
                    is_project_owner,
                    owner_bonus: 0.0,
                    share_percent: None,
                    project_income: financials.total_income,
                    project_expenses: financials.total_expenses,
                    net_profit: financials.profit,
                });
            }
        }
    }

    plan
}

fn patch_changes_record(record: &PayrollRecord, patch: &PayrollPatch) -> bool {
    !amounts_equal(record.profit_share, patch.profit_share)
        || !amounts_equal(record.net_amount, patch.net_amount)
        || !amounts_equal(record.owner_bonus, patch.owner_bonus)
        || !amounts_equal(record.project_income, patch.project_income)
        || !amounts_equal(record.project_expenses, patch.project_expenses)
        || !amounts_equal(record.net_profit, patch.net_profit)
        || record.work_duration_days != patch.work_duration_days
        || record.member_joined_date != patch.member_joined_date
        || record.member_left_date != patch.member_left_date
        || record.is_project_owner != patch.is_project_owner
        || record.share_percent != patch.share_percent
}

fn amounts_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE
}

/// Load the current record set, plan against the distribution, and apply.
///
/// Deletions and upserts are not atomic as a set; a crash mid-apply leaves
/// a partial record set that the next (idempotent) run converges. Callers
/// hold the per-`(project, period)` reconciliation lock for the duration.
pub async fn reconcile_project_payroll(
    pool: &PgPool,
    project: &Project,
    period: &PayPeriod,
    distribution: &Distribution,
    financials: PeriodFinancials,
) -> Result<ReconcileSummary, AppError> {
    let existing = payroll::list_for_project_period(pool, project.id, &period.label).await?;

    let mut recipient_ids: Vec<Uuid> = distribution.payouts.iter().map(|p| p.user_id).collect();
    if let Some(founder) = &distribution.founder {
        recipient_ids.push(founder.user_id);
    }
    let base_salaries = users::base_salaries(pool, &recipient_ids).await?;

    let plan = plan_reconciliation(
        &existing,
        distribution,
        &base_salaries,
        project,
        period,
        financials,
    );

    let mut summary = ReconcileSummary {
        kept_paid: plan.kept_paid.len(),
        unchanged: plan.unchanged,
        ..ReconcileSummary::default()
    };

    for record_id in &plan.to_delete {
        if payroll::delete_unpaid_record(pool, *record_id).await? {
            summary.deleted += 1;
        }
    }
    for patch in &plan.to_update {
        if payroll::apply_patch(pool, patch).await? {
            summary.updated += 1;
        }
    }
    for record in &plan.to_create {
        payroll::insert_record(pool, record).await?;
        summary.created += 1;
    }

    if financials.profit > 0.0 {
        let flagged = ledger::mark_income_profit_shared(pool, project.id, period).await?;
        if flagged > 0 {
            tracing::debug!(
                project_id = %project.id,
                period = %period,
                flagged,
                "Marked income records as profit-shared"
            );
        }
    }

    tracing::info!(
        project_id = %project.id,
        period = %period,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        kept_paid = summary.kept_paid,
        unchanged = summary.unchanged,
        "Payroll reconciliation completed"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::plan_reconciliation;
    use crate::models::{
        net_amount, PayPeriod, PayrollRecord, PayrollStatus, Project, ProjectStatus, ShareWeight,
    };
    use crate::services::aggregation::PeriodFinancials;
    use crate::services::distribution::distribute;
    use crate::services::membership::Participant;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            owner_user_id: None,
            allocated_budget: 0.0,
            total_deal_amount: 0.0,
            start_date: date(2026, 1, 1),
            status: ProjectStatus::Active,
        }
    }

    fn participant(user_id: Uuid, working_days: i64, is_owner: bool) -> Participant {
        Participant {
            user_id,
            working_days,
            weight: ShareWeight::Default,
            is_owner,
            joined_date: date(2026, 7, 1),
            left_date: None,
        }
    }

    fn record_for(
        user_id: Uuid,
        project_id: Uuid,
        status: PayrollStatus,
        profit_share: f64,
    ) -> PayrollRecord {
        PayrollRecord {
            id: Uuid::new_v4(),
            user_id,
            project_id,
            period: "2026-07".to_string(),
            base_salary: 0.0,
            profit_share,
            bonuses: 0.0,
            deductions: 0.0,
            net_amount: profit_share,
            status,
            work_duration_days: 30,
            member_joined_date: date(2026, 7, 1),
            member_left_date: None,
            is_project_owner: false,
            owner_bonus: 0.0,
            share_percent: None,
            project_income: 0.0,
            project_expenses: 0.0,
            net_profit: 0.0,
        }
    }

    fn apply_plan_to(
        records: &mut Vec<PayrollRecord>,
        plan: &super::ReconcilePlan,
    ) {
        records.retain(|r| !plan.to_delete.contains(&r.id));
        for patch in &plan.to_update {
            let record = records
                .iter_mut()
                .find(|r| r.id == patch.record_id)
                .unwrap();
            record.profit_share = patch.profit_share;
            record.net_amount = patch.net_amount;
            record.owner_bonus = patch.owner_bonus;
            record.work_duration_days = patch.work_duration_days;
            record.member_joined_date = patch.member_joined_date;
            record.member_left_date = patch.member_left_date;
            record.is_project_owner = patch.is_project_owner;
            record.share_percent = patch.share_percent;
            record.project_income = patch.project_income;
            record.project_expenses = patch.project_expenses;
            record.net_profit = patch.net_profit;
        }
        for new in &plan.to_create {
            records.push(PayrollRecord {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                project_id: new.project_id,
                period: new.period.clone(),
                base_salary: new.base_salary,
                profit_share: new.profit_share,
                bonuses: 0.0,
                deductions: 0.0,
                net_amount: new.net_amount,
                status: PayrollStatus::Pending,
                work_duration_days: new.work_duration_days,
                member_joined_date: new.member_joined_date,
                member_left_date: new.member_left_date,
                is_project_owner: new.is_project_owner,
                owner_bonus: new.owner_bonus,
                share_percent: new.share_percent,
                project_income: new.project_income,
                project_expenses: new.project_expenses,
                net_profit: new.net_profit,
            });
        }
    }

    #[test]
    fn first_run_creates_pending_records_with_configured_salary() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let user = Uuid::new_v4();
        let dist = distribute(10_000.0, Some(Uuid::new_v4()), &[participant(user, 30, false)]);
        let fin = PeriodFinancials::from_totals(12_000.0, 2_000.0);
        let salaries = HashMap::from([(user, 55_000.0)]);

        let plan = plan_reconciliation(&[], &dist, &salaries, &proj, &period, fin);

        assert_eq!(plan.to_create.len(), 2);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
        let new = plan.to_create.iter().find(|n| n.user_id == user).unwrap();
        assert_eq!(new.base_salary, 55_000.0);
        assert_eq!(new.net_amount, 55_000.0 + new.profit_share + new.owner_bonus);
        assert_eq!(new.net_profit, 10_000.0);
    }

    #[test]
    fn founder_share_lands_in_a_payroll_record() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let founder = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let dist = distribute(
            100_000.0,
            Some(founder),
            &[participant(owner, 30, true), participant(other, 30, false)],
        );
        let fin = PeriodFinancials::from_totals(120_000.0, 20_000.0);
        let salaries = HashMap::from([(founder, 90_000.0)]);

        let plan = plan_reconciliation(&[], &dist, &salaries, &proj, &period, fin);

        assert_eq!(plan.to_create.len(), 3);
        let row = plan.to_create.iter().find(|n| n.user_id == founder).unwrap();
        assert!((row.profit_share - 70_000.0).abs() < 1e-9);
        assert_eq!(row.base_salary, 90_000.0);
        assert_eq!(row.work_duration_days, 0);
        assert_eq!(row.owner_bonus, 0.0);
        assert_eq!(row.member_joined_date, period.start);

        // Everything the project earned this period is accounted for.
        let persisted: f64 = plan
            .to_create
            .iter()
            .map(|n| n.profit_share + n.owner_bonus)
            .sum();
        assert!((persisted - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn paid_founder_record_stays_frozen() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let founder = Uuid::new_v4();
        let paid = record_for(founder, proj.id, PayrollStatus::Paid, 70_000.0);
        let dist = distribute(100_000.0, Some(founder), &[]);
        let fin = PeriodFinancials::from_totals(100_000.0, 0.0);

        let plan =
            plan_reconciliation(&[paid.clone()], &dist, &HashMap::new(), &proj, &period, fin);

        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.kept_paid, vec![paid.id]);
    }

    #[test]
    fn missing_salary_defaults_to_zero() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let user = Uuid::new_v4();
        let dist = distribute(10_000.0, None, &[participant(user, 30, false)]);
        let fin = PeriodFinancials::from_totals(10_000.0, 0.0);

        let plan = plan_reconciliation(&[], &dist, &HashMap::new(), &proj, &period, fin);

        assert_eq!(plan.to_create[0].base_salary, 0.0);
    }

    #[test]
    fn ineligible_unpaid_records_are_deleted_paid_are_kept() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let gone_unpaid = record_for(Uuid::new_v4(), proj.id, PayrollStatus::Pending, 100.0);
        let gone_paid = record_for(Uuid::new_v4(), proj.id, PayrollStatus::Paid, 200.0);
        let dist = distribute(0.0, None, &[]);
        let fin = PeriodFinancials::from_totals(0.0, 0.0);

        let plan = plan_reconciliation(
            &[gone_unpaid.clone(), gone_paid.clone()],
            &dist,
            &HashMap::new(),
            &proj,
            &period,
            fin,
        );

        assert_eq!(plan.to_delete, vec![gone_unpaid.id]);
        assert_eq!(plan.kept_paid, vec![gone_paid.id]);
        assert!(plan.to_create.is_empty());
    }

    #[test]
    fn eligible_paid_record_is_never_rewritten() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let user = Uuid::new_v4();
        let founder = Uuid::new_v4();
        let paid = record_for(user, proj.id, PayrollStatus::Paid, 1.0);
        let dist = distribute(50_000.0, Some(founder), &[participant(user, 30, false)]);
        let fin = PeriodFinancials::from_totals(50_000.0, 0.0);

        let plan = plan_reconciliation(&[paid.clone()], &dist, &HashMap::new(), &proj, &period, fin);

        assert!(plan.to_update.is_empty());
        assert!(plan.to_create.iter().all(|n| n.user_id == founder));
        assert_eq!(plan.kept_paid, vec![paid.id]);
    }

    #[test]
    fn update_preserves_manual_bonuses_and_deductions() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let user = Uuid::new_v4();
        let mut existing = record_for(user, proj.id, PayrollStatus::Pending, 0.0);
        existing.base_salary = 40_000.0;
        existing.bonuses = 1_000.0;
        existing.deductions = 250.0;

        let dist = distribute(30_000.0, Some(Uuid::new_v4()), &[participant(user, 30, false)]);
        let fin = PeriodFinancials::from_totals(30_000.0, 0.0);
        let plan =
            plan_reconciliation(&[existing.clone()], &dist, &HashMap::new(), &proj, &period, fin);

        assert_eq!(plan.to_update.len(), 1);
        let patch = &plan.to_update[0];
        let expected_net = net_amount(
            40_000.0,
            patch.profit_share,
            patch.owner_bonus,
            1_000.0,
            250.0,
        );
        assert!((patch.net_amount - expected_net).abs() < 1e-9);
    }

    #[test]
    fn replanning_after_apply_is_a_no_op() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let dist = distribute(
            100_000.0,
            Some(Uuid::new_v4()),
            &[participant(owner, 30, true), participant(other, 30, false)],
        );
        let fin = PeriodFinancials::from_totals(120_000.0, 20_000.0);
        let salaries = HashMap::from([(owner, 10_000.0), (other, 12_000.0)]);

        let mut records = Vec::new();
        let first = plan_reconciliation(&records, &dist, &salaries, &proj, &period, fin);
        assert_eq!(first.to_create.len(), 3);
        apply_plan_to(&mut records, &first);

        let second = plan_reconciliation(&records, &dist, &salaries, &proj, &period, fin);
        assert!(second.to_create.is_empty());
        assert!(second.to_update.is_empty());
        assert!(second.to_delete.is_empty());
        assert_eq!(second.unchanged, 3);
    }

    #[test]
    fn member_departure_shifts_record_from_update_to_delete() {
        let proj = project();
        let period = PayPeriod::from_label("2026-07").unwrap();
        let leaver = Uuid::new_v4();
        let stayer = Uuid::new_v4();
        let existing = vec![
            record_for(leaver, proj.id, PayrollStatus::Pending, 500.0),
            record_for(stayer, proj.id, PayrollStatus::Pending, 500.0),
        ];

        // Fresh distribution no longer includes the leaver.
        let dist = distribute(20_000.0, Some(Uuid::new_v4()), &[participant(stayer, 30, false)]);
        let fin = PeriodFinancials::from_totals(20_000.0, 0.0);
        let plan = plan_reconciliation(&existing, &dist, &HashMap::new(), &proj, &period, fin);

        assert_eq!(plan.to_delete, vec![existing[0].id]);
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].record_id, existing[1].id);
    }
}
