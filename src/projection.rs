//! Screen-level derivations over the balance sheet and the loaded collections.
//!
//! Everything here is recomputed from a full snapshot. Money always comes
//! from the share resolver or the balance aggregator.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::balance::{compute_balances, compute_user_debt_across_groups, find_user_member};
use crate::schemas::{
    Category, CategoryId, Expense, Group, GroupId, GroupSummary, Member, MemberId, Share,
    DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON,
};
use crate::share::resolve_share_amount;

pub const UNKNOWN_CATEGORY: &str = "unknown category";
pub const UNKNOWN_MEMBER: &str = "unknown member";
pub const UNKNOWN_GROUP: &str = "unknown group";
pub const DASHBOARD_RECENT_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Owes,
    Overpaid,
    Settled,
}

impl DebtStatus {
    pub fn from_amount(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            DebtStatus::Owes
        } else if amount < Decimal::ZERO {
            DebtStatus::Overpaid
        } else {
            DebtStatus::Settled
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberDebt {
    pub member_id: MemberId,
    pub name: String,
    pub is_admin: bool,
    pub amount: Decimal,
    pub status: DebtStatus,
}

/// Which of a user's expenses to show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseFilter {
    #[default]
    All,
    Paid,
    Unpaid,
}

/// One expense seen through the share a user holds in it.
#[derive(Clone, Debug, PartialEq)]
pub struct UserExpense<'a> {
    pub expense: &'a Expense,
    pub share: &'a Share,
    pub amount: Decimal,
}

impl UserExpense<'_> {
    pub fn is_paid(&self) -> bool {
        self.share.paid
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserExpenses<'a> {
    pub all: Vec<UserExpense<'a>>,
    pub paid: Vec<UserExpense<'a>>,
    pub unpaid: Vec<UserExpense<'a>>,
}

impl<'a> UserExpenses<'a> {
    pub fn filtered(&self, filter: ExpenseFilter) -> &[UserExpense<'a>] {
        match filter {
            ExpenseFilter::All => &self.all,
            ExpenseFilter::Paid => &self.paid,
            ExpenseFilter::Unpaid => &self.unpaid,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub total: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategorySpending {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub group_count: usize,
    pub active_expense_count: usize,
    pub debt: Decimal,
    pub recent_expenses: Vec<Expense>,
}

/// The loaded state of several groups, keyed by group id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub groups: Vec<GroupSummary>,
    pub expenses_by_group: HashMap<GroupId, Vec<Expense>>,
    pub members_by_group: HashMap<GroupId, Vec<Member>>,
    pub categories_by_group: HashMap<GroupId, Vec<Category>>,
}

impl Snapshot {
    pub fn from_groups(groups: Vec<Group>) -> Self {
        let mut snapshot = Snapshot::default();
        for group in groups {
            snapshot.groups.push(group.summary());
            snapshot.expenses_by_group.insert(group.id.clone(), group.expenses);
            snapshot.members_by_group.insert(group.id.clone(), group.members);
            snapshot.categories_by_group.insert(group.id, group.categories);
        }
        snapshot
    }
}

/// Two fractional digits for display. Internal sums keep full precision.
pub fn display_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn member_display_name(member: &Member) -> &str {
    member.name.as_deref().unwrap_or(UNKNOWN_MEMBER)
}

pub fn member_name(members: &[Member], member_id: MemberId) -> &str {
    members
        .iter()
        .find(|m| m.id == member_id)
        .map(member_display_name)
        .unwrap_or(UNKNOWN_MEMBER)
}

pub fn find_category<'a>(
    categories: &'a [Category],
    category_id: Option<CategoryId>,
) -> Option<&'a Category> {
    let category_id = category_id?;
    categories.iter().find(|c| c.id == category_id)
}

pub fn category_name(categories: &[Category], category_id: Option<CategoryId>) -> &str {
    find_category(categories, category_id)
        .map(|c| c.name.as_str())
        .unwrap_or(UNKNOWN_CATEGORY)
}

pub fn category_icon(categories: &[Category], category_id: Option<CategoryId>) -> &str {
    find_category(categories, category_id)
        .map(|c| c.icon.as_str())
        .unwrap_or(DEFAULT_CATEGORY_ICON)
}

pub fn category_color(categories: &[Category], category_id: Option<CategoryId>) -> &str {
    find_category(categories, category_id)
        .map(|c| c.color.as_str())
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
}

pub fn group_name(groups: &[GroupSummary], group_id: &str) -> String {
    groups
        .iter()
        .find(|g| g.id == group_id)
        .map(|g| g.name.clone())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}

/// Per-member debt list in roster order.
pub fn member_debts(members: &[Member], expenses: &[Expense]) -> Vec<MemberDebt> {
    let scope: BTreeSet<MemberId> = members.iter().map(|m| m.id).collect();
    let balance = compute_balances(expenses, &scope);
    members
        .iter()
        .map(|member| {
            let amount = balance.get(&member.id).copied().unwrap_or_default();
            MemberDebt {
                member_id: member.id,
                name: member_display_name(member).to_string(),
                is_admin: member.is_admin,
                amount,
                status: DebtStatus::from_amount(amount),
            }
        })
        .collect()
}

/// Splits the expenses a user holds a share in by the paid flag of that share.
///
/// Groups are visited in id order and expenses in input order. Other
/// members' payments never move an expense between the partitions.
pub fn partition_user_expenses<'a>(
    expenses_by_group: &'a HashMap<GroupId, Vec<Expense>>,
    members_by_group: &HashMap<GroupId, Vec<Member>>,
    user_id: &str,
) -> UserExpenses<'a> {
    let mut group_ids: Vec<&GroupId> = expenses_by_group.keys().collect();
    group_ids.sort();

    let mut partition = UserExpenses::default();
    for group_id in group_ids {
        let Some(member) = members_by_group
            .get(group_id)
            .and_then(|members| find_user_member(members, user_id))
        else {
            continue;
        };
        for expense in &expenses_by_group[group_id] {
            let Some(share) = expense.share_of(member.id) else {
                continue;
            };
            let entry = UserExpense {
                expense,
                share,
                amount: resolve_share_amount(expense, share),
            };
            if share.paid {
                partition.paid.push(entry.clone());
            } else {
                partition.unpaid.push(entry.clone());
            }
            partition.all.push(entry);
        }
    }
    partition
}

/// Sums of the user's own resolved shares, not of expense totals.
pub fn summarize_user_spending(partition: &UserExpenses<'_>) -> SpendingSummary {
    let sum = |entries: &[UserExpense<'_>]| {
        entries
            .iter()
            .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.amount))
    };
    SpendingSummary {
        total: sum(&partition.all),
        paid: sum(&partition.paid),
        unpaid: sum(&partition.unpaid),
    }
}

/// The user's share burden grouped by category, largest first.
pub fn user_spending_by_category(
    entries: &[UserExpense<'_>],
    categories_by_group: &HashMap<GroupId, Vec<Category>>,
) -> Vec<CategorySpending> {
    let mut breakdown: Vec<CategorySpending> = Vec::new();
    for entry in entries {
        let categories = categories_by_group
            .get(&entry.expense.group_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let category = find_category(categories, entry.expense.category_id);
        let category_id = category.map(|c| c.id);
        let name = category_name(categories, entry.expense.category_id);

        // Categories are group-scoped, so ids alone collide across groups.
        match breakdown
            .iter_mut()
            .find(|b| b.category_id == category_id && b.name == name)
        {
            Some(bucket) => bucket.total = bucket.total.saturating_add(entry.amount),
            None => breakdown.push(CategorySpending {
                category_id,
                name: name.to_string(),
                icon: category_icon(categories, entry.expense.category_id).to_string(),
                color: category_color(categories, entry.expense.category_id).to_string(),
                total: entry.amount,
            }),
        }
    }
    breakdown.sort_by(|a, b| b.total.cmp(&a.total));
    breakdown
}

/// Newest first; expenses created at the same instant keep their input order.
pub fn recent_expenses<'a, I>(expenses: I, limit: usize) -> Vec<&'a Expense>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut sorted: Vec<&Expense> = expenses.into_iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

pub fn dashboard_summary(
    expenses_by_group: &HashMap<GroupId, Vec<Expense>>,
    members_by_group: &HashMap<GroupId, Vec<Member>>,
    user_id: &str,
) -> DashboardSummary {
    let mut group_ids: Vec<&GroupId> = expenses_by_group.keys().collect();
    group_ids.sort();
    let all_expenses: Vec<&Expense> = group_ids
        .into_iter()
        .flat_map(|id| expenses_by_group[id].iter())
        .collect();

    DashboardSummary {
        group_count: members_by_group
            .values()
            .filter(|members| find_user_member(members, user_id).is_some())
            .count(),
        active_expense_count: all_expenses.iter().filter(|e| !e.settled).count(),
        debt: compute_user_debt_across_groups(expenses_by_group, members_by_group, user_id),
        recent_expenses: recent_expenses(all_expenses, DASHBOARD_RECENT_LIMIT)
            .into_iter()
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn member(id: MemberId, user: Option<&str>, name: Option<&str>) -> Member {
        Member {
            id,
            linked_account_id: user.map(str::to_string),
            name: name.map(str::to_string),
            is_admin: id == 1,
        }
    }

    fn share(member_id: MemberId, amount: Option<Decimal>, paid: bool) -> Share {
        Share {
            member_id,
            amount,
            paid,
        }
    }

    fn expense(id: &str, group_id: &str, amount: Decimal, hour: u32, shares: Vec<Share>) -> Expense {
        Expense {
            id: id.to_string(),
            amount,
            description: Some(format!("expense {id}")),
            created_at: at(hour),
            category_id: None,
            group_id: group_id.to_string(),
            shares,
            settled: false,
        }
    }

    fn category(id: CategoryId, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            icon: "icon".to_string(),
            color: "#000000".to_string(),
            is_default: false,
        }
    }

    #[rstest]
    #[case(dec!(12.5), DebtStatus::Owes)]
    #[case(dec!(-0.01), DebtStatus::Overpaid)]
    #[case(dec!(0), DebtStatus::Settled)]
    #[case(dec!(0.000), DebtStatus::Settled)]
    fn status_follows_sign(#[case] amount: Decimal, #[case] expected: DebtStatus) {
        assert_eq!(DebtStatus::from_amount(amount), expected);
    }

    #[rstest]
    #[case(dec!(33.333333), dec!(33.33))]
    #[case(dec!(0.125), dec!(0.13))]
    #[case(dec!(-0.125), dec!(-0.13))]
    #[case(dec!(100), dec!(100.00))]
    fn display_rounds_to_cents(#[case] amount: Decimal, #[case] expected: Decimal) {
        assert_eq!(display_amount(amount), expected);
    }

    #[test]
    fn member_debts_keep_roster_order_and_labels() {
        let members = vec![
            member(2, None, Some("Bea")),
            member(1, Some("u1"), Some("Al")),
            member(3, None, None),
        ];
        let expenses = vec![
            expense("e1", "g1", dec!(100), 1, vec![share(1, None, false), share(2, None, true)]),
            expense(
                "e2",
                "g1",
                dec!(10),
                2,
                vec![share(1, Some(dec!(30)), false), share(3, None, false)],
            ),
        ];
        let debts = member_debts(&members, &expenses);
        let ids: Vec<MemberId> = debts.iter().map(|d| d.member_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(debts[0].status, DebtStatus::Settled);
        assert_eq!(debts[1].amount, dec!(80));
        assert!(debts[1].is_admin);
        assert_eq!(debts[2].amount, dec!(-20));
        assert_eq!(debts[2].status, DebtStatus::Overpaid);
        assert_eq!(debts[2].name, UNKNOWN_MEMBER);
    }

    #[test]
    fn lookups_fall_back_on_missing_ids() {
        let categories = vec![category(1, "Food")];
        assert_eq!(category_name(&categories, Some(1)), "Food");
        assert_eq!(category_name(&categories, Some(42)), UNKNOWN_CATEGORY);
        assert_eq!(category_name(&categories, None), UNKNOWN_CATEGORY);
        assert_eq!(category_icon(&categories, Some(42)), DEFAULT_CATEGORY_ICON);
        assert_eq!(category_color(&[], Some(1)), DEFAULT_CATEGORY_COLOR);

        let members = vec![member(1, None, Some("Al"))];
        assert_eq!(member_name(&members, 1), "Al");
        assert_eq!(member_name(&members, 5), UNKNOWN_MEMBER);

        let groups = vec![GroupSummary {
            id: "g1".to_string(),
            name: "Trip".to_string(),
        }];
        assert_eq!(group_name(&groups, "g1"), "Trip");
        assert_eq!(group_name(&groups, "nope"), UNKNOWN_GROUP);
    }

    fn snapshot() -> (HashMap<GroupId, Vec<Expense>>, HashMap<GroupId, Vec<Member>>) {
        let expenses = HashMap::from([
            (
                "g1".to_string(),
                vec![
                    // user paid their part, somebody else did not
                    expense("a", "g1", dec!(300), 3, vec![share(1, None, true), share(2, None, false), share(3, None, false)]),
                    expense("b", "g1", dec!(300), 5, vec![share(1, Some(dec!(50)), false), share(2, None, true), share(3, None, true)]),
                    expense("c", "g1", dec!(80), 4, vec![share(2, None, false)]),
                ],
            ),
            (
                "g2".to_string(),
                vec![expense("d", "g2", dec!(60), 1, vec![share(7, None, false), share(8, None, false)])],
            ),
        ]);
        let members = HashMap::from([
            (
                "g1".to_string(),
                vec![member(1, Some("alice"), Some("Alice")), member(2, None, Some("Bob")), member(3, None, None)],
            ),
            ("g2".to_string(), vec![member(7, Some("alice"), Some("Alice")), member(8, None, None)]),
        ]);
        (expenses, members)
    }

    #[test]
    fn partition_uses_the_users_own_share() {
        let (expenses, members) = snapshot();
        let partition = partition_user_expenses(&expenses, &members, "alice");

        let ids = |entries: &[UserExpense<'_>]| -> Vec<String> {
            entries.iter().map(|e| e.expense.id.clone()).collect()
        };
        assert_eq!(ids(&partition.all), vec!["a", "b", "d"]);
        assert_eq!(ids(partition.filtered(ExpenseFilter::Paid)), vec!["a"]);
        assert_eq!(ids(partition.filtered(ExpenseFilter::Unpaid)), vec!["b", "d"]);

        let summary = summarize_user_spending(&partition);
        assert_eq!(summary.paid, dec!(100));
        assert_eq!(summary.unpaid, dec!(80));
        assert_eq!(summary.total, dec!(180));
    }

    #[test]
    fn partition_for_stranger_is_empty() {
        let (expenses, members) = snapshot();
        let partition = partition_user_expenses(&expenses, &members, "mallory");
        assert!(partition.all.is_empty());
        assert_eq!(summarize_user_spending(&partition), SpendingSummary::default());
    }

    #[test]
    fn category_breakdown_degrades_on_deleted_category() {
        let (mut expenses, members) = snapshot();
        for expense in expenses.get_mut("g1").unwrap() {
            expense.category_id = Some(if expense.id == "a" { 1 } else { 9 });
        }
        let categories = HashMap::from([("g1".to_string(), vec![category(1, "Food")])]);
        let partition = partition_user_expenses(&expenses, &members, "alice");
        let breakdown = user_spending_by_category(&partition.all, &categories);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].name, "Food");
        assert_eq!(breakdown[0].total, dec!(100));
        assert_eq!(breakdown[1].name, UNKNOWN_CATEGORY);
        assert_eq!(breakdown[1].category_id, None);
        assert_eq!(breakdown[1].icon, DEFAULT_CATEGORY_ICON);
        assert_eq!(breakdown[1].total, dec!(80));
    }

    #[test]
    fn recent_orders_newest_first_with_stable_ties() {
        let expenses = vec![
            expense("old", "g1", dec!(1), 1, vec![]),
            expense("tie-1", "g1", dec!(1), 5, vec![]),
            expense("new", "g1", dec!(1), 9, vec![]),
            expense("tie-2", "g1", dec!(1), 5, vec![]),
        ];
        let ids: Vec<&str> = recent_expenses(&expenses, 3)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "tie-1", "tie-2"]);
    }

    #[test]
    fn dashboard_counts_active_and_debt() {
        let (mut expenses, members) = snapshot();
        expenses.get_mut("g2").unwrap()[0].settled = true;
        let summary = dashboard_summary(&expenses, &members, "alice");
        assert_eq!(summary.group_count, 2);
        assert_eq!(summary.active_expense_count, 3);
        assert_eq!(summary.debt, dec!(80));
        let ids: Vec<&str> = summary.recent_expenses.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn dashboard_counts_only_the_users_groups() {
        let (mut expenses, mut members) = snapshot();
        expenses.insert("g3".to_string(), vec![]);
        members.insert("g3".to_string(), vec![member(1, Some("bob"), None)]);
        assert_eq!(dashboard_summary(&expenses, &members, "alice").group_count, 2);
        assert_eq!(dashboard_summary(&expenses, &members, "bob").group_count, 1);
        assert_eq!(dashboard_summary(&expenses, &members, "mallory").group_count, 0);
    }

    #[test]
    fn spending_sums_saturate() {
        let expenses = vec![
            expense("x", "g1", Decimal::MAX, 1, vec![share(1, Some(Decimal::MAX), false)]),
            expense("y", "g1", Decimal::MAX, 2, vec![share(1, Some(Decimal::MAX), false)]),
        ];
        let by_group = HashMap::from([("g1".to_string(), expenses)]);
        let members = HashMap::from([("g1".to_string(), vec![member(1, Some("alice"), None)])]);
        let partition = partition_user_expenses(&by_group, &members, "alice");
        assert_eq!(summarize_user_spending(&partition).unpaid, Decimal::MAX);
        let breakdown = user_spending_by_category(&partition.all, &HashMap::new());
        assert_eq!(breakdown[0].total, Decimal::MAX);
    }
}
