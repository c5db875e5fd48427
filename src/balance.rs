use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;

use crate::schemas::{Expense, Group, GroupId, Member, MemberId};
use crate::share::resolve_expense;

/// Net amount each member still owes. Positive owes, negative overpaid.
pub type Balance = BTreeMap<MemberId, Decimal>;

/// Sums the unpaid shares of `expenses` for every member in `member_scope`.
///
/// Every scoped member is present in the result, starting at zero. Paid
/// shares and shares pointing outside the scope contribute nothing. Totals
/// saturate at the `Decimal` bounds.
pub fn compute_balances(expenses: &[Expense], member_scope: &BTreeSet<MemberId>) -> Balance {
    let mut balance: Balance = member_scope
        .iter()
        .map(|&member_id| (member_id, Decimal::ZERO))
        .collect();
    for expense in expenses {
        for (share, amount) in resolve_expense(expense) {
            if share.paid {
                continue;
            }
            if let Some(total) = balance.get_mut(&share.member_id) {
                *total = total.saturating_add(amount);
            }
        }
    }
    balance
}

pub fn compute_balance_from_group(group: &Group) -> Balance {
    let scope = group.members.iter().map(|m| m.id).collect();
    compute_balances(&group.expenses, &scope)
}

pub fn find_user_member<'a>(members: &'a [Member], user_id: &str) -> Option<&'a Member> {
    members
        .iter()
        .find(|m| m.linked_account_id.as_deref() == Some(user_id))
}

/// Unpaid debt of one account over every group it has a member record in.
///
/// Groups without such a record, or without loaded expenses, add zero.
/// Groups are summed in id order so equal inputs give equal results.
pub fn compute_user_debt_across_groups(
    expenses_by_group: &HashMap<GroupId, Vec<Expense>>,
    members_by_group: &HashMap<GroupId, Vec<Member>>,
    user_id: &str,
) -> Decimal {
    let mut group_ids: Vec<&GroupId> = members_by_group.keys().collect();
    group_ids.sort();

    let mut debt = Decimal::ZERO;
    for group_id in group_ids {
        let members = &members_by_group[group_id];
        let Some(member) = find_user_member(members, user_id) else {
            continue;
        };
        let Some(expenses) = expenses_by_group.get(group_id) else {
            continue;
        };
        let scope = BTreeSet::from([member.id]);
        let owed = compute_balances(expenses, &scope)
            .get(&member.id)
            .copied()
            .unwrap_or_default();
        debt = debt.saturating_add(owed);
    }
    debt
}
