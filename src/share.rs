use rust_decimal::Decimal;

use crate::schemas::{Expense, Share};

/// How a share takes part in its expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareKind {
    Fixed(Decimal),
    EqualSplit,
}

impl Share {
    pub fn kind(&self) -> ShareKind {
        match self.amount {
            Some(amount) if amount > Decimal::ZERO => ShareKind::Fixed(amount),
            _ => ShareKind::EqualSplit,
        }
    }
}

/// The amount each equal-split share of `expense` owes.
///
/// The remainder is the expense total minus every fixed share. It is not
/// clamped: fixed shares larger than the total leave a negative amount for
/// the equal-split members. No equal-split shares means zero. Sums saturate
/// at the `Decimal` bounds.
pub fn equal_split_amount(expense: &Expense) -> Decimal {
    let mut fixed_total = Decimal::ZERO;
    let mut equal_split_count: u32 = 0;
    for share in &expense.shares {
        match share.kind() {
            ShareKind::Fixed(amount) => fixed_total = fixed_total.saturating_add(amount),
            ShareKind::EqualSplit => equal_split_count += 1,
        }
    }
    if equal_split_count == 0 {
        return Decimal::ZERO;
    }
    expense.amount.saturating_sub(fixed_total) / Decimal::from(equal_split_count)
}

pub fn resolve_share_amount(expense: &Expense, share: &Share) -> Decimal {
    match share.kind() {
        ShareKind::Fixed(amount) => amount,
        ShareKind::EqualSplit => equal_split_amount(expense),
    }
}

/// Resolves every share of an expense at once, computing the split a single time.
pub fn resolve_expense(expense: &Expense) -> impl Iterator<Item = (&Share, Decimal)> {
    let equal_split = equal_split_amount(expense);
    expense.shares.iter().map(move |share| {
        let amount = match share.kind() {
            ShareKind::Fixed(amount) => amount,
            ShareKind::EqualSplit => equal_split,
        };
        (share, amount)
    })
}
