use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::error::{ApiError, Result};
use crate::schemas::{ExpenseJson, Group, NewCategory, NewMember};

/// Largest expense or share amount accepted on write. Keeps sums of stored
/// amounts far from the `Decimal` bounds.
pub fn max_amount() -> Decimal {
    Decimal::from(1_000_000_000_000_i64)
}

pub fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(format!("{what} name can't be empty")));
    }
    Ok(())
}

pub fn validate_new_member(group: &Group, member: &NewMember) -> Result<()> {
    match (&member.user_id, &member.name) {
        (None, None) => {
            return Err(ApiError::Validation(
                "a member needs a user_id or a name".to_string(),
            ))
        }
        (_, Some(name)) => validate_name(name, "Member")?,
        _ => {}
    }
    if let Some(user_id) = &member.user_id {
        if group.member_for_user(user_id).is_some() {
            return Err(ApiError::Validation(format!(
                "user {user_id} is already a member of this group"
            )));
        }
    }
    Ok(())
}

pub fn validate_new_category(category: &NewCategory) -> Result<()> {
    validate_name(&category.name, "Category")
}

/// Write-time checks for a created or updated expense.
///
/// Categories are only checked here; an expense may later outlive its category.
pub fn validate_expense(group: &Group, expense: &ExpenseJson) -> Result<()> {
    if expense.amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "expense amount must be greater than zero".to_string(),
        ));
    }
    if expense.amount > max_amount() {
        return Err(ApiError::Validation(format!(
            "expense amount can't exceed {}",
            max_amount()
        )));
    }
    if let Some(category_id) = expense.category_id {
        if !group.categories.iter().any(|c| c.id == category_id) {
            return Err(ApiError::CategoryNotFound(category_id));
        }
    }
    let mut seen = HashSet::new();
    for share in &expense.shares {
        if !seen.insert(share.member_id) {
            return Err(ApiError::Validation(format!(
                "member {} has more than one share",
                share.member_id
            )));
        }
        if group.member(share.member_id).is_none() {
            return Err(ApiError::MemberNotFound(share.member_id));
        }
        if share.amount.is_some_and(|amount| amount < Decimal::ZERO) {
            return Err(ApiError::Validation(format!(
                "share of member {} can't be negative",
                share.member_id
            )));
        }
        if share.amount.is_some_and(|amount| amount > max_amount()) {
            return Err(ApiError::Validation(format!(
                "share of member {} can't exceed {}",
                share.member_id,
                max_amount()
            )));
        }
    }
    Ok(())
}
