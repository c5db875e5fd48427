use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type GroupId = String;
pub type MemberId = i64;
pub type ExpenseId = String;
pub type CategoryId = i64;
pub type UserId = String;

pub const DEFAULT_CATEGORY_ICON: &str = "receipt";
pub const DEFAULT_CATEGORY_COLOR: &str = "#cccccc";

/// Stored as a single document: the group owns its members, categories and expenses.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub next_member_id: MemberId,
    #[serde(default)]
    pub next_category_id: CategoryId,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: MemberId,
    /// Absent for placeholder members added by name only.
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub linked_account_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Share {
    pub member_id: MemberId,
    /// Absent or zero means the member takes part in the equal split.
    #[serde(rename = "share", default)]
    pub amount: Option<Decimal>,
    #[serde(rename = "is_paid", default)]
    pub paid: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub group_id: GroupId,
    #[serde(default)]
    pub shares: Vec<Share>,
    #[serde(rename = "is_settled", default)]
    pub settled: bool,
}

// Request bodies

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GroupNameJson {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewMember {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Body of both expense creation and expense update.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExpenseJson {
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub shares: Vec<Share>,
}

/// Body of the share PATCH. Only `is_paid` is read; other fields such as
/// `member_id` or `share` are ignored, and the share amount never changes.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ShareUpdate {
    pub is_paid: bool,
}

impl Group {
    pub fn new(id: GroupId, name: String) -> Self {
        let categories = default_categories();
        Group {
            id,
            name,
            members: vec![],
            next_member_id: 1,
            next_category_id: categories.len() as CategoryId + 1,
            categories,
            expenses: vec![],
        }
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn member(&self, member_id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    pub fn member_for_user(&self, user_id: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.linked_account_id.as_deref() == Some(user_id))
    }

    pub fn expense(&self, expense_id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == expense_id)
    }
}

impl Expense {
    pub fn from_json(id: ExpenseId, group_id: GroupId, json: ExpenseJson) -> Self {
        Expense {
            id,
            amount: json.amount,
            description: json.description,
            created_at: json.created_at,
            category_id: json.category_id,
            group_id,
            shares: json.shares,
            settled: false,
        }
    }

    /// Replaces the editable fields, keeping identity and the settled flag.
    pub fn apply_update(&mut self, json: ExpenseJson) {
        self.amount = json.amount;
        self.description = json.description;
        self.created_at = json.created_at;
        self.category_id = json.category_id;
        self.shares = json.shares;
    }

    pub fn share_of(&self, member_id: MemberId) -> Option<&Share> {
        self.shares.iter().find(|s| s.member_id == member_id)
    }

    /// Returns false when the member has no share in this expense.
    pub fn set_share_paid(&mut self, member_id: MemberId, paid: bool) -> bool {
        match self.shares.iter_mut().find(|s| s.member_id == member_id) {
            Some(share) => {
                share.paid = paid;
                true
            }
            None => false,
        }
    }
}

fn default_categories() -> Vec<Category> {
    [
        ("Food", "restaurant", "#f59e0b"),
        ("Transport", "directions_car", "#3b82f6"),
        ("Housing", "home", "#10b981"),
        ("Entertainment", "movie", "#8b5cf6"),
        ("Other", DEFAULT_CATEGORY_ICON, DEFAULT_CATEGORY_COLOR),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (name, icon, color))| Category {
        id: idx as CategoryId + 1,
        name: name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        is_default: true,
    })
    .collect()
}
