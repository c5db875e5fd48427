use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, Collection,
};
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};
use crate::schemas::{
    Category, CategoryId, Expense, Group, Member, MemberId, NewCategory, NewMember,
    DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON,
};

/// Persistence for groups and everything they own.
///
/// Each call sees or changes one group document, so a loaded group is a
/// consistent snapshot of its members, categories and expenses.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, name: String) -> Result<Group>;
    /// All groups, or only those where `user_id` has a member record.
    async fn list_groups(&self, user_id: Option<&str>) -> Result<Vec<Group>>;
    async fn get_group(&self, group_id: &str) -> Result<Group>;
    async fn rename_group(&self, group_id: &str, name: String) -> Result<()>;
    async fn add_member(&self, group_id: &str, member: NewMember) -> Result<Member>;
    async fn remove_member(&self, group_id: &str, member_id: MemberId) -> Result<()>;
    async fn add_category(&self, group_id: &str, category: NewCategory) -> Result<Category>;
    /// Expenses keep pointing at the removed id.
    async fn remove_category(&self, group_id: &str, category_id: CategoryId) -> Result<()>;
    async fn insert_expense(&self, group_id: &str, expense: Expense) -> Result<()>;
    async fn replace_expense(&self, group_id: &str, expense: Expense) -> Result<()>;
}

pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn build_member(id: MemberId, member: NewMember) -> Member {
    Member {
        id,
        linked_account_id: member.user_id,
        name: member.name.map(|n| n.trim().to_string()),
        is_admin: member.is_admin,
    }
}

fn build_category(id: CategoryId, category: NewCategory) -> Category {
    Category {
        id,
        name: category.name.trim().to_string(),
        icon: category
            .icon
            .unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
        color: category
            .color
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        is_default: false,
    }
}

pub struct MongoGroupStore {
    groups: Collection<Group>,
}

impl MongoGroupStore {
    pub fn new(client: &Client, database: &str) -> Self {
        MongoGroupStore {
            groups: client.database(database).collection("Groups"),
        }
    }

    /// Bumps a per-group id counter and returns the group as it was before.
    async fn bump_counter(&self, group_id: &str, counter: &str) -> Result<Group> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        self.groups
            .find_one_and_update(doc! { "id": group_id }, doc! { "$inc": { counter: 1_i64 } }, options)
            .await?
            .ok_or_else(|| ApiError::GroupNotFound(group_id.to_string()))
    }
}

#[async_trait]
impl GroupStore for MongoGroupStore {
    async fn create_group(&self, name: String) -> Result<Group> {
        let group = Group::new(new_id(), name);
        self.groups.insert_one(&group, None).await?;
        Ok(group)
    }

    async fn list_groups(&self, user_id: Option<&str>) -> Result<Vec<Group>> {
        let filter = user_id.map(|user_id| doc! { "members.user_id": user_id });
        let cursor = self.groups.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get_group(&self, group_id: &str) -> Result<Group> {
        self.groups
            .find_one(doc! { "id": group_id }, None)
            .await?
            .ok_or_else(|| ApiError::GroupNotFound(group_id.to_string()))
    }

    async fn rename_group(&self, group_id: &str, name: String) -> Result<()> {
        let result = self
            .groups
            .update_one(doc! { "id": group_id }, doc! { "$set": { "name": name } }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::GroupNotFound(group_id.to_string()));
        }
        Ok(())
    }

    async fn add_member(&self, group_id: &str, member: NewMember) -> Result<Member> {
        let group = self.bump_counter(group_id, "next_member_id").await?;
        let member = build_member(group.next_member_id, member);
        self.groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$push": { "members": bson::to_bson(&member)? } },
                None,
            )
            .await?;
        Ok(member)
    }

    async fn remove_member(&self, group_id: &str, member_id: MemberId) -> Result<()> {
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$pull": { "members": { "id": member_id } } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::GroupNotFound(group_id.to_string()));
        }
        if result.modified_count == 0 {
            return Err(ApiError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn add_category(&self, group_id: &str, category: NewCategory) -> Result<Category> {
        let group = self.bump_counter(group_id, "next_category_id").await?;
        let category = build_category(group.next_category_id, category);
        self.groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$push": { "categories": bson::to_bson(&category)? } },
                None,
            )
            .await?;
        Ok(category)
    }

    async fn remove_category(&self, group_id: &str, category_id: CategoryId) -> Result<()> {
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$pull": { "categories": { "id": category_id } } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::GroupNotFound(group_id.to_string()));
        }
        if result.modified_count == 0 {
            return Err(ApiError::CategoryNotFound(category_id));
        }
        Ok(())
    }

    async fn insert_expense(&self, group_id: &str, expense: Expense) -> Result<()> {
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id },
                doc! { "$push": { "expenses": bson::to_bson(&expense)? } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::GroupNotFound(group_id.to_string()));
        }
        Ok(())
    }

    async fn replace_expense(&self, group_id: &str, expense: Expense) -> Result<()> {
        let result = self
            .groups
            .update_one(
                doc! { "id": group_id, "expenses.id": expense.id.as_str() },
                doc! { "$set": { "expenses.$": bson::to_bson(&expense)? } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::ExpenseNotFound(expense.id));
        }
        Ok(())
    }
}

/// Keeps every group in process memory. Used by the tests and by
/// `GROUPCACHE_STORE=memory`.
#[derive(Default)]
pub struct InMemoryGroupStore {
    groups: RwLock<Vec<Group>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn group_mut<'a>(groups: &'a mut [Group], group_id: &str) -> Result<&'a mut Group> {
    groups
        .iter_mut()
        .find(|g| g.id == group_id)
        .ok_or_else(|| ApiError::GroupNotFound(group_id.to_string()))
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn create_group(&self, name: String) -> Result<Group> {
        let group = Group::new(new_id(), name);
        self.groups.write().await.push(group.clone());
        Ok(group)
    }

    async fn list_groups(&self, user_id: Option<&str>) -> Result<Vec<Group>> {
        let groups = self.groups.read().await;
        Ok(groups
            .iter()
            .filter(|g| user_id.map_or(true, |user_id| g.member_for_user(user_id).is_some()))
            .cloned()
            .collect())
    }

    async fn get_group(&self, group_id: &str) -> Result<Group> {
        let groups = self.groups.read().await;
        groups
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
            .ok_or_else(|| ApiError::GroupNotFound(group_id.to_string()))
    }

    async fn rename_group(&self, group_id: &str, name: String) -> Result<()> {
        let mut groups = self.groups.write().await;
        group_mut(&mut groups, group_id)?.name = name;
        Ok(())
    }

    async fn add_member(&self, group_id: &str, member: NewMember) -> Result<Member> {
        let mut groups = self.groups.write().await;
        let group = group_mut(&mut groups, group_id)?;
        let member = build_member(group.next_member_id, member);
        group.next_member_id += 1;
        group.members.push(member.clone());
        Ok(member)
    }

    async fn remove_member(&self, group_id: &str, member_id: MemberId) -> Result<()> {
        let mut groups = self.groups.write().await;
        let group = group_mut(&mut groups, group_id)?;
        let before = group.members.len();
        group.members.retain(|m| m.id != member_id);
        if group.members.len() == before {
            return Err(ApiError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn add_category(&self, group_id: &str, category: NewCategory) -> Result<Category> {
        let mut groups = self.groups.write().await;
        let group = group_mut(&mut groups, group_id)?;
        let category = build_category(group.next_category_id, category);
        group.next_category_id += 1;
        group.categories.push(category.clone());
        Ok(category)
    }

    async fn remove_category(&self, group_id: &str, category_id: CategoryId) -> Result<()> {
        let mut groups = self.groups.write().await;
        let group = group_mut(&mut groups, group_id)?;
        let before = group.categories.len();
        group.categories.retain(|c| c.id != category_id);
        if group.categories.len() == before {
            return Err(ApiError::CategoryNotFound(category_id));
        }
        Ok(())
    }

    async fn insert_expense(&self, group_id: &str, expense: Expense) -> Result<()> {
        let mut groups = self.groups.write().await;
        group_mut(&mut groups, group_id)?.expenses.push(expense);
        Ok(())
    }

    async fn replace_expense(&self, group_id: &str, expense: Expense) -> Result<()> {
        let mut groups = self.groups.write().await;
        let group = group_mut(&mut groups, group_id)?;
        match group.expenses.iter_mut().find(|e| e.id == expense.id) {
            Some(stored) => {
                *stored = expense;
                Ok(())
            }
            None => Err(ApiError::ExpenseNotFound(expense.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder(name: &str) -> NewMember {
        NewMember {
            user_id: None,
            name: Some(name.to_string()),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn member_ids_are_group_scoped_and_never_reused() {
        let store = InMemoryGroupStore::new();
        let first = store.create_group("Flat".to_string()).await.unwrap();
        let second = store.create_group("Trip".to_string()).await.unwrap();

        let a = store.add_member(&first.id, placeholder(" Ann ")).await.unwrap();
        let b = store.add_member(&first.id, placeholder("Ben")).await.unwrap();
        store.remove_member(&first.id, b.id).await.unwrap();
        let c = store.add_member(&first.id, placeholder("Cid")).await.unwrap();
        let other = store.add_member(&second.id, placeholder("Dee")).await.unwrap();

        assert_eq!(a.name.as_deref(), Some("Ann"));
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(other.id, 1);
    }

    #[tokio::test]
    async fn list_filters_on_linked_account() {
        let store = InMemoryGroupStore::new();
        let mine = store.create_group("Mine".to_string()).await.unwrap();
        store.create_group("Theirs".to_string()).await.unwrap();
        store
            .add_member(
                &mine.id,
                NewMember {
                    user_id: Some("u1".to_string()),
                    name: None,
                    is_admin: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.list_groups(None).await.unwrap().len(), 2);
        let listed = store.list_groups(Some("u1")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test]
    async fn removing_unknown_entries_reports_not_found() {
        let store = InMemoryGroupStore::new();
        let group = store.create_group("Flat".to_string()).await.unwrap();
        assert!(matches!(
            store.remove_member(&group.id, 9).await,
            Err(ApiError::MemberNotFound(9))
        ));
        assert!(matches!(
            store.remove_category(&group.id, 99).await,
            Err(ApiError::CategoryNotFound(99))
        ));
        assert!(matches!(
            store.get_group("missing").await,
            Err(ApiError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn new_category_gets_defaults_and_fresh_id() {
        let store = InMemoryGroupStore::new();
        let group = store.create_group("Flat".to_string()).await.unwrap();
        let category = store
            .add_category(
                &group.id,
                NewCategory {
                    name: "Pets".to_string(),
                    icon: None,
                    color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(category.id, group.next_category_id);
        assert_eq!(category.icon, DEFAULT_CATEGORY_ICON);
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert!(!category.is_default);
    }
}
