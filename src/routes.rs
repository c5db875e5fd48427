use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::projection::{
    category_name, dashboard_summary, display_amount, group_name, member_debts,
    partition_user_expenses, recent_expenses, summarize_user_spending, user_spending_by_category,
    CategorySpending, DashboardSummary, ExpenseFilter, MemberDebt, Snapshot, SpendingSummary,
};
use crate::balance::compute_user_debt_across_groups;
use crate::schemas::{
    CategoryId, Expense, ExpenseJson, GroupNameJson, MemberId, NewCategory, NewMember,
    ShareUpdate,
};
use crate::store::{new_id, GroupStore};
use crate::validation::{validate_expense, validate_name, validate_new_category, validate_new_member};

type Store = web::Data<dyn GroupStore>;

const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Deserialize)]
struct GroupsQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ExpensesQuery {
    #[serde(default)]
    status: ExpenseFilter,
}

#[derive(Serialize)]
struct UserDebtJson {
    user_id: String,
    debt: Decimal,
}

#[derive(Serialize)]
struct UserExpenseJson {
    #[serde(flatten)]
    expense: Expense,
    group_name: String,
    category_name: String,
    share_amount: Decimal,
    share_paid: bool,
}

#[derive(Serialize)]
struct UserExpensesJson {
    status: ExpenseFilter,
    summary: SpendingSummary,
    expenses: Vec<UserExpenseJson>,
    categories: Vec<CategorySpending>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(list_groups)
            .service(create_group)
            .service(get_group)
            .service(rename_group)
            .service(list_members)
            .service(add_member)
            .service(remove_member)
            .service(list_categories)
            .service(add_category)
            .service(remove_category)
            .service(list_expenses)
            .service(get_recent_expenses)
            .service(add_expense)
            .service(update_expense)
            .service(update_share)
            .service(get_balance)
            .service(get_user_debt)
            .service(get_user_expenses)
            .service(get_dashboard),
    );
}

#[get("/groups")]
async fn list_groups(store: Store, query: web::Query<GroupsQuery>) -> Result<HttpResponse> {
    let groups = store.list_groups(query.user_id.as_deref()).await?;
    let summaries: Vec<_> = groups.iter().map(|g| g.summary()).collect();
    Ok(HttpResponse::Ok().json(summaries))
}

#[post("/groups")]
async fn create_group(store: Store, json: web::Json<GroupNameJson>) -> Result<HttpResponse> {
    let name = json.into_inner().name;
    validate_name(&name, "Group")?;
    let group = store.create_group(name.trim().to_string()).await?;
    tracing::info!(group_id = %group.id, "group created");
    Ok(HttpResponse::Created().json(group.summary()))
}

#[get("/groups/{group_id}")]
async fn get_group(store: Store, group_id: web::Path<String>) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    Ok(HttpResponse::Ok().json(group.summary()))
}

#[put("/groups/{group_id}")]
async fn rename_group(
    store: Store,
    group_id: web::Path<String>,
    json: web::Json<GroupNameJson>,
) -> Result<HttpResponse> {
    let name = json.into_inner().name;
    validate_name(&name, "Group")?;
    store.rename_group(&group_id, name.trim().to_string()).await?;
    let group = store.get_group(&group_id).await?;
    Ok(HttpResponse::Ok().json(group.summary()))
}

#[get("/groups/{group_id}/members")]
async fn list_members(store: Store, group_id: web::Path<String>) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    Ok(HttpResponse::Ok().json(group.members))
}

#[post("/groups/{group_id}/members")]
async fn add_member(
    store: Store,
    group_id: web::Path<String>,
    json: web::Json<NewMember>,
) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    let new_member = json.into_inner();
    validate_new_member(&group, &new_member)?;
    let member = store.add_member(&group_id, new_member).await?;
    tracing::info!(group_id = %group_id, member_id = member.id, "member added");
    Ok(HttpResponse::Created().json(member))
}

#[delete("/groups/{group_id}/members/{member_id}")]
async fn remove_member(
    store: Store,
    path: web::Path<(String, MemberId)>,
) -> Result<HttpResponse> {
    let (group_id, member_id) = path.into_inner();
    store.remove_member(&group_id, member_id).await?;
    tracing::info!(group_id = %group_id, member_id, "member removed");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/groups/{group_id}/categories")]
async fn list_categories(store: Store, group_id: web::Path<String>) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    Ok(HttpResponse::Ok().json(group.categories))
}

#[post("/groups/{group_id}/categories")]
async fn add_category(
    store: Store,
    group_id: web::Path<String>,
    json: web::Json<NewCategory>,
) -> Result<HttpResponse> {
    let new_category = json.into_inner();
    validate_new_category(&new_category)?;
    let category = store.add_category(&group_id, new_category).await?;
    tracing::info!(group_id = %group_id, category_id = category.id, "category added");
    Ok(HttpResponse::Created().json(category))
}

#[delete("/groups/{group_id}/categories/{category_id}")]
async fn remove_category(
    store: Store,
    path: web::Path<(String, CategoryId)>,
) -> Result<HttpResponse> {
    let (group_id, category_id) = path.into_inner();
    store.remove_category(&group_id, category_id).await?;
    tracing::info!(group_id = %group_id, category_id, "category removed");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/groups/{group_id}/expenses")]
async fn list_expenses(store: Store, group_id: web::Path<String>) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    Ok(HttpResponse::Ok().json(group.expenses))
}

#[get("/groups/{group_id}/expenses/recent")]
async fn get_recent_expenses(
    store: Store,
    group_id: web::Path<String>,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Ok(HttpResponse::Ok().json(recent_expenses(&group.expenses, limit)))
}

#[post("/groups/{group_id}/expenses")]
async fn add_expense(
    store: Store,
    group_id: web::Path<String>,
    json: web::Json<ExpenseJson>,
) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    let json = json.into_inner();
    validate_expense(&group, &json)?;
    let expense = Expense::from_json(new_id(), group.id, json);
    store.insert_expense(&group_id, expense.clone()).await?;
    tracing::info!(group_id = %group_id, expense_id = %expense.id, amount = %expense.amount, "expense added");
    Ok(HttpResponse::Created().json(expense))
}

#[put("/groups/{group_id}/expenses/{expense_id}")]
async fn update_expense(
    store: Store,
    path: web::Path<(String, String)>,
    json: web::Json<ExpenseJson>,
) -> Result<HttpResponse> {
    let (group_id, expense_id) = path.into_inner();
    let group = store.get_group(&group_id).await?;
    let json = json.into_inner();
    validate_expense(&group, &json)?;
    let mut expense = group
        .expense(&expense_id)
        .cloned()
        .ok_or_else(|| ApiError::ExpenseNotFound(expense_id.clone()))?;
    expense.apply_update(json);
    store.replace_expense(&group_id, expense.clone()).await?;
    tracing::info!(group_id = %group_id, expense_id = %expense_id, "expense updated");
    Ok(HttpResponse::Ok().json(expense))
}

#[patch("/groups/{group_id}/expenses/{expense_id}/shares/{member_id}")]
async fn update_share(
    store: Store,
    path: web::Path<(String, String, MemberId)>,
    json: web::Json<ShareUpdate>,
) -> Result<HttpResponse> {
    let (group_id, expense_id, member_id) = path.into_inner();
    let group = store.get_group(&group_id).await?;
    let mut expense = group
        .expense(&expense_id)
        .cloned()
        .ok_or_else(|| ApiError::ExpenseNotFound(expense_id.clone()))?;
    if !expense.set_share_paid(member_id, json.is_paid) {
        return Err(ApiError::ShareNotFound(member_id));
    }
    store.replace_expense(&group_id, expense.clone()).await?;
    tracing::info!(
        group_id = %group_id,
        expense_id = %expense_id,
        member_id,
        paid = json.is_paid,
        "share updated"
    );
    Ok(HttpResponse::Ok().json(expense))
}

#[get("/groups/{group_id}/balance")]
async fn get_balance(store: Store, group_id: web::Path<String>) -> Result<HttpResponse> {
    let group = store.get_group(&group_id).await?;
    let debts: Vec<MemberDebt> = member_debts(&group.members, &group.expenses)
        .into_iter()
        .map(|debt| MemberDebt {
            amount: display_amount(debt.amount),
            ..debt
        })
        .collect();
    Ok(HttpResponse::Ok().json(debts))
}

#[get("/users/{user_id}/debt")]
async fn get_user_debt(store: Store, user_id: web::Path<String>) -> Result<HttpResponse> {
    let user_id = user_id.into_inner();
    let snapshot = Snapshot::from_groups(store.list_groups(Some(user_id.as_str())).await?);
    let debt = compute_user_debt_across_groups(
        &snapshot.expenses_by_group,
        &snapshot.members_by_group,
        &user_id,
    );
    Ok(HttpResponse::Ok().json(UserDebtJson {
        user_id,
        debt: display_amount(debt),
    }))
}

#[get("/users/{user_id}/expenses")]
async fn get_user_expenses(
    store: Store,
    user_id: web::Path<String>,
    query: web::Query<ExpensesQuery>,
) -> Result<HttpResponse> {
    let snapshot = Snapshot::from_groups(store.list_groups(Some(user_id.as_str())).await?);
    let partition =
        partition_user_expenses(&snapshot.expenses_by_group, &snapshot.members_by_group, &user_id);
    let summary = summarize_user_spending(&partition);
    let filtered = partition.filtered(query.status);

    let expenses = filtered
        .iter()
        .map(|entry| {
            let categories = snapshot
                .categories_by_group
                .get(&entry.expense.group_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            UserExpenseJson {
                expense: entry.expense.clone(),
                group_name: group_name(&snapshot.groups, &entry.expense.group_id),
                category_name: category_name(categories, entry.expense.category_id).to_string(),
                share_amount: display_amount(entry.amount),
                share_paid: entry.is_paid(),
            }
        })
        .collect();
    let categories = user_spending_by_category(filtered, &snapshot.categories_by_group)
        .into_iter()
        .map(|bucket| CategorySpending {
            total: display_amount(bucket.total),
            ..bucket
        })
        .collect();

    Ok(HttpResponse::Ok().json(UserExpensesJson {
        status: query.status,
        summary: SpendingSummary {
            total: display_amount(summary.total),
            paid: display_amount(summary.paid),
            unpaid: display_amount(summary.unpaid),
        },
        expenses,
        categories,
    }))
}

#[get("/users/{user_id}/dashboard")]
async fn get_dashboard(store: Store, user_id: web::Path<String>) -> Result<HttpResponse> {
    let snapshot = Snapshot::from_groups(store.list_groups(Some(user_id.as_str())).await?);
    let summary = dashboard_summary(
        &snapshot.expenses_by_group,
        &snapshot.members_by_group,
        &user_id,
    );
    Ok(HttpResponse::Ok().json(DashboardSummary {
        debt: display_amount(summary.debt),
        ..summary
    }))
}
