use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, Result},
    extract::{ValidJson, ValidQuery},
    state::AppState,
    transactions::{
        dto::{CreateTransactionRequest, DeletedResponse, SummaryView, TransactionList, TransactionView},
        filter::{Pagination, TransactionQuery},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/summary", get(summary))
        .route(
            "/transactions/:id",
            get(get_transaction).delete(delete_transaction),
        )
}

fn transaction_not_found() -> AppError {
    AppError::not_found("transaction not found")
}

/// Malformed ids cannot name an existing row.
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| transaction_not_found())
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(payload): ValidJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionView>)> {
    let new = payload.into_new(user.id)?;
    let created = state.transactions.create(new).await?;
    info!(transaction_id = %created.id, "transaction created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<TransactionQuery>,
) -> Result<Json<TransactionList>> {
    let (filter, page) = query.into_parts(user.id)?;
    let (items, total) = state.transactions.list(&filter, &page).await?;
    Ok(Json(TransactionList {
        data: items.into_iter().map(TransactionView::from).collect(),
        meta: Pagination::new(page.page, page.per_page, total),
    }))
}

#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<TransactionQuery>,
) -> Result<Json<SummaryView>> {
    let (filter, _) = query.into_parts(user.id)?;
    let summary = state.transactions.summary(&filter).await?;
    Ok(Json(summary.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TransactionView>> {
    let id = parse_id(&id)?;
    let tx = state
        .transactions
        .get_by_id(id, Some(user.id))
        .await?
        .ok_or_else(transaction_not_found)?;
    Ok(Json(tx.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let id = parse_id(&id)?;
    if !state.transactions.delete(id, Some(user.id)).await? {
        return Err(transaction_not_found());
    }
    info!(transaction_id = %id, "transaction deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}
