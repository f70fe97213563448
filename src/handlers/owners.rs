use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{parse_day, positive_id, DayRange, Owner, OwnerRequest};

#[derive(Debug, Deserialize)]
pub struct OwnersQuery {
    pub date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnersByDateQuery {
    pub date_created: String,
}

pub async fn create_owner(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<OwnerRequest>,
) -> ApiResult<StatusCode> {
    let new_owner = req.validate()?;
    let mut session = state.store.session().await?;
    let owner = session.insert_owner(&new_owner).await?;
    state.metrics.owners_created.inc();
    info!(owner_id = owner.id, "owner created");
    Ok(StatusCode::CREATED)
}

pub async fn list_owners(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OwnersQuery>,
) -> ApiResult<Json<Vec<Owner>>> {
    let created_on = match query.date_created.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(DayRange::of(parse_day(raw)?)),
        _ => None,
    };
    let mut session = state.store.session().await?;
    Ok(Json(session.list_owners(created_on).await?))
}

pub async fn list_owners_by_date(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OwnersByDateQuery>,
) -> ApiResult<Json<Vec<Owner>>> {
    let range = DayRange::of(parse_day(&query.date_created)?);
    let mut session = state.store.session().await?;
    Ok(Json(session.list_owners(Some(range)).await?))
}

pub async fn delete_owner(
    State(state): State<AppState>,
    ApiPath(owner_id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let owner_id = positive_id("owner_id", owner_id)?;
    let mut session = state.store.session().await?;
    if session.find_owner(owner_id).await?.is_none() {
        return Err(ApiError::not_found("Owner not found."));
    }
    let pets = session.count_pets_of_owner(owner_id).await?;
    if pets > 0 {
        return Err(ApiError::conflict(format!("Owner still has {} pet(s).", pets)));
    }
    if !session.delete_owner(owner_id).await? {
        return Err(ApiError::not_found("Owner not found."));
    }
    state.metrics.owners_deleted.inc();
    info!(owner_id, "owner deleted");
    Ok(StatusCode::NO_CONTENT)
}
