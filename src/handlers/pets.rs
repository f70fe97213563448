use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{debug, info};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{positive_id, Owner, Pet, PetRequest};
use crate::observability::pii::mask_pii;
use crate::store::{authorize_pet_mutation, StoreSession};

#[derive(Debug, Deserialize)]
pub struct PetNameQuery {
    pub pet_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerNameQuery {
    pub owner_name: String,
}

pub async fn create_pet(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PetRequest>,
) -> ApiResult<StatusCode> {
    let new_pet = req.validate()?;
    let mut session = state.store.session().await?;
    if session.find_owner(new_pet.owner_id).await?.is_none() {
        return Err(ApiError::not_found("Owner not exist."));
    }
    let pet = session.insert_pet(&new_pet).await?;
    state.metrics.pets_created.inc();
    info!(pet_id = pet.id, owner_id = pet.owner_id, "pet created");
    Ok(StatusCode::CREATED)
}

pub async fn owner_of_pet(
    State(state): State<AppState>,
    ApiPath(pet_id): ApiPath<i64>,
) -> ApiResult<Json<Owner>> {
    let pet_id = positive_id("pet_id", pet_id)?;
    let mut session = state.store.session().await?;
    let pet = session
        .find_pet(pet_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Pet not found."))?;
    owner_for(&mut *session, &pet).await.map(Json)
}

pub async fn owner_of_pet_by_name(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PetNameQuery>,
) -> ApiResult<Json<Owner>> {
    debug!(pet_name = %mask_pii(&query.pet_name), "owner lookup by pet name");
    let mut session = state.store.session().await?;
    let pet = session
        .find_pet_by_name(&query.pet_name)
        .await?
        .ok_or_else(|| ApiError::not_found("Pet not found."))?;
    owner_for(&mut *session, &pet).await.map(Json)
}

pub async fn list_pets_by_owner_id(
    State(state): State<AppState>,
    ApiPath(owner_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Pet>>> {
    let owner_id = positive_id("owner_id", owner_id)?;
    let mut session = state.store.session().await?;
    if session.find_owner(owner_id).await?.is_none() {
        return Err(ApiError::not_found("Owner not found."));
    }
    Ok(Json(session.list_pets_of_owner(owner_id).await?))
}

pub async fn list_pets_by_owner_name(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OwnerNameQuery>,
) -> ApiResult<Json<Vec<Pet>>> {
    let mut session = state.store.session().await?;
    let owners = session.find_owners_by_name(&query.owner_name).await?;
    if owners.is_empty() {
        return Err(ApiError::not_found("Owner not found."));
    }
    debug!(
        owner_name = %mask_pii(&query.owner_name),
        matches = owners.len(),
        "owners matched by name"
    );
    let mut pets = Vec::new();
    for owner in &owners {
        pets.extend(session.list_pets_of_owner(owner.id).await?);
    }
    Ok(Json(pets))
}

pub async fn update_pet(
    State(state): State<AppState>,
    ApiPath(pet_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PetRequest>,
) -> ApiResult<StatusCode> {
    let pet_id = positive_id("pet_id", pet_id)?;
    let requested = req.validate()?;
    let owner_id = requested.owner_id;
    let mut session = state.store.session().await?;
    let scope = authorize_pet_mutation(&mut *session, pet_id, owner_id).await?;
    session.update_pet(&scope, &requested.into_changes()).await?;
    state.metrics.pets_updated.inc();
    info!(pet_id, owner_id, "pet updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_pet(
    State(state): State<AppState>,
    ApiPath((pet_id, owner_id)): ApiPath<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let pet_id = positive_id("pet_id", pet_id)?;
    let owner_id = positive_id("owner_id", owner_id)?;
    let mut session = state.store.session().await?;
    let scope = authorize_pet_mutation(&mut *session, pet_id, owner_id).await?;
    session.delete_pet(&scope).await?;
    state.metrics.pets_deleted.inc();
    info!(pet_id, owner_id, "pet deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The foreign key guarantees the owner row; a miss means the store is
/// inconsistent, not that the caller asked for something absent.
async fn owner_for(session: &mut dyn StoreSession, pet: &Pet) -> ApiResult<Owner> {
    session
        .find_owner(pet.owner_id)
        .await?
        .ok_or_else(|| ApiError::store(format!("pet {} references missing owner {}", pet.id, pet.owner_id)))
}
