//! Persistence seam.
//!
//! Handlers never hold a pool or a global. They get a [`StoreSessionFactory`]
//! through `AppState`, open one [`StoreSession`] per request and drop it on
//! the way out, which hands the underlying connection back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult};
use crate::model::{DayRange, NewOwner, NewPet, Owner, Pet, PetChanges};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait StoreSessionFactory: Send + Sync {
    async fn session(&self) -> ApiResult<Box<dyn StoreSession>>;

    async fn ping(&self) -> ApiResult<()>;
}

#[async_trait]
pub trait StoreSession: Send {
    async fn insert_owner(&mut self, owner: &NewOwner) -> ApiResult<Owner>;
    async fn list_owners(&mut self, created_on: Option<DayRange>) -> ApiResult<Vec<Owner>>;
    async fn find_owner(&mut self, owner_id: i64) -> ApiResult<Option<Owner>>;
    /// Case-insensitive substring match on "first last".
    async fn find_owners_by_name(&mut self, fragment: &str) -> ApiResult<Vec<Owner>>;
    /// Fails with `Conflict` if pets still reference the owner.
    async fn delete_owner(&mut self, owner_id: i64) -> ApiResult<bool>;
    async fn count_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<i64>;

    async fn insert_pet(&mut self, pet: &NewPet) -> ApiResult<Pet>;
    async fn find_pet(&mut self, pet_id: i64) -> ApiResult<Option<Pet>>;
    /// Lowest id wins when names repeat.
    async fn find_pet_by_name(&mut self, name: &str) -> ApiResult<Option<Pet>>;
    async fn find_pet_of_owner(&mut self, pet_id: i64, owner_id: i64) -> ApiResult<Option<Pet>>;
    async fn list_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<Vec<Pet>>;
    async fn update_pet(&mut self, scope: &ScopedPet, changes: &PetChanges) -> ApiResult<()>;
    async fn delete_pet(&mut self, scope: &ScopedPet) -> ApiResult<()>;
}

/// Proof that a pet with `pet_id` is owned by `owner_id`. Only
/// [`authorize_pet_mutation`] hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedPet {
    pet_id: i64,
    owner_id: i64,
}

impl ScopedPet {
    pub fn pet_id(&self) -> i64 {
        self.pet_id
    }
    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

/// Shared gate for update and delete. A wrong owner looks exactly like a
/// missing pet.
pub async fn authorize_pet_mutation(
    session: &mut dyn StoreSession,
    pet_id: i64,
    owner_id: i64,
) -> ApiResult<ScopedPet> {
    match session.find_pet_of_owner(pet_id, owner_id).await? {
        Some(pet) => Ok(ScopedPet {
            pet_id: pet.id,
            owner_id: pet.owner_id,
        }),
        None => Err(ApiError::not_found("Pet not found.")),
    }
}

pub fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + 2);
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
