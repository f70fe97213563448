use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ScopedPet, StoreSession, StoreSessionFactory};
use crate::error::{ApiError, ApiResult};
use crate::model::{DayRange, NewOwner, NewPet, Owner, Pet, PetChanges};

#[derive(Debug, Default)]
struct Tables {
    owners: BTreeMap<i64, Owner>,
    pets: BTreeMap<i64, Pet>,
    next_owner_id: i64,
    next_pet_id: i64,
}

/// Process-local store with the same contract as [`super::PgStore`].
/// A session holds the table lock for its whole lifetime.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates the database going away: new sessions and pings fail.
    pub fn set_available(&self, up: bool) {
        self.available.store(up, Ordering::SeqCst);
    }

    fn check_available(&self) -> ApiResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::store("memory store unavailable"))
        }
    }
}

#[async_trait]
impl StoreSessionFactory for MemoryStore {
    async fn session(&self) -> ApiResult<Box<dyn StoreSession>> {
        self.check_available()?;
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemorySession { tables: guard }))
    }

    async fn ping(&self) -> ApiResult<()> {
        self.check_available()
    }
}

pub struct MemorySession {
    tables: OwnedMutexGuard<Tables>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn insert_owner(&mut self, owner: &NewOwner) -> ApiResult<Owner> {
        self.tables.next_owner_id += 1;
        let row = Owner {
            id: self.tables.next_owner_id,
            first_name: owner.first_name.clone(),
            last_name: owner.last_name.clone(),
            date_created: owner.now,
            date_modified: owner.now,
        };
        self.tables.owners.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_owners(&mut self, created_on: Option<DayRange>) -> ApiResult<Vec<Owner>> {
        Ok(self
            .tables
            .owners
            .values()
            .filter(|o| created_on.map_or(true, |r| r.contains(&o.date_created)))
            .cloned()
            .collect())
    }

    async fn find_owner(&mut self, owner_id: i64) -> ApiResult<Option<Owner>> {
        Ok(self.tables.owners.get(&owner_id).cloned())
    }

    async fn find_owners_by_name(&mut self, fragment: &str) -> ApiResult<Vec<Owner>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .tables
            .owners
            .values()
            .filter(|o| o.full_name().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn delete_owner(&mut self, owner_id: i64) -> ApiResult<bool> {
        if self.tables.pets.values().any(|p| p.owner_id == owner_id) {
            return Err(ApiError::conflict("Owner still has pets."));
        }
        Ok(self.tables.owners.remove(&owner_id).is_some())
    }

    async fn count_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<i64> {
        Ok(self.tables.pets.values().filter(|p| p.owner_id == owner_id).count() as i64)
    }

    async fn insert_pet(&mut self, pet: &NewPet) -> ApiResult<Pet> {
        if !self.tables.owners.contains_key(&pet.owner_id) {
            return Err(ApiError::not_found("Owner not exist."));
        }
        self.tables.next_pet_id += 1;
        let row = Pet {
            id: self.tables.next_pet_id,
            name: pet.name.clone(),
            breed: pet.breed.clone(),
            date_created: pet.now,
            date_modified: pet.now,
            owner_id: pet.owner_id,
        };
        self.tables.pets.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_pet(&mut self, pet_id: i64) -> ApiResult<Option<Pet>> {
        Ok(self.tables.pets.get(&pet_id).cloned())
    }

    async fn find_pet_by_name(&mut self, name: &str) -> ApiResult<Option<Pet>> {
        Ok(self.tables.pets.values().find(|p| p.name == name).cloned())
    }

    async fn find_pet_of_owner(&mut self, pet_id: i64, owner_id: i64) -> ApiResult<Option<Pet>> {
        Ok(self
            .tables
            .pets
            .get(&pet_id)
            .filter(|p| p.owner_id == owner_id)
            .cloned())
    }

    async fn list_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<Vec<Pet>> {
        Ok(self
            .tables
            .pets
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_pet(&mut self, scope: &ScopedPet, changes: &PetChanges) -> ApiResult<()> {
        match self.tables.pets.get_mut(&scope.pet_id()) {
            Some(pet) if pet.owner_id == scope.owner_id() => {
                pet.name = changes.name.clone();
                pet.breed = changes.breed.clone();
                pet.date_modified = changes.now;
                Ok(())
            }
            _ => Err(ApiError::not_found("Pet not found.")),
        }
    }

    async fn delete_pet(&mut self, scope: &ScopedPet) -> ApiResult<()> {
        let owned = self
            .tables
            .pets
            .get(&scope.pet_id())
            .is_some_and(|p| p.owner_id == scope.owner_id());
        if !owned {
            return Err(ApiError::not_found("Pet not found."));
        }
        self.tables.pets.remove(&scope.pet_id());
        Ok(())
    }
}
