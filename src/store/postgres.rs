use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

use super::{escape_like, ScopedPet, StoreSession, StoreSessionFactory};
use crate::error::{is_foreign_key_violation, ApiError, ApiResult};
use crate::model::{DayRange, NewOwner, NewPet, Owner, Pet, PetChanges};

const OWNER_COLUMNS: &str = "id, first_name, last_name, date_created, date_modified";
const PET_COLUMNS: &str = "id, name, breed, date_created, date_modified, owner_id";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS owners (
        id BIGSERIAL PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        date_created TIMESTAMP NOT NULL,
        date_modified TIMESTAMP NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pets (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        breed TEXT NOT NULL,
        date_created TIMESTAMP NOT NULL,
        date_modified TIMESTAMP NOT NULL,
        owner_id BIGINT NOT NULL REFERENCES owners(id)
    )",
    "CREATE INDEX IF NOT EXISTS pets_owner_id_idx ON pets (owner_id)",
];

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the owners/pets tables when missing. Runs once at startup.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StoreSessionFactory for PgStore {
    async fn session(&self) -> ApiResult<Box<dyn StoreSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }

    async fn ping(&self) -> ApiResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Holds one pooled connection; dropping it returns the connection.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn insert_owner(&mut self, owner: &NewOwner) -> ApiResult<Owner> {
        let sql = format!(
            "INSERT INTO owners (first_name, last_name, date_created, date_modified) \
             VALUES ($1, $2, $3, $3) RETURNING {}",
            OWNER_COLUMNS
        );
        let row = sqlx::query_as::<_, Owner>(&sql)
            .bind(&owner.first_name)
            .bind(&owner.last_name)
            .bind(owner.now)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(row)
    }

    async fn list_owners(&mut self, created_on: Option<DayRange>) -> ApiResult<Vec<Owner>> {
        let rows = match created_on {
            Some(range) => {
                let sql = format!(
                    "SELECT {} FROM owners WHERE date_created >= $1 AND date_created <= $2 ORDER BY id",
                    OWNER_COLUMNS
                );
                sqlx::query_as::<_, Owner>(&sql)
                    .bind(range.start)
                    .bind(range.end)
                    .fetch_all(&mut *self.conn)
                    .await?
            }
            None => {
                let sql = format!("SELECT {} FROM owners ORDER BY id", OWNER_COLUMNS);
                sqlx::query_as::<_, Owner>(&sql)
                    .fetch_all(&mut *self.conn)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn find_owner(&mut self, owner_id: i64) -> ApiResult<Option<Owner>> {
        let sql = format!("SELECT {} FROM owners WHERE id = $1", OWNER_COLUMNS);
        let row = sqlx::query_as::<_, Owner>(&sql)
            .bind(owner_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    async fn find_owners_by_name(&mut self, fragment: &str) -> ApiResult<Vec<Owner>> {
        let sql = format!(
            r"SELECT {} FROM owners WHERE (first_name || ' ' || last_name) ILIKE $1 ESCAPE '\' ORDER BY id",
            OWNER_COLUMNS
        );
        let pattern = format!("%{}%", escape_like(fragment));
        let rows = sqlx::query_as::<_, Owner>(&sql)
            .bind(pattern)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn delete_owner(&mut self, owner_id: i64) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM owners WHERE id = $1")
            .bind(owner_id)
            .execute(&mut *self.conn)
            .await;
        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(ApiError::conflict("Owner still has pets."))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pets WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    async fn insert_pet(&mut self, pet: &NewPet) -> ApiResult<Pet> {
        let sql = format!(
            "INSERT INTO pets (name, breed, date_created, date_modified, owner_id) \
             VALUES ($1, $2, $3, $3, $4) RETURNING {}",
            PET_COLUMNS
        );
        let result = sqlx::query_as::<_, Pet>(&sql)
            .bind(&pet.name)
            .bind(&pet.breed)
            .bind(pet.now)
            .bind(pet.owner_id)
            .fetch_one(&mut *self.conn)
            .await;
        match result {
            Ok(row) => Ok(row),
            Err(e) if is_foreign_key_violation(&e) => Err(ApiError::not_found("Owner not exist.")),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_pet(&mut self, pet_id: i64) -> ApiResult<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE id = $1", PET_COLUMNS);
        let row = sqlx::query_as::<_, Pet>(&sql)
            .bind(pet_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    async fn find_pet_by_name(&mut self, name: &str) -> ApiResult<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE name = $1 ORDER BY id LIMIT 1", PET_COLUMNS);
        let row = sqlx::query_as::<_, Pet>(&sql)
            .bind(name)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    async fn find_pet_of_owner(&mut self, pet_id: i64, owner_id: i64) -> ApiResult<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE id = $1 AND owner_id = $2", PET_COLUMNS);
        let row = sqlx::query_as::<_, Pet>(&sql)
            .bind(pet_id)
            .bind(owner_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    async fn list_pets_of_owner(&mut self, owner_id: i64) -> ApiResult<Vec<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE owner_id = $1 ORDER BY id", PET_COLUMNS);
        let rows = sqlx::query_as::<_, Pet>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn update_pet(&mut self, scope: &ScopedPet, changes: &PetChanges) -> ApiResult<()> {
        let done = sqlx::query(
            "UPDATE pets SET name = $1, breed = $2, date_modified = $3 WHERE id = $4 AND owner_id = $5",
        )
        .bind(&changes.name)
        .bind(&changes.breed)
        .bind(changes.now)
        .bind(scope.pet_id())
        .bind(scope.owner_id())
        .execute(&mut *self.conn)
        .await?;
        if done.rows_affected() == 0 {
            return Err(ApiError::not_found("Pet not found."));
        }
        Ok(())
    }

    async fn delete_pet(&mut self, scope: &ScopedPet) -> ApiResult<()> {
        let done = sqlx::query("DELETE FROM pets WHERE id = $1 AND owner_id = $2")
            .bind(scope.pet_id())
            .bind(scope.owner_id())
            .execute(&mut *self.conn)
            .await?;
        if done.rows_affected() == 0 {
            return Err(ApiError::not_found("Pet not found."));
        }
        Ok(())
    }
}
