//! PostgreSQL backend
//!
//! Users, places and the user place-set live in three tables. Every unit of
//! work runs in one `SERIALIZABLE` transaction; serialization failures and
//! deadlocks are retried a bounded number of times, and each attempt is
//! bounded in time. Dropping an attempt rolls its transaction back.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{Record, StoreError, StoreResult},
    ids::{PlaceId, UserId},
    models::{Coordinates, Place, User},
    unit_of_work::{Mutation, OwnershipBackend, UnitOfWork},
};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Retry and timeout bounds for a unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionConfig {
    /// Attempts before a conflicting transaction is reported as failed
    pub max_attempts: u32,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl TransactionConfig {
    /// Create a new TransactionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TRANSACTION_MAX_ATTEMPTS`: attempts on serialization conflicts (default: 3, minimum 1)
    /// - `TRANSACTION_TIMEOUT_SECS`: timeout of one attempt in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts = std::env::var("TRANSACTION_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_attempts)
            .max(1);

        let attempt_timeout = std::env::var("TRANSACTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.attempt_timeout);

        Self {
            max_attempts,
            attempt_timeout,
        }
    }
}

/// Backend storing users and places in PostgreSQL
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    config: TransactionConfig,
}

impl PgBackend {
    pub fn new(pool: PgPool, config: TransactionConfig) -> Self {
        Self { pool, config }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        info!("Running ownership schema migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    async fn attempt(&self, work: &UnitOfWork) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(transaction_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(transaction_error)?;

        for mutation in work.mutations() {
            apply(&mut tx, mutation).await?;
        }

        // Deferred place-set foreign keys are checked here.
        tx.commit()
            .await
            .map_err(|e| classify(e, Record::Link, Record::Place))
    }

    async fn load_places_of(&self, user: Uuid) -> StoreResult<Vec<PlaceId>> {
        let rows = sqlx::query(
            r#"
            SELECT place_id
            FROM user_places
            WHERE user_id = $1
            ORDER BY position
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(rows
            .into_iter()
            .map(|row| PlaceId::from(row.get::<Uuid, _>("place_id")))
            .collect())
    }
}

#[async_trait]
impl OwnershipBackend for PgBackend {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, image, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(row) => {
                let places = self.load_places_of(id.as_uuid()).await?;
                Ok(Some(user_from_row(&row, places)))
            }
            None => Ok(None),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, image, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(row) => {
                let places = self.load_places_of(row.get("id")).await?;
                Ok(Some(user_from_row(&row, places)))
            }
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, image, created_at
            FROM users
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        let link_rows = sqlx::query(
            r#"
            SELECT user_id, place_id
            FROM user_places
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        let mut links: HashMap<Uuid, Vec<PlaceId>> = HashMap::new();
        for row in link_rows {
            links
                .entry(row.get("user_id"))
                .or_default()
                .push(PlaceId::from(row.get::<Uuid, _>("place_id")));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let places = links.remove(&row.get::<Uuid, _>("id")).unwrap_or_default();
                user_from_row(row, places)
            })
            .collect())
    }

    async fn find_place(&self, id: PlaceId) -> StoreResult<Option<Place>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, address, lat, lng, image, creator_id,
                   created_at, updated_at
            FROM places
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(row.as_ref().map(place_from_row))
    }

    async fn list_places_by_creator(&self, creator: UserId) -> StoreResult<Vec<Place>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, address, lat, lng, image, creator_id,
                   created_at, updated_at
            FROM places
            WHERE creator_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(creator.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(rows.iter().map(place_from_row).collect())
    }

    async fn commit(&self, work: UnitOfWork) -> StoreResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(self.config.attempt_timeout, self.attempt(&work)).await;

            match outcome {
                Ok(Ok(())) => {
                    debug!(
                        "Committed unit of work with {} mutations on attempt {}",
                        work.len(),
                        attempt
                    );
                    return Ok(());
                }
                Ok(Err(StoreError::Conflict(reason))) if attempt < self.config.max_attempts => {
                    warn!(
                        "Transaction conflict on attempt {}/{}: {}",
                        attempt, self.config.max_attempts, reason
                    );
                    tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    error!(
                        "Transaction attempt {} timed out after {:?}",
                        attempt, self.config.attempt_timeout
                    );
                    return Err(StoreError::Timeout(self.config.attempt_timeout));
                }
            }
        }
    }
}

async fn apply(tx: &mut Transaction<'static, Postgres>, mutation: &Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::InsertUser(user) => {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, password_hash, image, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.image)
            .bind(user.created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, Record::User, Record::User))?;
        }
        Mutation::InsertPlace(place) => {
            sqlx::query(
                r#"
                INSERT INTO places (id, title, description, address, lat, lng, image,
                                    creator_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(place.id.as_uuid())
            .bind(&place.title)
            .bind(&place.description)
            .bind(&place.address)
            .bind(place.location.lat)
            .bind(place.location.lng)
            .bind(&place.image)
            .bind(place.creator.as_uuid())
            .bind(place.created_at)
            .bind(place.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, Record::Place, Record::User))?;
        }
        Mutation::UpdatePlace {
            id,
            title,
            description,
            updated_at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE places
                SET title = $2, description = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(id.as_uuid())
            .bind(title)
            .bind(description)
            .bind(updated_at)
            .execute(&mut **tx)
            .await
            .map_err(transaction_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Missing(Record::Place));
            }
        }
        Mutation::RemovePlace(id) => {
            // The deferred place-set FK only fires at commit.
            let result = sqlx::query("DELETE FROM places WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(transaction_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Missing(Record::Place));
            }
        }
        Mutation::LinkPlace { user, place } => {
            sqlx::query(
                r#"
                INSERT INTO user_places (user_id, place_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, place_id) DO NOTHING
                "#,
            )
            .bind(user.as_uuid())
            .bind(place.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, Record::Link, Record::User))?;
        }
        Mutation::UnlinkPlace { user, place } => {
            let result =
                sqlx::query("DELETE FROM user_places WHERE user_id = $1 AND place_id = $2")
                    .bind(user.as_uuid())
                    .bind(place.as_uuid())
                    .execute(&mut **tx)
                    .await
                    .map_err(transaction_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Missing(Record::Link));
            }
        }
    }
    Ok(())
}

/// Map a sqlx error to a store error. `on_unique` names the record a unique
/// violation refers to, `on_foreign_key` the record a dangling reference does.
fn classify(err: sqlx::Error, on_unique: Record, on_foreign_key: Record) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Duplicate(on_unique),
            Some(FOREIGN_KEY_VIOLATION) => return StoreError::Missing(on_foreign_key),
            _ => {}
        }
    }
    transaction_error(err)
}

/// Map an error raised inside a transaction: serialization failures and
/// deadlocks are retryable conflicts, everything else a backend fault.
fn transaction_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) = db.code().as_deref() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    backend_error(err)
}

fn backend_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn user_from_row(row: &PgRow, places: Vec<PlaceId>) -> User {
    User {
        id: UserId::from(row.get::<Uuid, _>("id")),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        image: row.get("image"),
        places,
        created_at: row.get("created_at"),
    }
}

fn place_from_row(row: &PgRow) -> Place {
    Place {
        id: PlaceId::from(row.get::<Uuid, _>("id")),
        title: row.get("title"),
        description: row.get("description"),
        address: row.get("address"),
        location: Coordinates {
            lat: row.get("lat"),
            lng: row.get("lng"),
        },
        image: row.get("image"),
        creator: UserId::from(row.get::<Uuid, _>("creator_id")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
