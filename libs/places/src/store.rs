//! Ownership store
//!
//! Keeps a place's `creator` and its owner's place-set in agreement and
//! allows only the creator to modify or remove a place.
//!
//! Create and delete each become one [`UnitOfWork`] spanning the place
//! document and the place-set entry. Units are committed on their own tokio
//! task, so a caller that goes away mid-request cannot leave a write
//! half-applied: the backend still commits or rolls back.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    error::{OwnershipError, OwnershipResult, Record, StoreError, StoreResult},
    ids::{PlaceId, UserId},
    models::{NewPlace, NewUser, Place, PlaceUpdate, User},
    unit_of_work::{Mutation, OwnershipBackend, UnitOfWork},
};

/// Ownership store over an injected backend handle
#[derive(Clone)]
pub struct OwnershipStore {
    backend: Arc<dyn OwnershipBackend>,
}

impl OwnershipStore {
    /// Create a new ownership store
    pub fn new(backend: Arc<dyn OwnershipBackend>) -> Self {
        Self { backend }
    }

    /// Persist a new place owned by `creator` and append it to the creator's
    /// place-set, atomically
    pub async fn create_place(&self, new_place: NewPlace, creator: UserId) -> OwnershipResult<Place> {
        info!("Creating place '{}' for user {}", new_place.title, creator);

        self.find_user(creator).await?;

        let now = Utc::now();
        let place = Place {
            id: PlaceId::new(),
            title: new_place.title,
            description: new_place.description,
            address: new_place.address,
            location: new_place.location,
            image: new_place.image,
            creator,
            created_at: now,
            updated_at: now,
        };

        let work = UnitOfWork::new()
            .then(Mutation::InsertPlace(place.clone()))
            .then(Mutation::LinkPlace {
                user: creator,
                place: place.id,
            });

        self.commit(work).await.map_err(|e| match e {
            // The creator was removed between lookup and commit.
            StoreError::Missing(Record::User) => OwnershipError::UserNotFound(creator),
            other => {
                error!("Creating place for user {} failed: {}", creator, other);
                OwnershipError::TransactionFailure(other)
            }
        })?;

        info!("Created place {} for user {}", place.id, creator);
        Ok(place)
    }

    /// Change the title and description of a place; only its creator may
    pub async fn update_place(
        &self,
        id: PlaceId,
        requester: UserId,
        update: PlaceUpdate,
    ) -> OwnershipResult<Place> {
        info!("Updating place {} on behalf of user {}", id, requester);

        let mut place = self.get_place(id).await?;
        authorize(&place, requester)?;

        let updated_at = Utc::now();
        let work = UnitOfWork::new().then(Mutation::UpdatePlace {
            id,
            title: update.title.clone(),
            description: update.description.clone(),
            updated_at,
        });

        self.commit(work).await.map_err(|e| match e {
            // A concurrent delete committed first.
            StoreError::Missing(Record::Place) => OwnershipError::NotFound(id),
            other => {
                error!("Updating place {} failed: {}", id, other);
                OwnershipError::PersistenceFailure(other)
            }
        })?;

        place.title = update.title;
        place.description = update.description;
        place.updated_at = updated_at;
        Ok(place)
    }

    /// Remove a place and its entry in the creator's place-set, atomically;
    /// only the creator may
    pub async fn delete_place(&self, id: PlaceId, requester: UserId) -> OwnershipResult<()> {
        info!("Deleting place {} on behalf of user {}", id, requester);

        let place = self.get_place(id).await?;
        authorize(&place, requester)?;

        let creator = self
            .backend
            .find_user(place.creator)
            .await
            .map_err(OwnershipError::PersistenceFailure)?;
        if creator.is_none() {
            error!("Place {} references missing creator {}", id, place.creator);
            return Err(OwnershipError::TransactionFailure(StoreError::Missing(
                Record::User,
            )));
        }

        let work = UnitOfWork::new()
            .then(Mutation::RemovePlace(id))
            .then(Mutation::UnlinkPlace {
                user: place.creator,
                place: id,
            });

        self.commit(work).await.map_err(|e| match e {
            // A concurrent delete committed first.
            StoreError::Missing(Record::Place) => OwnershipError::NotFound(id),
            other => {
                error!("Deleting place {} failed: {}", id, other);
                OwnershipError::TransactionFailure(other)
            }
        })?;

        info!("Deleted place {}", id);
        Ok(())
    }

    pub async fn get_place(&self, id: PlaceId) -> OwnershipResult<Place> {
        self.backend
            .find_place(id)
            .await
            .map_err(|e| {
                error!("Fetching place {} failed: {}", id, e);
                OwnershipError::PersistenceFailure(e)
            })?
            .ok_or(OwnershipError::NotFound(id))
    }

    /// Places created by `user`, oldest first; empty when there are none
    pub async fn list_places_by_user(&self, user: UserId) -> OwnershipResult<Vec<Place>> {
        self.backend.list_places_by_creator(user).await.map_err(|e| {
            error!("Fetching places of user {} failed: {}", user, e);
            OwnershipError::PersistenceFailure(e)
        })
    }

    /// Register a user with an empty place-set
    pub async fn register_user(&self, new_user: NewUser) -> OwnershipResult<User> {
        info!("Registering user {}", new_user.email);

        let user = User {
            id: UserId::new(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            image: new_user.image,
            places: Vec::new(),
            created_at: Utc::now(),
        };

        self.commit(UnitOfWork::new().then(Mutation::InsertUser(user.clone())))
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(Record::User) => {
                    warn!("Email {} is already registered", user.email);
                    OwnershipError::EmailTaken(user.email.clone())
                }
                other => {
                    error!("Registering user {} failed: {}", user.email, other);
                    OwnershipError::PersistenceFailure(other)
                }
            })?;

        Ok(user)
    }

    pub async fn find_user(&self, id: UserId) -> OwnershipResult<User> {
        self.backend
            .find_user(id)
            .await
            .map_err(|e| {
                error!("Fetching user {} failed: {}", id, e);
                OwnershipError::PersistenceFailure(e)
            })?
            .ok_or(OwnershipError::UserNotFound(id))
    }

    pub async fn find_user_by_email(&self, email: &str) -> OwnershipResult<Option<User>> {
        self.backend
            .find_user_by_email(email)
            .await
            .map_err(OwnershipError::PersistenceFailure)
    }

    pub async fn list_users(&self) -> OwnershipResult<Vec<User>> {
        self.backend
            .list_users()
            .await
            .map_err(OwnershipError::PersistenceFailure)
    }

    /// Run `work` on a detached task and wait for its outcome
    async fn commit(&self, work: UnitOfWork) -> StoreResult<()> {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { backend.commit(work).await })
            .await
            .map_err(|e| StoreError::Aborted(e.to_string()))?
    }
}

/// The single creator check used by update and delete
fn authorize(place: &Place, requester: UserId) -> OwnershipResult<()> {
    if place.is_created_by(requester) {
        Ok(())
    } else {
        warn!(
            "User {} attempted to modify place {} owned by {}",
            requester, place.id, place.creator
        );
        Err(OwnershipError::Unauthorized {
            place: place.id,
            requester,
        })
    }
}
