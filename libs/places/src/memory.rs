//! In-memory backend
//!
//! Keeps both collections behind a single `RwLock`. A commit stages its
//! mutations on a copy of the collections while holding the write lock and
//! only swaps the copy in once every mutation applied, so readers never see
//! half of a unit of work.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    error::{Record, StoreError, StoreResult},
    ids::{PlaceId, UserId},
    models::{Place, User},
    unit_of_work::{Mutation, OwnershipBackend, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct Collections {
    users: HashMap<UserId, User>,
    places: HashMap<PlaceId, Place>,
}

impl Collections {
    fn apply(&mut self, mutation: &Mutation) -> StoreResult<()> {
        match mutation {
            Mutation::InsertUser(user) => {
                let email_taken = self
                    .users
                    .values()
                    .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
                if email_taken || self.users.contains_key(&user.id) {
                    return Err(StoreError::Duplicate(Record::User));
                }
                self.users.insert(user.id, user.clone());
            }
            Mutation::InsertPlace(place) => {
                if !self.users.contains_key(&place.creator) {
                    return Err(StoreError::Missing(Record::User));
                }
                if self.places.contains_key(&place.id) {
                    return Err(StoreError::Duplicate(Record::Place));
                }
                self.places.insert(place.id, place.clone());
            }
            Mutation::UpdatePlace {
                id,
                title,
                description,
                updated_at,
            } => {
                let place = self
                    .places
                    .get_mut(id)
                    .ok_or(StoreError::Missing(Record::Place))?;
                place.title = title.clone();
                place.description = description.clone();
                place.updated_at = *updated_at;
            }
            Mutation::RemovePlace(id) => {
                self.places
                    .remove(id)
                    .ok_or(StoreError::Missing(Record::Place))?;
            }
            Mutation::LinkPlace { user, place } => {
                if !self.places.contains_key(place) {
                    return Err(StoreError::Missing(Record::Place));
                }
                let owner = self
                    .users
                    .get_mut(user)
                    .ok_or(StoreError::Missing(Record::User))?;
                if !owner.places.contains(place) {
                    owner.places.push(*place);
                }
            }
            Mutation::UnlinkPlace { user, place } => {
                let owner = self
                    .users
                    .get_mut(user)
                    .ok_or(StoreError::Missing(Record::User))?;
                let before = owner.places.len();
                owner.places.retain(|linked| linked != place);
                if owner.places.len() == before {
                    return Err(StoreError::Missing(Record::Link));
                }
            }
        }
        Ok(())
    }
}

/// Backend holding everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<Collections>,
    fault: Mutex<Option<usize>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit to take the write lock fail right before applying
    /// mutation `step` (zero-based). Mutations before `step` are staged and
    /// then discarded.
    pub fn fail_commit_at(&self, step: usize) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(step);
    }

    fn take_fault(&self) -> Option<usize> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl OwnershipBackend for InMemoryBackend {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn find_place(&self, id: PlaceId) -> StoreResult<Option<Place>> {
        Ok(self.state.read().await.places.get(&id).cloned())
    }

    async fn list_places_by_creator(&self, creator: UserId) -> StoreResult<Vec<Place>> {
        let state = self.state.read().await;
        let mut places: Vec<Place> = state
            .places
            .values()
            .filter(|place| place.creator == creator)
            .cloned()
            .collect();
        places.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(places)
    }

    async fn commit(&self, work: UnitOfWork) -> StoreResult<()> {
        let mut state = self.state.write().await;
        // Taken under the write lock so it hits the unit that holds the lock.
        let fault = self.take_fault();
        let mut staged = state.clone();

        for (step, mutation) in work.mutations().iter().enumerate() {
            if fault == Some(step) {
                warn!("Injected fault before mutation {} of {}", step, work.len());
                return Err(StoreError::Backend(format!(
                    "injected fault before mutation {}",
                    step
                )));
            }
            staged.apply(mutation)?;
        }

        *state = staged;
        debug!("Committed unit of work with {} mutations", work.len());
        Ok(())
    }
}
