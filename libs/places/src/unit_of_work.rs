//! Unit of work and the storage port
//!
//! A [`UnitOfWork`] is an ordered list of [`Mutation`]s. Backends apply the
//! whole list inside one transaction: either every mutation lands or none
//! does. Place-set changes are expressed as deltas (`LinkPlace` /
//! `UnlinkPlace`), never as a rewrite of the whole set, so two concurrent
//! units touching the same user cannot lose each other's append.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreResult,
    ids::{PlaceId, UserId},
    models::{Place, User},
};

/// One write inside a unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a user; fails with `Duplicate(User)` if the id or email is taken
    InsertUser(User),
    /// Insert a place; fails with `Missing(User)` if the creator is unknown
    InsertPlace(Place),
    /// Overwrite the mutable fields of a place
    UpdatePlace {
        id: PlaceId,
        title: String,
        description: String,
        updated_at: DateTime<Utc>,
    },
    /// Remove a place document
    RemovePlace(PlaceId),
    /// Append `place` to `user`'s place-set; a no-op if already present
    LinkPlace { user: UserId, place: PlaceId },
    /// Remove `place` from `user`'s place-set; fails with `Missing(Link)` if absent
    UnlinkPlace { user: UserId, place: PlaceId },
}

/// Ordered mutations applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    mutations: Vec<Mutation>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Storage port consumed by the ownership store
///
/// Reads return `Ok(None)` / empty vectors for absent records and reserve
/// errors for storage faults.
#[async_trait]
pub trait OwnershipBackend: Send + Sync + 'static {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn find_place(&self, id: PlaceId) -> StoreResult<Option<Place>>;

    async fn list_places_by_creator(&self, creator: UserId) -> StoreResult<Vec<Place>>;

    /// Apply every mutation of `work` atomically
    async fn commit(&self, work: UnitOfWork) -> StoreResult<()>;
}
