//! Ownership core for the places backend
//!
//! Users own places. A place's `creator` and the owning user's place-set must
//! always agree, so every write that touches both goes through a
//! [`UnitOfWork`](unit_of_work::UnitOfWork) that a backend applies
//! all-or-nothing. [`OwnershipStore`](store::OwnershipStore) builds those
//! units and enforces that only a place's creator may change or remove it.

pub mod error;
pub mod ids;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod unit_of_work;

pub use error::{OwnershipError, OwnershipResult, Record, StoreError, StoreResult};
pub use ids::{IdParseError, PlaceId, UserId};
pub use memory::InMemoryBackend;
pub use models::{Coordinates, NewPlace, NewUser, Place, PlaceUpdate, User};
pub use postgres::{PgBackend, TransactionConfig};
pub use store::OwnershipStore;
pub use unit_of_work::{Mutation, OwnershipBackend, UnitOfWork};
