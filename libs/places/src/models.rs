//! User and place entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PlaceId, UserId};

/// Geocoded position of a place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// User entity
///
/// `places` is the owned place-set, in the order the places were created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
    pub places: Vec<PlaceId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn owns(&self, place: PlaceId) -> bool {
        self.places.contains(&place)
    }
}

/// Place entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: Coordinates,
    pub image: String,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    /// True when `requester` is the user allowed to mutate this place
    pub fn is_created_by(&self, requester: UserId) -> bool {
        self.creator == requester
    }
}

/// Candidate place, fully populated by the caller (geocoding and image
/// upload already done)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlace {
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: Coordinates,
    pub image: String,
}

/// The only fields of a place that may change after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceUpdate {
    pub title: String,
    pub description: String,
}

/// New user registration payload; the password is already hashed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
}
