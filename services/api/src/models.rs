//! API models for request and response payloads

use places::{Place, PlaceId, User, UserId};
use serde::{Deserialize, Serialize};

/// Request for place creation; `image` is the URL returned by the blob store
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaceRequest {
    pub title: String,
    pub description: String,
    pub address: String,
    pub image: String,
}

/// Request for place update
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePlaceRequest {
    pub title: String,
    pub description: String,
}

/// Request for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: String,
}

/// Request for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceEnvelope {
    pub place: Place,
}

#[derive(Debug, Serialize)]
pub struct PlacesEnvelope {
    pub places: Vec<Place>,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: String,
    pub places: Vec<PlaceId>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
            places: user.places,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersEnvelope {
    pub users: Vec<UserResponse>,
}

/// Response for signup and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: UserId,
    pub email: String,
    pub token: String,
}
