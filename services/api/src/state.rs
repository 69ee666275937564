//! Application state shared across handlers

use places::OwnershipStore;
use std::sync::Arc;

use crate::{geocoding::Geocoder, jwt::JwtService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: OwnershipStore,
    pub jwt_service: JwtService,
    pub geocoder: Arc<dyn Geocoder>,
}
