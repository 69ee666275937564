//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use places::{NewPlace, PlaceId, PlaceUpdate, UserId};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        AuthResponse, CreatePlaceRequest, LoginRequest, PlaceEnvelope, PlacesEnvelope,
        SignupRequest, UpdatePlaceRequest, UserResponse, UsersEnvelope,
    },
    password::{hash_password, verify_password},
    state::AppState,
    validation::{normalize_email, validate_create_place, validate_signup, validate_update_place},
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/places", post(create_place).route_layer(auth.clone()))
        .route(
            "/api/places/:pid",
            get(get_place_by_id).merge(
                patch(update_place)
                    .delete(delete_place)
                    .route_layer(auth),
            ),
        )
        .route("/api/places/user/:uid", get(get_places_by_user_id))
        .route("/api/users", get(get_users))
        .route("/api/users/signup", post(signup))
        .route("/api/users/login", post(login))
        .fallback(route_not_found)
        .with_state(state)
}

fn parse_place_id(raw: &str) -> ApiResult<PlaceId> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Could not find a place for the provided id.".to_string()))
}

fn invalid_credentials() -> ApiError {
    ApiError::Forbidden("Invalid credentials, could not log you in.".to_string())
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "places-api"
    }))
}

pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Could not find this route.".to_string())
}

/// Get a place by ID
pub async fn get_place_by_id(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<Json<PlaceEnvelope>> {
    let id = parse_place_id(&pid)?;
    let place = state.store.get_place(id).await?;

    Ok(Json(PlaceEnvelope { place }))
}

/// Get all places created by a user
pub async fn get_places_by_user_id(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<PlacesEnvelope>> {
    let user_id: UserId = uid
        .parse()
        .map_err(|_| ApiError::NotFound("Could not find user for provided id.".to_string()))?;
    let places = state.store.list_places_by_user(user_id).await?;

    Ok(Json(PlacesEnvelope { places }))
}

/// Create a place owned by the authenticated user
pub async fn create_place(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePlaceRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Err(reason) = validate_create_place(&payload) {
        warn!("Rejected place creation by {}: {}", user.id, reason);
        return Err(ApiError::invalid_input());
    }

    info!("User {} ({}) is creating a place", user.id, user.email);
    let location = state.geocoder.coordinates_for(&payload.address).await?;

    let place = state
        .store
        .create_place(
            NewPlace {
                title: payload.title,
                description: payload.description,
                address: payload.address,
                location,
                image: payload.image,
            },
            user.id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PlaceEnvelope { place })))
}

/// Update title and description of a place
pub async fn update_place(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(pid): Path<String>,
    Json(payload): Json<UpdatePlaceRequest>,
) -> ApiResult<Json<PlaceEnvelope>> {
    if let Err(reason) = validate_update_place(&payload) {
        warn!("Rejected update of place {} by {}: {}", pid, user.id, reason);
        return Err(ApiError::invalid_input());
    }

    let id = parse_place_id(&pid)?;
    let place = state
        .store
        .update_place(
            id,
            user.id,
            PlaceUpdate {
                title: payload.title,
                description: payload.description,
            },
        )
        .await?;

    Ok(Json(PlaceEnvelope { place }))
}

/// Delete a place
pub async fn delete_place(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(pid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_place_id(&pid)?;
    state.store.delete_place(id, user.id).await?;

    Ok(Json(json!({ "message": "Deleted place." })))
}

/// Get all users
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Json<UsersEnvelope>> {
    let users = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(UsersEnvelope { users }))
}

/// Register a new user and log them in
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Err(reason) = validate_signup(&payload) {
        warn!("Rejected signup: {}", reason);
        return Err(ApiError::invalid_input());
    }

    let email = normalize_email(&payload.email);
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::UnprocessableEntity(
            "User exists already, please login instead.".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::InternalServerError("Signing up failed, please try again later.".to_string())
    })?;

    let user = state
        .store
        .register_user(places::NewUser {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            image: payload.image,
        })
        .await?;

    let token = state
        .jwt_service
        .generate_token(user.id, &user.email)
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            ApiError::InternalServerError("Signing up failed, please try again later.".to_string())
        })?;

    info!("User {} signed up", user.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            email: user.email,
            token,
        }),
    ))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);
    info!("Login attempt for user: {}", email);

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let valid = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!("Failed to verify password of {}: {}", user.id, e);
        ApiError::InternalServerError("Logging in failed, please try again later.".to_string())
    })?;
    if !valid {
        return Err(invalid_credentials());
    }

    let token = state
        .jwt_service
        .generate_token(user.id, &user.email)
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            ApiError::InternalServerError("Logging in failed, please try again later.".to_string())
        })?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use places::{Coordinates, InMemoryBackend, NewUser, OwnershipStore, User};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{
        geocoding::{GeocodeError, Geocoder},
        jwt::{JwtConfig, JwtService},
    };

    const EMPIRE_STATE: Coordinates = Coordinates {
        lat: 40.7484405,
        lng: -73.9878584,
    };

    struct FixedGeocoder(Option<Coordinates>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn coordinates_for(&self, _address: &str) -> Result<Coordinates, GeocodeError> {
            self.0.ok_or(GeocodeError::NoResults)
        }
    }

    fn test_state(location: Option<Coordinates>) -> AppState {
        AppState {
            store: OwnershipStore::new(Arc::new(InMemoryBackend::new())),
            jwt_service: JwtService::new(JwtConfig {
                secret: "test-secret".to_string(),
                expiry: 3600,
            }),
            geocoder: Arc::new(FixedGeocoder(location)),
        }
    }

    async fn seed_user(state: &AppState, name: &str) -> (User, String) {
        let user = state
            .store
            .register_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "unused".to_string(),
                image: "https://images.example.com/user.png".to_string(),
            })
            .await
            .unwrap();
        let token = state.jwt_service.generate_token(user.id, &user.email).unwrap();
        (user, token)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn place_body() -> Value {
        json!({
            "title": "Empire State Building",
            "description": "One of the most famous sky scrapers in the world!",
            "address": "20 W 34th St, New York, NY 10001",
            "image": "https://images.example.com/esb.png"
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state(Some(EMPIRE_STATE)));

        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_router(test_state(Some(EMPIRE_STATE)));

        let (status, body) = send(&app, "GET", "/api/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Could not find this route.");
    }

    #[tokio::test]
    async fn test_create_place_requires_token() {
        let app = create_router(test_state(Some(EMPIRE_STATE)));

        let (status, body) = send(&app, "POST", "/api/places", None, Some(place_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication failed!");

        let (status, _) =
            send(&app, "POST", "/api/places", Some("forged"), Some(place_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_place_lifecycle_over_http() {
        let state = test_state(Some(EMPIRE_STATE));
        let (owner, token) = seed_user(&state, "Max").await;
        let app = create_router(state.clone());

        let (status, body) =
            send(&app, "POST", "/api/places", Some(&token), Some(place_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["place"]["creator"], owner.id.to_string());
        assert_eq!(body["place"]["location"]["lat"], EMPIRE_STATE.lat);
        let pid = body["place"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", &format!("/api/places/{}", pid), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State Building");

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/places/user/{}", owner.id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["places"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/places/{}", pid),
            Some(&token),
            Some(json!({"title": "Empire State", "description": "Art Deco landmark"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State");

        let (status, body) = send(
            &app,
            "DELETE",
            &format!("/api/places/{}", pid),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Deleted place.");

        let (status, _) = send(&app, "GET", &format!("/api/places/{}", pid), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.store.find_user(owner.id).await.unwrap().places.is_empty());
    }

    #[tokio::test]
    async fn test_non_creator_cannot_modify_place() {
        let state = test_state(Some(EMPIRE_STATE));
        let (_, owner_token) = seed_user(&state, "Max").await;
        let (_, other_token) = seed_user(&state, "Manuel").await;
        let app = create_router(state);

        let (_, body) =
            send(&app, "POST", "/api/places", Some(&owner_token), Some(place_body())).await;
        let pid = body["place"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/places/{}", pid);

        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            Some(&other_token),
            Some(json!({"title": "Mine now", "description": "Hijacked place"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "DELETE", &uri, Some(&other_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State Building");
    }

    #[tokio::test]
    async fn test_invalid_place_input_is_unprocessable() {
        let state = test_state(Some(EMPIRE_STATE));
        let (_, token) = seed_user(&state, "Max").await;
        let app = create_router(state);

        let mut body = place_body();
        body["description"] = json!("tiny");
        let (status, body) = send(&app, "POST", "/api/places", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["message"],
            "Invalid inputs passed, please check your data."
        );
    }

    #[tokio::test]
    async fn test_unknown_address_is_unprocessable() {
        let state = test_state(None);
        let (owner, token) = seed_user(&state, "Max").await;
        let app = create_router(state.clone());

        let (status, _) =
            send(&app, "POST", "/api/places", Some(&token), Some(place_body())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(
            state
                .store
                .list_places_by_user(owner.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_malformed_place_id_is_not_found() {
        let app = create_router(test_state(Some(EMPIRE_STATE)));

        let (status, _) = send(&app, "GET", "/api/places/p1", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_signup_login_and_list_users() {
        let app = create_router(test_state(Some(EMPIRE_STATE)));
        let signup_body = json!({
            "name": "Max",
            "email": "Max@Example.com",
            "password": "secret",
            "image": "https://images.example.com/max.png"
        });

        let (status, body) =
            send(&app, "POST", "/api/users/signup", None, Some(signup_body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "max@example.com");
        assert!(body["token"].as_str().is_some());
        let user_id = body["userId"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "POST", "/api/users/signup", None, Some(signup_body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            &app,
            "POST",
            "/api/users/login",
            None,
            Some(json!({"email": "max@example.com", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], user_id);

        let (status, _) = send(
            &app,
            "POST",
            "/api/users/login",
            None,
            Some(json!({"email": "max@example.com", "password": "wrong!"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "GET", "/api/users", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].get("password_hash").is_none());
    }
}
