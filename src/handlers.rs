// region:    --- Imports
use crate::auction::model::{Amount, NewListing, UserId};
use crate::ledger::{AuctionLedger, LedgerError};
use axum::async_trait;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

// endregion: --- Imports

pub type AppState = Arc<AuctionLedger>;

/// Header carrying the already-authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

// region:    --- Errors
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Ledger(LedgerError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Ledger(LedgerError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Ledger(err) => {
                let status = match err {
                    LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
                    LedgerError::Permission(_) => StatusCode::FORBIDDEN,
                    LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                    LedgerError::InvalidState(_) => StatusCode::CONFLICT,
                    LedgerError::Database(msg) => {
                        error!("{:<12} --> database error: {}", "Handler", msg);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({
                                "error": "A database error occurred",
                                "code": err.code(),
                            })),
                        )
                            .into_response();
                    }
                };
                (status, err.code(), err.to_string())
            }
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;
// endregion: --- Errors

// region:    --- Actor
/// The acting user, taken from the `X-User-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(Actor)
            .ok_or_else(|| ApiError::Unauthorized("invalid X-User-Id header".to_string()))
    }
}
// endregion: --- Actor

// region:    --- Extractors
/// JSON request body whose parse failures answer like any other validation error.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// Numeric `:id` path segment.
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state).await?;
        Ok(PathId(id))
    }
}
// endregion: --- Extractors

// region:    --- Request Bodies
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub content: String,
}
// endregion: --- Request Bodies

// region:    --- Command Handlers

/// Place a bid
pub async fn handle_place_bid(
    State(ledger): State<AppState>,
    Actor(bidder): Actor,
    PathId(listing_id): PathId,
    JsonBody(req): JsonBody<PlaceBidRequest>,
) -> ApiResult<impl IntoResponse> {
    info!(
        "{:<12} --> bid request: listing {} by user {} ({})",
        "Command", listing_id, bidder, req.value
    );
    let bid = ledger.place_bid(listing_id, bidder, req.value).await?;
    let minimum_next_bid = ledger.minimum_next_bid(listing_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "bid": bid, "minimum_next_bid": minimum_next_bid })),
    ))
}

/// Close an auction
pub async fn handle_close_auction(
    State(ledger): State<AppState>,
    Actor(actor): Actor,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> close request: listing {} by user {}", "Command", listing_id, actor);
    let listing = ledger.close_auction(listing_id, actor).await?;
    let winning_bid = ledger.highest_bid(listing_id).await?;
    Ok(Json(json!({ "listing": listing, "winning_bid": winning_bid })))
}

pub async fn handle_create_listing(
    State(ledger): State<AppState>,
    Actor(lister): Actor,
    JsonBody(new): JsonBody<NewListing>,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> new listing by user {}: {}", "Command", lister, new.title);
    let listing = ledger.create_listing(lister, new).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn handle_delete_listing(
    State(ledger): State<AppState>,
    Actor(actor): Actor,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> delete listing {} by user {}", "Command", listing_id, actor);
    ledger.delete_listing(listing_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_add_comment(
    State(ledger): State<AppState>,
    Actor(commenter): Actor,
    PathId(listing_id): PathId,
    JsonBody(req): JsonBody<AddCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> comment on listing {} by user {}", "Command", listing_id, commenter);
    let comment = ledger.add_comment(listing_id, commenter, &req.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn handle_watch(
    State(ledger): State<AppState>,
    Actor(user_id): Actor,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    ledger.watchlist_add(user_id, listing_id).await?;
    Ok(Json(json!({ "listing_id": listing_id, "watching": true })))
}

pub async fn handle_unwatch(
    State(ledger): State<AppState>,
    Actor(user_id): Actor,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    ledger.watchlist_remove(user_id, listing_id).await?;
    Ok(Json(json!({ "listing_id": listing_id, "watching": false })))
}

pub async fn handle_create_user(
    State(ledger): State<AppState>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = ledger.create_user(&req.username, &req.email).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn handle_update_user(
    State(ledger): State<AppState>,
    Actor(actor): Actor,
    PathId(user_id): PathId,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> account edit: user {} by user {}", "Command", user_id, actor);
    let user = ledger
        .update_user(user_id, actor, &req.username, &req.email)
        .await?;
    Ok(Json(user))
}

pub async fn handle_create_category(
    State(ledger): State<AppState>,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let category = ledger.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

pub async fn handle_get_user(
    State(ledger): State<AppState>,
    PathId(user_id): PathId,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.get_user(user_id).await?))
}

pub async fn handle_get_categories(State(ledger): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.categories().await?))
}

pub async fn handle_get_category_listings(
    State(ledger): State<AppState>,
    PathId(category_id): PathId,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.category_listings(category_id).await?))
}

/// Active listings (index page)
pub async fn handle_get_listings(State(ledger): State<AppState>) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> active listings", "HandlerQuery");
    Ok(Json(ledger.active_listings().await?))
}

pub async fn handle_get_listing(
    State(ledger): State<AppState>,
    viewer: Option<Actor>,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> listing detail id: {}", "HandlerQuery", listing_id);
    let detail = ledger
        .listing_detail(listing_id, viewer.map(|Actor(id)| id))
        .await?;
    Ok(Json(detail))
}

pub async fn handle_get_listing_bids(
    State(ledger): State<AppState>,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.listing_bids(listing_id).await?))
}

pub async fn handle_get_minimum_bid(
    State(ledger): State<AppState>,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    let minimum = ledger.minimum_next_bid(listing_id).await?;
    Ok(Json(json!({ "listing_id": listing_id, "minimum_next_bid": minimum })))
}

pub async fn handle_get_listing_comments(
    State(ledger): State<AppState>,
    PathId(listing_id): PathId,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.listing_comments(listing_id).await?))
}

pub async fn handle_get_bid_status(
    State(ledger): State<AppState>,
    PathId(bid_id): PathId,
) -> ApiResult<impl IntoResponse> {
    let status = ledger.bid_status(bid_id).await?;
    Ok(Json(json!({ "bid_id": bid_id, "status": status })))
}

pub async fn handle_get_my_watchlist(
    State(ledger): State<AppState>,
    Actor(user_id): Actor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.watchlist(user_id).await?))
}

pub async fn handle_get_my_bids(
    State(ledger): State<AppState>,
    Actor(user_id): Actor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.user_bids(user_id).await?))
}

pub async fn handle_get_my_listings(
    State(ledger): State<AppState>,
    Actor(user_id): Actor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ledger.user_listings(user_id).await?))
}

// endregion: --- Query Handlers

// region:    --- Router
pub fn router(ledger: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/users", post(handle_create_user))
        .route("/users/:id", get(handle_get_user).put(handle_update_user))
        .route(
            "/categories",
            get(handle_get_categories).post(handle_create_category),
        )
        .route("/categories/:id/listings", get(handle_get_category_listings))
        .route("/listings", get(handle_get_listings).post(handle_create_listing))
        .route(
            "/listings/:id",
            get(handle_get_listing).delete(handle_delete_listing),
        )
        .route(
            "/listings/:id/bids",
            get(handle_get_listing_bids).post(handle_place_bid),
        )
        .route("/listings/:id/minimum-bid", get(handle_get_minimum_bid))
        .route("/listings/:id/close", post(handle_close_auction))
        .route(
            "/listings/:id/comments",
            get(handle_get_listing_comments).post(handle_add_comment),
        )
        .route("/listings/:id/watch", put(handle_watch).delete(handle_unwatch))
        .route("/bids/:id/status", get(handle_get_bid_status))
        .route("/me/watchlist", get(handle_get_my_watchlist))
        .route("/me/bids", get(handle_get_my_bids))
        .route("/me/listings", get(handle_get_my_listings))
        .layer(cors)
        .with_state(ledger)
}
// endregion: --- Router
