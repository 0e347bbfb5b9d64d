use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState,
    error::CatalogError,
    models::{
        CatalogStats, Genre, LATEST_REVIEWS_LIMIT, MOVIE_LIST_LIMIT, MovieChanges, MovieRecord,
        NewMovie, NewReview, NewUser, Page, REVIEW_LIST_LIMIT, ReviewRecord, ReviewSort,
        ReviewWithTitle, SEARCH_LIMIT, SearchResults, USER_LIST_LIMIT, UserRecord,
    },
};

/// Failure body for every JSON endpoint: `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Catalog(err) => (err.status(), err.public_message()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(T);

#[derive(Debug, Default, Serialize)]
pub struct Ack {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    movie_title: Option<String>,
}

impl Ack {
    fn new(message: &'static str) -> Self {
        Self { message, ..Default::default() }
    }

    fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct MovieListParams {
    skip: Option<u64>,
    limit: Option<u64>,
    genre: Option<Genre>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewListParams {
    skip: Option<u64>,
    limit: Option<u64>,
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    skip: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    limit: Option<u64>,
}

/// Routes mounted under `/api/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/search", get(search_movies))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
        .route("/movies/{id}/reviews", get(list_reviews).post(create_review))
        .route("/reviews/latest", get(latest_reviews))
        .route("/reviews/user/{user_name}", get(reviews_by_user))
        .route("/reviews/{id}", delete(delete_review))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/stats", get(stats))
}

pub async fn banner() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Movie Reviews API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": "/api/v1",
    }))
}

async fn list_movies(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<MovieListParams>,
) -> ApiResult<Json<Vec<MovieRecord>>> {
    let page = Page::new(params.skip, params.limit, MOVIE_LIST_LIMIT)?;
    Ok(Json(state.catalog.list_by_title(page, params.genre).await?))
}

async fn search_movies(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let limit = params.limit.unwrap_or(SEARCH_LIMIT.0);
    Ok(Json(state.catalog.search_movies(&params.q, limit).await?))
}

async fn get_movie(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<MovieRecord>> {
    Ok(Json(state.catalog.get_movie_detail(id).await?))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    ApiJson(movie): ApiJson<NewMovie>,
) -> ApiResult<(StatusCode, Json<Ack>)> {
    let id = state.catalog.create_movie(movie).await?;
    Ok((StatusCode::CREATED, Json(Ack::new("Movie added successfully").with_id(id))))
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(changes): ApiJson<MovieChanges>,
) -> ApiResult<Json<Ack>> {
    state.catalog.update_movie(id, changes).await?;
    Ok(Json(Ack::new("Movie updated successfully").with_id(id)))
}

async fn delete_movie(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Ack>> {
    state.catalog.delete_movie(id).await?;
    Ok(Json(Ack::new("Movie deleted successfully").with_id(id)))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    ApiPath(movie_id): ApiPath<i32>,
    ApiJson(review): ApiJson<NewReview>,
) -> ApiResult<(StatusCode, Json<Ack>)> {
    let created = state.catalog.create_review(movie_id, review).await?;
    let ack = Ack {
        movie_title: Some(created.movie_title),
        ..Ack::new("Review added successfully").with_id(created.id)
    };
    Ok((StatusCode::CREATED, Json(ack)))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    ApiPath(movie_id): ApiPath<i32>,
    ApiQuery(params): ApiQuery<ReviewListParams>,
) -> ApiResult<Json<Vec<ReviewRecord>>> {
    let page = Page::new(params.skip, params.limit, REVIEW_LIST_LIMIT)?;
    let sort = ReviewSort::parse(params.sort.as_deref())?;
    Ok(Json(state.catalog.list_reviews_for_movie(movie_id, page, sort).await?))
}

async fn latest_reviews(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> ApiResult<Json<Vec<ReviewWithTitle>>> {
    let limit = params.limit.unwrap_or(LATEST_REVIEWS_LIMIT.0);
    Ok(Json(state.catalog.latest_reviews(limit).await?))
}

async fn reviews_by_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_name): ApiPath<String>,
) -> ApiResult<Json<Vec<ReviewWithTitle>>> {
    Ok(Json(state.catalog.reviews_by_user(&user_name).await?))
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Ack>> {
    state.catalog.delete_review(id).await?;
    Ok(Json(Ack::new("Review deleted successfully").with_id(id)))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<UserRecord>>> {
    let page = Page::new(params.skip, params.limit, USER_LIST_LIMIT)?;
    Ok(Json(state.catalog.list_users(page).await?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(user): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<Ack>)> {
    let id = state.catalog.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(Ack::new("User created successfully").with_id(id))))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<UserRecord>> {
    Ok(Json(state.catalog.get_user(id).await?))
}

async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CatalogStats>> {
    Ok(Json(state.catalog.catalog_stats().await?))
}
