mod aggregate;
mod api;
mod bot;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod mutations;
mod queries;
mod routes;
mod store;
mod templates;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, store::Catalog};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
}

pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(routes::index))
        .route("/movies", get(routes::index))
        .route("/movies/{id}", get(routes::movie_detail))
        .route("/movies/{id}/reviews", get(routes::movie_detail))
        .route("/movies/{id}/review", post(routes::add_review))
        .route("/add-movie", get(routes::add_movie_form).post(routes::add_movie))
        .route("/api", get(api::banner))
        .nest("/api/v1", api::router());

    if state.config.bot_enabled {
        router = router.route("/bot/messages", post(bot::message));
    }

    router
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movie_reviews=debug,sqlx=warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect(&config).await?;
    if let Err(err) = db::prepare(&db).await {
        tracing::error!(
            error = %err,
            "catalog schema not prepared, restart once the store is reachable"
        );
    }
    let catalog = Catalog::new(db);

    match catalog.catalog_stats().await {
        Ok(stats) => tracing::info!(
            movies = stats.total_movies,
            reviews = stats.total_reviews,
            users = stats.total_users,
            "catalog loaded"
        ),
        Err(err) => tracing::warn!(error = %err, "could not read catalog counts"),
    }

    if std::env::args().nth(1).as_deref() == Some("bot") {
        return bot::run_console(catalog).await;
    }

    let state = Arc::new(AppState { config: config.clone(), catalog });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, bot = config.bot_enabled, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
pub fn test_state(catalog: Catalog) -> Arc<AppState> {
    let config = Config {
        addr: ([127, 0, 0, 1], 0).into(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        db_connect_timeout_secs: 1,
        bot_enabled: true,
    };
    Arc::new(AppState { config: Arc::new(config), catalog })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::store::testing::{add_movie, catalog};

    #[tokio::test]
    async fn bot_endpoint_replies_with_text() {
        let catalog = catalog().await;
        add_movie(&catalog, "Heat", None).await;
        let response = app(test_state(catalog))
            .oneshot(
                Request::post("/bot/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"text":"heat"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["reply"].as_str().unwrap().starts_with("Heat\nDirector: Michael Mann"));
    }

    #[tokio::test]
    async fn bot_endpoint_is_absent_when_disabled() {
        let catalog = catalog().await;
        let mut state = (*test_state(catalog)).clone();
        state.config = Arc::new(Config { bot_enabled: false, ..(*state.config).clone() });
        let response = app(Arc::new(state))
            .oneshot(
                Request::post("/bot/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"text":"/help"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
