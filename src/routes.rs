use std::sync::Arc;

use axum::{
    extract::{Form, Path, State},
    response::{Html, Redirect},
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{AppResult, CatalogError, FieldViolation},
    models::{Genre, MOVIE_LIST_LIMIT, NewMovie, NewReview, Page, REVIEW_LIST_LIMIT, ReviewSort},
    templates,
};

pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let movies = state.catalog.list_by_rating_desc(Page::first(MOVIE_LIST_LIMIT.1), None).await?;
    Ok(Html(templates::index_page(&movies)))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Html<String>> {
    let movie = state.catalog.get_movie_detail(id).await?;
    let reviews = state
        .catalog
        .list_reviews_for_movie(id, Page::first(REVIEW_LIST_LIMIT.1), ReviewSort::Newest)
        .await?;
    Ok(Html(templates::movie_detail_page(&movie, &reviews)))
}

pub async fn add_movie_form() -> Html<String> {
    Html(templates::add_movie_page())
}

/// Raw form fields; browsers send empty strings for untouched inputs.
#[derive(Debug, Deserialize)]
pub struct MovieForm {
    title: String,
    director: String,
    release_year: Option<String>,
    genre: Option<String>,
    description: Option<String>,
}

impl TryFrom<MovieForm> for NewMovie {
    type Error = CatalogError;

    fn try_from(form: MovieForm) -> Result<Self, Self::Error> {
        let mut violations = Vec::new();

        let release_year = match blank_to_none(form.release_year) {
            None => None,
            Some(raw) => match raw.parse() {
                Ok(year) => Some(year),
                Err(_) => {
                    violations.push(FieldViolation::new(
                        "release_year",
                        "release_year must be a number",
                    ));
                    None
                },
            },
        };

        let genre = match blank_to_none(form.genre) {
            None => None,
            Some(label) => {
                let genre = Genre::from_label(&label);
                if genre.is_none() {
                    let message = format!("unknown genre '{label}'");
                    violations.push(FieldViolation::new("genre", message));
                }
                genre
            },
        };

        if !violations.is_empty() {
            return Err(CatalogError::Validation(violations));
        }

        Ok(NewMovie {
            title: form.title,
            director: form.director,
            release_year,
            genre,
            description: form.description,
            duration_minutes: None,
        })
    }
}

pub async fn add_movie(
    State(state): State<Arc<AppState>>,
    Form(form): Form<MovieForm>,
) -> AppResult<Redirect> {
    let id = state.catalog.create_movie(NewMovie::try_from(form)?).await?;
    Ok(Redirect::to(&format!("/movies/{id}")))
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    user_name: String,
    rating: String,
    #[serde(default)]
    review_text: Option<String>,
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    let rating = form
        .rating
        .trim()
        .parse()
        .map_err(|_| CatalogError::invalid("rating", "rating must be a whole number"))?;
    let review = NewReview { user_name: form.user_name, rating, review_text: form.review_text };
    state.catalog.create_review(movie_id, review).await?;
    Ok(Redirect::to(&format!("/movies/{movie_id}")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
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
    use crate::{
        app,
        store::testing::{add_movie, catalog},
        test_state,
    };

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn form_blanks_become_absent() {
        let movie = NewMovie::try_from(MovieForm {
            title: "Heat".into(),
            director: "Michael Mann".into(),
            release_year: Some("".into()),
            genre: Some(" ".into()),
            description: None,
        })
        .unwrap();
        assert_eq!(movie.release_year, None);
        assert_eq!(movie.genre, None);
    }

    #[test]
    fn form_reports_bad_year_and_genre_together() {
        let err = NewMovie::try_from(MovieForm {
            title: "Heat".into(),
            director: "Michael Mann".into(),
            release_year: Some("soon".into()),
            genre: Some("Western".into()),
            description: None,
        })
        .unwrap_err();
        match err {
            CatalogError::Validation(v) => {
                let fields: Vec<&str> = v.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(fields, ["release_year", "genre"]);
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn home_page_lists_movies() {
        let catalog = catalog().await;
        add_movie(&catalog, "Heat", None).await;
        let response = app(test_state(catalog))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Heat"));
    }

    #[tokio::test]
    async fn add_movie_redirects_to_detail() {
        let catalog = catalog().await;
        let response = app(test_state(catalog.clone()))
            .oneshot(form(
                "/add-movie",
                "title=Heat&director=Michael+Mann&release_year=1995&genre=Crime&description=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();

        let detail = app(test_state(catalog))
            .oneshot(Request::get(location.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(detail.status(), StatusCode::OK);
        let html = body_text(detail).await;
        assert!(html.contains("Michael Mann"));
        assert!(html.contains("Crime"));
    }

    #[tokio::test]
    async fn review_form_posts_and_redirects() {
        let catalog = catalog().await;
        let id = add_movie(&catalog, "Heat", None).await;
        let response = app(test_state(catalog.clone()))
            .oneshot(form(
                &format!("/movies/{id}/review"),
                "user_name=Ann&rating=8&review_text=Great",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(catalog.review_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_movie_renders_error_page() {
        let catalog = catalog().await;
        let response = app(test_state(catalog))
            .oneshot(Request::get("/movies/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("movie 42 not found"));
    }

    #[tokio::test]
    async fn bad_rating_renders_validation_error() {
        let catalog = catalog().await;
        let id = add_movie(&catalog, "Heat", None).await;
        let response = app(test_state(catalog))
            .oneshot(form(&format!("/movies/{id}/review"), "user_name=Ann&rating=eleven"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
