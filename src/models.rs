use jiff::Timestamp;
use sea_orm::{ActiveValue::NotSet, Iterable, Set, entity::prelude::*};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    entities::{movie, review, user},
    error::{CatalogError, CatalogResult, FieldViolation},
    store::timestamp,
};

pub const MOVIE_LIST_LIMIT: (u64, u64) = (100, 1000);
pub const SEARCH_LIMIT: (u64, u64) = (20, 100);
pub const REVIEW_LIST_LIMIT: (u64, u64) = (50, 100);
pub const LATEST_REVIEWS_LIMIT: (u64, u64) = (10, 50);
pub const USER_LIST_LIMIT: (u64, u64) = (100, 1000);

pub const MIN_SEARCH_LEN: usize = 2;
pub const MAX_SEARCH_LEN: usize = 100;

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Genre {
    #[sea_orm(string_value = "Action")]
    Action,
    #[sea_orm(string_value = "Comedy")]
    Comedy,
    #[sea_orm(string_value = "Drama")]
    Drama,
    #[sea_orm(string_value = "Fantasy")]
    Fantasy,
    #[sea_orm(string_value = "Horror")]
    Horror,
    #[sea_orm(string_value = "Romance")]
    Romance,
    #[sea_orm(string_value = "Thriller")]
    Thriller,
    #[sea_orm(string_value = "Crime")]
    Crime,
    #[sea_orm(string_value = "Adventure")]
    Adventure,
    #[sea_orm(string_value = "Animation")]
    Animation,
    #[sea_orm(string_value = "Documentary")]
    Documentary,
}

impl Genre {
    pub fn label(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::Horror => "Horror",
            Genre::Romance => "Romance",
            Genre::Thriller => "Thriller",
            Genre::Crime => "Crime",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Documentary => "Documentary",
        }
    }

    /// Case-insensitive lookup by label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Genre::iter().find(|g| g.label().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A movie together with its review aggregates.
///
/// Every surface (HTML, JSON, bot) reads movies through this one shape, so the
/// derived numbers are computed and rounded in exactly one place.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieRecord {
    pub id: i32,
    pub title: String,
    pub director: String,
    pub release_year: Option<i32>,
    pub genre: Option<Genre>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub avg_rating: f64,
    pub review_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub id: i32,
    pub movie_id: i32,
    pub user_name: String,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: Timestamp,
}

impl From<review::Model> for ReviewRecord {
    fn from(row: review::Model) -> Self {
        Self {
            id: row.id,
            movie_id: row.movie_id,
            user_name: row.user_name,
            rating: row.rating,
            review_text: row.review_text,
            created_at: timestamp(row.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewWithTitle {
    #[serde(flatten)]
    pub review: ReviewRecord,
    pub movie_title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<user::Model> for UserRecord {
    fn from(row: user::Model) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            created_at: timestamp(row.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_movies: u64,
    pub total_reviews: u64,
    pub total_users: u64,
    pub average_rating: f64,
    pub top_genre: Option<Genre>,
    pub most_reviewed_movie: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<MovieRecord>,
    pub total_count: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    /// Builds a page, applying `bounds.0` as the default limit and rejecting
    /// limits outside `1..=bounds.1`.
    pub fn new(skip: Option<u64>, limit: Option<u64>, bounds: (u64, u64)) -> CatalogResult<Self> {
        let (default_limit, max_limit) = bounds;
        let limit = limit.unwrap_or(default_limit);
        if limit == 0 || limit > max_limit {
            return Err(CatalogError::invalid(
                "limit",
                format!("limit must be between 1 and {max_limit}"),
            ));
        }
        Ok(Self { skip: skip.unwrap_or(0), limit })
    }

    pub fn first(limit: u64) -> Self {
        Self { skip: 0, limit }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    Highest,
    Lowest,
}

impl ReviewSort {
    pub fn parse(value: Option<&str>) -> CatalogResult<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("newest") => Ok(ReviewSort::Newest),
            Some("oldest") => Ok(ReviewSort::Oldest),
            Some("highest") => Ok(ReviewSort::Highest),
            Some("lowest") => Ok(ReviewSort::Lowest),
            Some(other) => Err(CatalogError::invalid(
                "sort",
                format!("unknown sort '{other}', expected newest, oldest, highest or lowest"),
            )),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct NewMovie {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "director must be 1-255 characters"))]
    pub director: String,
    #[validate(range(min = 1888, max = 2100, message = "release_year must be 1888-2100"))]
    pub release_year: Option<i32>,
    pub genre: Option<Genre>,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 500, message = "duration_minutes must be 1-500"))]
    pub duration_minutes: Option<i32>,
}

impl NewMovie {
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            director: self.director.trim().to_string(),
            description: non_blank(self.description),
            ..self
        }
    }

    pub fn into_active_model(self, now: i64) -> movie::ActiveModel {
        movie::ActiveModel {
            id: NotSet,
            title_folded: Set(fold(&self.title)),
            director_folded: Set(fold(&self.director)),
            title: Set(self.title),
            director: Set(self.director),
            release_year: Set(self.release_year),
            genre: Set(self.genre),
            description: Set(self.description),
            duration_minutes: Set(self.duration_minutes),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// Sparse movie update: `None` means "leave the column alone". A blank
/// description clears the stored one.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct MovieChanges {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "director must be 1-255 characters"))]
    pub director: Option<String>,
    #[validate(range(min = 1888, max = 2100, message = "release_year must be 1888-2100"))]
    pub release_year: Option<i32>,
    pub genre: Option<Genre>,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 500, message = "duration_minutes must be 1-500"))]
    pub duration_minutes: Option<i32>,
}

impl MovieChanges {
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.map(|t| t.trim().to_string()),
            director: self.director.map(|d| d.trim().to_string()),
            description: self.description.map(|d| d.trim().to_string()),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.director.is_none()
            && self.release_year.is_none()
            && self.genre.is_none()
            && self.description.is_none()
            && self.duration_minutes.is_none()
    }

    /// Each supplied field becomes `Set`; the rest stay `NotSet` and are left
    /// out of the generated UPDATE.
    pub fn into_active_model(self, now: i64) -> movie::ActiveModel {
        movie::ActiveModel {
            title_folded: self.title.as_deref().map_or(NotSet, |t| Set(fold(t))),
            director_folded: self.director.as_deref().map_or(NotSet, |d| Set(fold(d))),
            title: self.title.map_or(NotSet, Set),
            director: self.director.map_or(NotSet, Set),
            release_year: self.release_year.map_or(NotSet, |y| Set(Some(y))),
            genre: self.genre.map_or(NotSet, |g| Set(Some(g))),
            description: self
                .description
                .map_or(NotSet, |d| Set(Some(d).filter(|d| !d.is_empty()))),
            duration_minutes: self.duration_minutes.map_or(NotSet, |m| Set(Some(m))),
            updated_at: Set(now),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct NewReview {
    #[validate(length(min = 1, max = 100, message = "user_name must be 1-100 characters"))]
    pub user_name: String,
    #[validate(range(min = 1, max = 10, message = "rating must be between 1 and 10"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "review_text must be at most 1000 characters"))]
    pub review_text: Option<String>,
}

impl NewReview {
    pub fn normalized(self) -> Self {
        Self {
            user_name: self.user_name.trim().to_string(),
            review_text: non_blank(self.review_text),
            ..self
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

impl NewUser {
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

/// Validates the search text length, returning the trimmed query.
pub fn search_text(query: &str) -> CatalogResult<&str> {
    let query = query.trim();
    let len = query.chars().count();
    if !(MIN_SEARCH_LEN..=MAX_SEARCH_LEN).contains(&len) {
        return Err(CatalogError::Validation(vec![FieldViolation::new(
            "q",
            format!("query must be {MIN_SEARCH_LEN}-{MAX_SEARCH_LEN} characters"),
        )]));
    }
    Ok(query)
}

/// Case folding used for stored search columns and for the text matched
/// against them. Unlike SQLite's `LIKE`, this folds non-ASCII letters too.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
