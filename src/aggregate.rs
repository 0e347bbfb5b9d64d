use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, sea_query::Expr,
};

use crate::{
    entities::{movie, review, user},
    error::CatalogResult,
    models::{CatalogStats, Genre, MovieRecord},
    store::{Catalog, timestamp},
};

/// Mean rating of the joined reviews, zero when a movie has none.
const AVG_RATING: &str = "COALESCE(AVG(reviews.rating), 0.0)";
const REVIEW_COUNT: &str = "COUNT(reviews.id)";

#[derive(Debug, FromQueryResult)]
pub(crate) struct MovieStatsRow {
    id: i32,
    title: String,
    director: String,
    release_year: Option<i32>,
    genre: Option<String>,
    description: Option<String>,
    duration_minutes: Option<i32>,
    created_at: i64,
    updated_at: i64,
    avg_rating: f64,
    review_count: i64,
}

impl From<MovieStatsRow> for MovieRecord {
    fn from(row: MovieStatsRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            director: row.director,
            release_year: row.release_year,
            genre: row.genre.as_deref().and_then(Genre::from_label),
            description: row.description,
            duration_minutes: row.duration_minutes,
            avg_rating: round_rating(row.avg_rating),
            review_count: u64::try_from(row.review_count).unwrap_or(0),
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        }
    }
}

/// Movies left-joined with their reviews and grouped per movie, carrying
/// `avg_rating` and `review_count`. Callers add filters, ordering and paging.
pub(crate) fn aggregated_movies() -> Select<movie::Entity> {
    movie::Entity::find()
        .column_as(Expr::cust(AVG_RATING), "avg_rating")
        .column_as(Expr::cust(REVIEW_COUNT), "review_count")
        .join(JoinType::LeftJoin, movie::Relation::Review.def())
        .group_by(movie::Column::Id)
}

/// Highest rated first; equal averages fall back to title, then id.
pub(crate) fn by_rating_desc(query: Select<movie::Entity>) -> Select<movie::Entity> {
    query
        .order_by_desc(Expr::cust(AVG_RATING))
        .order_by_asc(movie::Column::Title)
        .order_by_asc(movie::Column::Id)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Per-movie ratings are shown with one decimal.
pub fn round_rating(value: f64) -> f64 {
    round_to(value, 1)
}

/// The catalog-wide mean keeps two decimals.
pub fn round_overall(value: f64) -> f64 {
    round_to(value, 2)
}

impl Catalog {
    pub async fn average_rating(&self, movie_id: i32) -> CatalogResult<f64> {
        let avg = review::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(AVG(rating), 0.0)"), "avg_rating")
            .filter(review::Column::MovieId.eq(movie_id))
            .into_tuple::<f64>()
            .one(self.db())
            .await?;
        Ok(round_rating(avg.unwrap_or(0.0)))
    }

    pub async fn review_count(&self, movie_id: i32) -> CatalogResult<u64> {
        Ok(review::Entity::find()
            .filter(review::Column::MovieId.eq(movie_id))
            .count(self.db())
            .await?)
    }

    /// Catalog-wide figures, read inside one transaction so the counts and
    /// averages come from the same snapshot.
    pub async fn catalog_stats(&self) -> CatalogResult<CatalogStats> {
        let txn = self.begin().await?;

        let total_movies = movie::Entity::find().count(&txn).await?;
        let total_reviews = review::Entity::find().count(&txn).await?;
        let total_users = user::Entity::find().count(&txn).await?;

        // Mean over every review row, not a mean of per-movie means.
        let average_rating = review::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(AVG(rating), 0.0)"), "avg_rating")
            .into_tuple::<f64>()
            .one(&txn)
            .await?
            .unwrap_or(0.0);

        let top_genre = movie::Entity::find()
            .select_only()
            .column(movie::Column::Genre)
            .filter(movie::Column::Genre.is_not_null())
            .group_by(movie::Column::Genre)
            .order_by_desc(Expr::cust("COUNT(*)"))
            .order_by_asc(movie::Column::Genre)
            .into_tuple::<String>()
            .one(&txn)
            .await?
            .and_then(|label| Genre::from_label(&label));

        let most_reviewed_movie = movie::Entity::find()
            .select_only()
            .column(movie::Column::Title)
            .join(JoinType::InnerJoin, movie::Relation::Review.def())
            .group_by(movie::Column::Id)
            .order_by_desc(Expr::cust(REVIEW_COUNT))
            .order_by_asc(movie::Column::Title)
            .order_by_asc(movie::Column::Id)
            .into_tuple::<String>()
            .one(&txn)
            .await?;

        txn.commit().await?;

        Ok(CatalogStats {
            total_movies,
            total_reviews,
            total_users,
            average_rating: round_overall(average_rating),
            top_genre,
            most_reviewed_movie,
        })
    }

    /// Best-rated movies that have at least one review.
    pub async fn top_rated(&self, limit: u64) -> CatalogResult<Vec<MovieRecord>> {
        let rows = by_rating_desc(aggregated_movies())
            .having(Expr::cust(format!("{REVIEW_COUNT} > 0")))
            .limit(limit)
            .into_model::<MovieStatsRow>()
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(MovieRecord::from).collect())
    }
}
