use sea_orm::{
    ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Select,
    sea_query::LikeExpr,
};

use crate::{
    aggregate::{MovieStatsRow, aggregated_movies, by_rating_desc},
    entities::{movie, review, user},
    error::{CatalogError, CatalogResult},
    models::{
        Genre, MovieRecord, Page, ReviewRecord, ReviewSort, ReviewWithTitle, SearchResults,
        UserRecord, fold, search_text,
    },
    store::{Catalog, EntityKind, timestamp},
};

/// The two default orderings used by different callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MovieOrder {
    Title,
    RatingDesc,
}

#[derive(Debug, FromQueryResult)]
struct ReviewTitleRow {
    id: i32,
    movie_id: i32,
    user_name: String,
    rating: i32,
    review_text: Option<String>,
    created_at: i64,
    movie_title: String,
}

impl From<ReviewTitleRow> for ReviewWithTitle {
    fn from(row: ReviewTitleRow) -> Self {
        Self {
            review: ReviewRecord {
                id: row.id,
                movie_id: row.movie_id,
                user_name: row.user_name,
                rating: row.rating,
                review_text: row.review_text,
                created_at: timestamp(row.created_at),
            },
            movie_title: row.movie_title,
        }
    }
}

impl Catalog {
    pub async fn list_movies(
        &self,
        order: MovieOrder,
        page: Page,
        genre: Option<Genre>,
    ) -> CatalogResult<Vec<MovieRecord>> {
        let mut query = aggregated_movies();
        if let Some(genre) = genre {
            query = query.filter(movie::Column::Genre.eq(genre));
        }
        let query = match order {
            MovieOrder::Title => query
                .order_by_asc(movie::Column::Title)
                .order_by_asc(movie::Column::Id),
            MovieOrder::RatingDesc => by_rating_desc(query),
        };
        let rows = query
            .offset(page.skip)
            .limit(page.limit)
            .into_model::<MovieStatsRow>()
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(MovieRecord::from).collect())
    }

    pub async fn list_by_title(
        &self,
        page: Page,
        genre: Option<Genre>,
    ) -> CatalogResult<Vec<MovieRecord>> {
        self.list_movies(MovieOrder::Title, page, genre).await
    }

    pub async fn list_by_rating_desc(
        &self,
        page: Page,
        genre: Option<Genre>,
    ) -> CatalogResult<Vec<MovieRecord>> {
        self.list_movies(MovieOrder::RatingDesc, page, genre).await
    }

    /// Case-insensitive substring match on title, director or genre.
    pub async fn search_movies(&self, query: &str, limit: u64) -> CatalogResult<SearchResults> {
        let text = search_text(query)?;
        let page = Page::new(None, Some(limit), crate::models::SEARCH_LIMIT)?;
        let folded = fold(text);

        // Genre labels are ASCII, so plain LIKE already ignores their case.
        let matches = Condition::any()
            .add(movie::Column::TitleFolded.like(contains(&folded)))
            .add(movie::Column::DirectorFolded.like(contains(&folded)))
            .add(movie::Column::Genre.like(contains(&folded)));

        let rows = by_rating_desc(aggregated_movies().filter(matches.clone()))
            .limit(page.limit)
            .into_model::<MovieStatsRow>()
            .all(self.db())
            .await?;

        let total_count = movie::Entity::find().filter(matches).count(self.db()).await?;

        Ok(SearchResults {
            query: text.to_string(),
            results: rows.into_iter().map(MovieRecord::from).collect(),
            total_count,
        })
    }

    /// Title-only substring search.
    pub async fn search_titles(&self, text: &str, limit: u64) -> CatalogResult<Vec<MovieRecord>> {
        let pattern = contains(&fold(text.trim()));
        let query = aggregated_movies().filter(movie::Column::TitleFolded.like(pattern));
        let rows = by_rating_desc(query)
            .limit(limit)
            .into_model::<MovieStatsRow>()
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(MovieRecord::from).collect())
    }

    pub async fn get_movie_detail(&self, id: i32) -> CatalogResult<MovieRecord> {
        aggregated_movies()
            .filter(movie::Column::Id.eq(id))
            .into_model::<MovieStatsRow>()
            .one(self.db())
            .await?
            .map(MovieRecord::from)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Movie, id))
    }

    /// Exact title match ignoring case; the oldest entry wins on duplicates.
    pub async fn find_movie_by_title(&self, title: &str) -> CatalogResult<Option<MovieRecord>> {
        let row = aggregated_movies()
            .filter(movie::Column::TitleFolded.eq(fold(title.trim())))
            .order_by_asc(movie::Column::Id)
            .into_model::<MovieStatsRow>()
            .one(self.db())
            .await?;
        Ok(row.map(MovieRecord::from))
    }

    pub async fn list_reviews_for_movie(
        &self,
        movie_id: i32,
        page: Page,
        sort: ReviewSort,
    ) -> CatalogResult<Vec<ReviewRecord>> {
        if !self.exists(EntityKind::Movie, movie_id).await? {
            return Err(CatalogError::not_found(EntityKind::Movie, movie_id));
        }
        let query = review::Entity::find().filter(review::Column::MovieId.eq(movie_id));
        let rows = sorted(query, sort)
            .offset(page.skip)
            .limit(page.limit)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(ReviewRecord::from).collect())
    }

    pub async fn recent_reviews(
        &self,
        movie_id: i32,
        count: u64,
    ) -> CatalogResult<Vec<ReviewRecord>> {
        let rows = sorted(
            review::Entity::find().filter(review::Column::MovieId.eq(movie_id)),
            ReviewSort::Newest,
        )
        .limit(count)
        .all(self.db())
        .await?;
        Ok(rows.into_iter().map(ReviewRecord::from).collect())
    }

    /// Newest reviews across the whole catalog.
    pub async fn latest_reviews(&self, limit: u64) -> CatalogResult<Vec<ReviewWithTitle>> {
        let page = Page::new(None, Some(limit), crate::models::LATEST_REVIEWS_LIMIT)?;
        let rows = sorted(reviews_with_titles(), ReviewSort::Newest)
            .limit(page.limit)
            .into_model::<ReviewTitleRow>()
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(ReviewWithTitle::from).collect())
    }

    /// Reviews whose author name contains `user_name`, ignoring case.
    pub async fn reviews_by_user(&self, user_name: &str) -> CatalogResult<Vec<ReviewWithTitle>> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(CatalogError::invalid("user_name", "user_name must not be empty"));
        }
        let rows = sorted(
            reviews_with_titles()
                .filter(review::Column::UserNameFolded.like(contains(&fold(user_name)))),
            ReviewSort::Newest,
        )
        .into_model::<ReviewTitleRow>()
        .all(self.db())
        .await?;
        Ok(rows.into_iter().map(ReviewWithTitle::from).collect())
    }

    pub async fn list_users(&self, page: Page) -> CatalogResult<Vec<UserRecord>> {
        let rows = user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id)
            .offset(page.skip)
            .limit(page.limit)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    pub async fn get_user(&self, id: i32) -> CatalogResult<UserRecord> {
        user::Entity::find_by_id(id)
            .one(self.db())
            .await?
            .map(UserRecord::from)
            .ok_or_else(|| CatalogError::not_found(EntityKind::User, id))
    }
}

fn reviews_with_titles() -> Select<review::Entity> {
    review::Entity::find()
        .column_as(movie::Column::Title, "movie_title")
        .join(JoinType::InnerJoin, review::Relation::Movie.def())
}

/// Ties on `created_at` (same second) fall back to id in the same direction.
fn sorted(query: Select<review::Entity>, sort: ReviewSort) -> Select<review::Entity> {
    match sort {
        ReviewSort::Newest => query
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id),
        ReviewSort::Oldest => query
            .order_by_asc(review::Column::CreatedAt)
            .order_by_asc(review::Column::Id),
        ReviewSort::Highest => query
            .order_by_desc(review::Column::Rating)
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id),
        ReviewSort::Lowest => query
            .order_by_asc(review::Column::Rating)
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id),
    }
}

fn contains(text: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(text))).escape('\\')
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
