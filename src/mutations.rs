use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use tracing::{debug, warn};
use validator::Validate;

use crate::{
    entities::{movie, review, user},
    error::{CatalogError, CatalogResult},
    models::{MovieChanges, NewMovie, NewReview, NewUser, fold},
    store::{self, Catalog, EntityKind, now_sec},
};

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedReview {
    pub id: i32,
    pub movie_title: String,
}

impl Catalog {
    pub async fn create_movie(&self, movie: NewMovie) -> CatalogResult<i32> {
        let movie = movie.normalized();
        movie.validate()?;

        let result = movie::Entity::insert(movie.into_active_model(now_sec()))
            .exec(self.db())
            .await?;

        debug!(movie_id = result.last_insert_id, "created movie");
        Ok(result.last_insert_id)
    }

    /// Applies only the supplied fields and touches `updated_at`.
    pub async fn update_movie(&self, id: i32, changes: MovieChanges) -> CatalogResult<()> {
        let changes = changes.normalized();
        changes.validate()?;

        let txn = self.db().begin().await?;
        if !store::exists(&txn, EntityKind::Movie, id).await? {
            return Err(CatalogError::not_found(EntityKind::Movie, id));
        }
        if changes.is_empty() {
            return Err(CatalogError::NoFieldsSupplied);
        }

        movie::Entity::update_many()
            .set(changes.into_active_model(now_sec()))
            .filter(movie::Column::Id.eq(id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        debug!(movie_id = id, "updated movie");
        Ok(())
    }

    /// Removes the movie and its reviews in one transaction.
    pub async fn delete_movie(&self, id: i32) -> CatalogResult<()> {
        let txn = self.db().begin().await?;

        let reviews = review::Entity::delete_many()
            .filter(review::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;
        if !store::delete(&txn, EntityKind::Movie, id).await? {
            return Err(CatalogError::not_found(EntityKind::Movie, id));
        }
        txn.commit().await?;

        debug!(movie_id = id, reviews_removed = reviews.rows_affected, "deleted movie");
        Ok(())
    }

    /// The movie lookup and the insert share one transaction.
    pub async fn create_review(
        &self,
        movie_id: i32,
        review: NewReview,
    ) -> CatalogResult<CreatedReview> {
        let review = review.normalized();
        review.validate()?;

        let txn = self.db().begin().await?;
        let Some(movie) = movie::Entity::find_by_id(movie_id).one(&txn).await? else {
            warn!(movie_id, "review for unknown movie rejected");
            return Err(CatalogError::not_found(EntityKind::Movie, movie_id));
        };

        let review_id = insert_review(&txn, movie_id, review).await?;
        txn.commit().await?;

        debug!(review_id, movie_id, "created review");
        Ok(CreatedReview { id: review_id, movie_title: movie.title })
    }

    pub async fn delete_review(&self, id: i32) -> CatalogResult<()> {
        if !store::delete(self.db(), EntityKind::Review, id).await? {
            return Err(CatalogError::not_found(EntityKind::Review, id));
        }
        debug!(review_id = id, "deleted review");
        Ok(())
    }

    /// Duplicate usernames or emails are rejected by the unique indexes.
    pub async fn create_user(&self, new_user: NewUser) -> CatalogResult<i32> {
        let new_user = new_user.normalized();
        new_user.validate()?;

        let model = user::ActiveModel {
            id: NotSet,
            username: Set(new_user.username),
            email: Set(new_user.email),
            created_at: Set(now_sec()),
        };
        match user::Entity::insert(model).exec(self.db()).await {
            Ok(result) => {
                debug!(user_id = result.last_insert_id, "created user");
                Ok(result.last_insert_id)
            },
            Err(err) => {
                let err = CatalogError::from(err);
                if let CatalogError::Uniqueness { field } = &err {
                    warn!(field = %field, "duplicate user rejected");
                }
                Err(err)
            },
        }
    }
}

/// A movie deleted between the existence check and this insert trips the
/// foreign key, which reads as NotFound.
async fn insert_review<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    review: NewReview,
) -> CatalogResult<i32> {
    let model = review::ActiveModel {
        id: NotSet,
        movie_id: Set(movie_id),
        user_name_folded: Set(fold(&review.user_name)),
        user_name: Set(review.user_name),
        rating: Set(review.rating),
        review_text: Set(review.review_text),
        created_at: Set(now_sec()),
    };
    match review::Entity::insert(model).exec(conn).await {
        Ok(inserted) => Ok(inserted.last_insert_id),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
            warn!(movie_id, "review insert hit a missing movie");
            Err(CatalogError::not_found(EntityKind::Movie, movie_id))
        },
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{
        models::{Genre, Page, ReviewSort},
        queries::MovieOrder,
        store::testing::{add_movie, add_review, catalog},
    };

    fn heat() -> NewMovie {
        NewMovie {
            title: "Heat".into(),
            director: "Michael Mann".into(),
            release_year: Some(1995),
            genre: Some(Genre::Crime),
            description: Some("A heist thriller".into()),
            duration_minutes: Some(170),
        }
    }

    #[tokio::test]
    async fn created_movie_reads_back_unchanged() {
        let catalog = catalog().await;
        let id = catalog.create_movie(heat()).await.unwrap();

        let movie = catalog.get_movie_detail(id).await.unwrap();
        assert_eq!(movie.title, "Heat");
        assert_eq!(movie.director, "Michael Mann");
        assert_eq!(movie.release_year, Some(1995));
        assert_eq!(movie.genre, Some(Genre::Crime));
        assert_eq!(movie.description.as_deref(), Some("A heist thriller"));
        assert_eq!(movie.duration_minutes, Some(170));
        assert_eq!(movie.avg_rating, 0.0);
        assert_eq!(movie.review_count, 0);
    }

    #[tokio::test]
    async fn invalid_movie_is_rejected_without_insert() {
        let catalog = catalog().await;
        let err = catalog
            .create_movie(NewMovie { release_year: Some(1700), ..heat() })
            .await
            .unwrap_err();
        assert_matches!(err, CatalogError::Validation(v) if v[0].field == "release_year");
        assert!(catalog.list_by_title(Page::first(10), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let catalog = catalog().await;
        let id = catalog.create_movie(heat()).await.unwrap();
        add_review(&catalog, id, "ann", 9).await;
        add_review(&catalog, id, "bob", 8).await;
        let before = catalog.get_movie_detail(id).await.unwrap();

        catalog
            .update_movie(id, MovieChanges {
                title: Some("New Title".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let after = catalog.get_movie_detail(id).await.unwrap();
        assert_eq!(after.title, "New Title");
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(
            crate::models::MovieRecord {
                title: before.title.clone(),
                updated_at: before.updated_at,
                ..after
            },
            before
        );
        assert_eq!(before.avg_rating, 8.5);
        assert_eq!(before.review_count, 2);
    }

    #[tokio::test]
    async fn update_requires_existing_movie_and_some_field() {
        let catalog = catalog().await;
        let id = add_movie(&catalog, "Heat", None).await;

        assert_matches!(
            catalog.update_movie(id + 1, MovieChanges::default()).await,
            Err(CatalogError::NotFound { .. })
        );
        assert_matches!(
            catalog.update_movie(id, MovieChanges::default()).await,
            Err(CatalogError::NoFieldsSupplied)
        );
        assert_matches!(
            catalog
                .update_movie(id, MovieChanges { duration_minutes: Some(0), ..Default::default() })
                .await,
            Err(CatalogError::Validation(_))
        );
    }

    #[tokio::test]
    async fn delete_movie_removes_it_and_its_reviews() {
        let catalog = catalog().await;
        let keep = add_movie(&catalog, "Ali", None).await;
        let gone = add_movie(&catalog, "Heat", None).await;
        let review = add_review(&catalog, gone, "ann", 7).await;

        assert_matches!(catalog.delete_movie(gone + 100).await, Err(CatalogError::NotFound { .. }));
        catalog.delete_movie(gone).await.unwrap();

        let remaining = catalog
            .list_movies(MovieOrder::Title, Page::first(10), None)
            .await
            .unwrap();
        assert_eq!(remaining.iter().map(|m| m.id).collect::<Vec<_>>(), [keep]);
        assert!(!catalog.exists(EntityKind::Review, review).await.unwrap());
        assert_eq!(catalog.catalog_stats().await.unwrap().total_reviews, 0);
    }

    #[tokio::test]
    async fn review_for_missing_movie_leaves_no_row() {
        let catalog = catalog().await;
        let err = catalog
            .create_review(77, NewReview { user_name: "Ann".into(), rating: 8, review_text: None })
            .await
            .unwrap_err();
        assert_matches!(err, CatalogError::NotFound { entity: EntityKind::Movie, id: 77 });
        assert!(catalog.latest_reviews(50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_for_vanished_movie_maps_foreign_key_to_not_found() {
        let catalog = catalog().await;
        let new_review = NewReview { user_name: "Ann".into(), rating: 8, review_text: None };

        assert_matches!(
            insert_review(catalog.db(), 404, new_review).await,
            Err(CatalogError::NotFound { entity: EntityKind::Movie, id: 404 })
        );
        assert_eq!(review::Entity::find().count(catalog.db()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_description_update_clears_it() {
        let catalog = catalog().await;
        let id = catalog.create_movie(heat()).await.unwrap();

        catalog
            .update_movie(id, MovieChanges {
                description: Some("   ".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(catalog.get_movie_detail(id).await.unwrap().description, None);
    }

    #[tokio::test]
    async fn review_rating_bounds() {
        let catalog = catalog().await;
        let id = add_movie(&catalog, "Heat", None).await;
        for rating in [0, 11] {
            assert_matches!(
                catalog
                    .create_review(id, NewReview {
                        user_name: "Ann".into(),
                        rating,
                        review_text: None,
                    })
                    .await,
                Err(CatalogError::Validation(_))
            );
        }
        let created = catalog
            .create_review(id, NewReview {
                user_name: " Ann ".into(),
                rating: 10,
                review_text: Some(String::new()),
            })
            .await
            .unwrap();
        assert_eq!(created.movie_title, "Heat");

        let stored = catalog
            .list_reviews_for_movie(id, Page::first(1), ReviewSort::Newest)
            .await
            .unwrap();
        assert_eq!(stored[0].user_name, "Ann");
        assert_eq!(stored[0].review_text, None);
    }

    #[tokio::test]
    async fn delete_review_reports_missing_rows() {
        let catalog = catalog().await;
        let movie = add_movie(&catalog, "Heat", None).await;
        let id = add_review(&catalog, movie, "ann", 5).await;

        catalog.delete_review(id).await.unwrap();
        assert_matches!(
            catalog.delete_review(id).await,
            Err(CatalogError::NotFound { entity: EntityKind::Review, .. })
        );
        assert_eq!(catalog.review_count(movie).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_uniqueness_violation() {
        let catalog = catalog().await;
        catalog
            .create_user(NewUser { username: "ann".into(), email: "ann@example.com".into() })
            .await
            .unwrap();

        assert_matches!(
            catalog
                .create_user(NewUser { username: "ann".into(), email: "other@example.com".into() })
                .await,
            Err(CatalogError::Uniqueness { field }) if field == "username"
        );
        assert_matches!(
            catalog
                .create_user(NewUser { username: "annie".into(), email: "ann@example.com".into() })
                .await,
            Err(CatalogError::Uniqueness { field }) if field == "email"
        );
        assert_matches!(
            catalog
                .create_user(NewUser { username: "an".into(), email: "an@example.com".into() })
                .await,
            Err(CatalogError::Validation(_))
        );
    }
}
