use jiff::Timestamp;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    TransactionTrait,
};

use crate::{
    entities::{movie, review, user},
    error::CatalogResult,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    Movie,
    Review,
    User,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Movie => "movie",
            EntityKind::Review => "review",
            EntityKind::User => "user",
        })
    }
}

/// Handle to the catalog tables. Cheap to clone; every operation borrows a
/// pooled connection for its own duration only.
#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
}

impl Catalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn begin(&self) -> CatalogResult<DatabaseTransaction> {
        Ok(self.db.begin().await?)
    }

    pub async fn ping(&self) -> CatalogResult<()> {
        Ok(self.db.ping().await?)
    }

    pub async fn exists(&self, kind: EntityKind, id: i32) -> CatalogResult<bool> {
        Ok(exists(&self.db, kind, id).await?)
    }
}

pub async fn exists<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    id: i32,
) -> Result<bool, DbErr> {
    let count = match kind {
        EntityKind::Movie => movie::Entity::find_by_id(id).count(conn).await?,
        EntityKind::Review => review::Entity::find_by_id(id).count(conn).await?,
        EntityKind::User => user::Entity::find_by_id(id).count(conn).await?,
    };
    Ok(count > 0)
}

/// Deletes one row by primary key, returning whether a row was removed.
pub async fn delete<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    id: i32,
) -> Result<bool, DbErr> {
    let result = match kind {
        EntityKind::Movie => movie::Entity::delete_by_id(id).exec(conn).await?,
        EntityKind::Review => review::Entity::delete_by_id(id).exec(conn).await?,
        EntityKind::User => user::Entity::delete_by_id(id).exec(conn).await?,
    };
    Ok(result.rows_affected > 0)
}

pub fn now_sec() -> i64 {
    Timestamp::now().as_second()
}

pub fn timestamp(seconds: i64) -> Timestamp {
    Timestamp::from_second(seconds).unwrap_or(Timestamp::UNIX_EPOCH)
}

#[cfg(test)]
pub(crate) mod testing {
    use sea_orm::{ConnectOptions, Database};

    use super::Catalog;
    use crate::models::{Genre, NewMovie, NewReview};

    /// Fresh, migrated in-memory catalog. A single pooled connection keeps
    /// every query on the same SQLite memory database.
    pub async fn catalog() -> Catalog {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.expect("connect in-memory sqlite");
        crate::db::prepare(&db).await.expect("migrate in-memory sqlite");
        Catalog::new(db)
    }

    pub async fn add_movie(catalog: &Catalog, title: &str, genre: Option<Genre>) -> i32 {
        catalog
            .create_movie(NewMovie {
                title: title.to_string(),
                director: "Michael Mann".to_string(),
                genre,
                ..Default::default()
            })
            .await
            .expect("create movie")
    }

    pub async fn add_review(catalog: &Catalog, movie_id: i32, user_name: &str, rating: i32) -> i32 {
        catalog
            .create_review(movie_id, NewReview {
                user_name: user_name.to_string(),
                rating,
                review_text: None,
            })
            .await
            .expect("create review")
            .id
    }
}
