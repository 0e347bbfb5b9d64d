use sea_orm_migration::{prelude::*, schema::*, sea_orm::ConnectionTrait};

/// Lowercased copies of the searchable text columns. SQLite folds only ASCII
/// in `LIKE` and `lower()`, so the folding happens in Rust on write.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite accepts a single ADD COLUMN per ALTER TABLE.
        manager
            .alter_table(
                Table::alter()
                    .table(Movies::Table)
                    .add_column(string_len(Movies::TitleFolded, 255).default(""))
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Movies::Table)
                    .add_column(string_len(Movies::DirectorFolded, 255).default(""))
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Reviews::Table)
                    .add_column(string_len(Reviews::UserNameFolded, 100).default(""))
                    .to_owned(),
            )
            .await?;

        backfill_movies(manager).await?;
        backfill_reviews(manager).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_title_folded")
                    .table(Movies::Table)
                    .col(Movies::TitleFolded)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop().name("idx_movies_title_folded").table(Movies::Table).to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Reviews::Table)
                    .drop_column(Reviews::UserNameFolded)
                    .to_owned(),
            )
            .await?;
        for column in [Movies::DirectorFolded, Movies::TitleFolded] {
            manager
                .alter_table(Table::alter().table(Movies::Table).drop_column(column).to_owned())
                .await?;
        }
        Ok(())
    }
}

async fn backfill_movies(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let backend = manager.get_database_backend();

    let select = Query::select()
        .columns([Movies::Id, Movies::Title, Movies::Director])
        .from(Movies::Table)
        .to_owned();
    for row in db.query_all(backend.build(&select)).await? {
        let id: i32 = row.try_get("", "id")?;
        let title: String = row.try_get("", "title")?;
        let director: String = row.try_get("", "director")?;

        let update = Query::update()
            .table(Movies::Table)
            .values([
                (Movies::TitleFolded, title.to_lowercase().into()),
                (Movies::DirectorFolded, director.to_lowercase().into()),
            ])
            .and_where(Expr::col(Movies::Id).eq(id))
            .to_owned();
        db.execute(backend.build(&update)).await?;
    }
    Ok(())
}

async fn backfill_reviews(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let backend = manager.get_database_backend();

    let select = Query::select()
        .columns([Reviews::Id, Reviews::UserName])
        .from(Reviews::Table)
        .to_owned();
    for row in db.query_all(backend.build(&select)).await? {
        let id: i32 = row.try_get("", "id")?;
        let user_name: String = row.try_get("", "user_name")?;

        let update = Query::update()
            .table(Reviews::Table)
            .value(Reviews::UserNameFolded, user_name.to_lowercase())
            .and_where(Expr::col(Reviews::Id).eq(id))
            .to_owned();
        db.execute(backend.build(&update)).await?;
    }
    Ok(())
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Director,
    TitleFolded,
    DirectorFolded,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    UserName,
    UserNameFolded,
}
