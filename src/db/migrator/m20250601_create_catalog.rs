use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Series)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Episodes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(WatchProgress)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Soft uniqueness: a moved file and its orphan share a slot until pruned.
        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_slot")
                    .table(EpisodesIden::Table)
                    .col(EpisodesIden::SeriesId)
                    .col(EpisodesIden::Season)
                    .col(EpisodesIden::SubSeriesTitle)
                    .col(EpisodesIden::EpisodeNumber)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_content_hash")
                    .table(EpisodesIden::Table)
                    .col(EpisodesIden::ContentHash)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchProgress).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episodes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Series).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum EpisodesIden {
    #[sea_orm(iden = "episodes")]
    Table,
    SeriesId,
    Season,
    SubSeriesTitle,
    EpisodeNumber,
    ContentHash,
}
