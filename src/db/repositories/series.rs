use crate::db::error::{StoreError, StoreResult};
use crate::domain::SeriesId;
use crate::entities::{episodes, prelude::*, series};
use crate::models::{self, SeriesMetadata};
use sea_orm::sea_query::{Expr, Func, LikeExpr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, info};

pub struct SeriesRepository {
    conn: DatabaseConnection,
}

impl SeriesRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn map_model(model: series::Model) -> models::Series {
        models::Series {
            id: SeriesId::new(model.id),
            title: model.title,
            path: model.path,
            cover_path: model.cover_path,
            description: model.description,
            genres: model
                .genres
                .and_then(|g| serde_json::from_str(&g).ok())
                .unwrap_or_default(),
            external_id: model.external_id,
            rating: model.rating,
            metadata_fetched_at: model.metadata_fetched_at,
            episodes: Vec::new(),
        }
    }

    /// Returns the id of the series titled `title`, creating it at `path` when
    /// it does not exist yet. The flag is true when a row was created.
    pub async fn get_or_create(&self, title: &str, path: &str) -> StoreResult<(SeriesId, bool)> {
        let active_model = series::ActiveModel {
            title: Set(title.to_string()),
            path: Set(path.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let inserted = Series::insert(active_model)
            .on_conflict(
                OnConflict::column(series::Column::Title)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        let model = self
            .find_by_title(title)
            .await?
            .ok_or_else(|| StoreError::not_found("series", title))?;

        if inserted > 0 {
            info!(series_id = model.id, title, "Created series");
        }

        Ok((SeriesId::new(model.id), inserted > 0))
    }

    pub async fn find_by_title(&self, title: &str) -> StoreResult<Option<series::Model>> {
        Ok(Series::find()
            .filter(series::Column::Title.eq(title))
            .one(&self.conn)
            .await?)
    }

    pub async fn get(&self, id: SeriesId) -> StoreResult<Option<models::Series>> {
        Ok(Series::find_by_id(id.value())
            .one(&self.conn)
            .await?
            .map(Self::map_model))
    }

    /// Records a cover found on disk unless the series already has one.
    pub async fn set_cover_if_missing(&self, id: SeriesId, cover_path: &str) -> StoreResult<bool> {
        let result = Series::update_many()
            .col_expr(series::Column::CoverPath, Expr::value(cover_path))
            .filter(series::Column::Id.eq(id.value()))
            .filter(series::Column::CoverPath.is_null())
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn update_metadata(&self, id: SeriesId, metadata: &SeriesMetadata) -> StoreResult<()> {
        let genres = serde_json::to_string(&metadata.genres).ok();

        let mut update = Series::update_many()
            .col_expr(
                series::Column::Description,
                Expr::value(metadata.description.clone()),
            )
            .col_expr(series::Column::Genres, Expr::value(genres))
            .col_expr(series::Column::ExternalId, Expr::value(metadata.external_id))
            .col_expr(series::Column::Rating, Expr::value(metadata.rating))
            .col_expr(
                series::Column::MetadataFetchedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            );

        // An existing cover is never replaced with nothing.
        if let Some(cover) = &metadata.cover_path {
            update = update.col_expr(series::Column::CoverPath, Expr::value(cover.clone()));
        }

        let result = update
            .filter(series::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::not_found("series", id));
        }

        debug!(series_id = id.value(), "Updated series metadata");
        Ok(())
    }

    /// Marks a series as looked up without a result so it is not queued again,
    /// filling an empty description with `placeholder`.
    pub async fn mark_attempted(&self, id: SeriesId, placeholder: &str) -> StoreResult<()> {
        let result = Series::update_many()
            .col_expr(
                series::Column::Description,
                Func::if_null(
                    Expr::col(series::Column::Description),
                    Expr::val(placeholder),
                )
                .into(),
            )
            .col_expr(
                series::Column::MetadataFetchedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(series::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::not_found("series", id));
        }
        Ok(())
    }

    /// Series the metadata provider has never been asked about.
    pub async fn missing_metadata(&self) -> StoreResult<Vec<models::Series>> {
        let rows = Series::find()
            .filter(series::Column::MetadataFetchedAt.is_null())
            .order_by_asc(series::Column::Title)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_with_episodes(&self) -> StoreResult<Vec<(series::Model, Vec<episodes::Model>)>> {
        Ok(Series::find()
            .order_by_asc(series::Column::Title)
            .find_with_related(Episodes)
            .all(&self.conn)
            .await?)
    }

    /// Case-insensitive substring match over title and synopsis.
    pub async fn search(&self, query: &str) -> StoreResult<Vec<models::Series>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(query));
        let rows = Series::find()
            .filter(
                Condition::any()
                    .add(series::Column::Title.like(LikeExpr::new(pattern.clone()).escape('\\')))
                    .add(series::Column::Description.like(LikeExpr::new(pattern).escape('\\'))),
            )
            .order_by_asc(series::Column::Title)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Series whose folder lies under `root_prefix`.
    pub async fn list_under(&self, root_prefix: &str) -> StoreResult<Vec<series::Model>> {
        Ok(Series::find()
            .filter(series::Column::Path.starts_with(root_prefix))
            .all(&self.conn)
            .await?)
    }

    pub async fn episode_count(&self, id: SeriesId) -> StoreResult<u64> {
        Ok(Episodes::find()
            .filter(episodes::Column::SeriesId.eq(id.value()))
            .count(&self.conn)
            .await?)
    }

    pub async fn delete_many(&self, ids: &[i32]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = Series::delete_many()
            .filter(series::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Escapes LIKE wildcards so user input only matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
