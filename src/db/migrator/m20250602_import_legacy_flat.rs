use crate::entities::{episodes, series, watch_progress};
use crate::parser;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseTransaction, QueryResult, Set, Statement,
    TransactionTrait,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

const LEGACY_TABLE: &str = "anime_episodes";

/// Optional legacy columns and the value used when an older database lacks them.
const OPTIONAL_COLUMNS: [(&str, &str); 7] = [
    ("episode", "NULL"),
    ("cover_path", "NULL"),
    ("description", "NULL"),
    ("genres", "NULL"),
    ("last_watched", "NULL"),
    ("is_watched", "0"),
    ("season", "NULL"),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Debug)]
struct LegacyRow {
    file_path: String,
    title: String,
    episode: Option<i32>,
    season: Option<i32>,
    sub_series_title: Option<String>,
    cover_path: Option<String>,
    description: Option<String>,
    genres: Option<String>,
    is_watched: bool,
    last_watched: Option<String>,
}

/// Series-level fields gathered from every legacy row sharing a title.
#[derive(Debug, Default)]
struct SeriesDraft {
    cover_path: Option<String>,
    description: Option<String>,
    genres: Option<String>,
    paths: Vec<PathBuf>,
    rows: Vec<usize>,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager.has_table(LEGACY_TABLE).await? {
            return Ok(());
        }

        let mut select = vec!["file_path".to_string(), "title".to_string()];
        for (column, fallback) in OPTIONAL_COLUMNS {
            if manager.has_column(LEGACY_TABLE, column).await? {
                select.push(column.to_string());
            } else {
                select.push(format!("{fallback} AS {column}"));
            }
        }
        if manager.has_column(LEGACY_TABLE, "sub_series_title").await? {
            select.push("sub_series_title".to_string());
        } else {
            select.push("NULL AS sub_series_title".to_string());
        }

        let backend = manager.get_database_backend();
        let txn = manager.get_connection().begin().await?;

        let rows = txn
            .query_all(Statement::from_string(
                backend,
                format!(
                    "SELECT {} FROM {LEGACY_TABLE} ORDER BY id",
                    select.join(", ")
                ),
            ))
            .await?
            .iter()
            .map(read_row)
            .collect::<Result<Vec<_>, _>>()?;

        // Any error from here on drops `txn`, rolling the whole import back and
        // leaving the legacy table in place.
        let (series_count, episode_count) = import_rows(&txn, &rows).await?;

        txn.execute_unprepared(&format!("DROP TABLE {LEGACY_TABLE}"))
            .await?;
        txn.commit().await?;

        info!(
            event = "legacy_migration_applied",
            series = series_count,
            episodes = episode_count,
            "Imported legacy flat library table"
        );

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }
}

fn read_row(row: &QueryResult) -> Result<LegacyRow, DbErr> {
    let file_path: String = row.try_get("", "file_path")?;
    let title = row
        .try_get::<Option<String>>("", "title")?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            let name = Path::new(&file_path)
                .file_name()
                .map_or_else(|| file_path.clone(), |n| n.to_string_lossy().into_owned());
            parser::parse(&name, &[]).title
        });

    Ok(LegacyRow {
        title,
        episode: row.try_get("", "episode")?,
        season: row.try_get("", "season")?,
        sub_series_title: row.try_get("", "sub_series_title")?,
        cover_path: non_blank(row.try_get("", "cover_path")?),
        description: non_blank(row.try_get("", "description")?),
        genres: non_blank(row.try_get("", "genres")?),
        is_watched: row.try_get::<Option<i64>>("", "is_watched")?.unwrap_or(0) != 0,
        last_watched: row.try_get("", "last_watched")?,
        file_path,
    })
}

async fn import_rows(txn: &DatabaseTransaction, rows: &[LegacyRow]) -> Result<(usize, usize), DbErr> {
    let mut order: Vec<&str> = Vec::new();
    let mut drafts: HashMap<&str, SeriesDraft> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let draft = drafts.entry(row.title.as_str()).or_insert_with(|| {
            order.push(row.title.as_str());
            SeriesDraft::default()
        });
        draft.cover_path = draft.cover_path.take().or_else(|| row.cover_path.clone());
        draft.description = draft.description.take().or_else(|| row.description.clone());
        draft.genres = draft.genres.take().or_else(|| row.genres.clone());
        draft.paths.push(PathBuf::from(&row.file_path));
        draft.rows.push(index);
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut episode_count = 0;

    for title in &order {
        let Some(draft) = drafts.get(title) else {
            continue;
        };

        let series = series::ActiveModel {
            title: Set((*title).to_string()),
            path: Set(common_parent(&draft.paths)),
            cover_path: Set(draft.cover_path.clone()),
            description: Set(draft.description.clone()),
            genres: Set(draft.genres.as_deref().map(genres_to_json)),
            metadata_fetched_at: Set(draft.description.as_ref().map(|_| now.clone())),
            created_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        for &index in &draft.rows {
            let row = &rows[index];
            let episode = episodes::ActiveModel {
                series_id: Set(series.id),
                file_path: Set(row.file_path.clone()),
                season: Set(row.season.unwrap_or(1)),
                episode_number: Set(row.episode),
                sub_series_title: Set(row.sub_series_title.clone()),
                added_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            if row.is_watched || row.last_watched.is_some() {
                watch_progress::ActiveModel {
                    episode_id: Set(episode.id),
                    progress_seconds: Set(0.0),
                    is_watched: Set(row.is_watched),
                    last_watched: Set(row.last_watched.clone()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
            }

            episode_count += 1;
        }
    }

    Ok((order.len(), episode_count))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Legacy rows stored genres as a ", " joined string.
fn genres_to_json(raw: &str) -> String {
    if raw.trim_start().starts_with('[') {
        return raw.to_string();
    }
    let genres: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();
    serde_json::to_string(&genres).unwrap_or_else(|_| "[]".to_string())
}

/// Deepest directory containing every path, or the first file's parent.
fn common_parent(paths: &[PathBuf]) -> String {
    let mut parents = paths.iter().filter_map(|p| p.parent());
    let Some(first) = parents.next() else {
        return String::new();
    };

    let mut common: PathBuf = first.to_path_buf();
    for parent in parents {
        while !parent.starts_with(&common) {
            if !common.pop() {
                break;
            }
        }
    }

    if common.as_os_str().is_empty() {
        first.to_string_lossy().into_owned()
    } else {
        common.to_string_lossy().into_owned()
    }
}
