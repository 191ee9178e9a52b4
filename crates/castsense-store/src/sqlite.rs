//! SQLite-backed store for one season.
//!
//! Comments are keyed by `Comment::key()`. A comment is "processed" once its
//! attributions (possibly none) have been written together with a marker row
//! in `processed_comments`, inside a single transaction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use castsense_core::{AttributionRow, Comment, Entity, EpisodePost, EpisodeRecord, Error, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::schema::{ATTRIBUTION_SCHEMA_SQL, CORPUS_SCHEMA_SQL, REFERENCE_SCHEMA_SQL};
use crate::types::*;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create `db_dir/file_name`.
    pub fn open(db_dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(file_name);

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} threads, {} comments, {} attributions, path={}",
            stats.episode_posts,
            stats.comments,
            stats.attributions,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -16384;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!(
            "{}\n{}\n{}",
            CORPUS_SCHEMA_SQL, REFERENCE_SCHEMA_SQL, ATTRIBUTION_SCHEMA_SQL
        );
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Threads
    // ---------------------------------------------------------------

    /// Insert or refresh discussion threads.
    pub fn upsert_episode_posts(&self, posts: &[EpisodePost]) -> Result<()> {
        let now = now_millis();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO episode_posts (post_id, title, created_utc, score, num_comments, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(post_id) DO UPDATE SET
                        title = excluded.title,
                        score = excluded.score,
                        num_comments = excluded.num_comments,
                        fetched_at = excluded.fetched_at",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for post in posts {
                stmt.execute(params![
                    post.post_id,
                    post.title,
                    post.created_utc,
                    post.score,
                    post.num_comments,
                    now
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// IDs of every thread already downloaded.
    pub fn known_post_ids(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT post_id FROM episode_posts")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Threads ordered by creation time.
    pub fn get_episode_posts(&self) -> Result<Vec<EpisodePost>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM episode_posts ORDER BY created_utc ASC")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok(Self::row_to_episode_post(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Comments
    // ---------------------------------------------------------------

    /// Store comments. Already-stored comments are left untouched.
    /// Returns the number of new rows.
    pub fn add_comments(&self, comments: &[Comment]) -> Result<usize> {
        let now = now_millis();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO comments
                        (comment_key, episode_post_id, episode_title, author, text, upvote_score, timestamp, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for c in comments {
                inserted += stmt
                    .execute(params![
                        c.key(),
                        c.episode_post_id,
                        c.episode_title,
                        c.author,
                        c.text,
                        c.upvote_score,
                        c.timestamp,
                        now
                    ])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        debug!("Stored {} of {} comments", inserted, comments.len());
        Ok(inserted)
    }

    pub fn count_comments(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM comments")
    }

    /// Comments without a processed marker, oldest first.
    pub fn get_unprocessed_comments(&self, limit: usize) -> Result<Vec<StoredComment>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT c.* FROM comments c
                 WHERE NOT EXISTS (
                    SELECT 1 FROM processed_comments p WHERE p.comment_key = c.comment_key
                 )
                 ORDER BY c.timestamp ASC, c.comment_key ASC
                 LIMIT ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| Ok(Self::row_to_stored_comment(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count_unprocessed(&self) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM comments c WHERE NOT EXISTS (
                SELECT 1 FROM processed_comments p WHERE p.comment_key = c.comment_key
             )",
        )
    }

    // ---------------------------------------------------------------
    // Roster & calendar
    // ---------------------------------------------------------------

    /// Replace the season roster. Blank names are dropped and
    /// case-insensitive duplicates keep the first spelling.
    /// Returns the number of stored entities.
    pub fn replace_roster(&self, entities: &[Entity]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM entities", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut stored = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO entities (canonical_name, position) VALUES (?1, ?2)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (position, entity) in entities.iter().enumerate() {
                let name = entity.canonical_name.trim();
                if name.is_empty() {
                    continue;
                }
                stored += stmt
                    .execute(params![name, position as i64])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(stored)
    }

    /// Roster in its original order.
    pub fn get_roster(&self) -> Result<Vec<Entity>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT canonical_name FROM entities ORDER BY position ASC")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).map(Entity::new).collect())
    }

    /// Replace the episode calendar and re-join stored attribution airdates.
    pub fn replace_calendar(&self, records: &[EpisodeRecord]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM episodes", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached("INSERT INTO episodes (episode_num, airdate) VALUES (?1, ?2)")
                .map_err(|e| Error::Database(e.to_string()))?;
            for record in records {
                stmt.execute(params![
                    record.episode_num,
                    record.airdate.format(DATE_FORMAT).to_string()
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        let rejoined = tx
            .execute(
                "UPDATE attributions SET airdate = (
                    SELECT e.airdate FROM episodes e WHERE e.episode_num = attributions.episode_num
                 )",
                [],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        debug!(
            "Calendar replaced: {} episodes, {} attribution rows re-joined",
            records.len(),
            rejoined
        );
        Ok(())
    }

    /// Calendar ordered by episode number.
    pub fn get_calendar(&self) -> Result<Vec<EpisodeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT episode_num, airdate FROM episodes ORDER BY episode_num ASC")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (episode_num, airdate) = row.map_err(|e| Error::Database(e.to_string()))?;
            let airdate = NaiveDate::parse_from_str(&airdate, DATE_FORMAT)
                .map_err(|e| Error::Parse(format!("airdate {:?}: {}", airdate, e)))?;
            records.push(EpisodeRecord {
                episode_num,
                airdate,
            });
        }
        Ok(records)
    }

    // ---------------------------------------------------------------
    // Attributions
    // ---------------------------------------------------------------

    /// Write one comment's attribution rows and mark it processed.
    ///
    /// A comment that was already processed is skipped and `false` returned.
    pub fn record_attributions(&self, comment_key: &str, rows: &[AttributionRow]) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        let marked = tx
            .execute(
                "INSERT OR IGNORE INTO processed_comments (comment_key, processed_at) VALUES (?1, ?2)",
                params![comment_key, now_millis()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        if marked == 0 {
            return Ok(false);
        }

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO attributions
                        (comment_key, comment, score, author, timestamp, episode_title, episode_num, entity, sentiment, airdate)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for row in rows {
                stmt.execute(params![
                    comment_key,
                    row.comment,
                    row.score,
                    row.author,
                    row.timestamp,
                    row.episode_title,
                    row.episode_num,
                    row.entity,
                    row.sentiment,
                    row.airdate.map(|d| d.format(DATE_FORMAT).to_string()),
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(true)
    }

    /// Drop every attribution and processed marker. Returns rows removed.
    pub fn reset_attributions(&self) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let removed = tx
            .execute("DELETE FROM attributions", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM processed_comments", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        info!("Cleared {} attribution rows", removed);
        Ok(removed)
    }

    pub fn count_attributions(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM attributions")
    }

    /// Attribution rows in insertion order, optionally for one entity.
    pub fn get_attribution_rows(&self, entity: Option<&str>) -> Result<Vec<AttributionRow>> {
        let conn = self.conn.lock();
        let rows: Vec<AttributionRow> = match entity {
            Some(name) => {
                let mut stmt = conn
                    .prepare_cached(
                        "SELECT * FROM attributions WHERE entity = ?1 COLLATE NOCASE ORDER BY id ASC",
                    )
                    .map_err(|e| Error::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![name], |row| Ok(Self::row_to_attribution(row)))
                    .map_err(|e| Error::Database(e.to_string()))?;
                rows.filter_map(|r| r.ok()).collect()
            }
            None => {
                let mut stmt = conn
                    .prepare_cached("SELECT * FROM attributions ORDER BY id ASC")
                    .map_err(|e| Error::Database(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| Ok(Self::row_to_attribution(row)))
                    .map_err(|e| Error::Database(e.to_string()))?;
                rows.filter_map(|r| r.ok()).collect()
            }
        };
        Ok(rows)
    }

    /// Texts of comments attributed to `entity`, most recent first.
    pub fn get_entity_comments(&self, entity: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT comment FROM attributions WHERE entity = ?1 COLLATE NOCASE
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![entity, limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Canonical spelling of an entity known to the roster or to stored
    /// attributions, matched case-insensitively.
    pub fn resolve_entity(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let from_roster: Option<String> = conn
            .prepare_cached("SELECT canonical_name FROM entities WHERE canonical_name = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![name], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        if from_roster.is_some() {
            return Ok(from_roster);
        }

        let from_attributions: Option<String> = conn
            .prepare_cached(
                "SELECT entity FROM attributions WHERE entity = ?1 COLLATE NOCASE LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![name], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(from_attributions)
    }

    // ---------------------------------------------------------------
    // Runs
    // ---------------------------------------------------------------

    /// Log a finished pipeline run. Returns its ID.
    pub fn record_run(
        &self,
        kind: &str,
        started_at: i64,
        detail: Option<&serde_json::Value>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let detail_json = detail.map(|d| d.to_string());
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO runs (id, kind, started_at, finished_at, detail_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, kind, started_at, now_millis(), detail_json],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM runs ORDER BY finished_at DESC LIMIT ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get("id").unwrap_or_default(),
                    kind: row.get("kind").unwrap_or_default(),
                    started_at: row.get("started_at").unwrap_or(0),
                    finished_at: row.get("finished_at").unwrap_or(0),
                    detail: row
                        .get::<_, Option<String>>("detail_json")
                        .ok()
                        .flatten()
                        .and_then(|s| serde_json::from_str(&s).ok()),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn get_stats(&self) -> Result<StoreStats> {
        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            episode_posts: self.count("SELECT COUNT(*) FROM episode_posts")?,
            comments: self.count_comments()?,
            processed_comments: self.count("SELECT COUNT(*) FROM processed_comments")?,
            attributions: self.count_attributions()?,
            entities: self.count("SELECT COUNT(*) FROM entities")?,
            episodes: self.count("SELECT COUNT(*) FROM episodes")?,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_episode_post(row: &rusqlite::Row<'_>) -> EpisodePost {
        EpisodePost {
            post_id: row.get("post_id").unwrap_or_default(),
            title: row.get("title").unwrap_or_default(),
            created_utc: row.get("created_utc").unwrap_or(0),
            score: row.get("score").unwrap_or(0),
            num_comments: row.get("num_comments").unwrap_or(0),
        }
    }

    fn row_to_stored_comment(row: &rusqlite::Row<'_>) -> StoredComment {
        StoredComment {
            key: row.get("comment_key").unwrap_or_default(),
            comment: Comment {
                text: row.get("text").unwrap_or_default(),
                upvote_score: row.get("upvote_score").unwrap_or(0),
                author: row.get("author").unwrap_or_default(),
                timestamp: row.get("timestamp").unwrap_or(0),
                episode_post_id: row.get("episode_post_id").unwrap_or_default(),
                episode_title: row.get("episode_title").unwrap_or_default(),
            },
        }
    }

    fn row_to_attribution(row: &rusqlite::Row<'_>) -> AttributionRow {
        AttributionRow {
            comment: row.get("comment").unwrap_or_default(),
            score: row.get("score").unwrap_or(0),
            author: row.get("author").unwrap_or_default(),
            timestamp: row.get("timestamp").unwrap_or(0),
            episode_title: row.get("episode_title").unwrap_or_default(),
            episode_num: row.get("episode_num").ok().flatten(),
            entity: row.get("entity").unwrap_or_default(),
            sentiment: row.get("sentiment").unwrap_or(0.0),
            airdate: row
                .get::<_, Option<String>>("airdate")
                .ok()
                .flatten()
                .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
