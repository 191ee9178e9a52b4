//! Drives collection, attribution and aggregation over one season's store.
//!
//! Attribution is synchronous: each comment is segmented, scored and written
//! before the next one is read. Only `collect` is async.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use castsense_aggregate::{aggregate, entity_overview, expand, Calendar, EntityOverview};
use castsense_attribute::Attributor;
use castsense_core::{AggregateRow, AttributionRow, Error, Result};
use castsense_infer::SentimentScorer;
use castsense_sources::{CalendarProvider, CommentProvider, RosterProvider};
use castsense_store::SqliteStore;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::types::{CollectReport, RunKind, ScoreReport};

/// Comments read from the store per scoring batch.
pub const SCORE_BATCH_SIZE: usize = 200;

pub struct Pipeline {
    store: Arc<SqliteStore>,
    scorer: Arc<dyn SentimentScorer>,
    /// Held for a whole score or rescore run; one reducer at a time.
    scoring: Mutex<()>,
}

impl Pipeline {
    pub fn new(store: Arc<SqliteStore>, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self {
            store,
            scorer,
            scoring: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// The stored calendar. An inconsistent one is reported and treated as
    /// empty so attribution still runs.
    pub fn calendar(&self) -> Result<Calendar> {
        let records = self.store.get_calendar()?;
        match Calendar::new(records) {
            Ok(calendar) => Ok(calendar),
            Err(e) => {
                warn!("Stored calendar rejected: {}", e);
                Ok(Calendar::empty())
            }
        }
    }

    // ---------------------------------------------------------------
    // Collect
    // ---------------------------------------------------------------

    /// Refresh roster and calendar, then store new comments.
    ///
    /// Roster and calendar failures keep the previously stored data. A
    /// comment-source failure is returned as an error after the reference
    /// data has been saved.
    pub async fn collect<R, C, K>(
        &self,
        season: u32,
        roster: &R,
        comments: &C,
        calendar: &K,
    ) -> Result<CollectReport>
    where
        R: RosterProvider,
        C: CommentProvider,
        K: CalendarProvider,
    {
        let started_at = now_millis();
        let mut report = CollectReport::default();
        info!("Collecting season {}", season);

        match roster.get_entities(season).await {
            Ok(entities) if entities.is_empty() => {
                warn!("Roster source returned no entities, keeping stored roster");
            }
            Ok(entities) => {
                let stored = self.store.replace_roster(&entities)?;
                info!("Roster: {} entities", stored);
                report.roster = Some(stored);
            }
            Err(e) => warn!("Roster unavailable, keeping stored roster: {}", e),
        }

        match calendar.get_calendar(season).await {
            Ok(records) => match Calendar::new(records) {
                Ok(validated) if validated.is_empty() => {
                    warn!("Calendar source returned no episodes, keeping stored calendar");
                }
                Ok(validated) => {
                    self.store.replace_calendar(&validated.records())?;
                    info!("Calendar: {} episodes", validated.len());
                    report.episodes = Some(validated.len());
                }
                Err(e) => warn!("Calendar rejected, keeping stored calendar: {}", e),
            },
            Err(e) => warn!("Calendar unavailable, keeping stored calendar: {}", e),
        }

        let batch = comments.get_comments(season).await?;
        report.comments_fetched = batch.comments.len();
        report.comments_stored = self.store.add_comments(&batch.comments)?;
        self.store.upsert_episode_posts(&batch.posts)?;
        report.threads_downloaded = batch.posts.len();
        report.threads_skipped = batch.skipped;

        if !report.threads_skipped.is_empty() {
            error!(
                "{} threads skipped after retries: {:?}",
                report.threads_skipped.len(),
                report.threads_skipped
            );
        }
        info!(
            "Collected {} comments from {} threads ({} new)",
            report.comments_fetched, report.threads_downloaded, report.comments_stored
        );

        self.log_run(RunKind::Collect, started_at, &report);
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Score
    // ---------------------------------------------------------------

    /// Attribute every stored comment that has no processed marker yet.
    ///
    /// A run that starts while another is in progress waits for it and then
    /// scores whatever is still pending.
    pub fn score_pending(&self) -> Result<ScoreReport> {
        let _scoring = self.scoring.lock();
        let report = self.score_batches()?;
        self.log_run(RunKind::Score, now_millis() - report.duration_ms as i64, &report);
        Ok(report)
    }

    /// Clear all attributions and markers, then attribute the whole corpus
    /// against the current roster.
    pub fn rescore_all(&self) -> Result<ScoreReport> {
        let _scoring = self.scoring.lock();
        let removed = self.store.reset_attributions()?;
        info!("Rescoring: removed {} attribution rows", removed);
        let report = self.score_batches()?;
        self.log_run(RunKind::Rescore, now_millis() - report.duration_ms as i64, &report);
        Ok(report)
    }

    fn score_batches(&self) -> Result<ScoreReport> {
        let start = Instant::now();
        let roster = self.store.get_roster()?;
        let mut report = ScoreReport::default();

        if roster.is_empty() {
            warn!("Roster is empty, nothing to attribute; run collect first");
            return Ok(report);
        }

        let calendar = self.calendar()?;
        let attributor = Attributor::new(&*self.scorer, &roster);
        report.roster_size = attributor.roster_len();
        info!(
            "Scoring with {} against {} entities",
            self.scorer.name(),
            report.roster_size
        );

        loop {
            let pending = self.store.get_unprocessed_comments(SCORE_BATCH_SIZE)?;
            if pending.is_empty() {
                break;
            }

            for stored in &pending {
                let scores = attributor.attribute(&stored.comment.text);
                let rows = expand(&stored.comment, &scores, &calendar);

                match self.store.record_attributions(&stored.key, &rows) {
                    Ok(true) => {
                        report.comments_processed += 1;
                        if !rows.is_empty() {
                            report.comments_attributed += 1;
                            report.rows_written += rows.len();
                        }
                    }
                    // Marked by another process since the batch was read.
                    Ok(false) => debug!("Comment {} already processed", stored.key),
                    Err(e) => {
                        error!("Failed to record attributions for {}: {}", stored.key, e);
                        return Err(e);
                    }
                }
            }

            info!(
                "Scored batch of {} comments ({} so far, {} rows)",
                pending.len(),
                report.comments_processed,
                report.rows_written
            );
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scoring complete: {} comments, {} attributed, {} rows in {}ms",
            report.comments_processed,
            report.comments_attributed,
            report.rows_written,
            report.duration_ms
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------

    /// Per-entity, per-episode rollup, optionally for one entity.
    pub fn aggregates(&self, entity: Option<&str>) -> Result<Vec<AggregateRow>> {
        let rows = self.store.get_attribution_rows(entity)?;
        let calendar = self.calendar()?;
        Ok(aggregate(&rows, &calendar))
    }

    pub fn entity_overview(&self) -> Result<Vec<EntityOverview>> {
        let rows = self.store.get_attribution_rows(None)?;
        Ok(entity_overview(&rows))
    }

    /// Write the attribution table as CSV. Returns rows written.
    pub fn export_csv(&self, path: &Path) -> Result<usize> {
        let rows = self.store.get_attribution_rows(None)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_csv(path, &rows)?;
        info!("Exported {} attribution rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    fn log_run<T: serde::Serialize>(&self, kind: RunKind, started_at: i64, report: &T) {
        let detail = serde_json::to_value(report).ok();
        if let Err(e) = self.store.record_run(kind.as_str(), started_at, detail.as_ref()) {
            warn!("Failed to record {} run: {}", kind.as_str(), e);
        }
    }
}

fn write_csv(path: &Path, rows: &[AttributionRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::Storage(e.to_string()))?;
    if rows.is_empty() {
        writer
            .write_record([
                "comment",
                "score",
                "author",
                "timestamp",
                "episode_title",
                "episode_num",
                "entity",
                "sentiment",
                "airdate",
            ])
            .map_err(|e| Error::Storage(e.to_string()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| Error::Storage(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use castsense_core::{Comment, Entity, EpisodePost, EpisodeRecord};
    use castsense_infer::LexiconScorer;
    use castsense_sources::CommentBatch;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn test_pipeline() -> (Pipeline, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), "test.db").unwrap();
        let pipeline = Pipeline::new(Arc::new(store), Arc::new(LexiconScorer::new()));
        (pipeline, dir)
    }

    fn comment(text: &str, episode: u32, timestamp: i64) -> Comment {
        Comment {
            text: text.into(),
            upvote_score: 5,
            author: "viewer".into(),
            timestamp,
            episode_post_id: format!("post{}", episode),
            episode_title: format!(
                "Love Island Season 7 Episode {} Post Episode Discussion",
                episode
            ),
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn seed(pipeline: &Pipeline) {
        let store = pipeline.store();
        store
            .replace_roster(&[Entity::new("Huda"), Entity::new("Ace")])
            .unwrap();
        store
            .replace_calendar(&[
                EpisodeRecord { episode_num: 1, airdate: date(3) },
                EpisodeRecord { episode_num: 2, airdate: date(4) },
            ])
            .unwrap();
        store
            .add_comments(&[
                comment("Huda is amazing but Ace is terrible", 1, 100),
                comment("I love Ace so much", 2, 200),
                comment("the weather in the villa looks nice", 2, 300),
            ])
            .unwrap();
    }

    struct StubRoster(Vec<Entity>);
    struct StubComments(Vec<Comment>);
    struct StubCalendar(Vec<EpisodeRecord>);
    struct FailingCalendar;

    impl RosterProvider for StubRoster {
        async fn get_entities(&self, _season: u32) -> Result<Vec<Entity>> {
            Ok(self.0.clone())
        }
    }

    impl CommentProvider for StubComments {
        async fn get_comments(&self, _season: u32) -> Result<CommentBatch> {
            Ok(CommentBatch {
                comments: self.0.clone(),
                posts: vec![EpisodePost {
                    post_id: "post1".into(),
                    title: "Love Island Season 7 Episode 1 Post Episode Discussion".into(),
                    created_utc: 1_748_995_200,
                    score: 120,
                    num_comments: self.0.len() as i64,
                }],
                skipped: vec!["post2".into()],
            })
        }
    }

    impl CalendarProvider for StubCalendar {
        async fn get_calendar(&self, _season: u32) -> Result<Vec<EpisodeRecord>> {
            Ok(self.0.clone())
        }
    }

    impl CalendarProvider for FailingCalendar {
        async fn get_calendar(&self, _season: u32) -> Result<Vec<EpisodeRecord>> {
            Err(Error::Fetch("wiki down".into()))
        }
    }

    #[test]
    fn test_score_pending() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);

        let report = pipeline.score_pending().unwrap();
        assert_eq!(report.comments_processed, 3);
        assert_eq!(report.comments_attributed, 2);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.roster_size, 2);

        let huda = pipeline.store().get_attribution_rows(Some("Huda")).unwrap();
        assert_eq!(huda.len(), 1);
        assert!(huda[0].sentiment > 0.0);
        assert_eq!(huda[0].airdate, Some(date(3)));

        let ace = pipeline.store().get_attribution_rows(Some("ace")).unwrap();
        assert_eq!(ace.len(), 2);
        assert!(ace[0].sentiment < 0.0);
        assert!(ace[1].sentiment > 0.0);
    }

    #[test]
    fn test_scoring_twice_adds_nothing() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);

        pipeline.score_pending().unwrap();
        let before = pipeline.store().count_attributions().unwrap();

        let again = pipeline.score_pending().unwrap();
        assert_eq!(again.comments_processed, 0);
        assert_eq!(again.rows_written, 0);
        assert_eq!(pipeline.store().count_attributions().unwrap(), before);
    }

    #[test]
    fn test_concurrent_scoring_runs_all_succeed() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);
        let extra: Vec<Comment> = (0..600)
            .map(|i| comment(&format!("Huda is great, take {}", i), 1, 1_000 + i))
            .collect();
        pipeline.store().add_comments(&extra).unwrap();

        // A second pipeline over the same store stands in for another
        // process scoring at the same time.
        let store = Arc::clone(&pipeline.store);
        let other = Pipeline::new(store, Arc::new(LexiconScorer::new()));

        let results: Vec<Result<ScoreReport>> = std::thread::scope(|scope| {
            let handles: Vec<_> = [&pipeline, &pipeline, &other, &other]
                .into_iter()
                .map(|p| scope.spawn(move || p.score_pending()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let processed: usize = results
            .iter()
            .map(|r| r.as_ref().map(|report| report.comments_processed).unwrap())
            .sum();
        assert_eq!(processed, 603);
        assert_eq!(pipeline.store().count_unprocessed().unwrap(), 0);
        assert_eq!(pipeline.store().count_attributions().unwrap(), 603);
    }

    #[test]
    fn test_new_comments_scored_incrementally() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);
        pipeline.score_pending().unwrap();

        pipeline
            .store()
            .add_comments(&[comment("Huda is so funny", 2, 400)])
            .unwrap();
        let report = pipeline.score_pending().unwrap();
        assert_eq!(report.comments_processed, 1);
        assert_eq!(pipeline.store().count_attributions().unwrap(), 4);
    }

    #[test]
    fn test_rescore_picks_up_roster_change() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);
        pipeline.score_pending().unwrap();

        pipeline
            .store()
            .replace_roster(&[Entity::new("Huda")])
            .unwrap();
        let report = pipeline.rescore_all().unwrap();
        assert_eq!(report.comments_processed, 3);
        assert_eq!(report.rows_written, 1);
        assert!(pipeline
            .store()
            .get_attribution_rows(Some("Ace"))
            .unwrap()
            .is_empty());

        let kinds: Vec<String> = pipeline
            .store()
            .recent_runs(10)
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert!(kinds.contains(&"rescore".to_string()));
        assert!(kinds.contains(&"score".to_string()));
    }

    #[test]
    fn test_empty_roster_leaves_comments_pending() {
        let (pipeline, _dir) = test_pipeline();
        pipeline
            .store()
            .add_comments(&[comment("Huda is great", 1, 1)])
            .unwrap();

        let report = pipeline.score_pending().unwrap();
        assert_eq!(report.comments_processed, 0);
        assert_eq!(pipeline.store().count_unprocessed().unwrap(), 1);
    }

    #[test]
    fn test_aggregates_and_overview() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);
        pipeline
            .store()
            .add_comments(&[Comment {
                episode_title: "Casa Amor reunion thread".into(),
                ..comment("Huda was great tonight", 9, 500)
            }])
            .unwrap();
        pipeline.score_pending().unwrap();

        let rows = pipeline.aggregates(None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].airdate, date(3));
        assert!(rows.windows(2).all(|w| w[0].airdate <= w[1].airdate));

        // The untitled-episode row is stored but not aggregated.
        assert_eq!(
            pipeline.store().get_attribution_rows(Some("Huda")).unwrap().len(),
            2
        );
        let huda = pipeline.aggregates(Some("Huda")).unwrap();
        assert_eq!(huda.len(), 1);
        assert_eq!(huda[0].comment_count, 1);

        let overview = pipeline.entity_overview().unwrap();
        let names: Vec<&str> = overview.iter().map(|o| o.entity.as_str()).collect();
        assert_eq!(names, vec!["Ace", "Huda"]);
        assert_eq!(overview[1].comment_count, 2);
    }

    #[test]
    fn test_export_csv() {
        let (pipeline, dir) = test_pipeline();
        let empty_path = dir.path().join("exports/empty.csv");
        assert_eq!(pipeline.export_csv(&empty_path).unwrap(), 0);
        let empty = std::fs::read_to_string(&empty_path).unwrap();
        assert!(empty.starts_with("comment,score,author,timestamp,episode_title"));

        seed(&pipeline);
        pipeline.score_pending().unwrap();
        let path = dir.path().join("exports/attributions.csv");
        assert_eq!(pipeline.export_csv(&path).unwrap(), 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 9);
        assert_eq!(&headers[8], "airdate");
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][8], "2025-06-03");
    }

    #[tokio::test]
    async fn test_collect() {
        let (pipeline, _dir) = test_pipeline();
        let roster = StubRoster(vec![Entity::new("Huda"), Entity::new("Ace")]);
        let comments = StubComments(vec![
            comment("Huda is amazing", 1, 10),
            comment("Ace is boring", 1, 20),
        ]);
        let calendar = StubCalendar(vec![
            EpisodeRecord { episode_num: 1, airdate: date(3) },
            EpisodeRecord { episode_num: 2, airdate: date(4) },
        ]);

        let report = pipeline
            .collect(7, &roster, &comments, &calendar)
            .await
            .unwrap();
        assert_eq!(report.roster, Some(2));
        assert_eq!(report.episodes, Some(2));
        assert_eq!(report.comments_stored, 2);
        assert_eq!(report.threads_downloaded, 1);
        assert_eq!(report.threads_skipped, vec!["post2".to_string()]);
        assert!(pipeline.store().known_post_ids().unwrap().contains("post1"));

        // Same comments again are not stored twice.
        let again = pipeline
            .collect(7, &roster, &comments, &calendar)
            .await
            .unwrap();
        assert_eq!(again.comments_fetched, 2);
        assert_eq!(again.comments_stored, 0);
        assert_eq!(pipeline.store().count_comments().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_collect_keeps_calendar_on_failure() {
        let (pipeline, _dir) = test_pipeline();
        seed(&pipeline);
        let roster = StubRoster(vec![]);
        let comments = StubComments(vec![]);

        let report = pipeline
            .collect(7, &roster, &comments, &FailingCalendar)
            .await
            .unwrap();
        assert_eq!(report.roster, None);
        assert_eq!(report.episodes, None);
        assert_eq!(pipeline.store().get_calendar().unwrap().len(), 2);
        assert_eq!(pipeline.store().get_roster().unwrap().len(), 2);

        // Airdates going backwards are rejected, the stored calendar stays.
        let broken = StubCalendar(vec![
            EpisodeRecord { episode_num: 1, airdate: date(9) },
            EpisodeRecord { episode_num: 2, airdate: date(4) },
        ]);
        let report = pipeline
            .collect(7, &roster, &comments, &broken)
            .await
            .unwrap();
        assert_eq!(report.episodes, None);
        assert_eq!(pipeline.store().get_calendar().unwrap()[0].airdate, date(3));
    }
}
