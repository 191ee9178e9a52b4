//! Attribution expansion, per-episode rollup and classification.

use std::collections::BTreeMap;

use castsense_core::{AggregateRow, AttributionRow, Comment, SentimentClass};
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::episode::extract_episode_number;

/// Means at or above this are Positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Means at or below this are Negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

pub fn classify(mean: f64) -> SentimentClass {
    if mean >= POSITIVE_THRESHOLD {
        SentimentClass::Positive
    } else if mean <= NEGATIVE_THRESHOLD {
        SentimentClass::Negative
    } else {
        SentimentClass::Neutral
    }
}

/// One row per attributed entity. An empty mapping yields no rows.
///
/// Titles without an episode number, or episodes missing from the calendar,
/// produce rows with a null episode number or airdate; they are kept.
pub fn expand(
    comment: &Comment,
    scores: &BTreeMap<String, f64>,
    calendar: &Calendar,
) -> Vec<AttributionRow> {
    let episode_num = extract_episode_number(&comment.episode_title);
    let airdate = episode_num.and_then(|n| calendar.airdate(n));

    scores
        .iter()
        .map(|(entity, &sentiment)| AttributionRow {
            comment: comment.text.clone(),
            score: comment.upvote_score,
            author: comment.author.clone(),
            timestamp: comment.timestamp,
            episode_title: comment.episode_title.clone(),
            episode_num,
            entity: entity.clone(),
            sentiment,
            airdate,
        })
        .collect()
}

/// Group rows by (entity, episode) and compute count and mean.
///
/// Airdates come from `calendar`, not from the rows, so a refreshed calendar
/// takes effect without rewriting history. Rows with no episode number or no
/// calendar entry are left out. Output is ordered by airdate, entity, episode.
pub fn aggregate(rows: &[AttributionRow], calendar: &Calendar) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<(&str, u32), (f64, usize)> = BTreeMap::new();
    for row in rows {
        let Some(episode_num) = row.episode_num else {
            continue;
        };
        if calendar.airdate(episode_num).is_none() {
            continue;
        }
        let slot = groups.entry((row.entity.as_str(), episode_num)).or_default();
        slot.0 += row.sentiment;
        slot.1 += 1;
    }

    let mut out: Vec<AggregateRow> = groups
        .into_iter()
        .filter_map(|((entity, episode_num), (sum, count))| {
            let airdate = calendar.airdate(episode_num)?;
            Some(AggregateRow {
                entity: entity.to_string(),
                episode_num,
                airdate,
                mean_sentiment: sum / count as f64,
                comment_count: count,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        a.airdate
            .cmp(&b.airdate)
            .then_with(|| a.entity.cmp(&b.entity))
            .then_with(|| a.episode_num.cmp(&b.episode_num))
    });
    out
}

/// Season-wide view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOverview {
    pub entity: String,
    pub comment_count: usize,
    pub mean_sentiment: f64,
    pub class: SentimentClass,
}

/// Per-entity totals over every row, dated or not. Sorted by entity name.
pub fn entity_overview(rows: &[AttributionRow]) -> Vec<EntityOverview> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let slot = totals.entry(row.entity.as_str()).or_default();
        slot.0 += row.sentiment;
        slot.1 += 1;
    }

    totals
        .into_iter()
        .map(|(entity, (sum, count))| {
            let mean_sentiment = sum / count as f64;
            EntityOverview {
                entity: entity.to_string(),
                comment_count: count,
                mean_sentiment,
                class: classify(mean_sentiment),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use castsense_core::EpisodeRecord;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn calendar() -> Calendar {
        Calendar::new(vec![
            EpisodeRecord { episode_num: 1, airdate: date(3) },
            EpisodeRecord { episode_num: 2, airdate: date(4) },
        ])
        .unwrap()
    }

    fn comment(title: &str) -> Comment {
        Comment {
            text: "Ace and Chelley are cute".into(),
            upvote_score: 12,
            author: "villa_fan".into(),
            timestamp: 1_749_000_000,
            episode_post_id: "t3_abc".into(),
            episode_title: title.into(),
        }
    }

    fn row(entity: &str, episode_num: Option<u32>, sentiment: f64) -> AttributionRow {
        AttributionRow {
            comment: String::new(),
            score: 1,
            author: "a".into(),
            timestamp: 0,
            episode_title: String::new(),
            episode_num,
            entity: entity.into(),
            sentiment,
            airdate: None,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(0.05), SentimentClass::Positive);
        assert_eq!(classify(-0.05), SentimentClass::Negative);
        assert_eq!(classify(0.0), SentimentClass::Neutral);
        assert_eq!(classify(0.049), SentimentClass::Neutral);
    }

    #[test]
    fn test_expand_joins_calendar() {
        let scores: BTreeMap<String, f64> =
            [("Ace".to_string(), 0.5), ("Chelley".to_string(), 0.25)].into_iter().collect();
        let rows = expand(
            &comment("Love Island Season 7 Episode 2 Post Episode Discussion"),
            &scores,
            &calendar(),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entity, "Ace");
        assert_eq!(rows[0].episode_num, Some(2));
        assert_eq!(rows[0].airdate, Some(date(4)));
        assert_eq!(rows[1].sentiment, 0.25);
    }

    #[test]
    fn test_expand_empty_mapping() {
        let rows = expand(&comment("Episode 1"), &BTreeMap::new(), &calendar());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unnumbered_title_kept_but_not_aggregated() {
        let scores: BTreeMap<String, f64> = [("Ace".to_string(), 0.5)].into_iter().collect();
        let rows = expand(&comment("Reunion Discussion"), &scores, &calendar());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].episode_num, None);
        assert_eq!(rows[0].airdate, None);
        assert!(aggregate(&rows, &calendar()).is_empty());
        assert_eq!(entity_overview(&rows).len(), 1);
    }

    #[test]
    fn test_mean_and_count() {
        let rows = vec![
            row("A", Some(1), 0.2),
            row("A", Some(1), -0.2),
            row("A", Some(1), 0.6),
        ];
        let agg = aggregate(&rows, &calendar());
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].comment_count, 3);
        assert!((agg[0].mean_sentiment - 0.2).abs() < 1e-9);
        assert_eq!(agg[0].airdate, date(3));
    }

    #[test]
    fn test_ordering_and_missing_calendar_entry() {
        let rows = vec![
            row("Zed", Some(1), 0.1),
            row("Amy", Some(2), 0.1),
            row("Amy", Some(1), 0.3),
            row("Amy", Some(9), 0.3),
        ];
        let agg = aggregate(&rows, &calendar());
        let keys: Vec<(&str, u32)> = agg.iter().map(|r| (r.entity.as_str(), r.episode_num)).collect();
        assert_eq!(keys, vec![("Amy", 1), ("Zed", 1), ("Amy", 2)]);
    }

    #[test]
    fn test_idempotent() {
        let rows = vec![row("A", Some(1), 0.4), row("B", Some(2), -0.3), row("A", Some(2), 0.1)];
        let cal = calendar();
        assert_eq!(aggregate(&rows, &cal), aggregate(&rows, &cal));
    }

    #[test]
    fn test_entity_overview() {
        let rows = vec![row("B", Some(1), -0.5), row("A", None, 0.5), row("B", Some(2), -0.1)];
        let overview = entity_overview(&rows);
        assert_eq!(overview[0].entity, "A");
        assert_eq!(overview[0].class, SentimentClass::Positive);
        assert_eq!(overview[1].comment_count, 2);
        assert!((overview[1].mean_sentiment + 0.3).abs() < 1e-9);
        assert_eq!(overview[1].class, SentimentClass::Negative);
    }
}
