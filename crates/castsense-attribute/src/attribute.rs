//! Targeted attribution: clause-level sentiment assigned to named entities.
//!
//! A clause that names several entities gives all of them the same score.
//! That is lexical attribution, not subject attachment; it is kept as-is.

use std::collections::BTreeMap;

use castsense_core::Entity;
use castsense_infer::SentimentScorer;
use tracing::debug;

use crate::segment::segment;

/// Entity → scores collected from one comment, reduced by arithmetic mean.
#[derive(Debug, Default, Clone)]
pub struct ScoreAccumulator {
    scores: BTreeMap<String, Vec<f64>>,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: &str, score: f64) {
        self.scores.entry(entity.to_string()).or_default().push(score);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mean per entity. Entities that never received a score are absent.
    pub fn into_means(self) -> BTreeMap<String, f64> {
        self.scores
            .into_iter()
            .filter(|(_, scores)| !scores.is_empty())
            .map(|(entity, scores)| {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                (entity, mean)
            })
            .collect()
    }
}

/// A prepared roster bound to a scorer.
pub struct Attributor<'a> {
    scorer: &'a dyn SentimentScorer,
    /// (canonical name, lowercased name) in roster order.
    roster: Vec<(String, String)>,
}

impl<'a> Attributor<'a> {
    /// Prepare a roster. Blank names are ignored and case-insensitive
    /// duplicates keep their first spelling.
    pub fn new(scorer: &'a dyn SentimentScorer, entities: &[Entity]) -> Self {
        let mut roster: Vec<(String, String)> = Vec::with_capacity(entities.len());
        for entity in entities {
            let name = entity.canonical_name.trim();
            if name.is_empty() {
                continue;
            }
            let lowered = name.to_lowercase();
            if roster.iter().any(|(_, l)| *l == lowered) {
                continue;
            }
            roster.push((name.to_string(), lowered));
        }
        Self { scorer, roster }
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Attribute one comment. Returns entity → mean clause score.
    pub fn attribute(&self, comment: &str) -> BTreeMap<String, f64> {
        let mut acc = ScoreAccumulator::new();
        if self.roster.is_empty() {
            return acc.into_means();
        }

        for fragment in segment(comment) {
            let lowered = fragment.to_lowercase();
            let mentioned: Vec<&str> = self
                .roster
                .iter()
                .filter(|(_, name)| lowered.contains(name.as_str()))
                .map(|(canonical, _)| canonical.as_str())
                .collect();
            if mentioned.is_empty() {
                continue;
            }

            let score = match self.scorer.score(fragment) {
                Ok(score) => score,
                Err(e) => {
                    debug!("Skipping fragment ({} chars): {}", fragment.len(), e);
                    continue;
                }
            };
            for entity in mentioned {
                acc.push(entity, score);
            }
        }

        acc.into_means()
    }
}

/// Attribute a single comment against a roster.
pub fn attribute(
    comment: &str,
    entities: &[Entity],
    scorer: &dyn SentimentScorer,
) -> BTreeMap<String, f64> {
    Attributor::new(scorer, entities).attribute(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use castsense_core::{Error, Result};
    use castsense_infer::{LexiconScorer, SentimentDistribution};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed compound per exact fragment text; unknown text is neutral.
    struct TableScorer {
        table: HashMap<&'static str, f32>,
        calls: AtomicUsize,
    }

    impl TableScorer {
        fn new(entries: &[(&'static str, f32)]) -> Self {
            Self {
                table: entries.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SentimentScorer for TableScorer {
        fn distribution(&self, text: &str) -> Result<SentimentDistribution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(Error::Inference("model rejected span".into()));
            }
            let c = self.table.get(text).copied().unwrap_or(0.0);
            let (positive, negative) = if c >= 0.0 { (c, 0.0) } else { (0.0, -c) };
            Ok(SentimentDistribution {
                negative,
                neutral: 1.0 - positive - negative,
                positive,
            })
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    fn roster(names: &[&str]) -> Vec<Entity> {
        names.iter().map(|n| Entity::new(*n)).collect()
    }

    #[test]
    fn test_no_mentions_is_empty() {
        let scorer = TableScorer::new(&[]);
        let result = attribute("What a wild recoupling tonight.", &roster(&["Ace", "Nic"]), &scorer);
        assert!(result.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_comment_is_empty() {
        let scorer = TableScorer::new(&[]);
        assert!(attribute("", &roster(&["Ace"]), &scorer).is_empty());
    }

    #[test]
    fn test_single_clause_equals_scorer_output() {
        let scorer = TableScorer::new(&[("Jeremiah is so funny", 0.75)]);
        let result = attribute("Jeremiah is so funny", &roster(&["Jeremiah"]), &scorer);
        assert_eq!(result.len(), 1);
        let direct = scorer.score("Jeremiah is so funny").unwrap();
        assert!((result["Jeremiah"] - direct).abs() < 1e-9);
    }

    #[test]
    fn test_contrastive_split_with_lexicon() {
        let scorer = LexiconScorer::new();
        let result = attribute("X is great but Y is terrible", &roster(&["X", "Y"]), &scorer);
        assert!(result["X"] > 0.0);
        assert!(result["Y"] < 0.0);
    }

    #[test]
    fn test_case_insensitive_substring() {
        let scorer = TableScorer::new(&[("HUDA!!!", 0.5)]);
        let result = attribute("HUDA!!!", &roster(&["Huda"]), &scorer);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("Huda"));
    }

    #[test]
    fn test_shared_clause_scores_both() {
        let scorer = TableScorer::new(&[("Amaya with Pepe is cute", 0.4)]);
        let result = attribute("Amaya with Pepe is cute", &roster(&["Amaya", "Pepe"]), &scorer);
        assert!((result["Amaya"] - 0.4).abs() < 1e-6);
        assert!((result["Pepe"] - 0.4).abs() < 1e-6);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mean_over_fragments() {
        let scorer = TableScorer::new(&[("Nic is sweet", 0.6), ("Nic is boring", -0.2)]);
        let result = attribute("Nic is sweet. Nic is boring", &roster(&["Nic"]), &scorer);
        assert!((result["Nic"] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_scorer_failure_skips_fragment() {
        let scorer = TableScorer::new(&[("Iris is lovely", 0.8)]);
        let result = attribute("Iris is lovely, Iris FAIL", &roster(&["Iris"]), &scorer);
        assert!((result["Iris"] - 0.8).abs() < 1e-6);

        let all_fail = attribute("Iris FAIL", &roster(&["Iris"]), &scorer);
        assert!(all_fail.is_empty());
    }

    #[test]
    fn test_roster_cleanup() {
        let scorer = TableScorer::new(&[]);
        let attributor = Attributor::new(&scorer, &roster(&["Ace", "", "  ", "ace", "Taylor"]));
        assert_eq!(attributor.roster_len(), 2);
    }

    #[test]
    fn test_accumulator_reduction() {
        let mut acc = ScoreAccumulator::new();
        assert!(acc.is_empty());
        acc.push("A", 0.2);
        acc.push("A", -0.2);
        acc.push("A", 0.6);
        acc.push("B", -1.0);
        let means = acc.into_means();
        assert!((means["A"] - 0.2).abs() < 1e-9);
        assert_eq!(means["B"], -1.0);
    }
}
