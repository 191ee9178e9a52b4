//! Word-list sentiment scorer used when no ONNX model is available.
//!
//! Each lexicon hit contributes its intensity to the positive or negative
//! mass; a negator directly before a hit flips it. Masses are normalised by
//! token count so that `neutral` absorbs everything the lexicon does not
//! recognise, giving a proper three-class distribution.

use std::collections::HashMap;

use castsense_core::{Error, Result};
use once_cell::sync::Lazy;

use crate::scorer::{SentimentDistribution, SentimentScorer};

static LEXICON: Lazy<HashMap<&'static str, f32>> = Lazy::new(|| {
    let positive: &[(&str, f32)] = &[
        ("love", 1.5), ("loved", 1.5), ("loving", 1.0), ("lovely", 1.0),
        ("adore", 1.5), ("obsessed", 1.0), ("great", 1.0), ("amazing", 1.5),
        ("awesome", 1.5), ("excellent", 1.5), ("perfect", 1.5), ("best", 1.0),
        ("good", 1.0), ("nice", 1.0), ("iconic", 1.5), ("queen", 1.0),
        ("king", 1.0), ("funny", 1.0), ("hilarious", 1.5), ("sweet", 1.0),
        ("cute", 1.0), ("gorgeous", 1.0), ("beautiful", 1.0), ("stunning", 1.0),
        ("genuine", 1.0), ("authentic", 1.0), ("kind", 1.0), ("loyal", 1.0),
        ("smart", 1.0), ("mature", 1.0), ("wholesome", 1.0), ("fun", 1.0),
        ("happy", 1.0), ("like", 0.5), ("likes", 0.5), ("fave", 1.0),
        ("favorite", 1.0), ("favourite", 1.0), ("deserves", 0.5), ("slay", 1.0),
        ("winner", 1.0), ("rooting", 1.0), ("respect", 1.0),
    ];
    let negative: &[(&str, f32)] = &[
        ("hate", 1.5), ("hated", 1.5), ("annoying", 1.0), ("irritating", 1.0),
        ("terrible", 1.5), ("awful", 1.5), ("horrible", 1.5), ("worst", 1.5),
        ("bad", 1.0), ("fake", 1.0), ("toxic", 1.5), ("boring", 1.0),
        ("rude", 1.0), ("mean", 0.5), ("messy", 0.5), ("snake", 1.5),
        ("liar", 1.5), ("lying", 1.0), ("disgusting", 1.5), ("gross", 1.0),
        ("cringe", 1.0), ("ick", 1.0), ("pathetic", 1.5), ("manipulative", 1.5),
        ("delusional", 1.0), ("creepy", 1.0), ("weird", 0.5), ("disrespectful", 1.5),
        ("shady", 1.0), ("petty", 1.0), ("dumb", 1.0), ("stupid", 1.0),
        ("insufferable", 1.5), ("obnoxious", 1.5), ("jealous", 1.0), ("selfish", 1.0),
        ("trash", 1.5), ("problematic", 1.0), ("childish", 1.0), ("immature", 1.0),
        ("desperate", 1.0), ("clown", 1.0), ("embarrassing", 1.0), ("unbearable", 1.5),
        ("sad", 0.5), ("dislike", 1.0),
    ];
    positive
        .iter()
        .copied()
        .chain(negative.iter().map(|&(w, v)| (w, -v)))
        .collect()
});

const NEGATORS: &[&str] = &[
    "not", "no", "never", "isnt", "dont", "doesnt", "didnt", "wasnt", "cant", "aint",
];

/// Deterministic lexicon scorer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
            .map(|t| {
                t.chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(|c| c.to_lowercase())
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl SentimentScorer for LexiconScorer {
    fn distribution(&self, text: &str) -> Result<SentimentDistribution> {
        let tokens = Self::tokens(text);
        if tokens.is_empty() {
            return Err(Error::Inference("empty span".into()));
        }

        let mut positive = 0.0f32;
        let mut negative = 0.0f32;
        for (i, token) in tokens.iter().enumerate() {
            let Some(&weight) = LEXICON.get(token.as_str()) else {
                continue;
            };
            let negated = i > 0 && NEGATORS.contains(&tokens[i - 1].as_str());
            let weight = if negated { -weight } else { weight };
            if weight > 0.0 {
                positive += weight;
            } else {
                negative -= weight;
            }
        }

        let mass = (tokens.len() as f32).max(positive + negative);
        let positive = positive / mass;
        let negative = negative / mass;
        Ok(SentimentDistribution {
            negative,
            neutral: (1.0 - positive - negative).max(0.0),
            positive,
        })
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}
