//! Episode calendar: episode number → air date.

use std::collections::BTreeMap;

use castsense_core::{EpisodeRecord, Error, Result};
use chrono::NaiveDate;

/// A validated season calendar.
///
/// Episode numbers are unique and air dates strictly increase with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calendar {
    by_episode: BTreeMap<u32, NaiveDate>,
}

impl Calendar {
    pub fn new(records: impl IntoIterator<Item = EpisodeRecord>) -> Result<Self> {
        let mut by_episode = BTreeMap::new();
        for record in records {
            if by_episode.insert(record.episode_num, record.airdate).is_some() {
                return Err(Error::Calendar(format!(
                    "episode {} listed more than once",
                    record.episode_num
                )));
            }
        }

        let mut previous: Option<(u32, NaiveDate)> = None;
        for (&num, &date) in &by_episode {
            if let Some((prev_num, prev_date)) = previous {
                if date <= prev_date {
                    return Err(Error::Calendar(format!(
                        "episode {} airs {} but episode {} airs {}",
                        num, date, prev_num, prev_date
                    )));
                }
            }
            previous = Some((num, date));
        }

        Ok(Self { by_episode })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn airdate(&self, episode_num: u32) -> Option<NaiveDate> {
        self.by_episode.get(&episode_num).copied()
    }

    /// Records ordered by episode number.
    pub fn records(&self) -> Vec<EpisodeRecord> {
        self.by_episode
            .iter()
            .map(|(&episode_num, &airdate)| EpisodeRecord {
                episode_num,
                airdate,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_episode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_episode.is_empty()
    }
}
