//! Season wiki page: cast roster and episode calendar.

use std::time::Duration;

use castsense_core::{Entity, EpisodeRecord, Error, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::html::{wikitables, Cell};
use crate::provider::{CalendarProvider, RosterProvider};

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["\u{201c}](.*?)["\u{201d}]"#).unwrap());
static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static LONG_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2}),\s*(\d{4})").unwrap());

/// Roster column header.
const ROSTER_COLUMN: &str = "islander";

pub struct WikiClient {
    http: Client,
    url_template: String,
    /// Last fetched page, keyed by season.
    page: Mutex<Option<(u32, String)>>,
}

impl WikiClient {
    pub fn new(url_template: impl Into<String>, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            url_template: url_template.into(),
            page: Mutex::new(None),
        })
    }

    pub fn page_url(&self, season: u32) -> String {
        self.url_template.replace("{season}", &season.to_string())
    }

    async fn fetch_page(&self, season: u32) -> Result<String> {
        let mut cached = self.page.lock().await;
        if let Some((cached_season, html)) = cached.as_ref() {
            if *cached_season == season {
                return Ok(html.clone());
            }
        }

        let url = self.page_url(season);
        debug!("Fetching wiki page {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(url));
        }
        if !status.is_success() {
            return Err(Error::Fetch(format!("{} returned {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;
        *cached = Some((season, html.clone()));
        Ok(html)
    }
}

impl RosterProvider for WikiClient {
    async fn get_entities(&self, season: u32) -> Result<Vec<Entity>> {
        let html = self.fetch_page(season).await?;
        let roster = parse_roster(&html)?;
        info!("Wiki roster for season {}: {} entities", season, roster.len());
        Ok(roster)
    }
}

impl CalendarProvider for WikiClient {
    async fn get_calendar(&self, season: u32) -> Result<Vec<EpisodeRecord>> {
        let html = self.fetch_page(season).await?;
        let calendar = parse_calendar(&html)?;
        info!("Wiki calendar for season {}: {} episodes", season, calendar.len());
        Ok(calendar)
    }
}

/// Canonical name from a roster cell: the quoted nickname if there is one,
/// otherwise the first word.
pub fn islander_name(cell: &str) -> Option<String> {
    let name = if cell.contains('"') || cell.contains('\u{201c}') {
        QUOTED
            .captures(cell)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
    } else {
        cell.split_whitespace().next()
    };
    name.filter(|n| !n.is_empty()).map(str::to_string)
}

/// Roster from the first wikitable with an "Islander" column.
pub fn parse_roster(html: &str) -> Result<Vec<Entity>> {
    let tables = wikitables(html);
    let (table, column) = tables
        .iter()
        .find_map(|t| t.column(|h| h == ROSTER_COLUMN).map(|c| (t, c)))
        .ok_or_else(|| Error::Parse("no roster table on wiki page".into()))?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter_map(|cell| islander_name(&cell.text))
        .map(Entity::new)
        .collect())
}

/// Episode calendar from the first wikitable with "Title" and
/// "Original release date" columns. "Week" rows are skipped.
pub fn parse_calendar(html: &str) -> Result<Vec<EpisodeRecord>> {
    let tables = wikitables(html);
    let (table, title_col, date_col) = tables
        .iter()
        .find_map(|t| {
            let title = t.column(|h| h == "title")?;
            let date = t.column(|h| h.contains("original release date"))?;
            Some((t, title, date))
        })
        .ok_or_else(|| {
            Error::Parse("could not find a column containing 'Original release date'".into())
        })?;

    let mut records = Vec::new();
    for row in &table.rows {
        let (Some(title), Some(date)) = (row.get(title_col), row.get(date_col)) else {
            continue;
        };
        if title.text.to_lowercase().contains("week") {
            continue;
        }
        let episode_num = FIRST_INT
            .find(&title.text)
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let airdate = parse_airdate(date);
        match (episode_num, airdate) {
            (Some(episode_num), Some(airdate)) => records.push(EpisodeRecord {
                episode_num,
                airdate,
            }),
            _ => debug!("Skipping calendar row {:?} / {:?}", title.text, date.text),
        }
    }
    Ok(records)
}

/// ISO date embedded in the cell markup, else a "Month D, YYYY" date.
fn parse_airdate(cell: &Cell) -> Option<NaiveDate> {
    if let Some(iso) = ISO_DATE.captures(&cell.html).and_then(|c| c.get(1)) {
        if let Ok(date) = NaiveDate::parse_from_str(iso.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    let caps = LONG_DATE.captures(&cell.text)?;
    let normalised = format!("{} {:0>2} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&normalised, "%B %d %Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <table class="wikitable">
      <tr><th>Islander</th><th>Age</th><th>Status</th></tr>
      <tr><td>Olandria Carthen</td><td>23</td><td>Runner-up</td></tr>
      <tr><td>Cierra &quot;Ace&quot; Greene<sup>[4]</sup></td><td>25</td><td>Dumped</td></tr>
      <tr><td>Taylor &#8220;T&#8221; Williams</td><td>26</td><td>Dumped</td></tr>
    </table>
    <table class="wikitable plainrowheaders">
      <tr><th>No.</th><th>Title</th><th>Original release date<sup>[7]</sup></th></tr>
      <tr><th>1</th><td>"Episode 1"</td><td>June 3, 2025<span style="display:none"> (<span class="published">2025-06-03</span>)</span></td></tr>
      <tr><td colspan="3">Week 1</td></tr>
      <tr><th>-</th><td>Week 2 Recap</td><td>June 9, 2025</td></tr>
      <tr><th>2</th><td>"Episode 2"</td><td>June 4, 2025</td></tr>
      <tr><th>3</th><td>"Episode 3"</td><td>TBA</td></tr>
    </table>"#;

    #[test]
    fn test_islander_name() {
        assert_eq!(islander_name("Olandria Carthen").as_deref(), Some("Olandria"));
        assert_eq!(islander_name("Cierra \"Ace\" Greene").as_deref(), Some("Ace"));
        assert_eq!(islander_name("Taylor \u{201c}T\u{201d} Williams").as_deref(), Some("T"));
        assert_eq!(islander_name("   "), None);
    }

    #[test]
    fn test_parse_roster() {
        let names: Vec<String> = parse_roster(PAGE)
            .unwrap()
            .into_iter()
            .map(|e| e.canonical_name)
            .collect();
        assert_eq!(names, vec!["Olandria", "Ace", "T"]);
    }

    #[test]
    fn test_parse_calendar() {
        let calendar = parse_calendar(PAGE).unwrap();
        assert_eq!(
            calendar,
            vec![
                EpisodeRecord {
                    episode_num: 1,
                    airdate: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                },
                EpisodeRecord {
                    episode_num: 2,
                    airdate: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_tables_are_parse_errors() {
        assert!(matches!(parse_roster("<p>nothing</p>"), Err(Error::Parse(_))));
        assert!(matches!(parse_calendar("<p>nothing</p>"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_page_url() {
        let client = WikiClient::new("https://wiki.test/season_{season}", "castsense-test").unwrap();
        assert_eq!(client.page_url(7), "https://wiki.test/season_7");
    }
}
