//! Data sources for a season: the roster, the comment corpus and the
//! episode calendar.
//!
//! `RedditCorpus` downloads episode discussion threads through the Reddit
//! API, `WikiClient` scrapes the season's wiki page for the cast table and
//! episode list, and `FileRoster` reads a hand-maintained roster.

pub mod file;
pub mod html;
pub mod provider;
pub mod reddit;
pub mod retry;
pub mod wiki;

pub use file::FileRoster;
pub use provider::{CalendarProvider, CommentBatch, CommentProvider, RosterProvider};
pub use reddit::{RedditClient, RedditCorpus};
pub use retry::RetryPolicy;
pub use wiki::WikiClient;
