//! Reddit comment corpus via the OAuth API (application-only auth).

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use castsense_core::{Comment, EpisodePost, Error, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::provider::{CommentBatch, CommentProvider};
use crate::retry::RetryPolicy;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Title marker of an episode discussion thread.
pub const DISCUSSION_MARKER: &str = "Post Episode Discussion";

/// Maximum ids per `/api/morechildren` request.
const MORE_BATCH: usize = 100;
const SEARCH_PAGE: usize = 100;

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(client_id: &str, client_secret: &str, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(t) = token.as_ref() {
            if t.expires_at > Instant::now() {
                return Ok(t.value.clone());
            }
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("token request failed: {}", e)))?;
        let body = check_status(response).await?;

        let value = body["access_token"]
            .as_str()
            .ok_or_else(|| Error::Config("Reddit rejected the client credentials".into()))?
            .to_string();
        let ttl = body["expires_in"].as_u64().unwrap_or(3600);
        debug!("Obtained Reddit token, valid for {}s", ttl);

        *token = Some(AccessToken {
            value: value.clone(),
            // Refresh a minute early.
            expires_at: Instant::now() + Duration::from_secs(ttl.saturating_sub(60)),
        });
        Ok(value)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let token = self.access_token().await?;
        let url = format!("{}{}", API_BASE, path);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", path, e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
        }
        check_status(response).await
    }

    /// Discussion threads matching `query` in `subreddit`, newest first
    /// from the API, at most `limit` search results inspected.
    pub async fn search_threads(
        &self,
        subreddit: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EpisodePost>> {
        let path = format!("/r/{}/search", subreddit);
        let mut threads = Vec::new();
        let mut after: Option<String> = None;
        let mut seen = 0;

        while seen < limit {
            let page = SEARCH_PAGE.min(limit - seen);
            let mut params = vec![
                ("q", query.to_string()),
                ("restrict_sr", "1".to_string()),
                ("sort", "new".to_string()),
                ("limit", page.to_string()),
                ("raw_json", "1".to_string()),
            ];
            if let Some(a) = &after {
                params.push(("after", a.clone()));
            }

            let listing = self.get_json(&path, &params).await?;
            let (posts, next, count) = parse_search_listing(&listing);
            seen += count;
            threads.extend(posts.into_iter().filter(|p| is_discussion_thread(&p.title)));

            match next {
                Some(n) if count > 0 => after = Some(n),
                _ => break,
            }
        }

        debug!("Search {:?} inspected {} results", query, seen);
        Ok(threads)
    }

    /// Every comment of a thread, with collapsed branches expanded.
    ///
    /// `more` placeholders listing ids go through `/api/morechildren`. The
    /// "continue this thread" kind lists none and is followed by fetching the
    /// parent comment's own thread page.
    pub async fn thread_comments(&self, post: &EpisodePost) -> Result<Vec<Comment>> {
        let body = self
            .get_json(
                &format!("/comments/{}", post.post_id),
                &[("limit", "500".to_string()), ("raw_json", "1".to_string())],
            )
            .await?;

        let mut comments = Vec::new();
        let mut expand = Expansions::default();
        collect_comments(&body[1]["data"]["children"], post, &mut comments, &mut expand);

        let mut requested: HashSet<String> = HashSet::new();
        let mut followed: HashSet<String> = HashSet::new();
        loop {
            if !expand.more.is_empty() {
                let batch: Vec<String> = expand
                    .more
                    .drain(..expand.more.len().min(MORE_BATCH))
                    .filter(|id| requested.insert(id.clone()))
                    .collect();
                if batch.is_empty() {
                    continue;
                }

                let more = self
                    .get_json(
                        "/api/morechildren",
                        &[
                            ("api_type", "json".to_string()),
                            ("link_id", format!("t3_{}", post.post_id)),
                            ("children", batch.join(",")),
                            ("raw_json", "1".to_string()),
                        ],
                    )
                    .await?;
                collect_comments(&more["json"]["data"]["things"], post, &mut comments, &mut expand);
                continue;
            }

            let Some(parent) = expand.deeper.pop() else {
                break;
            };
            if !followed.insert(parent.clone()) {
                continue;
            }
            debug!("Following continued thread below {}", parent);
            let body = self
                .get_json(
                    &format!("/comments/{}/_/{}", post.post_id, parent),
                    &[("limit", "500".to_string()), ("raw_json", "1".to_string())],
                )
                .await?;
            collect_comments(
                continuation_replies(&body[1], &parent),
                post,
                &mut comments,
                &mut expand,
            );
        }

        Ok(comments)
    }
}

async fn check_status(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited(format!("Reddit returned {}", status)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Fetch(format!("Reddit returned {}: {}", status, body)));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Parse(format!("Reddit response: {}", e)))
}

pub fn is_discussion_thread(title: &str) -> bool {
    title.contains(DISCUSSION_MARKER)
}

/// Posts of one search page, the `after` cursor, and the raw result count.
fn parse_search_listing(listing: &Value) -> (Vec<EpisodePost>, Option<String>, usize) {
    let children = listing["data"]["children"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    let posts = children
        .iter()
        .filter(|c| c["kind"] == "t3")
        .filter_map(|c| {
            let d = &c["data"];
            Some(EpisodePost {
                post_id: d["id"].as_str()?.to_string(),
                title: d["title"].as_str().unwrap_or_default().to_string(),
                created_utc: as_unix(&d["created_utc"]),
                score: d["score"].as_i64().unwrap_or(0),
                num_comments: d["num_comments"].as_i64().unwrap_or(0),
            })
        })
        .collect();
    let after = listing["data"]["after"].as_str().map(str::to_string);
    (posts, after, children.len())
}

/// Branches of a comment tree the listing did not include.
#[derive(Debug, Default)]
struct Expansions {
    /// Collapsed comment ids for `/api/morechildren`.
    more: Vec<String>,
    /// Comments whose replies sit below the depth cutoff.
    deeper: Vec<String>,
}

/// Walk a comment forest depth-first, noting `more` placeholders in `expand`.
fn collect_comments(
    children: &Value,
    post: &EpisodePost,
    out: &mut Vec<Comment>,
    expand: &mut Expansions,
) {
    let Some(children) = children.as_array() else {
        return;
    };
    for child in children {
        let data = &child["data"];
        match child["kind"].as_str() {
            Some("t1") => {
                out.push(Comment {
                    text: data["body"].as_str().unwrap_or_default().to_string(),
                    upvote_score: data["score"].as_i64().unwrap_or(0),
                    author: data["author"].as_str().unwrap_or("[deleted]").to_string(),
                    timestamp: as_unix(&data["created_utc"]),
                    episode_post_id: post.post_id.clone(),
                    episode_title: post.title.clone(),
                });
                collect_comments(&data["replies"]["data"]["children"], post, out, expand);
            }
            Some("more") => {
                let ids = data["children"].as_array().map(Vec::as_slice).unwrap_or_default();
                if ids.is_empty() {
                    if let Some(parent) = data["parent_id"].as_str() {
                        let parent = parent.strip_prefix("t1_").unwrap_or(parent);
                        expand.deeper.push(parent.to_string());
                    }
                } else {
                    expand
                        .more
                        .extend(ids.iter().filter_map(|id| id.as_str().map(str::to_string)));
                }
            }
            _ => {}
        }
    }
}

/// Replies below `parent` in a permalink listing. The parent itself heads the
/// listing and was already collected.
fn continuation_replies<'a>(listing: &'a Value, parent: &str) -> &'a Value {
    let root = &listing["data"]["children"][0];
    if root["data"]["id"].as_str() == Some(parent) {
        &root["data"]["replies"]["data"]["children"]
    } else {
        &listing["data"]["children"]
    }
}

fn as_unix(v: &Value) -> i64 {
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

/// Download threads one at a time through the retry policy.
///
/// Threads that fail every attempt are listed in `skipped`; later threads
/// are still fetched.
pub async fn download_threads<F, Fut>(
    threads: Vec<EpisodePost>,
    retry: &RetryPolicy,
    fetch: F,
) -> CommentBatch
where
    F: Fn(EpisodePost) -> Fut,
    Fut: Future<Output = Result<Vec<Comment>>>,
{
    let mut batch = CommentBatch::default();
    for post in threads {
        info!("Processing: {}", post.title);
        let downloaded = retry.run(&post.title, |_| fetch(post.clone())).await;
        match downloaded {
            Some(comments) => {
                info!("Saved {} comments for: {}", comments.len(), post.title);
                batch.comments.extend(comments);
                batch.posts.push(post);
            }
            None => batch.skipped.push(post.post_id),
        }
    }
    batch
}

/// Episode discussion threads of one subreddit.
pub struct RedditCorpus {
    client: RedditClient,
    subreddit: String,
    retry: RetryPolicy,
    known_posts: HashSet<String>,
    search_limit: usize,
}

impl RedditCorpus {
    pub fn new(client: RedditClient, subreddit: impl Into<String>) -> Self {
        Self {
            client,
            subreddit: subreddit.into(),
            retry: RetryPolicy::default(),
            known_posts: HashSet::new(),
            search_limit: 500,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Threads to leave out (already downloaded).
    pub fn with_known_posts(mut self, known: HashSet<String>) -> Self {
        self.known_posts = known;
        self
    }
}

impl CommentProvider for RedditCorpus {
    async fn get_comments(&self, season: u32) -> Result<CommentBatch> {
        let query = format!("Season {} Episode", season);
        let found = self
            .client
            .search_threads(&self.subreddit, &query, self.search_limit)
            .await?;
        let total = found.len();

        let mut threads: Vec<EpisodePost> = found
            .into_iter()
            .filter(|p| !self.known_posts.contains(&p.post_id))
            .collect();
        threads.sort_by_key(|p| p.created_utc);
        threads.dedup_by(|a, b| a.post_id == b.post_id);

        if threads.is_empty() {
            info!("No new episode threads ({} already downloaded)", total);
            return Ok(CommentBatch::default());
        }
        info!(
            "Found {} discussion threads for season {}, {} new",
            total,
            season,
            threads.len()
        );

        let batch = download_threads(threads, &self.retry, |post| async move {
            self.client.thread_comments(&post).await
        })
        .await;

        if !batch.skipped.is_empty() {
            warn!("{} threads skipped after retries", batch.skipped.len());
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: &str, title: &str) -> EpisodePost {
        EpisodePost {
            post_id: id.into(),
            title: title.into(),
            created_utc: 0,
            score: 0,
            num_comments: 0,
        }
    }

    #[test]
    fn test_discussion_filter() {
        assert!(is_discussion_thread(
            "Love Island USA Season 7 Episode 12 Post Episode Discussion"
        ));
        assert!(!is_discussion_thread("Season 7 Episode 12 Live Discussion"));
    }

    #[test]
    fn test_parse_search_listing() {
        let listing = json!({
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "children": [
                    {"kind": "t3", "data": {"id": "a", "title": "Season 7 Episode 1 Post Episode Discussion",
                        "created_utc": 1749000000.0, "score": 120, "num_comments": 900}},
                    {"kind": "t3", "data": {"id": "b", "title": "Casting thread", "created_utc": 1749100000}}
                ]
            }
        });
        let (posts, after, count) = parse_search_listing(&listing);
        assert_eq!(count, 2);
        assert_eq!(after.as_deref(), Some("t3_b"));
        assert_eq!(posts[0].created_utc, 1_749_000_000);
        assert_eq!(posts[0].num_comments, 900);
        assert_eq!(posts[1].score, 0);
    }

    #[test]
    fn test_collect_comments_flattens_tree() {
        let thread = post("abc", "Season 7 Episode 3 Post Episode Discussion");
        let children = json!([
            {"kind": "t1", "data": {
                "body": "Huda is chaotic", "score": 10, "author": "fan1", "created_utc": 100.0,
                "replies": {"kind": "Listing", "data": {"children": [
                    {"kind": "t1", "data": {"body": "agreed", "score": 2, "author": "fan2",
                        "created_utc": 101.0, "replies": ""}},
                    {"kind": "more", "data": {"children": ["x1", "x2"]}}
                ]}}
            }},
            {"kind": "t1", "data": {"body": "Ace!!", "score": 4, "created_utc": 102, "replies": ""}}
        ]);

        let mut out = Vec::new();
        let mut expand = Expansions::default();
        collect_comments(&children, &thread, &mut out, &mut expand);

        let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Huda is chaotic", "agreed", "Ace!!"]);
        assert_eq!(out[2].author, "[deleted]");
        assert_eq!(out[0].episode_title, thread.title);
        assert_eq!(expand.more, vec!["x1", "x2"]);
        assert!(expand.deeper.is_empty());
    }

    #[test]
    fn test_continue_thread_placeholder_is_followed() {
        let thread = post("abc", "Season 7 Episode 3 Post Episode Discussion");
        let children = json!([
            {"kind": "t1", "data": {
                "id": "deep1", "body": "ten replies deep", "score": 1, "author": "fan1",
                "created_utc": 100,
                "replies": {"kind": "Listing", "data": {"children": [
                    {"kind": "more", "data": {"count": 0, "children": [],
                        "id": "_", "parent_id": "t1_deep1"}}
                ]}}
            }}
        ]);

        let mut out = Vec::new();
        let mut expand = Expansions::default();
        collect_comments(&children, &thread, &mut out, &mut expand);
        assert_eq!(out.len(), 1);
        assert!(expand.more.is_empty());
        assert_eq!(expand.deeper, vec!["deep1"]);

        // The permalink page repeats the parent; only its replies are new.
        let page = json!({"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {
                "id": "deep1", "body": "ten replies deep", "score": 1, "created_utc": 100,
                "replies": {"kind": "Listing", "data": {"children": [
                    {"kind": "t1", "data": {"id": "deep2", "body": "Jeremiah fumbled",
                        "score": 3, "author": "fan2", "created_utc": 101, "replies": ""}}
                ]}}
            }}
        ]}});
        let mut expand = Expansions::default();
        collect_comments(continuation_replies(&page, "deep1"), &thread, &mut out, &mut expand);

        let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ten replies deep", "Jeremiah fumbled"]);
        assert_eq!(out[1].episode_post_id, "abc");
        assert!(expand.more.is_empty() && expand.deeper.is_empty());
    }

    #[test]
    fn test_continuation_without_parent_uses_whole_listing() {
        let page = json!({"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {"id": "other", "body": "x"}}
        ]}});
        let replies = continuation_replies(&page, "deep1");
        assert_eq!(replies.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_failed_thread_is_skipped() {
        let threads = vec![
            post("one", "Season 7 Episode 1 Post Episode Discussion"),
            post("two", "Season 7 Episode 2 Post Episode Discussion"),
            post("three", "Season 7 Episode 3 Post Episode Discussion"),
        ];
        let batch = download_threads(threads, &RetryPolicy::immediate(), |p| async move {
            if p.post_id == "two" {
                return Err(Error::Fetch("connection reset".into()));
            }
            Ok(vec![Comment {
                text: format!("comment in {}", p.post_id),
                upvote_score: 1,
                author: "fan".into(),
                timestamp: 0,
                episode_post_id: p.post_id.clone(),
                episode_title: p.title.clone(),
            }])
        })
        .await;

        assert_eq!(batch.skipped, vec!["two"]);
        assert_eq!(batch.posts.len(), 2);
        assert_eq!(batch.comments.len(), 2);
        assert_eq!(batch.comments[1].episode_post_id, "three");
    }
}
