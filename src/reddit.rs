use crate::http::{self, HttpResponse};
use crate::sources::{Post, PostLister, PostStream};
use crate::{EngineError, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_AUTH_BASE: &str = "https://www.reddit.com";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";
const API_TIMEOUT_SECS: u64 = 30;
const MAX_PAGE_SIZE: usize = 100;
const MAX_API_BODY_BYTES: u64 = 16 * 1024 * 1024;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_PASSWORD: &str = "REDDIT_PASSWORD";

/// Script-app credentials. All fields are required and checked once here.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    user_agent: String,
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let fields = [
            (ENV_CLIENT_ID, client_id.into()),
            (ENV_CLIENT_SECRET, client_secret.into()),
            (ENV_USER_AGENT, user_agent.into()),
            (ENV_USERNAME, username.into()),
            (ENV_PASSWORD, password.into()),
        ];
        Self::from_lookup(|name| {
            fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds credentials from a name lookup, reporting every missing or
    /// blank field at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing: Vec<&str> = Vec::new();
        let mut get = |name: &'static str| -> String {
            match lookup(name).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let creds = Self {
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            user_agent: get(ENV_USER_AGENT),
            username: get(ENV_USERNAME),
            password: get(ENV_PASSWORD),
        };

        if !missing.is_empty() {
            return Err(EngineError::Authentication(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }
        Ok(creds)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditEndpoints {
    pub auth_base: String,
    pub api_base: String,
}

impl Default for RedditEndpoints {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: ListingPost,
}

#[derive(Debug, Deserialize)]
struct ListingPost {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: String,
}

/// Authenticated Reddit API client.
pub struct RedditClient {
    agent: ureq::Agent,
    endpoints: RedditEndpoints,
    access_token: String,
    user_agent: String,
}

impl RedditClient {
    /// Password-grant login. Any rejection is an authentication error.
    pub fn authenticate(credentials: &Credentials, endpoints: RedditEndpoints) -> Result<Self> {
        let agent = http::build_agent(API_TIMEOUT_SECS);
        let token_url = format!(
            "{}/api/v1/access_token",
            endpoints.auth_base.trim_end_matches('/')
        );
        let basic = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let authorization = format!("Basic {basic}");

        let mut response = agent
            .post(&token_url)
            .header("Authorization", authorization.as_str())
            .header("User-Agent", credentials.user_agent())
            .send_form([
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .map_err(|e| EngineError::Authentication(format!("token request failed: {e}")))?;

        if !http::is_success(&response) {
            return Err(EngineError::Authentication(format!(
                "token request rejected (status={})",
                response.status().as_u16()
            )));
        }

        let token: TokenResponse = read_json(&mut response)
            .map_err(|e| EngineError::Authentication(format!("unreadable token response: {e}")))?;
        if let Some(error) = token.error {
            return Err(EngineError::Authentication(format!(
                "platform rejected credentials: {error}"
            )));
        }
        let access_token = token
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Authentication("token response had no access_token".to_string())
            })?;

        info!(username = credentials.username(), "authenticated with reddit");
        Ok(Self {
            agent,
            endpoints,
            access_token,
            user_agent: credentials.user_agent().to_string(),
        })
    }

    fn listing(&self, path: String, source_name: &str, limit: usize) -> Result<PostStream<'_>> {
        let mut listing = RedditListing {
            client: self,
            path,
            source_name: source_name.to_string(),
            remaining: limit,
            buffer: VecDeque::new(),
            after: None,
            exhausted: limit == 0,
        };
        if !listing.exhausted {
            listing.fill()?;
        }
        Ok(Box::new(listing))
    }

    fn fetch_page(
        &self,
        path: &str,
        source_name: &str,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<ListingPage> {
        let base = format!("{}{}", self.endpoints.api_base.trim_end_matches('/'), path);
        let mut url = Url::parse(&base).map_err(|e| EngineError::Http(format!("{base}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page_size.to_string());
            query.append_pair("raw_json", "1");
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }

        let authorization = format!("bearer {}", self.access_token);
        let mut response = http::call_get(
            &self.agent,
            url.as_str(),
            &[
                ("Authorization", authorization.as_str()),
                ("User-Agent", self.user_agent.as_str()),
            ],
        )
        .map_err(|e| EngineError::Http(format!("listing request for {source_name} failed: {e}")))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            403 | 404 => {
                return Err(EngineError::SourceUnavailable {
                    source_name: source_name.to_string(),
                    reason: format!("status={status}"),
                })
            }
            _ => {
                return Err(EngineError::Http(format!(
                    "listing request for {source_name} failed (status={status})"
                )))
            }
        }

        let listing: Listing = read_json(&mut response)?;
        let fetched = listing.data.children.len();
        let posts: Vec<Post> = listing
            .data
            .children
            .into_iter()
            .filter_map(|child| {
                let post = child.data;
                let url = post.url.filter(|u| !u.trim().is_empty())?;
                Some(Post {
                    id: post.id,
                    url,
                    title: post.title,
                })
            })
            .collect();
        Ok(ListingPage {
            dropped: fetched - posts.len(),
            posts,
            after: listing.data.after.filter(|a| !a.is_empty()),
        })
    }
}

impl PostLister for RedditClient {
    fn list_new_posts(&self, forum: &str, limit: usize) -> Result<PostStream<'_>> {
        self.listing(format!("/r/{forum}/new"), forum, limit)
    }

    fn list_user_posts(&self, username: &str, limit: usize) -> Result<PostStream<'_>> {
        self.listing(format!("/user/{username}/submitted"), username, limit)
    }
}

struct ListingPage {
    posts: Vec<Post>,
    /// Children without a usable url. They still count against the limit.
    dropped: usize,
    after: Option<String>,
}

/// Pages through a listing only as far as the consumer pulls.
struct RedditListing<'a> {
    client: &'a RedditClient,
    path: String,
    source_name: String,
    remaining: usize,
    buffer: VecDeque<Post>,
    after: Option<String>,
    exhausted: bool,
}

impl RedditListing<'_> {
    fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let page_size = self.remaining.min(MAX_PAGE_SIZE);
            let previous = self.after.take();
            let page = self.client.fetch_page(
                &self.path,
                &self.source_name,
                page_size,
                previous.as_deref(),
            )?;
            debug!(
                source = %self.source_name,
                count = page.posts.len(),
                dropped = page.dropped,
                more = page.after.is_some(),
                "fetched listing page"
            );
            self.remaining = self.remaining.saturating_sub(page.dropped);
            // An empty page or a cursor that does not advance would refetch forever.
            let stalled = page.after == previous || (page.posts.is_empty() && page.dropped == 0);
            self.exhausted = page.after.is_none() || stalled || self.remaining == 0;
            self.after = page.after;
            self.buffer.extend(page.posts);
        }
        Ok(())
    }
}

impl Iterator for RedditListing<'_> {
    type Item = Result<Post>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.buffer.is_empty() {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                self.remaining = 0;
                return Some(Err(err));
            }
        }
        let post = self.buffer.pop_front()?;
        self.remaining -= 1;
        Some(Ok(post))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: &mut HttpResponse) -> Result<T> {
    let body = http::read_body_within(response, MAX_API_BODY_BYTES)?;
    Ok(serde_json::from_slice(&body)?)
}
