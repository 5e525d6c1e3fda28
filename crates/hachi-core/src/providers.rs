//! HTTP metric providers for YouTube and Instagram.
//!
//! Both read a point-in-time snapshot with the integration's stored access
//! token. Token exchange and refresh happen elsewhere; an expired token shows
//! up here as an upstream error for that workspace.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{Aggregation, Integration, Kpi};
use crate::sync::{MetricProvider, Reading};

fn gauge(id: &str, name: &str, channel: &str, unit: &str) -> Kpi {
    Kpi {
        id: id.to_string(),
        name: name.to_string(),
        channel: channel.to_string(),
        unit: unit.to_string(),
        aggregation: Aggregation::Last,
    }
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(Error::from)
}

// =============================================================================
// YouTube
// =============================================================================

/// Channel statistics via the YouTube Data API (`channels?part=statistics&mine=true`).
pub struct YouTubeProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    statistics: ChannelStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

impl YouTubeProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.youtube_api_base, config.timeout_secs)
    }
}

impl MetricProvider for YouTubeProvider {
    fn provider(&self) -> &'static str {
        "youtube"
    }

    fn source(&self) -> &'static str {
        "youtube:channels.statistics"
    }

    async fn fetch(&self, integration: &Integration) -> Result<Vec<Reading>> {
        // The stored channel id wins; otherwise ask for the token owner's channel.
        let selector = match integration.external_account_id.as_deref() {
            Some(channel_id) => ("id", channel_id),
            None => ("mine", "true"),
        };
        let list: ChannelList = self
            .client
            .get(format!("{}/channels", self.base_url))
            .bearer_auth(&integration.access_token)
            .query(&[("part", "statistics"), selector])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let channel = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream("no YouTube channel for this account".to_string()))?;
        let stats = channel.statistics;

        Ok(vec![
            Reading {
                kpi: gauge("k_yt_subs", "Subscribers", "YouTube", "count"),
                value: parse_count(stats.subscriber_count.as_deref()),
            },
            Reading {
                kpi: gauge("k_yt_views", "Views", "YouTube", "count"),
                value: parse_count(stats.view_count.as_deref()),
            },
            Reading {
                kpi: gauge("k_yt_videos", "Videos", "YouTube", "count"),
                value: parse_count(stats.video_count.as_deref()),
            },
        ])
    }
}

/// YouTube reports counts as decimal strings; missing or hidden counts read as 0.
fn parse_count(value: Option<&str>) -> f64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0.0)
}

// =============================================================================
// Instagram
// =============================================================================

/// Profile counts and recent-post engagement via the Instagram Graph API.
pub struct InstagramProvider {
    client: Client,
    base_url: String,
}

/// Number of recent posts averaged for engagement.
const ENGAGEMENT_SAMPLE: usize = 12;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Profile {
    followers_count: f64,
    follows_count: f64,
    media_count: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaPage {
    data: Vec<Media>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Media {
    like_count: f64,
    comments_count: f64,
}

/// Average likes+comments per post, and that average as a percentage of followers.
///
/// Both are 0.0 when there are no posts; the rate is 0.0 without followers.
pub fn engagement(followers: f64, interactions: &[(f64, f64)]) -> (f64, f64) {
    if interactions.is_empty() {
        return (0.0, 0.0);
    }
    let total: f64 = interactions.iter().map(|(likes, comments)| likes + comments).sum();
    let avg = total / interactions.len() as f64;
    let rate = if followers > 0.0 {
        avg / followers * 100.0
    } else {
        0.0
    };
    (avg, rate)
}

impl InstagramProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.instagram_api_base, config.timeout_secs)
    }
}

impl MetricProvider for InstagramProvider {
    fn provider(&self) -> &'static str {
        "instagram"
    }

    fn source(&self) -> &'static str {
        "instagram:graph"
    }

    async fn fetch(&self, integration: &Integration) -> Result<Vec<Reading>> {
        let account = integration.external_account_id.as_deref().unwrap_or("me");
        let token = integration.access_token.as_str();

        let profile: Profile = self
            .client
            .get(format!("{}/{account}", self.base_url))
            .query(&[
                ("fields", "followers_count,follows_count,media_count"),
                ("access_token", token),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let limit = ENGAGEMENT_SAMPLE.to_string();
        let media: MediaPage = self
            .client
            .get(format!("{}/{account}/media", self.base_url))
            .query(&[
                ("fields", "id,like_count,comments_count,timestamp"),
                ("limit", limit.as_str()),
                ("access_token", token),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let interactions: Vec<(f64, f64)> = media
            .data
            .iter()
            .take(ENGAGEMENT_SAMPLE)
            .map(|m| (m.like_count, m.comments_count))
            .collect();
        let (avg_engagement, engagement_rate) = engagement(profile.followers_count, &interactions);

        Ok(vec![
            Reading {
                kpi: gauge("k_ig_followers", "Followers", "Instagram", "count"),
                value: profile.followers_count,
            },
            Reading {
                kpi: gauge("k_ig_following", "Following", "Instagram", "count"),
                value: profile.follows_count,
            },
            Reading {
                kpi: gauge("k_ig_posts", "Posts", "Instagram", "count"),
                value: profile.media_count,
            },
            Reading {
                kpi: gauge("k_ig_avg_engagement", "Avg Engagement", "Instagram", "count"),
                value: avg_engagement,
            },
            Reading {
                kpi: gauge("k_ig_engagement_rate", "Engagement Rate", "Instagram", "percent"),
                value: engagement_rate,
            },
        ])
    }
}
