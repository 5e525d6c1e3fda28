//! Curated reference links.

use chrono::Utc;
use reqwest::Url;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Reference;

/// Tags offered to users when filing a reference.
pub const PREDEFINED_TAGS: &[&str] = &[
    // content types
    "tutorial", "inspiration", "example", "case-study", "template", "how-to", "behind-the-scenes",
    // creative elements
    "design", "copywriting", "video-style", "photography", "animation", "color-palette", "typography",
    // business functions
    "marketing", "branding", "sales", "customer-service", "product-launch", "campaign",
    // formats
    "reel", "story", "carousel", "single-post", "video", "live-stream", "ugc",
    // niches
    "fashion", "tech", "food", "fitness", "beauty", "b2b", "saas", "ecommerce", "healthcare", "finance",
    // campaign types
    "seasonal", "holiday", "trending", "evergreen", "promotional", "educational",
    // intent
    "steal-this", "avoid-this", "show-client", "study-later", "competitor-analysis",
];

const PLATFORMS: &[(&str, &[&str])] = &[
    ("youtube", &["youtube.com", "youtu.be"]),
    ("instagram", &["instagram.com"]),
    ("tiktok", &["tiktok.com"]),
    ("twitter", &["twitter.com", "x.com"]),
    ("linkedin", &["linkedin.com"]),
    ("pinterest", &["pinterest.com"]),
    ("facebook", &["facebook.com", "fb.com"]),
];

/// Platform label for a URL, from its host. Unparsable URLs are `unknown`.
pub fn detect_platform(url: &str) -> &'static str {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown";
    };
    let Some(host) = parsed.host_str() else {
        return "unknown";
    };
    let host = host.to_lowercase();

    PLATFORMS
        .iter()
        .find(|(_, domains)| {
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
        .map_or("website", |(platform, _)| *platform)
}

/// File a new reference for a workspace.
pub async fn create_reference(
    db: &Database,
    workspace_id: &str,
    url: &str,
    note: Option<&str>,
) -> Result<Reference> {
    let url = url.trim();
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => return Err(Error::Validation(format!("invalid url '{url}'"))),
    }

    let now = Utc::now();
    let reference = Reference {
        id: Uuid::new_v4(),
        workspace_id: workspace_id.to_string(),
        url: url.to_string(),
        note: note.map(str::trim).filter(|n| !n.is_empty()).map(ToOwned::to_owned),
        title: None,
        description: None,
        thumbnail: None,
        platform: detect_platform(url).to_string(),
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    db.insert_reference(&reference).await?;
    Ok(reference)
}

/// Update the note and/or tags of a reference. Tags are normalized first.
pub async fn update_reference(
    db: &Database,
    workspace_id: &str,
    id: Uuid,
    note: Option<&str>,
    tags: Option<&[String]>,
) -> Result<Reference> {
    let tags = tags.map(normalize_tags);
    db.update_reference(workspace_id, id, note.map(str::trim), tags.as_deref())
        .await
}

/// Normalize user tags: trimmed, lowercased, de-duplicated, empty entries dropped.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_platforms() {
        assert_eq!(detect_platform("https://www.youtube.com/watch?v=abc"), "youtube");
        assert_eq!(detect_platform("https://youtu.be/abc"), "youtube");
        assert_eq!(detect_platform("https://instagram.com/p/xyz"), "instagram");
        assert_eq!(detect_platform("https://x.com/someone/status/1"), "twitter");
        assert_eq!(detect_platform("https://m.facebook.com/page"), "facebook");
        assert_eq!(detect_platform("https://www.linkedin.com/in/me"), "linkedin");
    }

    #[test]
    fn lookalike_hosts_are_websites() {
        assert_eq!(detect_platform("https://notyoutube.com/watch"), "website");
        assert_eq!(detect_platform("https://example.com/x.com"), "website");
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(detect_platform("not a url"), "unknown");
    }

    #[test]
    fn tags_are_normalized() {
        let tags = vec![
            " Reel ".to_string(),
            "reel".to_string(),
            String::new(),
            "steal-this".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), ["reel", "steal-this"]);
    }

    #[test]
    fn predefined_tags_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(PREDEFINED_TAGS.iter().all(|t| seen.insert(*t)));
    }
}
