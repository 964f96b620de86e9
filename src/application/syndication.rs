//! RSS feed of the latest links.

use std::sync::Arc;

use pockets_api_types::LinkItem;
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

use super::links::LinkListingService;
use crate::config::SiteSettings;
use crate::upstream::{ListQuery, UpstreamError};

/// Seconds public caches may keep the feed.
pub const FEED_MAX_AGE: u64 = 3600;

#[derive(Clone)]
pub struct SyndicationService {
    listing: Arc<LinkListingService>,
    site: SiteSettings,
}

impl SyndicationService {
    pub fn new(listing: Arc<LinkListingService>, site: SiteSettings) -> Self {
        Self { listing, site }
    }

    /// RSS 2.0 document for the first page of links, read through the link
    /// cache.
    pub async fn rss_feed(&self, now: OffsetDateTime) -> Result<String, UpstreamError> {
        let listing = self.listing.list(ListQuery::default()).await?;
        Ok(render_rss(&self.site, &listing.page.data, now))
    }
}

pub fn render_rss(site: &SiteSettings, links: &[LinkItem], now: OffsetDateTime) -> String {
    let base = site.url.as_str().trim_end_matches('/');
    let build_date = format_date(now);

    let mut items = String::new();
    for link in links {
        let target = if link.is_external() {
            link.value.clone()
        } else {
            format!("{base}/{}", link.slug)
        };
        let published = link
            .created_at
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
            .map(format_date)
            .unwrap_or_else(|| build_date.clone());

        items.push_str(&format!(
            "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid isPermaLink=\"false\">{}</guid>\n      <pubDate>{}</pubDate>\n      <description>{}</description>\n    </item>\n",
            xml_escape(&link.name),
            xml_escape(&target),
            xml_escape(&link.id.to_string()),
            published,
            xml_escape(&link.value),
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n    <language>en</language>\n    <lastBuildDate>{}</lastBuildDate>\n    <atom:link href=\"{}/rss.xml\" rel=\"self\" type=\"application/rss+xml\" />\n{}  </channel>\n</rss>\n",
        xml_escape(&site.title),
        xml_escape(base),
        xml_escape(&site.description),
        build_date,
        xml_escape(base),
        items,
    )
}

/// Body served when the feed cannot be built.
pub const FEED_ERROR_BODY: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><error>Failed to generate RSS feed</error>";

fn format_date(at: OffsetDateTime) -> String {
    at.format(&Rfc2822).unwrap_or_else(|_| at.to_string())
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
