//! Title and description scraping for the admin link form.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use axum::http::StatusCode;
use lol_html::{RewriteStrSettings, element, rewrite_str, text};
use pockets_api_types::MetadataResponse;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::error::HttpError;

const SOURCE: &str = "application::metadata";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Missing url parameter")]
    MissingUrl,
    #[error("Failed to fetch metadata")]
    InvalidUrl,
    #[error("Failed to fetch metadata")]
    Fetch(#[from] reqwest::Error),
    #[error("Failed to fetch metadata")]
    Parse(String),
}

impl From<MetadataError> for HttpError {
    fn from(err: MetadataError) -> Self {
        let status = match err {
            MetadataError::MissingUrl => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &err {
            MetadataError::InvalidUrl => "only absolute http(s) URLs are fetched".to_string(),
            MetadataError::Fetch(inner) => inner.to_string(),
            MetadataError::Parse(message) => message.clone(),
            MetadataError::MissingUrl => err.to_string(),
        };
        HttpError::new(SOURCE, status, err.to_string(), detail)
    }
}

#[derive(Clone)]
pub struct MetadataService {
    http: reqwest::Client,
}

impl MetadataService {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pockets/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, raw: Option<&str>) -> Result<MetadataResponse, MetadataError> {
        let raw = raw
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(MetadataError::MissingUrl)?;
        let url = Url::parse(raw).map_err(|_| MetadataError::InvalidUrl)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MetadataError::InvalidUrl);
        }

        let html = self.http.get(url).send().await?.text().await?;
        let metadata = extract_metadata(&html)?;
        debug!(
            has_title = metadata.title.is_some(),
            has_description = metadata.description.is_some(),
            "Fetched page metadata"
        );
        Ok(metadata)
    }
}

#[derive(Default)]
struct Scraped {
    title_done: bool,
    title: Option<String>,
    description: Option<String>,
}

/// First `<title>` text and `<meta name="description">` content of `html`.
pub fn extract_metadata(html: &str) -> Result<MetadataResponse, MetadataError> {
    let state = Rc::new(RefCell::new(Scraped::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                text!("title", {
                    let state = Rc::clone(&state);
                    move |chunk| {
                        let mut state = state.borrow_mut();
                        if !state.title_done {
                            state
                                .title
                                .get_or_insert_with(String::new)
                                .push_str(chunk.as_str());
                            state.title_done = chunk.last_in_text_node();
                        }
                        Ok(())
                    }
                }),
                element!("meta[name]", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let is_description = el
                            .get_attribute("name")
                            .is_some_and(|name| name.eq_ignore_ascii_case("description"));
                        if is_description {
                            let mut state = state.borrow_mut();
                            if state.description.is_none() {
                                state.description = el.get_attribute("content");
                            }
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| MetadataError::Parse(err.to_string()))?;

    let scraped = state.borrow();
    Ok(MetadataResponse {
        title: clean(scraped.title.as_deref()),
        description: clean(scraped.description.as_deref()),
    })
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|value| !value.is_empty())
}
