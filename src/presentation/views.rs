use askama::{Error as AskamaError, Template};
use axum::{
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{Html, IntoResponse, Response},
};
use pockets_api_types::{LinkItem, LinksResponse};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::application::admin::LINK_KINDS;
use crate::application::details::DetailPage;
use crate::application::error::{ErrorReport, HttpError};
use crate::config::SiteSettings;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render without letting any cache keep the result.
pub fn render_uncached_response<T: Template>(template: T, status: StatusCode) -> Response {
    let mut response = render_template_response(template, status);
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn render_not_found_response(site: &SiteSettings) -> Response {
    let view = LayoutContext::new(site, "/", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Link not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
}

pub struct LayoutContext<T> {
    pub site_title: String,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(site: &SiteSettings, path: &str, content: T) -> Self {
        let base = site.url.as_str().trim_end_matches('/');
        Self {
            site_title: site.title.clone(),
            meta: PageMetaView {
                title: site.title.clone(),
                description: site.description.clone(),
                canonical: format!("{base}{path}"),
            },
            content,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.meta.title = format!("{title} | {}", self.site_title);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.meta.description = description.to_string();
        self
    }
}

/// A link as shown on a card.
pub struct LinkCardView {
    pub name: String,
    pub slug: String,
    pub value: String,
    pub kind: String,
    pub is_external: bool,
    pub added: Option<String>,
}

impl From<&LinkItem> for LinkCardView {
    fn from(link: &LinkItem) -> Self {
        Self {
            name: link.name.clone(),
            slug: link.slug.clone(),
            value: link.value.clone(),
            kind: link.kind.clone(),
            is_external: link.is_external(),
            added: link.created_at.as_deref().and_then(display_date),
        }
    }
}

pub struct IndexView {
    pub links: Vec<LinkCardView>,
    pub search: String,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    /// Upstream could not be reached; render the "no data" state.
    pub unavailable: bool,
}

impl IndexView {
    pub fn from_page(page: &LinksResponse, search: Option<&str>) -> Self {
        let current = page.meta.current_page.max(1);
        let has_next = page.links.next.is_some() || current < page.meta.last_page;
        Self {
            links: page.data.iter().map(LinkCardView::from).collect(),
            search: search.unwrap_or_default().to_string(),
            prev_href: (current > 1).then(|| page_href(current - 1, search)),
            next_href: has_next.then(|| page_href(current + 1, search)),
            unavailable: false,
        }
    }

    pub fn unavailable(search: Option<&str>) -> Self {
        Self {
            links: Vec::new(),
            search: search.unwrap_or_default().to_string(),
            prev_href: None,
            next_href: None,
            unavailable: true,
        }
    }
}

/// Link to listing page `page`, keeping the search term.
fn page_href(page: u32, search: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &page.to_string());
    if let Some(search) = search.filter(|search| !search.trim().is_empty()) {
        query.append_pair("search", search);
    }
    format!("/?{}", query.finish())
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct CommentView {
    pub name: String,
    pub body: String,
    pub posted: Option<String>,
}

pub struct DetailView {
    pub link: LinkCardView,
    pub link_id: String,
    pub project: String,
    pub comments: Vec<CommentView>,
    pub comment_error: Option<String>,
}

impl DetailView {
    pub fn from_page(page: &DetailPage) -> Self {
        Self {
            link: LinkCardView::from(&page.link.data),
            link_id: page.link.data.id.to_string(),
            project: page.link.project.name.clone(),
            comments: page
                .comments
                .data
                .iter()
                .map(|comment| CommentView {
                    name: comment.name.clone(),
                    body: comment.value.clone(),
                    posted: comment.created_at.as_deref().and_then(display_date),
                })
                .collect(),
            comment_error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate {
    pub view: LayoutContext<DetailView>,
}

/// State of the admin page. The PIN travels in a hidden field once verified.
pub struct AdminView {
    pub verified: bool,
    pub pin: String,
    pub kinds: &'static [&'static str],
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl AdminView {
    pub fn locked(error: Option<String>) -> Self {
        Self {
            verified: false,
            pin: String::new(),
            kinds: &LINK_KINDS,
            notice: None,
            error,
        }
    }

    pub fn unlocked(pin: String) -> Self {
        Self {
            verified: true,
            pin,
            kinds: &LINK_KINDS,
            notice: None,
            error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "hq.html")]
pub struct AdminTemplate {
    pub view: LayoutContext<AdminView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Link Not Found".to_string(),
            message: "That pocket is empty. The link may have been removed.".to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            title: "Temporarily Unavailable".to_string(),
            message: "Links could not be loaded right now. Please try again shortly.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

/// `2024-01-02T03:04:05Z` as `Jan 2, 2024`.
fn display_date(raw: &str) -> Option<String> {
    let parsed = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
    parsed
        .format(format_description!(
            "[month repr:short] [day padding:none], [year]"
        ))
        .ok()
}

#[cfg(test)]
mod tests {
    use pockets_api_types::{LinkId, PageLinks, PageMeta};
    use url::Url;

    use super::*;

    fn site() -> SiteSettings {
        SiteSettings {
            url: Url::parse("https://pockets.example/").unwrap(),
            title: "Pockets".to_string(),
            description: "A collection of curated links".to_string(),
        }
    }

    fn link(name: &str, kind: &str) -> LinkItem {
        LinkItem {
            id: LinkId::Number(1),
            name: name.to_string(),
            slug: name.to_lowercase(),
            value: "https://example.com".to_string(),
            kind: kind.to_string(),
            created_at: Some("2024-01-02T03:04:05Z".to_string()),
            updated_at: None,
        }
    }

    #[test]
    fn index_renders_cards_and_escapes_names() {
        let page = LinksResponse {
            data: vec![link("<script>", "url")],
            links: PageLinks {
                next: Some("https://upstream/?page=2".to_string()),
                ..Default::default()
            },
            meta: PageMeta {
                current_page: 1,
                last_page: 2,
                ..Default::default()
            },
        };
        let view = LayoutContext::new(&site(), "/", IndexView::from_page(&page, None));

        let html = IndexTemplate { view }.render().expect("render");

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Jan 2, 2024"));
        assert!(html.contains("?page=2"));
    }

    #[test]
    fn unavailable_index_shows_no_data_state() {
        let view = LayoutContext::new(&site(), "/", IndexView::unavailable(Some("rust")));
        let html = IndexTemplate { view }.render().expect("render");
        assert!(html.contains("Links are unavailable right now"));
    }

    #[test]
    fn page_links_keep_search() {
        assert_eq!(page_href(3, Some("rust lang")), "/?page=3&search=rust+lang");
        assert_eq!(page_href(2, Some("  ")), "/?page=2");
    }

    #[test]
    fn admin_page_hides_form_until_verified() {
        let locked = AdminTemplate {
            view: LayoutContext::new(&site(), "/hq", AdminView::locked(None)),
        }
        .render()
        .expect("render");
        assert!(locked.contains("name=\"pin\""));
        assert!(!locked.contains("name=\"slug\""));

        let unlocked = AdminTemplate {
            view: LayoutContext::new(&site(), "/hq", AdminView::unlocked("1234".to_string())),
        }
        .render()
        .expect("render");
        assert!(unlocked.contains("name=\"slug\""));
        assert!(unlocked.contains("value=\"link\""));
    }

    #[test]
    fn not_found_response_is_404() {
        let response = render_not_found_response(&site());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
