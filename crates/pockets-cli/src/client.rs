use pockets_api_types::ErrorResponse;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("site URL missing; pass --site or set POCKETS_SITE_URL")]
    MissingSite,
    #[error("invalid site URL: {0}")]
    InvalidSite(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Target deployment and a shared HTTP client.
pub struct Ctx {
    client: Client,
    base: Url,
}

impl Ctx {
    pub fn new(site: Option<&str>) -> Result<Self, CliError> {
        let site = site
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CliError::MissingSite)?;
        let mut base = Url::parse(site)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(concat!("pockets-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, CliError> {
        Ok(self.client.request(method, self.url(path)?))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CliError> {
        let resp = self.request(Method::GET, path)?.query(query).send().await?;
        Self::handle(resp).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CliError> {
        let resp = self.request(Method::POST, path)?.json(body).send().await?;
        Self::handle(resp).await
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(CliError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
