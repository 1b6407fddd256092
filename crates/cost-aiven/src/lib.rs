//! cost-aiven
//!
//! Billing-provider collaborator: wire models, the [`BillingApi`] trait and
//! the HTTPS client for the Aiven REST API.
//!
//! It does **not** classify, normalize or store anything; the reconciliation
//! driver in `cost-billing` consumes what this crate returns.

pub mod model;
pub mod provider;

pub use model::{Invoice, InvoiceLine, InvoiceStatus, LineType, Tags};
pub use provider::{BillingApi, ProviderError};

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Longest slice of an error body kept in [`ProviderError::Api`].
const MAX_ERROR_BODY: usize = 512;

/// Aiven-backed [`BillingApi`].
///
/// The API token is read by the caller and passed in; it is never logged.
#[derive(Clone)]
pub struct AivenClient {
    http: reqwest::Client,
    base_url: Url,
    api_token: String,
}

impl std::fmt::Debug for AivenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AivenClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

impl AivenClient {
    /// Client for `https://{api_host}`.
    pub fn new(api_host: &str, api_token: String) -> Result<Self, ProviderError> {
        Self::new_with_base_url(&format!("https://{}", api_host.trim()), api_token)
    }

    /// Client for an explicit base URL (tests point this at a local mock).
    pub fn new_with_base_url(base_url: &str, api_token: String) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::Transport(format!("invalid base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Transport(format!(
                "invalid base url '{base_url}': cannot be a base"
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("aiven-cost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport(format!("invalid base url '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ProviderError> {
        let url = self.url(segments)?;
        debug!(path = url.path(), "GET");

        let resp = self
            .http
            .get(url.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("aivenv1 {}", self.api_token),
            )
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("GET {}: {e}", url.path())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(format!("GET {}: {e}", url.path())))
    }
}

#[async_trait::async_trait]
impl BillingApi for AivenClient {
    async fn list_invoices(&self, billing_group_id: &str) -> Result<Vec<Invoice>, ProviderError> {
        let body: InvoicesEnvelope = self
            .get_json(&["v1", "billing-group", billing_group_id, "invoice"])
            .await?;
        Ok(body.invoices)
    }

    async fn invoice_lines(
        &self,
        billing_group_id: &str,
        invoice_id: &str,
    ) -> Result<Vec<InvoiceLine>, ProviderError> {
        let body: LinesEnvelope = self
            .get_json(&[
                "v1",
                "billing-group",
                billing_group_id,
                "invoice",
                invoice_id,
                "lines",
            ])
            .await?;
        Ok(body.lines)
    }

    async fn service_tags(
        &self,
        project_name: &str,
        service_name: &str,
    ) -> Result<Tags, ProviderError> {
        let body: TagsEnvelope = self
            .get_json(&["v1", "project", project_name, "service", service_name, "tags"])
            .await?;
        Ok(body.tags)
    }
}

#[derive(Debug, Deserialize)]
struct InvoicesEnvelope {
    invoices: Vec<Invoice>,
}

#[derive(Debug, Deserialize)]
struct LinesEnvelope {
    lines: Vec<InvoiceLine>,
}

#[derive(Debug, Deserialize)]
struct TagsEnvelope {
    #[serde(default)]
    tags: Tags,
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_segments_onto_base() {
        let c = AivenClient::new_with_base_url("http://127.0.0.1:9999", "t".into()).unwrap();
        let u = c.url(&["v1", "billing-group", "bg-1", "invoice"]).unwrap();
        assert_eq!(u.as_str(), "http://127.0.0.1:9999/v1/billing-group/bg-1/invoice");
    }

    #[test]
    fn url_escapes_segments() {
        let c = AivenClient::new_with_base_url("http://127.0.0.1:9999", "t".into()).unwrap();
        let u = c.url(&["v1", "project", "a b", "service", "x/y", "tags"]).unwrap();
        assert_eq!(u.path(), "/v1/project/a%20b/service/x%2Fy/tags");
    }

    #[test]
    fn new_uses_https_host() {
        let c = AivenClient::new("api.aiven.io", "t".into()).unwrap();
        assert_eq!(c.base_url.as_str(), "https://api.aiven.io/");
    }

    #[test]
    fn debug_redacts_token() {
        let c = AivenClient::new("api.aiven.io", "very-secret".into()).unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("very-secret"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(AivenClient::new_with_base_url("not a url", "t".into()).is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("æøå", 3), "æ...");
    }
}
