//! Web tools: search through a configured endpoint, fetch a URL as text.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use agent_core::config::{WebFetchConfig, WebSearchConfig};
use agent_core::tool::{ParameterSchema, Tool, ToolInput, ToolInputExt, ToolSchema};
use agent_core::ToolError;
use async_trait::async_trait;
use serde_json::Value;

pub const SEARCH_ENDPOINT_ENV: &str = "SEARCH_API_ENDPOINT";
const DEFAULT_NUM_RESULTS: u64 = 5;
const RAW_SEARCH_BODY_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "\n...[truncated]...";
const USER_AGENT: &str = concat!("agentctl/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| format!("cannot build HTTP client: {e}"))
}

fn network_error(err: &reqwest::Error) -> ToolError {
    ToolError::Network(err.to_string())
}

// ---------------------------------------------------------------------------
// Web Search
// ---------------------------------------------------------------------------

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WebSearchTool {
    /// Build from configuration. Returns `Ok(None)` when the endpoint is
    /// missing or the named key variable is unset; the tool is then left out.
    pub fn from_config(config: &WebSearchConfig) -> Result<Option<Self>, String> {
        let endpoint = config
            .endpoint
            .clone()
            .or_else(|| std::env::var(SEARCH_ENDPOINT_ENV).ok())
            .filter(|e| !e.trim().is_empty());
        let Some(endpoint) = endpoint else {
            tracing::warn!("web_search enabled but no endpoint configured (set tools.web_search.endpoint or {SEARCH_ENDPOINT_ENV}); skipping");
            return Ok(None);
        };

        let api_key = match &config.api_key_env {
            Some(var) => match std::env::var(var).ok().filter(|k| !k.trim().is_empty()) {
                Some(key) => Some(key),
                None => {
                    tracing::warn!(var = %var, "web_search API key variable is not set; skipping");
                    return Ok(None);
                }
            },
            None => None,
        };

        Ok(Some(Self {
            client: http_client(config.timeout_secs)?,
            endpoint,
            api_key,
        }))
    }
}

/// Render a search API body as a numbered list
fn format_results(query: &str, data: &Value, limit: usize) -> String {
    let empty = Vec::new();
    let results = data
        .get("results")
        .or_else(|| data.get("data"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let field = |r: &Value, keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| r.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let mut lines = vec![format!("Search results for: {query}")];
    for (idx, result) in results.iter().take(limit).enumerate() {
        let title = field(result, &["title", "name"]).unwrap_or_else(|| "Untitled".into());
        lines.push(format!("{}. {title}", idx + 1));
        if let Some(snippet) = field(result, &["snippet", "description"]) {
            lines.push(format!("   {snippet}"));
        }
        if let Some(url) = field(result, &["url", "link"]) {
            lines.push(format!("   URL: {url}"));
        }
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search".into(),
            description: "Perform a live web search and return the top results.".into(),
            parameters: vec![
                ParameterSchema::required("query", "string", "search query"),
                ParameterSchema::optional("num_results", "integer", "number of results (default 5)"),
            ],
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let query = input.str_arg("query")?;
        let num_results = input.opt_u64("num_results")?.unwrap_or(DEFAULT_NUM_RESULTS).clamp(1, 20);

        tracing::info!(query, num_results, "Web search");

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.to_string()), ("num_results", num_results.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| network_error(&e))?
            .text()
            .await
            .map_err(|e| network_error(&e))?;

        match serde_json::from_str::<Value>(&body) {
            Ok(data) => Ok(format_results(query, &data, usize::try_from(num_results).unwrap_or(5))),
            Err(_) => Ok(truncate_chars(&body, RAW_SEARCH_BODY_CHARS)),
        }
    }
}

// ---------------------------------------------------------------------------
// Web Fetch
// ---------------------------------------------------------------------------

pub struct WebFetchTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebFetchTool {
    /// Every redirect hop is re-checked and names resolving to blocked
    /// addresses are refused before connecting
    pub fn new(config: &WebFetchConfig) -> Result<Self, String> {
        let redirects = reqwest::redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error(format!("stopped after {MAX_REDIRECTS} redirects"))
            } else if let Err(e) = check_target(attempt.url().as_str()) {
                attempt.error(e)
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(redirects)
            .dns_resolver(Arc::new(PublicOnlyResolver))
            .build()
            .map_err(|e| format!("cannot build HTTP client: {e}"))?;

        Ok(Self {
            client,
            max_chars: config.max_chars,
        })
    }
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => ip.is_loopback() || ip.is_unspecified() || ip.is_link_local(),
        IpAddr::V6(ip) => {
            ip.is_loopback()
                || ip.is_unspecified()
                || ip.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback() || v4.is_link_local())
        }
    }
}

/// Keep only addresses the fetch tool may connect to
fn public_addrs(host: &str, addrs: impl IntoIterator<Item = SocketAddr>) -> Result<Vec<SocketAddr>, ToolError> {
    let allowed: Vec<SocketAddr> = addrs.into_iter().filter(|a| !is_blocked_ip(a.ip())).collect();
    if allowed.is_empty() {
        tracing::warn!(host, "Blocked web_fetch target by resolved address");
        return Err(ToolError::InvalidInput(format!("host '{host}' is not reachable from this tool")));
    }
    Ok(allowed)
}

struct PublicOnlyResolver;

impl reqwest::dns::Resolve for PublicOnlyResolver {
    fn resolve(&self, name: reqwest::dns::Name) -> reqwest::dns::Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let addrs: reqwest::dns::Addrs = Box::new(public_addrs(&host, resolved)?.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Refuse loopback, unspecified and link-local (cloud metadata) targets
fn check_target(raw: &str) -> Result<reqwest::Url, ToolError> {
    let url = reqwest::Url::parse(raw).map_err(|e| ToolError::InvalidInput(format!("invalid url '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::InvalidInput(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ToolError::InvalidInput(format!("url '{raw}' has no host")))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();

    let blocked = match host.parse::<IpAddr>() {
        Ok(ip) => is_blocked_ip(ip),
        Err(_) => host == "localhost" || host.ends_with(".localhost"),
    };

    if blocked {
        tracing::warn!(host = %host, "Blocked web_fetch target");
        return Err(ToolError::InvalidInput(format!("host '{host}' is not reachable from this tool")));
    }
    Ok(url)
}

fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_fetch".into(),
            description: "Fetch a web page and return its text content.".into(),
            parameters: vec![
                ParameterSchema::required("url", "string", "http(s) URL to fetch"),
                ParameterSchema::optional("max_chars", "integer", "maximum characters to return"),
            ],
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let url = check_target(input.str_arg("url")?)?;
        let max_chars = input
            .opt_u64("max_chars")?
            .map_or(self.max_chars, |n| usize::try_from(n).unwrap_or(usize::MAX));

        tracing::info!(url = %url, "Fetching URL");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| network_error(&e))?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = response.text().await.map_err(|e| network_error(&e))?;

        let text = if is_html { strip_html(&body) } else { body };
        Ok(truncate_chars(&text, max_chars))
    }
}
