//! Allowlist-capped HTTP client.
//!
//! All upstream calls go through this wrapper, which only permits requests
//! to approved hosts and applies a per-call timeout.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::error::SourceError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client that refuses requests outside its host allowlist.
#[derive(Debug, Clone)]
pub struct AllowlistClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl AllowlistClient {
    /// Client with the default paper-source allowlist and timeout.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        let domains = [
            "export.arxiv.org",       // index search API
            "rss.arxiv.org",          // per-category feeds
            "arxiv.org",              // search pages, abstract pages, PDFs
            "huggingface.co",         // embedding model weights
            "cdn-lfs.huggingface.co", // embedding model weights (LFS)
        ];
        let allowlist = domains.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("paperscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Whether a URL's host is on the allowlist (exact or subdomain match).
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{allowed}")) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// GET request builder, rejecting URLs outside the allowlist.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, SourceError> {
        if !self.is_allowed(url) {
            return Err(SourceError::Blocked(format!(
                "host not in allowlist for URL {url}"
            )));
        }
        Ok(self.client.get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist_covers_arxiv_hosts() {
        let client = AllowlistClient::new().unwrap();
        assert!(client.is_allowed("https://export.arxiv.org/api/query?x=1"));
        assert!(client.is_allowed("https://rss.arxiv.org/rss/cs.AI"));
        assert!(client.is_allowed("https://arxiv.org/search/?query=cat%3Acs.AI"));
    }

    #[test]
    fn test_subdomains_of_allowed_hosts_pass() {
        let client = AllowlistClient::new().unwrap();
        assert!(client.is_allowed("https://www.arxiv.org/abs/2312.12345"));
    }

    #[test]
    fn test_unlisted_host_is_blocked() {
        let client = AllowlistClient::new().unwrap();
        assert!(!client.is_allowed("https://example.com/papers"));
        assert!(matches!(
            client.get("https://example.com/papers"),
            Err(SourceError::Blocked(_))
        ));
    }

    #[test]
    fn test_allow_domain_extends_the_list() {
        let mut client = AllowlistClient::new().unwrap();
        assert!(!client.is_allowed("https://mirror.example.org/"));
        client.allow_domain("mirror.example.org");
        assert!(client.is_allowed("https://mirror.example.org/"));
    }
}
