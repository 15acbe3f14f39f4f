use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::TrialscopeError;

/// Hosts every fetcher is allowed to reach out of the box.
const DEFAULT_ALLOWLIST: &[&str] = &[
    "clinicaltrials.gov",          // Trials registry v2 API
    "financialmodelingprep.com",   // SEC filings + statements
    "www.googleapis.com",          // Custom Search
    "ncbi.nlm.nih.gov",            // PubMed / PMC
    "europepmc.org",
    "nejm.org",
    "thelancet.com",
    "ahajournals.org",
    "atsjournals.org",
    "ersjournals.com",
    "jacc.org",
    "nature.com",
    "bmj.com",
    "springer.com",
    "wiley.com",
    "sciencedirect.com",
    "localhost",
    "127.0.0.1",
];

/// An HTTP client that refuses requests to hosts outside its allowlist.
///
/// Subdomains of an allowed host are accepted, so `pubmed.ncbi.nlm.nih.gov`
/// passes when `ncbi.nlm.nih.gov` is listed.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Client with the default allowlist and a 30 second per-request timeout.
    pub fn new() -> Result<Self, TrialscopeError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TrialscopeError> {
        let allowlist = DEFAULT_ALLOWLIST.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("trialscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrialscopeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        let domain = domain.trim().trim_start_matches("www.").to_lowercase();
        if !domain.is_empty() {
            self.allowlist.insert(domain);
        }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        let host = host.to_lowercase();
        self.allowlist
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, TrialscopeError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    fn check(&self, url: &str) -> Result<(), TrialscopeError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(TrialscopeError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )))
        }
    }
}
