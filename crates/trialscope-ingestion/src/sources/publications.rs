//! Publication and presentation search through Google Custom Search.
//!
//! API docs: https://developers.google.com/custom-search/v1/reference/rest
//! Endpoint: https://www.googleapis.com/customsearch/v1
//!
//! Scientific publications are searched with five queries and presentations
//! with four site-scoped PDF queries; hits are deduplicated by link.
//! Publication pages are fetched for full text when they are HTML or PDF;
//! presentations are downloaded and their text sampled.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use trialscope_common::record::{CompanyPresentation, Publications, ScientificPublication, StudyInfo};
use trialscope_common::sandbox::SandboxClient as Client;
use crate::extract::keywords;
use crate::pdf_text::{clean_text, pdf_file_text, truncate_sample};
use super::{company_domain, PublicationSource};

const CSE_API_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Characters of presentation text kept in the record.
const TEXT_SAMPLE_CHARS: usize = 2000;

fn author_journal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z\s,]+)-\s*([^-]+)").unwrap())
}

fn unsafe_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-_\. ]").unwrap())
}

fn body_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("body").unwrap())
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
struct SearchHit {
    title: String,
    link: String,
    snippet: String,
}

pub struct WebSearchClient {
    client: Client,
    api_key: Option<String>,
    engine_id: Option<String>,
    download_dir: PathBuf,
    delay: Duration,
    publication_limit: usize,
    presentation_limit: usize,
}

impl WebSearchClient {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        engine_id: Option<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            engine_id: engine_id.filter(|k| !k.trim().is_empty()),
            download_dir: download_dir.into(),
            delay: Duration::from_secs(1),
            publication_limit: 5,
            presentation_limit: 3,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limits(mut self, publications: usize, presentations: usize) -> Self {
        self.publication_limit = publications;
        self.presentation_limit = presentations;
        self
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.api_key.as_deref()?, self.engine_id.as_deref()?))
    }

    /// Run each query in turn, keeping the first hit per link.
    async fn search_all(&self, queries: &[String], limit: usize) -> Vec<SearchHit> {
        let Some((key, cx)) = self.credentials() else { return Vec::new() };
        let num = limit.to_string();
        let mut hits: Vec<SearchHit> = Vec::new();

        for query in queries {
            match self.search_once(&[("key", key), ("cx", cx), ("q", query.as_str()), ("num", num.as_str())]).await {
                Ok(body) => {
                    for item in body["items"].as_array().map(Vec::as_slice).unwrap_or(&[]) {
                        let link = item["link"].as_str().unwrap_or("").to_string();
                        if hits.iter().any(|h| h.link == link) {
                            continue;
                        }
                        hits.push(SearchHit {
                            title: item["title"].as_str().unwrap_or("").to_string(),
                            link,
                            snippet: item["snippet"].as_str().unwrap_or("").to_string(),
                        });
                    }
                }
                Err(e) => warn!(query = %query, error = %e, "search query failed"),
            }
            tokio::time::sleep(self.delay).await;
        }

        debug!(n = hits.len(), "search hits collected");
        hits.truncate(limit);
        hits
    }

    async fn search_once(&self, params: &[(&str, &str)]) -> anyhow::Result<Value> {
        let body = self.client
            .get(CSE_API_URL)?
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    #[instrument(skip(self, study), fields(nct_id = %study.nct_identifier))]
    pub async fn search_publications(&self, study: &StudyInfo) -> Vec<ScientificPublication> {
        let queries = publication_queries(&study.nct_identifier, &study.title, &study.sponsor);
        self.search_all(&queries, self.publication_limit)
            .await
            .into_iter()
            .map(|hit| {
                let (authors, journal) = authors_and_journal(&hit.snippet);
                ScientificPublication {
                    title: hit.title,
                    link: hit.link,
                    snippet: hit.snippet,
                    authors,
                    journal,
                    full_text: None,
                    text_length: None,
                }
            })
            .collect()
    }

    /// Fetch full text for HTML and PDF publication links. Failures leave
    /// the publication as it was.
    pub async fn fetch_publication_content(&self, publications: &mut [ScientificPublication]) {
        for publication in publications.iter_mut() {
            let url = publication.link.clone();
            let lower = url.to_lowercase();
            let is_pdf = lower.contains("pdf");
            if !(is_pdf || lower.ends_with(".html") || lower.ends_with(".htm")) {
                continue;
            }

            let text = if is_pdf {
                let path = self.download_dir.join(format!("{}.pdf", safe_title(&publication.title)));
                match self.download(&self.client, &url, &path).await {
                    Ok(()) => pdf_file_text(&path),
                    Err(e) => Err(e),
                }
            } else {
                self.fetch_html_text(&url).await
            };

            match text {
                Ok(text) if !text.is_empty() => {
                    let chars = text.chars().count();
                    debug!(url = %url, chars, "publication text fetched");
                    publication.text_length = Some(chars);
                    publication.full_text = Some(text);
                }
                Ok(_) => {}
                Err(e) => warn!(url = %url, error = %e, "publication content fetch failed"),
            }
        }
    }

    async fn fetch_html_text(&self, url: &str) -> anyhow::Result<String> {
        let body = self.client
            .get(url)?
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html_to_text(&body))
    }

    /// Download to `path` unless a cached copy already exists.
    async fn download(&self, client: &Client, url: &str, path: &Path) -> anyhow::Result<()> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!(path = %path.display(), "using cached download");
            return Ok(());
        }
        let bytes = client
            .get(url)?
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if bytes.is_empty() {
            anyhow::bail!("empty download from {}", url);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }

    /// Search the sponsor's site for PDF decks and download them.
    #[instrument(skip(self, study), fields(nct_id = %study.nct_identifier))]
    pub async fn find_presentations(&self, study: &StudyInfo) -> Vec<CompanyPresentation> {
        let domain = company_domain(&study.sponsor);
        let queries = presentation_queries(&study.nct_identifier, &study.title, &domain);
        let hits = self.search_all(&queries, self.presentation_limit).await;

        // Decks live on the sponsor's own site.
        let mut client = self.client.clone();
        client.allow_domain(&domain);

        let company = study.sponsor.replace(' ', "_");
        let mut presentations = Vec::new();
        for (i, hit) in hits.into_iter().enumerate() {
            let filename = format!(
                "{}_{}_{}_{}.pdf",
                study.nct_identifier,
                company,
                i,
                safe_title(&hit.title)
            );
            let path = self.download_dir.join(filename);

            match self.download(&client, &hit.link, &path).await {
                Ok(()) => {
                    let text = pdf_file_text(&path).unwrap_or_else(|e| {
                        warn!(path = %path.display(), error = %e, "presentation text extraction failed");
                        String::new()
                    });
                    presentations.push(CompanyPresentation {
                        title: hit.title,
                        url: hit.link,
                        snippet: None,
                        local_path: Some(path.display().to_string()),
                        text_sample: Some(truncate_sample(&text, TEXT_SAMPLE_CHARS)),
                        text_length: Some(text.chars().count()),
                    });
                }
                Err(e) => {
                    warn!(url = %hit.link, error = %e, "presentation download failed; keeping metadata");
                    presentations.push(CompanyPresentation {
                        title: hit.title,
                        url: hit.link,
                        snippet: Some(hit.snippet),
                        local_path: None,
                        text_sample: None,
                        text_length: None,
                    });
                }
            }
        }
        presentations
    }
}

#[async_trait]
impl PublicationSource for WebSearchClient {
    async fn publications_for_trial(&self, study: &StudyInfo) -> anyhow::Result<Publications> {
        if self.credentials().is_none() {
            warn!(nct_id = %study.nct_identifier, "search credentials not configured; skipping publications");
            return Ok(Publications::default());
        }

        let mut scientific_publications = self.search_publications(study).await;
        self.fetch_publication_content(&mut scientific_publications).await;
        let company_presentations = self.find_presentations(study).await;

        let mut pubs = Publications {
            scientific_publications,
            company_presentations,
            extracted_clinical_data: None,
        };
        pubs.extracted_clinical_data = keywords::find_clinical_data(&pubs);

        info!(
            nct_id = %study.nct_identifier,
            publications = pubs.scientific_publications.len(),
            presentations = pubs.company_presentations.len(),
            findings = pubs.extracted_clinical_data.is_some(),
            "publication search complete"
        );
        Ok(pubs)
    }
}

// ── Query building and parsing ────────────────────────────────────────────────

pub fn publication_queries(nct_id: &str, title: &str, sponsor: &str) -> Vec<String> {
    vec![
        format!("\"{}\" pulmonary arterial hypertension \"results\"", nct_id),
        format!("\"{}\" pulmonary arterial hypertension {} \"results\"", title, sponsor),
        format!("pulmonary arterial hypertension {} clinical trial results", sponsor),
        format!("pulmonary hypertension treatment {} outcome", sponsor),
        format!("{} OR \"{}\" site:pubmed.ncbi.nlm.nih.gov", nct_id, title),
    ]
}

pub fn presentation_queries(nct_id: &str, title: &str, domain: &str) -> Vec<String> {
    vec![
        format!(
            "\"{}\" OR \"{}\" \"pulmonary arterial hypertension\" filetype:pdf site:{}",
            nct_id, title, domain
        ),
        format!("clinical trial results filetype:pdf site:{}", domain),
        format!("investor presentation pulmonary hypertension filetype:pdf site:{}", domain),
        format!("annual report clinical trial filetype:pdf site:{}", domain),
    ]
}

/// Authors and journal from a search snippet shaped like `A Smith, B Jones - Journal`.
pub fn authors_and_journal(snippet: &str) -> (String, String) {
    author_journal_re()
        .captures(snippet)
        .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
        .unwrap_or_default()
}

fn safe_title(title: &str) -> String {
    let title = if title.trim().is_empty() { "Untitled" } else { title };
    unsafe_filename_re()
        .replace_all(title, "_")
        .chars()
        .take(50)
        .collect()
}

/// Visible body text of an HTML page, whitespace collapsed. Script, style
/// and noscript contents are dropped.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let body = doc.select(body_selector()).next().unwrap_or_else(|| doc.root_element());
    let text: Vec<&str> = body
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            });
            (!hidden).then_some(&**text)
        })
        .collect();
    clean_text(&text.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publication_queries() {
        let q = publication_queries("NCT01106014", "GRIPHON", "Actelion");
        assert_eq!(q.len(), 5);
        assert_eq!(q[0], "\"NCT01106014\" pulmonary arterial hypertension \"results\"");
        assert_eq!(q[4], "NCT01106014 OR \"GRIPHON\" site:pubmed.ncbi.nlm.nih.gov");
    }

    #[test]
    fn test_presentation_queries_scoped_to_domain() {
        let q = presentation_queries("NCT01106014", "GRIPHON", "actelion.com");
        assert_eq!(q.len(), 4);
        assert!(q.iter().all(|s| s.ends_with("site:actelion.com")));
    }

    #[test]
    fn test_authors_and_journal() {
        let (authors, journal) = authors_and_journal("O Sitbon, R Channick - N Engl J Med, 2015");
        assert_eq!(authors, "O Sitbon, R Channick");
        assert_eq!(journal, "N Engl J Med, 2015");
        assert_eq!(authors_and_journal("2015"), (String::new(), String::new()));
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><body><h1>Results</h1><p>PVR fell   by <b>37%</b></p></body></html>";
        assert_eq!(html_to_text(html), "Results PVR fell by 37%");
    }

    #[test]
    fn test_html_to_text_skips_scripts_and_head() {
        let html = r#"<html><head><title>Journal page</title><style>p { width: 0.02px }</style></head>
            <body><script>var p = 0.001; track("pvr");</script>
            <p>At week 16, PVR decreased by 36.8%</p><noscript>Enable JS</noscript></body></html>"#;
        assert_eq!(html_to_text(html), "At week 16, PVR decreased by 36.8%");
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("A/B: trial?"), "A_B_ trial_");
        assert_eq!(safe_title(""), "Untitled");
    }

    #[tokio::test]
    async fn test_no_credentials_returns_empty() {
        let client = WebSearchClient::new(Client::new().unwrap(), None, None, "/tmp/trialscope-pubs");
        let study = StudyInfo { nct_identifier: "NCT01106014".to_string(), ..Default::default() };
        let pubs = client.publications_for_trial(&study).await.unwrap();
        assert!(pubs.is_empty());
    }
}
