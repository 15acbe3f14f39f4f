//! ClinicalTrials.gov v2 API client.
//!
//! API docs: https://clinicaltrials.gov/data-api/api
//! Endpoint: https://clinicaltrials.gov/api/v2/studies
//!
//! Search results are filtered to industry-sponsored interventional studies
//! started within the configured window, then to sponsors that look like
//! public companies. Full detail documents are written to the raw directory
//! as `<NCT>.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Months, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use trialscope_common::sandbox::SandboxClient as Client;
use crate::study::{has_results, nct_id};
use super::RegistrySource;

const CT_API_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

/// How many search hits to pull before filtering.
const SEARCH_PAGE_SIZE: usize = 200;

/// Sponsor name fragments that identify listed companies.
const PUBLIC_COMPANIES: &[&str] = &[
    "pfizer", "merck", "novartis", "roche", "johnson", "astrazeneca",
    "sanofi", "glaxosmithkline", "gilead", "amgen", "biogen", "vertex",
    "regeneron", "bayer", "bristol-myers", "abbvie", "lilly", "boehringer",
    "united", "gsk", "astellas", "takeda", "teva", "baxter", "daiichi",
    "allergan", "mylan", "viatris", "biomarin", "acceleron", "alexion",
    "liquidia", "gossamer", "actelion", "aerovate", "mereo", "altavant",
    "janssen", "united therapeutics", "tenax",
];

/// Search filter applied to registry hits.
#[derive(Debug, Clone)]
pub struct StudyFilter {
    pub sponsor_class: String,
    pub study_type: String,
    pub min_start_date: NaiveDate,
}

impl Default for StudyFilter {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            sponsor_class: "INDUSTRY".to_string(),
            study_type: "INTERVENTIONAL".to_string(),
            min_start_date: today.checked_sub_months(Months::new(120)).unwrap_or(today),
        }
    }
}

pub struct ClinicalTrialsClient {
    client: Client,
    base_url: String,
    raw_dir: Option<PathBuf>,
    delay: Duration,
    filter: StudyFilter,
}

impl ClinicalTrialsClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: CT_API_URL.to_string(),
            raw_dir: None,
            delay: Duration::from_millis(300),
            filter: StudyFilter::default(),
        }
    }

    /// Save every fetched detail document under `dir`.
    pub fn with_raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw_dir = Some(dir.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_filter(mut self, filter: StudyFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Raw search over the registry.
    #[instrument(skip(self))]
    pub async fn search(&self, condition: &str, page_size: usize) -> anyhow::Result<Vec<Value>> {
        let resp = self.client
            .get(&self.base_url)?
            .query(&[
                ("query.term", condition),
                ("pageSize",   &page_size.to_string()),
                ("format",     "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let studies = resp["studies"].as_array().cloned().unwrap_or_default();
        debug!(n = studies.len(), "ClinicalTrials.gov studies retrieved");
        Ok(studies)
    }

    /// Keep studies matching the sponsor class, study type and start date.
    pub fn filter_studies(&self, studies: Vec<Value>) -> Vec<Value> {
        let before = studies.len();
        let kept: Vec<Value> = studies
            .into_iter()
            .filter(|s| matches_filter(s, &self.filter))
            .collect();
        info!(before, after = kept.len(), "filtered registry studies");
        kept
    }

    async fn save_raw(&self, nct_id: &str, doc: &Value) -> anyhow::Result<()> {
        let Some(dir) = &self.raw_dir else { return Ok(()) };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.json", nct_id));
        let text = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl RegistrySource for ClinicalTrialsClient {
    #[instrument(skip(self))]
    async fn public_company_trials(&self, condition: &str, limit: usize) -> anyhow::Result<Vec<Value>> {
        let candidates = self.filter_studies(self.search(condition, SEARCH_PAGE_SIZE).await?);

        let mut trials: Vec<Value> = Vec::new();
        for candidate in &candidates {
            if trials.len() >= limit {
                break;
            }
            let Some(id) = nct_id(candidate) else { continue };

            let detail = match self.study(id).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(nct_id = id, error = %e, "failed to fetch study details");
                    continue;
                }
            };

            let sponsor = sponsor_name(&detail);
            if is_public_company(sponsor) {
                debug!(nct_id = id, sponsor, results = has_results(&detail), "public company trial");
                trials.push(detail);
            }

            tokio::time::sleep(self.delay).await;
        }

        // Trials with posted results first; stable so registry order holds otherwise.
        trials.sort_by_key(|t| !has_results(t));
        trials.truncate(limit);
        info!(n = trials.len(), "public company trials selected");
        Ok(trials)
    }

    #[instrument(skip(self))]
    async fn study(&self, nct_id: &str) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, nct_id);
        let doc = self.client
            .get(&url)?
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
            .with_context(|| format!("decoding study {}", nct_id))?;

        self.save_raw(nct_id, &doc).await?;
        Ok(doc)
    }
}

fn sponsor_name(study: &Value) -> &str {
    study["protocolSection"]["sponsorCollaboratorsModule"]["leadSponsor"]["name"]
        .as_str()
        .unwrap_or("")
}

/// Whether the sponsor name contains a known listed-company fragment.
pub fn is_public_company(sponsor: &str) -> bool {
    let lower = sponsor.to_lowercase();
    PUBLIC_COMPANIES.iter().any(|c| lower.contains(c))
}

fn matches_filter(study: &Value, filter: &StudyFilter) -> bool {
    let proto = &study["protocolSection"];
    let sponsor_class = proto["sponsorCollaboratorsModule"]["leadSponsor"]["class"]
        .as_str()
        .unwrap_or("");
    if !sponsor_class.eq_ignore_ascii_case(&filter.sponsor_class) {
        return false;
    }

    let study_type = proto["designModule"]["studyType"].as_str().unwrap_or("");
    if !study_type.eq_ignore_ascii_case(&filter.study_type) {
        return false;
    }

    // Unparseable or missing dates pass.
    match proto["statusModule"]["startDateStruct"]["date"]
        .as_str()
        .or_else(|| proto["statusModule"]["startDate"].as_str())
        .and_then(parse_start_date)
    {
        Some(start) => start >= filter.min_start_date,
        None => true,
    }
}

/// Registry start dates come as `YYYY-MM-DD`, `YYYY-MM` or `Month D, YYYY`.
pub fn parse_start_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%B %d, %Y"))
        .ok()
}
