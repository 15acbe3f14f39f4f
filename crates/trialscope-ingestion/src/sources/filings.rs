//! SEC filings through the Financial Modeling Prep API.
//!
//! API docs: https://site.financialmodelingprep.com/developer/docs
//!
//! Tickers come from a fixed sponsor map first and the FMP search endpoint
//! second. Income statements and as-reported financials are searched for
//! mentions of the trial; when found, the statistics are attached to every
//! filing returned for the company.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use trialscope_common::record::Filing;
use trialscope_common::sandbox::SandboxClient as Client;
use crate::mentions::{search_mentions, MentionStats};
use super::FilingSource;

const FMP_API_URL: &str = "https://financialmodelingprep.com/api/v3";

const KNOWN_TICKERS: &[(&str, &str)] = &[
    ("united therapeutics", "UTHR"),
    ("hoffmann-la roche", "RHHBY"),
    ("roche", "RHHBY"),
    ("merck", "MRK"),
    ("acceleron", "XLRN"),
    ("glaxosmithkline", "GSK"),
    ("gsk", "GSK"),
    ("janssen", "JNJ"),
    ("johnson & johnson", "JNJ"),
    ("pfizer", "PFE"),
    ("novartis", "NVS"),
    ("bristol-myers squibb", "BMY"),
    ("astrazeneca", "AZN"),
    ("lilly", "LLY"),
    ("abbvie", "ABBV"),
    ("amgen", "AMGN"),
    ("gilead", "GILD"),
    ("biogen", "BIIB"),
    ("vertex", "VRTX"),
];

pub struct FmpFilingsClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    delay: Duration,
}

impl FmpFilingsClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: FMP_API_URL.to_string(),
            delay: Duration::from_millis(300),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("FMP_API_KEY not configured"))
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.client
            .get(&url)?
            .query(params)
            .query(&[("apikey", self.key()?)])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(resp)
    }

    /// Ticker for a sponsor name, from the known map or the search API.
    #[instrument(skip(self))]
    pub async fn ticker_for(&self, company: &str) -> anyhow::Result<Option<String>> {
        if let Some(ticker) = known_ticker(company) {
            debug!(company, ticker, "ticker from known mapping");
            return Ok(Some(ticker.to_string()));
        }

        let results = self.get_json("search", &[("query", company), ("limit", "10")]).await?;
        let lower = company.to_lowercase();
        let hits = results.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let best = hits
            .iter()
            .find(|r| r["name"].as_str().unwrap_or("").to_lowercase().contains(&lower))
            .or_else(|| hits.first());

        Ok(best.and_then(|r| r["symbol"].as_str()).map(String::from))
    }

    /// Most recent filings of one form type.
    #[instrument(skip(self))]
    pub async fn filings(&self, ticker: &str, form: &str, limit: usize) -> anyhow::Result<Vec<Filing>> {
        let resp = self.get_json(&format!("sec_filings/{}", ticker), &[("type", form)]).await?;
        let filings: Vec<Filing> = resp
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .take(limit)
            .map(|f| Filing {
                ticker: ticker.to_string(),
                cik: json_text(&f["cik"]),
                accession_number: json_text(&f["accessionNumber"]),
                // FMP spells this field with a double "l".
                filing_date: json_text(&f["fillingDate"]),
                form: form.to_string(),
                filing_url: json_text(&f["finalLink"]),
                ..Default::default()
            })
            .collect();
        debug!(ticker, form, n = filings.len(), "filings retrieved");
        Ok(filings)
    }

    /// Mentions of the trial in the company's income statements and
    /// as-reported financials. Failures count as "no data".
    async fn financial_mentions(&self, ticker: &str, trial_name: &str, nct_id: &str) -> MentionStats {
        let mut stats = MentionStats::default();
        for path in [
            format!("income-statement/{}", ticker),
            format!("financial-statement-full-as-reported/{}", ticker),
        ] {
            match self.get_json(&path, &[]).await {
                Ok(data) if !data.is_null() => {
                    stats.merge(search_mentions(&data.to_string(), trial_name, nct_id));
                }
                Ok(_) => {}
                Err(e) => warn!(ticker, path = %path, error = %e, "financial data fetch failed"),
            }
            tokio::time::sleep(self.delay).await;
        }
        stats
    }
}

#[async_trait]
impl FilingSource for FmpFilingsClient {
    #[instrument(skip(self, forms))]
    async fn filings_mentioning_trial(
        &self,
        company: &str,
        trial_name: &str,
        nct_id: &str,
        forms: &[String],
        limit_per_form: usize,
    ) -> anyhow::Result<BTreeMap<String, Vec<Filing>>> {
        let mut by_form: BTreeMap<String, Vec<Filing>> =
            forms.iter().map(|f| (f.clone(), Vec::new())).collect();

        if self.api_key.is_none() {
            warn!(company, "no FMP API key; skipping filings");
            return Ok(by_form);
        }

        let Some(ticker) = self.ticker_for(company).await? else {
            warn!(company, "no ticker found; skipping filings");
            return Ok(by_form);
        };

        for form in forms {
            match self.filings(&ticker, form, limit_per_form).await {
                Ok(filings) => {
                    by_form.insert(form.clone(), filings);
                }
                Err(e) => warn!(ticker = %ticker, form = %form, error = %e, "filings fetch failed"),
            }
            tokio::time::sleep(self.delay).await;
        }

        let stats = self.financial_mentions(&ticker, trial_name, nct_id).await;
        if stats.total_mentions > 0 {
            info!(ticker = %ticker, mentions = stats.total_mentions, "trial mentioned in financial data");
            attach_mentions(&mut by_form, &stats);
        }

        Ok(by_form)
    }
}

fn attach_mentions(by_form: &mut BTreeMap<String, Vec<Filing>>, stats: &MentionStats) {
    for filing in by_form.values_mut().flatten() {
        filing.total_mentions = Some(stats.total_mentions);
        filing.name_mentions = Some(stats.name_mentions);
        filing.nct_mentions = Some(stats.nct_mentions);
        filing.contexts = stats.contexts.clone();
    }
}

/// Ticker from the fixed sponsor map.
pub fn known_ticker(company: &str) -> Option<&'static str> {
    let lower = company.to_lowercase();
    KNOWN_TICKERS
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, ticker)| *ticker)
}

fn json_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_common::record::MentionContext;

    #[test]
    fn test_known_tickers() {
        assert_eq!(known_ticker("United Therapeutics"), Some("UTHR"));
        assert_eq!(known_ticker("Hoffmann-La Roche"), Some("RHHBY"));
        assert_eq!(known_ticker("Janssen Research & Development, LLC"), Some("JNJ"));
        assert_eq!(known_ticker("Gossamer Bio"), None);
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty_forms() {
        let client = FmpFilingsClient::new(Client::new().unwrap(), Some("  ".to_string()));
        let forms = vec!["10-K".to_string(), "8-K".to_string()];
        let out = client
            .filings_mentioning_trial("Pfizer", "Trial", "NCT00000000", &forms, 3)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.values().all(Vec::is_empty));
    }

    #[test]
    fn test_attach_mentions() {
        let mut by_form = BTreeMap::new();
        by_form.insert(
            "10-K".to_string(),
            vec![Filing { ticker: "JNJ".to_string(), ..Default::default() }],
        );
        let stats = MentionStats {
            total_mentions: 2,
            name_mentions: 1,
            nct_mentions: 1,
            contexts: vec![MentionContext {
                matched_term: "NCT00660179".to_string(),
                context: "nct00660179".to_string(),
            }],
        };
        attach_mentions(&mut by_form, &stats);
        let filing = &by_form["10-K"][0];
        assert_eq!(filing.total_mentions, Some(2));
        assert_eq!(filing.contexts.len(), 1);
    }
}
