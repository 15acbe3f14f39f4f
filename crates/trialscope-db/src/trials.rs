//! Trial repository: bulk load and read queries over the relational schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_postgres::{Row, Transaction};
use tracing::{debug, info, instrument};

use trialscope_common::query::{EndpointComparison, TrialFilter, TrialSummary};
use trialscope_common::record::{
    Arm, ArmCounts, BaselineMeasure, CompanyPresentation, DrugDescriptor, Endpoint, Filing,
    MentionContext, Publications, ScientificPublication, StudyInfo, Tier, TrialRecord,
};

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::schema::{SOURCE_PRESENTATION, SOURCE_SCIENTIFIC};

/// Outcome of [`TrialRepository::load_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Repository for trial records.
#[derive(Clone)]
pub struct TrialRepository {
    db: Arc<Database>,
}

impl TrialRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // ── Writes ──────────────────────────────────────────────────────────────

    /// Insert records in one transaction. Records whose registry identifier
    /// is already present are skipped, not updated.
    #[instrument(skip(self, records), fields(n = records.len()))]
    pub async fn load_records(&self, records: &[TrialRecord]) -> Result<LoadSummary> {
        let mut client = self.db.client().await;
        let tx = client.transaction().await?;
        let mut summary = LoadSummary::default();

        for record in records {
            let nct_id = record.nct_id();
            if nct_id.is_empty() {
                return Err(DbError::InvalidRecord("record without nct_identifier".to_string()));
            }
            let existing = tx
                .query_opt("SELECT id FROM clinical_study WHERE nct_identifier = $1", &[&nct_id])
                .await?;
            if existing.is_some() {
                debug!(nct_id, "study already loaded, skipping");
                summary.skipped += 1;
                continue;
            }

            let study_id = insert_study(&tx, &record.clinical_study).await?;
            for endpoint in &record.endpoints {
                insert_endpoint(&tx, study_id, endpoint).await?;
            }
            for measure in &record.baseline_measures {
                insert_baseline(&tx, study_id, measure).await?;
            }
            for (form, filings) in &record.sec_filings {
                for filing in filings {
                    insert_filing(&tx, study_id, form, filing).await?;
                }
            }
            insert_publications(&tx, study_id, &record.publications).await?;
            summary.inserted += 1;
        }

        tx.commit().await?;
        info!(inserted = summary.inserted, skipped = summary.skipped, "records loaded");
        Ok(summary)
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Rebuild the full record for one trial.
    pub async fn find_by_nct(&self, nct_id: &str) -> Result<Option<TrialRecord>> {
        let client = self.db.client().await;
        let Some(row) = client
            .query_opt("SELECT * FROM clinical_study WHERE nct_identifier = $1", &[&nct_id])
            .await?
        else {
            return Ok(None);
        };
        let study_id: i32 = row.get("id");
        let clinical_study = study_from_row(&row)?;

        let endpoints = client
            .query("SELECT * FROM endpoints WHERE clinical_study_id = $1 ORDER BY id", &[&study_id])
            .await?
            .iter()
            .map(endpoint_from_row)
            .collect();

        let baseline_measures = client
            .query("SELECT * FROM baseline_measures WHERE clinical_study_id = $1 ORDER BY id", &[&study_id])
            .await?
            .iter()
            .map(baseline_from_row)
            .collect();

        let mut sec_filings: BTreeMap<String, Vec<Filing>> = BTreeMap::new();
        for row in client
            .query("SELECT * FROM sec_filings WHERE clinical_study_id = $1 ORDER BY id", &[&study_id])
            .await?
        {
            let filing = filing_from_row(&row)?;
            sec_filings.entry(filing.form.clone()).or_default().push(filing);
        }

        let findings: Option<serde_json::Value> = row.get("publication_findings");
        let mut publications = Publications {
            extracted_clinical_data: findings.map(serde_json::from_value).transpose()?,
            ..Default::default()
        };
        for row in client
            .query("SELECT * FROM publications WHERE clinical_study_id = $1 ORDER BY id", &[&study_id])
            .await?
        {
            let source: String = row.get("source");
            if source == SOURCE_PRESENTATION {
                publications.company_presentations.push(presentation_from_row(&row));
            } else {
                publications.scientific_publications.push(publication_from_row(&row));
            }
        }

        Ok(Some(TrialRecord {
            clinical_study,
            sec_filings,
            publications,
            endpoints,
            baseline_measures,
        }))
    }

    /// Filtered, paged trial summaries ordered by id.
    pub async fn list(&self, filter: &TrialFilter) -> Result<Vec<TrialSummary>> {
        let indication = non_blank(filter.indication.as_deref());
        let sponsor = non_blank(filter.sponsor.as_deref());
        let offset = filter.skip as i64;
        let limit = filter.limit as i64;

        let rows = self
            .db
            .client()
            .await
            .query(
                r#"
                SELECT id, title, nct_identifier, indication, intervention, phase,
                       sponsor, number_of_participants, average_age
                FROM clinical_study
                WHERE ($1::TEXT IS NULL OR indication ILIKE '%' || $1 || '%')
                  AND ($2::TEXT IS NULL OR sponsor ILIKE '%' || $2 || '%')
                ORDER BY id
                OFFSET $3 LIMIT $4
                "#,
                &[&indication, &sponsor, &offset, &limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TrialSummary {
                id: i64::from(row.get::<_, i32>("id")),
                title: row.get("title"),
                nct_identifier: row.get("nct_identifier"),
                indication: row.get("indication"),
                intervention: row.get("intervention"),
                phase: row.get("phase"),
                sponsor: row.get("sponsor"),
                number_of_participants: row.get::<_, i64>("number_of_participants").max(0) as u64,
                average_age: row.get("average_age"),
            })
            .collect())
    }

    /// Endpoint rows whose name contains `name` (case-insensitive).
    pub async fn compare_endpoint(&self, name: &str, include_placebo: bool) -> Result<Vec<EndpointComparison>> {
        let rows = self
            .db
            .client()
            .await
            .query(
                r#"
                SELECT s.nct_identifier, s.title, s.sponsor, e.name, e.arm, e.timepoint,
                       e.average_value, e.upper_end, e.lower_end, e.statistical_significance
                FROM endpoints e
                JOIN clinical_study s ON s.id = e.clinical_study_id
                WHERE e.name ILIKE '%' || $1 || '%'
                  AND ($2 OR e.arm <> 'placebo')
                ORDER BY s.id, e.id
                "#,
                &[&name, &include_placebo],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| EndpointComparison {
                nct_id: row.get(0),
                study_title: row.get(1),
                sponsor: row.get(2),
                endpoint_name: row.get(3),
                arm: Arm::from_label(row.get(4)),
                timepoint: row.get::<_, Option<String>>(5).unwrap_or_default(),
                value: row.get(6),
                upper_end: row.get(7),
                lower_end: row.get(8),
                p_value: row.get::<_, Option<String>>(9).unwrap_or_default(),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<u64> {
        let row = self
            .db
            .client()
            .await
            .query_one("SELECT COUNT(*) FROM clinical_study", &[])
            .await?;
        Ok(row.get::<_, i64>(0) as u64)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ── Inserts ─────────────────────────────────────────────────────────────────

async fn insert_study(tx: &Transaction<'_>, s: &StudyInfo) -> Result<i32> {
    let intervention_arms = s.study_arms.intervention as i32;
    let placebo_arms = s.study_arms.placebo as i32;
    let participants = s.number_of_participants as i64;
    let min_age = s.age_range.0 as i32;
    let max_age = s.age_range.1 as i32;
    let endpoint_names = serde_json::to_value(&s.endpoints)?;
    let baseline_characteristics = serde_json::to_value(&s.baseline_characteristics)?;

    let row = tx
        .query_one(
            r#"
            INSERT INTO clinical_study
                (title, nct_identifier, indication, intervention,
                 interventional_drug_name, interventional_drug_dose,
                 interventional_drug_frequency, interventional_drug_formulation,
                 intervention_arms, placebo_arms, number_of_participants, average_age,
                 min_age, max_age, phase, sponsor, endpoint_names, baseline_characteristics)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            RETURNING id
            "#,
            &[
                &s.title,
                &s.nct_identifier,
                &s.indication,
                &s.intervention,
                &s.interventional_drug.name,
                &s.interventional_drug.dose,
                &s.interventional_drug.frequency,
                &s.interventional_drug.formulation,
                &intervention_arms,
                &placebo_arms,
                &participants,
                &s.average_age,
                &min_age,
                &max_age,
                &s.phase,
                &s.sponsor,
                &endpoint_names,
                &baseline_characteristics,
            ],
        )
        .await?;
    Ok(row.get(0))
}

async fn insert_endpoint(tx: &Transaction<'_>, study_id: i32, e: &Endpoint) -> Result<()> {
    let arm = e.arm.as_str();
    let tier = e.tier.map(|t| t.as_str());
    tx.execute(
        r#"
        INSERT INTO endpoints
            (clinical_study_id, name, canonical_name, description, timepoint, arm,
             average_value, upper_end, lower_end, statistical_significance,
             source, context, tier)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        "#,
        &[
            &study_id,
            &e.name,
            &e.canonical_name,
            &e.description,
            &e.timepoint,
            &arm,
            &e.average_value,
            &e.upper_end,
            &e.lower_end,
            &e.statistical_significance,
            &e.source,
            &e.context,
            &tier,
        ],
    )
    .await?;
    Ok(())
}

async fn insert_baseline(tx: &Transaction<'_>, study_id: i32, b: &BaselineMeasure) -> Result<()> {
    let arm = b.arm.as_str();
    let tier = b.tier.map(|t| t.as_str());
    tx.execute(
        r#"
        INSERT INTO baseline_measures
            (clinical_study_id, name, canonical_name, description, arm,
             average_value, upper_end, lower_end, source, context, tier)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        "#,
        &[
            &study_id,
            &b.name,
            &b.canonical_name,
            &b.description,
            &arm,
            &b.average_value,
            &b.upper_end,
            &b.lower_end,
            &b.source,
            &b.context,
            &tier,
        ],
    )
    .await?;
    Ok(())
}

async fn insert_filing(tx: &Transaction<'_>, study_id: i32, form: &str, f: &Filing) -> Result<()> {
    // The filing's own form wins over the map key when both are present.
    let form_type = if f.form.is_empty() { form } else { f.form.as_str() };
    let total = f.total_mentions.map(|n| n as i32);
    let name = f.name_mentions.map(|n| n as i32);
    let nct = f.nct_mentions.map(|n| n as i32);
    let contexts = serde_json::to_value(&f.contexts)?;
    tx.execute(
        r#"
        INSERT INTO sec_filings
            (clinical_study_id, ticker, cik, accession_number, filing_date, form_type,
             filing_url, total_mentions, name_mentions, nct_mentions, contexts)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        "#,
        &[
            &study_id,
            &f.ticker,
            &f.cik,
            &f.accession_number,
            &f.filing_date,
            &form_type,
            &f.filing_url,
            &total,
            &name,
            &nct,
            &contexts,
        ],
    )
    .await?;
    Ok(())
}

const INSERT_PUBLICATION: &str = r#"
    INSERT INTO publications
        (clinical_study_id, title, link, snippet, source, authors, journal,
         full_text, local_path, text_sample, text_length)
    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
"#;

async fn insert_publications(tx: &Transaction<'_>, study_id: i32, p: &Publications) -> Result<()> {
    let none: Option<String> = None;
    for publication in &p.scientific_publications {
        let text_length = publication.text_length.map(|n| n.min(i32::MAX as usize) as i32);
        tx.execute(
            INSERT_PUBLICATION,
            &[
                &study_id,
                &publication.title,
                &publication.link,
                &publication.snippet,
                &SOURCE_SCIENTIFIC,
                &publication.authors,
                &publication.journal,
                &publication.full_text,
                &none,
                &none,
                &text_length,
            ],
        )
        .await?;
    }
    for presentation in &p.company_presentations {
        let text_length = presentation.text_length.map(|n| n.min(i32::MAX as usize) as i32);
        tx.execute(
            INSERT_PUBLICATION,
            &[
                &study_id,
                &presentation.title,
                &presentation.url,
                &presentation.snippet,
                &SOURCE_PRESENTATION,
                &none,
                &none,
                &none,
                &presentation.local_path,
                &presentation.text_sample,
                &text_length,
            ],
        )
        .await?;
    }
    if let Some(findings) = &p.extracted_clinical_data {
        let findings = serde_json::to_value(findings)?;
        tx.execute(
            "UPDATE clinical_study SET publication_findings = $2 WHERE id = $1",
            &[&study_id, &findings],
        )
        .await?;
    }
    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────────────────────

fn study_from_row(row: &Row) -> Result<StudyInfo> {
    let endpoints: serde_json::Value = row.get("endpoint_names");
    let baseline_characteristics: serde_json::Value = row.get("baseline_characteristics");
    Ok(StudyInfo {
        title: row.get("title"),
        nct_identifier: row.get("nct_identifier"),
        indication: row.get("indication"),
        intervention: row.get("intervention"),
        interventional_drug: DrugDescriptor {
            name: row.get("interventional_drug_name"),
            dose: row.get("interventional_drug_dose"),
            frequency: row.get("interventional_drug_frequency"),
            formulation: row.get("interventional_drug_formulation"),
        },
        phase: row.get("phase"),
        sponsor: row.get("sponsor"),
        study_arms: ArmCounts {
            intervention: row.get::<_, i32>("intervention_arms").max(0) as u32,
            placebo: row.get::<_, i32>("placebo_arms").max(0) as u32,
        },
        number_of_participants: row.get::<_, i64>("number_of_participants").max(0) as u64,
        average_age: row.get("average_age"),
        age_range: (
            row.get::<_, i32>("min_age").max(0) as u32,
            row.get::<_, i32>("max_age").max(0) as u32,
        ),
        endpoints: serde_json::from_value(endpoints)?,
        baseline_characteristics: serde_json::from_value(baseline_characteristics)?,
    })
}

fn text(row: &Row, column: &str) -> String {
    row.get::<_, Option<String>>(column).unwrap_or_default()
}

fn tier(row: &Row) -> Option<Tier> {
    row.get::<_, Option<&str>>("tier").and_then(Tier::from_label)
}

fn endpoint_from_row(row: &Row) -> Endpoint {
    Endpoint {
        name: row.get("name"),
        canonical_name: row.get("canonical_name"),
        description: text(row, "description"),
        timepoint: text(row, "timepoint"),
        arm: Arm::from_label(row.get("arm")),
        average_value: row.get("average_value"),
        upper_end: row.get("upper_end"),
        lower_end: row.get("lower_end"),
        statistical_significance: text(row, "statistical_significance"),
        source: row.get("source"),
        context: row.get("context"),
        tier: tier(row),
    }
}

fn baseline_from_row(row: &Row) -> BaselineMeasure {
    BaselineMeasure {
        name: row.get("name"),
        canonical_name: row.get("canonical_name"),
        description: text(row, "description"),
        arm: Arm::from_label(row.get("arm")),
        average_value: row.get("average_value"),
        upper_end: row.get("upper_end"),
        lower_end: row.get("lower_end"),
        source: row.get("source"),
        context: row.get("context"),
        tier: tier(row),
    }
}

fn filing_from_row(row: &Row) -> Result<Filing> {
    let contexts: serde_json::Value = row.get("contexts");
    let count = |column: &str| row.get::<_, Option<i32>>(column).map(|n| n.max(0) as u32);
    Ok(Filing {
        ticker: text(row, "ticker"),
        cik: text(row, "cik"),
        accession_number: text(row, "accession_number"),
        filing_date: text(row, "filing_date"),
        form: row.get("form_type"),
        filing_url: text(row, "filing_url"),
        total_mentions: count("total_mentions"),
        name_mentions: count("name_mentions"),
        nct_mentions: count("nct_mentions"),
        contexts: serde_json::from_value::<Vec<MentionContext>>(contexts)?,
    })
}

fn publication_from_row(row: &Row) -> ScientificPublication {
    ScientificPublication {
        title: text(row, "title"),
        link: text(row, "link"),
        snippet: text(row, "snippet"),
        authors: text(row, "authors"),
        journal: text(row, "journal"),
        full_text: row.get("full_text"),
        text_length: text_length(row),
    }
}

fn presentation_from_row(row: &Row) -> CompanyPresentation {
    CompanyPresentation {
        title: text(row, "title"),
        url: text(row, "link"),
        snippet: row.get("snippet"),
        local_path: row.get("local_path"),
        text_sample: row.get("text_sample"),
        text_length: text_length(row),
    }
}

fn text_length(row: &Row) -> Option<usize> {
    row.get::<_, Option<i32>>("text_length").map(|n| n.max(0) as usize)
}
