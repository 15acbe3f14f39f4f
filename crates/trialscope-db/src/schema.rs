//! Relational schema for trial records.
//!
//! Every child table references `clinical_study(id)` with `ON DELETE CASCADE`,
//! so deleting a study removes everything it owns.

pub const TABLE_CLINICAL_STUDY: &str = "clinical_study";
pub const TABLE_ENDPOINTS: &str = "endpoints";
pub const TABLE_BASELINE_MEASURES: &str = "baseline_measures";
pub const TABLE_SEC_FILINGS: &str = "sec_filings";
pub const TABLE_PUBLICATIONS: &str = "publications";

/// `publications.source` for scientific publications.
pub const SOURCE_SCIENTIFIC: &str = "scientific_publication";
/// `publications.source` for company presentations.
pub const SOURCE_PRESENTATION: &str = "company_presentation";

// =============================================================================
// DDL
// =============================================================================

/// Statements creating every table, parents first. Idempotent.
pub const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS clinical_study (
        id                              SERIAL PRIMARY KEY,
        title                           VARCHAR(500) NOT NULL DEFAULT '',
        nct_identifier                  VARCHAR(20) NOT NULL UNIQUE,
        indication                      VARCHAR(200) NOT NULL DEFAULT '',
        intervention                    VARCHAR(500) NOT NULL DEFAULT '',
        interventional_drug_name        VARCHAR(200) NOT NULL DEFAULT '',
        interventional_drug_dose        VARCHAR(100) NOT NULL DEFAULT '',
        interventional_drug_frequency   VARCHAR(100) NOT NULL DEFAULT '',
        interventional_drug_formulation VARCHAR(100) NOT NULL DEFAULT '',
        intervention_arms               INTEGER NOT NULL DEFAULT 0,
        placebo_arms                    INTEGER NOT NULL DEFAULT 0,
        number_of_participants          BIGINT NOT NULL DEFAULT 0,
        average_age                     DOUBLE PRECISION NOT NULL DEFAULT 0,
        min_age                         INTEGER NOT NULL DEFAULT 0,
        max_age                         INTEGER NOT NULL DEFAULT 0,
        phase                           VARCHAR(50) NOT NULL DEFAULT '',
        sponsor                         VARCHAR(200) NOT NULL DEFAULT '',
        endpoint_names                  JSONB NOT NULL DEFAULT '[]',
        baseline_characteristics        JSONB NOT NULL DEFAULT '[]',
        publication_findings            JSONB
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS endpoints (
        id                       SERIAL PRIMARY KEY,
        clinical_study_id        INTEGER NOT NULL REFERENCES clinical_study(id) ON DELETE CASCADE,
        name                     VARCHAR(500) NOT NULL,
        canonical_name           VARCHAR(500),
        description              TEXT,
        timepoint                VARCHAR(100),
        arm                      VARCHAR(50) NOT NULL,
        average_value            DOUBLE PRECISION,
        upper_end                DOUBLE PRECISION,
        lower_end                DOUBLE PRECISION,
        statistical_significance VARCHAR(100),
        source                   TEXT,
        context                  TEXT,
        tier                     VARCHAR(20)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS baseline_measures (
        id                SERIAL PRIMARY KEY,
        clinical_study_id INTEGER NOT NULL REFERENCES clinical_study(id) ON DELETE CASCADE,
        name              VARCHAR(500) NOT NULL,
        canonical_name    VARCHAR(500),
        description       TEXT,
        arm               VARCHAR(50) NOT NULL,
        average_value     DOUBLE PRECISION,
        upper_end         DOUBLE PRECISION,
        lower_end         DOUBLE PRECISION,
        source            TEXT,
        context           TEXT,
        tier              VARCHAR(20)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS sec_filings (
        id                SERIAL PRIMARY KEY,
        clinical_study_id INTEGER NOT NULL REFERENCES clinical_study(id) ON DELETE CASCADE,
        ticker            VARCHAR(20),
        cik               VARCHAR(20),
        accession_number  VARCHAR(100),
        filing_date       VARCHAR(500),
        form_type         VARCHAR(20) NOT NULL,
        filing_url        VARCHAR(2000),
        total_mentions    INTEGER,
        name_mentions     INTEGER,
        nct_mentions      INTEGER,
        contexts          JSONB NOT NULL DEFAULT '[]'
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS publications (
        id                SERIAL PRIMARY KEY,
        clinical_study_id INTEGER NOT NULL REFERENCES clinical_study(id) ON DELETE CASCADE,
        title             VARCHAR(1000),
        link              VARCHAR(2000),
        snippet           TEXT,
        source            VARCHAR(100) NOT NULL,
        authors           VARCHAR(1000),
        journal           VARCHAR(500),
        full_text         TEXT,
        local_path        VARCHAR(2000),
        text_sample       TEXT,
        text_length       INTEGER
    )"#,
    // Columns added after the first release.
    "ALTER TABLE clinical_study ADD COLUMN IF NOT EXISTS publication_findings JSONB",
    "ALTER TABLE publications ADD COLUMN IF NOT EXISTS text_length INTEGER",
    "CREATE INDEX IF NOT EXISTS idx_endpoints_study ON endpoints (clinical_study_id)",
    "CREATE INDEX IF NOT EXISTS idx_baseline_measures_study ON baseline_measures (clinical_study_id)",
    "CREATE INDEX IF NOT EXISTS idx_sec_filings_study ON sec_filings (clinical_study_id)",
    "CREATE INDEX IF NOT EXISTS idx_publications_study ON publications (clinical_study_id)",
];

/// Statements dropping every table, children first.
pub const DROP_STATEMENTS: &[&str] = &[
    "DROP TABLE IF EXISTS publications",
    "DROP TABLE IF EXISTS sec_filings",
    "DROP TABLE IF EXISTS baseline_measures",
    "DROP TABLE IF EXISTS endpoints",
    "DROP TABLE IF EXISTS clinical_study",
];
