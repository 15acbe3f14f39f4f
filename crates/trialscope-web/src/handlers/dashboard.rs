//! Dashboard handler — landing page with trial table, common endpoints and
//! per-endpoint significance.

use axum::{extract::State, response::Html};
use tracing::warn;

use trialscope_common::{ApiError, TrialRecord};
use trialscope_ingestion::report::{
    escape_html, find_common_endpoints, load_reportable, render_summary_table, summary_table,
};

use crate::state::SharedState;

/// Navigation HTML template shared across all pages
pub const NAV_HTML: &str = include_str!("../../templates/nav.html");

const TOP_ENDPOINTS: usize = 10;

pub async fn dashboard(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let mut trial_count = None;
    if let Some(repo) = state.trials() {
        match repo.count().await {
            Ok(n) => trial_count = Some(n),
            Err(e) => warn!(error = %e, "trial count failed, using JSON store"),
        }
    }
    // Analysis runs over the JSON store, which always holds the full records.
    let (stored, records) = state
        .read_store(|store| (store.count() as u64, load_reportable(store)))
        .await?;
    let trial_count = trial_count.unwrap_or(stored);

    Ok(Html(render_dashboard(trial_count, state.db_type(), &records)))
}

fn render_dashboard(trial_count: u64, db_type: &str, records: &[TrialRecord]) -> String {
    let trials_html = if records.is_empty() {
        r#"<tr><td colspan="5" class="text-center text-muted">No trials processed yet. Run the pipeline to populate the store.</td></tr>"#.to_string()
    } else {
        records
            .iter()
            .map(|r| {
                let s = &r.clinical_study;
                let nct = escape_html(&s.nct_identifier);
                format!(r#"
            <tr>
                <td><a href="/trials/{}">{}</a></td>
                <td>{}</td>
                <td>{}</td>
                <td><span class="badge badge-outline">{}</span></td>
                <td>{}</td>
            </tr>"#, nct, nct, escape_html(&s.title), escape_html(&s.sponsor), escape_html(&s.phase), s.number_of_participants)
            })
            .collect()
    };

    let common = find_common_endpoints(records, TOP_ENDPOINTS);
    let endpoints_html = if common.is_empty() {
        r#"<li class="text-muted">No endpoints extracted yet.</li>"#.to_string()
    } else {
        common
            .iter()
            .map(|c| format!(
                r#"<li><a href="/endpoints/{}">{}</a> <span class="badge">{} trial(s)</span></li>"#,
                escape_html(&c.name), escape_html(&c.name), c.trials
            ))
            .collect()
    };

    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Dashboard — TrialScope</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 0; line-height: 1.5; }}
        .app-container {{ display: flex; }}
        .sidebar {{ width: 200px; padding: 20px; background: #2c3e50; color: #fff; min-height: 100vh; }}
        .sidebar a {{ color: #ecf0f1; }}
        .main-content {{ flex: 1; padding: 20px; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 20px; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        .stat-value {{ font-size: 2em; font-weight: bold; }}
        .text-muted {{ color: #7f8c8d; }}
    </style>
</head>
<body>
<div class="app-container">
{}
<main class="main-content">
    <div class="page-header">
        <h1 class="page-title">PAH Clinical Trials</h1>
        <p class="text-muted">Endpoints and baseline measures extracted from registry, filing and literature sources</p>
    </div>

    <div class="stats-grid">
        <div class="stat-card">
            <div class="stat-value" id="trial-count">{}</div>
            <div class="text-muted">Trials loaded ({})</div>
        </div>
        <div class="stat-card">
            <div class="stat-value" id="reportable-count">{}</div>
            <div class="text-muted">Trials with outcome data</div>
        </div>
    </div>

    <h2>Trials</h2>
    <table>
        <thead>
            <tr><th>NCT ID</th><th>Title</th><th>Sponsor</th><th>Phase</th><th>Participants</th></tr>
        </thead>
        <tbody>{}</tbody>
    </table>

    <h2>Common Endpoints</h2>
    <ul>{}</ul>

    <h2>Significance by Endpoint</h2>
    {}
</main>
</div>
</body>
</html>"#,
        NAV_HTML,
        trial_count,
        escape_html(db_type),
        records.len(),
        trials_html,
        endpoints_html,
        render_summary_table(&summary_table(records)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_test_utils::sample_record;

    #[test]
    fn test_render_empty_dashboard() {
        let html = render_dashboard(0, "json_files", &[]);
        assert!(html.contains("No trials processed yet"));
        assert!(html.contains("No endpoints extracted yet"));
        assert!(html.contains(NAV_HTML));
    }

    #[test]
    fn test_render_lists_trials_and_endpoints() {
        let records = vec![
            sample_record("NCT00000001", "Acme Pharma"),
            sample_record("NCT00000002", "Beta Bio"),
        ];
        let html = render_dashboard(2, "postgresql", &records);
        assert!(html.contains(r#"<a href="/trials/NCT00000001">NCT00000001</a>"#));
        assert!(html.contains("Beta Bio"));
        assert!(html.contains("trial(s)"));
        assert!(html.contains("postgresql"));
    }
}
