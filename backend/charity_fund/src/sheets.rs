//! Google Sheets export of the funding-speed report.
//!
//! ## Flow
//!
//! 1. `POST {sheets}/spreadsheets` creates a one-sheet grid document.
//! 2. `POST {drive}/files/{id}/permissions` grants writer access to the
//!    configured account.
//! 3. `PUT {sheets}/spreadsheets/{id}/values/{range}` writes the rows.
//!
//! ## Resilience
//!
//! Transport errors and HTTP 429 are retried with exponential back-off, up to
//! [`MAX_ATTEMPTS`] attempts.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::models::CharityProject;

pub const ROW_COUNT: usize = 100;
pub const COLUMN_COUNT: usize = 100;
pub const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 8;

// ─────────────────────────────────────────────────────────
// Report shapes
// ─────────────────────────────────────────────────────────

/// One line of the funding-speed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub funding_time: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedReport {
    pub spreadsheet_id: String,
    pub spreadsheet_url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSpreadsheet {
    #[serde(rename = "spreadsheetId")]
    spreadsheet_id: String,
    #[serde(rename = "spreadsheetUrl")]
    spreadsheet_url: Option<String>,
}

/// Render a duration as `"<d> days, H:MM:SS"`, or `"H:MM:SS"` under a day.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        _ => format!("{days} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

/// Closed projects as report rows, keeping the caller's order.
pub fn report_rows(projects: &[CharityProject]) -> Vec<ReportRow> {
    projects
        .iter()
        .filter_map(|p| {
            let closed = p.close_date?;
            Some(ReportRow {
                name: p.name.clone(),
                funding_time: format_duration(closed - p.create_date),
                description: p.description.clone(),
            })
        })
        .collect()
}

/// Full sheet contents: three header lines followed by the report rows.
pub fn table_values(rows: &[ReportRow], generated_at: &str) -> Vec<Vec<String>> {
    let mut values = vec![
        vec!["Report from".to_string(), generated_at.to_string()],
        vec!["Top projects by funding speed".to_string()],
        vec![
            "Project name".to_string(),
            "Funding time".to_string(),
            "Description".to_string(),
        ],
    ];
    values.extend(
        rows.iter()
            .map(|r| vec![r.name.clone(), r.funding_time.clone(), r.description.clone()]),
    );
    values
}

/// Returns `(rows, columns)` or an error if the grid would overflow.
pub fn check_dimensions(values: &[Vec<String>]) -> Result<(usize, usize)> {
    let rows = values.len();
    let cols = values.iter().map(Vec::len).max().unwrap_or(0);
    if rows > ROW_COUNT || cols > COLUMN_COUNT {
        return Err(AppError::Report(format!(
            "table is too large: {rows} rows of {ROW_COUNT} allowed, \
             {cols} columns of {COLUMN_COUNT} allowed"
        )));
    }
    Ok((rows, cols))
}

pub fn spreadsheet_body(generated_at: &str) -> Value {
    json!({
        "properties": {
            "title": format!("Report for {generated_at}"),
            "locale": "en_US",
        },
        "sheets": [{
            "properties": {
                "sheetType": "GRID",
                "sheetId": 0,
                "title": "Sheet1",
                "gridProperties": {
                    "rowCount": ROW_COUNT,
                    "columnCount": COLUMN_COUNT,
                }
            }
        }]
    })
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Create, share and fill a spreadsheet with the given report rows.
pub async fn export_report(
    client: &Client,
    config: &Config,
    rows: &[ReportRow],
    generated_at: NaiveDateTime,
) -> Result<ExportedReport> {
    let token = config.google_access_token.as_deref().ok_or_else(|| {
        AppError::Config("GOOGLE_ACCESS_TOKEN is required for report export".to_string())
    })?;

    let date = generated_at.format(DATE_FORMAT).to_string();
    let values = table_values(rows, &date);
    let (row_count, col_count) = check_dimensions(&values)?;

    let created: CreatedSpreadsheet = serde_json::from_value(
        call(
            client,
            Method::POST,
            &format!("{}/spreadsheets", config.sheets_api_url),
            token,
            &spreadsheet_body(&date),
        )
        .await?,
    )?;
    let spreadsheet_id = created.spreadsheet_id;

    if let Some(email) = &config.google_share_email {
        call(
            client,
            Method::POST,
            &format!(
                "{}/files/{spreadsheet_id}/permissions?fields=id",
                config.drive_api_url
            ),
            token,
            &json!({ "type": "user", "role": "writer", "emailAddress": email }),
        )
        .await?;
    }

    call(
        client,
        Method::PUT,
        &format!(
            "{}/spreadsheets/{spreadsheet_id}/values/R1C1:R{row_count}C{col_count}?valueInputOption=USER_ENTERED",
            config.sheets_api_url
        ),
        token,
        &json!({ "majorDimension": "ROWS", "values": values }),
    )
    .await?;

    let spreadsheet_url = created
        .spreadsheet_url
        .unwrap_or_else(|| format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}"));
    info!("Exported {} report row(s) to {spreadsheet_url}", rows.len());

    Ok(ExportedReport {
        spreadsheet_id,
        spreadsheet_url,
    })
}

/// Send one JSON request, retrying transport failures and rate limits.
async fn call(
    client: &Client,
    method: Method,
    url: &str,
    token: &str,
    body: &Value,
) -> Result<Value> {
    let mut backoff = INITIAL_BACKOFF_SECS;
    let mut attempt = 1;

    loop {
        let response = client
            .request(method.clone(), url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await;

        match response {
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!("Google API request failed (will retry in {backoff}s): {e}");
            }
            Err(e) => return Err(e.into()),
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                    warn!("Rate-limited by Google API (will retry in {backoff}s)");
                } else if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(AppError::Report(format!(
                        "{method} {url} returned {status}: {text}"
                    )));
                } else {
                    debug!("{method} {url} -> {status}");
                    return Ok(resp.json().await?);
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
        attempt += 1;
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
