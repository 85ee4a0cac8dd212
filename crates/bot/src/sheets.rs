//! Google Sheets v4 [`LedgerStore`].
//!
//! Uses a caller-supplied OAuth access token; acquiring and refreshing it
//! is left to the deployment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::{LedgerCell, LedgerError, LedgerStore};

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [&'a [LedgerCell]; 1],
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn map_transport(e: reqwest::Error) -> LedgerError {
    LedgerError::Network(e.to_string())
}

pub struct GoogleSheetsStore {
    base_url: String,
    access_token: String,
    client: Client,
}

impl GoogleSheetsStore {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Network(format!("http client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            client,
        })
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> String {
        format!("{}/{}/values/{}", self.base_url, sheet_id, range)
    }
}

#[async_trait]
impl LedgerStore for GoogleSheetsStore {
    async fn read_column(&self, sheet_id: &str, column: &str) -> Result<Vec<String>, LedgerError> {
        let url = self.values_url(sheet_id, &format!("{}:{}", column, column));
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(map_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("read column failed {} {}", status, t)));
        }
        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        Ok(body
            .values
            .iter()
            .map(|row| row.first().map(cell_text).unwrap_or_default())
            .collect())
    }

    async fn append_row(&self, sheet_id: &str, range: &str, values: &[LedgerCell]) -> Result<(), LedgerError> {
        let url = format!("{}:append", self.values_url(sheet_id, range));
        debug!(range, cells = values.len(), "appending ledger row");
        let body = AppendBody {
            range,
            major_dimension: "ROWS",
            values: [values],
        };
        let resp = self
            .client
            .post(&url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let t = resp.text().await.unwrap_or_default();
            Err(LedgerError::Rejected(format!("append row failed {} {}", status, t)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_range_first_cells() {
        let body: ValueRange =
            serde_json::from_str(r#"{"range":"A1:A3","values":[["Name"],[],[12]]}"#).unwrap();
        let col: Vec<String> = body
            .values
            .iter()
            .map(|row| row.first().map(cell_text).unwrap_or_default())
            .collect();
        assert_eq!(col, vec!["Name", "", "12"]);

        let empty: ValueRange = serde_json::from_str(r#"{"range":"A1:A1"}"#).unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn append_body_shape() {
        let cells = vec![LedgerCell::Text("Alice".into()), LedgerCell::Number(5)];
        let body = AppendBody {
            range: "A2:B2",
            major_dimension: "ROWS",
            values: [&cells],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"range":"A2:B2","majorDimension":"ROWS","values":[["Alice",5]]}"#
        );
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let store = GoogleSheetsStore::new("http://sheets.local/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(store.values_url("id", "A:A"), "http://sheets.local/id/values/A:A");
    }
}
