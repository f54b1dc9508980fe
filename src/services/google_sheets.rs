//! services/google_sheets.rs
//! Cliente de Google Sheets sobre reqwest, autenticado con una service account (gcp_auth).
//!
//! Cada `open` re-autentica y resuelve la hoja por nombre; no se guarda ningún
//! cliente autorizado entre requests.

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::SheetError,
    models::status_model::{a1_cell, CellWrite, SheetHandle},
    services::sheet_client::{SheetConnector, StatusSheet},
};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Clone)]
pub struct GoogleSheetsConnector {
    credentials_json: Option<String>,
    http_client: Client,
}

impl GoogleSheetsConnector {
    pub fn new(credentials_json: Option<String>) -> Self {
        Self {
            credentials_json,
            http_client: Client::new(),
        }
    }

    async fn access_token(&self) -> Result<String, SheetError> {
        let json = self.credentials_json.as_deref().ok_or_else(|| {
            SheetError::Credentials("no hay credenciales de Google configuradas".to_string())
        })?;
        let account = CustomServiceAccount::from_json(json)
            .map_err(|e| SheetError::Credentials(e.to_string()))?;
        let token = account
            .token(SCOPES)
            .await
            .map_err(|e| SheetError::Auth(format!("no se pudo obtener token: {e}")))?;
        Ok(token.as_str().to_string())
    }

    /// Busca la hoja por nombre en Drive; si hay varias, gana la primera.
    async fn resolve_spreadsheet_id(&self, token: &str, name: &str) -> Result<String, SheetError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        let resp = self
            .http_client
            .get(DRIVE_FILES_API)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "10"),
            ])
            .send()
            .await?;
        let list: DriveFileList = check(resp).await?.json().await?;
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| SheetError::NotFound(format!("spreadsheet '{}'", name)))
    }

    async fn resolve_tab_id(
        &self,
        token: &str,
        spreadsheet_id: &str,
        tab: &str,
    ) -> Result<i64, SheetError> {
        let url = format!("{}/{}", SHEETS_API, spreadsheet_id);
        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(resp).await?.json().await?;
        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == tab)
            .map(|p| p.sheet_id)
            .ok_or_else(|| SheetError::NotFound(format!("pestaña '{}'", tab)))
    }
}

#[async_trait]
impl SheetConnector for GoogleSheetsConnector {
    async fn open(&self, handle: &SheetHandle) -> Result<Box<dyn StatusSheet>, SheetError> {
        let token = self.access_token().await?;
        let spreadsheet_id = self.resolve_spreadsheet_id(&token, &handle.sheet).await?;
        let tab_id = self
            .resolve_tab_id(&token, &spreadsheet_id, &handle.tab)
            .await?;
        log::debug!(
            "(google_sheets) Hoja {} resuelta a id={} sheetId={}",
            handle,
            spreadsheet_id,
            tab_id
        );

        Ok(Box::new(GoogleSheet {
            http_client: self.http_client.clone(),
            token,
            spreadsheet_id,
            tab: handle.tab.clone(),
            tab_id,
        }))
    }
}

/// Pestaña abierta con un token ya emitido.
pub struct GoogleSheet {
    http_client: Client,
    token: String,
    spreadsheet_id: String,
    tab: String,
    tab_id: i64,
}

impl GoogleSheet {
    /// Rango A1 calificado con la pestaña: `'Mi pestaña'!E5`.
    fn qualified(&self, range: &str) -> String {
        format!("{}!{}", quote_tab(&self.tab), range)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }
}

#[async_trait]
impl StatusSheet for GoogleSheet {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let resp = self
            .http_client
            .get(self.values_url(&quote_tab(&self.tab)))
            .bearer_auth(&self.token)
            .query(&[("valueRenderOption", "FORMATTED_VALUE")])
            .send()
            .await?;
        let range: ValueRange = check(resp).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn insert_row(&self, values: &[String], position: usize) -> Result<(), SheetError> {
        let start = position.saturating_sub(1);
        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": {
                        "sheetId": self.tab_id,
                        "dimension": "ROWS",
                        "startIndex": start,
                        "endIndex": start + 1
                    },
                    "inheritFromBefore": false
                }
            }]
        });
        let url = format!("{}/{}:batchUpdate", SHEETS_API, self.spreadsheet_id);
        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        check(resp).await?;

        let row = start + 1;
        let last_col = values.len().max(1) - 1;
        let range = self.qualified(&format!("{}:{}", a1_cell(row, 0), a1_cell(row, last_col)));
        let resp = self
            .http_client
            .put(self.values_url(&range))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "values": [values] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), SheetError> {
        let data: Vec<_> = writes
            .iter()
            .map(|w| json!({ "range": self.qualified(&w.cell), "values": [[w.value]] }))
            .collect();
        let url = format!(
            "{}/{}/values:batchUpdate",
            SHEETS_API, self.spreadsheet_id
        );
        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "valueInputOption": "RAW", "data": data }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Nombre de pestaña entre comillas simples, duplicando las internas.
pub fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn check(resp: Response) -> Result<Response, SheetError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let message = serde_json::from_str::<GoogleErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SheetError::Auth(message),
        StatusCode::NOT_FOUND => SheetError::NotFound(message),
        other => SheetError::Api {
            status: other.as_u16(),
            message,
        },
    })
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}
