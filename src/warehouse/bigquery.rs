//! BigQuery warehouse over the REST API.

use super::{Cell, DryRunReport, FieldMode, FieldSchema, QueryResult, Row, TableKind, TableSchema, Warehouse};
use crate::error::{GalleryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2/";

/// Server-side wait per request while a job runs.
const JOB_TIMEOUT_MS: u64 = 30_000;

/// Polls of `getQueryResults` before giving up on a job.
const MAX_POLLS: usize = 10;

/// BigQuery client scoped to one project and dataset.
pub struct BigQueryWarehouse {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    dataset_id: String,
    location: Option<String>,
    access_token: String,
}

impl BigQueryWarehouse {
    /// Create a client using the public endpoint.
    pub fn new(project_id: String, dataset_id: String, access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id,
            dataset_id,
            location: None,
            access_token,
        }
    }

    /// Set the processing location for jobs.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Point the client at another endpoint (e.g. an emulator).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        Url::parse(endpoint)?;
        self.endpoint = endpoint.to_string();
        Ok(self)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| GalleryError::Config(format!("Invalid BigQuery endpoint: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with status {}", status));
            return Err(GalleryError::Warehouse(message));
        }

        Ok(response.json().await?)
    }

    /// Submit a query job and wait for it to complete.
    async fn run_job(&self, sql: &str, dry_run: bool, max_rows: usize) -> Result<QueryResponse> {
        let mut body = json!({
            "query": sql,
            "useLegacySql": false,
            "dryRun": dry_run,
            "maxResults": max_rows,
            "timeoutMs": JOB_TIMEOUT_MS,
            "defaultDataset": {
                "projectId": self.project_id,
                "datasetId": self.dataset_id,
            },
        });
        if let Some(location) = &self.location {
            body["location"] = json!(location);
        }

        let url = self.url(&["projects", self.project_id.as_str(), "queries"])?;
        let mut response: QueryResponse = self.send(self.http.post(url).json(&body)).await?;
        response.check_errors()?;

        if dry_run {
            return Ok(response);
        }

        let mut polls = 0;
        while !response.job_complete {
            polls += 1;
            if polls > MAX_POLLS {
                return Err(GalleryError::Warehouse(
                    "Query did not complete in time".to_string(),
                ));
            }

            let job = response.job_reference.clone().ok_or_else(|| {
                GalleryError::Warehouse("Incomplete job without a job reference".to_string())
            })?;
            debug!("Waiting for job {} (poll {})", job.job_id, polls);

            let url = self.url(&["projects", self.project_id.as_str(), "queries", job.job_id.as_str()])?;
            let mut params = vec![
                ("maxResults", max_rows.to_string()),
                ("timeoutMs", JOB_TIMEOUT_MS.to_string()),
            ];
            if let Some(location) = job.location.or_else(|| self.location.clone()) {
                params.push(("location", location));
            }

            response = self.send(self.http.get(url).query(&params)).await?;
            response.check_errors()?;
        }

        Ok(response)
    }

    async fn get_table(&self, table: &str) -> Result<TableResource> {
        let url = self.url(&[
            "projects",
            self.project_id.as_str(),
            "datasets",
            self.dataset_id.as_str(),
            "tables",
            table,
        ])?;
        self.send(self.http.get(url)).await
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &str {
        "bigquery"
    }

    fn project_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn dataset_id(&self) -> Option<&str> {
        Some(&self.dataset_id)
    }

    fn qualified_name(&self, table: &str) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, table)
    }

    #[instrument(skip(self, sql))]
    async fn dry_run(&self, sql: &str) -> Result<DryRunReport> {
        let response = self.run_job(sql, true, 0).await?;
        let bytes_processed = response
            .total_bytes_processed
            .as_deref()
            .and_then(|b| b.parse().ok());
        debug!("Dry run would process {:?} bytes", bytes_processed);
        Ok(DryRunReport { bytes_processed })
    }

    #[instrument(skip(self, sql))]
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let response = self.run_job(sql, false, max_rows).await?;
        Ok(response.into_result(max_rows))
    }

    #[instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let url = self.url(&[
            "projects",
            self.project_id.as_str(),
            "datasets",
            self.dataset_id.as_str(),
            "tables",
        ])?;

        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url.clone());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: TableList = self.send(request).await?;
            names.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let resource = self.get_table(&name).await?;
            tables.push(TableSchema {
                name,
                kind: parse_table_kind(resource.kind.as_deref()),
                fields: resource.schema.map(|s| s.fields).unwrap_or_default(),
            });
        }

        info!("Found {} tables in {}.{}", tables.len(), self.project_id, self.dataset_id);
        Ok(tables)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<QueryResult> {
        let resource = self.get_table(table).await?;
        let fields = resource.schema.map(|s| s.fields).unwrap_or_default();

        let url = self.url(&[
            "projects",
            self.project_id.as_str(),
            "datasets",
            self.dataset_id.as_str(),
            "tables",
            table,
            "data",
        ])?;
        let data: TableData = self
            .send(self.http.get(url).query(&[("maxResults", limit.to_string())]))
            .await?;

        Ok(QueryResult {
            columns: fields.iter().map(|f| f.name.clone()).collect(),
            rows: decode_rows(&fields, &data.rows, limit),
        })
    }
}

/// Find an access token for the REST API.
///
/// Uses the named environment variable when set, otherwise asks the gcloud CLI.
pub(crate) async fn resolve_access_token(env_var: &str) -> Result<String> {
    if let Ok(token) = std::env::var(env_var) {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    debug!("{} not set, falling back to gcloud", env_var);
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GalleryError::ToolNotFound("gcloud".to_string()),
            _ => GalleryError::Io(e),
        })?;

    if !output.status.success() {
        warn!("gcloud could not print an access token");
        return Err(GalleryError::Config(format!(
            "No access token: set {} or run 'gcloud auth login'",
            env_var
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    schema: Option<SchemaJson>,
    #[serde(default)]
    rows: Vec<RowJson>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    total_bytes_processed: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

impl QueryResponse {
    fn check_errors(&self) -> Result<()> {
        match self.errors.first() {
            Some(error) if self.job_complete => Err(GalleryError::Warehouse(error.message.clone())),
            _ => Ok(()),
        }
    }

    fn into_result(self, max_rows: usize) -> QueryResult {
        match self.schema {
            Some(schema) => QueryResult {
                columns: schema.fields.iter().map(|f| f.name.clone()).collect(),
                rows: decode_rows(&schema.fields, &self.rows, max_rows),
            },
            None => QueryResult::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SchemaJson {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct RowJson {
    #[serde(default)]
    f: Vec<CellJson>,
}

#[derive(Debug, Deserialize)]
struct CellJson {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableListEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListEntry {
    table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

#[derive(Debug, Deserialize)]
struct TableResource {
    #[serde(default)]
    schema: Option<SchemaJson>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableData {
    #[serde(default)]
    rows: Vec<RowJson>,
}

fn parse_table_kind(kind: Option<&str>) -> TableKind {
    match kind {
        Some("TABLE") | None => TableKind::Table,
        Some("VIEW") | Some("MATERIALIZED_VIEW") => TableKind::View,
        Some(_) => TableKind::Other,
    }
}

fn decode_rows(fields: &[FieldSchema], rows: &[RowJson], max_rows: usize) -> Vec<Row> {
    rows.iter()
        .take(max_rows)
        .map(|row| Row {
            values: fields
                .iter()
                .zip(row.f.iter())
                .map(|(field, cell)| (field.name.clone(), decode_cell(field, &cell.v)))
                .collect(),
        })
        .collect()
}

fn decode_cell(field: &FieldSchema, value: &Value) -> Cell {
    if value.is_null() {
        return Cell::Null;
    }
    if field.mode == FieldMode::Repeated {
        let items = value.as_array().cloned().unwrap_or_default();
        return Cell::Array(items.iter().map(|item| decode_scalar(field, &item["v"])).collect());
    }
    decode_scalar(field, value)
}

fn decode_scalar(field: &FieldSchema, value: &Value) -> Cell {
    if value.is_null() {
        return Cell::Null;
    }

    let field_type = field.field_type.to_uppercase();
    if field_type == "RECORD" || field_type == "STRUCT" {
        let cells = value["f"].as_array().cloned().unwrap_or_default();
        return Cell::Record(
            field
                .fields
                .iter()
                .zip(cells.iter())
                .map(|(sub, cell)| (sub.name.clone(), decode_cell(sub, &cell["v"])))
                .collect(),
        );
    }

    let Some(raw) = value.as_str() else {
        return Cell::Text(value.to_string());
    };
    let text = || Cell::Text(raw.to_string());

    match field_type.as_str() {
        "INTEGER" | "INT64" => raw.parse().map(Cell::Int).unwrap_or_else(|_| text()),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            raw.parse().map(Cell::Float).unwrap_or_else(|_| text())
        }
        "BOOLEAN" | "BOOL" => Cell::Bool(raw.eq_ignore_ascii_case("true")),
        "DATE" => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Cell::Date)
            .unwrap_or_else(|_| text()),
        "DATETIME" => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| text()),
        "TIMESTAMP" => raw
            .parse::<f64>()
            .ok()
            .and_then(|secs| {
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9).round() as u32;
                DateTime::from_timestamp(whole as i64, nanos)
            })
            .map(Cell::Timestamp)
            .unwrap_or_else(text),
        _ => text(),
    }
}
