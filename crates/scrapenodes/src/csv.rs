use crate::NodesConfig;
use async_trait::async_trait;
use chrono::Utc;
use scrapecore::{names, ExecutionContext, Executor, ExecutorError, TaskType};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

type Row = BTreeMap<String, String>;

const PAGINATION_COLUMNS: [&str; 11] = [
    "type",
    "totalPages",
    "successfulPages",
    "failedPages",
    "timestamp",
    "page",
    "pageUrl",
    "pageStatus",
    "itemIndex",
    "itemValue",
    "error",
];

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_into(row: &mut Row, object: &Map<String, Value>, prefix: &str) {
    for (key, value) in object {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) => flatten_into(row, nested, &column),
            Value::Array(items) => {
                let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(", ");
                row.insert(column, joined);
            }
            other => {
                row.insert(column, scalar_text(other));
            }
        }
    }
}

fn flatten(object: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    flatten_into(&mut row, object, "");
    row
}

fn pagination_row(kind: &str, cells: &[(&str, String)]) -> Row {
    let mut row: Row = PAGINATION_COLUMNS
        .iter()
        .map(|c| (c.to_string(), String::new()))
        .collect();
    row.insert("type".to_string(), kind.to_string());
    for (column, value) in cells {
        row.insert(column.to_string(), value.clone());
    }
    row
}

/// One summary row, then a row per scraped item, then a row per failed
/// page that produced nothing.
fn flatten_pagination(report: &Map<String, Value>, pages: &[Value]) -> Vec<Row> {
    let field = |name: &str| report.get(name).map(scalar_text).unwrap_or_default();
    let mut rows = vec![pagination_row(
        "summary",
        &[
            ("totalPages", field("totalPages")),
            ("successfulPages", field("successfulPages")),
            ("failedPages", field("failedPages")),
            ("timestamp", Utc::now().to_rfc3339()),
        ],
    )];

    for page in pages {
        let page_field = |name: &str| page.get(name).map(scalar_text).unwrap_or_default();
        let location = [
            ("page", page_field("page")),
            ("pageUrl", page_field("url")),
            ("pageStatus", page_field("status")),
        ];
        let items = page
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if !items.is_empty() {
            for (index, item) in items.iter().enumerate() {
                let mut cells = location.to_vec();
                cells.push(("itemIndex", (index + 1).to_string()));
                cells.push(("itemValue", scalar_text(item)));
                cells.push(("error", page_field("error")));
                rows.push(pagination_row("data", &cells));
            }
        } else if page_field("status") == "failed" {
            let error = match page_field("error") {
                e if e.is_empty() => "Unknown error".to_string(),
                e => e,
            };
            let mut cells = location.to_vec();
            cells.push(("error", error));
            rows.push(pagination_row("error", &cells));
        }
    }
    rows
}

/// Turn any JSON document into table rows.
fn to_rows(data: &Value) -> Vec<Row> {
    match data {
        Value::Array(items) if matches!(items.first(), Some(Value::Object(_))) => items
            .iter()
            .map(|item| match item {
                Value::Object(object) => flatten(object),
                other => Row::from([("value".to_string(), scalar_text(other))]),
            })
            .collect(),
        Value::Object(object) => match object.get("results") {
            Some(Value::Array(pages)) => flatten_pagination(object, pages),
            _ => vec![flatten(object)],
        },
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                Row::from([
                    ("index".to_string(), (index + 1).to_string()),
                    ("value".to_string(), scalar_text(item)),
                ])
            })
            .collect(),
        other => vec![Row::from([("value".to_string(), scalar_text(other))])],
    }
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Header of every column in sorted order, then one line per row.
fn render(rows: &[Row]) -> String {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.iter().map(|c| escape(c)).collect::<Vec<_>>().join(","));
    for row in rows {
        let line = columns
            .iter()
            .map(|column| escape(row.get(*column).map(String::as_str).unwrap_or("")))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

fn file_name(requested: Option<&str>) -> String {
    let base = match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        _ => "scraped-data".to_string(),
    };
    format!("{}-{}.csv", base, Utc::now().format("%Y-%m-%dT%H-%M-%S"))
}

/// Write JSON data from an earlier node to a CSV file
pub struct CsvExportExecutor {
    export_dir: PathBuf,
    download_prefix: String,
}

impl CsvExportExecutor {
    pub fn new(config: &NodesConfig) -> Self {
        Self {
            export_dir: config.export_dir.clone(),
            download_prefix: config.download_prefix.trim_end_matches('/').to_string(),
        }
    }

    async fn write(&self, name: &str, content: String) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.export_dir).await?;
        let path = self.export_dir.join(name);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

#[async_trait]
impl Executor for CsvExportExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::CsvExport
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(source) = ctx.input_str(names::DATA_SOURCE).map(str::to_string) else {
            ctx.log().error("Data Source is required");
            return Ok(false);
        };
        let data: Value = match serde_json::from_str(&source) {
            Ok(data) => data,
            Err(e) => {
                ctx.log().error(format!("Failed to parse JSON data: {}", e));
                return Ok(false);
            }
        };

        ctx.log().info("Starting CSV export...");
        let rows = to_rows(&data);
        if rows.is_empty() {
            ctx.log().error("No data to export");
            return Ok(false);
        }

        let name = file_name(ctx.input_str(names::FILE_NAME));
        let path = match self.write(&name, render(&rows)).await {
            Ok(path) => path,
            Err(e) => {
                ctx.log().error(format!("CSV export failed: {}", e));
                return Ok(false);
            }
        };
        tracing::debug!(path = %path.display(), rows = rows.len(), "CSV written");

        ctx.set_output(
            names::DOWNLOAD_URL,
            format!("{}/{}", self.download_prefix, name),
        );
        ctx.set_output(names::ROW_COUNT, rows.len().to_string());
        ctx.log().info(format!(
            "CSV exported successfully: {} ({} rows)",
            name,
            rows.len()
        ));
        Ok(true)
    }
}
