mod common;

use common::*;
use scrapecore::names;
use scrapenodes::{CsvExportExecutor, NodesConfig};
use serde_json::json;
use tempfile::TempDir;

struct Export {
    dir: TempDir,
    executor: CsvExportExecutor,
}

fn export() -> Export {
    let dir = tempfile::tempdir().unwrap();
    let executor = CsvExportExecutor::new(&NodesConfig {
        export_dir: dir.path().join("exports"),
        ..config()
    });
    Export { dir, executor }
}

impl Export {
    /// Run the export and return the download URL and the file content.
    async fn run(&self, source: &str, name: Option<&str>) -> (Invocation, Option<String>) {
        let mut inputs = vec![(names::DATA_SOURCE, text(source))];
        if let Some(name) = name {
            inputs.push((names::FILE_NAME, text(name)));
        }
        let run = invoke(&self.executor, environment(&inputs, None)).await;
        let content = run
            .output(names::DOWNLOAD_URL)
            .and_then(|url| url.as_str())
            .map(|url| {
                let file = url.trim_start_matches("/exports/");
                std::fs::read_to_string(self.dir.path().join("exports").join(file)).unwrap()
            });
        (run, content)
    }
}

#[tokio::test]
async fn exports_objects_with_sorted_flattened_columns() {
    let export = export();
    let data = json!([
        {"name": "tokio", "meta": {"stars": 25000, "license": "MIT"}, "tags": ["async", "io"]},
        {"name": "serde", "meta": {"stars": 9000}, "note": null},
    ]);

    let (run, content) = export.run(&data.to_string(), Some("crates")).await;

    assert!(run.succeeded);
    assert_eq!(run.output_str(names::ROW_COUNT), "2");
    assert_eq!(
        content.unwrap(),
        "meta.license,meta.stars,name,note,tags\n\
         MIT,25000,tokio,,\"async, io\"\n\
         ,9000,serde,,"
    );
}

#[tokio::test]
async fn quotes_cells_with_separators() {
    let export = export();
    let data = json!([{"quote": "say \"hi\"", "lines": "a\nb", "plain": "ok"}]);

    let (_, content) = export.run(&data.to_string(), None).await;

    assert_eq!(
        content.unwrap(),
        "lines,plain,quote\n\"a\nb\",ok,\"say \"\"hi\"\"\""
    );
}

#[tokio::test]
async fn quotes_cells_with_carriage_returns() {
    let export = export();
    let data = json!([{"note": "line\r\nbreak", "plain": "ok"}]);

    let (_, content) = export.run(&data.to_string(), None).await;

    assert_eq!(content.unwrap(), "note,plain\n\"line\r\nbreak\",ok");
}

#[tokio::test]
async fn exports_pagination_reports_as_summary_and_item_rows() {
    let export = export();
    let report = json!({
        "totalPages": 2,
        "successfulPages": 1,
        "failedPages": 1,
        "results": [
            {"page": 1, "url": "https://example.com?page=1", "status": "success", "results": ["/a", "/b"]},
            {"page": 2, "url": "https://example.com?page=2", "status": "failed", "results": [], "error": "Selector not found: a"},
        ],
    });

    let (run, content) = export.run(&report.to_string(), None).await;

    assert!(run.succeeded);
    assert_eq!(run.output_str(names::ROW_COUNT), "4");
    let content = content.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "error,failedPages,itemIndex,itemValue,page,pageStatus,pageUrl,successfulPages,timestamp,totalPages,type"
    );
    assert!(lines[1].starts_with(",1,,,,,,1,"));
    assert!(lines[1].ends_with(",2,summary"));
    assert_eq!(lines[2], ",,1,/a,1,success,https://example.com?page=1,,,,data");
    assert_eq!(lines[3], ",,2,/b,1,success,https://example.com?page=1,,,,data");
    assert_eq!(
        lines[4],
        "Selector not found: a,,,,2,failed,https://example.com?page=2,,,,error"
    );
}

#[tokio::test]
async fn exports_primitives() {
    let export = export();

    let (run, content) = export.run(r#"["tokio", 3, true]"#, None).await;
    assert_eq!(run.output_str(names::ROW_COUNT), "3");
    assert_eq!(content.unwrap(), "index,value\n1,tokio\n2,3\n3,true");

    let (_, content) = export.run("42", None).await;
    assert_eq!(content.unwrap(), "value\n42");

    let (_, content) = export.run(r#"{"only": "row"}"#, None).await;
    assert_eq!(content.unwrap(), "only\nrow");
}

#[tokio::test]
async fn file_names_are_sanitized_and_timestamped() {
    let export = export();

    let (run, _) = export.run(r#"[{"a": 1}]"#, Some("  my report/2024  ")).await;
    let url = run.output_str(names::DOWNLOAD_URL);
    assert!(url.starts_with("/exports/my_report_2024-"), "{}", url);
    assert!(url.ends_with(".csv"));
    // "-YYYY-MM-DDTHH-MM-SS.csv"
    assert_eq!(url.len(), "/exports/my_report_2024".len() + 24);

    let (run, _) = export.run(r#"[{"a": 1}]"#, Some("   ")).await;
    assert!(run
        .output_str(names::DOWNLOAD_URL)
        .starts_with("/exports/scraped-data-"));
}

#[tokio::test]
async fn rejects_missing_invalid_and_empty_data() {
    let export = export();

    let run = invoke(&export.executor, environment(&[], None)).await;
    assert_eq!(run.errors(), vec!["Data Source is required"]);

    let (run, _) = export.run("{not json", None).await;
    assert!(!run.succeeded);
    assert!(run.errors()[0].starts_with("Failed to parse JSON data: "));

    let (run, content) = export.run("[]", None).await;
    assert!(!run.succeeded);
    assert_eq!(run.errors(), vec!["No data to export"]);
    assert!(content.is_none());
}
