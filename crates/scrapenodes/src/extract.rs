use async_trait::async_trait;
use scrapecore::{names, ExecutionContext, Executor, ExecutorError, TaskType, TaskValue};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One named selector of an Extract Multiple Elements node.
#[derive(Debug, Clone, Deserialize)]
struct Field {
    name: String,
    selector: String,
}

fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("Invalid selector {}: {}", selector, e))
}

fn first_text(html: &str, selector: &str) -> Result<Option<String>, String> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string()))
}

fn all_texts(document: &Html, selector: &str) -> Result<Vec<String>, String> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect())
}

/// Accepts a JSON array of `{name, selector}` objects, or an array of
/// strings each holding one such object.
fn parse_fields(value: &TaskValue) -> Option<Vec<Field>> {
    let Value::Array(items) = value.to_json()? else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(raw) => serde_json::from_str(&raw).ok(),
            other => serde_json::from_value(other).ok(),
        })
        .collect()
}

fn extract_fields(html: &str, fields: &[Field]) -> Result<Value, String> {
    let document = Html::parse_document(html);
    let mut rows = Vec::with_capacity(fields.len());
    for field in fields {
        let mut row = Map::new();
        let texts = all_texts(&document, &field.selector)?;
        row.insert(field.name.clone(), Value::from(texts));
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

/// Text of the first element matching a CSS selector
pub struct ExtractTextExecutor;

#[async_trait]
impl Executor for ExtractTextExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ExtractTextFromElement
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(html) = ctx.require_str(names::HTML) else {
            return Ok(false);
        };
        let Some(selector) = ctx.require_str(names::SELECTOR) else {
            return Ok(false);
        };

        match first_text(&html, &selector) {
            Ok(Some(text)) if !text.is_empty() => {
                ctx.set_output(names::EXTRACTED_TEXT, text);
                Ok(true)
            }
            Ok(Some(_)) => {
                ctx.log().error("Element has no text");
                Ok(false)
            }
            Ok(None) => {
                ctx.log().error("Element not found");
                Ok(false)
            }
            Err(message) => {
                ctx.log().error(message);
                Ok(false)
            }
        }
    }
}

/// Texts of every element matching each named selector
pub struct ExtractMultipleExecutor;

#[async_trait]
impl Executor for ExtractMultipleExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ExtractMultipleElements
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(html) = ctx.input_str(names::HTML).map(str::to_string) else {
            ctx.log().error("Html not defined");
            return Ok(false);
        };
        let Some(raw_fields) = ctx.get_input(names::FIELDS).cloned() else {
            ctx.log().error("Fields not defined");
            return Ok(false);
        };
        let fields = match parse_fields(&raw_fields) {
            Some(fields) if !fields.is_empty() => fields,
            _ => {
                ctx.log().error("Fields is not an array or is empty");
                return Ok(false);
            }
        };

        match extract_fields(&html, &fields) {
            Ok(data) => {
                ctx.log().info(format!("Extracted {} fields", fields.len()));
                ctx.set_output(names::EXTRACTED_DATA, serde_json::to_string(&data)?);
                Ok(true)
            }
            Err(message) => {
                ctx.log().error(message);
                Ok(false)
            }
        }
    }
}
