use crate::NodesConfig;
use async_trait::async_trait;
use scrapecore::{names, ExecutionContext, Executor, ExecutorError, TaskType, TaskValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Runs inside the page after `const inputData = ...;`, with the user code
/// between the two halves. The promise always resolves to a
/// `ScriptOutcome`.
const SCRIPT_HEAD: &str = r#"
const __logs = [];
let __result = null;
let __resultSet = false;
const log = {
  info: (message) => __logs.push({ level: "info", message: "[User Code] " + message }),
  error: (message) => __logs.push({ level: "error", message: "[User Code] " + message }),
};
const console = {
  log: (message) => __logs.push({ level: "info", message: "[Console] " + JSON.stringify(message) }),
  error: (message) => __logs.push({ level: "error", message: "[Console] " + JSON.stringify(message) }),
};
const wait = (ms) => new Promise((resolve) => setTimeout(resolve, Math.min(ms, 30000)));
const setResult = (value) => {
  __result = typeof value === "string" ? value : JSON.stringify(value);
  __resultSet = true;
};
return (async function userScript() {
  try {
"#;

const SCRIPT_TAIL: &str = r#"
  } catch (error) {
    log.error("Error in user code: " + error.message);
    throw error;
  }
})().then(
  (returned) => ({
    ok: true,
    returned: returned === undefined ? null : returned,
    result: __result,
    resultSet: __resultSet,
    logs: __logs,
  }),
  (error) => ({
    ok: false,
    error: String((error && error.message) || error),
    logs: __logs,
  }),
);
"#;

#[derive(Debug, Deserialize)]
struct ScriptLog {
    level: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptOutcome {
    ok: bool,
    #[serde(default)]
    returned: Value,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    result_set: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    logs: Vec<ScriptLog>,
}

fn wrap(code: &str, input: Option<String>) -> String {
    let input = serde_json::to_string(&input).unwrap_or_else(|_| "null".to_string());
    format!(
        "const inputData = {};{}{}{}",
        input, SCRIPT_HEAD, code, SCRIPT_TAIL
    )
}

/// Run user supplied JavaScript inside the current page
pub struct CustomJavascriptExecutor {
    timeout: Duration,
}

impl CustomJavascriptExecutor {
    pub fn new(config: &NodesConfig) -> Self {
        Self {
            timeout: config.script_timeout,
        }
    }
}

#[async_trait]
impl Executor for CustomJavascriptExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::CustomJavascript
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(code) = ctx.input_str(names::JAVASCRIPT_CODE).map(str::to_string) else {
            ctx.log().error("JavaScript Code not provided");
            return Ok(false);
        };
        let Some(page) = ctx.page() else {
            ctx.log().error("No browser page available");
            return Ok(false);
        };
        let input = ctx.get_input(names::INPUT_DATA).map(TaskValue::as_text);

        ctx.log().info("Starting JavaScript code execution");
        let script = wrap(&code, input);
        let value = match tokio::time::timeout(self.timeout, page.evaluate(&script)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                ctx.log().error(format!("JavaScript execution failed: {}", e));
                return Ok(false);
            }
            Err(_) => {
                ctx.log().error(format!(
                    "Code execution timed out after {} seconds",
                    self.timeout.as_secs()
                ));
                return Ok(false);
            }
        };

        let outcome: ScriptOutcome = serde_json::from_value(value)?;
        for entry in &outcome.logs {
            match entry.level.as_str() {
                "error" => ctx.log().error(entry.message.clone()),
                _ => ctx.log().info(entry.message.clone()),
            }
        }
        if !outcome.ok {
            let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            ctx.log().error(format!("JavaScript execution failed: {}", reason));
            return Ok(false);
        }

        ctx.log().info("JavaScript code executed successfully");
        if outcome.result_set {
            ctx.set_output(names::RESULT, outcome.result.unwrap_or_default());
        } else if !outcome.returned.is_null() {
            ctx.set_output(names::RESULT, outcome.returned.to_string());
        }
        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        Ok(true)
    }
}
