use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by the standard executors.
#[derive(Debug, Clone)]
pub struct NodesConfig {
    /// Directory CSV exports are written to.
    pub export_dir: PathBuf,
    /// URL prefix under which `export_dir` is served.
    pub download_prefix: String,
    /// How long pagination waits for its selector on each page.
    pub page_wait_timeout: Duration,
    /// Pause between two pagination requests.
    pub page_delay: Duration,
    /// Hard limit for custom JavaScript.
    pub script_timeout: Duration,
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("public/exports"),
            download_prefix: "/exports".to_string(),
            page_wait_timeout: Duration::from_secs(10),
            page_delay: Duration::from_millis(200),
            script_timeout: Duration::from_secs(30),
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
        }
    }
}

impl NodesConfig {
    /// Defaults overridden by `WEBDRIVER_URL`, `EXPORT_DIR` and `HEADLESS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            config.webdriver_url = url;
        }
        if let Ok(dir) = std::env::var("EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }
        if let Ok(headless) = std::env::var("HEADLESS") {
            config.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }
        config
    }
}
