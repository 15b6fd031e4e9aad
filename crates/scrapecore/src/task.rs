use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a task type as it appears in the serialized graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    LaunchBrowser,
    CloseBrowser,
    PageToHtml,
    ExtractTextFromElement,
    ExtractMultipleElements,
    FillInput,
    NavigateUrl,
    Pagination,
    CsvExport,
    CustomJavascript,
}

impl TaskType {
    pub const ALL: [TaskType; 10] = [
        TaskType::LaunchBrowser,
        TaskType::CloseBrowser,
        TaskType::PageToHtml,
        TaskType::ExtractTextFromElement,
        TaskType::ExtractMultipleElements,
        TaskType::FillInput,
        TaskType::NavigateUrl,
        TaskType::Pagination,
        TaskType::CsvExport,
        TaskType::CustomJavascript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::LaunchBrowser => "LAUNCH_BROWSER",
            TaskType::CloseBrowser => "CLOSE_BROWSER",
            TaskType::PageToHtml => "PAGE_TO_HTML",
            TaskType::ExtractTextFromElement => "EXTRACT_TEXT_FROM_ELEMENT",
            TaskType::ExtractMultipleElements => "EXTRACT_MULTIPLE_ELEMENTS",
            TaskType::FillInput => "FILL_INPUT",
            TaskType::NavigateUrl => "NAVIGATE_URL",
            TaskType::Pagination => "PAGINATION",
            TaskType::CsvExport => "CSV_EXPORT",
            TaskType::CustomJavascript => "CUSTOM_JAVASCRIPT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamKind {
    String,
    BrowserInstance,
    Array,
    Object,
}

/// A named, typed input or output port of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParam {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,
}

impl TaskParam {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            helper_text: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_helper(mut self, text: impl Into<String>) -> Self {
        self.helper_text = Some(text.into());
        self
    }

    pub fn is_browser(&self) -> bool {
        self.kind == ParamKind::BrowserInstance
    }
}

/// Catalog entry for one task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_type: TaskType,
    pub label: String,
    pub is_entry_point: bool,
    pub credits: u32,
    pub inputs: Vec<TaskParam>,
    pub outputs: Vec<TaskParam>,
}

impl TaskDefinition {
    pub fn new(task_type: TaskType, label: impl Into<String>, credits: u32) -> Self {
        Self {
            task_type,
            label: label.into(),
            is_entry_point: false,
            credits,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn entry_point(mut self) -> Self {
        self.is_entry_point = true;
        self
    }

    pub fn with_input(mut self, param: TaskParam) -> Self {
        self.inputs.push(param);
        self
    }

    pub fn with_output(mut self, param: TaskParam) -> Self {
        self.outputs.push(param);
        self
    }

    pub fn input(&self, name: &str) -> Option<&TaskParam> {
        self.inputs.iter().find(|p| p.name == name)
    }
}

/// Immutable registry of task definitions, built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    definitions: HashMap<TaskType, TaskDefinition>,
}

impl TaskCatalog {
    pub fn from_definitions(definitions: impl IntoIterator<Item = TaskDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|d| (d.task_type, d))
                .collect(),
        }
    }

    pub fn get(&self, task_type: TaskType) -> Option<&TaskDefinition> {
        self.definitions.get(&task_type)
    }

    pub fn is_entry_point(&self, task_type: TaskType) -> bool {
        self.get(task_type).is_some_and(|d| d.is_entry_point)
    }

    pub fn credits(&self, task_type: TaskType) -> u32 {
        self.get(task_type).map(|d| d.credits).unwrap_or(0)
    }

    /// Definitions in `TaskType::ALL` order.
    pub fn definitions(&self) -> Vec<&TaskDefinition> {
        TaskType::ALL
            .iter()
            .filter_map(|t| self.definitions.get(t))
            .collect()
    }

    /// The browser-automation task set.
    pub fn standard() -> Self {
        use ParamKind::{Array, BrowserInstance, String as Text};

        let web_page = || TaskParam::new(names::WEB_PAGE, BrowserInstance);

        Self::from_definitions([
            TaskDefinition::new(TaskType::LaunchBrowser, "Launch browser", 5)
                .entry_point()
                .with_input(
                    TaskParam::new(names::WEBSITE_URL, Text)
                        .required()
                        .with_helper("eg: https://www.google.com"),
                )
                .with_output(web_page()),
            TaskDefinition::new(TaskType::NavigateUrl, "Navigate Url", 2)
                .with_input(web_page().required())
                .with_input(TaskParam::new(names::URL, Text).required())
                .with_output(web_page()),
            TaskDefinition::new(TaskType::PageToHtml, "Get html from page", 2)
                .with_input(web_page().required())
                .with_output(TaskParam::new(names::HTML, Text))
                .with_output(web_page()),
            TaskDefinition::new(TaskType::FillInput, "Fill input", 1)
                .with_input(web_page().required())
                .with_input(TaskParam::new(names::SELECTOR, Text).required())
                .with_input(TaskParam::new(names::VALUE, Text).required())
                .with_output(web_page()),
            TaskDefinition::new(TaskType::ExtractTextFromElement, "Get text from HTML", 2)
                .with_input(TaskParam::new(names::HTML, Text).required())
                .with_input(TaskParam::new(names::SELECTOR, Text).required())
                .with_output(TaskParam::new(names::EXTRACTED_TEXT, Text)),
            TaskDefinition::new(
                TaskType::ExtractMultipleElements,
                "Extract multiple elements from HTML",
                3,
            )
            .with_input(TaskParam::new(names::HTML, Text).required())
            .with_input(
                TaskParam::new(names::FIELDS, Array)
                    .required()
                    .with_helper("Define multiple elements to extract"),
            )
            .with_output(TaskParam::new(names::EXTRACTED_DATA, Text)),
            TaskDefinition::new(TaskType::Pagination, "Pagination Scraper", 5)
                .with_input(web_page().required())
                .with_input(
                    TaskParam::new(names::BASE_URL, Text)
                        .required()
                        .with_helper("The base URL for pagination (e.g., https://example.com/posts)"),
                )
                .with_input(
                    TaskParam::new(names::PAGINATION_SIGN, Text)
                        .required()
                        .with_default("?page=")
                        .with_helper("Pagination parameter (e.g., ?page=, &p=, #page=)"),
                )
                .with_input(
                    TaskParam::new(names::START_PAGE, Text)
                        .required()
                        .with_default("1"),
                )
                .with_input(
                    TaskParam::new(names::END_PAGE, Text)
                        .required()
                        .with_default("5"),
                )
                .with_input(
                    TaskParam::new(names::ELEMENT_SELECTOR, Text)
                        .required()
                        .with_helper("CSS selector for elements to extract from each page"),
                )
                .with_input(
                    TaskParam::new(names::ATTRIBUTE, Text)
                        .required()
                        .with_default("href")
                        .with_helper("Attribute to extract (e.g., href, textContent, src)"),
                )
                .with_output(TaskParam::new(names::SCRAPED_DATA, Text))
                .with_output(web_page()),
            TaskDefinition::new(TaskType::CsvExport, "Export to CSV", 1)
                .with_input(
                    TaskParam::new(names::DATA_SOURCE, Text)
                        .required()
                        .with_helper("JSON data from previous node to export as CSV"),
                )
                .with_input(TaskParam::new(names::FILE_NAME, Text).with_default(""))
                .with_output(TaskParam::new(names::DOWNLOAD_URL, Text))
                .with_output(TaskParam::new(names::ROW_COUNT, Text)),
            TaskDefinition::new(TaskType::CustomJavascript, "Custom JavaScript", 3)
                .with_input(
                    TaskParam::new(names::JAVASCRIPT_CODE, Text)
                        .required()
                        .with_helper("Use 'setResult(value)' to output data."),
                )
                .with_input(web_page())
                .with_input(
                    TaskParam::new(names::INPUT_DATA, Text)
                        .with_helper("Accessible as 'inputData' inside the script"),
                )
                .with_output(TaskParam::new(names::RESULT, Text))
                .with_output(web_page()),
            TaskDefinition::new(TaskType::CloseBrowser, "Close Browser", 1)
                .with_input(web_page().required())
                .with_output(TaskParam::new(names::CLOSURE_STATUS, Text)),
        ])
    }
}

/// Port names used by the standard catalog.
pub mod names {
    pub const WEB_PAGE: &str = "Web Page";
    pub const WEBSITE_URL: &str = "Website Url";
    pub const URL: &str = "URL";
    pub const HTML: &str = "Html";
    pub const SELECTOR: &str = "Selector";
    pub const VALUE: &str = "Value";
    pub const EXTRACTED_TEXT: &str = "Extracted Text";
    pub const FIELDS: &str = "Fields";
    pub const EXTRACTED_DATA: &str = "Extracted Data";
    pub const BASE_URL: &str = "Base URL";
    pub const PAGINATION_SIGN: &str = "Pagination Sign";
    pub const START_PAGE: &str = "Start Page";
    pub const END_PAGE: &str = "End Page";
    pub const ELEMENT_SELECTOR: &str = "Element Selector";
    pub const ATTRIBUTE: &str = "Attribute to Extract";
    pub const SCRAPED_DATA: &str = "Scraped Data";
    pub const DATA_SOURCE: &str = "Data Source";
    pub const FILE_NAME: &str = "File Name";
    pub const DOWNLOAD_URL: &str = "Download URL";
    pub const ROW_COUNT: &str = "Row Count";
    pub const JAVASCRIPT_CODE: &str = "JavaScript Code";
    pub const INPUT_DATA: &str = "Input Data";
    pub const RESULT: &str = "Result";
    pub const CLOSURE_STATUS: &str = "Closure Status";
}
