use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrapecore::{
    names, ExecutionEvent, ExecutionStatus, FlowDefinition, GraphNode, TaskCatalog, TaskType,
};
use scrapenodes::{NodesConfig, WebDriverLauncher};
use scraperuntime::{ExecutorRegistry, RuntimeConfig, ScrapeRuntime, TriggerRequest};
use scrapestore::{MemoryStore, RunStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CLI_USER: &str = "cli";

#[derive(Parser)]
#[command(name = "scrape")]
#[command(about = "Browser automation workflow CLI", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the phases a workflow graph compiles to
    Plan {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// WebDriver server the browser tasks connect to
        #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:4444")]
        webdriver_url: String,

        /// Directory CSV exports are written to
        #[arg(long, env = "EXPORT_DIR", default_value = "public/exports")]
        export_dir: PathBuf,

        /// Keep run records in this SQLite database instead of memory
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// List available task types
    Tasks,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Plan { file } => plan_workflow(file)?,
        Commands::Run {
            file,
            webdriver_url,
            export_dir,
            database_url,
            headful,
        } => {
            let nodes = NodesConfig {
                webdriver_url,
                export_dir,
                headless: !headful,
                ..NodesConfig::default()
            };
            run_workflow(file, nodes, database_url).await?;
        }
        Commands::Tasks => list_tasks(),
        Commands::Init { output } => create_example_workflow(output)?,
    }

    Ok(())
}

fn load(file: &PathBuf) -> Result<String> {
    let definition =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    tracing::debug!(path = %file.display(), bytes = definition.len(), "Loaded workflow");
    Ok(definition)
}

fn plan_workflow(file: PathBuf) -> Result<()> {
    let definition = load(&file)?;
    let flow = FlowDefinition::parse(&definition)?;
    let catalog = TaskCatalog::standard();
    let plan = scraperuntime::plan(&catalog, &flow)?;

    println!("🔍 {} nodes in {} phases", plan.node_count(), plan.phases.len());
    for phase in &plan.phases {
        println!("  Phase {}:", phase.number);
        for node in &phase.nodes {
            println!(
                "    • {} ({}, {} credits)",
                node.id,
                node.task_type(),
                catalog.credits(node.task_type())
            );
        }
    }
    Ok(())
}

async fn run_workflow(file: PathBuf, nodes: NodesConfig, database_url: Option<String>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let definition = load(&file)?;

    let store: Arc<dyn RunStore> = match database_url {
        Some(url) => Arc::new(SqliteStore::connect(&url).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let launcher = Arc::new(WebDriverLauncher::from_config(&nodes));
    let mut registry = ExecutorRegistry::new();
    scrapenodes::register_all(&mut registry, launcher, &nodes);

    let runtime = ScrapeRuntime::new(
        Arc::new(TaskCatalog::standard()),
        Arc::new(registry),
        store,
        RuntimeConfig::default(),
    );

    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string());
    let workflow = runtime
        .create_workflow(CLI_USER, &name, definition.clone())
        .await?;

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::ExecutionStarted { phases, .. } => {
                    println!("▶️  Execution started ({} phases)", phases);
                }
                ExecutionEvent::PhaseStarted {
                    node_id, task_type, ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, task_type);
                }
                ExecutionEvent::PhaseCompleted {
                    node_id,
                    duration_ms,
                    credits,
                    ..
                } => {
                    println!(
                        "  ✅ Node {} completed in {}ms ({} credits)",
                        node_id, duration_ms, credits
                    );
                }
                ExecutionEvent::PhaseFailed { node_id, error, .. } => {
                    println!(
                        "  ❌ Node {} failed: {}",
                        node_id,
                        error.unwrap_or_else(|| "see phase logs".to_string())
                    );
                }
                ExecutionEvent::ExecutionFinished {
                    status, duration_ms, ..
                } => {
                    println!("🏁 Execution {} after {}ms", status, duration_ms);
                }
            }
        }
    });

    let outcome = runtime
        .trigger_and_wait(TriggerRequest {
            workflow_id: workflow.id,
            user_id: CLI_USER.to_string(),
            definition,
        })
        .await?;

    // Let the listener drain before printing the summary
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", outcome.execution_id);
    println!("   Status: {}", outcome.status);
    println!("   Phases run: {}", outcome.phases_run);
    println!("   Credits: {}", outcome.credits_consumed);

    let report = runtime.execution_report(outcome.execution_id).await?;
    for phase in &report.phases {
        let details = runtime.phase_details(phase.id).await?;
        println!();
        println!("   {} [{}] {}", phase.name, phase.status, details.node_id.unwrap_or_default());
        if let Some(outputs) = details.outputs {
            println!("     outputs: {}", outputs);
        }
        for entry in details.logs {
            println!("     {} {}", entry.level, entry.message);
        }
    }

    if outcome.status != ExecutionStatus::Completed {
        anyhow::bail!("execution {} did not complete", outcome.execution_id);
    }
    Ok(())
}

fn list_tasks() {
    println!("📦 Available Task Types:");
    println!();

    let catalog = TaskCatalog::standard();
    for definition in catalog.definitions() {
        let entry = if definition.is_entry_point { ", entry point" } else { "" };
        println!(
            "  • {} - {} ({} credits{})",
            definition.task_type, definition.label, definition.credits, entry
        );
        for input in &definition.inputs {
            let required = if input.required { "required" } else { "optional" };
            println!("      in:  {} ({})", input.name, required);
        }
        for output in &definition.outputs {
            println!("      out: {}", output.name);
        }
    }
}

/// Launch, read the page, extract the heading and close the browser.
fn example_workflow() -> FlowDefinition {
    let mut flow = FlowDefinition::default();
    flow.add_node(
        GraphNode::new("launch", TaskType::LaunchBrowser)
            .with_input(names::WEBSITE_URL, "https://example.com"),
    );
    flow.add_node(GraphNode::new("html", TaskType::PageToHtml));
    flow.add_node(
        GraphNode::new("heading", TaskType::ExtractTextFromElement)
            .with_input(names::SELECTOR, "h1"),
    );
    flow.add_node(GraphNode::new("close", TaskType::CloseBrowser));
    flow.connect("launch", names::WEB_PAGE, "html", names::WEB_PAGE);
    flow.connect("html", names::HTML, "heading", names::HTML);
    flow.connect("html", names::WEB_PAGE, "close", names::WEB_PAGE);
    flow
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&example_workflow())?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  scrape run --file {}", output.display());

    Ok(())
}
