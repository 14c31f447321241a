use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use iris_core::backend::ComputeTask;
use iris_execution::{RuntimeEventLayer, init_tracing};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "iris")]
#[command(about = "Iris - adaptive on-device inference runtime", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/iris/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the thermal and memory sensors once and print the runtime status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch thermal transitions until interrupted
    Watch,
    /// Show which compute backend would be selected for a task
    Route {
        #[arg(long, value_enum, default_value_t = TaskArg::Llm)]
        task: TaskArg,
    },
    /// Load a model and chat with it
    Chat {
        /// Model file, relative paths resolve against the models directory
        model: PathBuf,
        /// Send a single message and exit instead of reading stdin
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write the default configuration if no file exists
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum TaskArg {
    Llm,
    Embedding,
    Safety,
    Transcription,
}

impl From<TaskArg> for ComputeTask {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Llm => ComputeTask::LlmInference,
            TaskArg::Embedding => ComputeTask::Embedding,
            TaskArg::Safety => ComputeTask::SafetyCheck,
            TaskArg::Transcription => ComputeTask::Transcription,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::config::load(cli.config.clone())?;

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let events = matches!(cli.command, Commands::Watch).then(|| RuntimeEventLayer::new(events_tx));
    init_tracing(&config.logging, events)?;

    match cli.command {
        Commands::Status { json } => commands::status::show(&config, json).await?,
        Commands::Watch => commands::status::watch(&config, events_rx).await?,
        Commands::Route { task } => commands::route::show(&config, task.into()).await?,
        Commands::Chat {
            model,
            message,
            max_tokens,
            temperature,
        } => {
            let options = commands::chat::ChatOptions {
                model,
                message,
                max_tokens,
                temperature,
            };
            commands::chat::run(&config, options).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config)?,
            ConfigAction::Path => commands::config::path(cli.config)?,
            ConfigAction::Init => commands::config::init(cli.config)?,
        },
    }

    Ok(())
}
