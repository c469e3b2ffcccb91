use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use taskweave_rs::adk::model::openai::OpenAIModel;
use taskweave_rs::weave::config::{self, Settings};
use taskweave_rs::weave::context::ConversationContext;
use taskweave_rs::weave::coordinator::Coordinator;
use taskweave_rs::weave::engine::{ExecutionEngine, ExecutionResult, ResumeOptions};
use taskweave_rs::weave::graph::DependencyGraph;
use taskweave_rs::weave::planner::ModelPlanner;
use taskweave_rs::weave::registry::ToolRegistry;
use taskweave_rs::weave::storage::{JsonFileStorage, Storage};
use taskweave_rs::weave::tools::command;

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the execution levels of a plan file
    Levels {
        /// YAML or JSON file with `sub_tasks`
        #[arg(short, long)]
        file: PathBuf,

        /// Append informational sub-tasks as a final level
        #[arg(long)]
        with_informational: bool,
    },
    /// Decompose a request and print the graph without running it
    Plan {
        #[arg(short, long)]
        query: String,
    },
    /// Decompose and execute a request
    Run {
        #[arg(short, long)]
        query: String,

        /// Name to address the user by
        #[arg(long)]
        user_name: Option<String>,
    },
    /// Continue a paused run with the user's answer
    Resume {
        #[arg(short, long)]
        run_id: String,

        #[arg(short, long)]
        input: String,

        /// Start the paused sub-task over with the input as its task
        #[arg(long)]
        reset: bool,

        /// Skip the new-discussion check
        #[arg(long)]
        no_classify: bool,
    },
    /// Show a stored run, or list stored runs
    Show {
        #[arg(short, long)]
        run_id: Option<String>,
    },
    /// Delete a stored run
    Discard {
        #[arg(short, long)]
        run_id: String,
    },
}

fn print_levels(graph: &DependencyGraph, with_informational: bool) {
    for (level, indices) in graph.compute_levels(with_informational).iter().enumerate() {
        println!("Level {}:", level);
        for index in indices {
            if let Ok(node) = graph.node(*index) {
                println!(
                    "  [{}] {} ({})",
                    node.index,
                    node.task(),
                    node.tool_name.as_deref().unwrap_or("no tool")
                );
            }
        }
    }
}

fn print_result(result: &ExecutionResult) -> anyhow::Result<()> {
    println!("Run {}: {}", result.run_id, result.status);
    println!("{}", result.message);
    if let Some(text) = result.attention_text() {
        println!("> {}", text);
    }
    if let Some(reply) = &result.final_response {
        println!("> {}", reply);
    }
    if let Some(pause) = &result.paused {
        println!("Paused at level {} on sub-task {}", pause.level, pause.node);
    }
    log::debug!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

async fn build_coordinator(settings: &Settings) -> anyhow::Result<Coordinator> {
    let model = OpenAIModel::from_env(
        &settings.planner.model,
        &settings.planner.api_key_env,
        settings.planner.base_url.as_deref(),
    )
    .context("cannot configure the planner model")?;
    log::info!("Using model: {}", model.model_name());

    let planner = ModelPlanner::new(Arc::new(model))
        .with_temperature(settings.planner.temperature)
        .with_max_tokens(settings.planner.max_tokens)
        .with_retry(settings.planner.retry);

    let registry = ToolRegistry::new();
    registry
        .register_all(command::create_tools(&settings.tools))
        .await;
    log::info!("Registered tools: {:?}", registry.names().await);

    let engine =
        ExecutionEngine::with_registry(Arc::new(planner), registry, settings.engine.clone());
    Ok(Coordinator::new(engine, open_storage(settings)))
}

/// Run store shared by the coordinator and the offline `show`/`discard` commands
fn open_storage(settings: &Settings) -> Arc<dyn Storage> {
    Arc::new(JsonFileStorage::new(&settings.storage.dir))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::load_or_default(args.config.as_deref())?;

    match args.command {
        Commands::Levels {
            file,
            with_informational,
        } => {
            let plan = config::load_plan(&file)
                .with_context(|| format!("cannot read plan {}", file.display()))?;
            let graph = DependencyGraph::build(&plan.sub_tasks)?;
            print_levels(&graph, with_informational);
        }
        Commands::Plan { query } => {
            let coordinator = build_coordinator(&settings).await?;
            let graph = coordinator.plan(&query).await?;
            print_levels(&graph, true);
        }
        Commands::Run { query, user_name } => {
            let coordinator = build_coordinator(&settings).await?;
            let mut context = ConversationContext::new();
            if let Some(name) = user_name {
                context.user_profile.insert("name".to_string(), name);
            }
            let result = coordinator.run(&query, context).await?;
            print_result(&result)?;
        }
        Commands::Resume {
            run_id,
            input,
            reset,
            no_classify,
        } => {
            let coordinator = build_coordinator(&settings).await?;
            let mut options = ResumeOptions {
                reset_node: reset,
                ..ResumeOptions::default()
            };
            if no_classify {
                options = options.without_classification();
            }
            let result = coordinator.resume(&run_id, &input, options).await?;
            print_result(&result)?;
        }
        Commands::Show { run_id } => {
            let storage = open_storage(&settings);
            match run_id {
                Some(run_id) => {
                    let snapshot = storage.load(&run_id).await?;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                None => {
                    for run_id in storage.list().await? {
                        println!("{}", run_id);
                    }
                }
            }
        }
        Commands::Discard { run_id } => {
            let storage = open_storage(&settings);
            storage.delete(&run_id).await?;
            println!("Discarded run {}", run_id);
        }
    }

    Ok(())
}
