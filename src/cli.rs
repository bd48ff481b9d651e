//! CLI module
//!
//! This module provides the command-line interface for the milestone tool.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;

use crate::{
    api::{serve, ServerConfig},
    generator::{self, GeneratorConfig, DEFAULT_BASE_URL, DEFAULT_MODEL},
    models::{parse_coord, Plan},
    parser::{fallback_plan, PlanOutcome, PlanSource},
    prompts::PlanFormat,
    service::{validate_goal, GenerateRequest},
    store::{JsonFileStore, MemoryStore, PlanKey, PlanStore},
    Core,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    generator: GeneratorArgs,

    /// Directory plans are stored in; plans are kept in memory when unset
    #[arg(long, env = "MILESTONE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Args)]
struct GeneratorArgs {
    /// API key for the chat completions endpoint
    #[arg(long, env = "MILESTONE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "MILESTONE_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Model to request plans from
    #[arg(long, env = "MILESTONE_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Format the generator is asked to answer in
    #[arg(long, value_enum, default_value_t = PlanFormat::Markdown, global = true)]
    format: PlanFormat,
}

impl GeneratorArgs {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the milestone API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },

    /// Structure a plan from raw text (a file, or stdin with "-")
    Parse {
        /// File holding the generator output
        input: PathBuf,

        /// Goal the plan is for
        #[arg(short, long)]
        goal: String,

        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Print the template plan for a goal
    Fallback {
        goal: String,

        #[arg(long)]
        json: bool,
    },

    /// Generate a plan for a goal
    Generate {
        goal: String,

        /// User the plan is stored for
        #[arg(short, long, default_value = "local")]
        user: String,

        #[arg(long)]
        json: bool,
    },

    /// List stored plans
    Plans {
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Show a stored plan
    Show {
        goal: String,

        #[arg(short, long, default_value = "local")]
        user: String,

        #[arg(long)]
        json: bool,
    },

    /// Toggle a task in a stored plan
    Toggle {
        goal: String,

        /// Task coordinate: month,week,day,task as positions or ids (e.g. 0,1,2,0)
        coord: String,

        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { port } => {
            let core = build_core(&cli);
            let config = ServerConfig {
                address: ([127, 0, 0, 1], *port).into(),
            };

            println!("Starting milestone API server on port {}...", port);
            serve(core, config).await?;
            Ok(())
        }

        Commands::Parse { input, goal, json } => {
            let raw = read_input(input)?;
            let outcome = build_core(&cli).parse(&raw, goal)?;
            print_outcome(&outcome, *json)
        }

        Commands::Fallback { goal, json } => {
            let goal = validate_goal(goal)?;
            let plan = fallback_plan(goal);
            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
            Ok(())
        }

        Commands::Generate { goal, user, json } => {
            let core = build_core(&cli);
            let outcome = core
                .generate_plan(
                    user,
                    GenerateRequest {
                        goal: goal.clone(),
                        format: Some(cli.generator.format),
                    },
                )
                .await?;
            print_outcome(&outcome, *json)
        }

        Commands::Plans { user } => {
            let keys = build_core(&cli).list_plans(user).await?;
            if keys.is_empty() {
                println!("No plans stored for '{}'", user);
            }
            for key in keys {
                println!("{}", key.goal.as_deref().unwrap_or("(current plan)"));
            }
            Ok(())
        }

        Commands::Show { goal, user, json } => {
            let key = PlanKey::for_goal(user.as_str(), goal.as_str());
            let plan = build_core(&cli).get_plan(&key).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
            Ok(())
        }

        Commands::Toggle { goal, coord, user } => {
            let coord = parse_coord(coord)?;
            let key = PlanKey::for_goal(user.as_str(), goal.as_str());
            let plan = build_core(&cli).toggle_task(&key, &coord).await?;

            if let Some(task) = plan.task(&coord) {
                let state = if task.completed { "completed" } else { "not completed" };
                println!("\"{}\" is now {}", task.title, state);
            }
            print_progress(&plan);
            Ok(())
        }

        Commands::Completions { shell } => {
            // Generate completions for the specified shell
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn build_core(cli: &Cli) -> Core {
    let store: Arc<dyn PlanStore> = match &cli.data_dir {
        Some(dir) => Arc::new(JsonFileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };
    let generator = generator::from_config(cli.generator.config());
    Core::new(generator, store).with_format(cli.generator.format)
}

fn read_input(input: &Path) -> io::Result<String> {
    if input.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        Ok(raw)
    } else {
        std::fs::read_to_string(input)
    }
}

fn print_outcome(outcome: &PlanOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let source = match outcome.source {
        PlanSource::Json => "structured JSON",
        PlanSource::Repaired => "repaired partial JSON",
        PlanSource::Markdown => "Markdown",
        PlanSource::Fallback => "template",
    };
    println!("{}", format!("Plan built from {}", source).dimmed());
    if let Some(notice) = &outcome.notice {
        println!("{}", notice.yellow());
    }
    println!();
    print_plan(&outcome.plan);
    Ok(())
}

/// Prints a plan as an indented tree with completion markers
fn print_plan(plan: &Plan) {
    println!("{} {}", "Goal:".bold(), plan.goal);
    for month in &plan.months {
        println!("  {}", month.title.bold());
        for week in &month.weeks {
            println!("    {}", week.title.cyan());
            for day in &week.days {
                println!("      {}", day.title);
                for task in &day.tasks {
                    let marker = if task.completed {
                        "[✓]".green()
                    } else {
                        "[ ]".normal()
                    };
                    println!("        {} {}", marker, task.title);
                }
            }
        }
    }
    println!();
    print_progress(plan);
}

fn print_progress(plan: &Plan) {
    let progress = plan.progress();
    println!(
        "Progress: {}/{} tasks ({}%)",
        progress.completed, progress.total, progress.percent
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_toggle_command() {
        let cli = Cli::try_parse_from([
            "milestone",
            "toggle",
            "Learn Rust",
            "0,1,2,0",
            "--user",
            "ana",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.generator.format, PlanFormat::Json);
        match cli.command {
            Commands::Toggle { goal, coord, user } => {
                assert_eq!(goal, "Learn Rust");
                assert_eq!(coord, "0,1,2,0");
                assert_eq!(user, "ana");
            }
            _ => panic!("expected toggle command"),
        }
    }
}
