use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use warden::internal::{
    exec::runner::Runner,
    plan::ir::Plan,
    policy::policy::RuleSet,
    skills,
    trace::trace::PlanStatus,
};

#[derive(Parser)]
#[command(name = "wardenctl")]
#[command(about = "Plan execution boundary CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan file and print its trace artifact
    Run {
        /// Path to the plan file (JSON)
        #[arg(short, long)]
        plan_file: String,

        /// Path to a policy rule file (JSON); defaults to the built-in rules
        #[arg(long)]
        policy_file: Option<String>,

        /// Workspace root for file skills
        #[arg(short, long, default_value = "workspace")]
        workspace: PathBuf,

        /// Write the trace artifact to this file as well
        #[arg(short, long)]
        out: Option<String>,
    },
    /// List registered skills and their parameter schemas
    Skills,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            plan_file,
            policy_file,
            workspace,
            out,
        } => run_plan(plan_file, policy_file.as_deref(), workspace, out.as_deref()).await,
        Commands::Skills => list_skills(),
    }
}

async fn run_plan(
    plan_file: &str,
    policy_file: Option<&str>,
    workspace: &Path,
    out: Option<&str>,
) -> anyhow::Result<()> {
    let plan_content =
        fs::read_to_string(plan_file).with_context(|| format!("reading plan {}", plan_file))?;
    let plan: Plan =
        serde_json::from_str(&plan_content).with_context(|| format!("parsing plan {}", plan_file))?;

    let rules = match policy_file {
        Some(path) => {
            RuleSet::load(Path::new(path)).with_context(|| format!("loading policy {}", path))?
        }
        None => RuleSet::load_from_env().context("loading policy from WARDEN_POLICY_PATH")?,
    };

    fs::create_dir_all(workspace)?;
    let registry = skills::builtin_registry(workspace);

    let runner = Runner::new(&registry, &rules);
    let artifact = runner.run(&plan).await?;

    let rendered = serde_json::to_string_pretty(&artifact)?;
    println!("{}", rendered);
    if let Some(out_path) = out {
        fs::write(out_path, &rendered).with_context(|| format!("writing {}", out_path))?;
    }

    if artifact.status == PlanStatus::Aborted {
        std::process::exit(1);
    }
    Ok(())
}

fn list_skills() -> anyhow::Result<()> {
    let registry = skills::builtin_registry(Path::new("workspace"));
    for name in registry.names() {
        if let Some(schema) = registry.schema_for(&name) {
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
    }
    Ok(())
}
