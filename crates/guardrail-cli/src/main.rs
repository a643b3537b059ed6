use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use guardrail_core::{find_config_path, CheckCategory, CheckStatus, Config, ReviewReport};
use guardrail_dbt::{Manifest, ModelGraph};
use guardrail_engine::{results_path, ContextBuilder, ModelContext, ReplayExecutor, ReviewPlan, ReviewRunner};

/// Guardrail - data validation for changed dbt models
#[derive(Parser)]
#[command(name = "guardrail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: $GUARDRAIL_CONFIG, ~/.config/guardrail/guardrail.toml, ./guardrail.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// dbt project directory (overrides dbt_project_dir from config)
    #[arg(short, long, global = true)]
    project_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show manifest statistics and the models behind changed files
    Status {
        /// Changed file paths, relative to the dbt project root
        #[arg(long, value_delimiter = ',')]
        changed: Vec<String>,
    },

    /// Show models downstream of a model
    Impact {
        /// Model to analyze (short name or unique_id)
        model: String,

        /// Maximum traversal depth (default: max_depth from config)
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Print the checks a review would run, as JSON
    Checks {
        /// Model names to check
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,

        /// Changed file paths; their models are checked
        #[arg(long, value_delimiter = ',')]
        changed: Vec<String>,

        /// Check categories (grain, distribution, join, rowcount)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<CheckCategory>,
    },

    /// Show upstream, downstream and prior results for models
    Context {
        /// Model names
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,

        /// Changed file paths; files missing from the manifest are treated as new models
        #[arg(long, value_delimiter = ',')]
        changed: Vec<String>,

        /// Print the context as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run checks and evaluate the results
    Review {
        /// Model names to review
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,

        /// Changed file paths; their models are reviewed
        #[arg(long, value_delimiter = ',')]
        changed: Vec<String>,

        /// Check categories (grain, distribution, join, rowcount)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<CheckCategory>,

        /// Generate checks but execute nothing
        #[arg(long, conflicts_with = "results")]
        dry_run: bool,

        /// JSON file of recorded query results to evaluate
        #[arg(long)]
        results: Option<PathBuf>,

        /// Output file for the report (default: <project>/.guardrail/results.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().or_else(find_config_path);
    let config = Config::load(config_path.as_deref())?;

    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| project_dir_from_config(&config));

    if cli.verbose {
        eprintln!("{} {}", "dbt project:".cyan(), project_dir.display());
    }

    match cli.command {
        Commands::Status { changed } => status_command(&config, &project_dir, &changed),
        Commands::Impact { model, max_depth } => {
            impact_command(&project_dir, &model, max_depth.unwrap_or(config.max_depth))
        }
        Commands::Checks { models, changed, categories } => {
            checks_command(&config, &project_dir, &models, &changed, &categories)
        }
        Commands::Context { models, changed, json } => {
            context_command(&config, &project_dir, &models, &changed, json)
        }
        Commands::Review { models, changed, categories, dry_run, results, output } => {
            let output = output.unwrap_or_else(|| results_path(&project_dir));
            let selection = Selection { models, changed, categories };
            review_command(&config, &project_dir, &selection, dry_run, results.as_deref(), &output)
        }
    }
}

/// Log to stderr; RUST_LOG overrides the verbosity flag
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "guardrail=debug" } else { "guardrail=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn project_dir_from_config(config: &Config) -> PathBuf {
    if config.dbt_project_dir.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(&config.dbt_project_dir)
    }
}

fn load_graph(project_dir: &Path) -> Result<(Manifest, ModelGraph)> {
    let manifest = Manifest::load_from_project(project_dir)?;
    let graph = ModelGraph::from_manifest(&manifest);
    Ok((manifest, graph))
}

/// Models and categories picked on the command line
struct Selection {
    models: Vec<String>,
    changed: Vec<String>,
    categories: Vec<CheckCategory>,
}

impl Selection {
    fn plan(&self, config: &Config, graph: &ModelGraph) -> Result<ReviewPlan> {
        let categories = (!self.categories.is_empty()).then_some(self.categories.as_slice());

        if !self.models.is_empty() {
            Ok(ReviewPlan::new(graph, config, &self.models, categories))
        } else if !self.changed.is_empty() {
            Ok(ReviewPlan::from_changed_files(graph, config, &self.changed, categories))
        } else {
            Err(anyhow::anyhow!("Nothing to check. Pass --models or --changed."))
        }
    }
}

/// Status command - manifest statistics and changed-file resolution
fn status_command(config: &Config, project_dir: &Path, changed: &[String]) -> Result<()> {
    let (manifest, graph) = load_graph(project_dir)?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Guardrail Status".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Project:".bold(), project_dir.display());
    if !manifest.metadata.dbt_version.is_empty() {
        println!("{} {}", "dbt version:".bold(), manifest.metadata.dbt_version);
    }
    println!("{} {}", "Base branch:".bold(), config.base_branch);
    println!("{} {}", "Models:".bold(), manifest.model_count());
    println!("{} {}", "Tests:".bold(), manifest.test_count());

    if !changed.is_empty() {
        let (ids, unresolved) = graph.resolve_changed_files(changed);

        println!();
        println!("{}", "Changed models:".bold());
        if ids.is_empty() {
            println!("  {}", "none".dimmed());
        }
        for id in &ids {
            let name = graph.get_model(id).map(|m| m.name.as_str()).unwrap_or(id.as_str());
            println!("  {} {}", "•".cyan(), name.green());
        }

        if !unresolved.is_empty() {
            println!();
            println!("{}", "Not in manifest (new files, or run `dbt compile`):".bold());
            for path in &unresolved {
                println!("  {} {}", "•".yellow(), path);
            }
        }

        let blast = graph.blast_radius_names(&ids, config.max_depth);
        println!();
        println!("{} {}", "Blast radius:".bold(), blast.len());
        for name in &blast {
            println!("  {} {}", "→".yellow(), name);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Impact command - show downstream models
fn impact_command(project_dir: &Path, model: &str, max_depth: usize) -> Result<()> {
    let (_, graph) = load_graph(project_dir)?;

    // Accept either a unique_id or a short name
    let target = graph
        .get_model(model)
        .or_else(|| graph.get_model_by_name(model))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Model '{}' not found in manifest. Try using the full unique_id (e.g., 'model.project.{}')",
                model,
                model
            )
        })?;

    let downstream = graph.blast_radius(&[target.unique_id.as_str()], max_depth);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Downstream Impact Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Model:".bold(), target.unique_id.green());
    println!("{} {}", "Downstream models:".bold(), downstream.len());
    println!();

    if downstream.is_empty() {
        println!("{}", "✓ No downstream models".green());
    } else {
        for (i, id) in downstream.iter().enumerate() {
            let info = graph
                .get_model(id)
                .map(|m| format!("{} ({})", m.name, m.materialized))
                .unwrap_or_else(|| id.clone());
            println!("  {}. {}", i + 1, info.yellow());
        }

        println!();
        println!("{}", "⚠ Review these models when changing this one".yellow().bold());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Checks command - emit generated checks as JSON
fn checks_command(
    config: &Config,
    project_dir: &Path,
    models: &[String],
    changed: &[String],
    categories: &[CheckCategory],
) -> Result<()> {
    let (_, graph) = load_graph(project_dir)?;
    let selection = Selection {
        models: models.to_vec(),
        changed: changed.to_vec(),
        categories: categories.to_vec(),
    };
    let plan = selection.plan(config, &graph)?;

    println!("{}", serde_json::to_string_pretty(&plan.checks)?);
    Ok(())
}

/// Context command - neighbours and prior results of models under review
fn context_command(
    config: &Config,
    project_dir: &Path,
    models: &[String],
    changed: &[String],
    json: bool,
) -> Result<()> {
    let (_, graph) = load_graph(project_dir)?;
    let builder = ContextBuilder::new(&graph, config, project_dir).load_last_review()?;

    let contexts = if !models.is_empty() {
        builder.models(models)
    } else if !changed.is_empty() {
        builder.changed_files(changed)
    } else {
        return Err(anyhow::anyhow!("No models selected. Pass --models or --changed."));
    };

    if contexts.is_empty() {
        return Err(anyhow::anyhow!("None of the selected models were found in the manifest."));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&contexts)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Model Context".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());

    for context in &contexts {
        print_model_context(context);
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

fn print_model_context(context: &ModelContext) {
    println!();
    if context.is_new {
        println!("{} {}", context.name.green().bold(), "(new, not yet compiled)".yellow());
    } else {
        println!("{}", context.name.green().bold());
    }

    println!("  {} {}", "File:".bold(), context.file_path);
    if let Some(relation) = &context.relation_name {
        println!("  {} {}", "Relation:".bold(), relation);
    }
    if !context.columns.is_empty() {
        println!("  {} {}", "Columns:".bold(), context.columns.join(", "));
    }

    println!("  {}", "Upstream:".bold());
    if context.upstream.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for name in &context.upstream {
        let relation = context.upstream_tables.get(name).map(String::as_str).unwrap_or_default();
        println!("    {} {} {}", "←".cyan(), name, relation.dimmed());
    }

    println!("  {}", "Downstream:".bold());
    if context.downstream.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for name in &context.downstream {
        println!("    {} {}", "→".yellow(), name);
    }

    if !context.prior_results.is_empty() {
        println!("  {}", "Last review:".bold());
        for result in &context.prior_results {
            println!("    {} {}  {}", status_label(result.status), result.check, result.detail);
        }
    }
}

/// Review command - execute checks, save the report, exit 1 on any FAIL
fn review_command(
    config: &Config,
    project_dir: &Path,
    selection: &Selection,
    dry_run: bool,
    results: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let (_, graph) = load_graph(project_dir)?;
    let plan = selection.plan(config, &graph)?;

    if plan.checks.is_empty() {
        println!("{}", "No checks generated for the selected models.".yellow());
        return Ok(());
    }

    let report = if dry_run {
        ReviewRunner::dry_run().review(&plan)
    } else {
        let path = results.ok_or_else(|| {
            anyhow::anyhow!("No query results to evaluate. Pass --results <file> or --dry-run.")
        })?;
        let executor = ReplayExecutor::from_file(path)?;
        ReviewRunner::new(&executor, config.thresholds).review(&plan)
    };

    report.save_to_file(output)?;
    print_review_summary(&report);
    println!("{} {}", "Results saved to:".green(), output.display());

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn status_label(status: CheckStatus) -> colored::ColoredString {
    let label = format!("{:<4}", status.to_string());
    match status {
        CheckStatus::Fail => label.red().bold(),
        CheckStatus::Warn => label.yellow().bold(),
        CheckStatus::Pass => label.green(),
        CheckStatus::Skip => label.dimmed(),
    }
}

fn print_review_summary(report: &ReviewReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Guardrail Review".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Models reviewed:".bold(), report.models_reviewed.join(", "));
    if report.blast_radius.is_empty() {
        println!("{} {}", "Blast radius:".bold(), "none".dimmed());
    } else {
        println!("{} {}", "Blast radius:".bold(), report.blast_radius.join(", "));
    }
    println!();

    for result in &report.results {
        println!(
            "  {} [{}] {}.{}  {}",
            status_label(result.status),
            result.importance,
            result.model,
            result.check,
            result.detail
        );
    }

    println!();
    let summary = format!("{} ({:.1}s)", report.summary, report.duration_seconds);
    if report.has_failures() {
        println!("{} {}", "Summary:".bold(), summary.red().bold());
    } else if report.summary.warn > 0 {
        println!("{} {}", "Summary:".bold(), summary.yellow());
    } else {
        println!("{} {}", "Summary:".bold(), summary.green());
    }
    println!("{}", "=".repeat(60).bright_blue());
}
