mod cli;
mod config;
mod error;
mod grading;
mod report;
mod store;
mod types;

use crate::error::{GradeError, Result};
use crate::store::Store;
use crate::types::config::GradecraftConfig;
use crate::types::interaction::{GradingRequest, Interaction, ItemType, Review};
use crate::types::report::{EvaluationReport, InteractionReport};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const NOT_FOUND: i32 = 2;
    pub const RUNTIME_FAILURE: i32 = 3;
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn output_format(format: cli::ReportFormat) -> report::OutputFormat {
    match format {
        cli::ReportFormat::Json => report::OutputFormat::Json,
        cli::ReportFormat::Md => report::OutputFormat::Md,
    }
}

fn item_type(kind: cli::ItemKind) -> ItemType {
    match kind {
        cli::ItemKind::Album => ItemType::Album,
        cli::ItemKind::Track => ItemType::Track,
        cli::ItemKind::Artist => ItemType::Artist,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn open_store(root: &Path, cfg: &GradecraftConfig) -> Result<Store> {
    let mut store = Store::open(&cfg.storage_settings(root))?;
    store.set_display_precision(cfg.grading_settings().display_precision);
    Ok(store)
}

fn run() -> Result<i32> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.root)?;
    let precision = cfg.grading_settings().display_precision;

    match cli.command {
        cli::Commands::Init => {
            let settings = cfg.storage_settings(&cli.root);
            Store::open(&settings)?;
            println!("initialized {}", settings.database.display());
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Evaluate(cmd) => {
            let mut tree: grading::Gradable = read_json(&cmd.tree)?;
            tree.validate()?;
            tree.snap_values()?;
            let evaluation = EvaluationReport::build(&tree, precision)?;
            println!(
                "{}",
                report::render_evaluation(&evaluation, output_format(cmd.format))?
            );
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Rate(cmd) => {
            let request: GradingRequest = read_json(&cmd.request)?;
            let rating = request.into_rating(&cfg.grading_settings())?;

            let mut interaction = Interaction::new(cmd.user, cmd.item, item_type(cmd.item_type));
            if let Some(aggregate_id) = cmd.aggregate_id {
                interaction.aggregate_id = aggregate_id;
            }
            interaction.is_liked = cmd.liked;
            interaction.review = cmd.review.map(Review::new);
            interaction.rating = Some(rating);

            let mut store = open_store(&cli.root, &cfg)?;
            store.save_interaction(&interaction)?;
            println!("{}", interaction.aggregate_id);
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Show(cmd) => {
            let store = open_store(&cli.root, &cfg)?;
            let interaction = store.load_interaction(&cmd.aggregate_id)?;
            let reports = vec![InteractionReport::build(&interaction, precision)?];
            println!(
                "{}",
                report::render_interactions(&reports, output_format(cmd.format))?
            );
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::List(cmd) => {
            let store = open_store(&cli.root, &cfg)?;
            let reports = store
                .list_interactions()?
                .iter()
                .map(|interaction| InteractionReport::build(interaction, precision))
                .collect::<Result<Vec<_>>>()?;
            println!(
                "{}",
                report::render_interactions(&reports, output_format(cmd.format))?
            );
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Delete(cmd) => {
            let mut store = open_store(&cli.root, &cfg)?;
            store.delete_interaction(&cmd.aggregate_id)?;
            println!("deleted {}", cmd.aggregate_id);
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Method(cli::MethodCommand::Save(cmd)) => {
            let tree: grading::Gradable = read_json(&cmd.tree)?;
            let store = open_store(&cli.root, &cfg)?;
            let template = store.save_template(&cmd.name, &tree)?;
            println!("{}", template.template_id);
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Method(cli::MethodCommand::List) => {
            let store = open_store(&cli.root, &cfg)?;
            let templates = store.list_templates()?;
            if templates.is_empty() {
                println!("methods: none");
                return Ok(exit_code::SUCCESS);
            }
            for template in &templates {
                println!(
                    "- {} {} ({} components)",
                    template.template_id,
                    template.name,
                    template.definition.children().len()
                );
            }
            Ok(exit_code::SUCCESS)
        }
        cli::Commands::Method(cli::MethodCommand::Show(cmd)) => {
            let store = open_store(&cli.root, &cfg)?;
            let instance = store.load_template(&cmd.template_id)?.instantiate();
            println!("{}", report::json::to_json(&instance)?);
            Ok(exit_code::SUCCESS)
        }
    }
}

fn main() {
    match run() {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            let code = match e {
                GradeError::NotFound(_) => exit_code::NOT_FOUND,
                _ => exit_code::RUNTIME_FAILURE,
            };
            std::process::exit(code);
        }
    }
}
