use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gradecraft",
    version,
    about = "Composite grading engine: evaluate and store nested grading trees"
)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Project directory holding gradecraft.toml
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init,
    /// Validate and evaluate a gradable tree
    Evaluate(EvaluateCommand),
    /// Save a rating (and optional like/review) for an item
    Rate(RateCommand),
    /// Show one stored interaction
    Show(ShowCommand),
    /// List stored interactions
    List(ListCommand),
    /// Delete an interaction and its grading tree
    Delete(DeleteCommand),
    /// Manage reusable grading methods
    #[command(subcommand)]
    Method(MethodCommand),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ItemKind {
    Album,
    Track,
    Artist,
}

#[derive(Args)]
pub struct EvaluateCommand {
    /// JSON file containing a gradable tree
    pub tree: PathBuf,
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct RateCommand {
    /// JSON grading request (basic grade or gradable tree)
    pub request: PathBuf,
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub item: String,
    #[arg(long, value_enum)]
    pub item_type: ItemKind,
    #[arg(long)]
    pub liked: bool,
    #[arg(long)]
    pub review: Option<String>,
    /// Replace an existing interaction instead of creating a new one
    #[arg(long)]
    pub aggregate_id: Option<String>,
}

#[derive(Args)]
pub struct ShowCommand {
    pub aggregate_id: String,
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct ListCommand {
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct DeleteCommand {
    pub aggregate_id: String,
}

#[derive(Subcommand)]
pub enum MethodCommand {
    /// Store a composite tree as a reusable method
    Save(MethodSaveCommand),
    /// List stored methods
    List,
    /// Print a fresh instance of a method as JSON
    Show(MethodShowCommand),
}

#[derive(Args)]
pub struct MethodSaveCommand {
    pub tree: PathBuf,
    #[arg(long)]
    pub name: String,
}

#[derive(Args)]
pub struct MethodShowCommand {
    pub template_id: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Json,
    Md,
}
