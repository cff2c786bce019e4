use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "vidgroup",
    about = "Group captured video stream URLs by the video they belong to",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Captured stream URLs (reads one per line from stdin if omitted)
    pub urls: Vec<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Name groups by majority vote over all members instead of the first stream
    #[arg(long)]
    pub consensus: bool,

    /// Drop URLs that do not look like video before grouping
    #[arg(long)]
    pub video_only: bool,

    /// Keep reading stdin and regroup after each burst of new URLs
    #[arg(short, long)]
    pub watch: bool,

    /// Categorize page elements from a JSON file of element metadata
    #[arg(short, long)]
    pub elements: Option<PathBuf>,

    /// Forward the captured streams to the backend for processing
    #[arg(long)]
    pub submit: bool,

    /// Backend base URL used by --submit
    #[arg(long)]
    pub backend: Option<String>,

    /// Title sent with --submit
    #[arg(long)]
    pub title: Option<String>,

    /// Page URL sent with --submit
    #[arg(long)]
    pub page_url: Option<String>,

    /// Show grouping details
    #[arg(short, long)]
    pub verbose: bool,
}
