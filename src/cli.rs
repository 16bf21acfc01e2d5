use crate::config::{LayoutHooks, load_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::person::PersonId;
use crate::store::RelationStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kinlay", version, about = "Family tree layout engine")]
pub struct Args {
    /// Family data JSON file (array of persons) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Focal person id
    #[arg(short = 'm', long = "main")]
    pub main: Option<String>,

    /// Lay generations out left to right
    #[arg(long)]
    pub horizontal: bool,

    /// Show siblings of the focal person
    #[arg(long)]
    pub siblings: bool,

    /// Generations shown above the focal person
    #[arg(long = "ancestry-depth")]
    pub ancestry_depth: Option<usize>,

    /// Generations shown below the focal person
    #[arg(long = "progeny-depth")]
    pub progeny_depth: Option<usize>,

    /// Collapse duplicate branches
    #[arg(long)]
    pub duplicates: bool,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())
        .with_context(|| "failed to load layout config")?;
    config.is_horizontal |= args.horizontal;
    config.show_siblings_of_main |= args.siblings;
    config.duplicate_branch_toggle |= args.duplicates;
    if args.ancestry_depth.is_some() {
        config.ancestry_depth = args.ancestry_depth;
    }
    if args.progeny_depth.is_some() {
        config.progeny_depth = args.progeny_depth;
    }

    let input = read_input(args.input.as_deref())?;
    let mut store = RelationStore::from_json(&input).context("invalid family data")?;
    let main = args.main.map(PersonId::from);
    let hooks = LayoutHooks::from_config(&config);
    let layout = compute_layout(&mut store, main.as_ref(), &config, &hooks);
    write_layout_dump(args.output.as_deref(), &layout)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path.filter(|p| *p != Path::new("-")) {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
