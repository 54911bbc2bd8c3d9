use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use querycanvas::compiler::{compile, dataset_request};
use querycanvas::layout::{CanvasLayout, LayoutConfig};
use querycanvas::store::QueryGraph;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "querycanvas",
    version,
    about = "Compile a saved query graph into a structured query request"
)]
struct Cli {
    /// Graph snapshot (JSON)
    input: PathBuf,

    #[arg(short, long, help = "Output file (default: stdout)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Emit the full execution request instead of the bare query")]
    dataset: bool,

    #[arg(
        long,
        value_name = "JSON",
        requires = "minimap",
        help = "Layout overrides for the minimap projection (JSON file)"
    )]
    layout: Option<PathBuf>,

    #[arg(long, conflicts_with = "dataset", help = "Emit the minimap projection")]
    minimap: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let graph: QueryGraph = serde_json::from_str(&read(&cli.input)).unwrap_or_else(|e| {
        eprintln!("Invalid graph: {}", e);
        process::exit(1);
    });
    debug!(
        tables = graph.tables().len(),
        joins = graph.joins().len(),
        columns = graph.columns().len(),
        filters = graph.filters().len(),
        "cli.loaded"
    );

    let rendered = if cli.minimap {
        let config = match &cli.layout {
            Some(path) => serde_json::from_str::<LayoutConfig>(&read(path)).unwrap_or_else(|e| {
                eprintln!("Invalid layout config: {}", e);
                process::exit(1);
            }),
            None => LayoutConfig::default(),
        };
        let minimap = CanvasLayout::new(config).minimap(graph.tables());
        serde_json::to_string_pretty(&minimap)
    } else if cli.dataset {
        match dataset_request(&graph) {
            Ok(request) => serde_json::to_string_pretty(&request),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    } else {
        match compile(&graph) {
            Some(query) => serde_json::to_string_pretty(&query),
            None => {
                eprintln!("Add a table to build a query");
                process::exit(1);
            }
        }
    };

    let rendered = rendered.unwrap_or_else(|e| {
        eprintln!("Failed to serialize output: {}", e);
        process::exit(1);
    });

    match cli.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &rendered) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => println!("{}", rendered),
    }
}
