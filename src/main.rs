use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backlog_order::config::EngineConfig;
use backlog_order::engine::{MovePlanner, PlannedMove, TreeIndex};
use backlog_order::models::{DropIntent, Gesture, Node, NodeId};
use backlog_order::tree_render;

#[derive(Parser)]
#[command(name = "backlog")]
#[command(about = "Plan and check drag-and-drop moves in typed work-item backlogs")]
struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a snapshot as a tree
    Tree {
        /// JSON array of nodes
        snapshot: PathBuf,
    },
    /// Report invariant violations and crowded sibling lists
    Check {
        /// JSON array of nodes
        snapshot: PathBuf,
    },
    /// Compute the patches for one drag gesture
    Plan {
        /// JSON array of nodes
        snapshot: PathBuf,
        /// Node being dragged
        #[arg(long)]
        dragged: NodeId,
        /// Node under the pointer
        #[arg(long)]
        target: NodeId,
        /// Pointer position within the target row, 0.0 (top) to 1.0 (bottom)
        #[arg(short, long, conflicts_with = "intent")]
        y: Option<f64>,
        /// Skip drop-zone classification and use this intent (before, after, inside)
        #[arg(long, value_parser = parse_intent)]
        intent: Option<DropIntent>,
        /// Write the snapshot with the plan applied to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

fn parse_intent(s: &str) -> Result<DropIntent, String> {
    DropIntent::from_str(s).ok_or_else(|| format!("unknown drop intent '{}'", s))
}

/// Initialize tracing with output to stderr so stdout stays machine readable
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "backlog_order=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_snapshot(path: &Path) -> anyhow::Result<Vec<Node>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path),
        None => Ok(EngineConfig::load()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Tree { snapshot } => {
            let tree = TreeIndex::build(read_snapshot(&snapshot)?);
            print!("{}", tree_render::render_tree(&tree));
        }
        Commands::Check { snapshot } => {
            let tree = TreeIndex::build(read_snapshot(&snapshot)?);
            let violations = tree.audit(&config.lattice);
            for violation in &violations {
                println!("{}", violation);
            }

            let parents = std::iter::once(None).chain(tree.nodes().map(|n| Some(n.id)));
            let mut crowded = 0;
            for parent_id in parents {
                let keys: Vec<_> = tree
                    .children_of(parent_id)
                    .iter()
                    .filter_map(|id| tree.get(*id).map(|n| n.order))
                    .collect();
                if config.keys.is_crowded(&keys) {
                    crowded += 1;
                    match parent_id {
                        Some(id) => println!("children of {} are due for a rebalance", id),
                        None => println!("top-level items are due for a rebalance"),
                    }
                }
            }

            if !violations.is_empty() {
                bail!("{} violation(s) found", violations.len());
            }
            tracing::info!(nodes = tree.len(), crowded, "snapshot is consistent");
        }
        Commands::Plan {
            snapshot,
            dragged,
            target,
            y,
            intent,
            output,
        } => {
            let mut tree = TreeIndex::build(read_snapshot(&snapshot)?);
            let planner = MovePlanner::new(&config);
            let planned = match intent {
                Some(intent) => PlannedMove {
                    intent,
                    plan: planner.plan(&tree, dragged, target, intent)?,
                },
                None => {
                    let gesture = Gesture {
                        dragged_id: dragged,
                        target_id: target,
                        pointer_y: y.unwrap_or(0.5),
                    };
                    planner.plan_gesture(&tree, &gesture)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&planned)?);

            if let Some(output) = output {
                tree.apply(&planned.plan);
                let content = serde_json::to_string_pretty(&tree.into_nodes())?;
                fs::write(&output, content)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                tracing::info!(path = %output.display(), "wrote updated snapshot");
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
