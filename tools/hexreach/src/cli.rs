//! CLI commands for hexreach

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::anchors::{
    assign_stable_identity, build_anchor_indexes, map_anchors_to_nodes, read_anchors, Anchor,
};
use crate::cache::{fingerprint_suffix, GraphCache};
use crate::ch::{ChBackend, ContractionHierarchy};
use crate::config::HexreachConfig;
use crate::delta::DeltaEngine;
use crate::formats::tabular::read_network;
use crate::formats::{AnchorIndexFile, AnchorNodesFile, CsrFile};
use crate::graph::{build_graph, RoadGraph};

#[derive(Parser)]
#[command(name = "hexreach")]
#[command(about = "Road-graph preparation and incremental H3 travel-time matrices", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a CSR road graph from nodes/edges CSV
    BuildGraph {
        /// Nodes CSV (id,lat,lon)
        #[arg(long)]
        nodes: PathBuf,

        /// Edges CSV (u,v,weight_s)
        #[arg(long)]
        edges: PathBuf,

        /// Output .csr file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print header and summary of a .csr file
    InspectGraph {
        /// Input .csr file
        graph: PathBuf,
    },

    /// Assign anchor ids, write per-mode anchor index and node map files
    BuildAnchors {
        /// Road graph the anchors snap to
        #[arg(long)]
        graph: PathBuf,

        /// Anchors CSV (id,node_id,mode[,anchor_int_id])
        #[arg(long)]
        anchors: PathBuf,

        /// Output directory for anchor_index.<mode>.arrow / anchor_nodes.<mode>.arrow
        #[arg(short, long)]
        outdir: PathBuf,
    },

    /// Prepare (or load from cache) the contraction hierarchy of a graph
    PrepareCh {
        /// Input .csr file
        graph: PathBuf,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Shortest travel time between two original node ids
    Route {
        /// Input .csr file
        graph: PathBuf,

        /// Source node id
        #[arg(long)]
        from: i64,

        /// Target node id
        #[arg(long)]
        to: i64,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Apply point-of-interest deltas to the minute matrices
    ApplyDeltas {
        /// Deltas CSV (state,brand,action,lat,lon)
        deltas: PathBuf,

        /// Directory holding <state>.csr region graphs
        #[arg(long)]
        graph_dir: Option<PathBuf>,

        /// Directory holding <state>.r<res>.arrow matrices
        #[arg(long)]
        matrix_dir: Option<PathBuf>,

        /// Ring radius around each change in km
        #[arg(long)]
        ring_km: Option<f64>,

        #[arg(long)]
        low_res: Option<u8>,

        #[arg(long)]
        high_res: Option<u8>,

        /// Drop values above this many minutes
        #[arg(long)]
        max_minutes: Option<u16>,
    },
}

#[derive(clap::Args)]
pub struct CacheArgs {
    /// Cache directory (overrides config cache_dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Cache slot suffix, e.g. "_drive"
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Append the graph fingerprint to the suffix so a changed graph gets a new slot
    #[arg(long)]
    pub fingerprint: bool,
}

#[derive(Serialize)]
struct GraphSummary {
    path: PathBuf,
    nodes: u32,
    edges: u64,
    created: String,
    fingerprint: String,
    max_out_degree: usize,
    zero_out_degree: usize,
}

#[derive(Serialize)]
struct AnchorSummary {
    mode: String,
    anchors: usize,
    resolved: usize,
    skipped: usize,
    occupied_nodes: usize,
    index: PathBuf,
    nodes: PathBuf,
}

#[derive(Serialize)]
struct RouteResult {
    from: i64,
    to: i64,
    seconds: Option<u32>,
    minutes: Option<u32>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_graph(path: &Path) -> Result<RoadGraph> {
    CsrFile::read(path).with_context(|| format!("Failed to read graph {}", path.display()))
}

impl CacheArgs {
    fn prepare(&self, config: &HexreachConfig, graph: &RoadGraph) -> Result<ContractionHierarchy> {
        let dir = self.cache_dir.clone().unwrap_or_else(|| config.cache_dir.clone());
        let suffix = if self.fingerprint {
            fingerprint_suffix(&self.suffix, &graph.fingerprint())
        } else {
            self.suffix.clone()
        };

        let cache = GraphCache::new(dir, ChBackend);
        let csr = &graph.csr;
        cache
            .load_or_build(&csr.indptr, &csr.indices, &csr.weights, &suffix)
            .with_context(|| format!("Failed to prepare cache slot '{suffix}'"))
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let mut config = HexreachConfig::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;

        match self.command {
            Commands::BuildGraph {
                nodes,
                edges,
                output,
            } => {
                let start = Instant::now();
                let network = read_network(&nodes, &edges).context("Failed to read road network")?;
                let (graph, stats) = build_graph(&network)?;
                CsrFile::write(&output, &graph)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                tracing::info!(
                    output = %output.display(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "graph written"
                );
                print_json(&stats)
            }

            Commands::InspectGraph { graph } => {
                let header = CsrFile::read_header(&graph)
                    .with_context(|| format!("Failed to read header of {}", graph.display()))?;
                let loaded = load_graph(&graph)?;
                let degrees = (0..loaded.n_nodes()).map(|u| loaded.csr.out_degree(u));
                let created = chrono::DateTime::from_timestamp(header.created_unix as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                print_json(&GraphSummary {
                    path: graph.clone(),
                    nodes: header.n_nodes,
                    edges: header.n_edges,
                    created,
                    fingerprint: hex::encode(header.fingerprint),
                    max_out_degree: degrees.clone().max().unwrap_or(0),
                    zero_out_degree: degrees.filter(|&d| d == 0).count(),
                })
            }

            Commands::BuildAnchors {
                graph,
                anchors,
                outdir,
            } => {
                let graph = load_graph(&graph)?;
                let all = read_anchors(&anchors)
                    .with_context(|| format!("Failed to read anchors {}", anchors.display()))?;
                std::fs::create_dir_all(&outdir)?;

                let mut summaries = Vec::new();
                for (mode, index) in build_anchor_indexes(&all) {
                    let of_mode: Vec<Anchor> =
                        all.iter().filter(|a| a.mode == mode).cloned().collect();
                    let assigned = assign_stable_identity(of_mode)
                        .with_context(|| format!("Failed to assign {mode} anchor ids"))?;
                    index.check_consistent(&assigned)?;
                    let node_map = map_anchors_to_nodes(&assigned, &graph.original_id)?;

                    let mut rows: Vec<(u32, i64)> = assigned
                        .iter()
                        .filter(|a| graph.compact_index(a.node_id).is_some())
                        .filter_map(|a| a.anchor_int_id.map(|id| (id, a.node_id)))
                        .collect();
                    rows.sort_unstable();
                    rows.dedup();

                    let index_path = AnchorIndexFile::write(&outdir, &index)?;
                    let nodes_path = AnchorNodesFile::write(&outdir, &index, &rows)?;
                    summaries.push(AnchorSummary {
                        mode: mode.to_string(),
                        anchors: index.len(),
                        resolved: rows.len(),
                        skipped: node_map.skipped,
                        occupied_nodes: node_map.occupied().count(),
                        index: index_path,
                        nodes: nodes_path,
                    });
                }
                print_json(&summaries)
            }

            Commands::PrepareCh { graph, cache } => {
                let graph = load_graph(&graph)?;
                let ch = cache.prepare(&config, &graph)?;
                tracing::info!(
                    nodes = ch.n_nodes,
                    shortcuts = ch.n_shortcuts,
                    up_edges = ch.up_heads.len(),
                    down_edges = ch.down_heads.len(),
                    "contraction hierarchy ready"
                );
                Ok(())
            }

            Commands::Route {
                graph,
                from,
                to,
                cache,
            } => {
                let graph = load_graph(&graph)?;
                let Some(source) = graph.compact_index(from) else {
                    bail!("Node {from} is not in the graph");
                };
                let Some(target) = graph.compact_index(to) else {
                    bail!("Node {to} is not in the graph");
                };
                let ch = cache.prepare(&config, &graph)?;
                let seconds = ch.query(source, target);
                print_json(&RouteResult {
                    from,
                    to,
                    seconds,
                    minutes: seconds.map(|s| s.div_ceil(60)),
                })
            }

            Commands::ApplyDeltas {
                deltas,
                graph_dir,
                matrix_dir,
                ring_km,
                low_res,
                high_res,
                max_minutes,
            } => {
                if let Some(dir) = graph_dir {
                    config.graph_dir = dir;
                }
                if let Some(dir) = matrix_dir {
                    config.matrix_dir = dir;
                }
                if let Some(km) = ring_km {
                    config.ring_radius_km = km;
                }
                if let Some(res) = low_res {
                    config.low_resolution = res;
                }
                if let Some(res) = high_res {
                    config.high_resolution = res;
                }
                if max_minutes.is_some() {
                    config.max_travel_minutes = max_minutes;
                }

                let engine = DeltaEngine::new(config).context("Invalid configuration")?;
                let report = engine
                    .run(&deltas)
                    .with_context(|| format!("Failed to apply deltas from {}", deltas.display()))?;
                print_json(&report)
            }
        }
    }
}
