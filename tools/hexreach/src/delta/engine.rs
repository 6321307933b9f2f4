//! Delta recompute engine
//!
//! A run has two phases. The compute phase walks every delta: load the
//! region graph, snap to the nearest node, run Dijkstra on the reverse graph
//! from it, and keep the per-cell minimum inside the ring at each resolution.
//! Nothing is written in this phase. The write phase locks every touched
//! matrix, reads each once, merges all its updates and rewrites it whole.

use hexreach_common::{suggest_correction, Error, Result};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::cells::{affected_cells, cell_at, resolution};
use super::lock::MatrixLock;
use super::merge::{apply_min, secs_to_minutes};
use super::record::{read_deltas, Delta};
use crate::config::HexreachConfig;
use crate::formats::minutes::check_brand;
use crate::formats::{CsrFile, MinutesMatrix};
use crate::graph::{reverse, shortest_times, CsrGraph, RoadGraph, UNREACHABLE};
use crate::spatial::NodeIndex;

/// A delta that could not be applied; the rest of the run continues
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaFailure {
    /// 0-based position in the delta source
    pub index: usize,
    pub state: String,
    pub brand: String,
    pub reason: String,
}

/// A (state, brand) pair whose matrices need a full rebuild
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RecomputeRequest {
    pub state: String,
    pub brand: String,
}

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeltaReport {
    pub deltas: usize,
    pub applied: usize,
    pub failed: Vec<DeltaFailure>,
    pub recompute_required: Vec<RecomputeRequest>,
    pub cells_updated: usize,
    pub matrices_written: Vec<PathBuf>,
}

struct Region {
    graph: RoadGraph,
    reverse: CsrGraph,
    nodes: NodeIndex,
}

struct PendingUpdate {
    brand: String,
    values: Vec<(u64, u16)>,
}

pub struct DeltaEngine {
    config: HexreachConfig,
}

impl DeltaEngine {
    pub fn new(config: HexreachConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HexreachConfig {
        &self.config
    }

    pub fn graph_path(&self, state: &str) -> PathBuf {
        self.config.graph_dir.join(format!("{state}.csr"))
    }

    pub fn matrix_path(&self, state: &str, res: u8) -> PathBuf {
        self.config.matrix_dir.join(format!("{state}.r{res}.arrow"))
    }

    /// Read deltas from `path` and apply them; a missing file aborts the run
    pub fn run(&self, path: &Path) -> Result<DeltaReport> {
        let deltas = read_deltas(path)?;
        self.apply(&deltas)
    }

    pub fn apply(&self, deltas: &[Delta]) -> Result<DeltaReport> {
        let start = Instant::now();
        let mut report = DeltaReport {
            deltas: deltas.len(),
            ..Default::default()
        };
        if deltas.is_empty() {
            tracing::info!("no deltas, nothing to do");
            return Ok(report);
        }

        let resolutions = self.config.resolutions();
        let mut regions: BTreeMap<String, std::result::Result<Region, String>> = BTreeMap::new();
        let mut pending: BTreeMap<(String, u8), Vec<PendingUpdate>> = BTreeMap::new();
        let mut recompute: BTreeSet<RecomputeRequest> = BTreeSet::new();

        for (index, delta) in deltas.iter().enumerate() {
            let fail = |reason: String| DeltaFailure {
                index,
                state: delta.state.clone(),
                brand: delta.brand.clone(),
                reason,
            };

            if let Err(e) = check_brand(&delta.brand) {
                let reason = e.to_string();
                tracing::warn!(index, brand = %delta.brand, %reason, "delta skipped");
                report.failed.push(fail(reason));
                continue;
            }

            if !delta.action.is_incremental() {
                tracing::warn!(
                    state = %delta.state,
                    brand = %delta.brand,
                    "close cannot be merged incrementally, full recompute required"
                );
                recompute.insert(RecomputeRequest {
                    state: delta.state.clone(),
                    brand: delta.brand.clone(),
                });
                continue;
            }

            if !regions.contains_key(&delta.state) {
                let loaded = match self.load_region(&delta.state) {
                    Ok(region) => Ok(region),
                    Err(e @ Error::RegionNotFound { .. }) => Err(e.to_string()),
                    Err(e) => return Err(e),
                };
                regions.insert(delta.state.clone(), loaded);
            }
            let region = match regions.get(&delta.state) {
                Some(Ok(region)) => region,
                Some(Err(reason)) => {
                    tracing::warn!(index, state = %delta.state, %reason, "delta skipped");
                    report.failed.push(fail(reason.clone()));
                    continue;
                }
                None => continue,
            };

            if let Some(missing) = resolutions
                .iter()
                .map(|&res| self.matrix_path(&delta.state, res))
                .find(|path| !path.exists())
            {
                let reason = Error::MissingFile(missing).to_string();
                tracing::warn!(index, state = %delta.state, %reason, "delta skipped");
                report.failed.push(fail(reason));
                continue;
            }

            let node = region.nodes.nearest(delta.lat, delta.lon)?;
            let cutoff_s = self.config.max_travel_minutes.map(|m| m as u32 * 60);
            let times = shortest_times(&region.reverse, node, cutoff_s);

            for &res in &resolutions {
                let ring = affected_cells(delta.lat, delta.lon, res, self.config.ring_radius_km)?;
                let values = self.cell_minutes(&region.graph, &times, res, &ring)?;
                tracing::debug!(
                    index,
                    res,
                    ring = ring.len(),
                    cells = values.len(),
                    "delta cells computed"
                );
                if values.is_empty() {
                    continue;
                }
                pending
                    .entry((delta.state.clone(), res))
                    .or_default()
                    .push(PendingUpdate {
                        brand: delta.brand.clone(),
                        values,
                    });
            }
            report.applied += 1;
        }

        report.recompute_required = recompute.into_iter().collect();
        self.write_pending(&pending, &mut report)?;

        tracing::info!(
            deltas = report.deltas,
            applied = report.applied,
            failed = report.failed.len(),
            recompute_required = report.recompute_required.len(),
            cells_updated = report.cells_updated,
            matrices_written = report.matrices_written.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "delta run complete"
        );
        Ok(report)
    }

    /// Lock, read and merge every touched matrix, then write them all
    fn write_pending(
        &self,
        pending: &BTreeMap<(String, u8), Vec<PendingUpdate>>,
        report: &mut DeltaReport,
    ) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let mut locks = Vec::with_capacity(pending.len());
        for (state, res) in pending.keys() {
            locks.push(MatrixLock::acquire(&self.matrix_path(state, *res))?);
        }

        let mut staged = Vec::with_capacity(pending.len());
        for ((state, res), updates) in pending {
            let path = self.matrix_path(state, *res);
            let mut matrix = MinutesMatrix::read(&path)?;
            let changed = updates
                .iter()
                .map(|u| apply_min(&mut matrix, &u.brand, &u.values))
                .sum::<Result<usize>>()?;
            staged.push((path, matrix, changed));
        }

        for (path, matrix, changed) in staged {
            if changed == 0 {
                tracing::debug!(path = %path.display(), "matrix unchanged, not rewritten");
                continue;
            }
            matrix.write(&path)?;
            tracing::info!(path = %path.display(), cells = changed, "matrix updated");
            report.cells_updated += changed;
            report.matrices_written.push(path);
        }

        drop(locks);
        Ok(())
    }

    /// Best minutes per ring cell over the reached nodes inside it
    fn cell_minutes(
        &self,
        graph: &RoadGraph,
        times: &[u32],
        res: u8,
        ring: &FxHashSet<u64>,
    ) -> Result<Vec<(u64, u16)>> {
        let resolution = resolution(res)?;
        let mut best: BTreeMap<u64, u16> = BTreeMap::new();
        for (node, &secs) in times.iter().enumerate() {
            if secs == UNREACHABLE {
                continue;
            }
            let minutes = secs_to_minutes(secs);
            if self.config.max_travel_minutes.is_some_and(|max| minutes > max) {
                continue;
            }
            let cell = u64::from(cell_at(
                graph.lat[node] as f64,
                graph.lon[node] as f64,
                resolution,
            )?);
            if !ring.contains(&cell) {
                continue;
            }
            best.entry(cell)
                .and_modify(|m| *m = (*m).min(minutes))
                .or_insert(minutes);
        }
        Ok(best.into_iter().collect())
    }

    fn load_region(&self, state: &str) -> Result<Region> {
        let path = self.graph_path(state);
        let graph = match CsrFile::read(&path) {
            Ok(graph) => graph,
            Err(Error::MissingFile(_)) => {
                return Err(Error::RegionNotFound {
                    region: state.to_string(),
                    suggestion: suggest_correction(state, &self.known_regions()),
                })
            }
            Err(e) => return Err(e),
        };
        let reverse = reverse(&graph.csr);
        let nodes = NodeIndex::build(&graph);
        tracing::info!(
            state,
            nodes = graph.n_nodes(),
            edges = graph.csr.n_edges(),
            "loaded region graph"
        );
        Ok(Region {
            graph,
            reverse,
            nodes,
        })
    }

    /// Region names with a graph file in `graph_dir`
    fn known_regions(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.config.graph_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "csr"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Action;
    use crate::graph::{build_graph, RawEdge, RawNode, RoadNetwork};
    use tempfile::TempDir;

    const RES: u8 = 9;

    /// Path 0 -> 1 -> 2 (60 s, 120 s), nodes ~550 m apart in San Francisco
    fn path_graph() -> RoadGraph {
        let network = RoadNetwork {
            nodes: vec![
                RawNode {
                    id: 100,
                    lat: 37.785,
                    lon: -122.418,
                },
                RawNode {
                    id: 200,
                    lat: 37.780,
                    lon: -122.418,
                },
                RawNode {
                    id: 300,
                    lat: 37.775,
                    lon: -122.418,
                },
            ],
            edges: vec![
                RawEdge {
                    u: 100,
                    v: 200,
                    weight_s: Some(60.0),
                },
                RawEdge {
                    u: 200,
                    v: 300,
                    weight_s: Some(120.0),
                },
            ],
        };
        build_graph(&network).unwrap().0
    }

    fn node_cell(graph: &RoadGraph, node: usize) -> u64 {
        u64::from(
            cell_at(graph.lat[node] as f64, graph.lon[node] as f64, resolution(RES).unwrap())
                .unwrap(),
        )
    }

    struct Fixture {
        _dir: TempDir,
        engine: DeltaEngine,
        graph: RoadGraph,
    }

    fn fixture(max_travel_minutes: Option<u16>) -> Fixture {
        fixture_with_ring(max_travel_minutes, 2.0)
    }

    fn fixture_with_ring(max_travel_minutes: Option<u16>, ring_radius_km: f64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = HexreachConfig {
            low_resolution: RES,
            high_resolution: RES,
            ring_radius_km,
            graph_dir: dir.path().join("graphs"),
            matrix_dir: dir.path().join("matrices"),
            cache_dir: dir.path().join("cache"),
            max_travel_minutes,
        };
        std::fs::create_dir_all(&config.graph_dir).unwrap();
        std::fs::create_dir_all(&config.matrix_dir).unwrap();

        let graph = path_graph();
        let engine = DeltaEngine::new(config).unwrap();
        CsrFile::write(engine.graph_path("ca"), &graph).unwrap();
        MinutesMatrix::new().write(&engine.matrix_path("ca", RES)).unwrap();
        Fixture {
            _dir: dir,
            engine,
            graph,
        }
    }

    fn delta(state: &str, action: Action, lat: f64, lon: f64) -> Delta {
        Delta {
            state: state.to_string(),
            brand: "aldi".to_string(),
            action,
            lat,
            lon,
        }
    }

    #[test]
    fn test_empty_delta_set_writes_nothing() {
        let f = fixture(None);
        let path = f.engine.matrix_path("ca", RES);
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let report = f.engine.apply(&[]).unwrap();
        assert_eq!(report, DeltaReport::default());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_single_add() {
        let f = fixture(None);
        let report = f
            .engine
            .apply(&[delta("ca", Action::Add, 37.775, -122.418)])
            .unwrap();

        assert_eq!(report.applied, 1);
        assert!(report.failed.is_empty());
        assert_eq!(report.matrices_written, vec![f.engine.matrix_path("ca", RES)]);
        assert_eq!(report.cells_updated, 3);

        let matrix = MinutesMatrix::read(&f.engine.matrix_path("ca", RES)).unwrap();
        assert_eq!(matrix.get(node_cell(&f.graph, 0), "aldi"), Some(3));
        assert_eq!(matrix.get(node_cell(&f.graph, 1), "aldi"), Some(2));
        assert_eq!(matrix.get(node_cell(&f.graph, 2), "aldi"), Some(0));
        assert_eq!(matrix.n_rows(), 3);
    }

    #[test]
    fn test_add_never_increases_existing_values() {
        let f = fixture(None);
        let path = f.engine.matrix_path("ca", RES);
        let mut matrix = MinutesMatrix::new();
        let col = matrix.column_index("aldi").unwrap();
        let r0 = matrix.row_index(node_cell(&f.graph, 0));
        let r1 = matrix.row_index(node_cell(&f.graph, 1));
        *matrix.value_mut(col, r0) = Some(1);
        *matrix.value_mut(col, r1) = Some(20);
        matrix.write(&path).unwrap();

        f.engine
            .apply(&[delta("ca", Action::Move, 37.775, -122.418)])
            .unwrap();

        let matrix = MinutesMatrix::read(&path).unwrap();
        assert_eq!(matrix.get(node_cell(&f.graph, 0), "aldi"), Some(1));
        assert_eq!(matrix.get(node_cell(&f.graph, 1), "aldi"), Some(2));
    }

    #[test]
    fn test_cutoff_skips_far_cells() {
        let f = fixture(Some(2));
        f.engine
            .apply(&[delta("ca", Action::Add, 37.775, -122.418)])
            .unwrap();
        let matrix = MinutesMatrix::read(&f.engine.matrix_path("ca", RES)).unwrap();
        assert_eq!(matrix.get(node_cell(&f.graph, 0), "aldi"), None);
        assert_eq!(matrix.get(node_cell(&f.graph, 1), "aldi"), Some(2));
    }

    #[test]
    fn test_cells_outside_ring_untouched() {
        // radius 0 keeps only the cell of the change; nodes 0 and 1 are reachable but outside
        let f = fixture_with_ring(None, 0.0);
        let report = f
            .engine
            .apply(&[delta("ca", Action::Add, 37.775, -122.418)])
            .unwrap();
        assert_eq!(report.cells_updated, 1);

        let matrix = MinutesMatrix::read(&f.engine.matrix_path("ca", RES)).unwrap();
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.get(node_cell(&f.graph, 2), "aldi"), Some(0));
        assert!(!matrix.cells().contains(&node_cell(&f.graph, 0)));
        assert!(!matrix.cells().contains(&node_cell(&f.graph, 1)));
    }

    #[test]
    fn test_cell_key_brand_fails_delta() {
        let f = fixture(None);
        let path = f.engine.matrix_path("ca", RES);
        let before = std::fs::read(&path).unwrap();
        let mut bad = delta("ca", Action::Add, 37.775, -122.418);
        bad.brand = "h3_cell".to_string();

        let report = f.engine.apply(&[bad]).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.cells_updated, 0);
        assert!(report.matrices_written.is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_missing_matrix_fails_only_that_delta() {
        let f = fixture(None);
        CsrFile::write(f.engine.graph_path("nv"), &f.graph).unwrap();

        let report = f
            .engine
            .apply(&[
                delta("nv", Action::Add, 37.775, -122.418),
                delta("ca", Action::Add, 37.775, -122.418),
            ])
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert_eq!(report.failed[0].state, "nv");
        assert!(!f.engine.matrix_path("nv", RES).exists());
        assert_eq!(report.matrices_written.len(), 1);
    }

    #[test]
    fn test_missing_region_suggests_name() {
        let f = fixture(None);
        CsrFile::write(f.engine.graph_path("nevada"), &f.graph).unwrap();
        let report = f
            .engine
            .apply(&[delta("nevda", Action::Add, 37.775, -122.418)])
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        let reason = &report.failed[0].reason;
        assert!(reason.contains("did you mean 'nevada'"), "{reason}");
        assert!(report.matrices_written.is_empty());
    }

    #[test]
    fn test_close_requests_recompute_without_writing() {
        let f = fixture(None);
        let path = f.engine.matrix_path("ca", RES);
        let before = std::fs::read(&path).unwrap();

        let report = f
            .engine
            .apply(&[
                delta("ca", Action::Close, 37.775, -122.418),
                delta("ca", Action::Close, 37.780, -122.418),
            ])
            .unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(
            report.recompute_required,
            vec![RecomputeRequest {
                state: "ca".to_string(),
                brand: "aldi".to_string()
            }]
        );
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_locked_matrix_aborts_before_writing() {
        let f = fixture(None);
        let path = f.engine.matrix_path("ca", RES);
        let before = std::fs::read(&path).unwrap();
        let _held = MatrixLock::acquire(&path).unwrap();

        let err = f
            .engine
            .apply(&[delta("ca", Action::Add, 37.775, -122.418)])
            .unwrap_err();
        assert!(matches!(err, Error::Locked(_)));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_report_serializes() {
        let report = DeltaReport {
            deltas: 1,
            applied: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["applied"], 1);
        assert!(json["failed"].as_array().unwrap().is_empty());
    }
}
