//! Spatial index for snapping coordinates to road graph nodes

use hexreach_common::{Error, Result};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::graph::RoadGraph;

/// Node position with its compact index
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedPoint {
    pub coords: [f64; 2], // [lon, lat]
    pub node: u32,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

/// R-tree over all graph nodes
pub struct NodeIndex {
    tree: RTree<IndexedPoint>,
}

impl NodeIndex {
    pub fn build(graph: &RoadGraph) -> Self {
        let points: Vec<IndexedPoint> = graph
            .lat
            .iter()
            .zip(&graph.lon)
            .enumerate()
            .map(|(node, (&lat, &lon))| IndexedPoint {
                coords: [lon as f64, lat as f64],
                node: node as u32,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Compact index of the node closest to (lat, lon)
    pub fn nearest(&self, lat: f64, lon: f64) -> Result<u32> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(Error::InvalidInput(format!("non-finite coordinate ({lat}, {lon})")));
        }
        self.tree
            .nearest_neighbor(&[lon, lat])
            .map(|p| p.node)
            .ok_or(Error::NoNearestNode { lat, lon })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, RawNode, RoadNetwork};

    fn graph(points: &[(i64, f64, f64)]) -> RoadGraph {
        let network = RoadNetwork {
            nodes: points
                .iter()
                .map(|&(id, lat, lon)| RawNode { id, lat, lon })
                .collect(),
            edges: Vec::new(),
        };
        build_graph(&network).unwrap().0
    }

    #[test]
    fn test_nearest_node() {
        let g = graph(&[(30, 37.0, -122.0), (10, 37.1, -122.1), (20, 37.2, -122.2)]);
        let index = NodeIndex::build(&g);
        assert_eq!(index.len(), 3);

        // compact indices follow sorted original ids: 10 -> 0, 20 -> 1, 30 -> 2
        assert_eq!(index.nearest(37.19, -122.21).unwrap(), 1);
        assert_eq!(index.nearest(36.9, -121.9).unwrap(), 2);
    }

    #[test]
    fn test_empty_graph_has_no_nearest() {
        let index = NodeIndex::build(&graph(&[]));
        assert!(index.is_empty());
        assert!(matches!(
            index.nearest(37.0, -122.0),
            Err(Error::NoNearestNode { .. })
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let index = NodeIndex::build(&graph(&[(1, 0.0, 0.0)]));
        assert!(index.nearest(f64::NAN, 0.0).is_err());
    }
}
