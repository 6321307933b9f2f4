//! Anchor identity manager: compact ids and node slots

use hexreach_common::{Error, Result};
use std::collections::HashMap;

use super::{sorted_distinct_ids, Anchor};
use crate::graph::build_lookup;

/// Node slot value meaning "no anchor here"
pub const NO_ANCHOR: i32 = -1;

/// Assign `anchor_int_id` from the sorted set of stable ids
///
/// If every row already carries an `anchor_int_id` the anchors are returned
/// untouched, so running this twice is a no-op. Rows sharing a stable id share
/// the compact id. A column filled on some rows only is rejected.
pub fn assign_stable_identity(mut anchors: Vec<Anchor>) -> Result<Vec<Anchor>> {
    let with_id = anchors.iter().filter(|a| a.anchor_int_id.is_some()).count();
    if with_id == anchors.len() {
        return Ok(anchors);
    }
    if with_id > 0 {
        return Err(Error::InvalidInput(format!(
            "anchor_int_id present on {with_id} of {} rows; expected all or none",
            anchors.len()
        )));
    }

    let ids = sorted_distinct_ids(anchors.iter().map(|a| a.stable_id.as_str()));
    let mut assignment: HashMap<&str, u32> = HashMap::with_capacity(ids.len());
    for (pos, id) in ids.iter().enumerate() {
        let compact = u32::try_from(pos)
            .map_err(|_| Error::Overflow(format!("{} anchors exceed u32 ids", ids.len())))?;
        assignment.insert(id.as_str(), compact);
    }

    for anchor in &mut anchors {
        anchor.anchor_int_id = assignment.get(anchor.stable_id.as_str()).copied();
    }

    tracing::debug!(anchors = anchors.len(), distinct = ids.len(), "assigned anchor ids");
    Ok(anchors)
}

/// Anchor id per graph node, [`NO_ANCHOR`] where none sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorNodeMap {
    pub slots: Vec<i32>,
    /// Anchors whose `node_id` is not in the graph
    pub skipped: usize,
}

impl AnchorNodeMap {
    /// `(anchor_int_id, compact_index)` for every occupied slot, by node
    pub fn occupied(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, &slot)| slot != NO_ANCHOR)
            .map(|(node, &slot)| (slot as u32, node as u32))
    }
}

/// Resolve each anchor's `node_id` onto a compact graph index
///
/// Anchors whose node is not in `original_id` are skipped and counted. When
/// several anchors land on one node the smallest `anchor_int_id` wins, which
/// keeps the result independent of row order.
pub fn map_anchors_to_nodes(anchors: &[Anchor], original_id: &[i64]) -> Result<AnchorNodeMap> {
    let lookup = build_lookup(original_id)?;
    let mut slots = vec![NO_ANCHOR; original_id.len()];
    let mut skipped = 0usize;

    for anchor in anchors {
        let int_id = anchor.anchor_int_id.ok_or_else(|| {
            Error::InvalidInput(format!(
                "anchor '{}' has no anchor_int_id; assign identity first",
                anchor.stable_id
            ))
        })?;
        let int_id = i32::try_from(int_id).map_err(|_| {
            Error::Overflow(format!("anchor_int_id {int_id} does not fit a node slot"))
        })?;

        let Some(&node) = lookup.get(&anchor.node_id) else {
            tracing::debug!(
                anchor = %anchor.stable_id,
                node_id = anchor.node_id,
                "anchor node not in graph, skipping"
            );
            skipped += 1;
            continue;
        };

        let slot = &mut slots[node as usize];
        if *slot == NO_ANCHOR || int_id < *slot {
            *slot = int_id;
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, total = anchors.len(), "anchors not found in graph");
    }

    Ok(AnchorNodeMap { slots, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::Mode;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn anchor(id: &str, node_id: i64) -> Anchor {
        Anchor {
            stable_id: id.to_string(),
            node_id,
            mode: Mode::Drive,
            anchor_int_id: None,
        }
    }

    fn ids(anchors: &[Anchor]) -> Vec<(String, u32)> {
        let mut out: Vec<_> = anchors
            .iter()
            .map(|a| (a.stable_id.clone(), a.anchor_int_id.unwrap()))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_assign_sorted_ids() {
        let anchors = vec![anchor("walmart-9", 1), anchor("aldi-3", 2), anchor("costco-1", 3)];
        let assigned = assign_stable_identity(anchors).unwrap();
        assert_eq!(
            ids(&assigned),
            vec![
                ("aldi-3".to_string(), 0),
                ("costco-1".to_string(), 1),
                ("walmart-9".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_assignment_independent_of_row_order() {
        let base: Vec<Anchor> = (0..50).map(|i| anchor(&format!("poi-{i:03}"), i)).collect();
        let expected = ids(&assign_stable_identity(base.clone()).unwrap());

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let mut shuffled = base.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(ids(&assign_stable_identity(shuffled).unwrap()), expected);
        }
    }

    #[test]
    fn test_duplicate_stable_ids_share_id() {
        let assigned =
            assign_stable_identity(vec![anchor("b", 1), anchor("a", 2), anchor("b", 3)]).unwrap();
        assert_eq!(assigned[0].anchor_int_id, Some(1));
        assert_eq!(assigned[2].anchor_int_id, Some(1));
        assert_eq!(assigned[1].anchor_int_id, Some(0));
    }

    #[test]
    fn test_existing_ids_pass_through() {
        let mut anchors = vec![anchor("b", 1), anchor("a", 2)];
        anchors[0].anchor_int_id = Some(40);
        anchors[1].anchor_int_id = Some(41);
        let out = assign_stable_identity(anchors.clone()).unwrap();
        assert_eq!(out, anchors);
        // idempotent
        assert_eq!(assign_stable_identity(out.clone()).unwrap(), out);
    }

    #[test]
    fn test_partial_id_column_rejected() {
        let mut anchors = vec![anchor("b", 1), anchor("a", 2)];
        anchors[0].anchor_int_id = Some(0);
        assert!(assign_stable_identity(anchors).is_err());
    }

    #[test]
    fn test_map_anchors_to_nodes() {
        let original_id = vec![100, 200, 300, 400];
        let anchors = assign_stable_identity(vec![
            anchor("c", 300),
            anchor("a", 100),
            anchor("b", 999), // not in graph
            anchor("d", 300), // same node as "c"
        ])
        .unwrap();

        let map = map_anchors_to_nodes(&anchors, &original_id).unwrap();
        assert_eq!(map.slots, vec![0, NO_ANCHOR, 2, NO_ANCHOR]);
        assert_eq!(map.skipped, 1);
        assert_eq!(map.occupied().collect::<Vec<_>>(), vec![(0, 0), (2, 2)]);
    }

    #[test]
    fn test_map_requires_assigned_ids() {
        assert!(map_anchors_to_nodes(&[anchor("a", 1)], &[1]).is_err());
    }
}
