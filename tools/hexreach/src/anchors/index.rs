//! Anchor index builder: per-mode stable id <-> compact id table

use hexreach_common::{Error, Result};
use std::collections::BTreeMap;

use super::{sorted_distinct_ids, Anchor, Mode};

/// Ordered stable ids of one mode; `anchor_int_id` is the position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorIndex {
    pub mode: Mode,
    pub stable_ids: Vec<String>,
}

impl AnchorIndex {
    /// Deduplicate the stable ids of `mode`, sort ascending, number by position
    pub fn from_anchors(mode: Mode, anchors: &[Anchor]) -> Self {
        let stable_ids = sorted_distinct_ids(
            anchors
                .iter()
                .filter(|a| a.mode == mode)
                .map(|a| a.stable_id.as_str()),
        );
        Self { mode, stable_ids }
    }

    pub fn len(&self) -> usize {
        self.stable_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stable_ids.is_empty()
    }

    pub fn id_of(&self, stable_id: &str) -> Option<u32> {
        self.stable_ids
            .binary_search_by(|probe| probe.as_str().cmp(stable_id))
            .ok()
            .map(|pos| pos as u32)
    }

    pub fn stable_id(&self, anchor_int_id: u32) -> Option<&str> {
        self.stable_ids.get(anchor_int_id as usize).map(String::as_str)
    }

    /// Check every anchor of this mode carries the id this index assigns it
    ///
    /// Pre-assigned ids that disagree would leave node maps pointing at rows
    /// of another anchor, so they are rejected rather than written.
    pub fn check_consistent(&self, anchors: &[Anchor]) -> Result<()> {
        if u32::try_from(self.len()).is_err() {
            return Err(Error::Overflow(format!(
                "{} {} anchors exceed u32 ids",
                self.len(),
                self.mode
            )));
        }
        for anchor in anchors.iter().filter(|a| a.mode == self.mode) {
            let expected = self.id_of(&anchor.stable_id);
            if anchor.anchor_int_id != expected {
                return Err(Error::InvalidInput(format!(
                    "anchor '{}' ({}) has anchor_int_id {:?}, index assigns {:?}",
                    anchor.stable_id, self.mode, anchor.anchor_int_id, expected
                )));
            }
        }
        Ok(())
    }
}

/// One index per mode present in `anchors`
pub fn build_anchor_indexes(anchors: &[Anchor]) -> BTreeMap<Mode, AnchorIndex> {
    let mut indexes = BTreeMap::new();
    for mode in Mode::ALL {
        if anchors.iter().any(|a| a.mode == mode) {
            indexes.insert(mode, AnchorIndex::from_anchors(mode, anchors));
        }
    }
    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::assign_stable_identity;

    fn anchor(id: &str, mode: Mode) -> Anchor {
        Anchor {
            stable_id: id.to_string(),
            node_id: 1,
            mode,
            anchor_int_id: None,
        }
    }

    #[test]
    fn test_index_per_mode() {
        let anchors = vec![
            anchor("z", Mode::Drive),
            anchor("m", Mode::Walk),
            anchor("a", Mode::Drive),
            anchor("a", Mode::Drive),
        ];
        let indexes = build_anchor_indexes(&anchors);
        assert_eq!(indexes.len(), 2);
        assert!(!indexes.contains_key(&Mode::Bike));

        let drive = &indexes[&Mode::Drive];
        assert_eq!(drive.stable_ids, vec!["a", "z"]);
        assert_eq!(drive.id_of("z"), Some(1));
        assert_eq!(drive.id_of("m"), None);
        assert_eq!(drive.stable_id(0), Some("a"));

        assert_eq!(indexes[&Mode::Walk].stable_ids, vec!["m"]);
    }

    #[test]
    fn test_index_agrees_with_identity_manager() {
        let anchors: Vec<Anchor> = ["delta", "alpha", "charlie", "bravo"]
            .iter()
            .map(|id| anchor(id, Mode::Bike))
            .collect();
        let assigned = assign_stable_identity(anchors.clone()).unwrap();
        let index = AnchorIndex::from_anchors(Mode::Bike, &anchors);
        index.check_consistent(&assigned).unwrap();
    }

    #[test]
    fn test_conflicting_preassigned_ids_rejected() {
        let mut anchors = vec![anchor("a", Mode::Drive), anchor("b", Mode::Drive)];
        anchors[0].anchor_int_id = Some(1);
        anchors[1].anchor_int_id = Some(0);
        let index = AnchorIndex::from_anchors(Mode::Drive, &anchors);
        assert!(index.check_consistent(&anchors).is_err());
    }
}
