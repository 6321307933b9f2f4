//! Anchor tables as Arrow IPC streams
//!
//! `anchor_index.<mode>.arrow`: anchor_int_id UInt32, anchor_stable_id Utf8,
//! ordered by anchor_int_id.
//!
//! `anchor_nodes.<mode>.arrow`: anchor_id UInt32, mode Utf8, node_id Int64,
//! one row per anchor resolved onto the graph, ordered by (anchor_id, node_id).

use arrow::array::{ArrayRef, Int64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hexreach_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::arrow_io::{arrow_err, read_batches, typed_column, write_batch};
use crate::anchors::{AnchorIndex, Mode};

pub struct AnchorIndexFile;

impl AnchorIndexFile {
    pub fn path(dir: &Path, mode: Mode) -> PathBuf {
        dir.join(format!("anchor_index.{mode}.arrow"))
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("anchor_int_id", DataType::UInt32, false),
            Field::new("anchor_stable_id", DataType::Utf8, false),
        ]))
    }

    /// Encode an index; identical indexes give identical bytes
    pub fn to_batch(index: &AnchorIndex) -> Result<RecordBatch> {
        let ids: Vec<u32> = (0..index.len())
            .map(|i| {
                u32::try_from(i).map_err(|_| Error::Overflow(format!("anchor id {i} exceeds u32")))
            })
            .collect::<Result<_>>()?;
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(ids)),
            Arc::new(StringArray::from_iter_values(index.stable_ids.iter())),
        ];
        RecordBatch::try_new(Self::schema(), columns)
            .map_err(|e| Error::Arrow(format!("anchor index batch: {e}")))
    }

    /// Write `anchor_index.<mode>.arrow` into `dir`
    pub fn write(dir: &Path, index: &AnchorIndex) -> Result<PathBuf> {
        let path = Self::path(dir, index.mode);
        write_batch(&path, &Self::to_batch(index)?)?;
        tracing::info!(
            path = %path.display(),
            mode = %index.mode,
            anchors = index.len(),
            "wrote anchor index"
        );
        Ok(path)
    }

    /// Read an index back, checking ids are exactly 0..K-1 over ascending stable ids
    pub fn read(path: &Path, mode: Mode) -> Result<AnchorIndex> {
        let (_, batches) = read_batches(path)?;
        let mut stable_ids = Vec::new();
        for batch in &batches {
            let ids: &UInt32Array = typed_column(path, batch, "anchor_int_id")?;
            let names: &StringArray = typed_column(path, batch, "anchor_stable_id")?;
            for row in 0..batch.num_rows() {
                if ids.value(row) as usize != stable_ids.len() {
                    return Err(Error::Format {
                        path: path.to_path_buf(),
                        reason: format!(
                            "anchor_int_id {} at row {} is not dense",
                            ids.value(row),
                            stable_ids.len()
                        ),
                    });
                }
                stable_ids.push(names.value(row).to_string());
            }
        }
        if stable_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Format {
                path: path.to_path_buf(),
                reason: "anchor_stable_id not strictly ascending".to_string(),
            });
        }
        Ok(AnchorIndex { mode, stable_ids })
    }
}

/// One resolved anchor: `(anchor_id, node_id)`
pub type AnchorNodeRow = (u32, i64);

pub struct AnchorNodesFile;

impl AnchorNodesFile {
    pub fn path(dir: &Path, mode: Mode) -> PathBuf {
        dir.join(format!("anchor_nodes.{mode}.arrow"))
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("anchor_id", DataType::UInt32, false),
            Field::new("mode", DataType::Utf8, false),
            Field::new("node_id", DataType::Int64, false),
        ]))
    }

    /// Write resolved anchors; every id must exist in `index`
    pub fn write(
        dir: &Path,
        index: &AnchorIndex,
        rows: &[AnchorNodeRow],
    ) -> Result<PathBuf> {
        let path = Self::path(dir, index.mode);
        if let Some((orphan, _)) = rows.iter().find(|(id, _)| index.stable_id(*id).is_none()) {
            return Err(Error::InvalidInput(format!(
                "anchor_id {orphan} not present in the {} anchor index",
                index.mode
            )));
        }

        let mut rows = rows.to_vec();
        rows.sort_unstable();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(StringArray::from_iter_values(
                std::iter::repeat(index.mode.as_str()).take(rows.len()),
            )),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.1))),
        ];
        let batch = RecordBatch::try_new(Self::schema(), columns).map_err(|e| arrow_err(&path, e))?;
        write_batch(&path, &batch)?;

        tracing::info!(
            path = %path.display(),
            mode = %index.mode,
            rows = rows.len(),
            "wrote anchor nodes"
        );
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Vec<(u32, Mode, i64)>> {
        let (_, batches) = read_batches(path)?;
        let mut out = Vec::new();
        for batch in &batches {
            let ids: &UInt32Array = typed_column(path, batch, "anchor_id")?;
            let modes: &StringArray = typed_column(path, batch, "mode")?;
            let nodes: &Int64Array = typed_column(path, batch, "node_id")?;
            for row in 0..batch.num_rows() {
                out.push((ids.value(row), modes.value(row).parse()?, nodes.value(row)));
            }
        }
        Ok(out)
    }
}
