//! Arrow IPC stream helpers shared by the anchor index and minute matrices
//!
//! Files are whole Arrow IPC streams (schema + record batches) so DuckDB,
//! Polars or pyarrow can read them directly.

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::SchemaRef;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use hexreach_common::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::write_atomic;

pub(crate) fn arrow_err(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Arrow(format!("{}: {e}", path.display()))
}

/// Serialize one RecordBatch to IPC stream bytes
pub fn batch_to_bytes(
    batch: &RecordBatch,
) -> std::result::Result<Vec<u8>, arrow::error::ArrowError> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, batch.schema_ref())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Write one RecordBatch as an IPC stream file, atomically
pub fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let bytes = batch_to_bytes(batch).map_err(|e| arrow_err(path, e))?;
    write_atomic(path, &bytes)
}

/// Read every batch of an IPC stream file
pub fn read_batches(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let reader = StreamReader::try_new(BufReader::new(File::open(path)?), None)
        .map_err(|e| arrow_err(path, e))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| arrow_err(path, e))?;
    Ok((schema, batches))
}

/// Fetch a column by name and downcast it, reporting missing or mistyped columns
pub fn typed_column<'a, A: Array + 'static>(
    path: &Path,
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a A> {
    let column: &ArrayRef = batch.column_by_name(name).ok_or_else(|| Error::MissingColumn {
        column: name.to_string(),
        input: path.display().to_string(),
    })?;
    column.as_any().downcast_ref::<A>().ok_or_else(|| Error::Format {
        path: path.to_path_buf(),
        reason: format!(
            "column '{name}' has type {}, expected {}",
            column.data_type(),
            std::any::type_name::<A>()
        ),
    })
}
