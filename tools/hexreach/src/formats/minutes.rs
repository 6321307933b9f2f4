//! Per-region minutes matrix: `h3_cell` UInt64 plus one nullable UInt16 column per brand
//!
//! Null means "no value yet" (unreachable or never computed). Row and column
//! order are preserved across read/write so an untouched matrix rewrites to
//! the same bytes.

use arrow::array::{Array, ArrayRef, UInt16Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hexreach_common::{Error, Result};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

use super::arrow_io::{arrow_err, read_batches, typed_column, write_batch};

pub const CELL_COLUMN: &str = "h3_cell";

/// A brand name usable as a minute column
pub fn check_brand(brand: &str) -> Result<()> {
    if brand.is_empty() || brand == CELL_COLUMN {
        return Err(Error::InvalidInput(format!(
            "'{brand}' cannot be used as a brand column"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinutesColumn {
    pub name: String,
    pub values: Vec<Option<u16>>,
}

#[derive(Debug, Clone, Default)]
pub struct MinutesMatrix {
    cells: Vec<u64>,
    columns: Vec<MinutesColumn>,
    row_of: FxHashMap<u64, usize>,
}

impl MinutesMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    pub fn columns(&self) -> &[MinutesColumn] {
        &self.columns
    }

    pub fn get(&self, cell: u64, brand: &str) -> Option<u16> {
        let row = *self.row_of.get(&cell)?;
        self.columns
            .iter()
            .find(|c| c.name == brand)
            .and_then(|c| c.values[row])
    }

    /// Index of `brand`'s column, appending an all-null column if absent
    pub fn column_index(&mut self, brand: &str) -> Result<usize> {
        check_brand(brand)?;
        if let Some(i) = self.columns.iter().position(|c| c.name == brand) {
            return Ok(i);
        }
        self.columns.push(MinutesColumn {
            name: brand.to_string(),
            values: vec![None; self.cells.len()],
        });
        Ok(self.columns.len() - 1)
    }

    /// Row of `cell`, appending an all-null row if absent
    pub fn row_index(&mut self, cell: u64) -> usize {
        if let Some(&row) = self.row_of.get(&cell) {
            return row;
        }
        let row = self.cells.len();
        self.cells.push(cell);
        for column in &mut self.columns {
            column.values.push(None);
        }
        self.row_of.insert(cell, row);
        row
    }

    pub fn value_mut(&mut self, column: usize, row: usize) -> &mut Option<u16> {
        &mut self.columns[column].values[row]
    }

    pub fn to_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(CELL_COLUMN, DataType::UInt64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from(self.cells.clone()))];
        for column in &self.columns {
            fields.push(Field::new(&column.name, DataType::UInt16, true));
            arrays.push(Arc::new(UInt16Array::from(column.values.clone())));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| Error::Arrow(format!("minutes batch: {e}")))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_batch(path, &self.to_batch()?)?;
        tracing::debug!(
            path = %path.display(),
            rows = self.cells.len(),
            columns = self.columns.len(),
            "wrote minutes matrix"
        );
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let (schema, batches) = read_batches(path)?;
        if schema.column_with_name(CELL_COLUMN).is_none() {
            return Err(Error::MissingColumn {
                column: CELL_COLUMN.to_string(),
                input: path.display().to_string(),
            });
        }

        let mut matrix = Self::new();
        for field in schema.fields().iter().filter(|f| f.name() != CELL_COLUMN) {
            if field.data_type() != &DataType::UInt16 {
                return Err(Error::Format {
                    path: path.to_path_buf(),
                    reason: format!(
                        "minutes column '{}' has type {}, expected UInt16",
                        field.name(),
                        field.data_type()
                    ),
                });
            }
            matrix.columns.push(MinutesColumn {
                name: field.name().clone(),
                values: Vec::new(),
            });
        }

        for batch in &batches {
            let cells: &UInt64Array = typed_column(path, batch, CELL_COLUMN)?;
            if cells.null_count() > 0 {
                return Err(arrow_err(path, "null h3_cell"));
            }
            for &cell in cells.values().iter() {
                let row = matrix.cells.len();
                if matrix.row_of.insert(cell, row).is_some() {
                    return Err(Error::Format {
                        path: path.to_path_buf(),
                        reason: format!("duplicate h3_cell {cell:#x}"),
                    });
                }
                matrix.cells.push(cell);
            }
            for column in &mut matrix.columns {
                let values: &UInt16Array = typed_column(path, batch, &column.name)?;
                column.values.extend(values.iter());
            }
        }

        tracing::debug!(path = %path.display(), rows = matrix.cells.len(), "read minutes matrix");
        Ok(matrix)
    }
}
