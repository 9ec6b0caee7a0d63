//! Staged transfer files
//!
//! Tables and matrices are too large (and too typed) for inline literals.
//! They cross the boundary as a columnar file on disk: Feather v2, which is
//! the Arrow IPC file format.
//!
//! ```text
//!   host ── write_table ──▶ /tmp/jlbridge-XXXX.feather ──▶ Arrow.Table (guest)
//!   guest ── Arrow.write ─▶ /tmp/jl_XXXX.feather ── read_table ──▶ host
//! ```
//!
//! A [`StagedFile`] owns its path. It is read at most once (reading consumes
//! it) and the file is removed when the handle is dropped, unless ownership
//! is handed on with [`StagedFile::keep`].

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use jlbridge_value::{Column, Table, TableError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::StagingConfig;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// The column holds cells of more than one type.
    #[error("Column '{0}' has mixed cell types")]
    ColumnType(String),

    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn { column: String, data_type: String },

    #[error("Invalid table: {0}")]
    Table(#[from] TableError),

    /// A path handed over by the guest does not look like a staged file.
    #[error("Refusing to adopt {0}")]
    Rejected(PathBuf),
}

/// Temporary columnar file owned by one transfer.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    owned: bool,
}

impl StagedFile {
    /// Reserve a fresh, unique path in the staging directory.
    pub fn create(config: &StagingConfig) -> Result<Self, StageError> {
        let temp = tempfile::Builder::new()
            .prefix(&config.prefix)
            .suffix(&config.suffix)
            .tempfile_in(config.dir())?;
        let path = temp.into_temp_path().keep().map_err(|e| e.error)?;
        debug!(path = %path.display(), "created staged file");
        Ok(Self { path, owned: true })
    }

    /// Take ownership of a file the guest wrote.
    pub fn adopt(path: impl Into<PathBuf>, config: &StagingConfig) -> Result<Self, StageError> {
        let path = path.into();
        if !config.accepts(&path) {
            return Err(StageError::Rejected(path));
        }
        Ok(Self { path, owned: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Give up ownership; the file outlives this handle.
    pub fn keep(mut self) -> PathBuf {
        self.owned = false;
        std::mem::take(&mut self.path)
    }

    pub fn write_table(&self, table: &Table) -> Result<(), StageError> {
        let mut fields = Vec::with_capacity(table.ncols());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.ncols());
        for (name, column) in table.columns() {
            let array = column_to_array(name, column)?;
            let nullable = array.null_count() > 0;
            fields.push(Field::new(name.as_str(), array.data_type().clone(), nullable));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(table.nrows()));
        let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)?;

        let file = File::create(&self.path)?;
        let mut writer = FileWriter::try_new(file, &schema)?;
        writer.write(&batch)?;
        writer.finish()?;
        debug!(
            path = %self.path.display(),
            rows = table.nrows(),
            cols = table.ncols(),
            "wrote staged table"
        );
        Ok(())
    }

    /// Read the file back. Consumes the handle, so a staged file is never
    /// read twice; the file is removed afterwards.
    pub fn read_table(self) -> Result<Table, StageError> {
        read_table_at(&self.path)
    }
}

/// Read a Feather file without taking ownership of it; the file is left in
/// place.
pub fn read_table_at(path: &Path) -> Result<Table, StageError> {
    let reader = FileReader::try_new(File::open(path)?, None)?;
    let schema = reader.schema();
    let mut columns: Vec<(String, Column)> = schema
        .fields()
        .iter()
        .map(|field| Ok((field.name().clone(), empty_column(field)?)))
        .collect::<Result<_, StageError>>()?;

    for batch in reader {
        let batch = batch?;
        for ((name, column), array) in columns.iter_mut().zip(batch.columns()) {
            append_array(name, column, array.as_ref())?;
        }
    }
    debug!(path = %path.display(), "read staged table");
    Ok(Table::try_from_columns(columns)?)
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove staged file");
            }
        }
    }
}

// ============================================================================
// Column <-> Arrow array
// ============================================================================

fn column_to_array(name: &str, column: &Column) -> Result<ArrayRef, StageError> {
    let array: ArrayRef = match column {
        Column::Int(cells) => Arc::new(Int64Array::from(cells.clone())),
        Column::Float(cells) => Arc::new(Float64Array::from(cells.clone())),
        Column::Bool(cells) => Arc::new(BooleanArray::from(cells.clone())),
        Column::Text(cells) => Arc::new(StringArray::from(cells.clone())),
        Column::Mixed(_) => return Err(StageError::ColumnType(name.to_string())),
    };
    Ok(array)
}

fn unsupported(name: &str, data_type: &DataType) -> StageError {
    StageError::UnsupportedColumn {
        column: name.to_string(),
        data_type: data_type.to_string(),
    }
}

fn empty_column(field: &Field) -> Result<Column, StageError> {
    Ok(match field.data_type() {
        DataType::Int64 | DataType::Int32 => Column::Int(Vec::new()),
        DataType::Float64 | DataType::Float32 => Column::Float(Vec::new()),
        DataType::Boolean => Column::Bool(Vec::new()),
        DataType::Utf8 | DataType::LargeUtf8 => Column::Text(Vec::new()),
        other => return Err(unsupported(field.name(), other)),
    })
}

fn downcast<'a, T: 'static>(name: &str, array: &'a dyn Array) -> Result<&'a T, StageError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| unsupported(name, array.data_type()))
}

fn append_array(name: &str, column: &mut Column, array: &dyn Array) -> Result<(), StageError> {
    match (column, array.data_type()) {
        (Column::Int(cells), DataType::Int64) => {
            cells.extend(downcast::<Int64Array>(name, array)?.iter())
        }
        (Column::Int(cells), DataType::Int32) => {
            cells.extend(downcast::<Int32Array>(name, array)?.iter().map(|v| v.map(i64::from)))
        }
        (Column::Float(cells), DataType::Float64) => {
            cells.extend(downcast::<Float64Array>(name, array)?.iter())
        }
        (Column::Float(cells), DataType::Float32) => {
            cells.extend(downcast::<Float32Array>(name, array)?.iter().map(|v| v.map(f64::from)))
        }
        (Column::Bool(cells), DataType::Boolean) => {
            cells.extend(downcast::<BooleanArray>(name, array)?.iter())
        }
        (Column::Text(cells), DataType::Utf8) => cells.extend(
            downcast::<StringArray>(name, array)?
                .iter()
                .map(|v| v.map(str::to_string)),
        ),
        (Column::Text(cells), DataType::LargeUtf8) => cells.extend(
            downcast::<LargeStringArray>(name, array)?
                .iter()
                .map(|v| v.map(str::to_string)),
        ),
        (_, other) => return Err(unsupported(name, other)),
    }
    Ok(())
}
