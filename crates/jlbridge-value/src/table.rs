//! Tables, matrices and named vectors

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::{homogeneity, ElementClass, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// A column's length differs from the table's row count.
    LengthMismatch { column: String, expected: usize, got: usize },
    DuplicateColumn(String),
    /// Matrix data does not fill `rows * cols` cells.
    ShapeMismatch { expected: usize, got: usize },
    /// A table column cannot become a numeric matrix column.
    NonNumericColumn(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { column, expected, got } => write!(
                f,
                "column {:?} has {} rows, expected {}",
                column, got, expected
            ),
            Self::DuplicateColumn(name) => write!(f, "duplicate column {:?}", name),
            Self::ShapeMismatch { expected, got } => {
                write!(f, "expected {} cells, got {}", expected, got)
            }
            Self::NonNumericColumn(name) => write!(f, "column {:?} is not numeric", name),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TableError {}

// ============================================================================
// Columns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
    Mixed,
}

/// One typed table column. `None` cells are missing values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Column {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    /// Cells of differing types. Cannot be written to a columnar file as is.
    Mixed(Vec<Value>),
}

impl Column {
    /// Infer the narrowest column type for `cells`.
    ///
    /// Ints and floats share a float column; bools only share a column with
    /// bools. Anything else ends up in [`Column::Mixed`].
    pub fn from_values(cells: Vec<Value>) -> Column {
        let non_null = || cells.iter().filter(|c| !c.is_null());
        if non_null().all(|c| matches!(c, Value::Int(_))) && non_null().next().is_some() {
            return Column::Int(cells.iter().map(Value::as_i64).collect());
        }
        if non_null().all(|c| matches!(c, Value::Int(_) | Value::Float(_))) {
            return Column::Float(cells.iter().map(Value::as_f64).collect());
        }
        if non_null().all(|c| matches!(c, Value::Bool(_))) {
            return Column::Bool(cells.iter().map(Value::as_bool).collect());
        }
        if non_null().all(|c| matches!(c, Value::Text(_))) {
            return Column::Text(cells.iter().map(|c| c.as_str().map(String::from)).collect());
        }
        Column::Mixed(cells)
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Int(_) => ColumnKind::Int,
            Column::Float(_) => ColumnKind::Float,
            Column::Bool(_) => ColumnKind::Bool,
            Column::Text(_) => ColumnKind::Text,
            Column::Mixed(_) => ColumnKind::Mixed,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(cells) => cells.len(),
            Column::Float(cells) => cells.len(),
            Column::Bool(cells) => cells.len(),
            Column::Text(cells) => cells.len(),
            Column::Mixed(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell(&self, row: usize) -> Option<Value> {
        let cell = match self {
            Column::Int(cells) => cells.get(row)?.map(Value::Int),
            Column::Float(cells) => cells.get(row)?.map(Value::Float),
            Column::Bool(cells) => cells.get(row)?.map(Value::Bool),
            Column::Text(cells) => cells.get(row)?.clone().map(Value::Text),
            Column::Mixed(cells) => return cells.get(row).cloned(),
        };
        Some(cell.unwrap_or(Value::Null))
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|row| self.cell(row)).collect()
    }

    /// Coerce a column into something a columnar writer accepts.
    ///
    /// Typed columns are returned unchanged. A mixed column whose cells are
    /// all bools or numbers becomes a float column; any other mixed column
    /// becomes text.
    pub fn coerced(&self) -> Column {
        let Column::Mixed(cells) = self else {
            return self.clone();
        };
        match homogeneity(cells, true) {
            Some(ElementClass::Numeric) => {
                Column::Float(
                    cells
                        .iter()
                        .map(|c| match c {
                            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                            other => other.as_f64(),
                        })
                        .collect(),
                )
            }
            _ => Column::Text(cells.iter().map(Value::display_text).collect()),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// Column store with named, ordered columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    columns: Vec<(String, Column)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_from_columns(columns: Vec<(String, Column)>) -> Result<Self, TableError> {
        let mut table = Table::new();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), TableError> {
        let name = name.into();
        if self.columns.iter().any(|(existing, _)| *existing == name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if let Some((_, first)) = self.columns.first() {
            if first.len() != column.len() {
                return Err(TableError::LengthMismatch {
                    column: name,
                    expected: first.len(),
                    got: column.len(),
                });
            }
        }
        self.columns.push((name, column));
        Ok(())
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// True when every column has a concrete type.
    pub fn is_uniform(&self) -> bool {
        self.columns.iter().all(|(_, c)| c.kind() != ColumnKind::Mixed)
    }

    /// Copy of the table with every mixed column coerced (see [`Column::coerced`]).
    pub fn coerced(&self) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.coerced()))
                .collect(),
        }
    }
}

// ============================================================================
// Matrix
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatrixData {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl MatrixData {
    fn len(&self) -> usize {
        match self {
            MatrixData::Int(cells) => cells.len(),
            MatrixData::Float(cells) => cells.len(),
        }
    }
}

/// Two-dimensional homogeneous numeric array, stored row-major.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: MatrixData,
}

impl Matrix {
    pub fn try_new(rows: usize, cols: usize, data: MatrixData) -> Result<Self, TableError> {
        if data.len() != rows * cols {
            return Err(TableError::ShapeMismatch {
                expected: rows * cols,
                got: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a float matrix from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, TableError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let nrows = rows.len();
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Matrix::try_new(nrows, cols, MatrixData::Float(data))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &MatrixData {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Value> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let index = row * self.cols + col;
        match &self.data {
            MatrixData::Int(cells) => cells.get(index).map(|v| Value::Int(*v)),
            MatrixData::Float(cells) => cells.get(index).map(|v| Value::Float(*v)),
        }
    }

    /// Column-per-column table with columns named `"0"`, `"1"`, ...
    pub fn to_table(&self) -> Table {
        let columns = (0..self.cols)
            .map(|c| {
                let column = match &self.data {
                    MatrixData::Int(cells) => Column::Int(
                        (0..self.rows).map(|r| Some(cells[r * self.cols + c])).collect(),
                    ),
                    MatrixData::Float(cells) => Column::Float(
                        (0..self.rows).map(|r| Some(cells[r * self.cols + c])).collect(),
                    ),
                };
                (c.to_string(), column)
            })
            .collect();
        Table { columns }
    }

    /// Rebuild a matrix from a table, taking columns in order.
    ///
    /// An all-int table yields an int matrix. Float columns (or a mix of int
    /// and float columns) yield a float matrix, with missing cells as NaN.
    pub fn from_table(table: &Table) -> Result<Self, TableError> {
        let rows = table.nrows();
        let cols = table.ncols();
        let all_int = table
            .columns()
            .iter()
            .all(|(_, c)| matches!(c, Column::Int(cells) if cells.iter().all(Option::is_some)));

        if all_int {
            let mut data = Vec::with_capacity(rows * cols);
            for r in 0..rows {
                for (_, column) in table.columns() {
                    if let Column::Int(cells) = column {
                        data.push(cells[r].unwrap_or_default());
                    }
                }
            }
            return Matrix::try_new(rows, cols, MatrixData::Int(data));
        }

        for (name, column) in table.columns() {
            if !matches!(column, Column::Int(_) | Column::Float(_)) {
                return Err(TableError::NonNumericColumn(name.clone()));
            }
        }
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for (_, column) in table.columns() {
                let cell = match column {
                    Column::Int(cells) => cells[r].map(|v| v as f64),
                    Column::Float(cells) => cells[r],
                    _ => None,
                };
                data.push(cell.unwrap_or(f64::NAN));
            }
        }
        Matrix::try_new(rows, cols, MatrixData::Float(data))
    }
}

// ============================================================================
// Named vector
// ============================================================================

/// Values with one text label each, like a labelled series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NamedVector {
    labels: Vec<String>,
    values: Vec<Value>,
}

impl NamedVector {
    pub fn try_new(labels: Vec<String>, values: Vec<Value>) -> Result<Self, TableError> {
        if labels.len() != values.len() {
            return Err(TableError::LengthMismatch {
                column: "labels".to_string(),
                expected: values.len(),
                got: labels.len(),
            });
        }
        Ok(Self { labels, values })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| &self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
