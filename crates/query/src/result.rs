//! Query result types
//!
//! Backend-agnostic result format: column definitions plus rows of JSON values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result row keyed by column name
pub type Record = Map<String, Value>;

/// Unified query result across all backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column definitions
    pub columns: Vec<Column>,

    /// Row data as JSON values, in column order
    pub rows: Vec<Vec<Value>>,

    /// Total row count
    pub row_count: usize,

    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from keyed records
    ///
    /// Columns are taken from the first record; later records are read in that
    /// column order, with absent keys becoming `null`.
    pub fn from_records(records: Vec<Record>) -> Self {
        let Some(first) = records.first() else {
            return Self::empty();
        };

        let columns: Vec<Column> = first
            .iter()
            .map(|(name, value)| Column::new(name.clone(), DataType::infer(value), true))
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(&c.name).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self::new(columns, rows, 0)
    }

    /// Check if result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rows as name → value maps
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.name.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }

    /// First row as a name → value map, if any
    pub fn first_record(&self) -> Option<Record> {
        self.rows.first().map(|row| {
            self.columns
                .iter()
                .zip(row.iter())
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect()
        })
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Data type
    pub data_type: DataType,

    /// Whether the column is nullable
    pub nullable: bool,
}

impl Column {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Data types supported in query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 64-bit floating point
    Float64,
    /// UTF-8 string
    String,
    /// Boolean
    Boolean,
    /// JSON object or array
    Json,
    /// Unknown/other type
    Unknown,
}

impl DataType {
    /// Infer a data type from a JSON value
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => DataType::Unknown,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) => {
                if n.is_f64() {
                    DataType::Float64
                } else if n.is_u64() {
                    DataType::UInt64
                } else {
                    DataType::Int64
                }
            }
            Value::String(_) => DataType::String,
            Value::Array(_) | Value::Object(_) => DataType::Json,
        }
    }
}
