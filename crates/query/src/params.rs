//! Bound query parameters
//!
//! Request values never appear in SQL text. Builders bind each value here and
//! splice the returned `{name:Type}` placeholder into the statement; backends
//! ship the values separately (ClickHouse reads them from `param_<name>`).

use std::fmt;

use serde::Serialize;

use crate::error::QueryError;

/// ClickHouse type of a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    String,
    Date,
    Float64,
    Int64,
    UInt64,
}

impl ParamType {
    /// ClickHouse type name used inside the placeholder
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Date => "Date",
            Self::Float64 => "Float64",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub param_type: ParamType,
    pub value: String,
}

impl QueryParam {
    /// Placeholder text for this parameter (`{name:Type}`)
    pub fn placeholder(&self) -> String {
        format!("{{{}:{}}}", self.name, self.param_type)
    }
}

/// Ordered set of named parameters for one statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams {
    params: Vec<QueryParam>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under the next generated name (`p0`, `p1`, ...)
    ///
    /// Returns the placeholder to embed in SQL.
    pub fn bind(&mut self, param_type: ParamType, value: impl Into<String>) -> String {
        let mut index = self.params.len();
        while self.get(&format!("p{}", index)).is_some() {
            index += 1;
        }

        let param = QueryParam {
            name: format!("p{}", index),
            param_type,
            value: value.into(),
        };
        let placeholder = param.placeholder();
        self.params.push(param);
        placeholder
    }

    /// Bind a value under an explicit name
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        param_type: ParamType,
        value: impl Into<String>,
    ) -> Result<String, QueryError> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(QueryError::InvalidParam(format!(
                "parameter name '{}' must be alphanumeric",
                name
            )));
        }
        if self.get(&name).is_some() {
            return Err(QueryError::InvalidParam(format!(
                "parameter '{}' bound twice",
                name
            )));
        }

        let param = QueryParam {
            name,
            param_type,
            value: value.into(),
        };
        let placeholder = param.placeholder();
        self.params.push(param);
        Ok(placeholder)
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&QueryParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
