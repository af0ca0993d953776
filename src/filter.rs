// Query filtering over indexed record fields

/// Value types that can be stored in a secondary index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Project a JSON field into an indexable value.
    ///
    /// Strings, integers, and booleans are indexed; anything else (null,
    /// floats, arrays, objects) is skipped rather than indexed lossily.
    pub fn from_json(value: &serde_json::Value) -> Option<IndexValue> {
        match value {
            serde_json::Value::String(s) => Some(IndexValue::String(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(IndexValue::Int),
            serde_json::Value::Bool(b) => Some(IndexValue::Bool(*b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Filter for querying records on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field name to filter on
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: IndexValue,
}

impl Filter {
    /// Equality filter, the common case for store queries.
    pub fn eq(field: &str, value: IndexValue) -> Filter {
        Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// Comparison operators for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,       // ==
    Ne,       // !=
    Gt,       // >
    Lt,       // <
    Gte,      // >=
    Lte,      // <=
    Contains, // LIKE %value%
}

impl FilterOp {
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
            FilterOp::Contains => "LIKE",
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
