//! Application-level values bound to parameters and returned from results

use crate::param::DbType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    Bool(bool),
    /// Signed integer of any width
    SignedInt(i64),
    /// Unsigned integer of any width
    UnsignedInt(u64),
    /// 4-byte floating point
    Float(f32),
    /// 8-byte floating point
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The logical type a provider should assume when the parameter declares none
    ///
    /// Returns `None` for NULL, which carries no type information.
    pub fn db_type(&self) -> Option<DbType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DbType::Boolean),
            Value::SignedInt(_) | Value::UnsignedInt(_) => Some(DbType::BigInt),
            Value::Float(_) => Some(DbType::Float),
            Value::Double(_) => Some(DbType::Double),
            Value::Text(_) => Some(DbType::Text),
            Value::Bytes(_) => Some(DbType::Binary),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SignedInt(v) => Some(*v),
            Value::UnsignedInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            Value::Text(v) => Some(v.as_bytes()),
            _ => None,
        }
    }
}

// ============================================================================
// Integer conversions
// ============================================================================

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::SignedInt(i64::from(v))
                }
            }
        )*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::UnsignedInt(u64::from(v))
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

// ============================================================================
// Other scalars
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

// ============================================================================
// String and byte conversions
// ============================================================================

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// `None` binds as NULL
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Result column metadata reported by a native reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub db_type: Option<DbType>,
}

impl Column {
    pub fn new(name: impl Into<String>, db_type: Option<DbType>) -> Self {
        Self {
            name: name.into(),
            db_type,
        }
    }
}

/// One row of a streaming result, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}
