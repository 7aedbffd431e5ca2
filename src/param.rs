use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use auto_impl::auto_impl;

use crate::error::{Error, Result};
use crate::native::NativeCommand;
use crate::value::Value;

/// Logical parameter/column type handed to the provider as a mapping hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Binary,
    Date,
    Time,
    DateTime,
    Uuid,
    Json,
}

/// Parameter direction
///
/// Only input parameters are bound by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Direction {
    #[default]
    Input,
}

/// Immutable description of one bound value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    db_type: Option<DbType>,
    direction: Direction,
}

impl Parameter {
    /// An input parameter whose type is inferred from the bound value
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: None,
            direction: Direction::Input,
        }
    }

    pub fn typed(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type: Some(db_type),
            direction: Direction::Input,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_type(&self) -> Option<DbType> {
        self.db_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Write `value` into the native command's parameter collection
    ///
    /// The declared type wins over the value's own type; NULL values of an
    /// untyped parameter are passed with no type.
    pub fn bind<N: NativeCommand + ?Sized>(&self, native: &mut N, value: Value) -> Result<()> {
        let db_type = self.db_type.or_else(|| value.db_type());
        native
            .add_parameter(NativeParameter {
                name: &self.name,
                db_type,
                direction: self.direction,
                value,
            })
            .map_err(|source| Error::BindError {
                name: self.name.clone(),
                source,
            })
    }
}

/// A parameter as seen by the provider: the declaration plus its resolved value
#[derive(Debug, Clone, PartialEq)]
pub struct NativeParameter<'a> {
    pub name: &'a str,
    pub db_type: Option<DbType>,
    pub direction: Direction,
    pub value: Value,
}

/// Resolves parameter names to the values bound for one call
///
/// Type mapping of application values happens before this point; the
/// resolver only hands out [`Value`]s.
#[auto_impl(&, Box, Arc)]
pub trait ParameterValues: Send + Sync {
    fn value(&self, name: &str) -> Option<Value>;
}

/// No values
impl ParameterValues for () {
    fn value(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl<K, S> ParameterValues for HashMap<K, Value, S>
where
    K: Borrow<str> + Hash + Eq + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<K> ParameterValues for BTreeMap<K, Value>
where
    K: Borrow<str> + Ord + Send + Sync,
{
    fn value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Name/value pairs; the first matching name wins
impl<K> ParameterValues for [(K, Value)]
where
    K: AsRef<str> + Send + Sync,
{
    fn value(&self, name: &str) -> Option<Value> {
        self.iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value.clone())
    }
}

impl<K> ParameterValues for Vec<(K, Value)>
where
    K: AsRef<str> + Send + Sync,
{
    fn value(&self, name: &str) -> Option<Value> {
        self.as_slice().value(name)
    }
}
