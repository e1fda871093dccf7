use std::{cmp::Ordering, collections::BTreeMap, fmt::Display, str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub mod entities;
pub mod read;
pub mod write;

/// A single column value as the storage backends see it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Money(Decimal),
    Text(Arc<str>),
    Timestamp(OffsetDateTime),
}

static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used when sorting rows. Nulls sort first, values of
    /// different kinds are ordered by kind.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Money(a), Value::Money(b)) => a.cmp(b),
            (Value::Int(a), Value::Money(b)) => Decimal::from(*a).cmp(b),
            (Value::Money(a), Value::Int(b)) => a.cmp(&Decimal::from(*b)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Money(_) => 3,
            Value::Text(_) => 4,
            Value::Timestamp(_) => 5,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Money(m) => write!(f, "{}", m),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => match ts.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{}", ts),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Money(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::Text(v)
    }
}

impl From<&Arc<str>> for Value {
    fn from(v: &Arc<str>) -> Self {
        Value::Text(v.clone())
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A row keyed by column name. Absent columns read as `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: BTreeMap<Arc<str>, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.fields.insert(Arc::from(column), value.into());
    }

    pub fn get(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.fields.iter()
    }

    /// Overwrites every column present in `patch`.
    pub fn merge(&mut self, patch: &Record) {
        for (k, v) in patch.iter() {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).as_str()
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn bool(&self, column: &str) -> Option<bool> {
        match self.get(column) {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn money(&self, column: &str) -> Option<Decimal> {
        match self.get(column) {
            Value::Money(m) => Some(*m),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<OffsetDateTime> {
        match self.get(column) {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl FromIterator<(Arc<str>, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    #[serde(rename = "CR")]
    Credit,
    #[serde(rename = "DB")]
    Debit,
}

impl MovementType {
    pub fn code(&self) -> &'static str {
        match self {
            MovementType::Credit => "CR",
            MovementType::Debit => "DB",
        }
    }
}

impl FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CR" => Ok(MovementType::Credit),
            "DB" => Ok(MovementType::Debit),
            other => Err(format!("unknown movement type: {}", other)),
        }
    }
}

impl Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryType {
    #[serde(rename = "CR")]
    Credit,
    #[serde(rename = "DB")]
    Debit,
    #[serde(rename = "BOTH")]
    Both,
}

impl CategoryType {
    pub fn code(&self) -> &'static str {
        match self {
            CategoryType::Credit => "CR",
            CategoryType::Debit => "DB",
            CategoryType::Both => "BOTH",
        }
    }

    /// `BOTH` accepts either movement type.
    pub fn accepts(&self, movement_type: MovementType) -> bool {
        matches!(
            (self, movement_type),
            (CategoryType::Both, _)
                | (CategoryType::Credit, MovementType::Credit)
                | (CategoryType::Debit, MovementType::Debit)
        )
    }
}

impl From<MovementType> for CategoryType {
    fn from(t: MovementType) -> Self {
        match t {
            MovementType::Credit => CategoryType::Credit,
            MovementType::Debit => CategoryType::Debit,
        }
    }
}

impl FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CR" => Ok(CategoryType::Credit),
            "DB" => Ok(CategoryType::Debit),
            "BOTH" => Ok(CategoryType::Both),
            other => Err(format!("unknown category type: {}", other)),
        }
    }
}

impl Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
