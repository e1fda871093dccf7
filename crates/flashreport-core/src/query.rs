//! Backend-agnostic query description.
//!
//! Repositories describe what they want with a [`Query`]; each backend
//! interprets it directly (the Local variant in memory, the Remote variant by
//! generating SQL). Joins are always left joins: the primary row survives a
//! missing or dangling foreign key and the joined record comes back as `None`.

use std::collections::BTreeMap;

use time::Date;

use crate::{
    models::{Record, Value},
    schema::Table,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    In(Vec<Value>),
    IsNull,
    /// Calendar date of a timestamp column, in the timestamp's own offset,
    /// is on or after the bound.
    OnOrAfterDate(Date),
    /// Calendar date of a timestamp column is on or before the bound.
    OnOrBeforeDate(Date),
}

impl Predicate {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Eq(expected) => !value.is_null() && value == expected,
            Predicate::In(values) => !value.is_null() && values.contains(value),
            Predicate::IsNull => value.is_null(),
            Predicate::OnOrAfterDate(bound) => timestamp_date(value).is_some_and(|d| d >= *bound),
            Predicate::OnOrBeforeDate(bound) => timestamp_date(value).is_some_and(|d| d <= *bound),
        }
    }
}

fn timestamp_date(value: &Value) -> Option<Date> {
    match value {
        Value::Timestamp(ts) => Some(ts.date()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

/// Left join of `table` on `table.primary_key = primary.foreign_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: Table,
    pub foreign_key: &'static str,
    pub alias: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub joins: Vec<Join>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order_by: Vec::new(),
            joins: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, column: &'static str, predicate: Predicate) -> Self {
        self.filters.push(Filter { column, predicate });
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(column, Predicate::Eq(value.into()))
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order_by.push(OrderBy { column, descending: false });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order_by.push(OrderBy { column, descending: true });
        self
    }

    pub fn left_join(mut self, table: Table, foreign_key: &'static str, alias: &'static str) -> Self {
        self.joins.push(Join { table, foreign_key, alias });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|f| f.predicate.matches(record.get(f.column)))
    }
}

/// A query result: the primary record plus one slot per join alias.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub record: Record,
    pub joined: BTreeMap<&'static str, Option<Record>>,
}

impl Row {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            joined: BTreeMap::new(),
        }
    }

    pub fn joined(&self, alias: &str) -> Option<&Record> {
        self.joined.get(alias).and_then(|r| r.as_ref())
    }
}

pub type Rows = Box<dyn Iterator<Item = Row> + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_date_bounds_ignore_time_of_day() {
        let late = Value::Timestamp(datetime!(2024-03-31 23:59:59 -05:00));
        let early = Value::Timestamp(datetime!(2024-03-01 00:00:00 +09:00));
        let from = Predicate::OnOrAfterDate(date!(2024 - 03 - 01));
        let to = Predicate::OnOrBeforeDate(date!(2024 - 03 - 31));
        assert!(from.matches(&early) && to.matches(&early));
        assert!(from.matches(&late) && to.matches(&late));
        assert!(!to.matches(&Value::Timestamp(datetime!(2024-04-01 00:00:00 UTC))));
    }

    #[test]
    fn test_eq_never_matches_null() {
        assert!(!Predicate::Eq(Value::Null).matches(&Value::Null));
        assert!(Predicate::IsNull.matches(&Value::Null));
    }

    #[test]
    fn test_query_matches_all_filters() {
        let q = Query::new(Table::CashMovements)
            .eq("business_unit_id", "bu1")
            .eq("is_active", true);
        let row = Record::new().with("business_unit_id", "bu1").with("is_active", true);
        assert!(q.matches(&row));
        assert!(!q.matches(&row.clone().with("is_active", false)));
    }
}
