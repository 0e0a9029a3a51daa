//! `aggregate` and `group_by`: COUNT/SUM/AVG/MIN/MAX computed in SQL.

use std::collections::BTreeMap;

use sea_orm::{
    ColumnTrait, ColumnType, EntityTrait, IdenStatic, QueryResult, Value,
    prelude::DateTimeUtc,
    sea_query::{Expr, Func, SimpleExpr},
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{
    filters::ScalarFilter,
    find::SortOrder,
    resource::Resource,
};
use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFn {
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    fn prefix(self) -> &'static str {
        match self {
            Self::Sum => "_sum",
            Self::Avg => "_avg",
            Self::Min => "_min",
            Self::Max => "_max",
        }
    }

    fn expr<C: ColumnTrait>(self, column: C) -> SimpleExpr {
        let col = Expr::col(column);
        match self {
            Self::Sum => col.sum(),
            Self::Avg => Func::avg(col).into(),
            Self::Min => col.min(),
            Self::Max => col.max(),
        }
    }
}

/// Which aggregates to compute.
#[derive(Clone, Debug)]
pub struct AggregateSpec<E: EntityTrait> {
    pub count: bool,
    pub sum: Vec<E::Column>,
    pub avg: Vec<E::Column>,
    pub min: Vec<E::Column>,
    pub max: Vec<E::Column>,
}

impl<E: EntityTrait> Default for AggregateSpec<E> {
    fn default() -> Self {
        Self {
            count: false,
            sum: Vec::new(),
            avg: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<E: EntityTrait> AggregateSpec<E> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    #[must_use]
    pub fn sum(mut self, column: E::Column) -> Self {
        self.sum.push(column);
        self
    }

    #[must_use]
    pub fn avg(mut self, column: E::Column) -> Self {
        self.avg.push(column);
        self
    }

    #[must_use]
    pub fn min(mut self, column: E::Column) -> Self {
        self.min.push(column);
        self
    }

    #[must_use]
    pub fn max(mut self, column: E::Column) -> Self {
        self.max.push(column);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.count
            && self.sum.is_empty()
            && self.avg.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    fn functions(&self) -> impl Iterator<Item = (AggregateFn, E::Column)> + '_ {
        let tag = |f: AggregateFn| move |col: &E::Column| (f, *col);
        self.sum
            .iter()
            .map(tag(AggregateFn::Sum))
            .chain(self.avg.iter().map(tag(AggregateFn::Avg)))
            .chain(self.min.iter().map(tag(AggregateFn::Min)))
            .chain(self.max.iter().map(tag(AggregateFn::Max)))
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        for (function, column) in self.functions() {
            ensure_numeric(function, column)?;
        }
        Ok(())
    }

    /// `(alias, expression)` pairs to add to the SELECT list.
    pub(crate) fn select_exprs(&self) -> Vec<(String, SimpleExpr)> {
        let mut exprs = Vec::new();
        if self.count {
            exprs.push((COUNT_ALIAS.to_string(), count_all()));
        }
        for (function, column) in self.functions() {
            exprs.push((alias(function, column), function.expr(column)));
        }
        exprs
    }

    pub(crate) fn decode(&self, row: &QueryResult) -> ResultEngine<Aggregates> {
        let mut out = Aggregates::default();
        if self.count {
            out.count = Some(row.try_get::<i64>("", COUNT_ALIAS)?);
        }
        for (function, column) in self.functions() {
            let name = column.as_str().to_string();
            let key = alias(function, column);
            match function {
                AggregateFn::Avg => {
                    out.avg.insert(name, row.try_get::<Option<f64>>("", &key)?);
                }
                AggregateFn::Sum => {
                    out.sum.insert(name, row.try_get::<Option<i64>>("", &key)?);
                }
                AggregateFn::Min => {
                    out.min.insert(name, row.try_get::<Option<i64>>("", &key)?);
                }
                AggregateFn::Max => {
                    out.max.insert(name, row.try_get::<Option<i64>>("", &key)?);
                }
            }
        }
        Ok(out)
    }
}

const COUNT_ALIAS: &str = "_count";

fn count_all() -> SimpleExpr {
    Expr::cust("COUNT(*)")
}

fn alias<C: IdenStatic>(function: AggregateFn, column: C) -> String {
    format!("{}_{}", function.prefix(), column.as_str())
}

fn ensure_numeric<C: ColumnTrait>(function: AggregateFn, column: C) -> ResultEngine<()> {
    match column.def().get_column_type() {
        ColumnType::BigInteger
        | ColumnType::Integer
        | ColumnType::SmallInteger
        | ColumnType::TinyInteger => Ok(()),
        _ => Err(EngineError::Validation(format!(
            "{} is not defined for non-numeric column {}",
            function.prefix(),
            column.as_str()
        ))),
    }
}

/// Aggregate results keyed by column name. Aggregates over no rows are
/// `None`, except the count.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Aggregates {
    #[serde(rename = "_count", skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(rename = "_sum", skip_serializing_if = "BTreeMap::is_empty")]
    pub sum: BTreeMap<String, Option<i64>>,
    #[serde(rename = "_avg", skip_serializing_if = "BTreeMap::is_empty")]
    pub avg: BTreeMap<String, Option<f64>>,
    #[serde(rename = "_min", skip_serializing_if = "BTreeMap::is_empty")]
    pub min: BTreeMap<String, Option<i64>>,
    #[serde(rename = "_max", skip_serializing_if = "BTreeMap::is_empty")]
    pub max: BTreeMap<String, Option<i64>>,
}

impl Aggregates {
    pub fn sum_of<C: IdenStatic>(&self, column: C) -> Option<i64> {
        self.sum.get(column.as_str()).copied().flatten()
    }

    pub fn avg_of<C: IdenStatic>(&self, column: C) -> Option<f64> {
        self.avg.get(column.as_str()).copied().flatten()
    }

    pub fn min_of<C: IdenStatic>(&self, column: C) -> Option<i64> {
        self.min.get(column.as_str()).copied().flatten()
    }

    pub fn max_of<C: IdenStatic>(&self, column: C) -> Option<i64> {
        self.max.get(column.as_str()).copied().flatten()
    }
}

/// Condition on a group.
#[derive(Clone, Debug)]
pub enum Having<E: EntityTrait> {
    /// On a grouped column.
    Key(E::Column, ScalarFilter<Value>),
    /// On `COUNT(*)` of the group.
    Count(ScalarFilter<i64>),
    /// On an aggregate of a numeric column.
    Aggregate(AggregateFn, E::Column, ScalarFilter<i64>),
}

/// Arguments of `group_by`.
#[derive(Clone, Debug)]
pub struct GroupBy<E: Resource> {
    pub by: Vec<E::Column>,
    pub filter: E::Where,
    pub having: Vec<Having<E>>,
    pub aggregates: AggregateSpec<E>,
    /// Only grouped columns may be ordered on.
    pub order_by: Vec<(E::Column, SortOrder)>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl<E: Resource> GroupBy<E> {
    pub fn new(by: impl IntoIterator<Item = E::Column>) -> Self {
        Self {
            by: by.into_iter().collect(),
            filter: E::Where::default(),
            having: Vec::new(),
            aggregates: AggregateSpec::default(),
            order_by: Vec::new(),
            skip: None,
            take: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: E::Where) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn having(mut self, having: Having<E>) -> Self {
        self.having.push(having);
        self
    }

    #[must_use]
    pub fn aggregates(mut self, aggregates: AggregateSpec<E>) -> Self {
        self.aggregates = aggregates;
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: E::Column, order: SortOrder) -> Self {
        self.order_by.push((column, order));
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    fn is_grouped(&self, column: E::Column) -> bool {
        self.by.iter().any(|by| by.as_str() == column.as_str())
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.by.is_empty() {
            return Err(EngineError::Validation(
                "group_by needs at least one column".to_string(),
            ));
        }
        self.aggregates.validate()?;
        for having in &self.having {
            match having {
                Having::Key(column, _) if !self.is_grouped(*column) => {
                    return Err(EngineError::Validation(format!(
                        "having on {} requires grouping by it",
                        column.as_str()
                    )));
                }
                Having::Aggregate(function, column, _) => ensure_numeric(*function, *column)?,
                _ => {}
            }
        }
        if let Some((column, _)) = self.order_by.iter().find(|(c, _)| !self.is_grouped(*c)) {
            return Err(EngineError::Validation(format!(
                "cannot order groups by {}: not a grouped column",
                column.as_str()
            )));
        }
        if (self.skip.is_some() || self.take.is_some()) && self.order_by.is_empty() {
            return Err(EngineError::Validation(
                "skip/take on groups require order_by".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn having_exprs(&self) -> Vec<sea_orm::Condition> {
        self.having
            .iter()
            .map(|having| match having {
                Having::Key(column, filter) => filter.condition(&Expr::col(*column).into()),
                Having::Count(filter) => filter.condition(&count_all()),
                Having::Aggregate(function, column, filter) => {
                    filter.condition(&function.expr(*column))
                }
            })
            .collect()
    }

    pub(crate) fn key_alias(column: E::Column) -> String {
        column.as_str().to_string()
    }

    pub(crate) fn decode(&self, row: &QueryResult) -> ResultEngine<GroupRow> {
        let mut keys = BTreeMap::new();
        for column in &self.by {
            let alias = Self::key_alias(*column);
            keys.insert(alias.clone(), decode_key(row, *column, &alias)?);
        }
        Ok(GroupRow {
            keys,
            aggregates: self.aggregates.decode(row)?,
        })
    }
}

fn decode_key<C: ColumnTrait>(row: &QueryResult, column: C, alias: &str) -> ResultEngine<JsonValue> {
    let value = match column.def().get_column_type() {
        ColumnType::BigInteger
        | ColumnType::Integer
        | ColumnType::SmallInteger
        | ColumnType::TinyInteger => row.try_get::<Option<i64>>("", alias)?.into(),
        ColumnType::Boolean => row.try_get::<Option<bool>>("", alias)?.into(),
        ColumnType::TimestampWithTimeZone => row
            .try_get::<Option<DateTimeUtc>>("", alias)?
            .map(|ts| ts.to_rfc3339())
            .into(),
        _ => row.try_get::<Option<String>>("", alias)?.into(),
    };
    Ok(value)
}

/// One group: its key values (by column name) and aggregates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupRow {
    pub keys: BTreeMap<String, JsonValue>,
    #[serde(flatten)]
    pub aggregates: Aggregates,
}

impl GroupRow {
    pub fn key<C: IdenStatic>(&self, column: C) -> &JsonValue {
        self.keys.get(column.as_str()).unwrap_or(&JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoices;

    #[test]
    fn aggregates_reject_text_columns() {
        let spec = AggregateSpec::<invoices::Entity>::new().sum(invoices::Column::Status);
        assert!(matches!(spec.validate(), Err(EngineError::Validation(_))));
        let spec = AggregateSpec::<invoices::Entity>::new().sum(invoices::Column::TotalCents);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn group_by_validation() {
        let empty = GroupBy::<invoices::Entity>::new([]);
        assert!(empty.validate().is_err());

        let bad_order = GroupBy::<invoices::Entity>::new([invoices::Column::Status])
            .order_by(invoices::Column::TotalCents, SortOrder::Asc);
        assert!(bad_order.validate().is_err());

        let unordered_take = GroupBy::<invoices::Entity>::new([invoices::Column::Status]).take(1);
        assert!(unordered_take.validate().is_err());

        let bad_having = GroupBy::<invoices::Entity>::new([invoices::Column::Status]).having(
            Having::Key(invoices::Column::CustomerId, ScalarFilter::not_null()),
        );
        assert!(bad_having.validate().is_err());

        let ok = GroupBy::<invoices::Entity>::new([invoices::Column::Status])
            .aggregates(AggregateSpec::new().count().sum(invoices::Column::TotalCents))
            .having(Having::Count(ScalarFilter::gte(2)))
            .order_by(invoices::Column::Status, SortOrder::Asc)
            .take(10);
        assert!(ok.validate().is_ok());
    }
}
