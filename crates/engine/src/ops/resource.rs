//! The traits a model implements to get a [`Repo`](super::Repo), and the
//! helpers its DTOs are written with.

use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, Value,
    prelude::DateTimeUtc,
    sea_query::{Condition, Expr, SimpleExpr},
};

use crate::{EngineError, ResultEngine};

/// A table reachable through the generic repository.
pub trait Resource: EntityTrait {
    /// Human readable name used in errors and logs.
    const LABEL: &'static str;

    type Where: WhereInput;
    type Unique: UniqueInput;
    type Create: CreateInput<Self>;
    type Update: UpdateInput<Self>;

    fn primary_column() -> Self::Column;
    fn created_at_column() -> Self::Column;
    fn updated_at_column() -> Self::Column;
}

/// Row filter of a model (`XWhere`).
pub trait WhereInput: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    fn condition(&self) -> Condition;

    /// True when no field is set, i.e. the filter matches every row.
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A unique key of a model (`XKey`): the primary key or a unique column.
pub trait UniqueInput: Clone + Debug + Send + Sync + 'static {
    fn condition(&self) -> Condition;
}

/// Insert payload of a model (`XCreate`).
pub trait CreateInput<E: EntityTrait>: Send + 'static {
    /// Validate and turn into a fully populated active model.
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<E::ActiveModel>;
}

/// Partial update payload of a model (`XUpdate`).
#[async_trait]
pub trait UpdateInput<E: EntityTrait>: Clone + Debug + Default + Send + Sync + 'static {
    /// Column assignments for the fields that are set. `updated_at` is added by
    /// the repository.
    fn assignments(&self) -> ResultEngine<Vec<(E::Column, SimpleExpr)>>;

    /// Checks against the rows matched by `target`, run inside the update
    /// transaction before anything is written.
    async fn check<C>(&self, _conn: &C, _target: Condition) -> ResultEngine<()>
    where
        C: ConnectionTrait,
    {
        Ok(())
    }
}

/// Relation loader of a model (`XInclude`), producing `XWith` rows.
#[async_trait]
pub trait Include<E: EntityTrait>: Send + Sync {
    type Output: Send;

    async fn load<C>(&self, conn: &C, rows: Vec<E::Model>) -> ResultEngine<Vec<Self::Output>>
    where
        C: ConnectionTrait;
}

/// Update of an integer column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntUpdate {
    Set(i64),
    Increment(i64),
    Decrement(i64),
    Multiply(i64),
    /// Integer division; dividing by zero is rejected.
    Divide(i64),
}

impl IntUpdate {
    fn expr<C: ColumnTrait>(self, column: C) -> ResultEngine<SimpleExpr> {
        Ok(match self {
            Self::Set(v) => Expr::value(v),
            Self::Increment(v) => Expr::col(column).add(v),
            Self::Decrement(v) => Expr::col(column).sub(v),
            Self::Multiply(v) => Expr::col(column).mul(v),
            Self::Divide(0) => {
                return Err(EngineError::Validation(format!(
                    "cannot divide {} by zero",
                    column.as_str()
                )));
            }
            Self::Divide(v) => Expr::col(column).div(v),
        })
    }
}

impl From<i64> for IntUpdate {
    fn from(value: i64) -> Self {
        Self::Set(value)
    }
}

/// Collects `SET column = expr` pairs for an update statement.
pub(crate) struct Assignments<C> {
    pairs: Vec<(C, SimpleExpr)>,
}

impl<C: ColumnTrait> Assignments<C> {
    pub(crate) fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub(crate) fn set<V>(mut self, column: C, value: &Option<V>) -> Self
    where
        V: Clone + Into<Value>,
    {
        if let Some(value) = value {
            self.pairs.push((column, Expr::value(value.clone())));
        }
        self
    }

    /// `Some(None)` writes NULL.
    pub(crate) fn set_nullable<V>(mut self, column: C, value: &Option<Option<V>>) -> Self
    where
        V: Clone,
        Option<V>: Into<Value>,
    {
        if let Some(value) = value {
            self.pairs.push((column, Expr::value(value.clone())));
        }
        self
    }

    pub(crate) fn int(mut self, column: C, update: &Option<IntUpdate>) -> ResultEngine<Self> {
        if let Some(update) = update {
            self.pairs.push((column, update.expr(column)?));
        }
        Ok(self)
    }

    /// Already validated value for a required text column.
    pub(crate) fn text(
        self,
        column: C,
        value: &Option<String>,
        normalize: impl Fn(&str) -> ResultEngine<String>,
    ) -> ResultEngine<Self> {
        let value = value.as_deref().map(normalize).transpose()?;
        Ok(self.set(column, &value))
    }

    pub(crate) fn build(self) -> Vec<(C, SimpleExpr)> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dividing_by_zero_is_rejected() {
        let err = IntUpdate::Divide(0)
            .expr(crate::materials::Column::Quantity)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(IntUpdate::Divide(2).expr(crate::materials::Column::Quantity).is_ok());
    }
}
