//! Arguments of the read operations: ordering, offset and cursor pagination,
//! column projection.

use sea_orm::{
    EntityTrait, Iterable, ModelTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select, Value,
    sea_query::{Condition, Expr},
};
use serde::{Deserialize, Serialize};

use super::resource::{Resource, WhereInput};
use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub(crate) fn as_order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

/// Arguments of `find_many` / `find_first`.
///
/// `take` may be negative: the page is then read backwards, from the cursor
/// (or from the end) towards the start, and returned in the requested order.
#[derive(Clone, Debug)]
pub struct FindMany<E: Resource> {
    pub filter: E::Where,
    pub order_by: Vec<(E::Column, SortOrder)>,
    pub cursor: Option<E::Unique>,
    pub skip: Option<u64>,
    pub take: Option<i64>,
}

impl<E: Resource> Default for FindMany<E> {
    fn default() -> Self {
        Self {
            filter: E::Where::default(),
            order_by: Vec::new(),
            cursor: None,
            skip: None,
            take: None,
        }
    }
}

impl<E: Resource> FindMany<E> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: E::Where) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: E::Column, order: SortOrder) -> Self {
        self.order_by.push((column, order));
        self
    }

    #[must_use]
    pub fn cursor(mut self, key: E::Unique) -> Self {
        self.cursor = Some(key);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub(crate) fn backwards(&self) -> bool {
        self.take.is_some_and(|take| take < 0)
    }

    /// Requested ordering with the primary key appended, reversed when paging
    /// backwards.
    pub(crate) fn effective_order(&self) -> Vec<(E::Column, SortOrder)> {
        let pk = E::primary_column();
        let mut order = self.order_by.clone();
        if !order.iter().any(|(col, _)| same_column(*col, pk)) {
            order.push((pk, SortOrder::Asc));
        }
        if self.backwards() {
            for (_, dir) in &mut order {
                *dir = dir.reverse();
            }
        }
        order
    }

    /// Build the SELECT. `anchor` is the cursor row, already fetched.
    pub(crate) fn select(&self, anchor: Option<&E::Model>) -> Select<E> {
        let order = self.effective_order();
        let mut query = E::find().filter(self.filter.condition());
        if let Some(anchor) = anchor {
            query = query.filter(from_cursor::<E>(anchor, &order));
        }
        for (col, dir) in &order {
            query = query.order_by(*col, dir.as_order());
        }
        if let Some(skip) = self.skip {
            query = query.offset(skip);
        }
        match self.take {
            Some(take) => query = query.limit(take.unsigned_abs()),
            // SQLite needs a LIMIT to accept an OFFSET.
            None if self.skip.is_some() => query = query.limit(i64::MAX as u64),
            None => {}
        }
        query
    }
}

fn same_column<C: sea_orm::IdenStatic>(a: C, b: C) -> bool {
    a.as_str() == b.as_str()
}

/// Rows at or after `anchor` in `order` (lexicographic over the columns).
///
/// NULLs sort first ascending and last descending, matching SQLite.
fn from_cursor<E: Resource>(anchor: &E::Model, order: &[(E::Column, SortOrder)]) -> Condition {
    let mut any = Condition::any();
    for (idx, (col, dir)) in order.iter().enumerate() {
        let mut branch = Condition::all();
        for (prev, _) in &order[..idx] {
            branch = branch.add(Expr::col(*prev).is(anchor.get(*prev)));
        }
        any = any.add(branch.add(strictly_after(*col, anchor.get(*col), *dir)));
    }
    let same = order.iter().fold(Condition::all(), |acc, (col, _)| {
        acc.add(Expr::col(*col).is(anchor.get(*col)))
    });
    any.add(same)
}

fn strictly_after<C: sea_orm::ColumnTrait>(col: C, value: Value, dir: SortOrder) -> Condition {
    match dir {
        SortOrder::Asc => Condition::any()
            .add(Expr::col(col).gt(value.clone()))
            .add(
                Condition::all()
                    .add(Expr::val(value).is_null())
                    .add(Expr::col(col).is_not_null()),
            ),
        SortOrder::Desc => Condition::any()
            .add(Expr::col(col).lt(value.clone()))
            .add(
                Condition::all()
                    .add(Expr::col(col).is_null())
                    .add(Expr::val(value).is_not_null()),
            ),
    }
}

/// Column projection for `find_many_projected`: either a `select` allow-list
/// or an `omit` deny-list.
#[derive(Clone, Debug)]
pub struct Projection<E: EntityTrait> {
    pub select: Option<Vec<E::Column>>,
    pub omit: Option<Vec<E::Column>>,
}

impl<E: EntityTrait> Default for Projection<E> {
    fn default() -> Self {
        Self {
            select: None,
            omit: None,
        }
    }
}

impl<E: EntityTrait> Projection<E> {
    pub fn select(columns: impl IntoIterator<Item = E::Column>) -> Self {
        Self {
            select: Some(columns.into_iter().collect()),
            omit: None,
        }
    }

    pub fn omit(columns: impl IntoIterator<Item = E::Column>) -> Self {
        Self {
            select: None,
            omit: Some(columns.into_iter().collect()),
        }
    }

    pub(crate) fn columns(&self) -> ResultEngine<Vec<E::Column>> {
        let columns: Vec<E::Column> = match (&self.select, &self.omit) {
            (Some(_), Some(_)) => {
                return Err(EngineError::Validation(
                    "select and omit cannot be used together".to_string(),
                ));
            }
            (Some(select), None) => select.clone(),
            (None, Some(omit)) => E::Column::iter()
                .filter(|col| !omit.iter().any(|o| same_column(*o, *col)))
                .collect(),
            (None, None) => E::Column::iter().collect(),
        };
        if columns.is_empty() {
            return Err(EngineError::Validation(
                "projection selects no column".to_string(),
            ));
        }
        Ok(columns)
    }

    pub(crate) fn apply(&self, query: Select<E>) -> ResultEngine<Select<E>> {
        Ok(query.select_only().columns(self.columns()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products;

    #[test]
    fn primary_key_breaks_ties() {
        let args = FindMany::<products::Entity>::new()
            .order_by(products::Column::PriceCents, SortOrder::Desc);
        let order = args.effective_order();
        assert_eq!(order.len(), 2);
        assert!(same_column(order[1].0, products::Column::Id));
        assert_eq!(order[1].1, SortOrder::Asc);
    }

    #[test]
    fn negative_take_reverses_the_order() {
        let args = FindMany::<products::Entity>::new()
            .order_by(products::Column::Name, SortOrder::Asc)
            .take(-2);
        let order = args.effective_order();
        assert!(order.iter().all(|(_, dir)| *dir == SortOrder::Desc));
    }

    #[test]
    fn select_and_omit_are_exclusive() {
        let projection = Projection::<products::Entity> {
            select: Some(vec![products::Column::Name]),
            omit: Some(vec![products::Column::Sku]),
        };
        assert!(matches!(
            projection.columns(),
            Err(EngineError::Validation(_))
        ));

        let omit = Projection::<products::Entity>::omit([products::Column::Description]);
        let columns = omit.columns().unwrap();
        assert!(!columns
            .iter()
            .any(|c| same_column(*c, products::Column::Description)));
        assert!(columns.iter().any(|c| same_column(*c, products::Column::Id)));
    }
}
