//! Batched relation loading: one `IN (…)` query per requested relation.

use std::collections::{BTreeSet, HashMap};

use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, sea_query::Expr};

use super::resource::Resource;
use crate::ResultEngine;

/// Load the rows of `Child` whose `fk` is one of `parent_ids`, grouped by the
/// parent id returned by `key`. Children keep their insertion order.
pub(crate) async fn children<Child, C>(
    conn: &C,
    fk: Child::Column,
    parent_ids: impl IntoIterator<Item = String>,
    key: impl Fn(&Child::Model) -> Option<String>,
) -> ResultEngine<HashMap<String, Vec<Child::Model>>>
where
    Child: Resource,
    C: ConnectionTrait,
{
    let ids: BTreeSet<String> = parent_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Child::find()
        .filter(Expr::col(fk).is_in(ids))
        .order_by_asc(Child::created_at_column())
        .order_by_asc(Child::primary_column())
        .all(conn)
        .await?;

    let mut grouped: HashMap<String, Vec<Child::Model>> = HashMap::new();
    for row in rows {
        if let Some(parent) = key(&row) {
            grouped.entry(parent).or_default().push(row);
        }
    }
    Ok(grouped)
}

/// Load the `Parent` rows with the given ids, keyed by id.
pub(crate) async fn parents<Parent, C>(
    conn: &C,
    ids: impl IntoIterator<Item = String>,
    key: impl Fn(&Parent::Model) -> String,
) -> ResultEngine<HashMap<String, Parent::Model>>
where
    Parent: Resource,
    C: ConnectionTrait,
{
    let ids: BTreeSet<String> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Parent::find()
        .filter(Expr::col(Parent::primary_column()).is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| (key(&row), row)).collect())
}
