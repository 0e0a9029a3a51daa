use std::{fmt::Debug, marker::PhantomData};

use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, DatabaseTransaction,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
    TransactionTrait,
    sea_query::{Condition, Expr},
};
use serde_json::Value as JsonValue;

use super::{
    aggregate::{AggregateSpec, Aggregates, GroupBy, GroupRow},
    find::{FindMany, Projection},
    resource::{CreateInput, Include, Resource, UniqueInput, UpdateInput, WhereInput},
    with_tx,
};
use crate::{EngineError, ResultEngine};

/// CRUD, pagination and aggregation over one table.
///
/// `C` is either the pooled [`DatabaseConnection`](sea_orm::DatabaseConnection)
/// or an open [`DatabaseTransaction`]; multi-statement operations open a
/// transaction (a savepoint when `C` already is one).
pub struct Repo<'a, E, C> {
    conn: &'a C,
    entity: PhantomData<E>,
}

impl<'a, E, C> Repo<'a, E, C> {
    pub fn new(conn: &'a C) -> Self {
        Self {
            conn,
            entity: PhantomData,
        }
    }
}

fn not_found<E: Resource>(what: &impl Debug) -> EngineError {
    EngineError::NotFound(format!("{} {what:?}", E::LABEL))
}

fn in_request_order<E: Resource, T>(args: &FindMany<E>, mut rows: Vec<T>) -> Vec<T> {
    if args.backwards() {
        rows.reverse();
    }
    rows
}

impl<'a, E, C> Repo<'a, E, C>
where
    E: Resource,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    C: ConnectionTrait + TransactionTrait,
{
    pub async fn find_unique(&self, key: &E::Unique) -> ResultEngine<Option<E::Model>> {
        Ok(E::find().filter(key.condition()).one(self.conn).await?)
    }

    pub async fn find_unique_or_throw(&self, key: &E::Unique) -> ResultEngine<E::Model> {
        self.find_unique(key)
            .await?
            .ok_or_else(|| not_found::<E>(key))
    }

    pub async fn find_first(&self, mut args: FindMany<E>) -> ResultEngine<Option<E::Model>> {
        args.take = Some(if args.backwards() { -1 } else { 1 });
        Ok(self.find_many(args).await?.into_iter().next())
    }

    pub async fn find_first_or_throw(&self, args: FindMany<E>) -> ResultEngine<E::Model> {
        let filter = args.filter.clone();
        self.find_first(args)
            .await?
            .ok_or_else(|| not_found::<E>(&filter))
    }

    pub async fn find_many(&self, args: FindMany<E>) -> ResultEngine<Vec<E::Model>> {
        let rows = match &args.cursor {
            None => args.select(None).all(self.conn).await?,
            Some(key) => with_tx!(self.conn, |txn| {
                match E::find().filter(key.condition()).one(&txn).await? {
                    Some(anchor) => args
                        .select(Some(&anchor))
                        .all(&txn)
                        .await
                        .map_err(EngineError::from),
                    None => Ok(Vec::new()),
                }
            })?,
        };
        Ok(in_request_order(&args, rows))
    }

    /// Rows as JSON objects holding only the projected columns.
    pub async fn find_many_projected(
        &self,
        args: FindMany<E>,
        projection: &Projection<E>,
    ) -> ResultEngine<Vec<JsonValue>> {
        projection.columns()?;
        let rows = match &args.cursor {
            None => {
                projection
                    .apply(args.select(None))?
                    .into_json()
                    .all(self.conn)
                    .await?
            }
            Some(key) => with_tx!(self.conn, |txn| {
                match E::find().filter(key.condition()).one(&txn).await? {
                    Some(anchor) => projection
                        .apply(args.select(Some(&anchor)))?
                        .into_json()
                        .all(&txn)
                        .await
                        .map_err(EngineError::from),
                    None => Ok(Vec::new()),
                }
            })?,
        };
        Ok(in_request_order(&args, rows))
    }

    pub async fn find_many_with<I>(
        &self,
        args: FindMany<E>,
        include: &I,
    ) -> ResultEngine<Vec<I::Output>>
    where
        I: Include<E>,
    {
        let rows = self.find_many(args).await?;
        include.load(self.conn, rows).await
    }

    pub async fn find_unique_with<I>(
        &self,
        key: &E::Unique,
        include: &I,
    ) -> ResultEngine<Option<I::Output>>
    where
        I: Include<E>,
    {
        match self.find_unique(key).await? {
            Some(row) => Ok(include.load(self.conn, vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    pub async fn count(&self, filter: &E::Where) -> ResultEngine<u64> {
        Ok(E::find().filter(filter.condition()).count(self.conn).await?)
    }

    pub async fn create(&self, data: E::Create) -> ResultEngine<E::Model> {
        let model = data.into_active_model(Utc::now())?.insert(self.conn).await?;
        tracing::debug!(table = E::LABEL, "row created");
        Ok(model)
    }

    /// Insert all rows in one statement. Returns how many were inserted.
    pub async fn create_many(&self, data: Vec<E::Create>) -> ResultEngine<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let models = data
            .into_iter()
            .map(|row| row.into_active_model(now))
            .collect::<ResultEngine<Vec<_>>>()?;
        let inserted = E::insert_many(models)
            .exec_without_returning(self.conn)
            .await?;
        tracing::debug!(table = E::LABEL, rows = inserted, "rows created");
        Ok(inserted)
    }

    pub async fn update(&self, key: &E::Unique, data: &E::Update) -> ResultEngine<E::Model> {
        let assignments = data.assignments()?;
        let pk = E::primary_column();
        with_tx!(self.conn, |txn| {
            let current = E::find()
                .filter(key.condition())
                .one(&txn)
                .await?
                .ok_or_else(|| not_found::<E>(key))?;
            let id = current.get(pk);
            let target = Condition::all().add(Expr::col(pk).eq(id.clone()));
            data.check(&txn, target).await?;

            let mut stmt = E::update_many()
                .filter(Expr::col(pk).eq(id.clone()))
                .col_expr(E::updated_at_column(), Expr::value(Utc::now()));
            for (column, expr) in assignments {
                stmt = stmt.col_expr(column, expr);
            }
            stmt.exec(&txn).await?;
            tracing::debug!(table = E::LABEL, "row updated");

            E::find()
                .filter(Expr::col(pk).eq(id))
                .one(&txn)
                .await?
                .ok_or_else(|| not_found::<E>(key))
        })
    }

    /// Apply `data` to every row matching `filter`. Returns the number of rows
    /// changed.
    pub async fn update_many(&self, filter: &E::Where, data: &E::Update) -> ResultEngine<u64> {
        let assignments = data.assignments()?;
        with_tx!(self.conn, |txn| {
            data.check(&txn, filter.condition()).await?;

            let mut stmt = E::update_many()
                .filter(filter.condition())
                .col_expr(E::updated_at_column(), Expr::value(Utc::now()));
            for (column, expr) in assignments {
                stmt = stmt.col_expr(column, expr);
            }
            let res = stmt.exec(&txn).await?;
            tracing::debug!(table = E::LABEL, rows = res.rows_affected, "rows updated");
            Ok(res.rows_affected)
        })
    }

    /// Update the row found by `key`, or insert `create` when there is none.
    pub async fn upsert(
        &self,
        key: &E::Unique,
        create: E::Create,
        update: &E::Update,
    ) -> ResultEngine<E::Model> {
        with_tx!(self.conn, |txn| {
            let repo = Repo::<E, DatabaseTransaction>::new(&txn);
            match repo.find_unique(key).await? {
                Some(_) => repo.update(key, update).await,
                None => repo.create(create).await,
            }
        })
    }

    /// Delete the row found by `key` and return it.
    pub async fn delete(&self, key: &E::Unique) -> ResultEngine<E::Model> {
        let pk = E::primary_column();
        with_tx!(self.conn, |txn| {
            let row = E::find()
                .filter(key.condition())
                .one(&txn)
                .await?
                .ok_or_else(|| not_found::<E>(key))?;
            E::delete_many()
                .filter(Expr::col(pk).eq(row.get(pk)))
                .exec(&txn)
                .await?;
            tracing::debug!(table = E::LABEL, "row deleted");
            Ok(row)
        })
    }

    pub async fn delete_many(&self, filter: &E::Where) -> ResultEngine<u64> {
        let res = E::delete_many()
            .filter(filter.condition())
            .exec(self.conn)
            .await?;
        tracing::debug!(table = E::LABEL, rows = res.rows_affected, "rows deleted");
        Ok(res.rows_affected)
    }

    pub async fn aggregate(
        &self,
        filter: &E::Where,
        spec: &AggregateSpec<E>,
    ) -> ResultEngine<Aggregates> {
        if spec.is_empty() {
            return Err(EngineError::Validation(
                "aggregate needs at least one function".to_string(),
            ));
        }
        spec.validate()?;

        let mut query = E::find().select_only().filter(filter.condition());
        for (alias, expr) in spec.select_exprs() {
            query = query.expr_as(expr, alias);
        }
        let stmt = query.build(self.conn.get_database_backend());
        match self.conn.query_one(stmt).await? {
            Some(row) => spec.decode(&row),
            None => Ok(Aggregates::default()),
        }
    }

    pub async fn group_by(&self, args: &GroupBy<E>) -> ResultEngine<Vec<GroupRow>> {
        args.validate()?;

        let mut query = E::find().select_only().filter(args.filter.condition());
        for column in &args.by {
            query = query
                .column_as(*column, GroupBy::<E>::key_alias(*column))
                .group_by(*column);
        }
        for (alias, expr) in args.aggregates.select_exprs() {
            query = query.expr_as(expr, alias);
        }
        for having in args.having_exprs() {
            query = query.having(having);
        }
        for (column, order) in &args.order_by {
            query = query.order_by(*column, order.as_order());
        }
        if let Some(skip) = args.skip {
            query = query.offset(skip);
        }
        match args.take {
            Some(take) => query = query.limit(take),
            None if args.skip.is_some() => query = query.limit(i64::MAX as u64),
            None => {}
        }

        let stmt = query.build(self.conn.get_database_backend());
        self.conn
            .query_all(stmt)
            .await?
            .iter()
            .map(|row| args.decode(row))
            .collect()
    }
}
