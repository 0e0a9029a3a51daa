use std::{future::Future, pin::Pin, time::Duration};

use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use serde::Deserialize;

use crate::{
    EngineError, ResultEngine, cash_flows, customers, invoice_items, invoices, materials,
    products, purchase_items, purchases, users,
};

mod aggregate;
mod filters;
mod find;
pub(crate) mod include;
mod repo;
mod resource;

pub use aggregate::{AggregateFn, AggregateSpec, Aggregates, GroupBy, GroupRow, Having};
pub use filters::{
    BoolFilter, DateTimeFilter, IntFilter, ManyFilter, QueryMode, RelationFilter, ScalarFilter,
    StringFilter,
};
pub(crate) use filters::WhereBuilder;
pub use find::{FindMany, Projection, SortOrder};
pub use repo::Repo;
pub(crate) use resource::Assignments;
pub use resource::{
    CreateInput, Include, IntUpdate, Resource, UniqueInput, UpdateInput, WhereInput,
};
pub use sea_orm::IsolationLevel;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// `$conn` may itself be a transaction, in which case a savepoint is used.
macro_rules! with_tx {
    ($conn:expr, |$tx:ident| $body:expr) => {{
        let $tx = $conn.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Connection settings for [`Engine::connect`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseOptions {
    pub url: String,
    /// Pool size; left to the driver default when unset (a single connection
    /// for SQLite).
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_secs: u64,
    /// Log every SQL statement at debug level.
    pub sqlx_logging: bool,
    pub run_migrations: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            url: "sqlite:./bottega.db?mode=rwc".to_string(),
            max_connections: None,
            min_connections: None,
            connect_timeout_secs: 8,
            sqlx_logging: false,
            run_migrations: true,
        }
    }
}

/// Options of [`Engine::transaction`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    /// Roll back with [`EngineError::TransactionTimeout`] when the unit of
    /// work takes longer.
    pub timeout: Option<Duration>,
}

impl TransactionOptions {
    #[must_use]
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Future returned by the unit of work given to [`Engine::transaction`].
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = ResultEngine<T>> + Send + 'c>>;

/// Table handles over a connection or a transaction.
pub struct Db<'a, C> {
    conn: &'a C,
}

impl<C> Clone for Db<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Db<'_, C> {}

impl<'a, C> Db<'a, C>
where
    C: ConnectionTrait + TransactionTrait,
{
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// The underlying connection, for queries outside the repositories.
    pub fn connection(&self) -> &'a C {
        self.conn
    }

    pub fn users(&self) -> Repo<'a, users::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn materials(&self) -> Repo<'a, materials::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn products(&self) -> Repo<'a, products::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn customers(&self) -> Repo<'a, customers::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn invoices(&self) -> Repo<'a, invoices::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn invoice_items(&self) -> Repo<'a, invoice_items::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn cash_flows(&self) -> Repo<'a, cash_flows::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn purchases(&self) -> Repo<'a, purchases::Entity, C> {
        Repo::new(self.conn)
    }

    pub fn purchase_items(&self) -> Repo<'a, purchase_items::Entity, C> {
        Repo::new(self.conn)
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Open the connection pool and, if requested, bring the schema up to date.
    pub async fn connect(options: &DatabaseOptions) -> ResultEngine<Self> {
        let mut connect = ConnectOptions::new(options.url.clone());
        if let Some(max) = options.max_connections {
            connect.max_connections(max);
        }
        if let Some(min) = options.min_connections {
            connect.min_connections(min);
        }
        connect
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .sqlx_logging(options.sqlx_logging);

        let database = Database::connect(connect).await?;
        if options.run_migrations {
            Migrator::up(&database, None).await?;
        }
        tracing::info!(backend = ?database.get_database_backend(), "database connected");
        Engine::builder().database(database).build().await
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(self) -> ResultEngine<()> {
        self.database.close().await?;
        tracing::info!("database disconnected");
        Ok(())
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.database
    }

    pub fn db(&self) -> Db<'_, DatabaseConnection> {
        Db::new(&self.database)
    }

    /// Run `work` atomically.
    ///
    /// The transaction commits when `work` returns `Ok`, and rolls back when
    /// it returns an error or exceeds `options.timeout`.
    ///
    /// ```rust,no_run
    /// # use engine::{Engine, TransactionOptions, customers::CustomerCreate};
    /// # async fn run(engine: &Engine) -> engine::ResultEngine<()> {
    /// let id = engine
    ///     .transaction(TransactionOptions::default(), |db| {
    ///         Box::pin(async move {
    ///             let customer = db
    ///                 .customers()
    ///                 .create(CustomerCreate::named("Ada"))
    ///                 .await?;
    ///             Ok::<_, engine::EngineError>(customer.id)
    ///         })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction<F, T>(&self, options: TransactionOptions, work: F) -> ResultEngine<T>
    where
        F: for<'c> FnOnce(Db<'c, DatabaseTransaction>) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        let txn = self
            .database
            .begin_with_config(options.isolation, None)
            .await?;

        let outcome = {
            let fut = work(Db::new(&txn));
            match options.timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .unwrap_or(Err(EngineError::TransactionTimeout(limit))),
                None => fut.await,
            }
        };

        match outcome {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "transaction rolled back");
                txn.rollback().await?;
                Err(err)
            }
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
