//! Data layer of the Bottega shop.
//!
//! Nine tables (users, catalog, sales, purchasing) mapped with sea-orm, and a
//! generic repository giving each of them the same operations: unique and
//! filtered reads, offset/cursor pagination, relation loading, projections,
//! single and bulk writes, upserts, aggregates and group-by.
//!
//! ```rust,no_run
//! use engine::{DatabaseOptions, Engine, FindMany, SortOrder, StringFilter, customers};
//!
//! # async fn run() -> engine::ResultEngine<()> {
//! let engine = Engine::connect(&DatabaseOptions::default()).await?;
//! let acme = engine
//!     .db()
//!     .customers()
//!     .create(customers::CustomerCreate::named("Acme"))
//!     .await?;
//! let found = engine
//!     .db()
//!     .customers()
//!     .find_many(
//!         FindMany::new()
//!             .filter(customers::CustomerWhere {
//!                 name: Some(StringFilter::starts_with("ac").insensitive()),
//!                 ..Default::default()
//!             })
//!             .order_by(customers::Column::Name, SortOrder::Asc),
//!     )
//!     .await?;
//! assert_eq!(found[0].id, acme.id);
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{
    AggregateFn, AggregateSpec, Aggregates, BoolFilter, CreateInput, DatabaseOptions,
    DateTimeFilter, Db, Engine, EngineBuilder, FindMany, GroupBy, GroupRow, Having, Include,
    IntFilter, IntUpdate, IsolationLevel, ManyFilter, Projection, QueryMode, RelationFilter,
    Repo, Resource, ScalarFilter, SortOrder, StringFilter, TransactionOptions, TxFuture,
    UniqueInput, UpdateInput, WhereInput,
};
pub use quantity::{MAX_QUANTITY_SCALE, Quantity, line_total_cents};
pub use users::Role;

pub mod cash_flows;
pub mod customers;
pub mod invoice_items;
pub mod invoices;
pub mod materials;
pub mod products;
pub mod purchase_items;
pub mod purchases;
pub mod users;

mod error;
mod money;
mod ops;
mod quantity;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
