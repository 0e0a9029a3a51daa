//! Money moving in or out of the shop.
//!
//! A cash flow may settle an invoice. Deleting the invoice keeps the cash flow
//! and clears `invoice_id`.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine, invoices,
    ops::{
        Assignments, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate, RelationFilter,
        Resource, StringFilter, UniqueInput, UpdateInput, WhereBuilder, WhereInput, include,
    },
    util::{new_id, normalize_optional, normalize_required},
};

/// Conventional values of `type`.
pub const INFLOW: &str = "inflow";
pub const OUTFLOW: &str = "outflow";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_flows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub amount_cents: i64,
    pub category: String,
    pub note: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub invoice_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Invoice,
}

impl Related<invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CashFlowWhere {
    pub id: Option<StringFilter>,
    pub kind: Option<StringFilter>,
    pub amount_cents: Option<IntFilter>,
    pub category: Option<StringFilter>,
    pub note: Option<StringFilter>,
    pub occurred_at: Option<DateTimeFilter>,
    pub invoice_id: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub invoice: Option<RelationFilter<invoices::InvoiceWhere>>,
    pub and: Vec<CashFlowWhere>,
    pub or: Vec<CashFlowWhere>,
    pub not: Vec<CashFlowWhere>,
}

impl WhereInput for CashFlowWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Kind, &self.kind)
            .scalar(Column::AmountCents, &self.amount_cents)
            .string(Column::Category, &self.category)
            .string(Column::Note, &self.note)
            .scalar(Column::OccurredAt, &self.occurred_at)
            .string(Column::InvoiceId, &self.invoice_id)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_one::<invoices::Entity, _>(Column::InvoiceId, &self.invoice)
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CashFlowKey {
    Id(String),
}

impl UniqueInput for CashFlowKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CashFlowCreate {
    pub id: Option<String>,
    pub kind: String,
    pub amount_cents: i64,
    pub category: String,
    pub note: Option<String>,
    /// Defaults to the insert time.
    pub occurred_at: Option<DateTimeUtc>,
    pub invoice_id: Option<String>,
}

impl CreateInput<Entity> for CashFlowCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            kind: ActiveValue::Set(normalize_required(&self.kind, "cash flow type")?),
            amount_cents: ActiveValue::Set(self.amount_cents),
            category: ActiveValue::Set(normalize_required(&self.category, "category")?),
            note: ActiveValue::Set(normalize_optional(self.note)),
            occurred_at: ActiveValue::Set(self.occurred_at.unwrap_or(now)),
            invoice_id: ActiveValue::Set(self.invoice_id),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CashFlowUpdate {
    pub kind: Option<String>,
    pub amount_cents: Option<IntUpdate>,
    pub category: Option<String>,
    pub note: Option<Option<String>>,
    pub occurred_at: Option<DateTimeUtc>,
    pub invoice_id: Option<Option<String>>,
}

impl UpdateInput<Entity> for CashFlowUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .text(Column::Kind, &self.kind, |v| {
                normalize_required(v, "cash flow type")
            })?
            .int(Column::AmountCents, &self.amount_cents)?
            .text(Column::Category, &self.category, |v| {
                normalize_required(v, "category")
            })?
            .set_nullable(Column::Note, &self.note)
            .set(Column::OccurredAt, &self.occurred_at)
            .set_nullable(Column::InvoiceId, &self.invoice_id)
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CashFlowInclude {
    pub invoice: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CashFlowWith {
    #[serde(flatten)]
    pub cash_flow: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<invoices::Model>,
}

#[async_trait]
impl Include<Entity> for CashFlowInclude {
    type Output = CashFlowWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<CashFlowWith>>
    where
        C: ConnectionTrait,
    {
        let invoice_rows = if self.invoice {
            include::parents::<invoices::Entity, _>(
                conn,
                rows.iter().filter_map(|f| f.invoice_id.clone()),
                |invoice| invoice.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|cash_flow| CashFlowWith {
                invoice: cash_flow
                    .invoice_id
                    .as_ref()
                    .and_then(|id| invoice_rows.get(id))
                    .cloned(),
                cash_flow,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "cash flow";

    type Where = CashFlowWhere;
    type Unique = CashFlowKey;
    type Create = CashFlowCreate;
    type Update = CashFlowUpdate;

    fn primary_column() -> Column {
        Column::Id
    }

    fn created_at_column() -> Column {
        Column::CreatedAt
    }

    fn updated_at_column() -> Column {
        Column::UpdatedAt
    }
}
