//! Sales invoices.
//!
//! Totals are stored as given; [`InvoiceCreate::with_totals`] derives
//! `total_cents` from subtotal, discount and tax for callers that want it.
//! `status` is free-form text and defaults to `"draft"`.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MoneyCents, ResultEngine, cash_flows, customers, invoice_items,
    ops::{
        Assignments, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate, ManyFilter,
        RelationFilter, Resource, StringFilter, UniqueInput, UpdateInput, WhereBuilder,
        WhereInput, include,
    },
    util::{new_id, normalize_optional, normalize_required},
};

pub const DEFAULT_STATUS: &str = "draft";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub code: Option<String>,
    pub status: String,
    pub customer_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Customer,
    #[sea_orm(has_many = "super::invoice_items::Entity")]
    InvoiceItems,
    #[sea_orm(has_many = "super::cash_flows::Entity")]
    CashFlows,
}

impl Related<customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<invoice_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceItems.def()
    }
}

impl Related<cash_flows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashFlows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceWhere {
    pub id: Option<StringFilter>,
    pub code: Option<StringFilter>,
    pub status: Option<StringFilter>,
    pub customer_id: Option<StringFilter>,
    pub subtotal_cents: Option<IntFilter>,
    pub discount_cents: Option<IntFilter>,
    pub tax_cents: Option<IntFilter>,
    pub total_cents: Option<IntFilter>,
    pub paid_at: Option<DateTimeFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub customer: Option<RelationFilter<customers::CustomerWhere>>,
    pub items: Option<ManyFilter<invoice_items::InvoiceItemWhere>>,
    pub cash_flows: Option<ManyFilter<cash_flows::CashFlowWhere>>,
    pub and: Vec<InvoiceWhere>,
    pub or: Vec<InvoiceWhere>,
    pub not: Vec<InvoiceWhere>,
}

impl WhereInput for InvoiceWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Code, &self.code)
            .string(Column::Status, &self.status)
            .string(Column::CustomerId, &self.customer_id)
            .scalar(Column::SubtotalCents, &self.subtotal_cents)
            .scalar(Column::DiscountCents, &self.discount_cents)
            .scalar(Column::TaxCents, &self.tax_cents)
            .scalar(Column::TotalCents, &self.total_cents)
            .scalar(Column::PaidAt, &self.paid_at)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_one::<customers::Entity, _>(Column::CustomerId, &self.customer)
            .to_many::<invoice_items::Entity, _>(
                Column::Id,
                invoice_items::Column::InvoiceId,
                &self.items,
            )
            .to_many::<cash_flows::Entity, _>(
                Column::Id,
                cash_flows::Column::InvoiceId,
                &self.cash_flows,
            )
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvoiceKey {
    Id(String),
    Code(String),
}

impl UniqueInput for InvoiceKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
            Self::Code(code) => Condition::all().add(Column::Code.eq(code.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceCreate {
    pub id: Option<String>,
    pub code: Option<String>,
    pub status: Option<String>,
    pub customer_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_at: Option<DateTimeUtc>,
}

impl InvoiceCreate {
    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            ..Self::default()
        }
    }

    /// Set subtotal, discount and tax, and `total = subtotal - discount + tax`.
    pub fn with_totals(
        mut self,
        subtotal: MoneyCents,
        discount: MoneyCents,
        tax: MoneyCents,
    ) -> ResultEngine<Self> {
        let total = subtotal
            .checked_sub(discount)
            .and_then(|v| v.checked_add(tax))
            .ok_or_else(|| EngineError::InvalidAmount("invoice total too large".to_string()))?;
        self.subtotal_cents = subtotal.cents();
        self.discount_cents = discount.cents();
        self.tax_cents = tax.cents();
        self.total_cents = total.cents();
        Ok(self)
    }
}

impl CreateInput<Entity> for InvoiceCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        let status = match self.status {
            Some(status) => normalize_required(&status, "status")?,
            None => DEFAULT_STATUS.to_string(),
        };
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            code: ActiveValue::Set(normalize_optional(self.code)),
            status: ActiveValue::Set(status),
            customer_id: ActiveValue::Set(self.customer_id),
            subtotal_cents: ActiveValue::Set(self.subtotal_cents),
            discount_cents: ActiveValue::Set(self.discount_cents),
            tax_cents: ActiveValue::Set(self.tax_cents),
            total_cents: ActiveValue::Set(self.total_cents),
            paid_at: ActiveValue::Set(self.paid_at),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceUpdate {
    pub code: Option<Option<String>>,
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub subtotal_cents: Option<IntUpdate>,
    pub discount_cents: Option<IntUpdate>,
    pub tax_cents: Option<IntUpdate>,
    pub total_cents: Option<IntUpdate>,
    pub paid_at: Option<Option<DateTimeUtc>>,
}

impl UpdateInput<Entity> for InvoiceUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .set_nullable(Column::Code, &self.code)
            .text(Column::Status, &self.status, |v| normalize_required(v, "status"))?
            .set(Column::CustomerId, &self.customer_id)
            .int(Column::SubtotalCents, &self.subtotal_cents)?
            .int(Column::DiscountCents, &self.discount_cents)?
            .int(Column::TaxCents, &self.tax_cents)?
            .int(Column::TotalCents, &self.total_cents)?
            .set_nullable(Column::PaidAt, &self.paid_at)
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvoiceInclude {
    pub customer: bool,
    pub items: bool,
    pub cash_flows: bool,
}

impl InvoiceInclude {
    pub fn all() -> Self {
        Self {
            customer: true,
            items: true,
            cash_flows: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvoiceWith {
    #[serde(flatten)]
    pub invoice: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<customers::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<invoice_items::Model>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_flows: Option<Vec<cash_flows::Model>>,
}

#[async_trait]
impl Include<Entity> for InvoiceInclude {
    type Output = InvoiceWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<InvoiceWith>>
    where
        C: ConnectionTrait,
    {
        let owners = if self.customer {
            include::parents::<customers::Entity, _>(
                conn,
                rows.iter().map(|i| i.customer_id.clone()),
                |c| c.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };
        let mut items = if self.items {
            include::children::<invoice_items::Entity, _>(
                conn,
                invoice_items::Column::InvoiceId,
                rows.iter().map(|i| i.id.clone()),
                |item| Some(item.invoice_id.clone()),
            )
            .await?
        } else {
            HashMap::new()
        };
        let mut flows = if self.cash_flows {
            include::children::<cash_flows::Entity, _>(
                conn,
                cash_flows::Column::InvoiceId,
                rows.iter().map(|i| i.id.clone()),
                |flow| flow.invoice_id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|invoice| InvoiceWith {
                customer: owners.get(&invoice.customer_id).cloned(),
                items: self
                    .items
                    .then(|| items.remove(&invoice.id).unwrap_or_default()),
                cash_flows: self
                    .cash_flows
                    .then(|| flows.remove(&invoice.id).unwrap_or_default()),
                invoice,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "invoice";

    type Where = InvoiceWhere;
    type Unique = InvoiceKey;
    type Create = InvoiceCreate;
    type Update = InvoiceUpdate;

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
