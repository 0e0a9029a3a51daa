//! Invoice lines. `quantity` is expressed in the scale of the product.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine, invoices, line_total_cents,
    ops::{
        Assignments, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate, RelationFilter,
        Resource, StringFilter, UniqueInput, UpdateInput, WhereBuilder, WhereInput, include,
    },
    products,
    util::new_id,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
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
        on_delete = "Restrict"
    )]
    Invoice,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl Related<products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceItemWhere {
    pub id: Option<StringFilter>,
    pub invoice_id: Option<StringFilter>,
    pub product_id: Option<StringFilter>,
    pub quantity: Option<IntFilter>,
    pub unit_price_cents: Option<IntFilter>,
    pub line_total_cents: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub invoice: Option<RelationFilter<invoices::InvoiceWhere>>,
    pub product: Option<RelationFilter<products::ProductWhere>>,
    pub and: Vec<InvoiceItemWhere>,
    pub or: Vec<InvoiceItemWhere>,
    pub not: Vec<InvoiceItemWhere>,
}

impl WhereInput for InvoiceItemWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::InvoiceId, &self.invoice_id)
            .string(Column::ProductId, &self.product_id)
            .scalar(Column::Quantity, &self.quantity)
            .scalar(Column::UnitPriceCents, &self.unit_price_cents)
            .scalar(Column::LineTotalCents, &self.line_total_cents)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_one::<invoices::Entity, _>(Column::InvoiceId, &self.invoice)
            .to_one::<products::Entity, _>(Column::ProductId, &self.product)
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvoiceItemKey {
    Id(String),
}

impl UniqueInput for InvoiceItemKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceItemCreate {
    pub id: Option<String>,
    pub invoice_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl InvoiceItemCreate {
    /// A line selling `quantity` (in the product's scale) at the product's
    /// current price, with the line total computed.
    pub fn priced(
        invoice_id: impl Into<String>,
        product: &products::Model,
        quantity: i64,
    ) -> ResultEngine<Self> {
        Ok(Self {
            id: None,
            invoice_id: invoice_id.into(),
            product_id: product.id.clone(),
            quantity,
            unit_price_cents: product.price_cents,
            line_total_cents: line_total_cents(
                quantity,
                product.quantity_scale,
                product.price_cents,
            )?,
        })
    }
}

impl CreateInput<Entity> for InvoiceItemCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            invoice_id: ActiveValue::Set(self.invoice_id),
            product_id: ActiveValue::Set(self.product_id),
            quantity: ActiveValue::Set(self.quantity),
            unit_price_cents: ActiveValue::Set(self.unit_price_cents),
            line_total_cents: ActiveValue::Set(self.line_total_cents),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceItemUpdate {
    pub invoice_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<IntUpdate>,
    pub unit_price_cents: Option<IntUpdate>,
    pub line_total_cents: Option<IntUpdate>,
}

impl UpdateInput<Entity> for InvoiceItemUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .set(Column::InvoiceId, &self.invoice_id)
            .set(Column::ProductId, &self.product_id)
            .int(Column::Quantity, &self.quantity)?
            .int(Column::UnitPriceCents, &self.unit_price_cents)?
            .int(Column::LineTotalCents, &self.line_total_cents)?
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvoiceItemInclude {
    pub invoice: bool,
    pub product: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvoiceItemWith {
    #[serde(flatten)]
    pub item: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<invoices::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<products::Model>,
}

#[async_trait]
impl Include<Entity> for InvoiceItemInclude {
    type Output = InvoiceItemWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<InvoiceItemWith>>
    where
        C: ConnectionTrait,
    {
        let invoice_rows = if self.invoice {
            include::parents::<invoices::Entity, _>(
                conn,
                rows.iter().map(|i| i.invoice_id.clone()),
                |invoice| invoice.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };
        let product_rows = if self.product {
            include::parents::<products::Entity, _>(
                conn,
                rows.iter().map(|i| i.product_id.clone()),
                |product| product.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|item| InvoiceItemWith {
                invoice: invoice_rows.get(&item.invoice_id).cloned(),
                product: product_rows.get(&item.product_id).cloned(),
                item,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "invoice item";

    type Where = InvoiceItemWhere;
    type Unique = InvoiceItemKey;
    type Create = InvoiceItemCreate;
    type Update = InvoiceItemUpdate;

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
