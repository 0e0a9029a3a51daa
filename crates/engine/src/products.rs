//! Products sold to customers.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, Query, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MoneyCents, Quantity, ResultEngine, invoice_items,
    ops::{
        Assignments, BoolFilter, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate,
        ManyFilter, Resource, ScalarFilter, StringFilter, UniqueInput, UpdateInput, WhereBuilder,
        WhereInput, include,
    },
    util::{new_id, normalize_optional, normalize_required},
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub quantity: i64,
    pub unit: String,
    pub quantity_scale: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn stock(&self) -> ResultEngine<Quantity> {
        Quantity::new(self.quantity, self.quantity_scale)
    }

    /// Price minus cost of one unit.
    pub fn margin(&self) -> ResultEngine<MoneyCents> {
        MoneyCents::new(self.price_cents)
            .checked_sub(MoneyCents::new(self.cost_cents))
            .ok_or_else(|| EngineError::InvalidAmount("margin out of range".to_string()))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_items::Entity")]
    InvoiceItems,
}

impl Related<invoice_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductWhere {
    pub id: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub sku: Option<StringFilter>,
    pub price_cents: Option<IntFilter>,
    pub cost_cents: Option<IntFilter>,
    pub quantity: Option<IntFilter>,
    pub unit: Option<StringFilter>,
    pub quantity_scale: Option<ScalarFilter<i32>>,
    pub description: Option<StringFilter>,
    pub category: Option<StringFilter>,
    pub is_active: Option<BoolFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub invoice_items: Option<ManyFilter<invoice_items::InvoiceItemWhere>>,
    pub and: Vec<ProductWhere>,
    pub or: Vec<ProductWhere>,
    pub not: Vec<ProductWhere>,
}

impl WhereInput for ProductWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Name, &self.name)
            .string(Column::Sku, &self.sku)
            .scalar(Column::PriceCents, &self.price_cents)
            .scalar(Column::CostCents, &self.cost_cents)
            .scalar(Column::Quantity, &self.quantity)
            .string(Column::Unit, &self.unit)
            .scalar(Column::QuantityScale, &self.quantity_scale)
            .string(Column::Description, &self.description)
            .string(Column::Category, &self.category)
            .scalar(Column::IsActive, &self.is_active)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_many::<invoice_items::Entity, _>(
                Column::Id,
                invoice_items::Column::ProductId,
                &self.invoice_items,
            )
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductKey {
    Id(String),
    Sku(String),
}

impl UniqueInput for ProductKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
            Self::Sku(sku) => Condition::all().add(Column::Sku.eq(sku.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductCreate {
    pub id: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub quantity: i64,
    pub unit: String,
    pub quantity_scale: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateInput<Entity> for ProductCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Quantity::new(self.quantity, self.quantity_scale)?;
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            name: ActiveValue::Set(normalize_required(&self.name, "product name")?),
            sku: ActiveValue::Set(normalize_optional(self.sku)),
            price_cents: ActiveValue::Set(self.price_cents),
            cost_cents: ActiveValue::Set(self.cost_cents),
            quantity: ActiveValue::Set(self.quantity),
            unit: ActiveValue::Set(normalize_required(&self.unit, "unit")?),
            quantity_scale: ActiveValue::Set(self.quantity_scale),
            description: ActiveValue::Set(normalize_optional(self.description)),
            category: ActiveValue::Set(normalize_optional(self.category)),
            is_active: ActiveValue::Set(self.is_active.unwrap_or(true)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub sku: Option<Option<String>>,
    pub price_cents: Option<IntUpdate>,
    pub cost_cents: Option<IntUpdate>,
    pub quantity: Option<IntUpdate>,
    pub unit: Option<String>,
    pub quantity_scale: Option<i32>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[async_trait]
impl UpdateInput<Entity> for ProductUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        if let Some(scale) = self.quantity_scale {
            Quantity::new(0, scale)?;
        }
        Ok(Assignments::new()
            .text(Column::Name, &self.name, |v| {
                normalize_required(v, "product name")
            })?
            .set_nullable(Column::Sku, &self.sku)
            .int(Column::PriceCents, &self.price_cents)?
            .int(Column::CostCents, &self.cost_cents)?
            .int(Column::Quantity, &self.quantity)?
            .text(Column::Unit, &self.unit, |v| normalize_required(v, "unit"))?
            .set(Column::QuantityScale, &self.quantity_scale)
            .set_nullable(Column::Description, &self.description)
            .set_nullable(Column::Category, &self.category)
            .set(Column::IsActive, &self.is_active)
            .build())
    }

    /// A scale change reinterprets the stored stock and every invoice item
    /// quantity, so it is only allowed on rows without either. Stock set in the
    /// same update is read at the new scale.
    async fn check<C>(&self, conn: &C, target: Condition) -> ResultEngine<()>
    where
        C: ConnectionTrait,
    {
        let Some(scale) = self.quantity_scale else {
            return Ok(());
        };
        let referenced = Column::Id.in_subquery(
            Query::select()
                .column(invoice_items::Column::ProductId)
                .from(invoice_items::Entity)
                .to_owned(),
        );
        let in_use = match self.quantity {
            Some(IntUpdate::Set(_)) => Condition::any().add(referenced),
            _ => Condition::any().add(Column::Quantity.ne(0)).add(referenced),
        };
        let blocked = Entity::find()
            .filter(target)
            .filter(Column::QuantityScale.ne(scale))
            .filter(in_use)
            .count(conn)
            .await?;
        if blocked > 0 {
            return Err(EngineError::Validation(
                "quantity_scale cannot change on a product with stock or invoice items".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductInclude {
    pub invoice_items: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductWith {
    #[serde(flatten)]
    pub product: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_items: Option<Vec<invoice_items::Model>>,
}

#[async_trait]
impl Include<Entity> for ProductInclude {
    type Output = ProductWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<ProductWith>>
    where
        C: ConnectionTrait,
    {
        let mut items = if self.invoice_items {
            include::children::<invoice_items::Entity, _>(
                conn,
                invoice_items::Column::ProductId,
                rows.iter().map(|p| p.id.clone()),
                |item| Some(item.product_id.clone()),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|product| ProductWith {
                invoice_items: self
                    .invoice_items
                    .then(|| items.remove(&product.id).unwrap_or_default()),
                product,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "product";

    type Where = ProductWhere;
    type Unique = ProductKey;
    type Create = ProductCreate;
    type Update = ProductUpdate;

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
