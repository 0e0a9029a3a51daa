//! Purchases of materials from suppliers.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine,
    ops::{
        Assignments, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate, ManyFilter,
        Resource, StringFilter, UniqueInput, UpdateInput, WhereBuilder, WhereInput, include,
    },
    purchase_items,
    util::{new_id, normalize_optional, normalize_required},
};

pub const DEFAULT_STATUS: &str = "draft";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub code: Option<String>,
    pub supplier: Option<String>,
    pub status: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub purchased_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_items::Entity")]
    PurchaseItems,
}

impl Related<purchase_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseWhere {
    pub id: Option<StringFilter>,
    pub code: Option<StringFilter>,
    pub supplier: Option<StringFilter>,
    pub status: Option<StringFilter>,
    pub subtotal_cents: Option<IntFilter>,
    pub discount_cents: Option<IntFilter>,
    pub tax_cents: Option<IntFilter>,
    pub total_cents: Option<IntFilter>,
    pub notes: Option<StringFilter>,
    pub purchased_at: Option<DateTimeFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub items: Option<ManyFilter<purchase_items::PurchaseItemWhere>>,
    pub and: Vec<PurchaseWhere>,
    pub or: Vec<PurchaseWhere>,
    pub not: Vec<PurchaseWhere>,
}

impl WhereInput for PurchaseWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Code, &self.code)
            .string(Column::Supplier, &self.supplier)
            .string(Column::Status, &self.status)
            .scalar(Column::SubtotalCents, &self.subtotal_cents)
            .scalar(Column::DiscountCents, &self.discount_cents)
            .scalar(Column::TaxCents, &self.tax_cents)
            .scalar(Column::TotalCents, &self.total_cents)
            .string(Column::Notes, &self.notes)
            .scalar(Column::PurchasedAt, &self.purchased_at)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_many::<purchase_items::Entity, _>(
                Column::Id,
                purchase_items::Column::PurchaseId,
                &self.items,
            )
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseKey {
    Id(String),
    Code(String),
}

impl UniqueInput for PurchaseKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
            Self::Code(code) => Condition::all().add(Column::Code.eq(code.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseCreate {
    pub id: Option<String>,
    pub code: Option<String>,
    pub supplier: Option<String>,
    pub status: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    /// Defaults to the insert time.
    pub purchased_at: Option<DateTimeUtc>,
}

impl CreateInput<Entity> for PurchaseCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        let status = match self.status {
            Some(status) => normalize_required(&status, "status")?,
            None => DEFAULT_STATUS.to_string(),
        };
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            code: ActiveValue::Set(normalize_optional(self.code)),
            supplier: ActiveValue::Set(normalize_optional(self.supplier)),
            status: ActiveValue::Set(status),
            subtotal_cents: ActiveValue::Set(self.subtotal_cents),
            discount_cents: ActiveValue::Set(self.discount_cents),
            tax_cents: ActiveValue::Set(self.tax_cents),
            total_cents: ActiveValue::Set(self.total_cents),
            notes: ActiveValue::Set(normalize_optional(self.notes)),
            purchased_at: ActiveValue::Set(self.purchased_at.unwrap_or(now)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseUpdate {
    pub code: Option<Option<String>>,
    pub supplier: Option<Option<String>>,
    pub status: Option<String>,
    pub subtotal_cents: Option<IntUpdate>,
    pub discount_cents: Option<IntUpdate>,
    pub tax_cents: Option<IntUpdate>,
    pub total_cents: Option<IntUpdate>,
    pub notes: Option<Option<String>>,
    pub purchased_at: Option<DateTimeUtc>,
}

impl UpdateInput<Entity> for PurchaseUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .set_nullable(Column::Code, &self.code)
            .set_nullable(Column::Supplier, &self.supplier)
            .text(Column::Status, &self.status, |v| normalize_required(v, "status"))?
            .int(Column::SubtotalCents, &self.subtotal_cents)?
            .int(Column::DiscountCents, &self.discount_cents)?
            .int(Column::TaxCents, &self.tax_cents)?
            .int(Column::TotalCents, &self.total_cents)?
            .set_nullable(Column::Notes, &self.notes)
            .set(Column::PurchasedAt, &self.purchased_at)
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurchaseInclude {
    pub items: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseWith {
    #[serde(flatten)]
    pub purchase: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<purchase_items::Model>>,
}

#[async_trait]
impl Include<Entity> for PurchaseInclude {
    type Output = PurchaseWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<PurchaseWith>>
    where
        C: ConnectionTrait,
    {
        let mut items = if self.items {
            include::children::<purchase_items::Entity, _>(
                conn,
                purchase_items::Column::PurchaseId,
                rows.iter().map(|p| p.id.clone()),
                |item| Some(item.purchase_id.clone()),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|purchase| PurchaseWith {
                items: self
                    .items
                    .then(|| items.remove(&purchase.id).unwrap_or_default()),
                purchase,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "purchase";

    type Where = PurchaseWhere;
    type Unique = PurchaseKey;
    type Create = PurchaseCreate;
    type Update = PurchaseUpdate;

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
