//! Raw materials bought from suppliers.
//!
//! `quantity` is stock on hand in `10^-quantity_scale` units, see
//! [`Quantity`](crate::Quantity).

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, Query, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Quantity, ResultEngine,
    ops::{
        Assignments, BoolFilter, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate,
        ManyFilter, Resource, ScalarFilter, StringFilter, UniqueInput, UpdateInput, WhereBuilder,
        WhereInput, include,
    },
    purchase_items,
    util::{new_id, normalize_optional, normalize_required},
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: Option<String>,
    pub cost_cents: i64,
    pub quantity: i64,
    pub unit: String,
    pub quantity_scale: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Stock on hand as a fixed-point quantity.
    pub fn stock(&self) -> ResultEngine<Quantity> {
        Quantity::new(self.quantity, self.quantity_scale)
    }
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
pub struct MaterialWhere {
    pub id: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub sku: Option<StringFilter>,
    pub cost_cents: Option<IntFilter>,
    pub quantity: Option<IntFilter>,
    pub unit: Option<StringFilter>,
    pub quantity_scale: Option<ScalarFilter<i32>>,
    pub description: Option<StringFilter>,
    pub category: Option<StringFilter>,
    pub supplier: Option<StringFilter>,
    pub is_active: Option<BoolFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub purchase_items: Option<ManyFilter<purchase_items::PurchaseItemWhere>>,
    pub and: Vec<MaterialWhere>,
    pub or: Vec<MaterialWhere>,
    pub not: Vec<MaterialWhere>,
}

impl WhereInput for MaterialWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Name, &self.name)
            .string(Column::Sku, &self.sku)
            .scalar(Column::CostCents, &self.cost_cents)
            .scalar(Column::Quantity, &self.quantity)
            .string(Column::Unit, &self.unit)
            .scalar(Column::QuantityScale, &self.quantity_scale)
            .string(Column::Description, &self.description)
            .string(Column::Category, &self.category)
            .string(Column::Supplier, &self.supplier)
            .scalar(Column::IsActive, &self.is_active)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_many::<purchase_items::Entity, _>(
                Column::Id,
                purchase_items::Column::MaterialId,
                &self.purchase_items,
            )
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterialKey {
    Id(String),
    Sku(String),
}

impl UniqueInput for MaterialKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
            Self::Sku(sku) => Condition::all().add(Column::Sku.eq(sku.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialCreate {
    pub id: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    pub cost_cents: i64,
    pub quantity: i64,
    pub unit: String,
    pub quantity_scale: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateInput<Entity> for MaterialCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Quantity::new(self.quantity, self.quantity_scale)?;
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            name: ActiveValue::Set(normalize_required(&self.name, "material name")?),
            sku: ActiveValue::Set(normalize_optional(self.sku)),
            cost_cents: ActiveValue::Set(self.cost_cents),
            quantity: ActiveValue::Set(self.quantity),
            unit: ActiveValue::Set(normalize_required(&self.unit, "unit")?),
            quantity_scale: ActiveValue::Set(self.quantity_scale),
            description: ActiveValue::Set(normalize_optional(self.description)),
            category: ActiveValue::Set(normalize_optional(self.category)),
            supplier: ActiveValue::Set(normalize_optional(self.supplier)),
            is_active: ActiveValue::Set(self.is_active.unwrap_or(true)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialUpdate {
    pub name: Option<String>,
    pub sku: Option<Option<String>>,
    pub cost_cents: Option<IntUpdate>,
    pub quantity: Option<IntUpdate>,
    pub unit: Option<String>,
    pub quantity_scale: Option<i32>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub supplier: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[async_trait]
impl UpdateInput<Entity> for MaterialUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        if let Some(scale) = self.quantity_scale {
            Quantity::new(0, scale)?;
        }
        Ok(Assignments::new()
            .text(Column::Name, &self.name, |v| {
                normalize_required(v, "material name")
            })?
            .set_nullable(Column::Sku, &self.sku)
            .int(Column::CostCents, &self.cost_cents)?
            .int(Column::Quantity, &self.quantity)?
            .text(Column::Unit, &self.unit, |v| normalize_required(v, "unit"))?
            .set(Column::QuantityScale, &self.quantity_scale)
            .set_nullable(Column::Description, &self.description)
            .set_nullable(Column::Category, &self.category)
            .set_nullable(Column::Supplier, &self.supplier)
            .set(Column::IsActive, &self.is_active)
            .build())
    }

    /// A scale change reinterprets the stored stock and every purchase item
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
                .column(purchase_items::Column::MaterialId)
                .from(purchase_items::Entity)
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
                "quantity_scale cannot change on a material with stock or purchase items".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaterialInclude {
    pub purchase_items: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterialWith {
    #[serde(flatten)]
    pub material: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_items: Option<Vec<purchase_items::Model>>,
}

#[async_trait]
impl Include<Entity> for MaterialInclude {
    type Output = MaterialWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<MaterialWith>>
    where
        C: ConnectionTrait,
    {
        let mut items = if self.purchase_items {
            include::children::<purchase_items::Entity, _>(
                conn,
                purchase_items::Column::MaterialId,
                rows.iter().map(|m| m.id.clone()),
                |item| Some(item.material_id.clone()),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|material| MaterialWith {
                purchase_items: self
                    .purchase_items
                    .then(|| items.remove(&material.id).unwrap_or_default()),
                material,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "material";

    type Where = MaterialWhere;
    type Unique = MaterialKey;
    type Create = MaterialCreate;
    type Update = MaterialUpdate;

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
