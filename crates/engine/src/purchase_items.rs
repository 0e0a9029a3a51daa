//! Purchase lines. `quantity` is expressed in the scale of the material.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ConnectionTrait,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine, line_total_cents, materials,
    ops::{
        Assignments, CreateInput, DateTimeFilter, Include, IntFilter, IntUpdate, RelationFilter,
        Resource, StringFilter, UniqueInput, UpdateInput, WhereBuilder, WhereInput, include,
    },
    purchases,
    util::new_id,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub purchase_id: String,
    pub material_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchases::Entity",
        from = "Column::PurchaseId",
        to = "super::purchases::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Purchase,
    #[sea_orm(
        belongs_to = "super::materials::Entity",
        from = "Column::MaterialId",
        to = "super::materials::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Material,
}

impl Related<purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl Related<materials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseItemWhere {
    pub id: Option<StringFilter>,
    pub purchase_id: Option<StringFilter>,
    pub material_id: Option<StringFilter>,
    pub quantity: Option<IntFilter>,
    pub unit_cost_cents: Option<IntFilter>,
    pub line_total_cents: Option<IntFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub purchase: Option<RelationFilter<purchases::PurchaseWhere>>,
    pub material: Option<RelationFilter<materials::MaterialWhere>>,
    pub and: Vec<PurchaseItemWhere>,
    pub or: Vec<PurchaseItemWhere>,
    pub not: Vec<PurchaseItemWhere>,
}

impl WhereInput for PurchaseItemWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::PurchaseId, &self.purchase_id)
            .string(Column::MaterialId, &self.material_id)
            .scalar(Column::Quantity, &self.quantity)
            .scalar(Column::UnitCostCents, &self.unit_cost_cents)
            .scalar(Column::LineTotalCents, &self.line_total_cents)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_one::<purchases::Entity, _>(Column::PurchaseId, &self.purchase)
            .to_one::<materials::Entity, _>(Column::MaterialId, &self.material)
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseItemKey {
    Id(String),
}

impl UniqueInput for PurchaseItemKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseItemCreate {
    pub id: Option<String>,
    pub purchase_id: String,
    pub material_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

impl PurchaseItemCreate {
    /// A line buying `quantity` (in the material's scale) at `unit_cost_cents`,
    /// with the line total computed.
    pub fn priced(
        purchase_id: impl Into<String>,
        material: &materials::Model,
        quantity: i64,
        unit_cost_cents: i64,
    ) -> ResultEngine<Self> {
        Ok(Self {
            id: None,
            purchase_id: purchase_id.into(),
            material_id: material.id.clone(),
            quantity,
            unit_cost_cents,
            line_total_cents: line_total_cents(quantity, material.quantity_scale, unit_cost_cents)?,
        })
    }
}

impl CreateInput<Entity> for PurchaseItemCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            purchase_id: ActiveValue::Set(self.purchase_id),
            material_id: ActiveValue::Set(self.material_id),
            quantity: ActiveValue::Set(self.quantity),
            unit_cost_cents: ActiveValue::Set(self.unit_cost_cents),
            line_total_cents: ActiveValue::Set(self.line_total_cents),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PurchaseItemUpdate {
    pub purchase_id: Option<String>,
    pub material_id: Option<String>,
    pub quantity: Option<IntUpdate>,
    pub unit_cost_cents: Option<IntUpdate>,
    pub line_total_cents: Option<IntUpdate>,
}

impl UpdateInput<Entity> for PurchaseItemUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .set(Column::PurchaseId, &self.purchase_id)
            .set(Column::MaterialId, &self.material_id)
            .int(Column::Quantity, &self.quantity)?
            .int(Column::UnitCostCents, &self.unit_cost_cents)?
            .int(Column::LineTotalCents, &self.line_total_cents)?
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurchaseItemInclude {
    pub purchase: bool,
    pub material: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseItemWith {
    #[serde(flatten)]
    pub item: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase: Option<purchases::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<materials::Model>,
}

#[async_trait]
impl Include<Entity> for PurchaseItemInclude {
    type Output = PurchaseItemWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<PurchaseItemWith>>
    where
        C: ConnectionTrait,
    {
        let purchase_rows = if self.purchase {
            include::parents::<purchases::Entity, _>(
                conn,
                rows.iter().map(|i| i.purchase_id.clone()),
                |purchase| purchase.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };
        let material_rows = if self.material {
            include::parents::<materials::Entity, _>(
                conn,
                rows.iter().map(|i| i.material_id.clone()),
                |material| material.id.clone(),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|item| PurchaseItemWith {
                purchase: purchase_rows.get(&item.purchase_id).cloned(),
                material: material_rows.get(&item.material_id).cloned(),
                item,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "purchase item";

    type Where = PurchaseItemWhere;
    type Unique = PurchaseItemKey;
    type Create = PurchaseItemCreate;
    type Update = PurchaseItemUpdate;

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
