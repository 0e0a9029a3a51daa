//! Customers invoices are issued to.

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
        Assignments, CreateInput, DateTimeFilter, Include, ManyFilter, Resource, StringFilter,
        UniqueInput, UpdateInput, WhereBuilder, WhereInput, include,
    },
    util::{new_id, normalize_optional, normalize_required},
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoices::Entity")]
    Invoices,
}

impl Related<invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerWhere {
    pub id: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub phone: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub address: Option<StringFilter>,
    pub notes: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub invoices: Option<ManyFilter<invoices::InvoiceWhere>>,
    pub and: Vec<CustomerWhere>,
    pub or: Vec<CustomerWhere>,
    pub not: Vec<CustomerWhere>,
}

impl WhereInput for CustomerWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Name, &self.name)
            .string(Column::Phone, &self.phone)
            .string(Column::Email, &self.email)
            .string(Column::Address, &self.address)
            .string(Column::Notes, &self.notes)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .to_many::<invoices::Entity, _>(
                Column::Id,
                invoices::Column::CustomerId,
                &self.invoices,
            )
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CustomerKey {
    Id(String),
}

impl UniqueInput for CustomerKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerCreate {
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl CustomerCreate {
    /// A customer with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl CreateInput<Entity> for CustomerCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            name: ActiveValue::Set(normalize_required(&self.name, "customer name")?),
            phone: ActiveValue::Set(normalize_optional(self.phone)),
            email: ActiveValue::Set(normalize_optional(self.email)),
            address: ActiveValue::Set(normalize_optional(self.address)),
            notes: ActiveValue::Set(normalize_optional(self.notes)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl UpdateInput<Entity> for CustomerUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .text(Column::Name, &self.name, |v| {
                normalize_required(v, "customer name")
            })?
            .set_nullable(Column::Phone, &self.phone)
            .set_nullable(Column::Email, &self.email)
            .set_nullable(Column::Address, &self.address)
            .set_nullable(Column::Notes, &self.notes)
            .build())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CustomerInclude {
    pub invoices: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomerWith {
    #[serde(flatten)]
    pub customer: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoices: Option<Vec<invoices::Model>>,
}

#[async_trait]
impl Include<Entity> for CustomerInclude {
    type Output = CustomerWith;

    async fn load<C>(&self, conn: &C, rows: Vec<Model>) -> ResultEngine<Vec<CustomerWith>>
    where
        C: ConnectionTrait,
    {
        let mut by_customer = if self.invoices {
            include::children::<invoices::Entity, _>(
                conn,
                invoices::Column::CustomerId,
                rows.iter().map(|c| c.id.clone()),
                |invoice| Some(invoice.customer_id.clone()),
            )
            .await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|customer| CustomerWith {
                invoices: self
                    .invoices
                    .then(|| by_customer.remove(&customer.id).unwrap_or_default()),
                customer,
            })
            .collect())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "customer";

    type Where = CustomerWhere;
    type Unique = CustomerKey;
    type Create = CustomerCreate;
    type Update = CustomerUpdate;

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
