//! Back-office users.
//!
//! `password` holds an already hashed credential; the data layer never
//! inspects it. Emails are stored trimmed, NFC-normalized and lowercased.

use sea_orm::{
    ActiveValue,
    entity::prelude::*,
    sea_query::{Condition, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine,
    ops::{
        Assignments, BoolFilter, CreateInput, DateTimeFilter, Resource, ScalarFilter,
        StringFilter, UniqueInput, UpdateInput, WhereBuilder, WhereInput,
    },
    util::{new_id, normalize_email, normalize_required},
};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[default]
    #[sea_orm(string_value = "USER")]
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserWhere {
    pub id: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub password: Option<StringFilter>,
    pub role: Option<ScalarFilter<Role>>,
    pub is_active: Option<BoolFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub and: Vec<UserWhere>,
    pub or: Vec<UserWhere>,
    pub not: Vec<UserWhere>,
}

impl WhereInput for UserWhere {
    fn condition(&self) -> Condition {
        WhereBuilder::new()
            .string(Column::Id, &self.id)
            .string(Column::Email, &self.email.as_ref().map(canonical_email))
            .string(Column::Name, &self.name)
            .string(Column::Password, &self.password)
            .scalar(Column::Role, &self.role)
            .scalar(Column::IsActive, &self.is_active)
            .scalar(Column::CreatedAt, &self.created_at)
            .scalar(Column::UpdatedAt, &self.updated_at)
            .logical(&self.and, &self.or, &self.not)
            .build()
    }
}

/// Compared values take the stored canonical form. Pattern fields
/// (`contains`, ...) are left as given.
fn canonical_email(filter: &StringFilter) -> StringFilter {
    StringFilter {
        scalar: filter.scalar.map(|email| {
            normalize_email(email).unwrap_or_else(|_| email.trim().to_lowercase())
        }),
        ..filter.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserKey {
    Id(String),
    Email(String),
}

impl UniqueInput for UserKey {
    fn condition(&self) -> Condition {
        match self {
            Self::Id(id) => Condition::all().add(Column::Id.eq(id.clone())),
            // Lookups use the stored canonical form.
            Self::Email(email) => Condition::all().add(
                Column::Email.eq(normalize_email(email).unwrap_or_else(|_| email.clone())),
            ),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserCreate {
    pub id: Option<String>,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl CreateInput<Entity> for UserCreate {
    fn into_active_model(self, now: DateTimeUtc) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.unwrap_or_else(new_id)),
            email: ActiveValue::Set(normalize_email(&self.email)?),
            name: ActiveValue::Set(normalize_required(&self.name, "user name")?),
            password: ActiveValue::Set(normalize_required(&self.password, "password")?),
            role: ActiveValue::Set(self.role.unwrap_or_default()),
            is_active: ActiveValue::Set(self.is_active.unwrap_or(true)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UpdateInput<Entity> for UserUpdate {
    fn assignments(&self) -> ResultEngine<Vec<(Column, SimpleExpr)>> {
        Ok(Assignments::new()
            .text(Column::Email, &self.email, normalize_email)?
            .text(Column::Name, &self.name, |v| normalize_required(v, "user name"))?
            .text(Column::Password, &self.password, |v| {
                normalize_required(v, "password")
            })?
            .set(Column::Role, &self.role)
            .set(Column::IsActive, &self.is_active)
            .build())
    }
}

impl Resource for Entity {
    const LABEL: &'static str = "user";

    type Where = UserWhere;
    type Unique = UserKey;
    type Create = UserCreate;
    type Update = UserUpdate;

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
