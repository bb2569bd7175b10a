use sea_orm::{entity::prelude::*, Set, ConnectionTrait};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub date_joined: DateTimeWithTimeZone,
    pub last_login: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Credentials,
    Question,
    Vote,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Credentials => Entity::has_one(crate::user_credentials::Entity).into(),
            Relation::Question => Entity::has_many(crate::question::Entity).into(),
            Relation::Vote => Entity::has_many(crate::vote::Entity).into(),
        }
    }
}

impl Related<crate::user_credentials::Entity> for Entity {
    fn to() -> RelationDef { Relation::Credentials.def() }
}

impl Related<crate::question::Entity> for Entity {
    fn to() -> RelationDef { Relation::Question.def() }
}

impl Related<crate::vote::Entity> for Entity {
    fn to() -> RelationDef { Relation::Vote.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// Insert a user after re-checking field rules. `email` is stored normalized.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<Model, ModelError> {
    validate::username(username)?;
    if !email.is_empty() {
        validate::email(email)?;
    }
    validate::optional_text(first_name, validate::NAME_MAX)?;
    validate::optional_text(last_name, validate::NAME_MAX)?;
    let am = ActiveModel {
        username: Set(username.to_string()),
        email: Set(validate::normalize_email(email)),
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        is_active: Set(true),
        email_verified: Set(false),
        date_joined: Set(Utc::now().into()),
        last_login: Set(None),
        ..Default::default()
    };
    Ok(am.insert(db).await?)
}
