use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{question, vote};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "choice")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub question_id: i32,
    pub choice_text: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Question,
    Vote,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Question => Entity::belongs_to(question::Entity)
                .from(Column::QuestionId)
                .to(question::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Relation::Vote => Entity::has_many(vote::Entity).into(),
        }
    }
}

impl Related<question::Entity> for Entity {
    fn to() -> RelationDef { Relation::Question.def() }
}

impl Related<vote::Entity> for Entity {
    fn to() -> RelationDef { Relation::Vote.def() }
}

impl ActiveModelBehavior for ActiveModel {}
