use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{choice, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub voter_id: i32,
    pub choice_id: i32,
    pub hide_voter: bool,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Voter,
    Choice,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Voter => Entity::belongs_to(user::Entity)
                .from(Column::VoterId)
                .to(user::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Relation::Choice => Entity::belongs_to(choice::Entity)
                .from(Column::ChoiceId)
                .to(choice::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
        }
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef { Relation::Voter.def() }
}

impl Related<choice::Entity> for Entity {
    fn to() -> RelationDef { Relation::Choice.def() }
}

impl ActiveModelBehavior for ActiveModel {}
