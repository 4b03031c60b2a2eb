//! SeaORM Entity for reward_era_seqs table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reward_era_seqs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub era: i64,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub validator_stash_account: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub stash_account: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub kind: String,
    pub start_height: i64,
    pub end_height: i64,
    #[sea_orm(column_type = "Text")]
    pub amount: String,
    pub claimed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
