//! SeaORM Entity for validator_era_seqs table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "validator_era_seqs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub era: i64,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub stash_account: String,
    pub start_height: i64,
    pub end_height: i64,
    pub index: i64,
    #[sea_orm(column_type = "Text")]
    pub controller_account: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub session_accounts: Json,
    #[sea_orm(column_type = "Text")]
    pub total_stake: String,
    #[sea_orm(column_type = "Text")]
    pub own_stake: String,
    #[sea_orm(column_type = "Text")]
    pub stakers_stake: String,
    pub reward_points: i64,
    pub commission: i64,
    pub stakers_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
