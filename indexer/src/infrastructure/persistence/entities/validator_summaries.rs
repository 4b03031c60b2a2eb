//! SeaORM Entity for validator_summaries table

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "validator_summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub time_interval: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub time_bucket: DateTime<Utc>,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub stash_account: String,
    pub index_version: i64,
    pub count: i64,
    #[sea_orm(column_type = "Text")]
    pub active_balance_min: String,
    #[sea_orm(column_type = "Text")]
    pub active_balance_avg: String,
    #[sea_orm(column_type = "Text")]
    pub active_balance_max: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
