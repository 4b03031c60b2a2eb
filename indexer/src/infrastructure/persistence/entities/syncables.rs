//! SeaORM Entity for syncables table
//! One progress marker per indexed height

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "syncables")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub height: i64,
    pub time: DateTime<Utc>,
    #[sea_orm(column_type = "Text")]
    pub spec_version: String,
    #[sea_orm(column_type = "Text")]
    pub chain_uid: String,
    pub session: i64,
    pub era: i64,
    pub last_in_session: bool,
    pub last_in_era: bool,
    pub index_version: i64,
    #[sea_orm(column_type = "Text")]
    pub status: String,
    pub report_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
