//! SeaORM Entity for reports table
//! One audit row per pipeline run

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub kind: String,
    pub index_version: i64,
    pub start_height: i64,
    pub end_height: i64,
    pub success_count: Option<i64>,
    pub error_count: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_msg: Option<String>,
    pub duration_ms: Option<i64>,
    pub last_good_height: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
