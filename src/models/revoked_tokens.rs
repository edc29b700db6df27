// ============================================================================
// MODÈLE : REVOKED TOKENS
// ============================================================================
//
// Description:
//   Blacklist des refresh tokens invalidés par un logout.
//   Table en ajout seul : on insère le jti, on ne le retire jamais.
//   Consultée à chaque refresh / verify quand SESSION_BLACKLIST_ENABLED=true.
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revoked_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub jti: String,

    pub user_id: i32,

    pub expires_at: DateTimeUtc,

    pub revoked_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
