// ============================================================================
// MODÈLE : DRIVER DETAILS
// ============================================================================
//
// Description:
//   Fiche véhicule + adresses de travail / domicile d'un driver.
//   Créée vide à l'inscription du driver (1:1 avec users, jamais partagée).
//
// Points d'attention:
//   - user_id UNIQUE : une seule fiche par compte
//   - supprimée avec le compte (services::auth::delete_account)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "driver_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub user_id: i32,

    pub car_model: Option<String>,
    pub car_color: Option<String>,
    pub car_plate_number: Option<String>,
    pub car_production_year: Option<i32>,

    pub work_address: Option<String>,
    pub work_latitude: Option<f64>,
    pub work_longitude: Option<f64>,

    pub home_address: Option<String>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
