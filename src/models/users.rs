// ============================================================================
// MODÈLE : USERS (comptes)
// ============================================================================
//
// Description:
//   Compte utilisateur (rider, driver, staff, admin) + son état de cycle de vie.
//
// Points d'attention:
//   - email unique, stocké en minuscules
//   - status n'est modifié que par services::lifecycle
//   - password_hash et session_secret ne sont jamais sérialisés en JSON
//   - email_verified_at non null => le compte a été activé au moins une fois
//   - driver_details / bank_accounts : 1:1, supprimés avec le compte
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "rider")]
    Rider,
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "staff")]
    Staff,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "rider",
            Role::Driver => "driver",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Seuls riders et drivers sont soumis aux changements de statut admin
    pub fn is_status_managed(&self) -> bool {
        matches!(self, Role::Rider | Role::Driver)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(Role::Rider),
            "driver" => Ok(Role::Driver),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("\"{}\" is not a valid role.", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "banned")]
    Banned,
    #[sea_orm(string_value = "reject")]
    Reject,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Banned => "banned",
            AccountStatus::Reject => "reject",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "banned" => Ok(AccountStatus::Banned),
            "reject" => Ok(AccountStatus::Reject),
            other => Err(format!("\"{}\" is not a valid status.", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[sea_orm(string_value = "male")]
    Male,
    #[sea_orm(string_value = "female")]
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err("Invalid gender choice.".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    #[sea_orm(unique)]
    pub username: Option<String>,

    #[serde(skip_serializing)]
    pub password_hash: String, // Format: pbkdf2_sha256$iterations$salt$hash

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub timezone: String,

    pub role: Role,
    pub status: AccountStatus,
    pub login_type: String,

    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub is_online: bool,
    pub fleet_id: Option<i64>,
    pub fcm_token: Option<String>,

    pub email_verified_at: Option<DateTimeUtc>,

    #[serde(skip_serializing)]
    pub session_secret: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Compte activé et non suspendu : seul état autorisé à se connecter
    pub fn can_authenticate(&self) -> bool {
        self.is_active && self.status == AccountStatus::Active
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::driver_details::Entity")]
    DriverDetail,

    #[sea_orm(has_one = "super::bank_accounts::Entity")]
    BankAccount,
}

impl Related<super::driver_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DriverDetail.def()
    }
}

impl Related<super::bank_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
