use sea_orm::*;
use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::dto::{ListUsersQuery, Paginated, PaginationMeta, UpdateStatusRequest};
use crate::models::users::{self, AccountStatus, Entity as Users, Role};
use crate::services::lifecycle::{LifecycleManager, admin_event};
use crate::utils::validators::non_blank;

pub const NOT_AUTHORIZED: &str = "You are not authorized to access this resource.";
pub const STATUS_ROLE_FORBIDDEN: &str =
    "You don't have permission to change status for this user type.";

#[derive(Clone)]
pub struct AdminService {
    db: DatabaseConnection,
    settings: Arc<Settings>,
    lifecycle: LifecycleManager,
}

/// Filtres du listing une fois validés
#[derive(Debug, Clone, PartialEq)]
struct UserFilter {
    role: Role,
    fleet_id: Option<i64>,
    is_online: Option<bool>,
    status: Option<AccountStatus>,
}

/// Taille de page demandée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageSize {
    All,
    Limit(u64),
}

impl AdminService {
    pub fn new(db: DatabaseConnection, settings: Arc<Settings>, lifecycle: LifecycleManager) -> Self {
        Self {
            db,
            settings,
            lifecycle,
        }
    }

    /// Listing paginé (staff / superuser). Le staff ne voit que riders et drivers.
    pub async fn list_users(
        &self,
        caller: &AuthUser,
        query: &ListUsersQuery,
    ) -> Result<Paginated<users::Model>> {
        if !caller.is_privileged() {
            return Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        let filter = parse_filter(query)?;
        if !caller.is_superuser && !filter.role.is_status_managed() {
            return Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        let mut condition = Condition::all().add(users::Column::Role.eq(filter.role));
        if let Some(fleet_id) = filter.fleet_id {
            condition = condition.add(users::Column::FleetId.eq(fleet_id));
        }
        if let Some(is_online) = filter.is_online {
            condition = condition.add(users::Column::IsOnline.eq(is_online));
        }
        if let Some(status) = filter.status {
            condition = condition.add(users::Column::Status.eq(status));
        }

        let select = Users::find()
            .filter(condition)
            .order_by_desc(users::Column::Id);

        let total_items = select.clone().count(&self.db).await?;

        let pagination = &self.settings.pagination;
        let per_page = match parse_page_size(query.per_page.as_deref(), pagination.default_per_page) {
            PageSize::All => total_items.max(1),
            PageSize::Limit(limit) => limit.min(pagination.max_per_page),
        };

        let total_pages = total_pages(total_items, per_page);
        let current_page = parse_page(query.page.as_deref(), total_pages)?;

        let results = select
            .paginate(&self.db, per_page)
            .fetch_page(current_page - 1)
            .await?;

        Ok(Paginated {
            count: total_items,
            results,
            pagination: PaginationMeta {
                total_items,
                per_page,
                current_page,
                total_pages,
            },
        })
    }

    /// Changement de statut d'un rider / driver par un admin
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        account_id: i32,
        req: &UpdateStatusRequest,
    ) -> Result<users::Model> {
        if !caller.is_privileged() {
            return Err(AppError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        let target = Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let status = non_blank(req.status.as_deref())
            .ok_or_else(|| AppError::Validation("Missing status parameter".to_string()))?;

        // Staff et admins ne passent jamais par ce endpoint
        if !target.role.is_status_managed() {
            return Err(AppError::Forbidden(STATUS_ROLE_FORBIDDEN.to_string()));
        }

        let event = admin_event(status)?;
        let updated = self.lifecycle.apply_admin_status(&target, event).await?;

        info!(
            admin_id = caller.user_id,
            user_id = updated.id,
            status = %updated.status,
            "status updated by admin"
        );
        Ok(updated)
    }
}

fn parse_filter(query: &ListUsersQuery) -> Result<UserFilter> {
    let role = match non_blank(query.role.as_deref()) {
        Some(raw) => raw
            .to_lowercase()
            .parse::<Role>()
            .map_err(|msg| AppError::field("role", msg))?,
        None => Role::Rider,
    };

    let fleet_id = non_blank(query.fleet_id.as_deref())
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| AppError::field("fleet_id", "A valid integer is required."))
        })
        .transpose()?;

    let is_online = non_blank(query.is_online.as_deref())
        .map(|raw| match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AppError::field("is_online", "Must be a valid boolean.")),
        })
        .transpose()?;

    let status = non_blank(query.status.as_deref())
        .map(|raw| {
            raw.to_lowercase()
                .parse::<AccountStatus>()
                .map_err(|msg| AppError::field("status", msg))
        })
        .transpose()?;

    Ok(UserFilter {
        role,
        fleet_id,
        is_online,
        status,
    })
}

/// -1 => tout ; >= 1 => valeur ; absent, 0 ou illisible => taille par défaut
fn parse_page_size(raw: Option<&str>, default: u64) -> PageSize {
    match raw.map(|r| r.trim().parse::<i64>()) {
        Some(Ok(-1)) => PageSize::All,
        Some(Ok(n)) if n >= 1 => PageSize::Limit(n as u64),
        _ => PageSize::Limit(default),
    }
}

fn total_pages(total_items: u64, per_page: u64) -> u64 {
    total_items.div_ceil(per_page).max(1)
}

/// Page 1 par défaut ; hors bornes ou illisible => 404
fn parse_page(raw: Option<&str>, total_pages: u64) -> Result<u64> {
    let invalid = || AppError::NotFound("Invalid page.".to_string());

    let page = match non_blank(raw) {
        None => 1,
        Some("last") => total_pages,
        Some(raw) => raw.parse::<u64>().map_err(|_| invalid())?,
    };

    if page < 1 || page > total_pages {
        return Err(invalid());
    }
    Ok(page)
}
