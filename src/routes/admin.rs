use actix_web::{HttpResponse, get, put, web};

use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::dto::{ListUsersQuery, UpdateStatusRequest};
use crate::services::admin_service::AdminService;

/// GET /api/v1/user/list/?role=&fleet_id=&is_online=&status=&page=&per_page= (STAFF)
#[get("/list/")]
pub async fn list_users(
    StaffUser(caller): StaffUser,
    query: web::Query<ListUsersQuery>,
    admin: web::Data<AdminService>,
) -> Result<HttpResponse, AppError> {
    let page = admin.list_users(&caller, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// PUT /api/v1/user/status/{id}/ (STAFF)
#[put("/status/{id}/")]
pub async fn update_user_status(
    StaffUser(caller): StaffUser,
    path: web::Path<i32>,
    body: web::Json<UpdateStatusRequest>,
    admin: web::Data<AdminService>,
) -> Result<HttpResponse, AppError> {
    let account = admin
        .update_status(&caller, path.into_inner(), &body)
        .await?;
    Ok(HttpResponse::Ok().json(account))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_users).service(update_user_status);
}
