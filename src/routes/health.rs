use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::models::health::HealthResponse;

#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database = match db.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            "down"
        }
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
        time: Utc::now(),
    };

    HttpResponse::Ok().json(response)
}
