use actix_web::{get, web, HttpResponse};
use log::error;

use crate::db::Database;

#[get("/actuator/health")]
pub async fn health_check(database: web::Data<Database>) -> HttpResponse {
    match database.health_check().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "UP" })),
        Err(err) => {
            error!("Health check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({ "status": "DOWN" }))
        }
    }
}
