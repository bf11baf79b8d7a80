use actix_web::{get, web, HttpResponse};

use crate::{app_state::AppState, auth::AuthenticatedUser, errors::AppError};

/// Profile of the authenticated principal. The `AuthenticatedUser`
/// extractor is what makes this route protected.
#[get("/api/v1/users/me")]
pub async fn me(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let profile = state.user_service.get_profile(&auth.0.email).await?;
    Ok(HttpResponse::Ok().json(profile))
}
