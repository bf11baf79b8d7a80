use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    get, post, web, HttpRequest, HttpResponse,
};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    config::Config,
    errors::AppError,
    models::dto::{
        request::{LoginRequest, RegisterRequest},
        response::MessageResponse,
    },
};

#[post("/api/v1/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.auth_service.login(request.into_inner()).await?;

    let cookie = session_cookie(&state.config, &response.refresh_token);
    Ok(HttpResponse::Ok().cookie(cookie).json(&response))
}

#[post("/api/v1/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.auth_service.register(request.into_inner()).await?;

    let cookie = session_cookie(&state.config, &response.refresh_token);
    Ok(HttpResponse::Created().cookie(cookie).json(&response))
}

/// Rotate the session: the token arrives in the HttpOnly cookie, never in
/// the body. A missing cookie is treated the same as an invalid token.
#[get("/api/v1/auth/refresh")]
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = req
        .cookie(&state.config.session_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    let response = state.auth_service.refresh(&token).await?;

    let cookie = session_cookie(&state.config, &response.refresh_token);
    Ok(HttpResponse::Ok().cookie(cookie).json(&response))
}

#[post("/api/v1/auth/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.auth_service.logout(&auth.0.email).await?;

    Ok(HttpResponse::Ok()
        .cookie(clear_session_cookie(&state.config))
        .json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }))
}

fn session_cookie<'a>(config: &Config, token: &'a str) -> Cookie<'a> {
    Cookie::build(config.session_cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .secure(config.session_cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::hours(config.session_ttl_hours))
        .finish()
}

fn clear_session_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build(config.session_cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(config.session_cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::ZERO)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = Config::test_config();
        config.session_cookie_secure = true;

        let cookie = session_cookie(&config, "raw-token");

        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.value(), "raw-token");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(
            cookie.max_age(),
            Some(CookieDuration::hours(config.session_ttl_hours))
        );
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let config = Config::test_config();
        let cookie = clear_session_cookie(&config);

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
