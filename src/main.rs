use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};

use shiken_server::{
    app_state::AppState, auth::AuthMiddleware, config::Config, db::Database, handlers,
    middleware::RequestIdMiddleware, rate_limit::RateLimitMiddleware,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        config.validate_for_production();
    }

    let database = Database::connect(&config)
        .await
        .expect("failed to connect to MongoDB");
    let state = AppState::new(config, &database)
        .await
        .expect("failed to initialise application state");

    let bind_addr = (
        state.config.web_server_host.clone(),
        state.config.web_server_port,
    );
    log::info!("Starting HTTP server on {}:{}", bind_addr.0, bind_addr.1);

    let state_data = web::Data::new(state.clone());
    let database_data = web::Data::new(database);

    HttpServer::new(move || {
        // Wrap order: the last-registered middleware runs first, so a
        // request passes Logger -> RequestId -> CORS -> rate limit ->
        // auth gate -> handler.
        App::new()
            .app_data(state_data.clone())
            .app_data(database_data.clone())
            .service(handlers::login)
            .service(handlers::register)
            .service(handlers::refresh)
            .service(handlers::logout)
            .service(handlers::me)
            .service(handlers::health_check)
            .wrap(AuthMiddleware::new(
                state.jwt_service.clone(),
                state.config.public_paths.clone(),
            ))
            .wrap(RateLimitMiddleware::new(
                state.rate_limit_store.clone(),
                state.config.rate_limit.clone(),
            ))
            .wrap(build_cors(&state.config.allowed_origins))
            .wrap(RequestIdMiddleware)
            .wrap(Logger::default())
    })
    .bind(bind_addr)?
    .run()
    .await
}

fn build_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"])
        .allow_any_header()
        .expose_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600);

    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}
