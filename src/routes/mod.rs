use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod artifacts;
pub mod auth;
pub mod companies;
pub mod document_types;
pub mod documents;
pub mod health;
pub mod managers;
pub mod notifications;
pub mod partners;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify-email", post(auth::verify_email))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let users_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id/status", patch(users::update_status));

    let companies_routes = Router::new()
        .route(
            "/",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/:id",
            get(companies::get_company)
                .patch(companies::update_company)
                .delete(companies::delete_company),
        )
        .route(
            "/:id/partners",
            get(partners::list_partners).post(partners::create_partner),
        )
        .route(
            "/:id/partners/:partner_id",
            patch(partners::update_partner).delete(partners::delete_partner),
        )
        .route(
            "/:id/managers",
            get(managers::list_managers).post(managers::create_manager),
        )
        .route(
            "/:id/managers/:manager_id",
            patch(managers::update_manager).delete(managers::delete_manager),
        );

    let document_types_routes = Router::new()
        .route(
            "/",
            get(document_types::list_document_types).post(document_types::create_document_type),
        )
        .route(
            "/:id",
            patch(document_types::update_document_type)
                .delete(document_types::delete_document_type),
        );

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::generate_document),
        )
        .route(
            "/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/:id/regenerate", post(documents::regenerate_document))
        .route("/:id/upload", post(documents::upload_document))
        .route("/:id/export", get(documents::export_document))
        .route("/:id/send", post(documents::send_document));

    let notifications_routes =
        Router::new().route("/", get(notifications::list_notifications));

    let templates_routes = Router::new().route("/", get(document_types::list_templates));

    let public_routes = Router::new().route("/public/pv/:filename", get(artifacts::serve_artifact));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/companies", companies_routes)
        .nest("/api/document-types", document_types_routes)
        .nest("/api/templates", templates_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/notifications", notifications_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
