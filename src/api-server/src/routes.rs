//! Route definitions for the API server
//!
//! Everything except `/health` and `/metrics` lives under `/api/v1`.

use crate::{handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use permreg_registry::{Action, ContextualBehavior, FieldConstraint, GeneralConstraint, Scope};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// CRUD routes for one catalog mounted at `path`
fn catalog_routes<T: permreg_registry::CatalogRecord>(
    router: Router<Arc<AppState>>,
    path: &str,
) -> Router<Arc<AppState>> {
    router
        .route(
            path,
            post(handlers::create_catalog_entry::<T>).get(handlers::list_catalog_entries::<T>),
        )
        .route(
            &format!("{}/:key", path),
            get(handlers::get_catalog_entry::<T>)
                .put(handlers::update_catalog_entry::<T>)
                .delete(handlers::delete_catalog_entry::<T>),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Roles
        .route("/roles", post(handlers::create_role).get(handlers::list_roles))
        .route(
            "/roles/:id",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        .route("/roles/:id/ancestors", get(handlers::role_ancestors))
        .route("/roles/:id/descendants", get(handlers::role_descendants))
        .route("/roles/:id/children", get(handlers::role_children))
        .route("/roles/:id/parents", get(handlers::role_parents))
        .route(
            "/roles/:id/pbus/:pbu_id/constraints",
            get(handlers::constraint_view),
        )
        .route(
            "/roles/:id/:kind",
            post(handlers::create_override).get(handlers::list_overrides),
        )
        .route(
            "/roles/:id/:kind/:target",
            axum::routing::delete(handlers::delete_override),
        )
        // Inheritance edges
        .route("/role-inheritance", post(handlers::create_edge))
        .route(
            "/role-inheritance/:parent/:child",
            axum::routing::delete(handlers::delete_edge),
        )
        // PBUs
        .route("/pbus", post(handlers::create_pbu).get(handlers::list_pbus))
        .route(
            "/pbus/:id",
            get(handlers::get_pbu)
                .put(handlers::update_pbu)
                .delete(handlers::delete_pbu),
        )
        .route(
            "/pbus/:id/:kind",
            post(handlers::create_association).get(handlers::list_associations),
        )
        .route(
            "/pbus/:id/:kind/:target",
            axum::routing::delete(handlers::delete_association),
        );

    // Catalogs
    let api_routes = catalog_routes::<Action>(api_routes, "/actions");
    let api_routes = catalog_routes::<Scope>(api_routes, "/scopes");
    let api_routes = catalog_routes::<GeneralConstraint>(api_routes, "/general-constraints");
    let api_routes = catalog_routes::<FieldConstraint>(api_routes, "/field-constraints");
    let api_routes = catalog_routes::<ContextualBehavior>(api_routes, "/behaviors");

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", api_routes)
        .with_state(state)
        // Executed bottom to top
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}
