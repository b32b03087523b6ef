//! HTTP handlers
//!
//! Thin adapters: validate the body, call the registry, wrap the result.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use permreg_registry::{
    CatalogRecord, ConstraintKind, ConstraintView, PbuFilter, PermissionBundleUnit, Role,
    RoleFilter, RoleInheritanceEdge,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{ApiError, Result},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::*,
    state::AppState,
};

type AppStateRef = State<Arc<AppState>>;

fn constraint_kind(segment: &str) -> Result<ConstraintKind> {
    ConstraintKind::from_path_segment(segment)
        .ok_or_else(|| ApiError::NotFound(format!("unknown constraint kind '{}'", segment)))
}

// ============================================================================
// Health & Metrics
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): AppStateRef) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        backend: state.registry.backend_name().to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): AppStateRef) -> Result<impl IntoResponse> {
    let body = state.registry.metrics().encode()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// ============================================================================
// Roles
// ============================================================================

pub async fn create_role(
    State(state): AppStateRef,
    ApiJson(req): ApiJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>)> {
    req.validate()?;
    let role = state.registry.roles().create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn list_roles(
    State(state): AppStateRef,
    ApiQuery(filter): ApiQuery<RoleFilter>,
) -> Result<Json<ListResponse<Role>>> {
    let roles = state.registry.roles().list(&filter).await?;
    Ok(Json(roles.into()))
}

pub async fn get_role(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Role>> {
    Ok(Json(state.registry.roles().get(&id).await?))
}

pub async fn update_role(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> Result<Json<Role>> {
    req.validate()?;
    Ok(Json(state.registry.roles().update(&id, req.into()).await?))
}

pub async fn delete_role(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode> {
    state.registry.roles().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_ancestors(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<RelatedRolesResponse>> {
    let role_ids = state.registry.hierarchy().ancestors(&id).await?;
    Ok(Json(RelatedRolesResponse {
        role_id: id,
        role_ids: role_ids.into_iter().collect(),
    }))
}

pub async fn role_descendants(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<RelatedRolesResponse>> {
    let role_ids = state.registry.hierarchy().descendants(&id).await?;
    Ok(Json(RelatedRolesResponse {
        role_id: id,
        role_ids: role_ids.into_iter().collect(),
    }))
}

pub async fn role_children(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<EdgesResponse>> {
    let edges = state.registry.hierarchy().get_children(&id).await?;
    Ok(Json(EdgesResponse { role_id: id, edges }))
}

pub async fn role_parents(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<EdgesResponse>> {
    let edges = state.registry.hierarchy().get_parents(&id).await?;
    Ok(Json(EdgesResponse { role_id: id, edges }))
}

// ============================================================================
// Role Inheritance
// ============================================================================

pub async fn create_edge(
    State(state): AppStateRef,
    ApiJson(req): ApiJson<CreateEdgeRequest>,
) -> Result<(StatusCode, Json<RoleInheritanceEdge>)> {
    req.validate()?;
    let edge = state
        .registry
        .hierarchy()
        .create_edge(&req.parent_role_id, &req.child_role_id, req.approved_by)
        .await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn delete_edge(
    State(state): AppStateRef,
    ApiPath((parent, child)): ApiPath<(String, String)>,
) -> Result<StatusCode> {
    state.registry.hierarchy().delete_edge(&parent, &child).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Permission Bundle Units
// ============================================================================

pub async fn create_pbu(
    State(state): AppStateRef,
    ApiJson(req): ApiJson<CreatePbuRequest>,
) -> Result<(StatusCode, Json<PermissionBundleUnit>)> {
    req.validate()?;
    let pbu = state.registry.pbus().create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(pbu)))
}

pub async fn list_pbus(
    State(state): AppStateRef,
    ApiQuery(filter): ApiQuery<PbuFilter>,
) -> Result<Json<ListResponse<PermissionBundleUnit>>> {
    let pbus = state.registry.pbus().list(&filter).await?;
    Ok(Json(pbus.into()))
}

pub async fn get_pbu(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<PermissionBundleUnit>> {
    Ok(Json(state.registry.pbus().get(&id).await?))
}

pub async fn update_pbu(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdatePbuRequest>,
) -> Result<Json<PermissionBundleUnit>> {
    req.validate()?;
    Ok(Json(state.registry.pbus().update(&id, req.into()).await?))
}

pub async fn delete_pbu(
    State(state): AppStateRef,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode> {
    state.registry.pbus().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Associations (PBU) & Overrides (Role)
// ============================================================================

pub async fn create_association(
    State(state): AppStateRef,
    ApiPath((pbu_id, kind)): ApiPath<(String, String)>,
    ApiJson(req): ApiJson<LinkRequest>,
) -> Result<(StatusCode, Json<LinksResponse>)> {
    let kind = constraint_kind(&kind)?;
    req.validate()?;
    let associations = state.registry.associations();
    associations.associate(kind, &pbu_id, &req.target_id).await?;
    let target_ids = associations.list(kind, &pbu_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(LinksResponse {
            owner_id: pbu_id,
            kind,
            target_ids,
        }),
    ))
}

pub async fn list_associations(
    State(state): AppStateRef,
    ApiPath((pbu_id, kind)): ApiPath<(String, String)>,
) -> Result<Json<LinksResponse>> {
    let kind = constraint_kind(&kind)?;
    let target_ids = state.registry.associations().list(kind, &pbu_id).await?;
    Ok(Json(LinksResponse {
        owner_id: pbu_id,
        kind,
        target_ids,
    }))
}

pub async fn delete_association(
    State(state): AppStateRef,
    ApiPath((pbu_id, kind, target_id)): ApiPath<(String, String, String)>,
) -> Result<StatusCode> {
    let kind = constraint_kind(&kind)?;
    state
        .registry
        .associations()
        .remove(kind, &pbu_id, &target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_override(
    State(state): AppStateRef,
    ApiPath((role_id, kind)): ApiPath<(String, String)>,
    ApiJson(req): ApiJson<LinkRequest>,
) -> Result<(StatusCode, Json<LinksResponse>)> {
    let kind = constraint_kind(&kind)?;
    req.validate()?;
    let overrides = state.registry.overrides();
    overrides.add_override(kind, &role_id, &req.target_id).await?;
    let target_ids = overrides.list(kind, &role_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(LinksResponse {
            owner_id: role_id,
            kind,
            target_ids,
        }),
    ))
}

pub async fn list_overrides(
    State(state): AppStateRef,
    ApiPath((role_id, kind)): ApiPath<(String, String)>,
) -> Result<Json<LinksResponse>> {
    let kind = constraint_kind(&kind)?;
    let target_ids = state.registry.overrides().list(kind, &role_id).await?;
    Ok(Json(LinksResponse {
        owner_id: role_id,
        kind,
        target_ids,
    }))
}

pub async fn delete_override(
    State(state): AppStateRef,
    ApiPath((role_id, kind, target_id)): ApiPath<(String, String, String)>,
) -> Result<StatusCode> {
    let kind = constraint_kind(&kind)?;
    state
        .registry
        .overrides()
        .remove(kind, &role_id, &target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PBU associations and role overrides side by side
pub async fn constraint_view(
    State(state): AppStateRef,
    ApiPath((role_id, pbu_id)): ApiPath<(String, String)>,
) -> Result<Json<ConstraintView>> {
    Ok(Json(state.registry.constraint_view(&role_id, &pbu_id).await?))
}

// ============================================================================
// Catalogs
// ============================================================================

pub async fn create_catalog_entry<T: CatalogRecord>(
    State(state): AppStateRef,
    ApiJson(record): ApiJson<T>,
) -> Result<(StatusCode, Json<T>)> {
    let record = state.registry.catalogs().create(record).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_catalog_entries<T: CatalogRecord>(
    State(state): AppStateRef,
) -> Result<Json<ListResponse<T>>> {
    let records = state.registry.catalogs().list::<T>().await?;
    Ok(Json(records.into()))
}

pub async fn get_catalog_entry<T: CatalogRecord>(
    State(state): AppStateRef,
    ApiPath(key): ApiPath<String>,
) -> Result<Json<T>> {
    Ok(Json(state.registry.catalogs().get::<T>(&key).await?))
}

pub async fn update_catalog_entry<T: CatalogRecord>(
    State(state): AppStateRef,
    ApiPath(key): ApiPath<String>,
    ApiJson(record): ApiJson<T>,
) -> Result<Json<T>> {
    Ok(Json(state.registry.catalogs().update(&key, record).await?))
}

pub async fn delete_catalog_entry<T: CatalogRecord>(
    State(state): AppStateRef,
    ApiPath(key): ApiPath<String>,
) -> Result<StatusCode> {
    state.registry.catalogs().delete(T::KIND, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
