//! End-to-end registry tests over the in-memory store
//!
//! Covers the documented registry properties through the public facade:
//! naming, depth limits, cycle rejection, association set semantics and the
//! application directory failure policies.

use async_trait::async_trait;
use permreg_registry::{
    Action, ApplicationDirectory, ConstraintKind, DirectoryError, DirectoryFailurePolicy,
    FieldConstraint, GeneralConstraint, InMemoryRegistryStore, NewPbu, NewRole,
    PermissionRegistry, RegistryConfig, RegistryError, RoleFilter, RoleUpdate, Scope,
    StaticApplicationDirectory,
};
use std::sync::Arc;

struct UnreachableDirectory;

#[async_trait]
impl ApplicationDirectory for UnreachableDirectory {
    async fn is_active_application(&self, _app_code: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    async fn is_active_module(&self, _app_code: &str, _module_code: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }
}

fn registry_with(directory: Arc<dyn ApplicationDirectory>, policy: DirectoryFailurePolicy) -> PermissionRegistry {
    PermissionRegistry::new(
        Arc::new(InMemoryRegistryStore::new()),
        directory,
        RegistryConfig::default().with_directory_failure_policy(policy),
    )
    .unwrap()
}

async fn seed_catalogs(registry: &PermissionRegistry) {
    let catalogs = registry.catalogs();
    for (code, active) in [("READ", true), ("WRITE", true), ("ARCHIVE", false)] {
        catalogs
            .create(Action {
                code: code.to_string(),
                display_name: code.to_string(),
                description: String::new(),
                is_active: active,
            })
            .await
            .unwrap();
    }
    for code in ["OWN", "TEAM", "ALL"] {
        catalogs
            .create(Scope {
                code: code.to_string(),
                display_name: code.to_string(),
                description: String::new(),
                is_active: true,
            })
            .await
            .unwrap();
    }
    catalogs
        .create(GeneralConstraint {
            constraint_id: "GC_SAME_DEPT".to_string(),
            display_name: "Same department".to_string(),
            description: String::new(),
            rule: r#"{"eq": ["resource.dept", "user.dept"]}"#.to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    catalogs
        .create(FieldConstraint {
            constraint_id: "FC_MASK_SALARY".to_string(),
            display_name: "Mask salary".to_string(),
            description: String::new(),
            field_path: "employee.salary".to_string(),
            rule: r#"{"mask": true}"#.to_string(),
            is_active: true,
        })
        .await
        .unwrap();
}

async fn create_roles(registry: &PermissionRegistry, ids: &[&str]) {
    for id in ids {
        registry
            .roles()
            .create(NewRole::new(*id, *id))
            .await
            .unwrap();
    }
}

fn pbu(id: &str, action: &str, scope: &str) -> NewPbu {
    NewPbu {
        pbu_id: id.to_string(),
        display_name: id.to_string(),
        api_endpoint: "/api/invoices".to_string(),
        action_code: action.to_string(),
        scope_code: scope.to_string(),
        is_active: true,
    }
}

#[tokio::test]
async fn test_depth_limit_at_three() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["HR.CORE.L0", "HR.CORE.L1", "HR.CORE.L2", "HR.CORE.L3", "HR.CORE.L4"]).await;
    let graph = registry.hierarchy();

    graph.create_edge("HR.CORE.L0", "HR.CORE.L1", None).await.unwrap();
    graph.create_edge("HR.CORE.L1", "HR.CORE.L2", None).await.unwrap();
    assert_eq!(registry.roles().get("HR.CORE.L2").await.unwrap().inheritance_depth, 2);

    graph.create_edge("HR.CORE.L2", "HR.CORE.L3", None).await.unwrap();
    assert_eq!(registry.roles().get("HR.CORE.L3").await.unwrap().inheritance_depth, 3);

    let err = graph.create_edge("HR.CORE.L3", "HR.CORE.L4", None).await.unwrap_err();
    assert_eq!(err.code(), "BAD_REQUEST");
    assert!(graph.get_parents("HR.CORE.L4").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closing_edge_leaves_chain_untouched() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["OPS.DESK.A", "OPS.DESK.B", "OPS.DESK.C", "OPS.DESK.D"]).await;
    let graph = registry.hierarchy();

    graph.create_edge("OPS.DESK.A", "OPS.DESK.B", None).await.unwrap();
    graph.create_edge("OPS.DESK.B", "OPS.DESK.C", None).await.unwrap();
    graph.create_edge("OPS.DESK.C", "OPS.DESK.D", None).await.unwrap();

    let err = graph.create_edge("OPS.DESK.D", "OPS.DESK.A", None).await.unwrap_err();
    assert!(matches!(err, RegistryError::Conflict(_)));

    assert!(graph.get_parents("OPS.DESK.A").await.unwrap().is_empty());
    assert!(graph.get_children("OPS.DESK.D").await.unwrap().is_empty());
    let descendants = graph.descendants("OPS.DESK.A").await.unwrap();
    assert_eq!(descendants.len(), 3);
}

#[tokio::test]
async fn test_removing_only_parent_resets_depth() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["FIN.AP.CLERK", "FIN.AP.LEAD"]).await;

    registry
        .hierarchy()
        .create_edge("FIN.AP.CLERK", "FIN.AP.LEAD", Some("cfo".to_string()))
        .await
        .unwrap();
    registry.hierarchy().delete_edge("FIN.AP.CLERK", "FIN.AP.LEAD").await.unwrap();

    assert_eq!(registry.roles().get("FIN.AP.LEAD").await.unwrap().inheritance_depth, 0);
}

#[tokio::test]
async fn test_role_creation_rules() {
    let registry = PermissionRegistry::in_memory().unwrap();

    let role = registry
        .roles()
        .create(NewRole::new("HR.LEAVE.APPROVER", "Leave approver"))
        .await
        .unwrap();
    assert_eq!(role.app_code, "HR");
    assert_eq!(role.module_code, "LEAVE");
    assert_eq!(role.role_function, "APPROVER");
    assert_eq!(role.inheritance_depth, 0);
    assert_eq!(role.version, 1);

    let dup = registry
        .roles()
        .create(NewRole::new("HR.LEAVE.APPROVER", "Again"))
        .await
        .unwrap_err();
    assert!(matches!(dup, RegistryError::Conflict(_)));

    let bad = registry
        .roles()
        .create(NewRole::new("hr.leave.approver", "Lowercase app"))
        .await
        .unwrap_err();
    assert!(matches!(bad, RegistryError::BadRequest(_)));

    let mut mismatched = NewRole::new("HR.LEAVE.VIEWER", "Viewer");
    mismatched.module_code = Some("PAYROLL".to_string());
    let err = registry.roles().create(mismatched).await.unwrap_err();
    assert!(matches!(err, RegistryError::BadRequest(_)));
}

#[tokio::test]
async fn test_role_update_and_filters() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["HR.LEAVE.VIEWER", "HR.PAYROLL.VIEWER", "FIN.AP.CLERK"]).await;

    let updated = registry
        .roles()
        .update(
            "HR.LEAVE.VIEWER",
            RoleUpdate {
                is_active: Some(false),
                expected_version: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.version, 2);

    let hr = registry
        .roles()
        .list(&RoleFilter {
            app_code: Some("HR".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(hr.len(), 2);

    let active_hr = registry
        .roles()
        .list(&RoleFilter {
            app_code: Some("HR".to_string()),
            active_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active_hr.len(), 1);
    assert_eq!(active_hr[0].role_id, "HR.PAYROLL.VIEWER");

    let stale = registry
        .roles()
        .update(
            "HR.LEAVE.VIEWER",
            RoleUpdate {
                display_name: Some("Viewer".to_string()),
                expected_version: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(stale, RegistryError::Conflict(_)));
}

#[tokio::test]
async fn test_role_delete_cascades_edges() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["HR.CORE.BASE", "HR.CORE.MID", "HR.CORE.TOP"]).await;
    let graph = registry.hierarchy();

    graph.create_edge("HR.CORE.BASE", "HR.CORE.MID", None).await.unwrap();
    graph.create_edge("HR.CORE.MID", "HR.CORE.TOP", None).await.unwrap();

    registry.roles().delete("HR.CORE.MID").await.unwrap();

    assert!(matches!(
        registry.roles().get("HR.CORE.MID").await,
        Err(RegistryError::NotFound(_))
    ));
    assert!(graph.get_children("HR.CORE.BASE").await.unwrap().is_empty());
    assert_eq!(registry.roles().get("HR.CORE.TOP").await.unwrap().inheritance_depth, 0);
}

#[tokio::test]
async fn test_directory_rejects_inactive_module() {
    let directory = StaticApplicationDirectory::new().with_application("HR", ["LEAVE"]);
    let registry = registry_with(Arc::new(directory), DirectoryFailurePolicy::FailClosed);

    registry
        .roles()
        .create(NewRole::new("HR.LEAVE.VIEWER", "Viewer"))
        .await
        .unwrap();

    let err = registry
        .roles()
        .create(NewRole::new("HR.PAYROLL.VIEWER", "Viewer"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::BadRequest(_)));

    let err = registry
        .roles()
        .create(NewRole::new("CRM.LEADS.VIEWER", "Viewer"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::BadRequest(_)));
}

#[tokio::test]
async fn test_unreachable_directory_fail_open() {
    let registry = registry_with(Arc::new(UnreachableDirectory), DirectoryFailurePolicy::FailOpen);

    registry
        .roles()
        .create(NewRole::new("HR.LEAVE.VIEWER", "Viewer"))
        .await
        .unwrap();
    assert_eq!(registry.metrics().directory_fail_open_total.get(), 1);
}

#[tokio::test]
async fn test_unreachable_directory_fail_closed() {
    let registry = registry_with(Arc::new(UnreachableDirectory), DirectoryFailurePolicy::FailClosed);

    let err = registry
        .roles()
        .create(NewRole::new("HR.LEAVE.VIEWER", "Viewer"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Internal(_)));
    assert!(registry.roles().list(&RoleFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pbu_with_inactive_action_not_persisted() {
    let registry = PermissionRegistry::in_memory().unwrap();
    seed_catalogs(&registry).await;

    let err = registry
        .pbus()
        .create(pbu("PBU_INVOICE_ARCHIVE_OWN", "ARCHIVE", "OWN"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::BadRequest(_)));
    assert!(matches!(
        registry.pbus().get("PBU_INVOICE_ARCHIVE_OWN").await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_association_and_override_view() {
    let registry = PermissionRegistry::in_memory().unwrap();
    seed_catalogs(&registry).await;
    create_roles(&registry, &["FIN.AP.CLERK"]).await;
    registry
        .pbus()
        .create(pbu("PBU_INVOICE_READ_TEAM", "READ", "TEAM"))
        .await
        .unwrap();

    let assoc = registry.associations();
    assoc
        .associate(ConstraintKind::General, "PBU_INVOICE_READ_TEAM", "GC_SAME_DEPT")
        .await
        .unwrap();
    let dup = assoc
        .associate(ConstraintKind::General, "PBU_INVOICE_READ_TEAM", "GC_SAME_DEPT")
        .await
        .unwrap_err();
    assert!(matches!(dup, RegistryError::Conflict(_)));
    assert_eq!(
        assoc.list(ConstraintKind::General, "PBU_INVOICE_READ_TEAM").await.unwrap().len(),
        1
    );

    registry
        .overrides()
        .add_override(ConstraintKind::Field, "FIN.AP.CLERK", "FC_MASK_SALARY")
        .await
        .unwrap();

    let view = registry
        .constraint_view("FIN.AP.CLERK", "PBU_INVOICE_READ_TEAM")
        .await
        .unwrap();
    let general = view.for_kind(ConstraintKind::General).unwrap();
    assert_eq!(general.pbu_associations, vec!["GC_SAME_DEPT".to_string()]);
    assert!(general.role_overrides.is_empty());

    let field = view.for_kind(ConstraintKind::Field).unwrap();
    assert!(field.pbu_associations.is_empty());
    assert_eq!(field.role_overrides, vec!["FC_MASK_SALARY".to_string()]);

    let behavior = view.for_kind(ConstraintKind::Behavior).unwrap();
    assert!(behavior.pbu_associations.is_empty() && behavior.role_overrides.is_empty());

    let err = registry
        .constraint_view("FIN.AP.NOBODY", "PBU_INVOICE_READ_TEAM")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn test_pbu_delete_leaves_associations() {
    let registry = PermissionRegistry::in_memory().unwrap();
    seed_catalogs(&registry).await;
    registry
        .pbus()
        .create(pbu("PBU_INVOICE_WRITE_OWN", "WRITE", "OWN"))
        .await
        .unwrap();
    registry
        .associations()
        .associate(ConstraintKind::General, "PBU_INVOICE_WRITE_OWN", "GC_SAME_DEPT")
        .await
        .unwrap();

    registry.pbus().delete("PBU_INVOICE_WRITE_OWN").await.unwrap();

    let left = registry
        .associations()
        .list(ConstraintKind::General, "PBU_INVOICE_WRITE_OWN")
        .await
        .unwrap();
    assert_eq!(left, vec!["GC_SAME_DEPT".to_string()]);
}

#[tokio::test]
async fn test_mutations_are_counted() {
    let registry = PermissionRegistry::in_memory().unwrap();
    create_roles(&registry, &["HR.CORE.A"]).await;
    let _ = registry.hierarchy().create_edge("HR.CORE.A", "HR.CORE.A", None).await;

    let metrics = registry.metrics();
    assert_eq!(
        metrics.mutations_total.with_label_values(&["create_role", "ok"]).get(),
        1
    );
    assert_eq!(
        metrics
            .mutations_total
            .with_label_values(&["create_edge", "BAD_REQUEST"])
            .get(),
        1
    );
    assert!(metrics.encode().unwrap().contains("permreg_mutations_total"));
}
