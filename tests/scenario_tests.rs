use wfdef_rust::bootstrap::in_memory_manager;
use wfdef_rust::config::AppConfig;
use wfdef_rust::{DefinitionManager, DefinitionRevision, InMemoryDefinitionStore, InMemoryInstanceTracker, LifecycleError,
                 NewDefinition, OrderBy, OrderField, Page, ServiceContext, Version};

fn config() -> AppConfig {
    AppConfig { tenant_id: 5, user_id: 50, user_name: "Scenario User".into(), database_url: None }
}

fn approval(version: u32, content: &str) -> NewDefinition {
    NewDefinition { name: "approval".into(),
                    title: "Approval".into(),
                    description: "approval flow".into(),
                    content: content.into(),
                    version }
}

fn history(manager: &DefinitionManager<InMemoryDefinitionStore>, ctx: &ServiceContext) -> Vec<(Version, bool)> {
    manager.get_definition_versions(ctx, "approval", Page::ALL, OrderBy::asc(OrderField::Version))
           .unwrap()
           .into_iter()
           .map(|v| (v.version, v.active))
           .collect()
}

#[test]
fn add_activate_update_reactivate() {
    let cfg = config();
    let ctx = cfg.context();
    let manager = in_memory_manager(&cfg, InMemoryInstanceTracker::new());

    let added = manager.add_definition(&ctx, &approval(1, "<c1/>")).unwrap();
    assert_eq!(added.user_name, "Scenario User");
    manager.activate_exclusive(&ctx, added.definition_id, 10).unwrap();

    let head = manager.get_latest_definition(&ctx, "approval").unwrap();
    let revision = DefinitionRevision { name: "approval".into(),
                                        title: head.title.clone(),
                                        description: head.description.clone(),
                                        content: "<c2/>".into() };
    let updated = manager.update_definition(&ctx, &revision, &head).unwrap();
    assert_eq!((updated.version, updated.active), (2, false));

    assert_eq!(history(&manager, &ctx), vec![(Version::new(1, 0), true), (Version::new(2, 0), false)]);

    manager.activate_exclusive(&ctx, updated.definition_id, 20).unwrap();
    assert_eq!(history(&manager, &ctx), vec![(Version::new(1, 0), false), (Version::new(2, 0), true)]);
}

#[test]
fn by_name_activation_falls_back_to_latest() {
    let cfg = config();
    let ctx = cfg.context();
    let manager = in_memory_manager(&cfg, InMemoryInstanceTracker::new());
    let added = manager.add_definition(&ctx, &approval(1, "<c1/>")).unwrap();
    let revision = DefinitionRevision { name: "approval".into(),
                                        title: "Approval".into(),
                                        description: "d".into(),
                                        content: "<c2/>".into() };
    manager.update_definition(&ctx, &revision, &added).unwrap();

    manager.activate_by_name(&ctx, "approval", 3).unwrap();
    let latest = manager.get_latest_definition_version(&ctx, added.definition_id).unwrap();
    assert_eq!(latest.version, Version::new(2, 0));
    assert!(latest.active);
}

#[test]
fn running_instance_blocks_delete_until_completed() {
    let cfg = config();
    let ctx = cfg.context();
    let instances = InMemoryInstanceTracker::new();
    let manager = in_memory_manager(&cfg, instances.clone());
    let added = manager.add_definition(&ctx, &approval(1, "<c1/>")).unwrap();

    instances.start(added.definition_id, Some(Version::new(1, 0)));
    let err = manager.delete_definition(&ctx, "approval", 1).unwrap_err();
    assert!(matches!(err, LifecycleError::Conflict { .. }));

    instances.complete(added.definition_id, Some(Version::new(1, 0)));
    manager.delete_definition(&ctx, "approval", 1).unwrap();
    assert!(manager.fetch_latest_definition(&ctx, "approval").unwrap().is_none());
}
