mod test_support;

use test_support::{fixture, new_definition, Fixture};
use wfdef_core::{DefinitionFilter, DefinitionRevision, Entity, LifecycleError, OrderBy, Page, Version};

fn active_versions(fx: &Fixture, name: &str) -> Vec<String> {
    fx.manager
      .get_definition_versions(&fx.ctx, name, Page::ALL, OrderBy::default())
      .unwrap()
      .into_iter()
      .filter(|v| v.active)
      .map(|v| v.version.to_string())
      .collect()
}

fn revision(content: &str) -> DefinitionRevision {
    DefinitionRevision { name: "approval".into(),
                         title: "Approval".into(),
                         description: "revised".into(),
                         content: content.into() }
}

#[test]
fn activate_update_reactivate_scenario() {
    let fx = fixture();
    let added = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    fx.manager.activate_exclusive(&fx.ctx, added.definition_id, 10).unwrap();
    let head = fx.manager.get_latest_definition(&fx.ctx, "approval").unwrap();
    assert!(head.active);
    assert_eq!(head.start_node_id, Some(10));

    let updated = fx.manager.update_definition(&fx.ctx, &revision("<c2/>"), &head).unwrap();
    assert_eq!(updated.version, 2);
    assert!(!updated.active);
    // la versión 1 sigue activa hasta la próxima activación exclusiva
    assert_eq!(active_versions(&fx, "approval"), vec!["1.0"]);

    fx.manager.activate_exclusive(&fx.ctx, updated.definition_id, 20).unwrap();
    assert_eq!(active_versions(&fx, "approval"), vec!["2.0"]);
    let v2 = fx.manager
               .get_definition_version(&fx.ctx, updated.definition_id, &Version::new(2, 0))
               .unwrap();
    assert_eq!(v2.start_node_id, Some(20));
    let v1 = fx.manager
               .get_definition_version(&fx.ctx, updated.definition_id, &Version::new(1, 0))
               .unwrap();
    assert!(!v1.active);
    assert_eq!(v1.start_node_id, Some(10));
    let head = fx.manager.get_latest_definition(&fx.ctx, "approval").unwrap();
    assert!(head.active);
    assert_eq!(head.start_node_id, Some(20));
}

#[test]
fn exclusive_activation_keeps_at_most_one_active_across_heads() {
    let fx = fixture();
    let ids: Vec<_> = (1..=3).map(|v| {
                                 fx.manager
                                   .add_definition(&fx.ctx, &new_definition("approval", v, "<c/>"))
                                   .unwrap()
                                   .definition_id
                             })
                             .collect();
    let other = fx.manager.add_definition(&fx.ctx, &new_definition("other", 1, "<o/>")).unwrap();
    fx.manager.activate_exclusive(&fx.ctx, other.definition_id, 1).unwrap();

    for (step, id) in [ids[0], ids[2], ids[1], ids[1], ids[0]].into_iter().enumerate() {
        fx.manager.activate_exclusive(&fx.ctx, id, step as i64).unwrap();
        assert_eq!(active_versions(&fx, "approval").len(), 1, "step {step}");
        let active_heads = fx.manager
                             .get_definitions_count(&fx.ctx, &DefinitionFilter::named("approval").with_active(true))
                             .unwrap();
        assert_eq!(active_heads, 1, "step {step}");
    }
    // otro nombre no se ve afectado
    assert_eq!(active_versions(&fx, "other"), vec!["1.0"]);
}

#[test]
fn exclusive_activation_of_unknown_id_is_not_found() {
    let fx = fixture();
    let err = fx.manager.activate_exclusive(&fx.ctx, uuid::Uuid::new_v4(), 1).unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { entity: Entity::Definition, .. }));
}

#[test]
fn flag_only_activation_does_not_deactivate_siblings() {
    let fx = fixture();
    let first = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    let second = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 2, "<c2/>")).unwrap();
    fx.manager.activate_exclusive(&fx.ctx, first.definition_id, 10).unwrap();
    fx.manager.activate_flag_only(&fx.ctx, second.definition_id).unwrap();

    let mut active = active_versions(&fx, "approval");
    active.sort();
    assert_eq!(active, vec!["1.0", "2.0"]);
    let second = fx.manager.get_definition(&fx.ctx, "approval", 2).unwrap();
    assert!(second.active);
    assert_eq!(second.start_node_id, None);
}

#[test]
fn activate_by_name_flips_only_the_snapshot() {
    let fx = fixture();
    fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    fx.manager.activate_by_name(&fx.ctx, "approval", 1).unwrap();
    assert!(!fx.manager.get_definition(&fx.ctx, "approval", 1).unwrap().active);
    assert_eq!(active_versions(&fx, "approval"), vec!["1.0"]);

    fx.manager.deactivate_by_name(&fx.ctx, "approval", 1).unwrap();
    assert!(active_versions(&fx, "approval").is_empty());

    // y al revés: desactivar por nombre no apaga una cabecera activa
    let head = fx.manager.get_definition(&fx.ctx, "approval", 1).unwrap();
    fx.manager.activate_exclusive(&fx.ctx, head.definition_id, 4).unwrap();
    fx.manager.deactivate_by_name(&fx.ctx, "approval", 1).unwrap();
    assert!(fx.manager.get_definition(&fx.ctx, "approval", 1).unwrap().active);
    assert!(active_versions(&fx, "approval").is_empty());
}

#[test]
fn activate_by_name_reaches_older_snapshot_of_latest_head() {
    let fx = fixture();
    let added = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    fx.manager.update_definition(&fx.ctx, &revision("<c2/>"), &added).unwrap();

    // ninguna cabecera tiene version=1; se usa la más reciente y su snapshot 1.0
    fx.manager.activate_by_name(&fx.ctx, "approval", 1).unwrap();
    assert_eq!(active_versions(&fx, "approval"), vec!["1.0"]);
    assert!(!fx.manager.get_latest_definition(&fx.ctx, "approval").unwrap().active);
}

#[test]
fn activate_by_name_falls_back_to_latest_version() {
    let fx = fixture();
    let added = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    fx.manager.update_definition(&fx.ctx, &revision("<c2/>"), &added).unwrap();

    fx.manager.activate_by_name(&fx.ctx, "approval", 3).unwrap();
    assert_eq!(active_versions(&fx, "approval"), vec!["2.0"]);

    fx.manager.deactivate_by_name(&fx.ctx, "approval", 3).unwrap();
    assert!(active_versions(&fx, "approval").is_empty());
}

#[test]
fn activate_by_name_does_not_deactivate_siblings() {
    let fx = fixture();
    let added = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    let updated = fx.manager.update_definition(&fx.ctx, &revision("<c2/>"), &added).unwrap();
    fx.manager.activate_exclusive(&fx.ctx, updated.definition_id, 5).unwrap();
    fx.manager.activate_by_name(&fx.ctx, "approval", 1).unwrap();
    let mut active = active_versions(&fx, "approval");
    active.sort();
    assert_eq!(active, vec!["1.0", "2.0"]);
}

#[test]
fn activate_by_unknown_name_is_not_found() {
    let fx = fixture();
    let err = fx.manager.activate_by_name(&fx.ctx, "missing", 1).unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { entity: Entity::Definition, .. }));
    let err = fx.manager.deactivate_by_name(&fx.ctx, "missing", 1).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn activate_by_name_prefers_exact_non_latest_head() {
    let fx = fixture();
    let first = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 1, "<c1/>")).unwrap();
    let second = fx.manager.add_definition(&fx.ctx, &new_definition("approval", 2, "<c2/>")).unwrap();

    fx.manager.activate_by_name(&fx.ctx, "approval", 1).unwrap();
    let first_snapshot = fx.manager
                           .get_definition_version(&fx.ctx, first.definition_id, &Version::new(1, 0))
                           .unwrap();
    assert!(first_snapshot.active);
    let second_snapshot = fx.manager
                            .get_definition_version(&fx.ctx, second.definition_id, &Version::new(2, 0))
                            .unwrap();
    assert!(!second_snapshot.active);
    assert!(!fx.manager.get_definition(&fx.ctx, "approval", 1).unwrap().active);
}

#[test]
fn threaded_exclusive_activations_keep_one_active() {
    let fx = fixture();
    let ids: Vec<_> = (1..=4).map(|v| {
                                 fx.manager
                                   .add_definition(&fx.ctx, &new_definition("approval", v, "<c/>"))
                                   .unwrap()
                                   .definition_id
                             })
                             .collect();
    std::thread::scope(|scope| {
        for (i, id) in ids.iter().enumerate() {
            let manager = &fx.manager;
            let ctx = fx.ctx;
            scope.spawn(move || {
                     for round in 0..25 {
                         manager.activate_exclusive(&ctx, *id, (i * 100 + round) as i64).unwrap();
                     }
                 });
        }
    });
    assert_eq!(active_versions(&fx, "approval").len(), 1);
    let active_heads = fx.manager
                         .get_definitions_count(&fx.ctx, &DefinitionFilter::named("approval").with_active(true))
                         .unwrap();
    assert_eq!(active_heads, 1);
}
