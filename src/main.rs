use log::{error, info};
use serde_json::to_string_pretty;
use uuid::Uuid;
use wfdef_core::{DefinitionManager, DefinitionRevision, DefinitionStore, InMemoryInstanceTracker, LifecycleError,
                 NewDefinition, OrderBy, OrderField, Page, ServiceContext, Version};
use wfdef_rust::bootstrap::{in_memory_manager, pg_manager};
use wfdef_rust::config::CONFIG;

/// Recorrido completo del ciclo de vida: alta, activación, revisión,
/// re-activación, intentos de borrado y lectura del historial.
fn run_lifecycle_demo<S: DefinitionStore>(manager: &DefinitionManager<S>,
                                          ctx: &ServiceContext,
                                          instances: &InMemoryInstanceTracker)
                                          -> Result<(), LifecycleError> {
    let new = NewDefinition { name: "expense-approval".into(),
                              title: "Expense approval".into(),
                              description: "single approver".into(),
                              content: "<workflow><node id=\"1\"/></workflow>".into(),
                              version: 1 };
    let added = manager.add_definition(ctx, &new)?;
    println!("alta: {} {}@{} active={}", added.definition_id, added.name, added.version, added.active);

    manager.activate_exclusive(ctx, added.definition_id, 1)?;
    let head = manager.get_latest_definition(ctx, &new.name)?;
    println!("activada: {}@{} start_node={:?}", head.name, head.version, head.start_node_id);

    let revision = DefinitionRevision { name: new.name.clone(),
                                        title: "Expense approval".into(),
                                        description: "two approvers".into(),
                                        content: "<workflow><node id=\"1\"/><node id=\"2\"/></workflow>".into() };
    let updated = manager.update_definition(ctx, &revision, &head)?;
    println!("revisada: {}@{} active={}", updated.name, updated.version, updated.active);

    manager.activate_exclusive(ctx, updated.definition_id, 2)?;

    // la versión activa no se puede borrar
    match manager.delete_definition(ctx, &new.name, 2) {
        Err(e) if e.is_conflict() => println!("borrado rechazado: {e}"),
        other => println!("borrado inesperado: {other:?}"),
    }

    // una instancia en curso sobre 1.0 también bloquea su borrado
    instances.start(updated.definition_id, Some(Version::new(1, 0)));
    if let Err(e) = manager.delete_definition(ctx, &new.name, 1) {
        println!("borrado rechazado: {e}");
    }
    instances.complete(updated.definition_id, Some(Version::new(1, 0)));
    manager.delete_definition(ctx, &new.name, 1)?;
    println!("versión 1.0 borrada");

    let history = manager.get_definition_versions(ctx, &new.name, Page::ALL, OrderBy::asc(OrderField::Version))?;
    for v in &history {
        println!("historial: {} active={} start_node={:?}", v.version, v.active, v.start_node_id);
    }
    let head = manager.get_latest_definition(ctx, &new.name)?;
    println!("cabecera: {}", to_string_pretty(&head).unwrap_or_default());
    Ok(())
}

fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();
    let cfg = &*CONFIG;
    let ctx = cfg.context();
    info!("main-core tenant={} user={}", ctx.tenant_id, ctx.user_id);

    let instances = InMemoryInstanceTracker::new();
    let manager = in_memory_manager(cfg, instances.clone());
    if let Err(e) = run_lifecycle_demo(&manager, &ctx, &instances) {
        error!("demo en memoria falló: {e}");
        std::process::exit(1);
    }
    println!("Demo en memoria: OK");

    // demo sobre Postgres: opt-in
    if std::env::var("WFDEF_RUN_PG_DEMO").ok().as_deref() == Some("1") {
        let instances = InMemoryInstanceTracker::new();
        let manager = match pg_manager(cfg, instances.clone()) {
            Ok(m) => m,
            Err(e) => {
                error!("no se pudo preparar Postgres: {e}");
                std::process::exit(5);
            }
        };
        // tenant descartable: la limpieza final no toca datos reales
        let scratch = ServiceContext::new((Uuid::new_v4().as_u128() as i64) & 0x0000_7fff_ffff_ffff, ctx.user_id);
        info!("pg demo scratch tenant={}", scratch.tenant_id);
        let outcome = run_lifecycle_demo(&manager, &scratch, &instances);
        if let Err(e) = manager.delete_tenant_definitions(scratch.tenant_id) {
            error!("limpieza del tenant {} falló: {e}", scratch.tenant_id);
        }
        match outcome {
            Ok(()) => println!("Demo Postgres: OK"),
            Err(e) => {
                error!("demo Postgres falló: {e}");
                std::process::exit(1);
            }
        }
    }
}
