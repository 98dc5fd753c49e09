#![allow(dead_code)]

use wfdef_core::collab::ComponentKind;
use wfdef_core::{DefinitionManager, InMemoryDefinitionStore, InMemoryInstanceTracker, InMemoryUserDirectory,
                 NewDefinition, RecordingGraphComponent, ServiceContext};

pub const TENANT: i64 = 1;
pub const ADMIN: i64 = 100;

pub struct Fixture {
    pub manager: DefinitionManager<InMemoryDefinitionStore>,
    pub instances: InMemoryInstanceTracker,
    /// Comparte log con todos los componentes registrados.
    pub cascade: RecordingGraphComponent,
    pub ctx: ServiceContext,
}

pub fn fixture() -> Fixture {
    let users = InMemoryUserDirectory::new().with_user(ADMIN, "Admin User");
    let instances = InMemoryInstanceTracker::new();
    let cascade = RecordingGraphComponent::new(ComponentKind::Transition);
    let mut manager = DefinitionManager::new(InMemoryDefinitionStore::new(), users, instances.clone());
    for kind in [ComponentKind::Task, ComponentKind::Condition, ComponentKind::Node, ComponentKind::Instance] {
        manager = manager.with_component(RecordingGraphComponent::sharing_log(kind, &cascade));
    }
    manager = manager.with_component(cascade.clone());
    Fixture { manager, instances, cascade, ctx: ServiceContext::new(TENANT, ADMIN) }
}

pub fn new_definition(name: &str, version: u32, content: &str) -> NewDefinition {
    NewDefinition { name: name.to_string(),
                    title: format!("{name} title"),
                    description: format!("{name} description"),
                    content: content.to_string(),
                    version }
}
