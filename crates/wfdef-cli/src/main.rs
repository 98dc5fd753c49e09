use std::collections::HashMap;
use std::process::exit;

use log::debug;
use uuid::Uuid;
use wfdef_core::{DefinitionDescriptor, DefinitionFilter, DefinitionManager, InMemoryInstanceTracker,
                 InMemoryUserDirectory, LifecycleError, NewDefinition, OrderBy, Page, ServiceContext};
use wfdef_persistence::{PgDefinitionStore, PoolProvider};

type Manager = DefinitionManager<PgDefinitionStore<PoolProvider>>;

const USAGE: &str = "\
Uso: wfdef <comando> [--tenant <ID>] [--user <ID>] [opciones]
  add        --name <N> --version <V> --title <T> [--description <D>] (--content <TXT> | --content-file <PATH>)
  activate   --id <UUID> --start-node <N>
  activate   --name <N> --version <V>
  deactivate --name <N> --version <V>
  increment  --name <N> --title <T> [--description <D>] (--content <TXT> | --content-file <PATH>)
  title      --name <N> --version <V> --title <T>
  delete     --name <N> --version <V>
  latest     --name <N>
  list       [--name <N>] [--active true|false] [--start <S> --end <E>]
  history    --name <N>
  purge-tenant";

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        exit(2);
    }
    let command = args[1].as_str();
    let flags = parse_flags(&args[2..]);
    debug!("wfdef command={command} flags={:?}", flags.keys().collect::<Vec<_>>());

    let ctx = ServiceContext::new(env_or_flag(&flags, "tenant", "WFDEF_TENANT_ID", 1),
                                  env_or_flag(&flags, "user", "WFDEF_USER_ID", 1));
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[wfdef] requiere DATABASE_URL para operar contra backend persistente");
        exit(4);
    }
    let pool = match wfdef_persistence::build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[wfdef] pool error: {e}");
            exit(5);
        }
    };
    let user_name = std::env::var("WFDEF_USER_NAME").unwrap_or_else(|_| "admin".to_string());
    let users = InMemoryUserDirectory::new().with_user(ctx.user_id, user_name);
    // sin motor de instancias ni grafo conectados: el tracker siempre está vacío
    let manager = DefinitionManager::new(PgDefinitionStore::from_pool(pool), users, InMemoryInstanceTracker::new());

    match run(&manager, &ctx, command, &flags) {
        Ok(()) => exit(0),
        Err(CliError::Usage(msg)) => {
            eprintln!("[wfdef {command}] {msg}\n{USAGE}");
            exit(2);
        }
        Err(CliError::Input(msg)) => {
            eprintln!("[wfdef {command}] {msg}");
            exit(3);
        }
        Err(CliError::Lifecycle(e)) if e.is_not_found() || e.is_conflict() => {
            eprintln!("rechazado: {e}");
            exit(4);
        }
        Err(CliError::Lifecycle(e)) => {
            eprintln!("error: {e}");
            exit(5);
        }
    }
}

enum CliError {
    Usage(String),
    Input(String),
    Lifecycle(LifecycleError),
}

impl From<LifecycleError> for CliError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

/// `--flag valor` en cualquier orden; flags desconocidos se ignoran.
fn parse_flags(args: &[String]) -> HashMap<String, String> {
    let mut flags = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        if let Some(name) = args[i].strip_prefix("--") {
            if i + 1 < args.len() {
                flags.insert(name.to_string(), args[i + 1].clone());
                i += 1;
            }
        }
        i += 1;
    }
    flags
}

fn env_or_flag(flags: &HashMap<String, String>, flag: &str, var: &str, default: i64) -> i64 {
    flags.get(flag)
         .cloned()
         .or_else(|| std::env::var(var).ok())
         .and_then(|v| v.parse().ok())
         .unwrap_or(default)
}

fn required<'a>(flags: &'a HashMap<String, String>, name: &str) -> Result<&'a str, CliError> {
    flags.get(name)
         .map(String::as_str)
         .ok_or_else(|| CliError::Usage(format!("falta --{name}")))
}

fn parsed<T: std::str::FromStr>(flags: &HashMap<String, String>, name: &str) -> Result<T, CliError> {
    required(flags, name)?.parse::<T>()
                          .map_err(|_| CliError::Input(format!("--{name} inválido")))
}

fn content(flags: &HashMap<String, String>) -> Result<String, CliError> {
    if let Some(text) = flags.get("content") {
        return Ok(text.clone());
    }
    let path = required(flags, "content-file")?;
    std::fs::read_to_string(path).map_err(|e| CliError::Input(format!("no se pudo leer {path}: {e}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Input(format!("json: {e}")))?;
    println!("{text}");
    Ok(())
}

fn run(manager: &Manager, ctx: &ServiceContext, command: &str, flags: &HashMap<String, String>) -> Result<(), CliError> {
    match command {
        "add" => {
            let new = NewDefinition { name: required(flags, "name")?.to_string(),
                                      title: required(flags, "title")?.to_string(),
                                      description: flags.get("description").cloned().unwrap_or_default(),
                                      content: content(flags)?,
                                      version: parsed(flags, "version")? };
            let added = manager.add_definition(ctx, &new)?;
            println!("agregada: {} {}@{}", added.definition_id, added.name, added.version);
        }
        "activate" if flags.contains_key("id") => {
            let id: Uuid = parsed(flags, "id")?;
            let start_node: i64 = parsed(flags, "start-node")?;
            manager.activate_exclusive(ctx, id, start_node)?;
            println!("activada: {id} start_node={start_node}");
        }
        "activate" => {
            let name = required(flags, "name")?;
            let version: u32 = parsed(flags, "version")?;
            manager.activate_by_name(ctx, name, version)?;
            println!("activada: {name}@{version}");
        }
        "deactivate" => {
            let name = required(flags, "name")?;
            let version: u32 = parsed(flags, "version")?;
            manager.deactivate_by_name(ctx, name, version)?;
            println!("desactivada: {name}@{version}");
        }
        "increment" => {
            let descriptor = DefinitionDescriptor { name: required(flags, "name")?.to_string(),
                                                    description: flags.get("description").cloned().unwrap_or_default(),
                                                    content: content(flags)? };
            let revised = manager.increment_definition(ctx, &descriptor, required(flags, "title")?)?;
            println!("revisada: {} {}@{}", revised.definition_id, revised.name, revised.version);
        }
        "title" => {
            let name = required(flags, "name")?;
            let version: u32 = parsed(flags, "version")?;
            manager.update_title(ctx, name, version, required(flags, "title")?)?;
            println!("título actualizado: {name}@{version}");
        }
        "delete" => {
            let name = required(flags, "name")?;
            let version: u32 = parsed(flags, "version")?;
            manager.delete_definition(ctx, name, version)?;
            println!("borrada: {name}@{version}");
        }
        "latest" => print_json(&manager.get_latest_definition(ctx, required(flags, "name")?)?)?,
        "list" => {
            let mut filter = DefinitionFilter::all();
            filter.name = flags.get("name").cloned();
            if flags.contains_key("active") {
                filter = filter.with_active(parsed(flags, "active")?);
            }
            let page = match (flags.get("start"), flags.get("end")) {
                (Some(_), Some(_)) => Page::range(parsed(flags, "start")?, parsed(flags, "end")?),
                _ => Page::ALL,
            };
            let rows = manager.get_definitions(ctx, &filter, page, OrderBy::default())?;
            let total = manager.get_definitions_count(ctx, &filter)?;
            for d in &rows {
                println!("{}\t{}\t{}\t{}\t{}", d.definition_id, d.name, d.version, d.active, d.title);
            }
            println!("({} de {total})", rows.len());
        }
        "history" => {
            let name = required(flags, "name")?;
            for v in manager.get_definition_versions(ctx, name, Page::ALL, OrderBy::default())? {
                println!("{}\t{}\t{}\t{}", v.definition_id, v.version, v.active, v.title);
            }
        }
        "purge-tenant" => {
            let (definitions, versions) = manager.delete_tenant_definitions(ctx.tenant_id)?;
            println!("tenant {}: {definitions} definiciones, {versions} versiones borradas", ctx.tenant_id);
        }
        other => return Err(CliError::Usage(format!("comando desconocido: {other}"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_are_parsed_in_any_order() {
        let flags = parse_flags(&args(&["--version", "2", "stray", "--name", "approval", "--dangling"]));
        assert_eq!(flags.get("name").map(String::as_str), Some("approval"));
        assert_eq!(flags.get("version").map(String::as_str), Some("2"));
        assert!(!flags.contains_key("dangling"));
    }

    #[test]
    fn flag_overrides_default() {
        let flags = parse_flags(&args(&["--tenant", "42"]));
        assert_eq!(env_or_flag(&flags, "tenant", "WFDEF_TEST_UNSET_VAR", 1), 42);
        assert_eq!(env_or_flag(&HashMap::new(), "tenant", "WFDEF_TEST_UNSET_VAR", 7), 7);
    }

    #[test]
    fn invalid_number_is_input_error() {
        let flags = parse_flags(&args(&["--version", "x"]));
        assert!(matches!(parsed::<u32>(&flags, "version"), Err(CliError::Input(_))));
        assert!(matches!(parsed::<u32>(&flags, "name"), Err(CliError::Usage(_))));
    }
}
