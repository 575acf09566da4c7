//! Route Lifecycle Integration Tests
//!
//! Runs, reruns and stops compose targets against one generated directory
//! and one route ledger:
//! - names are remembered between runs
//! - units of routes that disappeared are cleaned
//! - stopping a target withdraws only its own units
//!
//! Uses tempfile for isolation

use portroute_core::proxy::GENERATED_MARKER;
use portroute_core::{
    ContainerRuntime, HostBinding, HostPort, NamingResolver, Orchestrator, PortrouteError,
    ProxyConfigWriter, ProxyRoute, ProxyRouteSet, RouteLedger, RunConfig, RunOptions,
    RunningContainer, StackControl, StaticNamer,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

type CoreResult<T> = std::result::Result<T, PortrouteError>;

struct FakeRuntime(Vec<RunningContainer>);

impl ContainerRuntime for FakeRuntime {
    fn list_running_containers(&self) -> CoreResult<Vec<RunningContainer>> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Default)]
struct RecordingStacks(Rc<RefCell<Vec<String>>>);

impl StackControl for RecordingStacks {
    fn stop_stack(&self, compose_file: &Path) -> CoreResult<()> {
        self.0
            .borrow_mut()
            .push(format!("down {}", file_name(compose_file)));
        Ok(())
    }

    fn start_stack(&self, compose_file: &Path) -> CoreResult<()> {
        self.0
            .borrow_mut()
            .push(format!("up {}", file_name(compose_file)));
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

fn legacy_on(port: &str) -> RunningContainer {
    let mut port_bindings = BTreeMap::new();
    port_bindings.insert(
        "80/tcp".to_string(),
        vec![HostBinding {
            host_interface: "0.0.0.0".to_string(),
            host_port: port.to_string(),
        }],
    );
    RunningContainer {
        name: "legacy".to_string(),
        port_bindings,
    }
}

/// Helper to create an isolated generated dir, ledger and compose files
fn create_workspace() -> (TempDir, RunConfig) {
    let temp = TempDir::new().unwrap();
    let config = RunConfig {
        proxy_compose: temp.path().join("proxy-compose.yml"),
        generated_dir: temp.path().join("generated"),
        ledger_path: temp.path().join("state").join("routes.json"),
        ..RunConfig::default()
    };
    (temp, config)
}

fn write_compose(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, content).unwrap();
    path
}

fn orchestrator(
    config: &RunConfig,
    running: Vec<RunningContainer>,
    namer: impl NamingResolver + 'static,
) -> (Orchestrator, RecordingStacks) {
    let stacks = RecordingStacks::default();
    let orchestrator = Orchestrator::new(
        config.clone(),
        Box::new(FakeRuntime(running)),
        Box::new(stacks.clone()),
        Box::new(namer),
    );
    (orchestrator, stacks)
}

fn generated_units(config: &RunConfig) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(&config.generated_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

const STACK: &str = r#"version: "3.8"
services:
  web:
    image: nginx:alpine
    ports:
      - "8080:80"
  admin:
    image: example/admin
    ports:
      - "dash:9000"
"#;

#[test]
fn test_rerun_reuses_names_and_renders_identical_units() {
    let (temp, config) = create_workspace();
    let target = write_compose(temp.path(), "docker-compose.yml", STACK);

    let (mut first, _) = orchestrator(
        &config,
        vec![legacy_on("8080")],
        StaticNamer::new().with("web", "80", "site"),
    );
    let summary = first
        .run(&RunOptions::new(&target).aggressive(true).restart(false))
        .unwrap();
    assert_eq!(summary.named, 1);
    assert_eq!(generated_units(&config), vec!["dash.conf", "site.conf"]);

    let site_before = fs::read_to_string(config.generated_dir.join("site.conf")).unwrap();
    let dash_before = fs::read_to_string(config.generated_dir.join("dash.conf")).unwrap();

    // Second run: nobody to ask, names must come from the ledger
    let (mut second, _) = orchestrator(&config, vec![legacy_on("8080")], StaticNamer::new());
    let summary = second
        .run(&RunOptions::new(&target).aggressive(true).restart(false))
        .unwrap();

    assert_eq!(summary.named, 2);
    assert_eq!(summary.removed_units, 2);
    assert_eq!(summary.touched_services, 0);
    assert_eq!(generated_units(&config), vec!["dash.conf", "site.conf"]);
    assert_eq!(
        fs::read_to_string(config.generated_dir.join("site.conf")).unwrap(),
        site_before
    );
    assert_eq!(
        fs::read_to_string(config.generated_dir.join("dash.conf")).unwrap(),
        dash_before
    );
}

#[test]
fn test_removed_service_unit_is_cleaned_on_rerun() {
    let (temp, config) = create_workspace();
    let target = write_compose(temp.path(), "docker-compose.yml", STACK);

    let (mut first, _) = orchestrator(
        &config,
        Vec::new(),
        StaticNamer::new().with("web", "80", "site"),
    );
    first
        .run(&RunOptions::new(&target).restart(false))
        .unwrap();
    assert_eq!(generated_units(&config), vec!["dash.conf", "site.conf"]);

    write_compose(
        temp.path(),
        "docker-compose.yml",
        r#"version: "3.8"
services:
  web:
    image: nginx:alpine
    ports:
      - "8080:80"
"#,
    );

    let (mut second, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    let summary = second
        .run(&RunOptions::new(&target).restart(false))
        .unwrap();

    assert_eq!(summary.routes.len(), 1);
    assert_eq!(generated_units(&config), vec!["site.conf"]);

    let ledger = RouteLedger::load(&config.ledger_path).unwrap();
    assert_eq!(ledger.names_for(&target), vec!["site"]);
}

#[test]
fn test_stop_withdraws_routes_and_keeps_hand_written_units() {
    let (temp, config) = create_workspace();
    let target = write_compose(temp.path(), "docker-compose.yml", STACK);

    let (mut runner, _) = orchestrator(
        &config,
        Vec::new(),
        StaticNamer::new().with("web", "80", "site"),
    );
    runner.run(&RunOptions::new(&target).restart(false)).unwrap();

    let manual = config.generated_dir.join("default.conf");
    fs::write(&manual, "server { listen 80 default_server; }\n").unwrap();

    let (mut stopper, stacks) = orchestrator(&config, Vec::new(), StaticNamer::new());
    let removed = stopper.stop(&target, true).unwrap();

    assert_eq!(removed, 2);
    assert_eq!(generated_units(&config), vec!["default.conf"]);
    assert!(RouteLedger::load(&config.ledger_path)
        .unwrap()
        .names_for(&target)
        .is_empty());
    assert_eq!(
        stacks.0.borrow().clone(),
        vec![
            "down docker-compose.yml",
            "down proxy-compose.yml",
            "up proxy-compose.yml",
        ]
    );
}

#[test]
fn test_stopping_one_target_leaves_the_other_routed() {
    let (temp, config) = create_workspace();
    let shop = write_compose(
        temp.path(),
        "shop.yml",
        "version: \"3.8\"\nservices:\n  shop:\n    image: example/shop\n    ports:\n      - \"shop:80\"\n",
    );
    let blog = write_compose(
        temp.path(),
        "blog.yml",
        "version: \"3.8\"\nservices:\n  blog:\n    image: example/blog\n    ports:\n      - \"blog:80\"\n",
    );

    let (mut runner, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    runner.run(&RunOptions::new(&shop).restart(false)).unwrap();

    // The shop now publishes 1025 on the host
    let mut shop_container = legacy_on("1025");
    shop_container.name = "shop".to_string();
    let (mut runner, _) = orchestrator(&config, vec![shop_container], StaticNamer::new());
    let summary = runner.run(&RunOptions::new(&blog).restart(false)).unwrap();
    assert_eq!(summary.routes.get("blog").unwrap().host_port.get(), 1026);

    assert_eq!(generated_units(&config), vec!["blog.conf", "shop.conf"]);

    let (mut stopper, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    assert_eq!(stopper.stop(&shop, false).unwrap(), 1);

    assert_eq!(generated_units(&config), vec!["blog.conf"]);
    let ledger = RouteLedger::load(&config.ledger_path).unwrap();
    assert_eq!(ledger.targets().count(), 1);
    assert_eq!(ledger.names_for(&blog), vec!["blog"]);
}

#[test]
fn test_suffix_is_applied_to_virtual_hosts_only() {
    let (temp, config) = create_workspace();
    let target = write_compose(temp.path(), "docker-compose.yml", STACK);

    let (mut runner, _) = orchestrator(
        &config,
        Vec::new(),
        StaticNamer::new().with("web", "80", "site"),
    );
    let summary = runner
        .run(
            &RunOptions::new(&target)
                .suffix(Some("dev".to_string()))
                .restart(false),
        )
        .unwrap();

    assert_eq!(summary.server_names, vec!["site.dev", "dash.dev"]);
    assert_eq!(generated_units(&config), vec!["dash.conf", "site.conf"]);

    let unit = fs::read_to_string(config.generated_dir.join("site.conf")).unwrap();
    assert!(unit.starts_with(GENERATED_MARKER));
    assert!(unit.contains("server_name site.dev;"));
}

#[test]
fn test_ledger_records_routes_per_target() {
    let (temp, config) = create_workspace();
    let target = write_compose(temp.path(), "docker-compose.yml", STACK);

    let (mut runner, _) = orchestrator(
        &config,
        vec![legacy_on("1025")],
        StaticNamer::new().with("web", "80", "site"),
    );
    runner.run(&RunOptions::new(&target).restart(false)).unwrap();

    let ledger = RouteLedger::load(&config.ledger_path).unwrap();
    let routes = ledger.routes_for(&target);
    assert_eq!(routes.len(), 2);

    let dash = routes.iter().find(|r| r.public_name == "dash").unwrap();
    assert_eq!(dash.service, "admin");
    assert_eq!(dash.internal_port, "9000");
    assert_eq!(dash.host_port.get(), 1026);

    assert_eq!(ledger.previous_name(&target, "web", "80"), Some("site"));
    assert_eq!(ledger.previous_name(&target, "web", "443"), None);
}

fn single_route_stack(service: &str, label: &str, internal: &str) -> String {
    format!(
        "version: \"3.8\"\nservices:\n  {}:\n    image: example/{}\n    ports:\n      - \"{}:{}\"\n",
        service, service, label, internal
    )
}

#[test]
fn test_name_published_by_another_target_is_refused() {
    let (temp, config) = create_workspace();
    let first = write_compose(temp.path(), "a.yml", &single_route_stack("a", "api", "3000"));
    let second_doc = single_route_stack("b", "api", "4000");
    let second = write_compose(temp.path(), "b.yml", &second_doc);

    let (mut runner, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    runner.run(&RunOptions::new(&first).restart(false)).unwrap();

    let (mut runner, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    let result = runner.run(&RunOptions::new(&second).restart(false));

    assert!(matches!(result, Err(PortrouteError::DuplicateRoute(_))));
    assert_eq!(fs::read_to_string(&second).unwrap(), second_doc);
    let unit = fs::read_to_string(config.generated_dir.join("api.conf")).unwrap();
    assert!(unit.contains("# route api -> a:3000"));

    let ledger = RouteLedger::load(&config.ledger_path).unwrap();
    assert_eq!(ledger.targets().count(), 1);
    assert!(ledger.names_for(&second).is_empty());
}

#[test]
fn test_resolved_name_published_by_another_target_is_refused() {
    let (temp, config) = create_workspace();
    let first = write_compose(temp.path(), "a.yml", &single_route_stack("a", "api", "3000"));
    let second = write_compose(temp.path(), "b.yml", &single_route_stack("b", "8080", "4000"));

    let (mut runner, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    runner.run(&RunOptions::new(&first).restart(false)).unwrap();

    let (mut runner, _) = orchestrator(
        &config,
        Vec::new(),
        StaticNamer::new().with("b", "4000", "api"),
    );
    let result = runner.run(&RunOptions::new(&second).restart(false));

    assert!(matches!(result, Err(PortrouteError::DuplicateRoute(_))));
    let unit = fs::read_to_string(config.generated_dir.join("api.conf")).unwrap();
    assert!(unit.contains("# route api -> a:3000"));
}

#[test]
fn test_stop_keeps_units_shared_with_another_target() {
    let (temp, config) = create_workspace();
    let first = write_compose(temp.path(), "a.yml", &single_route_stack("a", "admin", "9000"));
    let second = write_compose(temp.path(), "b.yml", &single_route_stack("b", "api", "4000"));

    // Ledger state where both targets claim "api", with b's unit on disk
    let route = |name: &str, service: &str, internal: &str, port: u16| ProxyRoute {
        public_name: name.to_string(),
        service: service.to_string(),
        internal_port: internal.to_string(),
        host_port: HostPort::new(port).unwrap(),
    };
    let mut ledger = RouteLedger::load(&config.ledger_path).unwrap();
    ledger.record(
        &first,
        &ProxyRouteSet::new(vec![
            route("api", "a", "3000", 1025),
            route("admin", "a", "9000", 1026),
        ])
        .unwrap(),
    );
    let second_routes = ProxyRouteSet::new(vec![route("api", "b", "4000", 1027)]).unwrap();
    ledger.record(&second, &second_routes);
    ledger.save().unwrap();

    let writer = ProxyConfigWriter::from_config(&config);
    writer.write_all(&second_routes).unwrap();
    writer
        .write(&route("admin", "a", "9000", 1026))
        .unwrap();

    let (mut stopper, _) = orchestrator(&config, Vec::new(), StaticNamer::new());
    assert_eq!(stopper.stop(&first, false).unwrap(), 1);

    assert_eq!(generated_units(&config), vec!["api.conf"]);
    let unit = fs::read_to_string(config.generated_dir.join("api.conf")).unwrap();
    assert!(unit.contains("# route api -> b:4000"));
}
