// Render Contract Tests
//
// Generated proxy units must be reproducible and must never touch
// configuration that was written by hand.

use portroute_core::proxy::GENERATED_MARKER;
use portroute_core::{HostPort, ProxyConfigWriter, ProxyRoute, ProxyRouteSet, TlsSettings};
use std::fs;
use tempfile::TempDir;

fn routes() -> ProxyRouteSet {
    ProxyRouteSet::new(vec![
        ProxyRoute {
            public_name: "myapi".to_string(),
            service: "api".to_string(),
            internal_port: "3000".to_string(),
            host_port: HostPort::new(1025).unwrap(),
        },
        ProxyRoute {
            public_name: "site".to_string(),
            service: "web".to_string(),
            internal_port: "80".to_string(),
            host_port: HostPort::new(8081).unwrap(),
        },
    ])
    .unwrap()
}

fn writer(dir: &TempDir) -> ProxyConfigWriter {
    ProxyConfigWriter::new(dir.path(), "host.docker.internal", TlsSettings::default())
}

/// WHY: Reruns with the same routes must not churn the proxy config
/// BREAKS: Needless proxy reloads and noisy diffs in config management
#[test]
fn rendering_twice_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let writer = writer(&temp_dir);
    let routes = routes();

    let first: Vec<Vec<u8>> = writer
        .write_all(&routes)
        .unwrap()
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    let second: Vec<Vec<u8>> = writer
        .write_all(&routes)
        .unwrap()
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    assert_eq!(first, second);
}

/// WHY: One route is one unit, addressed by its public name
/// BREAKS: Cleaning by name would miss or remove the wrong unit
#[test]
fn one_unit_per_route_named_after_it() {
    let temp_dir = TempDir::new().unwrap();
    writer(&temp_dir).write_all(&routes()).unwrap();

    let mut files: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    assert_eq!(files, vec!["myapi.conf", "site.conf"]);

    let myapi = fs::read_to_string(temp_dir.path().join("myapi.conf")).unwrap();
    assert!(myapi.starts_with(GENERATED_MARKER));
    assert!(myapi.contains("server_name myapi;"));
    assert!(myapi.contains("proxy_pass http://host.docker.internal:1025;"));
}

/// WHY: The upstream is the host port, the internal port is only informative
/// BREAKS: The proxy would dial a port that is not published on the host
#[test]
fn units_forward_to_the_host_port() {
    let temp_dir = TempDir::new().unwrap();
    let routes = routes();
    let site = routes.get("site").unwrap();

    let unit = writer(&temp_dir).render(site);

    assert!(unit.contains("proxy_pass http://host.docker.internal:8081;"));
    assert!(!unit.contains("host.docker.internal:80;"));
}

/// WHY: The writer only owns what it generated
/// BREAKS: Operators lose hand-maintained proxy config
#[test]
fn hand_written_units_survive_cleaning_and_writing() {
    let temp_dir = TempDir::new().unwrap();
    let writer = writer(&temp_dir);
    let manual = temp_dir.path().join("site.conf");
    fs::write(&manual, "server { listen 8443; }\n").unwrap();

    assert_eq!(writer.clean_all(["site", "missing"]).unwrap(), 0);
    assert!(writer.write_all(&routes()).is_err());
    assert_eq!(
        fs::read_to_string(&manual).unwrap(),
        "server { listen 8443; }\n"
    );
}
