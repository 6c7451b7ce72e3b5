//! Configuration load and initialization tests
//!
//! Exercise the two-phase lifecycle: directive tree -> registry -> resolved
//! poller, starting from YAML the way the binary does.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use redfish_collector::builder::load_config;
use redfish_collector::client::{Connection, Connector, FetchResult};
use redfish_collector::config::{Config, ConfigError, ConfigItem};
use redfish_collector::error::{ConnectError, FetchError, InitError, ResolveError};
use redfish_collector::model::{Registry, Service};
use redfish_collector::scheduler::Poller;
use redfish_collector::sink::ChannelSink;

/// Connector that never talks to the network and counts how often it was used
#[derive(Default)]
struct NullConnector {
    connects: AtomicUsize,
}

struct NullConnection;

impl Connection for NullConnection {
    fn fetch(&self, _path: &str) -> BoxFuture<'static, FetchResult> {
        async { Err(FetchError::Closed) }.boxed()
    }

    fn close(&self) {}
}

impl Connector for NullConnector {
    fn connect(&self, _service: &Service) -> Result<Arc<dyn Connection>, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(NullConnection))
    }
}

fn tree(yaml: &str) -> Vec<ConfigItem> {
    Config::from_yaml(yaml).expect("valid settings").redfish
}

fn initialize(registry: Registry) -> Result<Poller, InitError> {
    let (sink, _rx) = ChannelSink::new();
    Poller::initialize(registry, &NullConnector::default(), Arc::new(sink))
}

/// Services are declared before the queries they use
const FLEET: &str = r#"
redfish:
  - key: Service
    values: bmc1
    children:
      - { key: Host, values: "https://10.0.0.5" }
      - { key: User, values: admin }
      - { key: Passwd, values: secret }
      - { key: Queries, values: [power, thermal] }
  - key: Service
    values: bmc2
    children:
      - { key: Host, values: "https://10.0.0.6" }
      - { key: Token, values: abc123 }
      - { key: Queries, values: [thermal] }
  - key: Query
    values: thermal
    children:
      - { key: Endpoint, values: /redfish/v1/Chassis/1/Thermal }
      - key: Resource
        values: Temperatures
        children:
          - key: Property
            values: ReadingCelsius
            children:
              - { key: Type, values: temperature }
  - key: Query
    values: power
    children:
      - { key: Endpoint, values: /redfish/v1/Chassis/1/Power }
      - key: Resource
        values: PowerControl
        children:
          - key: Property
            values: PowerConsumedWatts
            children:
              - { key: Type, values: power }
"#;

#[test]
fn test_resolved_queries_match_declared_order() {
    let registry = load_config(&tree(FLEET)).unwrap();
    let poller = initialize(registry).unwrap();
    let registry = poller.registry();

    for service in registry.services() {
        assert_eq!(service.resolved_queries().len(), service.queries().len());
        let resolved: Vec<&str> = service
            .resolved_queries()
            .iter()
            .map(|id| registry.query(*id).name())
            .collect();
        assert_eq!(resolved, service.queries());
    }

    let names: Vec<&str> = registry.services().iter().map(|s| s.name()).collect();
    assert_eq!(names, ["bmc1", "bmc2"]);
}

#[test]
fn test_services_share_query_objects() {
    let registry = load_config(&tree(FLEET)).unwrap();
    let poller = initialize(registry).unwrap();
    let registry = poller.registry();

    let bmc1_thermal = registry.services()[0].resolved_queries()[1];
    let bmc2_thermal = registry.services()[1].resolved_queries()[0];
    assert_eq!(bmc1_thermal, bmc2_thermal);
    assert!(std::ptr::eq(
        registry.query(bmc1_thermal),
        registry.query(bmc2_thermal)
    ));
    assert_eq!(registry.queries().len(), 2);
}

#[test]
fn test_unresolved_query_fails_initialize_before_connecting() {
    let yaml = r#"
redfish:
  - key: Service
    values: bmc1
    children:
      - { key: Host, values: "https://10.0.0.5" }
      - { key: Queries, values: [thermal, fans] }
  - key: Query
    values: thermal
    children:
      - { key: Endpoint, values: /redfish/v1/Chassis/1/Thermal }
"#;
    let registry = load_config(&tree(yaml)).unwrap();
    let connector = NullConnector::default();
    let (sink, _rx) = ChannelSink::new();

    let err = Poller::initialize(registry, &connector, Arc::new(sink))
        .err()
        .expect("initialize must fail");

    match err {
        InitError::Resolve(ResolveError::UnresolvedQuery { service, query }) => {
            assert_eq!(service, "bmc1");
            assert_eq!(query, "fans");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_top_level_directive() {
    let yaml = r#"
redfish:
  - key: Query
    values: thermal
    children:
      - { key: Endpoint, values: /x }
  - key: Interval
    values: 10
"#;
    let err = load_config(&tree(yaml)).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownDirective { ref key } if key == "Interval"));
    assert!(err.to_string().contains("Interval"));
}

#[test]
fn test_unknown_nested_directive() {
    let yaml = r#"
redfish:
  - key: Service
    values: bmc1
    children:
      - { key: Host, values: "https://10.0.0.5" }
      - { key: Password, values: secret }
"#;
    let err = load_config(&tree(yaml)).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownDirective { ref key } if key == "Password"));
}

#[test]
fn test_duplicate_query_rejected() {
    let yaml = r#"
redfish:
  - key: Query
    values: thermal
    children:
      - { key: Endpoint, values: /a }
  - key: Query
    values: thermal
    children:
      - { key: Endpoint, values: /b }
"#;
    let err = load_config(&tree(yaml)).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateQuery(ref name) if name == "thermal"));
}

#[test]
fn test_non_string_queries_rejected() {
    let yaml = r#"
redfish:
  - key: Service
    values: bmc1
    children:
      - { key: Host, values: "https://10.0.0.5" }
      - { key: Queries, values: [thermal, 42] }
"#;
    let err = load_config(&tree(yaml)).unwrap_err();
    assert!(matches!(err, ConfigError::ExpectedStrings { ref key } if key == "Queries"));
}

#[test]
fn test_empty_config_initializes() {
    let registry = load_config(&[]).unwrap();
    let poller = initialize(registry).unwrap();
    assert!(poller.connected_services().is_empty());
}
