//! Config model
//!
//! Typed entities built from the directive tree. Everything here is plain data:
//! once [`Registry::resolve`] succeeds the registry is shared read-only with
//! every in-flight fetch, so nothing in this module mutates after that point.

use std::collections::HashMap;

use tracing::warn;

use crate::error::ResolveError;

/// Leaf extraction rule: read one JSON field and emit it as a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) plugin_instance: String,
    pub(crate) type_: String,
    pub(crate) type_instance: String,
}

impl Property {
    /// Create a property reading the JSON field `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin_instance: String::new(),
            type_: String::new(),
            type_instance: String::new(),
        }
    }

    pub fn with_plugin_instance(mut self, plugin_instance: impl Into<String>) -> Self {
        self.plugin_instance = plugin_instance.into();
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    pub fn with_type_instance(mut self, type_instance: impl Into<String>) -> Self {
        self.type_instance = type_instance.into();
        self
    }

    /// JSON field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin instance override; empty when unset
    pub fn plugin_instance(&self) -> &str {
        &self.plugin_instance
    }

    /// Metric type; empty when unset
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// Type instance; empty when unset
    pub fn type_instance(&self) -> &str {
        &self.type_instance
    }
}

/// Named subtree of a query response
///
/// `name` is the JSON key to descend into. Resources nest to mirror nested
/// JSON objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub(crate) name: String,
    pub(crate) properties: Vec<Property>,
    pub(crate) resources: Vec<Resource>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in configuration order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Nested resources in configuration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}

/// Named, reusable fetch descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub(crate) name: String,
    pub(crate) endpoint: String,
    pub(crate) resources: Vec<Resource>,
}

impl Query {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL path appended to the service host
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}

/// Authentication material of a service
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No credentials
    None,
    /// HTTP basic authentication
    Basic { user: String, password: String },
    /// Bearer token
    Bearer(String),
}

// Keeps secrets out of logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => write!(f, "None"),
            Auth::Basic { user, .. } => write!(f, "Basic {{ user: {:?}, password: *** }}", user),
            Auth::Bearer(_) => write!(f, "Bearer(***)"),
        }
    }
}

impl Auth {
    /// Pick the authentication scheme from optional credentials
    ///
    /// User and password together win over a token; a lone user or password
    /// is ignored.
    pub fn from_parts(
        user: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Self {
        match (user, password, token) {
            (Some(user), Some(password), _) => Auth::Basic { user, password },
            (_, _, Some(token)) => Auth::Bearer(token),
            _ => Auth::None,
        }
    }
}

/// Index of a query in the registry's query table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(usize);

impl QueryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One remote target
#[derive(Debug, Clone)]
pub struct Service {
    pub(crate) name: String,
    pub(crate) host: String,
    pub(crate) auth: Auth,
    pub(crate) queries: Vec<String>,
    pub(crate) resolved: Vec<QueryId>,
}

impl Service {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            auth: Auth::None,
            queries: Vec::new(),
            resolved: Vec::new(),
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>) -> Self {
        self.queries.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Query names as configured
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Resolved query handles, same order as [`Service::queries`]
    ///
    /// Empty until [`Registry::resolve`] succeeds.
    pub fn resolved_queries(&self) -> &[QueryId] {
        &self.resolved
    }
}

/// Process-wide state: services in configuration order plus the query table
#[derive(Debug, Default)]
pub struct Registry {
    services: Vec<Service>,
    queries: Vec<Query>,
    index: HashMap<String, QueryId>,
    resolved: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query to the table, returning its handle
    ///
    /// Returns `None` and leaves the table untouched when the name is taken.
    pub fn insert_query(&mut self, query: Query) -> Option<QueryId> {
        if self.index.contains_key(&query.name) {
            return None;
        }
        let id = QueryId(self.queries.len());
        self.index.insert(query.name.clone(), id);
        self.queries.push(query);
        self.resolved = false;
        Some(id)
    }

    /// Append a service, returning `false` when the name is taken
    pub fn push_service(&mut self, service: Service) -> bool {
        if self.services.iter().any(|s| s.name == service.name) {
            return false;
        }
        self.services.push(service);
        self.resolved = false;
        true
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// All queries in declaration order
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Dereference a query handle
    ///
    /// # Panics
    /// If `id` was not returned by this registry. A handle minted by a
    /// different registry may point past the end of this one's query table.
    pub fn query(&self, id: QueryId) -> &Query {
        &self.queries[id.0]
    }

    /// Look a query up by name
    pub fn find_query(&self, name: &str) -> Option<QueryId> {
        self.index.get(name).copied()
    }

    /// Whether every service has been bound to its queries
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Bind every service's query names to query handles
    ///
    /// Runs over services in declaration order. Nothing is committed unless
    /// every name resolves, so a failed call leaves all services unbound.
    ///
    /// # Errors
    /// `UnresolvedQuery` naming the first service and query that did not match.
    pub fn resolve(&mut self) -> Result<(), ResolveError> {
        let mut bindings = Vec::with_capacity(self.services.len());

        for service in &self.services {
            let mut ids = Vec::with_capacity(service.queries.len());
            for name in &service.queries {
                let id = self
                    .find_query(name)
                    .ok_or_else(|| ResolveError::UnresolvedQuery {
                        service: service.name.clone(),
                        query: name.clone(),
                    })?;
                if ids.contains(&id) {
                    warn!(
                        service = %service.name,
                        query = %name,
                        "Query listed more than once; it will be polled repeatedly"
                    );
                }
                ids.push(id);
            }
            bindings.push(ids);
        }

        for (service, ids) in self.services.iter_mut().zip(bindings) {
            service.resolved = ids;
        }
        self.resolved = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert_query(Query::new("thermal", "/Thermal")).unwrap();
        registry.insert_query(Query::new("power", "/Power")).unwrap();
        registry
    }

    #[test]
    fn test_insert_query_rejects_duplicate() {
        let mut registry = registry();
        assert!(registry.insert_query(Query::new("thermal", "/Other")).is_none());
        assert_eq!(registry.queries().len(), 2);
        assert_eq!(registry.query(registry.find_query("thermal").unwrap()).endpoint(), "/Thermal");
    }

    #[test]
    fn test_push_service_rejects_duplicate() {
        let mut registry = registry();
        assert!(registry.push_service(Service::new("bmc", "https://a")));
        assert!(!registry.push_service(Service::new("bmc", "https://b")));
        assert_eq!(registry.services().len(), 1);
    }

    #[test]
    fn test_resolve_preserves_order_and_duplicates() {
        let mut registry = registry();
        registry.push_service(
            Service::new("bmc", "https://a")
                .with_query("power")
                .with_query("thermal")
                .with_query("power"),
        );
        registry.resolve().unwrap();

        let names: Vec<&str> = registry.services()[0]
            .resolved_queries()
            .iter()
            .map(|id| registry.query(*id).name())
            .collect();
        assert_eq!(names, ["power", "thermal", "power"]);
        assert!(registry.is_resolved());
    }

    #[test]
    #[should_panic]
    fn test_foreign_query_handle_panics() {
        let mut other = Registry::new();
        for name in ["a", "b", "c"] {
            other.insert_query(Query::new(name, "/x")).unwrap();
        }
        let foreign = other.find_query("c").unwrap();

        let _ = registry().query(foreign);
    }

    #[test]
    fn test_resolve_is_all_or_nothing() {
        let mut registry = registry();
        registry.push_service(Service::new("good", "https://a").with_query("thermal"));
        registry.push_service(Service::new("bad", "https://b").with_query("missing"));

        let err = registry.resolve().unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnresolvedQuery { ref service, ref query } if service == "bad" && query == "missing"
        ));
        assert!(!registry.is_resolved());
        assert!(registry.services()[0].resolved_queries().is_empty());
    }

    #[test]
    fn test_auth_precedence() {
        let basic = Auth::from_parts(Some("u".into()), Some("p".into()), Some("t".into()));
        assert!(matches!(basic, Auth::Basic { .. }));

        let bearer = Auth::from_parts(Some("u".into()), None, Some("t".into()));
        assert_eq!(bearer, Auth::Bearer("t".into()));

        assert_eq!(Auth::from_parts(None, Some("p".into()), None), Auth::None);
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let auth = Auth::Basic {
            user: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert!(!format!("{:?}", Auth::Bearer("tok".into())).contains("tok"));
    }
}
