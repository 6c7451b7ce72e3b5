//! Config builder
//!
//! Turns the directive tree into a [`Registry`]. Queries are indexed by name
//! as they are read; services keep their raw query-name lists because a
//! service may reference a query declared further down. Binding happens in
//! [`Registry::resolve`].
//!
//! Loading is all-or-nothing: the registry under construction is a local
//! value, so any error drops it before the caller can see it.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::{ConfigError, ConfigItem};
use crate::model::{Auth, Property, Query, Registry, Resource, Service};

/// Build a registry from the top-level `Query` / `Service` directives
///
/// # Errors
/// The first [`ConfigError`] encountered; no registry is returned in that case.
pub fn load_config(items: &[ConfigItem]) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new();

    for item in items {
        if item.is("Query") {
            let query = parse_query(item)?;
            let name = query.name().to_string();
            registry
                .insert_query(query)
                .ok_or(ConfigError::DuplicateQuery(name))?;
        } else if item.is("Service") {
            let service = parse_service(item)?;
            let name = service.name().to_string();
            if !registry.push_service(service) {
                return Err(ConfigError::DuplicateService(name));
            }
        } else {
            return Err(unknown(item));
        }
    }

    debug!(
        queries = registry.queries().len(),
        services = registry.services().len(),
        "Configuration loaded"
    );

    Ok(registry)
}

fn unknown(item: &ConfigItem) -> ConfigError {
    ConfigError::UnknownDirective {
        key: item.key.clone(),
    }
}

fn block_name(item: &ConfigItem, directive: &'static str) -> Result<String, ConfigError> {
    let name = item.get_string()?;
    if name.is_empty() {
        return Err(ConfigError::EmptyName { directive });
    }
    Ok(name)
}

fn parse_query(item: &ConfigItem) -> Result<Query, ConfigError> {
    let name = block_name(item, "Query")?;
    let mut endpoint = None;
    let mut resources: Vec<Resource> = Vec::new();

    for opt in &item.children {
        if opt.is("Endpoint") {
            endpoint = Some(opt.get_string()?);
        } else if opt.is("Resource") {
            push_resource(&mut resources, parse_resource(opt)?, &name)?;
        } else {
            return Err(unknown(opt));
        }
    }

    let endpoint = endpoint.ok_or(ConfigError::MissingOption {
        directive: "Query",
        name: name.clone(),
        option: "Endpoint",
    })?;

    Ok(Query {
        name,
        endpoint,
        resources,
    })
}

fn push_resource(
    siblings: &mut Vec<Resource>,
    resource: Resource,
    parent: &str,
) -> Result<(), ConfigError> {
    if siblings.iter().any(|r| r.name == resource.name) {
        return Err(ConfigError::DuplicateResource {
            parent: parent.to_string(),
            resource: resource.name,
        });
    }
    siblings.push(resource);
    Ok(())
}

fn parse_resource(item: &ConfigItem) -> Result<Resource, ConfigError> {
    let name = block_name(item, "Resource")?;
    let mut resource = Resource::new(name);
    let mut seen = HashSet::new();

    for opt in &item.children {
        if opt.is("Property") {
            let property = parse_property(opt)?;
            if !seen.insert(property.name.clone()) {
                return Err(ConfigError::DuplicateProperty {
                    resource: resource.name,
                    property: property.name,
                });
            }
            resource.properties.push(property);
        } else if opt.is("Resource") {
            let child = parse_resource(opt)?;
            push_resource(&mut resource.resources, child, &resource.name)?;
        } else {
            return Err(unknown(opt));
        }
    }

    Ok(resource)
}

fn parse_property(item: &ConfigItem) -> Result<Property, ConfigError> {
    let mut property = Property::new(block_name(item, "Property")?);

    for opt in &item.children {
        if opt.is("PluginInstance") {
            property.plugin_instance = opt.get_string()?;
        } else if opt.is("Type") {
            property.type_ = opt.get_string()?;
        } else if opt.is("TypeInstance") {
            property.type_instance = opt.get_string()?;
        } else {
            return Err(unknown(opt));
        }
    }

    Ok(property)
}

fn parse_service(item: &ConfigItem) -> Result<Service, ConfigError> {
    let name = block_name(item, "Service")?;
    let mut host = None;
    let mut user = None;
    let mut password = None;
    let mut token = None;
    let mut queries = Vec::new();

    for opt in &item.children {
        if opt.is("Host") {
            host = Some(opt.get_string()?);
        } else if opt.is("User") {
            user = Some(opt.get_string()?);
        } else if opt.is("Passwd") {
            password = Some(opt.get_string()?);
        } else if opt.is("Token") {
            token = Some(opt.get_string()?);
        } else if opt.is("Queries") {
            queries.extend(opt.get_strings()?);
        } else {
            return Err(unknown(opt));
        }
    }

    let host = host.ok_or(ConfigError::MissingOption {
        directive: "Service",
        name: name.clone(),
        option: "Host",
    })?;

    if user.is_some() != password.is_some() {
        warn!(
            service = %name,
            "User and Passwd must be set together; ignoring the incomplete pair"
        );
    }
    if queries.is_empty() {
        warn!(service = %name, "Service has no queries and will never be polled");
    }

    Ok(Service {
        name,
        host,
        auth: Auth::from_parts(user, password, token),
        queries,
        resolved: Vec::new(),
    })
}
