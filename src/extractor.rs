//! Payload extractor
//!
//! Walks a query's resource tree over a fetched JSON payload and produces one
//! [`MetricSample`] per configured property that holds a scalar value.
//! Anything missing or of the wrong shape is skipped at the smallest scope:
//! a missing resource skips that subtree, a missing property skips one sample.
//!
//! When a resource key holds an array (Redfish collections such as
//! `Temperatures` or `Fans`), every object member is visited and labelled by
//! its `Name`, else its `MemberId`, else its position.

use std::time::SystemTime;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::model::{Property, Query, Resource, Service};
use crate::sink::{MetricSample, PLUGIN_NAME};

struct Walk<'a> {
    service: &'a Service,
    timestamp: SystemTime,
    samples: Vec<MetricSample>,
}

/// Extract samples for `query` from a payload fetched from `service`
pub fn extract(
    service: &Service,
    query: &Query,
    payload: &Value,
    timestamp: SystemTime,
) -> Vec<MetricSample> {
    let mut walk = Walk {
        service,
        timestamp,
        samples: Vec::new(),
    };

    let Some(root) = payload.as_object() else {
        debug!(
            service = %service.name(),
            query = %query.name(),
            "Payload is not a JSON object; nothing to extract"
        );
        return walk.samples;
    };

    for resource in query.resources() {
        walk.resource(resource, root, None);
    }

    trace!(
        service = %service.name(),
        query = %query.name(),
        samples = walk.samples.len(),
        "Payload extracted"
    );
    walk.samples
}

impl Walk<'_> {
    fn resource(&mut self, resource: &Resource, parent: &Map<String, Value>, member: Option<&str>) {
        match parent.get(resource.name()) {
            Some(Value::Object(obj)) => self.object(resource, obj, member),
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let Value::Object(obj) = item else {
                        continue;
                    };
                    let label = member_label(obj, i);
                    let label = match member {
                        Some(outer) => format!("{}-{}", outer, label),
                        None => label,
                    };
                    self.object(resource, obj, Some(label.as_str()));
                }
            }
            Some(_) => {
                debug!(
                    service = %self.service.name(),
                    resource = %resource.name(),
                    "Resource is neither an object nor an array; skipping"
                );
            }
            None => {
                debug!(
                    service = %self.service.name(),
                    resource = %resource.name(),
                    "Resource not present in payload; skipping"
                );
            }
        }
    }

    fn object(&mut self, resource: &Resource, obj: &Map<String, Value>, member: Option<&str>) {
        for property in resource.properties() {
            match obj.get(property.name()).and_then(scalar) {
                Some(value) => {
                    let sample = self.sample(property, member, value);
                    self.samples.push(sample);
                }
                None => debug!(
                    service = %self.service.name(),
                    resource = %resource.name(),
                    property = %property.name(),
                    "Property missing or not numeric; skipping"
                ),
            }
        }

        for child in resource.resources() {
            self.resource(child, obj, member);
        }
    }

    fn sample(&self, property: &Property, member: Option<&str>, value: f64) -> MetricSample {
        let plugin_instance = if property.plugin_instance().is_empty() {
            self.service.name()
        } else {
            property.plugin_instance()
        };
        let type_ = if property.type_().is_empty() {
            property.name()
        } else {
            property.type_()
        };
        let type_instance = match (property.type_instance(), member) {
            (configured, None) => configured.to_string(),
            ("", Some(label)) => label.to_string(),
            (configured, Some(label)) => format!("{}-{}", configured, label),
        };

        MetricSample {
            service: self.service.name().to_string(),
            plugin: PLUGIN_NAME,
            plugin_instance: plugin_instance.to_string(),
            type_: type_.to_string(),
            type_instance,
            value,
            timestamp: self.timestamp,
        }
    }
}

/// Finite numeric value of a JSON scalar
///
/// Numeric strings are parsed; `NaN`, infinities and out-of-range strings are
/// rejected. Booleans are not scalars here.
fn scalar(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn member_label(obj: &Map<String, Value>, index: usize) -> String {
    ["Name", "MemberId"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}
