//! Metric samples and the sink they are handed to
//!
//! Delivering samples to a storage backend is the sink's business. The crate
//! ships a channel sink for embedding and a JSON-lines sink for the binary.

use std::io::Write;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

/// Plugin name carried by every sample
pub const PLUGIN_NAME: &str = "redfish";

/// One extracted value with its identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// Service that produced the payload
    pub service: String,
    /// Always [`PLUGIN_NAME`]
    pub plugin: &'static str,
    pub plugin_instance: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub type_instance: String,
    pub value: f64,
    /// Fetch completion time, serialized as fractional Unix seconds
    #[serde(serialize_with = "unix_seconds")]
    pub timestamp: SystemTime,
}

fn unix_seconds<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    serializer.serialize_f64(secs)
}

impl MetricSample {
    /// Fully-qualified name: `service/plugin[-plugin_instance]/type[-type_instance]`
    pub fn identifier(&self) -> String {
        let mut id = format!("{}/{}", self.service, self.plugin);
        if !self.plugin_instance.is_empty() {
            id.push('-');
            id.push_str(&self.plugin_instance);
        }
        id.push('/');
        id.push_str(&self.type_);
        if !self.type_instance.is_empty() {
            id.push('-');
            id.push_str(&self.type_instance);
        }
        id
    }
}

/// Receiver of extracted samples
///
/// Called from fetch completion tasks, possibly several at once.
pub trait MetricSink: Send + Sync {
    fn emit(&self, sample: MetricSample);
}

/// Forwards samples into an unbounded Tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MetricSample>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MetricSample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MetricSink for ChannelSink {
    fn emit(&self, sample: MetricSample) {
        if self.tx.send(sample).is_err() {
            tracing::debug!("Sample receiver dropped; discarding sample");
        }
    }
}

/// Writes each sample as one JSON object per line
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    fn emit(&self, sample: MetricSample) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let written = serde_json::to_writer(&mut *out, &sample)
            .map_err(std::io::Error::from)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());
        if let Err(e) = written {
            tracing::error!(error = %e, metric = %sample.identifier(), "Failed to write sample");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> MetricSample {
        MetricSample {
            service: "bmc1".into(),
            plugin: PLUGIN_NAME,
            plugin_instance: "bmc1".into(),
            type_: "temperature".into(),
            type_instance: "CPU1".into(),
            value: 42.0,
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    #[test]
    fn test_identifier() {
        assert_eq!(sample().identifier(), "bmc1/redfish-bmc1/temperature-CPU1");

        let mut bare = sample();
        bare.plugin_instance.clear();
        bare.type_instance.clear();
        assert_eq!(bare.identifier(), "bmc1/redfish/temperature");
    }

    #[test]
    fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(sample());
        sink.emit(sample());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "temperature");
        assert_eq!(parsed["value"], 42.0);
        assert_eq!(parsed["timestamp"], 1_700_000_000.0);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(sample());
    }
}
