use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::delta::{CounterValue, DeltaRecord};

/// Which database family a batch of delta records came from. Drives the resource
/// attribute `db.system` and the fixed set of per-family log attributes (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Mysql,
    Postgresql,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Mysql => "mysql",
            Family::Postgresql => "postgresql",
        }
    }
}

/// Serialized as either a string, an integer, or a float attribute value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<CounterValue> for AttributeValue {
    fn from(value: CounterValue) -> Self {
        match value {
            CounterValue::Int(v) => AttributeValue::Int(v),
            CounterValue::Float(v) => AttributeValue::Float(v),
        }
    }
}

/// The resource scope shared by every record in a batch: which service emitted it, which
/// database system it describes, and which instance. Hand-modeled in the shape an OTLP
/// exporter expects rather than depending on an `opentelemetry` crate, since the exporter
/// itself is an external collaborator out of scope for this crate.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceScope {
    #[serde(rename = "service.name")]
    pub service_name: &'static str,
    #[serde(rename = "db.system")]
    pub db_system: &'static str,
    #[serde(rename = "resource.instance.id")]
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub severity: &'static str,
    pub timestamp: DateTime<Utc>,
    pub body: String,
    pub attributes: Vec<(&'static str, AttributeValue)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogBatch {
    pub resource: ResourceScope,
    pub instrumentation_scope: &'static str,
    pub records: Vec<LogRecord>,
}

impl LogBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

const SERVICE_NAME: &str = "obsidian-core";
const INSTRUMENTATION_SCOPE: &str = "qanprocessor";

/// Maps a family's delta records into a single resource-scoped `LogBatch` (§4.5). Emission
/// timestamp is captured once per build call, at the end of the interval being reported.
pub struct LogBuilder;

impl LogBuilder {
    pub fn build(family: Family, instance_id: &str, records: &[DeltaRecord]) -> LogBatch {
        let emitted_at = Utc::now();
        let resource = ResourceScope {
            service_name: SERVICE_NAME,
            db_system: family.as_str(),
            instance_id: instance_id.to_owned(),
        };

        let records = records
            .iter()
            .map(|record| {
                let mut attributes: Vec<(&'static str, AttributeValue)> = vec![
                    (
                        "db.statement.sample",
                        AttributeValue::String(record.text.clone()),
                    ),
                    (
                        "db.query.time_period_seconds",
                        AttributeValue::Float(record.time_period_seconds),
                    ),
                ];
                attributes.extend(
                    record
                        .identity
                        .iter()
                        .map(|(k, v)| (*k, AttributeValue::String(v.clone()))),
                );
                attributes.extend(
                    record
                        .counters
                        .iter()
                        .map(|(k, v)| (*k, AttributeValue::from(*v))),
                );

                LogRecord {
                    severity: "INFO",
                    timestamp: emitted_at,
                    body: record.text.clone(),
                    attributes,
                }
            })
            .collect();

        LogBatch {
            resource,
            instrumentation_scope: INSTRUMENTATION_SCOPE,
            records,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_input_produces_empty_batch() {
        let batch = LogBuilder::build(Family::Mysql, "mysql://localhost/db", &[]);
        assert!(batch.is_empty());
        assert_eq!(batch.resource.service_name, "obsidian-core");
        assert_eq!(batch.resource.db_system, "mysql");
    }

    #[test]
    fn one_record_carries_common_and_identity_attributes() {
        let record = DeltaRecord {
            key: "digest1".to_owned(),
            text: "SELECT ?".to_owned(),
            time_period_seconds: 10.0,
            identity: vec![("db.schema", "prod".to_owned())],
            counters: vec![("db.query.calls.delta", CounterValue::Int(2))],
        };
        let batch = LogBuilder::build(Family::Mysql, "mysql://localhost/db", &[record]);
        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.body, "SELECT ?");
        assert!(record
            .attributes
            .iter()
            .any(|(k, _)| *k == "db.query.time_period_seconds"));
        assert!(record.attributes.iter().any(|(k, _)| *k == "db.schema"));
    }
}
