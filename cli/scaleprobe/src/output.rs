//! Output formatting for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use scaleprobe_lifecycle::Observation;
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "scaleprobe.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Table row for one observation.
#[derive(Debug, Clone, Tabled)]
pub struct ObservationRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Readiness")]
    readiness: String,
    #[tabled(rename = "Observed At")]
    observed_at: String,
}

impl From<&Observation> for ObservationRow {
    fn from(observation: &Observation) -> Self {
        Self {
            unit: observation.unit.name.clone(),
            workload: observation.owner_label().to_string(),
            phase: observation.phase_label().to_string(),
            readiness: observation.readiness.to_string(),
            observed_at: observation
                .observed_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

/// Print a batch of observations.
pub fn print_observations(observations: &[Observation], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if observations.is_empty() {
                println!("{}", "No units found.".dimmed());
            } else {
                let rows: Vec<ObservationRow> = observations.iter().map(Into::into).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => print_json(&observations),
    }
}

/// Print one streamed observation as a single line.
pub fn print_observation_line(observation: &Observation, format: OutputFormat) {
    println!("{}", observation_line(observation, format));
}

fn observation_line(observation: &Observation, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let row = ObservationRow::from(observation);
            format!(
                "{}\t{}\t{}\t{}\t{}",
                row.observed_at, row.unit, row.workload, row.phase, row.readiness
            )
        }
        OutputFormat::Json => {
            let value = serde_json::to_value(observation).unwrap_or_else(|_| serde_json::json!({}));
            let sorted = sort_json_value(camel_case_keys(value));
            serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Print a single item as schema-wrapped JSON.
pub fn print_json<T: Serialize + ?Sized>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

/// Print a warning to stderr.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = wrap_with_schema(camel_case_keys(value));
    let sorted = sort_json_value(wrapped);
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(sort_json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut pairs: Vec<_> = entries.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut mapped = serde_json::Map::new();
            for (key, value) in pairs {
                mapped.insert(key, sort_json_value(value));
            }
            serde_json::Value::Object(mapped)
        }
        other => other,
    }
}

fn camel_case_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(camel_case_keys).collect())
        }
        serde_json::Value::Object(entries) => serde_json::Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (snake_to_lower_camel(&key), camel_case_keys(value)))
                .collect(),
        ),
        other => other,
    }
}

fn snake_to_lower_camel(input: &str) -> String {
    let mut parts = input.split('_');
    let Some(first) = parts.next() else {
        return String::new();
    };
    let mut out = String::from(first);
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let mut chars = part.chars();
        if let Some(first_char) = chars.next() {
            out.push(first_char.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use scaleprobe_lifecycle::{Attribution, ObjectRef, Readiness};

    use super::*;

    fn observation() -> Observation {
        Observation {
            unit: ObjectRef::new("default", "web-7d4b9-x2k"),
            owner: Attribution::owned("web"),
            readiness: Readiness::Measured {
                seconds: 7,
                anomalous: false,
            },
            phase: Some("Running".to_string()),
            observed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 7).unwrap(),
        }
    }

    #[test]
    fn json_is_wrapped_sorted_and_camel_cased() {
        let value = sort_json_value(wrap_with_schema(camel_case_keys(
            serde_json::to_value(observation()).unwrap(),
        )));
        let keys: Vec<&String> = value["data"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["observedAt", "owner", "phase", "readiness", "unit"]);
        assert_eq!(value["schemaVersion"], "scaleprobe.v1");
        assert_eq!(value["data"]["readiness"]["seconds"], 7);
    }

    #[test]
    fn table_line_is_tab_separated() {
        let line = observation_line(&observation(), OutputFormat::Table);
        assert_eq!(line, "2024-03-01T12:00:07Z\tweb-7d4b9-x2k\tweb\tRunning\t7s");
    }

    #[test]
    fn json_line_is_compact() {
        let line = observation_line(&observation(), OutputFormat::Json);
        assert!(!line.contains('\n'));
        assert!(line.starts_with(r#"{"observedAt":"2024-03-01T12:00:07Z""#));
    }

    #[test]
    fn snake_keys_become_camel() {
        assert_eq!(snake_to_lower_camel("previous_replicas"), "previousReplicas");
        assert_eq!(snake_to_lower_camel("data"), "data");
    }
}
