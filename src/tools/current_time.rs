//! Current date/time tool
//!
//! The one tool in the shipping catalog: returns the current system date
//! and time in the requested format and timezone.

use crate::error::Result;
use crate::tools::{Tool, ToolExecutor, ToolOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};

/// Tool that reports the current system date and time
///
/// Supported formats: `iso` (RFC 3339 / ISO 8601), `readable` (long
/// human-readable form), `timestamp` (Unix seconds), `all`. The optional
/// timezone is an IANA zone name such as "UTC" or "America/New_York";
/// unknown names fall back to UTC, mirroring the lenient behavior users
/// expect from the assistant.
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    fn render(now: DateTime<Utc>, format: &str, timezone: Option<&str>) -> Value {
        let tz: Option<Tz> = timezone.and_then(|name| name.parse().ok());

        let mut result = Map::new();

        if format == "all" || format == "iso" {
            result.insert("iso".to_string(), json!(now.to_rfc3339()));
        }

        if format == "all" || format == "readable" {
            let readable = match tz {
                Some(tz) => now
                    .with_timezone(&tz)
                    .format("%B %-d, %Y, %I:%M:%S %p %Z")
                    .to_string(),
                None => now.format("%B %-d, %Y, %I:%M:%S %p UTC").to_string(),
            };
            result.insert("readable".to_string(), json!(readable));
        }

        if format == "all" || format == "timestamp" {
            result.insert(
                "timestamp".to_string(),
                json!(now.timestamp().to_string()),
            );
        }

        if let Some(name) = timezone {
            result.insert("timezone".to_string(), json!(name));
        }
        result.insert("systemTimezone".to_string(), json!("UTC"));

        Value::Object(result)
    }
}

#[async_trait]
impl ToolExecutor for CurrentTimeTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "get_current_time",
            "Get the current system date and time in various formats",
            json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "The format for the date/time output. Options: \"iso\" (ISO 8601), \"readable\" (human readable), \"timestamp\" (Unix timestamp), or \"all\" (all formats). Defaults to \"readable\".",
                        "enum": ["iso", "readable", "timestamp", "all"]
                    },
                    "timezone": {
                        "type": "string",
                        "description": "The timezone to display the time in. Defaults to the system timezone. Examples: \"UTC\", \"America/New_York\", \"Europe/London\", etc."
                    }
                },
                "required": []
            }),
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutcome> {
        let format = args
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("readable");
        let timezone = args.get("timezone").and_then(Value::as_str);

        let valid_formats = ["iso", "readable", "timestamp", "all"];
        if !valid_formats.contains(&format) {
            return Ok(ToolOutcome::failure(format!(
                "Unsupported format: {}",
                format
            )));
        }

        let now = Utc::now();
        let current_time = Self::render(now, format, timezone);

        tracing::debug!("Current time result: {}", current_time);

        Ok(ToolOutcome::success(json!({
            "message": "Current system date and time retrieved successfully",
            "currentTime": current_time,
            "requestedFormat": format,
            "requestedTimezone": timezone.unwrap_or("system default"),
        })))
    }
}
