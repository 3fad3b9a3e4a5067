use crate::tools::error::CapabilityError;
use crate::tools::registry::Capability;
use crate::tools::CURRENT_DATETIME;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// `now() -> timestamp`, used to stamp retrieved results.
#[derive(Debug, Clone, Default)]
pub struct ClockCapability {
    fixed: Option<DateTime<Utc>>,
}

impl ClockCapability {
    pub fn new() -> Self {
        Self { fixed: None }
    }

    /// A clock frozen at `at`.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self { fixed: Some(at) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed.unwrap_or_else(Utc::now)
    }
}

pub fn format_human(at: &DateTime<Utc>) -> String {
    format!(
        "Current date and time: {}",
        at.format("%A, %B %d, %Y at %I:%M %p UTC")
    )
}

/// Read the timestamp back out of a clock result.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl Capability for ClockCapability {
    fn name(&self) -> &str {
        CURRENT_DATETIME
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: Value) -> Result<Value, CapabilityError> {
        let now = self.now();
        Ok(json!({
            "timestamp": now.to_rfc3339(),
            "formatted": format_human(&now),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_fixed_clock_output() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        let clock = ClockCapability::fixed(at);
        let value = clock.call(json!({})).await.unwrap();

        assert_eq!(
            value["formatted"],
            "Current date and time: Tuesday, March 05, 2024 at 02:07 PM UTC"
        );
        assert_eq!(parse_timestamp(&value), Some(at));
    }
}
