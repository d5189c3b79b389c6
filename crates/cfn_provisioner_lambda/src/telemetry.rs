//! One-line JSON progress records written to stderr, where the Lambda
//! platform forwards them to CloudWatch Logs.

use serde_json::{json, Value};

pub fn log_info(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_record(component, "info", event, details));
}

pub fn log_warn(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_record(component, "warn", event, details));
}

pub fn log_error(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_record(component, "error", event, details));
}

fn log_record(component: &str, level: &str, event: &str, details: Value) -> Value {
    json!({
        "component": component,
        "level": level,
        "event": event,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "details": details,
    })
}
