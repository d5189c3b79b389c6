use std::time::Instant;

use serde_json::{json, Value};
use thiserror::Error;

use crate::adapters::http::ResponseSender;
use crate::runtime::contract::{CfnRequest, CfnResponse, RequestType, ResponseData};
use crate::telemetry::{log_error, log_info};

const COMPONENT: &str = "custom_resource";

/// Failure of one lifecycle step; becomes the `Reason` of a FAILED response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step}: {message}")]
pub struct ResourceError {
    pub step: &'static str,
    pub message: String,
}

impl ResourceError {
    pub fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

pub trait CustomResource {
    fn name(&self) -> &'static str;

    fn create(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError>;

    fn update(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError>;

    fn delete(&self, request: &CfnRequest) -> Result<ResponseData, ResourceError>;
}

/// Dispatches the event, reports the outcome to CloudFormation and returns
/// the delivered response. Only a response that cannot be delivered is an
/// error; resource failures become FAILED responses.
pub fn run_lifecycle(
    request: &CfnRequest,
    log_stream: &str,
    resource: &dyn CustomResource,
    sender: &dyn ResponseSender,
) -> Result<CfnResponse, String> {
    let started_at = Instant::now();
    log_info(
        COMPONENT,
        "lifecycle_started",
        json!({
            "resource": resource.name(),
            "request_type": request.request_type.as_str(),
            "logical_resource_id": request.logical_resource_id.clone(),
            "request_id": request.request_id.clone(),
        }),
    );

    let outcome = match request.request_type {
        RequestType::Create => resource.create(request),
        RequestType::Update => resource.update(request),
        RequestType::Delete => resource.delete(request),
    };

    let response = match outcome {
        Ok(data) => {
            log_info(
                COMPONENT,
                "lifecycle_succeeded",
                json!({
                    "resource": resource.name(),
                    "request_type": request.request_type.as_str(),
                    "duration_ms": started_at.elapsed().as_millis(),
                    "data": data.clone(),
                }),
            );
            CfnResponse::success(request, data, log_stream)
        }
        Err(error) => {
            log_error(
                COMPONENT,
                "lifecycle_failed",
                json!({
                    "resource": resource.name(),
                    "request_type": request.request_type.as_str(),
                    "duration_ms": started_at.elapsed().as_millis(),
                    "step": error.step,
                    "error": error.message.clone(),
                }),
            );
            CfnResponse::failure(request, &error.to_string())
        }
    };

    let body = serde_json::to_vec(&response)
        .map_err(|error| format!("failed to serialize custom resource response: {error}"))?;
    sender.send_response(&request.response_url, &body)?;

    log_info(
        COMPONENT,
        "response_sent",
        json!({
            "status": response.status,
            "physical_resource_id": response.physical_resource_id.clone(),
        }),
    );
    Ok(response)
}

/// Answers an event that failed to parse with a FAILED response so the stack
/// does not wait out its timeout. Errors when the event has no `ResponseURL`
/// or the response cannot be delivered.
pub fn reject_malformed_event(
    event: &Value,
    message: &str,
    sender: &dyn ResponseSender,
) -> Result<CfnResponse, String> {
    log_error(
        COMPONENT,
        "malformed_event",
        json!({
            "error": message,
            "request_id": event.get("RequestId").cloned().unwrap_or(Value::Null),
        }),
    );

    let Some((response_url, response)) = CfnResponse::rejection(event, message) else {
        return Err(format!("{message}; no ResponseURL to report the failure to"));
    };

    let body = serde_json::to_vec(&response)
        .map_err(|error| format!("failed to serialize custom resource response: {error}"))?;
    sender.send_response(&response_url, &body)?;

    log_info(
        COMPONENT,
        "response_sent",
        json!({
            "status": response.status,
            "physical_resource_id": response.physical_resource_id.clone(),
        }),
    );
    Ok(response)
}
