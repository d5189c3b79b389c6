use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SAML_PROVIDER_ARN_KEY: &str = "SAMLProviderArn";
pub const MASTER_NODE_IP_KEY: &str = "MasterNodeIp";
pub const MASTER_NODE_INSTANCE_ID_KEY: &str = "MasterNodeInstanceId";

/// CloudFormation rejects responses whose reason is much longer than this.
pub const MAX_REASON_BYTES: usize = 1024;
const PHYSICAL_ID_SUFFIX_LEN: usize = 8;

pub type ResponseData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// Custom-resource lifecycle event as delivered by CloudFormation.
///
/// Resource properties stay untyped until a handler asks for them through
/// [`CfnRequest::properties`], so a bad property set can still be answered
/// with a FAILED response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_type: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Value>,
}

impl CfnRequest {
    pub fn properties<T: ResourceProperties>(&self) -> Result<T, ContractError> {
        let properties: T = serde_json::from_value(self.resource_properties.clone()).map_err(
            |error| ContractError::MalformedProperties {
                resource: T::RESOURCE,
                reason: error.to_string(),
            },
        )?;
        properties.validate()?;
        Ok(properties)
    }
}

pub fn parse_request(event: Value) -> Result<CfnRequest, ContractError> {
    serde_json::from_value(event).map_err(|error| ContractError::MalformedEvent(error.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("invalid custom resource event: {0}")]
    MalformedEvent(String),
    #[error("invalid {resource} properties: {reason}")]
    MalformedProperties {
        resource: &'static str,
        reason: String,
    },
    #[error("{field} cannot be empty")]
    EmptyProperty { field: &'static str },
}

pub trait ResourceProperties: DeserializeOwned {
    const RESOURCE: &'static str;

    fn validate(&self) -> Result<(), ContractError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdpResourceProperties {
    #[serde(rename = "DataBucketName")]
    pub data_bucket_name: String,
    #[serde(rename = "SAMLProviderName")]
    pub saml_provider_name: String,
    #[serde(rename = "OktaAppMetadataURL")]
    pub okta_app_metadata_url: String,
}

impl ResourceProperties for IdpResourceProperties {
    const RESOURCE: &'static str = "identity provider";

    fn validate(&self) -> Result<(), ContractError> {
        require_non_blank("DataBucketName", &self.data_bucket_name)?;
        require_non_blank("SAMLProviderName", &self.saml_provider_name)?;
        require_non_blank("OktaAppMetadataURL", &self.okta_app_metadata_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterNodeResourceProperties {
    #[serde(rename = "ClusterId")]
    pub cluster_id: String,
}

impl ResourceProperties for MasterNodeResourceProperties {
    const RESOURCE: &'static str = "master node lookup";

    fn validate(&self) -> Result<(), ContractError> {
        require_non_blank("ClusterId", &self.cluster_id)
    }
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::EmptyProperty { field });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body PUT to the pre-signed `ResponseURL` once a lifecycle event is handled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CfnResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: ResponseData,
}

impl CfnResponse {
    pub fn success(request: &CfnRequest, data: ResponseData, log_stream: &str) -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: format!("See the details in CloudWatch Log Stream: {log_stream}"),
            physical_resource_id: physical_resource_id(request),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data,
        }
    }

    pub fn failure(request: &CfnRequest, message: &str) -> Self {
        Self {
            status: ResponseStatus::Failed,
            reason: truncate_reason(message),
            physical_resource_id: physical_resource_id(request),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data: ResponseData::new(),
        }
    }

    /// FAILED response for an event that did not parse, built from whatever
    /// envelope fields are present. Returns `None` without a `ResponseURL`,
    /// since there is nowhere to deliver it.
    pub fn rejection(event: &Value, message: &str) -> Option<(String, Self)> {
        let field = |key: &str| {
            event
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let response_url = field("ResponseURL");
        if response_url.trim().is_empty() {
            return None;
        }

        let stack_id = field("StackId");
        let request_id = field("RequestId");
        let logical_resource_id = field("LogicalResourceId");
        let existing = field("PhysicalResourceId");
        let response = Self {
            status: ResponseStatus::Failed,
            reason: truncate_reason(message),
            physical_resource_id: derive_physical_id(
                Some(existing.as_str()),
                &stack_id,
                &logical_resource_id,
                &request_id,
            ),
            stack_id,
            request_id,
            logical_resource_id,
            no_echo: false,
            data: ResponseData::new(),
        };
        Some((response_url, response))
    }
}

/// Echoes the id CloudFormation already knows about; on Create, derives
/// `<stack-name>_<logical-id>_<suffix>` from the request id.
pub fn physical_resource_id(request: &CfnRequest) -> String {
    derive_physical_id(
        request.physical_resource_id.as_deref(),
        &request.stack_id,
        &request.logical_resource_id,
        &request.request_id,
    )
}

fn derive_physical_id(
    existing: Option<&str>,
    stack_id: &str,
    logical_resource_id: &str,
    request_id: &str,
) -> String {
    if let Some(existing) = existing.filter(|value| !value.trim().is_empty()) {
        return existing.to_string();
    }

    let stack_name = stack_id
        .split('/')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(stack_id);

    let mut hasher = Sha256::new();
    hasher.update(request_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!(
        "{stack_name}_{logical_resource_id}_{}",
        &digest[..PHYSICAL_ID_SUFFIX_LEN]
    )
}

fn truncate_reason(message: &str) -> String {
    if message.len() <= MAX_REASON_BYTES {
        return message.to_string();
    }

    let mut end = MAX_REASON_BYTES;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
