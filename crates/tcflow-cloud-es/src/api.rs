//! Elasticsearch API surface
//!
//! The vendor SDK is treated as an opaque RPC stub: an action name plus a
//! JSON request body in, a JSON response body or an [`ApiError`] out. Each
//! request type below names its action and response type so the service
//! layer can call it without knowing anything about the wire.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tcflow_cloud::ApiError;

use crate::model::{
    EsAcl, IndexMetaField, InstanceInfo, LogstashInstanceInfo, LogstashPipeline,
    LogstashPipelineInfo, NodeInfo, PluginInfo, WebNodeTypeInfo,
};

/// Raw SDK client
#[async_trait]
pub trait EsApi: Send + Sync {
    async fn call(&self, action: &str, request: Value) -> Result<Value, ApiError>;
}

/// A typed request for one API action
pub trait EsAction: Serialize + Send + Sync {
    const ACTION: &'static str;
    type Response: DeserializeOwned + Send;
}

/// Response body of actions that return nothing of interest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Empty {
    #[serde(default)]
    pub request_id: Option<String>,
}

macro_rules! action {
    ($req:ty, $name:literal, $resp:ty) => {
        impl EsAction for $req {
            const ACTION: &'static str = $name;
            type Response = $resp;
        }
    };
}

// ---- Elasticsearch instances ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInstanceRequest {
    pub zone: String,
    pub es_version: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub password: String,
    pub instance_name: String,
    pub charge_type: String,
    pub license_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_security_type: Option<i64>,
    pub node_info_list: Vec<NodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_node_type_info: Option<WebNodeTypeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInstanceResponse {
    pub instance_id: String,
}

action!(CreateInstanceRequest, "CreateInstance", CreateInstanceResponse);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_names: Vec<String>,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub instance_list: Vec<InstanceInfo>,
}

action!(DescribeInstancesRequest, "DescribeInstances", DescribeInstancesResponse);

/// Partial instance update; only present fields are changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateInstanceRequest {
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_security_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_info_list: Option<Vec<NodeInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_acl: Option<EsAcl>,
    /// "OPEN" or "CLOSE"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kibana_public_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kibana_private_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_node_type_info: Option<WebNodeTypeInfo>,
}

impl UpdateInstanceRequest {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }
}

action!(UpdateInstanceRequest, "UpdateInstance", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeInstanceRequest {
    pub instance_id: String,
    pub es_version: String,
}

action!(UpgradeInstanceRequest, "UpgradeInstance", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeLicenseRequest {
    pub instance_id: String,
    pub license_type: String,
}

action!(UpgradeLicenseRequest, "UpgradeLicense", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartInstanceRequest {
    pub instance_id: String,
    pub force_restart: bool,
    /// 0 full restart, 1 rolling restart
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_mode: Option<i64>,
}

action!(RestartInstanceRequest, "RestartInstance", Empty);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdatePluginsRequest {
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub install_plugin_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_plugin_list: Vec<String>,
    pub force_restart: bool,
}

action!(UpdatePluginsRequest, "UpdatePlugins", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancePluginListRequest {
    pub instance_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancePluginListResponse {
    #[serde(default)]
    pub plugin_list: Vec<PluginInfo>,
}

action!(
    DescribeInstancePluginListRequest,
    "DescribeInstancePluginList",
    DescribeInstancePluginListResponse
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteInstanceRequest {
    pub instance_id: String,
}

action!(DeleteInstanceRequest, "DeleteInstance", Empty);

// ---- Indices ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateIndexRequest {
    pub instance_id: String,
    pub index_type: String,
    pub index_name: String,
    pub index_meta_json: String,
}

action!(CreateIndexRequest, "CreateIndex", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeIndexMetaRequest {
    pub instance_id: String,
    pub index_type: String,
    pub index_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeIndexMetaResponse {
    #[serde(default)]
    pub index_meta_field: Option<IndexMetaField>,
}

action!(DescribeIndexMetaRequest, "DescribeIndexMeta", DescribeIndexMetaResponse);

/// Sparse metadata update; the backend rejects full documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateIndexRequest {
    pub instance_id: String,
    pub index_type: String,
    pub index_name: String,
    pub update_meta_json: String,
}

action!(UpdateIndexRequest, "UpdateIndex", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteIndexRequest {
    pub instance_id: String,
    pub index_type: String,
    pub index_name: String,
}

action!(DeleteIndexRequest, "DeleteIndex", Empty);

// ---- Logstash ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLogstashInstanceRequest {
    pub instance_name: String,
    pub zone: String,
    pub logstash_version: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub node_num: u64,
    pub node_type: String,
    pub disk_type: String,
    pub disk_size: u64,
    pub license_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLogstashInstanceResponse {
    pub instance_id: String,
}

action!(
    CreateLogstashInstanceRequest,
    "CreateLogstashInstance",
    CreateLogstashInstanceResponse
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLogstashInstancesRequest {
    pub instance_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLogstashInstancesResponse {
    #[serde(default)]
    pub instance_list: Vec<LogstashInstanceInfo>,
}

action!(
    DescribeLogstashInstancesRequest,
    "DescribeLogstashInstances",
    DescribeLogstashInstancesResponse
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateLogstashInstanceRequest {
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_num: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<u64>,
}

action!(UpdateLogstashInstanceRequest, "UpdateLogstashInstance", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteLogstashInstanceRequest {
    pub instance_id: String,
}

action!(DeleteLogstashInstanceRequest, "DeleteLogstashInstance", Empty);

/// Operation type of [`SaveAndDeployLogstashPipelineRequest`]: save only
pub const PIPELINE_OP_SAVE: i64 = 1;
/// Operation type of [`SaveAndDeployLogstashPipelineRequest`]: save and deploy
pub const PIPELINE_OP_SAVE_AND_DEPLOY: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveAndDeployLogstashPipelineRequest {
    pub instance_id: String,
    pub pipeline: LogstashPipeline,
    pub op_type: i64,
}

action!(
    SaveAndDeployLogstashPipelineRequest,
    "SaveAndDeployLogstashPipeline",
    Empty
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLogstashPipelinesRequest {
    pub instance_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLogstashPipelinesResponse {
    #[serde(default)]
    pub logstash_pipeline_list: Vec<LogstashPipelineInfo>,
}

action!(
    DescribeLogstashPipelinesRequest,
    "DescribeLogstashPipelines",
    DescribeLogstashPipelinesResponse
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartLogstashPipelinesRequest {
    pub instance_id: String,
    pub pipeline_ids: Vec<String>,
}

action!(StartLogstashPipelinesRequest, "StartLogstashPipelines", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopLogstashPipelinesRequest {
    pub instance_id: String,
    pub pipeline_ids: Vec<String>,
}

action!(StopLogstashPipelinesRequest, "StopLogstashPipelines", Empty);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteLogstashPipelinesRequest {
    pub instance_id: String,
    pub pipeline_ids: Vec<String>,
}

action!(DeleteLogstashPipelinesRequest, "DeleteLogstashPipelines", Empty);
