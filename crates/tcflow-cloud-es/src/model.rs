//! Entities as returned by the describe actions
//!
//! Status codes are converted to per-resource enums here; nothing past this
//! module compares raw integers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tcflow_cloud::Observe;

/// Status of an Elasticsearch or Logstash instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Processing,
    Normal,
    Stopped,
    Destroying,
    Destroyed,
    Other(i64),
}

impl InstanceStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => InstanceStatus::Processing,
            1 => InstanceStatus::Normal,
            -1 => InstanceStatus::Stopped,
            -2 => InstanceStatus::Destroying,
            -3 => InstanceStatus::Destroyed,
            other => InstanceStatus::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            InstanceStatus::Processing => 0,
            InstanceStatus::Normal => 1,
            InstanceStatus::Stopped => -1,
            InstanceStatus::Destroying => -2,
            InstanceStatus::Destroyed => -3,
            InstanceStatus::Other(code) => code,
        }
    }
}

/// Status of a Logstash pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStatus {
    Deploying,
    Running,
    Stopped,
    Failed,
    Other(i64),
}

impl PipelineStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PipelineStatus::Deploying,
            1 => PipelineStatus::Running,
            2 => PipelineStatus::Stopped,
            -1 => PipelineStatus::Failed,
            other => PipelineStatus::Other(other),
        }
    }
}

/// Health of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexHealth {
    Green,
    Yellow,
    Red,
    Unknown,
}

impl IndexHealth {
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "green" => IndexHealth::Green,
            "yellow" => IndexHealth::Yellow,
            "red" => IndexHealth::Red,
            _ => IndexHealth::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeInfo {
    /// "hotData", "warmData", "dedicatedMaster" or "kibana"
    pub r#type: String,
    pub node_num: u64,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<u64>,
}

/// Kibana node group of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebNodeTypeInfo {
    pub node_num: u64,
    pub node_type: String,
}

/// Access control of the cluster endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EsAcl {
    #[serde(default)]
    pub black_ip_list: Vec<String>,
    #[serde(default)]
    pub white_ip_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceInfo {
    pub instance_id: String,
    pub instance_name: String,
    pub status: i64,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub es_version: String,
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub charge_type: String,
    #[serde(default)]
    pub node_info_list: Vec<NodeInfo>,
    #[serde(default)]
    pub es_acl: Option<EsAcl>,
    #[serde(default)]
    pub security_type: Option<i64>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub kibana_public_access: Option<String>,
    #[serde(default)]
    pub kibana_private_access: Option<String>,
    #[serde(default)]
    pub web_node_type_info: Option<WebNodeTypeInfo>,
    #[serde(default)]
    pub es_domain: Option<String>,
    #[serde(default)]
    pub es_vip: Option<String>,
    #[serde(default)]
    pub es_port: Option<u64>,
    #[serde(default)]
    pub kibana_url: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

impl Observe for InstanceInfo {
    type Status = InstanceStatus;

    fn status(&self) -> InstanceStatus {
        InstanceStatus::from_code(self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginInfo {
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_version: Option<String>,
    /// 0 installed, 1 installing, -1 failed
    #[serde(default)]
    pub status: Option<i64>,
}

/// Index metadata as reported by the backend
///
/// `index_meta_json` is the raw settings/mappings document; numeric settings
/// come back as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexMetaField {
    pub index_name: String,
    pub index_type: String,
    #[serde(default)]
    pub index_status: Option<String>,
    #[serde(default)]
    pub index_meta_json: Option<String>,
}

/// Index observed through [`crate::ElasticsearchIndex`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub instance_id: String,
    pub index_type: String,
    pub index_name: String,
    pub health: String,
    /// Metadata with numeric settings coerced back to numbers
    pub meta: Value,
}

impl Observe for IndexState {
    type Status = IndexHealth;

    fn status(&self) -> IndexHealth {
        IndexHealth::parse(&self.health)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogstashInstanceInfo {
    pub instance_id: String,
    pub instance_name: String,
    pub status: i64,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub logstash_version: String,
    #[serde(default)]
    pub node_num: u64,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub disk_size: u64,
    #[serde(default)]
    pub license_type: String,
}

impl Observe for LogstashInstanceInfo {
    type Status = InstanceStatus;

    fn status(&self) -> InstanceStatus {
        InstanceStatus::from_code(self.status)
    }
}

/// Pipeline definition sent with save-and-deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogstashPipeline {
    pub pipeline_id: String,
    #[serde(default)]
    pub pipeline_desc: String,
    pub config: String,
    pub workers: u64,
    pub batch_size: u64,
    pub batch_delay: u64,
    /// "memory" or "persisted"
    pub queue_type: String,
    #[serde(default)]
    pub queue_max_bytes: String,
    #[serde(default)]
    pub queue_check_point_writes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogstashPipelineInfo {
    pub pipeline_id: String,
    #[serde(default)]
    pub pipeline_desc: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub workers: u64,
    #[serde(default)]
    pub batch_size: u64,
    #[serde(default)]
    pub batch_delay: u64,
    #[serde(default)]
    pub queue_type: String,
    pub status: i64,
}

impl Observe for LogstashPipelineInfo {
    type Status = PipelineStatus;

    fn status(&self) -> PipelineStatus {
        PipelineStatus::from_code(self.status)
    }
}
