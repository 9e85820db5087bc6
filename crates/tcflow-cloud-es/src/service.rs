//! Elasticsearch service layer
//!
//! One method per API action. Every call goes through the process-wide rate
//! limiter and is logged; retrying and waiting are left to the resources.

use crate::api::*;
use crate::model::{
    IndexMetaField, InstanceInfo, LogstashInstanceInfo, LogstashPipeline, LogstashPipelineInfo,
    PluginInfo,
};
use std::sync::Arc;
use std::time::Duration;
use tcflow_cloud::retry::RetryPolicy;
use tcflow_cloud::waiter::DEFAULT_POLL_INTERVAL;
use tcflow_cloud::{CloudError, RateLimiter, Result};
use tcflow_config::ProviderConfig;

const DESCRIBE_PAGE_SIZE: u64 = 100;

/// Retry budgets and poll cadence shared by all ES resources
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub write: RetryPolicy,
    pub read: RetryPolicy,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write: RetryPolicy::write(),
            read: RetryPolicy::read(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&ProviderConfig> for Timeouts {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            write: config.write_policy(),
            read: config.read_policy(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Typed access to the Elasticsearch API
pub struct ElasticsearchService<A: ?Sized> {
    api: Arc<A>,
}

impl<A: ?Sized> Clone for ElasticsearchService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: EsApi + ?Sized> ElasticsearchService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn call<R: EsAction>(&self, request: &R) -> Result<R::Response> {
        RateLimiter::global().check(R::ACTION).await;
        let body = serde_json::to_value(request)?;
        match self.api.call(R::ACTION, body).await {
            Ok(response) => {
                tracing::debug!(action = R::ACTION, "api call succeeded");
                Ok(serde_json::from_value(response)?)
            }
            Err(e) => {
                tracing::error!(
                    action = R::ACTION,
                    code = %e.code,
                    request_id = ?e.request_id,
                    "api call failed: {}",
                    e.message
                );
                if e.matches("ResourceNotFound") {
                    return Err(CloudError::ResourceNotFound(e.to_string()));
                }
                Err(e.into())
            }
        }
    }

    // ---- instances ----

    pub async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String> {
        Ok(self.call(request).await?.instance_id)
    }

    /// Describe one instance; `None` when it does not exist
    pub async fn describe_instance_by_id(&self, instance_id: &str) -> Result<Option<InstanceInfo>> {
        let response = self
            .call(&DescribeInstancesRequest {
                instance_ids: vec![instance_id.to_string()],
                offset: 0,
                limit: 1,
                ..Default::default()
            })
            .await?;
        Ok(response
            .instance_list
            .into_iter()
            .find(|i| i.instance_id == instance_id))
    }

    /// Every instance whose name starts with `prefix`, across all pages
    pub async fn describe_instances_by_name_prefix(&self, prefix: &str) -> Result<Vec<InstanceInfo>> {
        let mut found = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .call(&DescribeInstancesRequest {
                    offset,
                    limit: DESCRIBE_PAGE_SIZE,
                    ..Default::default()
                })
                .await?;
            let count = page.instance_list.len() as u64;
            found.extend(
                page.instance_list
                    .into_iter()
                    .filter(|i| i.instance_name.starts_with(prefix)),
            );
            offset += count;
            if count < DESCRIBE_PAGE_SIZE || offset >= page.total_count {
                break;
            }
        }
        Ok(found)
    }

    pub async fn update_instance(&self, request: &UpdateInstanceRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn upgrade_instance(&self, instance_id: &str, es_version: &str) -> Result<()> {
        self.call(&UpgradeInstanceRequest {
            instance_id: instance_id.to_string(),
            es_version: es_version.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn upgrade_license(&self, instance_id: &str, license_type: &str) -> Result<()> {
        self.call(&UpgradeLicenseRequest {
            instance_id: instance_id.to_string(),
            license_type: license_type.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn restart_instance(&self, request: &RestartInstanceRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn update_plugins(&self, request: &UpdatePluginsRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn describe_plugins(&self, instance_id: &str) -> Result<Vec<PluginInfo>> {
        Ok(self
            .call(&DescribeInstancePluginListRequest {
                instance_id: instance_id.to_string(),
            })
            .await?
            .plugin_list)
    }

    pub async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        self.call(&DeleteInstanceRequest {
            instance_id: instance_id.to_string(),
        })
        .await
        .map(drop)
    }

    // ---- indices ----

    pub async fn create_index(&self, request: &CreateIndexRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn describe_index(
        &self,
        instance_id: &str,
        index_type: &str,
        index_name: &str,
    ) -> Result<Option<IndexMetaField>> {
        Ok(self
            .call(&DescribeIndexMetaRequest {
                instance_id: instance_id.to_string(),
                index_type: index_type.to_string(),
                index_name: index_name.to_string(),
            })
            .await?
            .index_meta_field)
    }

    pub async fn update_index(&self, request: &UpdateIndexRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn delete_index(&self, instance_id: &str, index_type: &str, index_name: &str) -> Result<()> {
        self.call(&DeleteIndexRequest {
            instance_id: instance_id.to_string(),
            index_type: index_type.to_string(),
            index_name: index_name.to_string(),
        })
        .await
        .map(drop)
    }

    // ---- logstash ----

    pub async fn create_logstash_instance(&self, request: &CreateLogstashInstanceRequest) -> Result<String> {
        Ok(self.call(request).await?.instance_id)
    }

    pub async fn describe_logstash_instance(&self, instance_id: &str) -> Result<Option<LogstashInstanceInfo>> {
        let response = self
            .call(&DescribeLogstashInstancesRequest {
                instance_ids: vec![instance_id.to_string()],
            })
            .await?;
        Ok(response
            .instance_list
            .into_iter()
            .find(|i| i.instance_id == instance_id))
    }

    pub async fn update_logstash_instance(&self, request: &UpdateLogstashInstanceRequest) -> Result<()> {
        self.call(request).await.map(drop)
    }

    pub async fn delete_logstash_instance(&self, instance_id: &str) -> Result<()> {
        self.call(&DeleteLogstashInstanceRequest {
            instance_id: instance_id.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn save_pipeline(&self, instance_id: &str, pipeline: &LogstashPipeline, op_type: i64) -> Result<()> {
        self.call(&SaveAndDeployLogstashPipelineRequest {
            instance_id: instance_id.to_string(),
            pipeline: pipeline.clone(),
            op_type,
        })
        .await
        .map(drop)
    }

    pub async fn describe_pipeline(
        &self,
        instance_id: &str,
        pipeline_id: &str,
    ) -> Result<Option<LogstashPipelineInfo>> {
        let response = self
            .call(&DescribeLogstashPipelinesRequest {
                instance_id: instance_id.to_string(),
            })
            .await?;
        Ok(response
            .logstash_pipeline_list
            .into_iter()
            .find(|p| p.pipeline_id == pipeline_id))
    }

    pub async fn start_pipelines(&self, instance_id: &str, pipeline_ids: &[String]) -> Result<()> {
        self.call(&StartLogstashPipelinesRequest {
            instance_id: instance_id.to_string(),
            pipeline_ids: pipeline_ids.to_vec(),
        })
        .await
        .map(drop)
    }

    pub async fn stop_pipelines(&self, instance_id: &str, pipeline_ids: &[String]) -> Result<()> {
        self.call(&StopLogstashPipelinesRequest {
            instance_id: instance_id.to_string(),
            pipeline_ids: pipeline_ids.to_vec(),
        })
        .await
        .map(drop)
    }

    pub async fn delete_pipelines(&self, instance_id: &str, pipeline_ids: &[String]) -> Result<()> {
        self.call(&DeleteLogstashPipelinesRequest {
            instance_id: instance_id.to_string(),
            pipeline_ids: pipeline_ids.to_vec(),
        })
        .await
        .map(drop)
    }
}
