//! Logstash instance and pipeline resources

use crate::api::{CreateLogstashInstanceRequest, EsApi, PIPELINE_OP_SAVE_AND_DEPLOY, UpdateLogstashInstanceRequest};
use crate::model::{InstanceStatus, LogstashInstanceInfo, LogstashPipeline, LogstashPipelineInfo, PipelineStatus};
use crate::service::{ElasticsearchService, Timeouts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tcflow_cloud::retry::invoke;
use tcflow_cloud::waiter::WaitSpec;
use tcflow_cloud::{CloudError, Lifecycle, ManagedResource, Result, id, orchestrate};

pub const INSTANCE_RESOURCE_TYPE: &str = "elasticsearch_logstash";
pub const PIPELINE_RESOURCE_TYPE: &str = "elasticsearch_logstash_pipeline";

const READY_WAIT_FACTOR: u32 = 3;
const DELETE_WAIT_FACTOR: u32 = 2;
const CREATE_ABSENT_TOLERANCE: u32 = 5;
/// Logstash changes are polled every second regardless of provider settings
const LOGSTASH_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogstashConfig {
    pub instance_name: String,
    pub availability_zone: String,
    pub logstash_version: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub node_num: u64,
    pub node_type: String,
    #[serde(default = "default_disk_type")]
    pub disk_type: String,
    pub disk_size: u64,
    #[serde(default = "default_license_type")]
    pub license_type: String,
}

fn default_disk_type() -> String {
    "CLOUD_SSD".to_string()
}

fn default_license_type() -> String {
    "xpack".to_string()
}

/// In-place changes of a Logstash instance; unset fields stay as they are
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogstashUpdate {
    pub instance_name: Option<String>,
    pub node_num: Option<u64>,
    pub node_type: Option<String>,
    pub disk_size: Option<u64>,
}

impl LogstashUpdate {
    /// Changes turning `old` into `new`
    pub fn between(old: &LogstashConfig, new: &LogstashConfig) -> Self {
        fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
            (old != new).then(|| new.clone())
        }
        Self {
            instance_name: changed(&old.instance_name, &new.instance_name),
            node_num: changed(&old.node_num, &new.node_num),
            node_type: changed(&old.node_type, &new.node_type),
            disk_size: changed(&old.disk_size, &new.disk_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct LogstashInstance<A: ?Sized> {
    service: ElasticsearchService<A>,
    timeouts: Timeouts,
}

impl<A: EsApi + ?Sized> LogstashInstance<A> {
    pub fn new(service: ElasticsearchService<A>, timeouts: Timeouts) -> Self {
        Self { service, timeouts }
    }

    async fn describe(&self, id: &str) -> Result<Option<LogstashInstanceInfo>> {
        invoke(&self.timeouts.read, "DescribeLogstashInstances", || {
            self.service.describe_logstash_instance(id)
        })
        .await
    }

    fn ready_wait(&self) -> WaitSpec<InstanceStatus> {
        WaitSpec::reach(
            [InstanceStatus::Normal],
            self.timeouts.read.scaled(READY_WAIT_FACTOR).max_elapsed,
        )
        .failing_on([InstanceStatus::Destroying, InstanceStatus::Destroyed])
        .poll_every(LOGSTASH_POLL_INTERVAL)
    }

    /// Apply `changes` and wait for the instance to become normal again
    pub async fn apply(&self, id: &str, changes: &LogstashUpdate) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let request = UpdateLogstashInstanceRequest {
            instance_id: id.to_string(),
            instance_name: changes.instance_name.clone(),
            node_num: changes.node_num,
            node_type: changes.node_type.clone(),
            disk_size: changes.disk_size,
        };
        orchestrate(
            &format!("{} {}", INSTANCE_RESOURCE_TYPE, id),
            "UpdateLogstashInstance",
            &self.timeouts.write,
            || self.service.update_logstash_instance(&request),
            &self.ready_wait(),
            || self.describe(id),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<A: EsApi + ?Sized> ManagedResource for LogstashInstance<A> {
    type Config = LogstashConfig;
    type Observed = LogstashInstanceInfo;

    fn resource_type(&self) -> &str {
        INSTANCE_RESOURCE_TYPE
    }

    async fn create(&self, config: &LogstashConfig) -> Result<String> {
        if config.node_num == 0 {
            return Err(CloudError::InvalidConfig("node_num must be at least 1".into()));
        }
        let request = CreateLogstashInstanceRequest {
            instance_name: config.instance_name.clone(),
            zone: config.availability_zone.clone(),
            logstash_version: config.logstash_version.clone(),
            vpc_id: config.vpc_id.clone(),
            subnet_id: config.subnet_id.clone(),
            node_num: config.node_num,
            node_type: config.node_type.clone(),
            disk_type: config.disk_type.clone(),
            disk_size: config.disk_size,
            license_type: config.license_type.clone(),
        };

        let mut lifecycle = Lifecycle::new(format!("{} {}", INSTANCE_RESOURCE_TYPE, config.instance_name));
        let id = lifecycle
            .submit(&self.timeouts.write, "CreateLogstashInstance", || {
                self.service.create_logstash_instance(&request)
            })
            .await?;
        let spec = self.ready_wait().tolerate_absent(CREATE_ABSENT_TOLERANCE);
        lifecycle.converge(&spec, || self.describe(&id)).await?;
        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<LogstashInstanceInfo>> {
        self.describe(id).await
    }

    async fn update(&self, id: &str, old: &LogstashConfig, new: &LogstashConfig) -> Result<()> {
        if old.availability_zone != new.availability_zone
            || old.vpc_id != new.vpc_id
            || old.subnet_id != new.subnet_id
            || old.logstash_version != new.logstash_version
        {
            return Err(CloudError::InvalidConfig(
                "zone, network and version of a Logstash instance cannot be changed in place".into(),
            ));
        }
        self.apply(id, &LogstashUpdate::between(old, new)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let spec = WaitSpec::absent(self.timeouts.read.scaled(DELETE_WAIT_FACTOR).max_elapsed)
            .poll_every(LOGSTASH_POLL_INTERVAL);
        orchestrate(
            &format!("{} {}", INSTANCE_RESOURCE_TYPE, id),
            "DeleteLogstashInstance",
            &self.timeouts.write,
            || self.service.delete_logstash_instance(id),
            &spec,
            || self.describe(id),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub instance_id: String,
    pub pipeline: LogstashPipeline,
}

/// Logstash pipeline resource, identified by `instanceId#pipelineId`
pub struct LogstashPipelineResource<A: ?Sized> {
    service: ElasticsearchService<A>,
    timeouts: Timeouts,
}

impl<A: EsApi + ?Sized> LogstashPipelineResource<A> {
    pub fn new(service: ElasticsearchService<A>, timeouts: Timeouts) -> Self {
        Self { service, timeouts }
    }

    async fn describe(&self, instance_id: &str, pipeline_id: &str) -> Result<Option<LogstashPipelineInfo>> {
        invoke(&self.timeouts.read, "DescribeLogstashPipelines", || {
            self.service.describe_pipeline(instance_id, pipeline_id)
        })
        .await
    }

    fn running_wait(&self) -> WaitSpec<PipelineStatus> {
        WaitSpec::reach([PipelineStatus::Running], self.timeouts.read.max_elapsed)
            .failing_on([PipelineStatus::Failed])
            .tolerate_absent(CREATE_ABSENT_TOLERANCE)
            .poll_every(LOGSTASH_POLL_INTERVAL)
    }

    async fn deploy(&self, config: &PipelineConfig, action: &str) -> Result<()> {
        orchestrate(
            &format!("{} {}", PIPELINE_RESOURCE_TYPE, config.pipeline.pipeline_id),
            action,
            &self.timeouts.write,
            || self.service.save_pipeline(&config.instance_id, &config.pipeline, PIPELINE_OP_SAVE_AND_DEPLOY),
            &self.running_wait(),
            || self.describe(&config.instance_id, &config.pipeline.pipeline_id),
        )
        .await?;
        Ok(())
    }

    /// Start a stopped pipeline and wait until it runs
    pub async fn start(&self, pipeline_id: &str) -> Result<()> {
        let [instance_id, pipeline] = id::split::<2>(pipeline_id)?;
        let ids = [pipeline.to_string()];
        orchestrate(
            &format!("{} {}", PIPELINE_RESOURCE_TYPE, pipeline_id),
            "StartLogstashPipelines",
            &self.timeouts.write,
            || self.service.start_pipelines(instance_id, &ids),
            &self.running_wait(),
            || self.describe(instance_id, pipeline),
        )
        .await?;
        Ok(())
    }

    /// Stop a running pipeline and wait until it reports stopped
    pub async fn stop(&self, pipeline_id: &str) -> Result<()> {
        let [instance_id, pipeline] = id::split::<2>(pipeline_id)?;
        let ids = [pipeline.to_string()];
        let spec = WaitSpec::reach([PipelineStatus::Stopped], self.timeouts.read.max_elapsed)
            .failing_on([PipelineStatus::Failed])
            .poll_every(LOGSTASH_POLL_INTERVAL);
        orchestrate(
            &format!("{} {}", PIPELINE_RESOURCE_TYPE, pipeline_id),
            "StopLogstashPipelines",
            &self.timeouts.write,
            || self.service.stop_pipelines(instance_id, &ids),
            &spec,
            || self.describe(instance_id, pipeline),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<A: EsApi + ?Sized> ManagedResource for LogstashPipelineResource<A> {
    type Config = PipelineConfig;
    type Observed = LogstashPipelineInfo;

    fn resource_type(&self) -> &str {
        PIPELINE_RESOURCE_TYPE
    }

    async fn create(&self, config: &PipelineConfig) -> Result<String> {
        self.deploy(config, "SaveAndDeployLogstashPipeline").await?;
        Ok(id::compose(&[&config.instance_id, &config.pipeline.pipeline_id]))
    }

    async fn read(&self, pipeline_id: &str) -> Result<Option<LogstashPipelineInfo>> {
        let [instance_id, pipeline] = id::split::<2>(pipeline_id)?;
        self.describe(instance_id, pipeline).await
    }

    async fn update(&self, _pipeline_id: &str, old: &PipelineConfig, new: &PipelineConfig) -> Result<()> {
        if old.instance_id != new.instance_id || old.pipeline.pipeline_id != new.pipeline.pipeline_id {
            return Err(CloudError::InvalidConfig(
                "instance_id and pipeline_id cannot be changed in place".into(),
            ));
        }
        if old == new {
            return Ok(());
        }
        self.deploy(new, "SaveAndDeployLogstashPipeline").await
    }

    async fn delete(&self, pipeline_id: &str) -> Result<()> {
        let [instance_id, pipeline] = id::split::<2>(pipeline_id)?;
        let ids = [pipeline.to_string()];
        let spec = WaitSpec::absent(self.timeouts.read.max_elapsed).poll_every(LOGSTASH_POLL_INTERVAL);
        orchestrate(
            &format!("{} {}", PIPELINE_RESOURCE_TYPE, pipeline_id),
            "DeleteLogstashPipelines",
            &self.timeouts.write,
            || self.service.delete_pipelines(instance_id, &ids),
            &spec,
            || self.describe(instance_id, pipeline),
        )
        .await?;
        Ok(())
    }
}
