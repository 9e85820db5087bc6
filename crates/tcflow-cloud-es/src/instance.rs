//! Elasticsearch instance resource

use crate::api::{CreateInstanceRequest, EsApi, RestartInstanceRequest, UpdateInstanceRequest, UpdatePluginsRequest};
use crate::model::{EsAcl, InstanceInfo, InstanceStatus, NodeInfo, WebNodeTypeInfo};
use crate::service::{ElasticsearchService, Timeouts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tcflow_cloud::retry::{RetryPolicy, invoke};
use tcflow_cloud::waiter::WaitSpec;
use tcflow_cloud::{CloudError, Lifecycle, ManagedResource, Result, SweepResult, orchestrate, sweep};

pub const RESOURCE_TYPE: &str = "elasticsearch_instance";

/// A new instance is waited for this many read budgets
const CREATE_WAIT_FACTOR: u32 = 15;
/// Describe may not see a new instance for a few polls
const CREATE_ABSENT_TOLERANCE: u32 = 5;
const UPGRADE_WAIT_FACTOR: u32 = 10;
/// Polls still reporting "normal" right after an upgrade-class call
const UPGRADE_SETTLE_POLLS: u32 = 5;
const DELETE_WAIT_FACTOR: u32 = 2;
/// Slow mutations (license, nodes, acl) get a doubled write budget
const SLOW_WRITE_FACTOR: u32 = 2;

/// License without X-Pack security; security type changes are never retried on it
const OSS_LICENSE: &str = "oss";

pub const ACCESS_OPEN: &str = "OPEN";
pub const ACCESS_CLOSE: &str = "CLOSE";

/// Desired state of an Elasticsearch instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub instance_name: String,
    pub availability_zone: String,
    pub version: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub password: String,
    #[serde(default = "default_license_type")]
    pub license_type: String,
    /// 1 disables, 2 enables X-Pack security
    #[serde(default)]
    pub basic_security_type: Option<i64>,
    #[serde(default = "default_charge_type")]
    pub charge_type: String,
    pub node_info_list: Vec<NodeInfo>,
    #[serde(default)]
    pub es_acl: Option<EsAcl>,
    /// "http" unless set; "https" for a TLS cluster
    #[serde(default)]
    pub protocol: Option<String>,
    /// Kibana public endpoint, `OPEN` or `CLOSE`; the backend opens it by default
    #[serde(default)]
    pub kibana_public_access: Option<String>,
    /// Kibana private endpoint, `OPEN` or `CLOSE`
    #[serde(default)]
    pub kibana_private_access: Option<String>,
    #[serde(default)]
    pub web_node_type_info: Option<WebNodeTypeInfo>,
}

fn default_license_type() -> String {
    "platinum".to_string()
}

fn default_charge_type() -> String {
    "POSTPAID_BY_HOUR".to_string()
}

impl InstanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.instance_name.is_empty() {
            return Err(CloudError::InvalidConfig("instance_name must not be empty".into()));
        }
        if self.node_info_list.is_empty() {
            return Err(CloudError::InvalidConfig("node_info_list must not be empty".into()));
        }
        if let Some(node) = self.node_info_list.iter().find(|n| n.node_num == 0) {
            return Err(CloudError::InvalidConfig(format!(
                "node group {} must have at least one node",
                node.r#type
            )));
        }
        for (field, access) in [
            ("kibana_public_access", &self.kibana_public_access),
            ("kibana_private_access", &self.kibana_private_access),
        ] {
            if let Some(value) = access.as_deref().filter(|v| *v != ACCESS_OPEN && *v != ACCESS_CLOSE) {
                return Err(CloudError::InvalidConfig(format!(
                    "{} must be {} or {}, got {:?}",
                    field, ACCESS_OPEN, ACCESS_CLOSE, value
                )));
            }
        }
        Ok(())
    }

    /// Fields that can only be set at creation
    fn immutable_changes(&self, new: &InstanceConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.availability_zone != new.availability_zone {
            changed.push("availability_zone");
        }
        if self.vpc_id != new.vpc_id {
            changed.push("vpc_id");
        }
        if self.subnet_id != new.subnet_id {
            changed.push("subnet_id");
        }
        if self.charge_type != new.charge_type {
            changed.push("charge_type");
        }
        changed
    }
}

/// The new value of an optional setting, if it is set and differs from the old one
fn changed_to(old: &Option<String>, new: &Option<String>) -> Option<String> {
    new.clone().filter(|v| !v.is_empty() && old != new)
}

/// Elasticsearch instance resource
pub struct ElasticsearchInstance<A: ?Sized> {
    service: ElasticsearchService<A>,
    timeouts: Timeouts,
}

impl<A: EsApi + ?Sized> ElasticsearchInstance<A> {
    pub fn new(service: ElasticsearchService<A>, timeouts: Timeouts) -> Self {
        Self { service, timeouts }
    }

    fn label(id: &str) -> String {
        format!("{} {}", RESOURCE_TYPE, id)
    }

    async fn describe(&self, id: &str) -> Result<Option<InstanceInfo>> {
        invoke(&self.timeouts.read, "DescribeInstances", || {
            self.service.describe_instance_by_id(id)
        })
        .await
    }

    /// Wait after an upgrade-class mutation
    fn upgrade_wait(&self) -> WaitSpec<InstanceStatus> {
        WaitSpec::reach(
            [InstanceStatus::Normal],
            self.timeouts.read.scaled(UPGRADE_WAIT_FACTOR).max_elapsed,
        )
        .failing_on([InstanceStatus::Destroying, InstanceStatus::Destroyed])
        .settle(UPGRADE_SETTLE_POLLS)
        .poll_every(self.timeouts.poll_interval)
    }

    /// Submit one mutation, then wait for the instance to settle back to normal
    async fn mutate<F, Fut>(&self, id: &str, action: &str, policy: &RetryPolicy, call: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        tracing::info!(instance_id = id, action, "updating instance");
        orchestrate(&Self::label(id), action, policy, call, &self.upgrade_wait(), || {
            self.describe(id)
        })
        .await?;
        Ok(())
    }

    async fn update_fields(&self, id: &str, action: &str, policy: &RetryPolicy, request: UpdateInstanceRequest) -> Result<()> {
        self.mutate(id, action, policy, || self.service.update_instance(&request))
            .await
    }

    /// Restart the instance and wait until it is back to normal
    pub async fn restart(&self, id: &str, force: bool, rolling: bool) -> Result<()> {
        let request = RestartInstanceRequest {
            instance_id: id.to_string(),
            force_restart: force,
            restart_mode: Some(if rolling { 1 } else { 0 }),
        };
        self.mutate(id, "RestartInstance", &self.timeouts.write, || {
            self.service.restart_instance(&request)
        })
        .await
    }

    /// Install and remove plugins, then wait for the rolling restart to finish
    pub async fn update_plugins(&self, id: &str, install: &[String], remove: &[String], force_restart: bool) -> Result<()> {
        if install.is_empty() && remove.is_empty() {
            return Ok(());
        }
        let request = UpdatePluginsRequest {
            instance_id: id.to_string(),
            install_plugin_list: install.to_vec(),
            remove_plugin_list: remove.to_vec(),
            force_restart,
        };
        self.mutate(id, "UpdatePlugins", &self.timeouts.write, || {
            self.service.update_plugins(&request)
        })
        .await
    }

    /// Delete every instance whose name starts with `prefix`
    pub async fn sweep_by_name_prefix(&self, prefix: &str) -> Result<SweepResult> {
        let stale = invoke(&self.timeouts.read, "DescribeInstances", || {
            self.service.describe_instances_by_name_prefix(prefix)
        })
        .await?;
        tracing::info!(prefix, count = stale.len(), "sweeping instances");
        Ok(sweep(self, stale.iter().map(|i| i.instance_id.as_str())).await)
    }

    pub(crate) fn service(&self) -> &ElasticsearchService<A> {
        &self.service
    }

    pub(crate) fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }
}

#[async_trait]
impl<A: EsApi + ?Sized> ManagedResource for ElasticsearchInstance<A> {
    type Config = InstanceConfig;
    type Observed = InstanceInfo;

    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &InstanceConfig) -> Result<String> {
        config.validate()?;
        let request = CreateInstanceRequest {
            zone: config.availability_zone.clone(),
            es_version: config.version.clone(),
            vpc_id: config.vpc_id.clone(),
            subnet_id: config.subnet_id.clone(),
            password: config.password.clone(),
            instance_name: config.instance_name.clone(),
            charge_type: config.charge_type.clone(),
            license_type: config.license_type.clone(),
            basic_security_type: config.basic_security_type,
            node_info_list: config.node_info_list.clone(),
            web_node_type_info: config.web_node_type_info.clone(),
            protocol: config.protocol.clone(),
        };

        let mut lifecycle = Lifecycle::new(format!("{} {}", RESOURCE_TYPE, config.instance_name));
        let id = lifecycle
            .submit(&self.timeouts.write, "CreateInstance", || {
                self.service.create_instance(&request)
            })
            .await?;

        let spec = WaitSpec::reach(
            [InstanceStatus::Normal],
            self.timeouts.read.scaled(CREATE_WAIT_FACTOR).max_elapsed,
        )
        .failing_on([InstanceStatus::Destroying, InstanceStatus::Destroyed])
        .tolerate_absent(CREATE_ABSENT_TOLERANCE)
        .poll_every(self.timeouts.poll_interval);
        let created = match lifecycle.converge(&spec, || self.describe(&id)).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(instance_id = %id, error = %e, "instance was created but did not become ready");
                return Err(e);
            }
        };

        // Kibana access and ACLs can only be changed once the cluster is up
        let slow_write = self.timeouts.write.scaled(SLOW_WRITE_FACTOR);
        // Reopening an already open endpoint is rejected
        if let Some(access) = config.kibana_public_access.clone().filter(|a| a != ACCESS_OPEN) {
            self.update_fields(
                &id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    kibana_public_access: Some(access),
                    ..UpdateInstanceRequest::new(&id)
                },
            )
            .await?;
        }

        let actual_private = created.and_then(|info| info.kibana_private_access).unwrap_or_default();
        if let Some(access) = config
            .kibana_private_access
            .clone()
            .filter(|a| !actual_private.is_empty() && *a != actual_private)
        {
            self.update_fields(
                &id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    kibana_private_access: Some(access),
                    ..UpdateInstanceRequest::new(&id)
                },
            )
            .await?;
        }

        if let Some(acl) = &config.es_acl {
            self.update_fields(
                &id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    es_acl: Some(acl.clone()),
                    ..UpdateInstanceRequest::new(&id)
                },
            )
            .await?;
        }

        tracing::info!(instance_id = %id, "instance is ready");
        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<InstanceInfo>> {
        self.describe(id).await
    }

    async fn update(&self, id: &str, old: &InstanceConfig, new: &InstanceConfig) -> Result<()> {
        new.validate()?;
        let immutable = old.immutable_changes(new);
        if !immutable.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "{} cannot be changed without recreating the instance",
                immutable.join(", ")
            )));
        }

        let write = &self.timeouts.write;
        let slow_write = write.scaled(SLOW_WRITE_FACTOR);

        if let Some(protocol) = changed_to(&old.protocol, &new.protocol) {
            self.update_fields(
                id,
                "UpdateInstance",
                write,
                UpdateInstanceRequest {
                    protocol: Some(protocol),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if old.instance_name != new.instance_name {
            self.update_fields(
                id,
                "UpdateInstance",
                write,
                UpdateInstanceRequest {
                    instance_name: Some(new.instance_name.clone()),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if old.password != new.password {
            self.update_fields(
                id,
                "UpdateInstance",
                write,
                UpdateInstanceRequest {
                    password: Some(new.password.clone()),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if let Some(access) = changed_to(&old.kibana_public_access, &new.kibana_public_access) {
            self.update_fields(
                id,
                "UpdateInstance",
                write,
                UpdateInstanceRequest {
                    kibana_public_access: Some(access),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if let Some(access) = changed_to(&old.kibana_private_access, &new.kibana_private_access) {
            self.update_fields(
                id,
                "UpdateInstance",
                write,
                UpdateInstanceRequest {
                    kibana_private_access: Some(access),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if old.version != new.version {
            self.mutate(id, "UpgradeInstance", write, || {
                self.service.upgrade_instance(id, &new.version)
            })
            .await?;
        }

        if old.license_type != new.license_type {
            self.mutate(id, "UpgradeLicense", &slow_write, || {
                self.service.upgrade_license(id, &new.license_type)
            })
            .await?;
        }

        if let Some(security_type) = new.basic_security_type.filter(|_| old.basic_security_type != new.basic_security_type) {
            // A license upgrade still in flight rejects the change as an invalid parameter
            let policy = if new.license_type != OSS_LICENSE {
                slow_write.clone().retry_on_exact("InvalidParameter")
            } else {
                slow_write.clone()
            };
            self.update_fields(
                id,
                "UpdateInstance",
                &policy,
                UpdateInstanceRequest {
                    basic_security_type: Some(security_type),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if let Some(web_node) = new
            .web_node_type_info
            .clone()
            .filter(|_| old.web_node_type_info != new.web_node_type_info)
        {
            self.update_fields(
                id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    web_node_type_info: Some(web_node),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if old.node_info_list != new.node_info_list {
            self.update_fields(
                id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    node_info_list: Some(new.node_info_list.clone()),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        if old.es_acl != new.es_acl {
            self.update_fields(
                id,
                "UpdateInstance",
                &slow_write,
                UpdateInstanceRequest {
                    es_acl: Some(new.es_acl.clone().unwrap_or_default()),
                    ..UpdateInstanceRequest::new(id)
                },
            )
            .await?;
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let spec = WaitSpec::absent(self.timeouts.read.scaled(DELETE_WAIT_FACTOR).max_elapsed)
            .poll_every(self.timeouts.poll_interval);
        orchestrate(
            &Self::label(id),
            "DeleteInstance",
            &self.timeouts.write,
            || self.service.delete_instance(id),
            &spec,
            || self.describe(id),
        )
        .await?;
        tracing::info!(instance_id = id, "instance deleted");
        Ok(())
    }
}
