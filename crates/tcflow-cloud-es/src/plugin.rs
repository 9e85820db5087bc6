//! Elasticsearch plugin resource
//!
//! A plugin is identified by `instanceId#pluginName`. Installing or removing
//! one triggers a restart of the instance, so every change waits for the
//! instance to settle back to normal.

use crate::api::EsApi;
use crate::instance::ElasticsearchInstance;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tcflow_cloud::retry::invoke;
use tcflow_cloud::{CloudError, ManagedResource, Result, id};

pub const RESOURCE_TYPE: &str = "elasticsearch_instance_plugin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub instance_id: String,
    pub plugin_name: String,
    #[serde(default)]
    pub force_restart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginState {
    pub instance_id: String,
    pub plugin_name: String,
    pub plugin_version: Option<String>,
}

pub struct ElasticsearchPlugin<A: ?Sized> {
    instance: ElasticsearchInstance<A>,
}

impl<A: EsApi + ?Sized> ElasticsearchPlugin<A> {
    pub fn new(instance: ElasticsearchInstance<A>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl<A: EsApi + ?Sized> ManagedResource for ElasticsearchPlugin<A> {
    type Config = PluginConfig;
    type Observed = PluginState;

    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &PluginConfig) -> Result<String> {
        self.instance
            .update_plugins(
                &config.instance_id,
                std::slice::from_ref(&config.plugin_name),
                &[],
                config.force_restart,
            )
            .await?;
        let plugin_id = id::compose(&[&config.instance_id, &config.plugin_name]);
        if self.read(&plugin_id).await?.is_none() {
            return Err(CloudError::ResourceNotFound(plugin_id));
        }
        Ok(plugin_id)
    }

    async fn read(&self, plugin_id: &str) -> Result<Option<PluginState>> {
        let [instance_id, plugin_name] = id::split::<2>(plugin_id)?;
        let plugins = invoke(&self.instance.timeouts().read, "DescribeInstancePluginList", || {
            self.instance.service().describe_plugins(instance_id)
        })
        .await?;
        Ok(plugins
            .into_iter()
            .find(|p| p.plugin_name == plugin_name)
            .map(|p| PluginState {
                instance_id: instance_id.to_string(),
                plugin_name: p.plugin_name,
                plugin_version: p.plugin_version,
            }))
    }

    async fn update(&self, _plugin_id: &str, old: &PluginConfig, new: &PluginConfig) -> Result<()> {
        if old.instance_id != new.instance_id || old.plugin_name != new.plugin_name {
            return Err(CloudError::InvalidConfig(
                "instance_id and plugin_name cannot be changed in place".into(),
            ));
        }
        // force_restart only affects how a change is applied
        Ok(())
    }

    async fn delete(&self, plugin_id: &str) -> Result<()> {
        let [instance_id, plugin_name] = id::split::<2>(plugin_id)?;
        self.instance
            .update_plugins(instance_id, &[], &[plugin_name.to_string()], false)
            .await
    }
}
