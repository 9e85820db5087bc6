//! Tencent Cloud Elasticsearch resources for tcflow
//!
//! Implements [`tcflow_cloud::ManagedResource`] for Elasticsearch instances,
//! their plugins and indices, and for Logstash instances and pipelines.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tcflow_cloud::ManagedResource;
//! use tcflow_cloud_es::EsProvider;
//! use tcflow_config::ProviderConfig;
//!
//! let provider = EsProvider::new(Arc::new(sdk_client), &ProviderConfig::load()?);
//! let id = provider.instances().create(&config).await?;
//! ```

pub mod api;
pub mod index;
pub mod instance;
pub mod logstash;
pub mod model;
pub mod plugin;
pub mod provider;
pub mod service;

pub use api::{EsAction, EsApi};
pub use index::{ElasticsearchIndex, IndexConfig};
pub use instance::{ElasticsearchInstance, InstanceConfig};
pub use logstash::{LogstashConfig, LogstashInstance, LogstashPipelineResource, LogstashUpdate, PipelineConfig};
pub use model::{IndexHealth, InstanceStatus, PipelineStatus};
pub use plugin::{ElasticsearchPlugin, PluginConfig};
pub use provider::EsProvider;
pub use service::{ElasticsearchService, Timeouts};
