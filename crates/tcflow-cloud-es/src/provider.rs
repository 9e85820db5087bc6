//! Elasticsearch provider
//!
//! Owns the API client and the configured timeouts, and hands out the
//! resources built on them.

use crate::api::EsApi;
use crate::index::ElasticsearchIndex;
use crate::instance::ElasticsearchInstance;
use crate::logstash::{LogstashInstance, LogstashPipelineResource};
use crate::plugin::ElasticsearchPlugin;
use crate::service::{ElasticsearchService, Timeouts};
use std::sync::Arc;
use tcflow_cloud::RateLimiter;
use tcflow_config::ProviderConfig;

pub struct EsProvider<A: ?Sized> {
    service: ElasticsearchService<A>,
    timeouts: Timeouts,
}

impl<A: EsApi + ?Sized> EsProvider<A> {
    /// Build the provider from `config` and install its rate limits process-wide
    ///
    /// The first provider built in a process decides the rate limits.
    pub fn new(api: Arc<A>, config: &ProviderConfig) -> Self {
        if RateLimiter::init_global(config.rate_limiter()) {
            tracing::debug!(
                per_second = config.rate_limit.default_per_second,
                overrides = config.rate_limit.actions.len(),
                "installed rate limiter"
            );
        } else {
            tracing::warn!("rate limiter already installed, keeping the existing limits");
        }
        Self {
            service: ElasticsearchService::new(api),
            timeouts: Timeouts::from(config),
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn instances(&self) -> ElasticsearchInstance<A> {
        ElasticsearchInstance::new(self.service.clone(), self.timeouts.clone())
    }

    pub fn plugins(&self) -> ElasticsearchPlugin<A> {
        ElasticsearchPlugin::new(self.instances())
    }

    pub fn indices(&self) -> ElasticsearchIndex<A> {
        ElasticsearchIndex::new(self.service.clone(), self.timeouts.clone())
    }

    pub fn logstash(&self) -> LogstashInstance<A> {
        LogstashInstance::new(self.service.clone(), self.timeouts.clone())
    }

    pub fn pipelines(&self) -> LogstashPipelineResource<A> {
        LogstashPipelineResource::new(self.service.clone(), self.timeouts.clone())
    }
}
