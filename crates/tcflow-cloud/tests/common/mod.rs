use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tcflow_cloud::{ApiError, CloudError, ManagedResource, Result};

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub name: String,
    pub acl: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub name: String,
    pub acl: String,
}

/// In-memory resource whose failures can be switched on per operation
#[derive(Default)]
pub struct FakeBuckets {
    pub remote: Mutex<HashMap<String, Bucket>>,
    pub fail_create: bool,
    pub fail_update: bool,
    pub fail_delete: HashMap<String, String>,
}

impl FakeBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: Bucket) {
        self.remote
            .lock()
            .unwrap()
            .insert(bucket.name.clone(), bucket);
    }

    pub fn vanish(&self, name: &str) {
        self.remote.lock().unwrap().remove(name);
    }
}

#[async_trait]
impl ManagedResource for FakeBuckets {
    type Config = BucketConfig;
    type Observed = Bucket;

    fn resource_type(&self) -> &str {
        "cos_bucket"
    }

    async fn create(&self, config: &BucketConfig) -> Result<String> {
        if self.fail_create {
            return Err(CloudError::Fatal(ApiError::new("InvalidParameter", "bad acl")));
        }
        self.insert(Bucket {
            name: config.name.clone(),
            acl: config.acl.clone(),
        });
        Ok(config.name.clone())
    }

    async fn read(&self, id: &str) -> Result<Option<Bucket>> {
        Ok(self.remote.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, id: &str, _old: &BucketConfig, new: &BucketConfig) -> Result<()> {
        if self.fail_update {
            return Err(CloudError::ConvergenceTimeout {
                resource: id.to_string(),
                last_status: "Processing".to_string(),
            });
        }
        let mut remote = self.remote.lock().unwrap();
        let bucket = remote
            .get_mut(id)
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        bucket.acl = new.acl.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if let Some(code) = self.fail_delete.get(id) {
            return Err(CloudError::Fatal(ApiError::new(code.clone(), "cannot delete")));
        }
        self.remote
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
    }
}
