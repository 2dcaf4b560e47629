use anyhow::Result;
use async_trait::async_trait;

/// Key-value persistence for serialized progress records.
///
/// Every `put` replaces the whole value stored under `key`; there are no
/// partial updates.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Storage key for a user's record: `<namespace>_<user_id>`.
pub fn progress_key(namespace: &str, user_id: &str) -> String {
    format!("{}_{}", namespace, user_id)
}
