use async_trait::async_trait;
use deadpool_redis::{redis, Config, Pool, Runtime};

use crate::domain::{ports::ByteStore, DomainError};

pub type RedisPool = Pool;

pub const KEY_PREFIX: &str = "embeddings";

pub fn create_pool(redis_url: &str) -> Result<RedisPool, DomainError> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| DomainError::internal(format!("redis pool: {e}")))
}

/// Byte store keyed as `embeddings:<namespace>:<key>` in Redis.
#[derive(Clone)]
pub struct RedisByteStore {
    pool: RedisPool,
}

impl RedisByteStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn key(namespace: &str, key: &str) -> String {
        format!("{KEY_PREFIX}:{namespace}:{key}")
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, DomainError> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::internal(format!("redis pool: {e}")))
    }
}

fn redis_error(e: redis::RedisError) -> DomainError {
    DomainError::internal(format!("redis: {e}"))
}

#[async_trait]
impl ByteStore for RedisByteStore {
    async fn mget(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<Vec<u8>>>, DomainError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(Self::key(namespace, key));
        }
        let values: Vec<Option<Vec<u8>>> =
            pipe.query_async(&mut *conn).await.map_err(redis_error)?;
        Ok(values)
    }

    async fn mset(
        &self,
        namespace: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set(Self::key(namespace, key), value.as_slice()).ignore();
        }
        let _: () = pipe.query_async(&mut *conn).await.map_err(redis_error)?;

        tracing::debug!(namespace, count = entries.len(), "cache entries written");
        Ok(())
    }
}

/// Round-trips a PING through the pool.
pub async fn ping(pool: &RedisPool) -> bool {
    match pool.get().await {
        Ok(mut conn) => {
            let pong: Result<String, _> = redis::cmd("PING").query_async(&mut *conn).await;
            pong.is_ok()
        }
        Err(_) => false,
    }
}
