use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::{ChatSession, QaPipeline};
use crate::domain::DomainError;
use crate::infrastructure::{AppConfig, RedisPool};

pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Live sessions by id. Sessions are independent of each other.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn create(&self, pipeline: Arc<QaPipeline>) -> Result<(Uuid, SharedSession), DomainError> {
        let session = ChatSession::new(pipeline);
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .insert(id, shared.clone());
        tracing::info!(session_id = %id, "session started");
        Ok((id, shared))
    }

    pub fn get(&self, id: Uuid) -> Result<SharedSession, DomainError> {
        self.sessions
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("Session {id} does not exist.")))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), DomainError> {
        let removed = self
            .sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .remove(&id);
        match removed {
            Some(_) => {
                tracing::info!(session_id = %id, "session ended");
                Ok(())
            }
            None => Err(DomainError::not_found(format!("Session {id} does not exist."))),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QaPipeline>,
    pub sessions: Arc<SessionRegistry>,
    pub redis_pool: Option<RedisPool>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pipeline: Arc<QaPipeline>, config: AppConfig) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(SessionRegistry::default()),
            redis_pool: None,
            config: Arc::new(config),
        }
    }

    pub fn with_redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }
}
