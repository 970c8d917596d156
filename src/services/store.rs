use crate::models::{ConversationSession, VoteChoice};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur with session store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Shared session store: the single source of truth for conversation state,
/// exclusion sets, vote maps, liked-by queues, review queues, and the
/// display-handle bindings that resolve a button press back to a candidate.
///
/// Components never cache-and-diverge from this store. The atomicity of
/// `claim_shown` and `take_binding` is part of the contract: the first
/// caller wins, later callers observe the entry as gone.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, user_id: &str) -> Result<Option<ConversationSession>, StoreError>;
    async fn save_session(&self, session: &ConversationSession) -> Result<(), StoreError>;
    async fn clear_session(&self, user_id: &str) -> Result<(), StoreError>;

    /// Add a candidate to the viewer's exclusion set. Returns true only when
    /// the candidate was not already present (atomic add-and-return).
    async fn claim_shown(&self, viewer_id: &str, candidate_id: &str) -> Result<bool, StoreError>;

    /// Record a vote, overwriting any prior vote by the same voter.
    async fn record_vote(
        &self,
        voter_id: &str,
        candidate_id: &str,
        choice: VoteChoice,
    ) -> Result<(), StoreError>;

    async fn vote_of(
        &self,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<Option<VoteChoice>, StoreError>;

    /// Append a voter to a user's liked-by queue.
    async fn push_liked_by(&self, user_id: &str, voter_id: &str) -> Result<(), StoreError>;

    async fn liked_by(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Replace the user's review queue with the given entries, discarding
    /// any review already in progress.
    async fn replace_review_queue(
        &self,
        user_id: &str,
        entries: &[String],
    ) -> Result<(), StoreError>;

    /// Pop the next review entry, or None when the queue is drained.
    async fn pop_review(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Bind a display handle to the candidate it shows. One binding per
    /// outstanding display; rebinding the same handle overwrites.
    async fn put_binding(&self, handle: i64, candidate_id: &str) -> Result<(), StoreError>;

    /// Resolve and consume a display binding. Returns None for unknown or
    /// already-consumed handles.
    async fn take_binding(&self, handle: i64) -> Result<Option<String>, StoreError>;
}

/// Store key builder
pub struct StoreKey;

impl StoreKey {
    pub fn session(user_id: &str) -> String {
        format!("session:{}", user_id)
    }

    pub fn shown(viewer_id: &str) -> String {
        format!("shown:{}", viewer_id)
    }

    pub fn votes(voter_id: &str) -> String {
        format!("votes:{}", voter_id)
    }

    pub fn liked_by(user_id: &str) -> String {
        format!("liked_by:{}", user_id)
    }

    pub fn review(user_id: &str) -> String {
        format!("review:{}", user_id)
    }

    pub fn binding(handle: i64) -> String {
        format!("binding:{}", handle)
    }
}

/// Redis-backed session store.
///
/// Uses the native Redis primitives whose semantics carry the concurrency
/// contract: SADD for exclusion-set claims, HSET/HGET for the vote map,
/// RPUSH/LRANGE/LPOP for queues, and GETDEL to consume display bindings.
pub struct RedisStore {
    // ConnectionManager needs interior mutability for command execution
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
        })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn load_session(&self, user_id: &str) -> Result<Option<ConversationSession>, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(StoreKey::session(user_id))
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_session(&self, session: &ConversationSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let mut conn = self.redis.lock().await;
        redis::cmd("SET")
            .arg(StoreKey::session(&session.user_id))
            .arg(json)
            .query_async::<()>(&mut *conn)
            .await?;
        tracing::trace!("Session saved: {} @ {:?}", session.user_id, session.step);
        Ok(())
    }

    async fn clear_session(&self, user_id: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("DEL")
            .arg(StoreKey::session(user_id))
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn claim_shown(&self, viewer_id: &str, candidate_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.lock().await;
        let added: i64 = redis::cmd("SADD")
            .arg(StoreKey::shown(viewer_id))
            .arg(candidate_id)
            .query_async(&mut *conn)
            .await?;
        Ok(added == 1)
    }

    async fn record_vote(
        &self,
        voter_id: &str,
        candidate_id: &str,
        choice: VoteChoice,
    ) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("HSET")
            .arg(StoreKey::votes(voter_id))
            .arg(candidate_id)
            .arg(choice.as_str())
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn vote_of(
        &self,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<Option<VoteChoice>, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("HGET")
            .arg(StoreKey::votes(voter_id))
            .arg(candidate_id)
            .query_async(&mut *conn)
            .await?;
        Ok(value.as_deref().and_then(VoteChoice::from_str))
    }

    async fn push_liked_by(&self, user_id: &str, voter_id: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("RPUSH")
            .arg(StoreKey::liked_by(user_id))
            .arg(voter_id)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn liked_by(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.lock().await;
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(StoreKey::liked_by(user_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut *conn)
            .await?;
        Ok(entries)
    }

    async fn replace_review_queue(
        &self,
        user_id: &str,
        entries: &[String],
    ) -> Result<(), StoreError> {
        let key = StoreKey::review(user_id);
        let mut conn = self.redis.lock().await;
        // DEL + RPUSH in one atomic pipeline so a concurrent pop never
        // observes a half-built queue
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(&key).ignore();
        if !entries.is_empty() {
            pipe.cmd("RPUSH").arg(&key).arg(entries).ignore();
        }
        pipe.query_async::<()>(&mut *conn).await?;
        Ok(())
    }

    async fn pop_review(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("LPOP")
            .arg(StoreKey::review(user_id))
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn put_binding(&self, handle: i64, candidate_id: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("SET")
            .arg(StoreKey::binding(handle))
            .arg(candidate_id)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn take_binding(&self, handle: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(StoreKey::binding(handle))
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<String, ConversationSession>,
    shown: HashMap<String, HashSet<String>>,
    votes: HashMap<String, HashMap<String, VoteChoice>>,
    liked_by: HashMap<String, Vec<String>>,
    review: HashMap<String, VecDeque<String>>,
    bindings: HashMap<i64, String>,
}

/// In-memory session store with the same semantics as `RedisStore`.
///
/// Used by the test suite and for local single-process runs without Redis.
#[derive(Default)]
pub struct MemoryStore {
    inner: tokio::sync::Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, user_id: &str) -> Result<Option<ConversationSession>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(user_id).cloned())
    }

    async fn save_session(&self, session: &ConversationSession) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn clear_session(&self, user_id: &str) -> Result<(), StoreError> {
        self.inner.lock().await.sessions.remove(user_id);
        Ok(())
    }

    async fn claim_shown(&self, viewer_id: &str, candidate_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .shown
            .entry(viewer_id.to_string())
            .or_default()
            .insert(candidate_id.to_string()))
    }

    async fn record_vote(
        &self,
        voter_id: &str,
        candidate_id: &str,
        choice: VoteChoice,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .votes
            .entry(voter_id.to_string())
            .or_default()
            .insert(candidate_id.to_string(), choice);
        Ok(())
    }

    async fn vote_of(
        &self,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<Option<VoteChoice>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .votes
            .get(voter_id)
            .and_then(|m| m.get(candidate_id))
            .copied())
    }

    async fn push_liked_by(&self, user_id: &str, voter_id: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .liked_by
            .entry(user_id.to_string())
            .or_default()
            .push(voter_id.to_string());
        Ok(())
    }

    async fn liked_by(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .liked_by
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_review_queue(
        &self,
        user_id: &str,
        entries: &[String],
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .review
            .insert(user_id.to_string(), entries.iter().cloned().collect());
        Ok(())
    }

    async fn pop_review(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .review
            .get_mut(user_id)
            .and_then(|q| q.pop_front()))
    }

    async fn put_binding(&self, handle: i64, candidate_id: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .bindings
            .insert(handle, candidate_id.to_string());
        Ok(())
    }

    async fn take_binding(&self, handle: i64) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().await.bindings.remove(&handle))
    }
}
