use crate::core::Actor;
use async_trait::async_trait;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Supplies the actor behind a request, or `None` for an anonymous caller.
///
/// Credentials are validated elsewhere; resolvers only look up sessions that
/// were already issued.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Actor>;
}

/// Bearer token to actor lookup.
#[derive(Default)]
pub struct SessionResolver {
    sessions: RwLock<HashMap<String, Actor>>,
}

impl SessionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an existing token to an actor, replacing any previous binding.
    pub async fn insert(&self, token: impl Into<String>, actor: Actor) {
        self.sessions.write().await.insert(token.into(), actor);
    }

    /// Issues a fresh random token for `actor`.
    pub async fn issue(&self, actor: Actor) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.insert(token.clone(), actor).await;
        token
    }

    /// Returns true if the token was known.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ActorResolver for SessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Actor> {
        let token = bearer_token(headers)?;
        self.sessions.read().await.get(token).copied()
    }
}

/// Extracts the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
