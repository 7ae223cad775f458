use tokio::sync::RwLock;

use crate::ProviderResult;

/// A cached access token with its expiry.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at_unix: i64,
}

/// Double-checked-lock token cache. The read path takes a shared lock to
/// check freshness; if the token is missing or expires within the next 60
/// seconds, it drops the read lock, takes the exclusive lock, rechecks
/// (another caller may have refreshed first), and refreshes if still stale.
/// A failed refresh propagates to the caller; no retries happen here.
pub struct TokenCache {
    token: RwLock<Option<Token>>,
}

const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            token: RwLock::new(None),
        }
    }

    fn is_stale(token: &Option<Token>, now_unix: i64) -> bool {
        match token {
            None => true,
            Some(t) => now_unix >= t.expires_at_unix - EXPIRY_SAFETY_MARGIN_SECS,
        }
    }

    /// Returns a valid access token, refreshing via `refresh` if the cached
    /// one is absent or about to expire.
    pub async fn get<F, Fut>(&self, now_unix: i64, refresh: F) -> ProviderResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<Token>>,
    {
        {
            let guard = self.token.read().await;
            if !Self::is_stale(&guard, now_unix) {
                return Ok(guard.as_ref().unwrap().access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        if Self::is_stale(&guard, now_unix) {
            let fresh = refresh().await?;
            *guard = Some(fresh);
        }
        Ok(guard.as_ref().unwrap().access_token.clone())
    }
}
