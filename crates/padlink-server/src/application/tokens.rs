//! Bearer tokens for non-loopback clients.
//!
//! A token is minted on request from a loopback connection (the host's own
//! UI), shown to the user, and then presented by the touch device on the
//! WebSocket upgrade.  Tokens live in memory only; restarting the server
//! invalidates every paired device.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

/// Bytes of OS randomness per token (hex-encoded to twice as many chars).
pub const TOKEN_BYTES: usize = 32;

/// Minimum spacing between two token refreshes from one connection.
pub const TOUCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub created_at: Instant,
    pub last_touched: Instant,
    pub revoked: bool,
}

#[derive(Debug, Default)]
pub struct TokenAuthority {
    tokens: RwLock<HashMap<String, AuthToken>>,
}

impl TokenAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live token, minting one if none exists.
    pub fn issue(&self) -> String {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(live) = tokens.values().find(|t| !t.revoked) {
            debug!("returning existing token");
            return live.value.clone();
        }

        let value = mint();
        let now = Instant::now();
        tokens.insert(
            value.clone(),
            AuthToken {
                value: value.clone(),
                created_at: now,
                last_touched: now,
                revoked: false,
            },
        );
        info!("minted new access token");
        value
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .is_some_and(|t| !t.revoked)
    }

    /// Records activity on `token`; see [`Self::touch_at`].
    pub fn touch(&self, token: &str) -> bool {
        self.touch_at(token, Instant::now())
    }

    /// Refreshes `last_touched` to `now`.  Returns `false` for unknown or
    /// revoked tokens.
    ///
    /// Callers rate-limit per connection (at most once per
    /// [`TOUCH_INTERVAL`]); the timestamp never moves backwards.
    pub fn touch_at(&self, token: &str, now: Instant) -> bool {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        match tokens.get_mut(token) {
            Some(t) if !t.revoked => {
                t.last_touched = t.last_touched.max(now);
                true
            }
            _ => false,
        }
    }

    /// Revokes `token`.  Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, token: &str) -> bool {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        match tokens.get_mut(token) {
            Some(t) if !t.revoked => {
                t.revoked = true;
                info!("access token revoked");
                true
            }
            _ => false,
        }
    }

    /// Snapshot of a token's record.
    pub fn get(&self, token: &str) -> Option<AuthToken> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }
}

fn mint() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
