//! OpenID token pair and its time boundaries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token endpoint response, as returned by both the authorization-code and
/// the refresh-token grants. Lifetimes are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_expires_in: u64,
}

/// Stored OpenID token pair.
///
/// Never mutated field by field: a renewal builds a fresh `Token` and the
/// adapter swaps it in whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub renew_after: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Build a token from an exchange response received now.
    pub fn load_from_exchange(response: &TokenExchange) -> Self {
        Self::load_from_exchange_at(response, Utc::now())
    }

    /// Renewal is scheduled at the access token's half-life.
    pub fn load_from_exchange_at(response: &TokenExchange, now: DateTime<Utc>) -> Self {
        let expires_in = secs(response.expires_in);
        let renew_in = secs(response.expires_in / 2);
        let refresh_expires_in = secs(response.refresh_expires_in);

        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: response.refresh_token.clone(),
            expires_at: Some(now + expires_in),
            renew_after: Some(now + renew_in),
            refresh_expires_at: Some(now + refresh_expires_in),
        }
    }

    /// True when no access token has been issued (or it was cleared).
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(exp)) => now < exp,
            _ => false,
        }
    }

    pub fn is_refresh_valid(&self) -> bool {
        self.is_refresh_valid_at(Utc::now())
    }

    pub fn is_refresh_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_expires_at) {
            (Some(_), Some(exp)) => now < exp,
            _ => false,
        }
    }

    pub fn should_renew(&self) -> bool {
        self.should_renew_at(Utc::now())
    }

    /// Without a renewal boundary, fall back to the hard expiry.
    pub fn should_renew_at(&self, now: DateTime<Utc>) -> bool {
        match (self.renew_after, self.expires_at) {
            (Some(renew), _) => now >= renew,
            (None, Some(exp)) => now >= exp,
            (None, None) => true,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Lifetimes beyond this are clamped so timestamp arithmetic cannot overflow.
const MAX_LIFETIME_SECS: u64 = 100 * 365 * 24 * 3600;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_LIFETIME_SECS) as i64)
}
