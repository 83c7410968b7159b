#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A public link to a completed tournament. The id is an 8-character slug.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Share {
    pub id: String,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub is_public: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// A visitor's ranking of a shared bracket, deduplicated per IP.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub rankings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ===== API DTOs =====

fn default_public() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareCreateRequest {
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub expires_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share_id: String,
    pub share_url: String,
    pub tournament_id: Uuid,
    pub is_public: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub rankings: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub vote_id: Uuid,
    pub vote_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn share(expires_at: Option<DateTime<Utc>>) -> Share {
        Share {
            id: "abcd1234".to_string(),
            tournament_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            is_public: true,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_share_without_expiry_never_expires() {
        assert!(!share(None).is_expired(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_share_expiry_boundary() {
        let now = Utc::now();
        let s = share(Some(now));
        assert!(!s.is_expired(now));
        assert!(s.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_share_request_defaults_public() {
        let req: ShareCreateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.is_public);
        assert_eq!(req.expires_days, None);
    }
}
