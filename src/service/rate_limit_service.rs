use crate::api_error::ApiError;
use crate::config::RateLimitConfig;
use crate::db::DbPool;
use crate::models::user::User;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Tournament-creation quota: free accounts get a lifetime allowance,
/// premium accounts a monthly one that resets on calendar-month rollover.
#[derive(Clone)]
pub struct RateLimitService {
    pool: DbPool,
    limits: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub tier: &'static str,
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub period: &'static str,
}

impl RateLimitService {
    pub fn new(pool: DbPool, limits: RateLimitConfig) -> Self {
        Self { pool, limits }
    }

    pub async fn check_creation_allowed(&self, user_id: Uuid) -> Result<(), ApiError> {
        let user = self.load_user(user_id).await?;
        let snapshot = quota_snapshot(&user, &self.limits, Utc::now());
        if snapshot.remaining <= 0 {
            return Err(ApiError::TooManyRequests(format!(
                "{} tier allows {} tournaments per {} period",
                snapshot.tier, snapshot.limit, snapshot.period
            )));
        }
        Ok(())
    }

    pub async fn record_creation(&self, user_id: Uuid) -> Result<(), ApiError> {
        let user = self.load_user(user_id).await?;
        let now = Utc::now();
        if user.is_premium && month_rolled_over(user.last_reset_at, now) {
            sqlx::query(
                "UPDATE users SET monthly_tournament_count = 0, last_reset_at = $2 WHERE id = $1",
            )
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        sqlx::query(
            r#"
            UPDATE users
            SET tournament_count = tournament_count + 1,
                monthly_tournament_count = monthly_tournament_count
                    + (CASE WHEN is_premium THEN 1 ELSE 0 END),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn snapshot(&self, user_id: Uuid) -> Result<QuotaSnapshot, ApiError> {
        let user = self.load_user(user_id).await?;
        Ok(quota_snapshot(&user, &self.limits, Utc::now()))
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound)
    }
}

fn month_rolled_over(last_reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_reset_at {
        None => true,
        Some(last) => {
            now.year() > last.year() || (now.year() == last.year() && now.month() > last.month())
        }
    }
}

pub fn quota_snapshot(user: &User, limits: &RateLimitConfig, now: DateTime<Utc>) -> QuotaSnapshot {
    if user.is_premium {
        let used = if month_rolled_over(user.last_reset_at, now) {
            0
        } else {
            i64::from(user.monthly_tournament_count)
        };
        QuotaSnapshot {
            tier: "premium",
            limit: limits.premium_monthly_limit,
            used,
            remaining: limits.premium_monthly_limit - used,
            period: "monthly",
        }
    } else {
        let used = i64::from(user.tournament_count);
        QuotaSnapshot {
            tier: "free",
            limit: limits.free_limit,
            used,
            remaining: limits.free_limit - used,
            period: "lifetime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_user(is_premium: bool, tournament_count: i32, monthly: i32) -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            username: "user".to_string(),
            password_hash: String::new(),
            is_active: true,
            is_premium,
            tournament_count,
            monthly_tournament_count: monthly,
            last_reset_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn limits() -> RateLimitConfig {
        RateLimitConfig {
            free_limit: 5,
            premium_monthly_limit: 50,
        }
    }

    #[test]
    fn test_free_tier_lifetime_quota() {
        let snapshot = quota_snapshot(&test_user(false, 3, 0), &limits(), Utc::now());
        assert_eq!(snapshot.tier, "free");
        assert_eq!(snapshot.remaining, 2);
        assert_eq!(snapshot.period, "lifetime");

        let exhausted = quota_snapshot(&test_user(false, 5, 0), &limits(), Utc::now());
        assert_eq!(exhausted.remaining, 0);
    }

    #[test]
    fn test_premium_quota_resets_on_month_rollover() {
        let mut user = test_user(true, 80, 50);
        user.last_reset_at = Some(Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap());

        // Same month: exhausted.
        let same_month = Utc.with_ymd_and_hms(2026, 7, 31, 23, 0, 0).unwrap();
        assert_eq!(quota_snapshot(&user, &limits(), same_month).remaining, 0);

        // Next month: full quota again.
        let next_month = Utc.with_ymd_and_hms(2026, 8, 1, 0, 5, 0).unwrap();
        let snapshot = quota_snapshot(&user, &limits(), next_month);
        assert_eq!(snapshot.used, 0);
        assert_eq!(snapshot.remaining, 50);
    }

    #[test]
    fn test_month_rollover_across_year_boundary() {
        let last = Some(Utc.with_ymd_and_hms(2025, 12, 20, 0, 0, 0).unwrap());
        let january = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        assert!(month_rolled_over(last, january));

        let same = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert!(!month_rolled_over(last, same));
    }

    #[test]
    fn test_never_reset_counts_as_rolled_over() {
        assert!(month_rolled_over(None, Utc::now()));
    }
}
