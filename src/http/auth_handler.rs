use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::auth::JwtService;
use crate::db::{is_unique_violation, DbPool};
use crate::models::user::{LoginRequest, SignupRequest, TokenResponse, User, UserResponse};
use crate::service::rate_limit_service::{QuotaSnapshot, RateLimitService};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// POST /api/v1/auth/signup
pub async fn signup(
    pool: web::Data<DbPool>,
    req: web::Json<SignupRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("password hashing failed: {e}")))?;

    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, username, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&req.email)
    .bind(&req.username)
    .bind(&password_hash)
    .fetch_one(pool.get_ref())
    .await;

    let user = match result {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("email is already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "User signed up");
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /api/v1/auth/login
pub async fn login(
    pool: web::Data<DbPool>,
    jwt: web::Data<JwtService>,
    req: web::Json<LoginRequest>,
) -> Result<impl Responder, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&req.email)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let verified = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| ApiError::internal_error(format!("password verification failed: {e}")))?;
    if !verified || !user.is_active {
        return Err(ApiError::Unauthorized);
    }

    let access_token = jwt
        .generate_token(user.id, &user.email)
        .map_err(|e| ApiError::internal_error(format!("token generation failed: {e}")))?;

    info!(user_id = %user.id, "User logged in");
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: jwt.token_expiry_seconds(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub quota: QuotaSnapshot,
}

/// GET /api/v1/auth/me
pub async fn me(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    quotas: web::Data<RateLimitService>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let quota = quotas.snapshot(user_id).await?;

    Ok(HttpResponse::Ok().json(MeResponse {
        user: UserResponse::from(user),
        quota,
    }))
}
