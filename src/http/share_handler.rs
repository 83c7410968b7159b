use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::share::{ShareCreateRequest, VoteRequest};
use crate::service::share_service::ShareService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// POST /api/v1/share/tournament/{tournament_id}
pub async fn create_share(
    req: HttpRequest,
    service: web::Data<ShareService>,
    path: web::Path<Uuid>,
    body: web::Json<ShareCreateRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    let tournament_id = path.into_inner();

    info!(user_id = %user_id, tournament_id = %tournament_id, "Received share request");
    let response = service
        .create_share(user_id, tournament_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(response))
}

/// GET /api/v1/share/{share_id} — no authentication required.
pub async fn get_shared(
    service: web::Data<ShareService>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let response = service.shared_view(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/v1/share/{share_id}/vote — no authentication required, one
/// vote per address.
pub async fn vote(
    req: HttpRequest,
    service: web::Data<ShareService>,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> Result<impl Responder, ApiError> {
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    // Voting works logged out; attribute the vote when a token is present.
    let user_id = req.user_id();

    let response = service
        .cast_vote(&path.into_inner(), &ip_address, user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(response))
}
