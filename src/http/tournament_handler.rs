use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::tournament::{CreateTournamentRequest, SelectWinnerRequest};
use crate::service::tournament_service::TournamentService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// POST /api/v1/tournaments
pub async fn create(
    req: HttpRequest,
    service: web::Data<TournamentService>,
    body: web::Json<CreateTournamentRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    body.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    info!(
        user_id = %user_id,
        round_type = body.round_type,
        "Received tournament create request"
    );
    let response = service.create_tournament(user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// POST /api/v1/tournaments/{tournament_id}/matches/{match_id}/select
pub async fn select_winner(
    req: HttpRequest,
    service: web::Data<TournamentService>,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<SelectWinnerRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    let (tournament_id, match_id) = path.into_inner();

    info!(
        tournament_id = %tournament_id,
        match_id = %match_id,
        winner = %body.winner_photo_id,
        "Received winner selection"
    );
    let response = service
        .select_winner(user_id, tournament_id, match_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/tournaments/{tournament_id}/result
pub async fn result(
    req: HttpRequest,
    service: web::Data<TournamentService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    let response = service.result(user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
