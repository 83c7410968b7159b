use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::photo::PhotoUploadRequest;
use crate::service::photo_service::PhotoService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// POST /api/v1/photos/upload
pub async fn upload(
    req: HttpRequest,
    service: web::Data<PhotoService>,
    body: web::Json<PhotoUploadRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    body.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    info!(user_id = %user_id, count = body.photos.len(), "Received photo upload");
    let response = service.upload(user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// GET /api/v1/photos
pub async fn list(
    req: HttpRequest,
    service: web::Data<PhotoService>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    let photos = service.list(user_id).await?;
    Ok(HttpResponse::Ok().json(photos))
}

/// DELETE /api/v1/photos/{photo_id}
pub async fn delete(
    req: HttpRequest,
    service: web::Data<PhotoService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.user_id().ok_or(ApiError::Unauthorized)?;
    service.delete(user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
