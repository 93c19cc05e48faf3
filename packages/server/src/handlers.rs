//! HTTP handler functions for the backcountry risk API.

use actix_web::{HttpResponse, web};
use backcountry_pipeline::{AssessmentRequest, PipelineContext, PipelineError, assess};
use backcountry_server_models::{ApiError, ApiHealth, SafetyQueryParams};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/safety`
///
/// Runs one assessment for the coordinate, start and travel window.
pub async fn safety(
    context: web::Data<PipelineContext>,
    params: web::Query<SafetyQueryParams>,
) -> HttpResponse {
    let request = AssessmentRequest {
        lat: params.lat,
        lon: params.lon,
        start: params.start,
        travel_hours: params.travel_hours,
    };

    match assess(request, context.get_ref(), None).await {
        Ok(report) => {
            log::debug!(
                "Assessed ({}, {}): score {} confidence {}",
                params.lat,
                params.lon,
                report.safety.score,
                report.safety.confidence
            );
            HttpResponse::Ok().json(report)
        }
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &PipelineError) -> HttpResponse {
    if e.is_invalid_request() {
        return HttpResponse::BadRequest().json(ApiError::new(e.to_string()));
    }
    match e {
        PipelineError::ZoneLayer(_) => {
            log::error!("Assessment failed: {e}");
            HttpResponse::BadGateway().json(ApiError::new(e.to_string()))
        }
        _ => {
            log::error!("Assessment failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to assess location"))
        }
    }
}
