use actix_web::HttpResponse;

/// Endpoint used by clients to know if the server is working
#[tracing::instrument(name = "Health check handler")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
