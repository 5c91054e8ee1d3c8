use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, get, web};

use crate::error::AppError;
use crate::html::render_page;
use crate::state::AppState;

macros_utils::routes! {
    route status_page,
    route status_json,
}

/// Latest status of every target as an HTML table
#[get("/")]
pub async fn status_page(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let snapshot = state.status.snapshot(&state.targets).await?;
    let page = render_page(snapshot.iter(), state.interval.as_secs().max(1));

    Ok(HttpResponse::Ok().content_type(ContentType::html()).body(page))
}

/// Latest status of every target as JSON
#[get("/api/status")]
pub async fn status_json(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let snapshot = state.status.snapshot(&state.targets).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
