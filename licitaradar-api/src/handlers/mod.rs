pub mod search;
pub mod stream;

use axum::http::StatusCode;

pub async fn health() -> StatusCode {
    StatusCode::OK
}
