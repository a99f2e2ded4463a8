//! Protected resources mounted behind the gate.

use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;

use crate::auth::Principal;

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub principal: String,
}

/// Echo the principal the gate attached to this request.
pub async fn whoami(Extension(principal): Extension<Principal>) -> Json<WhoAmI> {
    Json(WhoAmI {
        principal: principal.name().to_string(),
    })
}

pub fn router() -> Router {
    Router::new().route("/whoami", get(whoami))
}
