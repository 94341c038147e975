use axum::{extract::State, routing::post, Json, Router};
use model::driver::VehicleType;
use model::location::Location;
use model::pricing::FareBreakdown;
use serde::Deserialize;

use crate::{common::RouteResult, WebState};

pub(crate) fn routes(state: WebState) -> Router {
    Router::new().route("/estimate", post(estimate_fare)).with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateFareBody {
    origin: Location,
    dest: Location,
    vehicle_type: VehicleType,
    promo_code: Option<String>,
}

async fn estimate_fare(
    State(WebState { platform }): State<WebState>,
    Json(body): Json<EstimateFareBody>,
) -> RouteResult<FareBreakdown> {
    let breakdown = platform
        .estimate_fare(body.origin, body.dest, body.vehicle_type, body.promo_code)
        .await?;
    Ok(Json(breakdown))
}
