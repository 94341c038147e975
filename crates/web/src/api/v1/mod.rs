use axum::{routing::on, Router};

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    WebState,
};

mod drivers;
mod geo;
mod pricing;
mod streams;
mod trips;

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::resource!("/v1{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .nest_service("/trips", trips::routes(state.clone()))
        .nest_service("/drivers", drivers::routes(state.clone()))
        .nest_service("/pricing", pricing::routes(state.clone()))
        .nest_service("/geo", geo::routes(state.clone()))
        .nest_service("/streams", streams::routes(state))
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}
