use std::sync::Arc;

use model::config::Config;
use platform::RidePlatform;
use web::{start_web_server, WebState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let platform = Arc::new(RidePlatform::new(config));
    let addr = std::env::var("RIDE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let result = start_web_server(WebState { platform: platform.clone() }, &addr).await;
    platform.shutdown().await;
    result.expect("web server exited with an error");
}
