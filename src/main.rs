use sitebrief::{api, config, logging, processing::ProcessingService};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();
    let service = ProcessingService::new(config).expect("Failed to initialize processing service");
    let app = api::create_router(Arc::new(service));

    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .expect("Failed to bind listener");
    tracing::info!(
        index = %config.meili_index,
        meili_url = %config.meili_url,
        "Listening on http://0.0.0.0:{}",
        config.server_port
    );
    axum::serve(listener, app).await.unwrap();
}
