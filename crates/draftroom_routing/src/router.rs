use std::net::SocketAddr;

use axum::Router;

use draftroom_infrastructure::services::ServiceRegistry;
use draftroom_infrastructure::settings::Settings;
use tower_http::trace::TraceLayer;

use crate::endpoints::draft_endpoints::DraftRouter;
use crate::logger;

pub struct ApplicationController;

impl ApplicationController {
    pub async fn run(settings: Settings, service_registry: ServiceRegistry) {
        logger::setup(&settings.logger.level);

        let router: Router = Router::new()
            .nest("/api/draft", DraftRouter::new(service_registry))
            // logging so we can see whats going on
            .layer(TraceLayer::new_for_http());

        let listener =
            tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", settings.server.port))
                .await
                .expect("Could not start the TCP listener");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Failed to start the server");
    }
}
