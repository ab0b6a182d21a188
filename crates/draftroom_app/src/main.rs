use draftroom_infrastructure::{services::ServiceRegistry, settings::Settings};

use draftroom_routing::router::ApplicationController;

#[tokio::main]
async fn main() {
    let settings = Settings::new().expect("Could not parse settings");

    let services = ServiceRegistry::new();

    ApplicationController::run(settings, services).await;
}
