mod routes;
mod state;

use actix_web::{web, App, HttpServer};
use c2_config::{CoordinationConfig, ServiceConfig};
use c2_coordination::{CoordinationManager, TracingAuditSink};
use c2_observability::{init, log_startup, ObservabilityConfig};
use std::io;
use std::sync::Arc;

use crate::state::AppState;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServiceConfig::from_env("c2-api");
    let obs_config = ObservabilityConfig {
        service_name: config.service_name.clone(),
        environment: config.environment.to_string(),
        log_level: config.log_level.clone(),
        metrics_addr: config.metrics_addr.clone(),
    };
    let handle = init(&obs_config);
    log_startup(&handle, &obs_config.environment);

    let coordination = CoordinationConfig::from_env();
    tracing::info!(
        population_threshold = coordination.brief_population_threshold,
        agency_threshold = coordination.brief_agency_threshold,
        briefing_interval_minutes = coordination.brief_interval_minutes,
        "Coordination rules loaded"
    );
    let manager = CoordinationManager::new(coordination, Arc::new(TracingAuditSink));

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState { config, manager });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(routes::common::json_error))
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
