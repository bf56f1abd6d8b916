use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Log target for audit notifications emitted by the coordination core.
pub const AUDIT_TARGET: &str = "c2::audit";

pub mod names {
    pub const ROOMS_OPENED: &str = "c2_rooms_opened_total";
    pub const ROOM_TRANSITIONS: &str = "c2_room_transitions_total";
    pub const TASKS_CREATED: &str = "c2_tasks_created_total";
    pub const TASKS_COMPLETED: &str = "c2_tasks_completed_total";
    pub const TASKS_AUTO_ASSIGNED: &str = "c2_tasks_auto_assigned_total";
    pub const TIMELINE_EVENTS: &str = "c2_timeline_events_total";
    pub const BRIEFS_GENERATED: &str = "c2_briefs_generated_total";
    pub const RESOURCE_REQUESTS: &str = "c2_resource_requests_total";
    pub const EOC_ACTIVATION_LEVEL: &str = "c2_eoc_activation_level";
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityHandle {
    pub service_name: String,
    pub metrics_enabled: bool,
}

pub fn init(config: &ObservabilityConfig) -> ObservabilityHandle {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);

    let metrics_enabled = init_metrics(config);
    if metrics_enabled {
        describe_metrics();
    }

    ObservabilityHandle {
        service_name: config.service_name.clone(),
        metrics_enabled,
    }
}

pub fn log_startup(handle: &ObservabilityHandle, environment: &str) {
    tracing::info!(
        service = %handle.service_name,
        environment = %environment,
        metrics_enabled = handle.metrics_enabled,
        "Coordination service starting"
    );
}

fn describe_metrics() {
    metrics::describe_counter!(names::ROOMS_OPENED, "Incident rooms opened");
    metrics::describe_counter!(
        names::ROOM_TRANSITIONS,
        "Incident room status transitions, labelled by target status"
    );
    metrics::describe_counter!(names::TASKS_CREATED, "Response tasks created");
    metrics::describe_counter!(names::TASKS_COMPLETED, "Response tasks completed");
    metrics::describe_counter!(
        names::TASKS_AUTO_ASSIGNED,
        "Tasks bound to a resource by capability auto-assignment"
    );
    metrics::describe_counter!(
        names::TIMELINE_EVENTS,
        "Timeline events appended, labelled by event type"
    );
    metrics::describe_counter!(names::BRIEFS_GENERATED, "Situation briefs generated");
    metrics::describe_counter!(
        names::RESOURCE_REQUESTS,
        "Cross-agency resource requests brokered"
    );
    metrics::describe_gauge!(
        names::EOC_ACTIVATION_LEVEL,
        "Current EOC activation tier, zero when deactivated"
    );
}

fn init_metrics(config: &ObservabilityConfig) -> bool {
    let Some(addr) = config.metrics_addr.as_ref() else {
        return false;
    };
    let addr: SocketAddr = match addr.parse() {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "Invalid C2_METRICS_ADDR value"
            );
            return false;
        }
    };

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .add_global_label("environment", config.environment.clone());

    match builder.install() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "Failed to initialize Prometheus exporter"
            );
            false
        }
    }
}
