use c2_config::ServiceConfig;
use c2_coordination::CoordinationManager;

pub struct AppState {
    pub config: ServiceConfig,
    pub manager: CoordinationManager,
}
