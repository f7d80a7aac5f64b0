pub mod state;
pub mod supervisor;

pub use state::{StateRecord, StateStore};
pub use supervisor::{
    CollectorStatus, HEALTH_URL, StartOutcome, StopOutcome, Supervisor, check_health, find_binary,
    wait_healthy,
};
