//! Default values for configuration fields
//!
//! Collected in one place so the TOML defaults and the `Default` impls
//! cannot drift apart.

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8085
}

pub fn default_database_url() -> String {
    "sqlite://./data/audit-engine.db".to_string()
}

pub fn default_max_active_per_resource() -> u64 {
    5
}

pub fn default_max_queue_depth() -> u64 {
    250
}

pub fn default_queue_full_retry_after() -> String {
    "60s".to_string()
}

pub fn default_max_retries() -> i32 {
    3
}

pub fn default_retry_base_delay() -> String {
    "5m".to_string()
}

pub fn default_retry_jitter() -> bool {
    false
}

pub fn default_lease_duration() -> String {
    "10m".to_string()
}

pub fn default_processor_tick_interval() -> String {
    "5s".to_string()
}

pub fn default_dequeue_batch_size() -> u64 {
    16
}

pub fn default_monitor_tick_interval() -> String {
    "60s".to_string()
}

pub fn default_target_delay() -> String {
    "2s".to_string()
}

pub fn default_max_pending_runs() -> u64 {
    25
}

pub fn default_event_buffer_size() -> usize {
    256
}
