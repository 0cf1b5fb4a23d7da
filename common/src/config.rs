use std::path::PathBuf;

use env_flags::env_flags;

env_flags! {
    pub WORKING_DIRECTORY: &str = "/working";
    pub REDIS_URL: &str = "redis://:@localhost:6379/0";
    pub SESSION_TTL_SEC: u64 = 300;
    pub CLEAR_EXPIRED_INTERVAL_SEC: u64 = 60;
    pub INSTANCE_KEY: &str = "latex-compile-service";
    // Not part of the documented contract (§6 lists only the five keys
    // above); these two exist because an HTTP transport and a bounded
    // TaskRunner queue both need a concrete value to actually start.
    pub BIND_ADDR: &str = "0.0.0.0:8080";
    pub TASK_QUEUE_CAPACITY: usize = 64;
}

/// Application configuration, read once from the environment at startup and
/// passed explicitly to the components that need it (SessionManager,
/// Sweeper, TaskRunner). Avoids scattering `std::env::var` reads across the
/// codebase the way the `env_flags!` statics alone would invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub working_directory: PathBuf,
    pub redis_url: String,
    pub session_ttl_sec: u64,
    pub clear_expired_interval_sec: u64,
    pub instance_key: String,
    pub bind_addr: String,
    pub task_queue_capacity: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            working_directory: PathBuf::from(*WORKING_DIRECTORY),
            redis_url: (*REDIS_URL).to_string(),
            session_ttl_sec: *SESSION_TTL_SEC,
            clear_expired_interval_sec: *CLEAR_EXPIRED_INTERVAL_SEC,
            instance_key: (*INSTANCE_KEY).to_string(),
            bind_addr: (*BIND_ADDR).to_string(),
            task_queue_capacity: *TASK_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values_when_unset() {
        // SAFETY: test-only, no other thread mutates the environment concurrently.
        unsafe {
            std::env::remove_var("WORKING_DIRECTORY");
            std::env::remove_var("REDIS_URL");
            std::env::remove_var("SESSION_TTL_SEC");
            std::env::remove_var("CLEAR_EXPIRED_INTERVAL_SEC");
            std::env::remove_var("INSTANCE_KEY");
            std::env::remove_var("BIND_ADDR");
            std::env::remove_var("TASK_QUEUE_CAPACITY");
        }
        let cfg = ServiceConfig::from_env();
        assert_eq!(cfg.working_directory, PathBuf::from("/working"));
        assert_eq!(cfg.redis_url, "redis://:@localhost:6379/0");
        assert_eq!(cfg.session_ttl_sec, 300);
        assert_eq!(cfg.clear_expired_interval_sec, 60);
        assert_eq!(cfg.instance_key, "latex-compile-service");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.task_queue_capacity, 64);
    }
}
