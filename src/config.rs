use std::time::Duration;

/// Configuration for a [`FairPool`](crate::pool::FairPool).
#[derive(Debug, Clone)]
pub struct FairPoolConfig {
    /// Number of worker threads to start with.
    pub threads: usize,

    /// Pool name, used in worker thread names and logs. When `None` a
    /// process-unique `fair-pool-<id>` name is generated.
    pub name: Option<String>,

    /// Upper bound on how long `dispose` waits for workers to finish their
    /// in-flight jobs before detaching them.
    pub join_timeout: Duration,
}

impl Default for FairPoolConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            name: None,
            join_timeout: Duration::from_secs(5),
        }
    }
}
