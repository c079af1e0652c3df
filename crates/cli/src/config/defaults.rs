pub(super) fn default_concurrency() -> usize {
    4
}

pub(super) fn default_keep_count() -> u32 {
    10
}

pub(super) fn default_request_timeout_secs() -> u64 {
    30
}

pub(super) fn default_disk_free_gb() -> f64 {
    10.0
}

pub(super) fn default_cpu_percent() -> f64 {
    90.0
}

pub(super) fn default_memory_percent() -> f64 {
    90.0
}

pub(super) fn default_ping() -> bool {
    true
}
