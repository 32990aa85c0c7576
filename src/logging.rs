use env_logger::{Builder, Env};

/// Installs the process logger. `RUST_LOG` overrides `filter`.
///
/// Calling it twice is harmless; the second call reports false.
pub fn init(filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .try_init()
        .is_ok()
}

#[cfg(test)]
pub fn init_for_tests() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
