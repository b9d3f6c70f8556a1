/// Application-level constants
pub const APP_NAME: &str = "qrlift";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var: override device-class detection.
/// Accepted values: `mobile`, `mobile-constrained`, `desktop`.
pub const ENV_DEVICE_CLASS: &str = "QRLIFT_DEVICE_CLASS";

/// Env var: enable diagnostic artifact dumps into the given directory.
pub const ENV_DUMP_DIR: &str = "QRLIFT_DUMP_DIR";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_filter_scopes_to_crate() {
        assert_eq!(default_log_filter(), "qrlift=info");
    }
}
