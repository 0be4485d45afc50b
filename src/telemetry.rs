use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::GuardError;

/// Builds a subscriber that honors `RUST_LOG` and falls back to `default_filter`.
///
/// With `json` set, events are written as one JSON object per line, which is
/// what most log collectors expect. Otherwise the human-readable format is used.
pub fn get_subscriber(default_filter: &str, json: bool) -> impl Subscriber + Send + Sync + 'static {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    Registry::default()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(|| fmt::layer()))
}

/// Installs `subscriber` as the global default.
///
/// # Errors
///
/// Returns [`GuardError::Telemetry`] if a global subscriber is already set.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync + 'static) -> Result<(), GuardError> {
    subscriber
        .try_init()
        .map_err(|e| GuardError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // The first call may race with other tests; only the second result matters.
        let _ = init_subscriber(get_subscriber("warn", false));
        let result = init_subscriber(get_subscriber("warn", true));
        assert!(matches!(result, Err(GuardError::Telemetry(_))));
    }
}
