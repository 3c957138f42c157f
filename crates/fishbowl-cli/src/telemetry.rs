//! Tracing subscriber setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives. The binary's own target is `fishbowl`.
const DEFAULT_FILTER: &str = "info,fishbowl_world=info,fishbowl=debug";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    info!(json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_default_filter_enables_debug_for_this_binary() {
        let directive = format!("{}=debug", env!("CARGO_CRATE_NAME"));
        assert!(DEFAULT_FILTER.split(',').any(|d| d == directive));
    }
}
