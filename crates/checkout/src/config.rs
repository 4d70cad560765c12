//! Checkout configuration loaded from environment variables.

use std::time::Duration;

/// What to do when the identity service cannot be reached at all.
///
/// The legacy behavior was to treat an unreachable identity service as
/// "buyer valid", which silently weakens a safety check during partial
/// outages. That behavior is still available, but it has to be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityOutagePolicy {
    /// An identity outage fails the checkout.
    #[default]
    FailClosed,

    /// An identity outage lets the checkout proceed (legacy behavior).
    FailOpen,
}

/// Orchestrator configuration.
///
/// Reads from environment variables:
/// - `CHECKOUT_STEP_TIMEOUT_SECS` — per-call timeout in seconds (default: `5`)
/// - `CHECKOUT_IDENTITY_FAIL_OPEN` — set to `"true"` to treat an identity
///   outage as a passed check (default: fail closed)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Bound applied to each remote call, forward and compensating alike.
    pub step_timeout: Duration,
    /// Behavior when the identity service is unreachable.
    pub identity_outage: IdentityOutagePolicy,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let step_timeout = std::env::var("CHECKOUT_STEP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let identity_outage = match std::env::var("CHECKOUT_IDENTITY_FAIL_OPEN").as_deref() {
            Ok("true") | Ok("1") => IdentityOutagePolicy::FailOpen,
            _ => IdentityOutagePolicy::FailClosed,
        };

        Self {
            step_timeout,
            identity_outage,
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(5),
            identity_outage: IdentityOutagePolicy::FailClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CheckoutConfig::default();
        assert_eq!(config.step_timeout, Duration::from_secs(5));
        assert_eq!(config.identity_outage, IdentityOutagePolicy::FailClosed);
    }

    #[test]
    fn test_default_policy_is_fail_closed() {
        assert_eq!(
            IdentityOutagePolicy::default(),
            IdentityOutagePolicy::FailClosed
        );
    }
}
