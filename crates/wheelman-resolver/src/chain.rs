//! Ordered fallback-chain runner.
//!
//! Version detection and the download transport both work through an
//! ordered list of alternative strategies, advancing past failures and
//! stopping at the first success. The iteration lives here once so each
//! use site only declares its strategy list.

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

/// One named attempt in a fallback chain.
///
/// `Ok(None)` means the strategy ran cleanly but produced no result;
/// `Err` means it failed outright. Both advance the chain.
pub type Attempt<'a, T> = (&'static str, BoxFuture<'a, anyhow::Result<Option<T>>>);

/// Run the attempts in order and return the first successful result.
///
/// A strategy failure is logged at warn and recovered by advancing;
/// exhaustion of the whole chain is logged at error and reported as `None`.
pub async fn first_success<T>(chain: &'static str, attempts: Vec<Attempt<'_, T>>) -> Option<T> {
    let total = attempts.len();
    for (i, (name, attempt)) in attempts.into_iter().enumerate() {
        match attempt.await {
            Ok(Some(value)) => {
                if i > 0 {
                    info!(chain, strategy = name, attempt = i + 1, "Fallback strategy succeeded");
                }
                return Some(value);
            }
            Ok(None) => {
                debug!(chain, strategy = name, "Strategy produced no result, trying next");
            }
            Err(e) => {
                warn!(chain, strategy = name, attempt = i + 1, %e, "Strategy failed, trying next");
            }
        }
    }
    error!(chain, attempts = total, "Every strategy failed");
    None
}
