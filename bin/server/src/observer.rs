//! Post-login notification hook.

use hallpass_core::AccountId;
use hallpass_identity::{LoginObserver, VerifiedClaims};

/// Observer that emits a tracing event for each completed login.
///
/// Claims may contain PII, so only the account identifier is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoginObserver for TracingObserver {
    fn after_login(&self, account: AccountId, _claims: &VerifiedClaims) {
        tracing::info!(account = %account, "post-login hook fired");
    }
}
