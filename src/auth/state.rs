//! Authentication state trait and macro.

use std::time::Duration;

use crate::db::Database;
use crate::jwt::AuthConfig;

/// Trait for state types that give the gates access to configuration and storage.
pub trait HasAuthBackend {
    fn auth(&self) -> &AuthConfig;
    fn db(&self) -> &Database;
    /// Upper bound on any single repository call made while authorizing.
    fn lookup_timeout(&self) -> Duration;
}

/// Implement `HasAuthBackend` for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `auth: Arc<AuthConfig>`
/// - `db: Database`
/// - `lookup_timeout: Duration`
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub auth: Arc<AuthConfig>,
///     pub db: Database,
///     pub lookup_timeout: Duration,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn auth(&self) -> &$crate::jwt::AuthConfig {
                &self.auth
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn lookup_timeout(&self) -> ::std::time::Duration {
                self.lookup_timeout
            }
        }
    };
}
