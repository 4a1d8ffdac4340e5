//! Bearer-token authentication with role-gated authorization.
//!
//! Short-lived access tokens travel in the `Authorization` header and are
//! verified statelessly, apart from a revocation lookup. Long-lived refresh
//! tokens travel only in an HttpOnly cookie and are exchanged at the refresh
//! endpoint for a new pair.

mod bearer;
mod cookie;
mod errors;
mod middleware;
mod state;

pub use bearer::{bearer_token, verify_bearer};
pub use cookie::{
    RefreshCookie, build_cookie, build_expired_cookie, find_refresh_cookie, get_cookies,
};
pub use errors::{ApiAuthError, AuthError, AuthErrorKind};
pub use middleware::{CurrentUser, admin_required, auth_required, bounded_lookup};
pub use state::HasAuthBackend;
