//! Middleware module
//!
//! Session authentication middleware and related request-scoped types.

mod session;

pub use session::CurrentUser;
pub use session::SessionMiddleware;
pub use session::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
