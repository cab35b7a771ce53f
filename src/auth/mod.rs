//! Authentication module
//!
//! Handles token signing and verification, password hashing, and the
//! per-user stored refresh token.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use jwt::generate_access_token;
pub use jwt::generate_refresh_token;
pub use jwt::validate_access_token;
pub use jwt::validate_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
pub use refresh_token::clear_refresh_token;
pub use refresh_token::issue_token_pair;
pub use refresh_token::stored_refresh_token;
pub use refresh_token::TokenPair;
