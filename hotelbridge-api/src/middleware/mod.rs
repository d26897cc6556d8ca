pub mod auth;

pub use auth::{issue_token, principal_auth_middleware, PrincipalClaims};
