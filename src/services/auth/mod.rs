pub mod access_jwt;
pub mod factory;

pub use access_jwt::{AuthError, Authorized, JwtAuth, JwtAuthConfig, TokenType};
pub use factory::build_jwt_auth;
