pub mod jwt_service;
pub mod middleware;

#[cfg(test)]
mod jwt_service_test;

pub use jwt_service::{Claims, JwtConfig, JwtError, JwtService};
pub use middleware::{AuthMiddleware, ClaimsExt};
