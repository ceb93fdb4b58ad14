//! # Actix Middleware Library
//!
//! Shared middleware components for Nova Actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer token verification and the `UserId` extractor
//! - `correlation_id`: request correlation ids for log stitching

pub mod correlation_id;
pub mod jwt_auth;

pub use correlation_id::{get_correlation_id, CorrelationId, CorrelationIdMiddleware};
pub use jwt_auth::{AuthError, Claims, JwtAuthMiddleware, JwtConfigError, JwtValidator, UserId};
