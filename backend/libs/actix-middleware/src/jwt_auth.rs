//! JWT bearer authentication
//!
//! `JwtAuthMiddleware` verifies `Authorization: Bearer <token>` when the header
//! is present and stores the token subject as [`UserId`] in the request
//! extensions. Requests without the header pass through unauthenticated;
//! handlers that need a caller identity take [`UserId`] as an extractor, which
//! rejects with 401. A present but invalid header is rejected at the
//! middleware.
//!
//! The identity is always taken from the verified token, never from the
//! request body.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Minimum HS256 secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// User ID extracted from a verified JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// JWT claims accepted by the service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Key setup failures, raised at startup
#[derive(Debug, Error)]
pub enum JwtConfigError {
    #[error("JWT secret too short: need at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("invalid RSA public key: {0}")]
    InvalidKey(String),
}

/// Request-time authentication failures (always 401)
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredentials,

    #[error("malformed Authorization header")]
    MalformedHeader,

    #[error("invalid or expired token")]
    InvalidToken,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized()
            .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
            .json(serde_json::json!({
                "error": {
                    "code": "unauthenticated",
                    "message": self.to_string(),
                },
                "status": StatusCode::UNAUTHORIZED.as_u16(),
            }))
    }
}

/// Verifies bearer tokens against a single configured key.
#[derive(Clone)]
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Shared-secret validator (HS256)
    pub fn hs256(secret: &str) -> Result<Self, JwtConfigError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtConfigError::WeakSecret);
        }

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    /// Public-key validator (RS256), for tokens signed by the identity provider
    pub fn rs256_pem(public_key_pem: &str) -> Result<Self, JwtConfigError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtConfigError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key,
            validation: Validation::new(Algorithm::RS256),
        })
    }

    /// Verify signature and expiry, then parse the subject as a user id.
    pub fn validate(&self, token: &str) -> Result<UserId, AuthError> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            AuthError::InvalidToken
        })?;

        Uuid::parse_str(&token_data.claims.sub)
            .map(UserId)
            .map_err(|_| {
                tracing::warn!("JWT subject is not a UUID");
                AuthError::InvalidToken
            })
    }
}

fn bearer_token(req: &ServiceRequest) -> Result<Option<&str>, AuthError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or(AuthError::MalformedHeader)
}

/// JWT Authentication Middleware
pub struct JwtAuthMiddleware {
    validator: Arc<JwtValidator>,
}

impl JwtAuthMiddleware {
    pub fn new(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            validator: self.validator.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    validator: Arc<JwtValidator>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let validator = self.validator.clone();

        Box::pin(async move {
            let verified = bearer_token(&req)
                .and_then(|token| token.map(|t| validator.validate(t)).transpose());

            match verified {
                Ok(Some(user_id)) => {
                    req.extensions_mut().insert(user_id);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %req.path(), error = %err, "Rejected bearer credentials");
                    let response = err.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Handlers taking `UserId` require an authenticated caller.
impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserId>()
                .copied()
                .ok_or_else(|| AuthError::MissingCredentials.into()),
        )
    }
}
