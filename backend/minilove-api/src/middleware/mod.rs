/// Middleware implementations
pub mod jwt_auth;

// Middleware modules:
// - jwt_auth: JWT Bearer token validation, required and optional modes
// - Request logging: handled by actix_web::middleware::Logger and TracingLogger
// - CORS: handled by actix_cors::Cors

pub use jwt_auth::{AuthUser, JwtAuthMiddleware, MaybeUser};
