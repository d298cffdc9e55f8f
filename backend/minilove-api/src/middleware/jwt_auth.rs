/// JWT authentication middleware for Bearer token validation
/// Extracts the caller's id and role from JWT claims and adds them to request extensions
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::error::AppError;
use crate::models::Role;
use crate::security::jwt;

/// Authenticated caller extracted from a JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    /// Fail with 403 unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.id, role = %self.role, "insufficient role");
            Err(AppError::Authorization("Insufficient permissions".to_string()))
        }
    }
}

/// Caller identity on endpoints that also serve guests
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.map(|u| u.id)
    }
}

/// Why optional-mode authentication failed, kept so that handlers which do
/// need a caller can report the real cause instead of a bare 401.
struct AuthRejection(AppError);

/// JWT authentication middleware factory.
///
/// In required mode a missing or invalid token is rejected with 401. In
/// optional mode the request proceeds as a guest instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtAuthMiddleware {
    optional: bool,
}

impl JwtAuthMiddleware {
    pub fn required() -> Self {
        Self { optional: false }
    }

    pub fn optional() -> Self {
        Self { optional: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            optional: self.optional,
        }))
    }
}

/// JWT authentication middleware service
pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    optional: bool,
}

/// Resolve the bearer token in an Authorization header value.
fn authenticate(header: Option<&str>) -> Result<AuthUser, AppError> {
    let header =
        header.ok_or_else(|| AppError::Authentication("Missing Authorization header".to_string()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Authentication("Invalid Authorization scheme, expected Bearer".to_string())
    })?;

    let data = jwt::validate_token(token.trim())?;
    let id = data.claims.user_id()?;

    Ok(AuthUser {
        id,
        role: data.claims.role,
    })
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let optional = self.optional;

        Box::pin(async move {
            // Copy the header out before any mutable access to extensions
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);

            match authenticate(auth_header.as_deref()) {
                Ok(user) => {
                    tracing::debug!(user_id = user.id, role = %user.role, "request authenticated");
                    req.extensions_mut().insert(user);
                }
                Err(e) if optional => {
                    tracing::debug!("optional auth failed, continuing as guest: {}", e);
                    if auth_header.is_some() {
                        req.extensions_mut().insert(AuthRejection(e));
                    }
                }
                Err(e) => {
                    tracing::debug!("Token validation failed: {}", e);
                    return Err(e.into());
                }
            }

            service.call(req).await
        })
    }
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<AuthUser>().copied() {
            return ready(Ok(user));
        }

        let error = match req.extensions_mut().remove::<AuthRejection>() {
            Some(AuthRejection(e)) => e,
            None => AppError::Authentication("Authentication required".to_string()),
        };
        ready(Err(error.into()))
    }
}

impl FromRequest for MaybeUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(MaybeUser(req.extensions().get::<AuthUser>().copied())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::jwt::{initialize_keys, TEST_SECRET};
    use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.id.to_string())
    }

    async fn maybe(user: MaybeUser) -> HttpResponse {
        HttpResponse::Ok().body(user.id().map(|id| id.to_string()).unwrap_or_default())
    }

    #[test]
    fn test_require_role() {
        let admin = AuthUser { id: 1, role: Role::Admin };
        let user = AuthUser { id: 2, role: Role::User };
        assert!(admin.require_role(&[Role::Admin]).is_ok());
        assert!(user.require_role(&[Role::Premium, Role::Admin]).is_err());
    }

    #[test]
    fn test_authenticate_rejects_bad_headers() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
        assert!(authenticate(None).is_err());
        assert!(authenticate(Some("Basic abc")).is_err());
        assert!(authenticate(Some("Bearer not.a.jwt")).is_err());
    }

    #[actix_web::test]
    async fn test_required_mode_rejects_missing_token() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/p")
                    .wrap(JwtAuthMiddleware::required())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/p").to_request();
        let resp = actix_test::try_call_service(&app, req).await;
        let status = match resp {
            Ok(resp) => resp.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_required_mode_accepts_valid_token() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
        let token = jwt::generate_token(99, Role::User).unwrap();
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/p")
                    .wrap(JwtAuthMiddleware::required())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/p")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "99");
    }

    #[actix_web::test]
    async fn test_optional_mode_reports_bad_token_to_required_extractor() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/o")
                    .wrap(JwtAuthMiddleware::optional())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/o")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "INVALID_TOKEN");
    }

    #[actix_web::test]
    async fn test_optional_mode_treats_invalid_token_as_guest() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/o")
                    .wrap(JwtAuthMiddleware::optional())
                    .route("", web::get().to(maybe)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/o")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = actix_test::read_body(resp).await;
        assert!(body.is_empty());
    }
}
