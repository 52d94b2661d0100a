use crate::cache::get_identity_cache;
use crate::get_db_pool;
use crate::identity::{parse_npc_token, IdentityVerifier};
use crate::orm::{npc_actors, users};
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::http::header;
use actix_web::{error, web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use sea_orm::{entity::*, DatabaseConnection};
use std::time::Instant;
use std::{cell::RefCell, rc::Rc, sync::Arc};

/// Owner-id route parameters equal to this are rewritten to the
/// authenticated caller's id before any handler logic runs.
pub const ME_SENTINEL: &str = "me";

/// Client data stored for a single request cycle.
#[derive(Clone, Debug, Default)]
pub struct ClientCtxInner {
    pub client: Option<users::Model>,
    /// An Authorization header was present on the request.
    pub credential_supplied: bool,
    /// The store failed while resolving the credential. Distinct from an
    /// invalid token: this is an internal failure, not the caller's.
    pub resolution_failed: bool,
    pub request_start: Option<Instant>,
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    pub fn get_id(&self) -> Option<String> {
        self.0.borrow().client.as_ref().map(|u| u.id.to_owned())
    }

    pub fn get_user(&self) -> Option<users::Model> {
        self.0.borrow().client.to_owned()
    }

    /// The resolved identity, distinguishing "no credential supplied"
    /// (Ok(None), anonymous where the route allows it) from "credential
    /// supplied but invalid" (hard failure).
    pub fn identity(&self) -> Result<Option<String>, Error> {
        let inner = self.0.borrow();
        if inner.resolution_failed {
            return Err(error::ErrorInternalServerError("identity resolution failed"));
        }
        match &inner.client {
            Some(user) => Ok(Some(user.id.to_owned())),
            None if inner.credential_supplied => {
                Err(error::ErrorUnauthorized("invalid credential"))
            }
            None => Ok(None),
        }
    }

    pub fn require_id(&self) -> Result<String, Error> {
        self.identity()?
            .ok_or_else(|| error::ErrorUnauthorized("authentication required"))
    }

    /// Rewrites the `me` owner-id sentinel to the caller's id. Using `me`
    /// without a valid credential is a hard failure, never an implicit
    /// anonymous lookup.
    pub fn resolve_uid(&self, raw: &str) -> Result<String, Error> {
        if raw == ME_SENTINEL {
            self.require_id()
        } else {
            Ok(raw.to_owned())
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in route parameters.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware { service })
    }
}

pub struct ClientCtxMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Non-UTF8 header values count as supplied-but-malformed.
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().unwrap_or("").to_owned());
        let verifier = req
            .app_data::<Data<Arc<dyn IdentityVerifier>>>()
            .expect("No identity verifier available through web server.")
            .get_ref()
            .clone();
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        let fut = self.service.call(req);

        async move {
            {
                let mut inner = ctx.0.borrow_mut();
                inner.request_start = Some(Instant::now());
                inner.credential_supplied = header.is_some();
            }
            if let Some(raw) = header {
                match resolve_credential(get_db_pool(), &*verifier, &raw).await {
                    Ok(Some(uid)) => {
                        match crate::user::get_or_create_user(get_db_pool(), &uid).await {
                            Ok(user) => ctx.0.borrow_mut().client = Some(user),
                            Err(e) => {
                                log::error!("failed to load user {}: {}", uid, e);
                                ctx.0.borrow_mut().resolution_failed = true;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::error!("credential resolution failed: {}", e);
                        ctx.0.borrow_mut().resolution_failed = true;
                    }
                }
            }
            fut.await
        }
        .boxed_local()
    }
}

/// Resolves a raw Authorization header to a caller id. Ok(None) means
/// the credential is malformed, invalid, or an unregistered actor; a
/// store failure propagates as Err.
async fn resolve_credential(
    db: &DatabaseConnection,
    verifier: &dyn IdentityVerifier,
    raw: &str,
) -> Result<Option<String>, sea_orm::DbErr> {
    let token = match raw.strip_prefix("Bearer ") {
        Some(token) => token.trim(),
        None => return Ok(None),
    };
    if token.is_empty() {
        return Ok(None);
    }

    // Service actors resolve to the acting user with no further
    // verification, but only when the actor is registered.
    if let Some(npc) = parse_npc_token(token) {
        return match npc_actors::Entity::find_by_id(npc.actor_id.to_owned())
            .one(db)
            .await?
        {
            Some(_) => Ok(Some(npc.acting_user_id)),
            None => {
                log::debug!("unregistered npc actor {}", npc.actor_id);
                Ok(None)
            }
        };
    }

    let cache = get_identity_cache();
    if let Some(uid) = cache.get(token).await {
        return Ok(Some(uid));
    }
    match verifier.verify(token).await {
        Ok(uid) => {
            cache.put(token, &uid).await;
            Ok(Some(uid))
        }
        Err(e) => {
            log::debug!("identity token rejected: {}", e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    fn ctx_with(
        client: Option<users::Model>,
        credential_supplied: bool,
        resolution_failed: bool,
    ) -> ClientCtx {
        let ctx = ClientCtx::new();
        {
            let mut inner = ctx.0.borrow_mut();
            inner.client = client;
            inner.credential_supplied = credential_supplied;
            inner.resolution_failed = resolution_failed;
        }
        ctx
    }

    fn user(id: &str) -> users::Model {
        let now = chrono::Utc::now().naive_utc();
        users::Model {
            id: id.to_owned(),
            username: "plum".to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_identity_anonymous_and_resolved() {
        assert_eq!(ctx_with(None, false, false).identity().unwrap(), None);
        assert_eq!(
            ctx_with(Some(user("u1")), true, false).identity().unwrap(),
            Some("u1".to_owned())
        );
    }

    #[test]
    fn test_invalid_credential_is_unauthorized() {
        let err = ctx_with(None, true, false).identity().unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_store_failure_is_internal_not_unauthorized() {
        let err = ctx_with(None, true, true).identity().unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = ctx_with(None, true, true).require_id().unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_me_sentinel_resolution() {
        let ctx = ctx_with(Some(user("u1")), true, false);
        assert_eq!(ctx.resolve_uid("me").unwrap(), "u1");
        assert_eq!(ctx.resolve_uid("other").unwrap(), "other");
        assert!(ctx_with(None, false, false).resolve_uid("me").is_err());
    }
}
