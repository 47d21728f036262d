//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions. Async handlers get executed
//! concurrently by worker threads and thus don't block execution.

use actix_web::{get, web, HttpResponse, Responder};
use course_payment_engine::{
    db_types::Role,
    notify::LogNotifier,
    traits::SettlementDatabase,
    RecordApi,
    SettlementApi,
};
use log::*;

use crate::{
    auth::{JwtClaims, TokenIssuer},
    data_objects::{
        AuthRequest,
        CartCreateRequest,
        CartSearchRequest,
        CartUpdateStatusRequest,
        JsonResponse,
        PayoutCreateRequest,
        PayoutSearchRequest,
        PayoutUpdateStatusRequest,
        PurchaseSearchRequest,
    },
    errors::{AuthError, ServerError},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(auth => Post "/auth" impl SettlementDatabase);
/// Route handler for the auth endpoint
///
/// Issues an HMAC-signed access token for a verified, non-deleted user. The token carries the user's id and
/// role and is what the ACL middleware checks on every protected route. Identity verification (passwords,
/// SSO and friends) lives upstream of this gateway; token issuance keys off the users table only.
pub async fn auth<A: SettlementDatabase>(
    body: web::Json<AuthRequest>,
    api: web::Data<RecordApi<A>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received auth request");
    let user = api.fetch_active_user(body.user_id).await.map_err(|e| {
        debug!("💻️ Could not authenticate user {}. {e}", body.user_id);
        ServerError::AuthenticationError(AuthError::AccountNotFound)
    })?;
    let access_token = signer.issue_token(user.id, user.role)?;
    debug!("💻️ Issued access token for user {} ({})", user.id, user.role);
    Ok(HttpResponse::Ok().content_type("application/json").body(access_token))
}

//----------------------------------------------   Carts  ----------------------------------------------------
route!(create_cart => Post "/cart" impl SettlementDatabase where requires [Role::Student]);
pub async fn create_cart<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<CartCreateRequest>,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST cart for user {}", claims.sub);
    let cart = api.add_course_to_cart(claims.actor(), body.course_id).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(cart_search => Post "/cart/search" impl SettlementDatabase where requires [Role::Student]);
pub async fn cart_search<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<CartSearchRequest>,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST cart search for user {}", claims.sub);
    let (filter, pagination) = body.into_inner().into_parts();
    let result = api.search_carts(claims.actor(), filter, pagination).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(cart_update_status => Put "/cart/update-status" impl SettlementDatabase
    where requires [Role::Admin, Role::Instructor, Role::Student]);
pub async fn cart_update_status<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<CartUpdateStatusRequest>,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    debug!("💻️ PUT cart update-status to {} for user {} ({} items)", body.status, claims.sub, body.items.len());
    api.update_cart_statuses(claims.actor(), body.status, &body.items).await?;
    let message = format!("{} cart item(s) moved to {}", body.items.len(), body.status);
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

route!(delete_cart => Delete "/cart/{id}" impl SettlementDatabase where requires [Role::Student]);
pub async fn delete_cart<A: SettlementDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    let cart_id = path.into_inner();
    debug!("💻️ DELETE cart {cart_id} for user {}", claims.sub);
    api.delete_cart(cart_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Cart deleted.")))
}

//----------------------------------------------   Payouts  ----------------------------------------------------
route!(create_payout => Post "/payout" impl SettlementDatabase where requires [Role::Admin, Role::Instructor]);
pub async fn create_payout<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<PayoutCreateRequest>,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    debug!("💻️ POST payout by user {} over {} purchase(s)", claims.sub, body.purchase_ids.len());
    let payout = api.create_payout(claims.actor(), body.instructor_id, body.purchase_ids).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(payout_update_status => Put "/payout/update-status/{id}" impl SettlementDatabase
    where requires [Role::Admin, Role::Instructor]);
pub async fn payout_update_status<A: SettlementDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<PayoutUpdateStatusRequest>,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    let payout_id = path.into_inner();
    let body = body.into_inner();
    debug!("💻️ PUT payout {payout_id} update-status to {} by user {}", body.status, claims.sub);
    let payout = api.update_payout_status(claims.actor(), payout_id, body.status, body.comment.as_deref()).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(payout_history => Get "/payout/history" impl SettlementDatabase where requires [Role::Instructor]);
/// The acting instructor's own payout history, newest first.
pub async fn payout_history<A: SettlementDatabase>(
    claims: JwtClaims,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET payout history for user {}", claims.sub);
    let history = api.payout_history(claims.actor()).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(payout_search => Post "/payout/search" impl SettlementDatabase where requires [Role::Admin, Role::Instructor]);
pub async fn payout_search<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<PayoutSearchRequest>,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST payout search for user {}", claims.sub);
    let (filter, pagination) = body.into_inner().into_parts();
    let result = api.search_payouts(claims.actor(), filter, pagination).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Purchases  ----------------------------------------------------
route!(purchase_search => Post "/purchase/search" impl SettlementDatabase
    where requires [Role::Admin, Role::Instructor]);
pub async fn purchase_search<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<PurchaseSearchRequest>,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST purchase search for user {}", claims.sub);
    let (filter, pagination) = body.into_inner().into_parts();
    let result = api.search_purchases(claims.actor(), filter, pagination).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(purchase_search_for_student => Post "/purchase/search-for-student" impl SettlementDatabase
    where requires [Role::Student]);
pub async fn purchase_search_for_student<A: SettlementDatabase>(
    claims: JwtClaims,
    body: web::Json<PurchaseSearchRequest>,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST purchase search (student) for user {}", claims.sub);
    let (filter, pagination) = body.into_inner().into_parts();
    let result = api.search_purchases(claims.actor(), filter, pagination).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Ledger  ----------------------------------------------------
route!(setting => Get "/setting" impl SettlementDatabase where requires [Role::Admin]);
pub async fn setting<A: SettlementDatabase>(
    claims: JwtClaims,
    api: web::Data<RecordApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET setting for admin {}", claims.sub);
    let snapshot = api.ledger_snapshot().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

route!(migrate_setting => Get "/migrate/setting" impl SettlementDatabase where requires [Role::Admin]);
pub async fn migrate_setting<A: SettlementDatabase>(
    claims: JwtClaims,
    api: web::Data<SettlementApi<A, LogNotifier>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET migrate setting by admin {}", claims.sub);
    let setting = api.bootstrap_ledger().await?;
    Ok(HttpResponse::Ok().json(setting))
}
