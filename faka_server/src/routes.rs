//! Request handler definitions for the storefront API, the payment gateway notification and the admin API.
//!
//! Handlers that are more than a line or two go into a separate module. Every handler is async; database and gateway
//! work is awaited, never blocked on.
use std::collections::BTreeMap;

use actix_web::{get, web, HttpResponse, Responder};
use faka_engine::{
    db_types::OrderNo,
    helpers::GatewayConfig,
    order_objects::{
        BulkCouponRequest,
        CallbackOutcome,
        CheckoutRequest,
        CouponCheckRequest,
        CouponRequest,
        LicenseImport,
    },
    traits::{AccountProvisioner, CouponManagement, InventoryManagement, SettingsManagement, StorefrontDatabase},
    CouponApi,
    InventoryApi,
    OrderFlowApi,
    SettingsApi,
    MANUAL_PAYMENT_METHOD,
};
use log::*;
use serde_json::Value;
use traffic_tools::strip_region_suffix;

use crate::{
    config::ServerOptions,
    data_objects::{
        settings_from_json,
        settings_to_json,
        CouponListParams,
        ExpiryResult,
        ImportResult,
        JsonResponse,
        LicenseListParams,
        LookupParams,
        ModifyOrderParams,
        OrderAction,
        TrafficQueryParams,
    },
    errors::ServerError,
    integrations::traffic::TrafficProvisioner,
};

const DEFAULT_COUPON_LIST_LIMIT: i64 = 200;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
//
// `impl A, B` gives the handler one type parameter per bound. `impl [A + B]` gives it a single type parameter that
// satisfies all the bounds.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl [$($bounds:tt)+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)+ + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
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
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/orders" impl StorefrontDatabase, AccountProvisioner, SettingsManagement);
/// Route handler for checkout
///
/// Creates a `Pending` order for the product, consuming the coupon if one is given, and returns the order number
/// together with the signed gateway URL that the buyer should be sent to. The order must be paid within the payment
/// window or it expires.
pub async fn checkout<B, P, S>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, P>>,
    settings: web::Data<SettingsApi<S>>,
    gateway: web::Data<GatewayConfig>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
    S: SettingsManagement,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout for product #{} x{}", request.product_id, request.quantity);
    let gateway = settings.gateway_config(gateway.as_ref()).await?;
    let result = api.checkout(request, &gateway, &options.public_url).await.map_err(|e| {
        debug!("💻️ Checkout failed. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_lookup => Get "/orders/query" impl StorefrontDatabase, AccountProvisioner);
/// Finds orders by exact order number, or failing that, the most recent orders for a buyer contact. Codes are never
/// included.
pub async fn order_lookup<B, P>(
    query: web::Query<LookupParams>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
{
    debug!("💻️ GET order lookup for [{}]", query.q);
    let orders = api.lookup(&query.q).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_status => Get "/orders/{order_no}" impl StorefrontDatabase, AccountProvisioner);
/// The buyer's view of an order. The allocated codes are only present once the order is paid.
pub async fn order_status<B, P>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
{
    let order_no = path.into_inner().parse::<OrderNo>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    debug!("💻️ GET order status for [{order_no}]");
    let summary = api.order_summary(&order_no).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Coupons  ----------------------------------------------------
route!(coupon_validate => Post "/coupons/validate" impl [CouponManagement + StorefrontDatabase]);
/// Checks a coupon against a product without using it up.
pub async fn coupon_validate<B>(
    body: web::Json<CouponCheckRequest>,
    api: web::Data<CouponApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: CouponManagement + StorefrontDatabase,
{
    let request = body.into_inner();
    debug!("💻️ POST coupon validation for product #{}", request.product_id);
    let check = api.validate(&request.code, request.product_id).await?;
    Ok(HttpResponse::Ok().json(check))
}

//----------------------------------------------   Traffic  ----------------------------------------------------
/// Usage figures for a provisioned account, straight from the upstream provider. Buyers may paste the full proxy
/// username, so the routing suffix is removed first.
#[get("/traffic/query")]
pub async fn traffic_query(
    query: web::Query<TrafficQueryParams>,
    provisioner: web::Data<TrafficProvisioner>,
) -> Result<HttpResponse, ServerError> {
    let username = strip_region_suffix(&query.username);
    if username.is_empty() {
        return Err(ServerError::InvalidRequestBody("A username is required".into()));
    }
    debug!("💻️ GET traffic usage for {username}");
    let usage = provisioner.api().query_sub_user(&username).await?;
    match usage {
        Some(usage) => Ok(HttpResponse::Ok().json(usage)),
        None => Err(ServerError::NoRecordFound(format!("No active account named {username}"))),
    }
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(epay_notify_get => Get "/payments/epay/notify" impl StorefrontDatabase, AccountProvisioner, SettingsManagement);
/// Gateway payment notification, delivered as a query string.
pub async fn epay_notify_get<B, P, S>(
    query: web::Query<BTreeMap<String, String>>,
    api: web::Data<OrderFlowApi<B, P>>,
    settings: web::Data<SettingsApi<S>>,
    gateway: web::Data<GatewayConfig>,
) -> HttpResponse
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
    S: SettingsManagement,
{
    trace!("💻️ GET payment notification");
    handle_payment_notification(query.into_inner(), api.as_ref(), settings.as_ref(), gateway.as_ref()).await
}

route!(epay_notify_post => Post "/payments/epay/notify" impl StorefrontDatabase, AccountProvisioner, SettingsManagement);
/// Gateway payment notification, delivered as a form body.
pub async fn epay_notify_post<B, P, S>(
    form: web::Form<BTreeMap<String, String>>,
    api: web::Data<OrderFlowApi<B, P>>,
    settings: web::Data<SettingsApi<S>>,
    gateway: web::Data<GatewayConfig>,
) -> HttpResponse
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
    S: SettingsManagement,
{
    trace!("💻️ POST payment notification");
    handle_payment_notification(form.into_inner(), api.as_ref(), settings.as_ref(), gateway.as_ref()).await
}

/// The gateway expects the literal body `success`. Anything else, including `fail` with a 400, makes it deliver the
/// notification again later, so every outcome that is safe to acknowledge is acknowledged.
pub async fn handle_payment_notification<B, P, S>(
    params: BTreeMap<String, String>,
    api: &OrderFlowApi<B, P>,
    settings: &SettingsApi<S>,
    defaults: &GatewayConfig,
) -> HttpResponse
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
    S: SettingsManagement,
{
    let gateway = match settings.gateway_config(defaults).await {
        Ok(g) => g,
        Err(e) => {
            error!("💻️ Could not load the gateway configuration. {e}");
            return HttpResponse::BadRequest().body("fail");
        },
    };
    match api.process_payment_callback(&params, &gateway).await {
        Ok(CallbackOutcome::Processed(result)) => {
            debug!("💻️ Payment notification for [{}] processed. Status {}", result.order().order_no, result.order().status);
            HttpResponse::Ok().body("success")
        },
        Ok(CallbackOutcome::Ignored { order_no, trade_status }) => {
            debug!("💻️ Payment notification for [{order_no}] acknowledged without action ({trade_status})");
            HttpResponse::Ok().body("success")
        },
        Err(e) => {
            warn!("💻️ Payment notification was not accepted. {e}");
            HttpResponse::BadRequest().body("fail")
        },
    }
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(modify_order => Patch "/orders/{order_no}" impl StorefrontDatabase, AccountProvisioner);
/// Manual operator actions on an order.
///
/// `MARK_PAID` fulfils the order through exactly the same path as a gateway notification: already paid orders are
/// left alone, stale orders are expired, and otherwise inventory is allocated.
pub async fn modify_order<B, P>(
    path: web::Path<String>,
    body: web::Json<ModifyOrderParams>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
{
    let order_no = path.into_inner().parse::<OrderNo>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    match body.action {
        OrderAction::MarkPaid => {
            info!("💻️ Operator requested manual fulfilment of order [{order_no}]");
            let result = api.mark_paid(&order_no, MANUAL_PAYMENT_METHOD).await?;
            Ok(HttpResponse::Ok().json(result))
        },
    }
}

route!(expire_orders => Post "/orders/expire" impl StorefrontDatabase, AccountProvisioner);
/// Runs the stale order sweep immediately, rather than waiting for the expiry worker.
pub async fn expire_orders<B, P>(api: web::Data<OrderFlowApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
{
    debug!("💻️ POST expire stale orders");
    let expired = api.expire_stale_orders().await?;
    let result = ExpiryResult { expired_count: expired.len(), orders: expired.into_iter().map(|o| o.order_no).collect() };
    Ok(HttpResponse::Ok().json(result))
}

route!(list_licenses => Get "/licenses" impl [InventoryManagement + StorefrontDatabase]);
pub async fn list_licenses<B>(
    query: web::Query<LicenseListParams>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: InventoryManagement + StorefrontDatabase,
{
    debug!("💻️ GET available licenses for product #{}", query.product_id);
    let licenses = api.available_licenses(query.product_id).await?;
    Ok(HttpResponse::Ok().json(licenses))
}

route!(import_licenses => Post "/licenses" impl [InventoryManagement + StorefrontDatabase]);
/// Adds codes to a product's pool. Blank lines are dropped.
pub async fn import_licenses<B>(
    body: web::Json<LicenseImport>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: InventoryManagement + StorefrontDatabase,
{
    let LicenseImport { product_id, codes } = body.into_inner();
    debug!("💻️ POST import of {} codes for product #{product_id}", codes.len());
    let licenses = api.import_licenses(product_id, &codes).await?;
    Ok(HttpResponse::Ok().json(ImportResult { product_id, imported: licenses.len() }))
}

route!(list_coupons => Get "/coupons" impl [CouponManagement + StorefrontDatabase]);
pub async fn list_coupons<B>(
    query: web::Query<CouponListParams>,
    api: web::Data<CouponApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: CouponManagement + StorefrontDatabase,
{
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_COUPON_LIST_LIMIT);
    debug!("💻️ GET coupons (limit {limit})");
    let coupons = api.list(limit).await?;
    Ok(HttpResponse::Ok().json(coupons))
}

route!(create_coupon => Post "/coupons" impl [CouponManagement + StorefrontDatabase]);
pub async fn create_coupon<B>(
    body: web::Json<CouponRequest>,
    api: web::Data<CouponApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: CouponManagement + StorefrontDatabase,
{
    debug!("💻️ POST create coupon");
    let coupon = api.create(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(coupon))
}

route!(bulk_coupons => Post "/coupons/bulk" impl [CouponManagement + StorefrontDatabase]);
pub async fn bulk_coupons<B>(
    body: web::Json<BulkCouponRequest>,
    api: web::Data<CouponApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: CouponManagement + StorefrontDatabase,
{
    debug!("💻️ POST generate {} coupons", body.count);
    let coupons = api.bulk_generate(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(coupons))
}

route!(get_settings => Get "/settings" impl SettingsManagement);
pub async fn get_settings<S: SettingsManagement>(api: web::Data<SettingsApi<S>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET settings");
    let settings = api.settings().await?;
    Ok(HttpResponse::Ok().json(settings_to_json(settings)))
}

route!(update_settings => Post "/settings" impl SettingsManagement);
/// Upserts the given settings. Gateway settings take effect on the next request.
pub async fn update_settings<S: SettingsManagement>(
    body: web::Json<BTreeMap<String, Value>>,
    api: web::Data<SettingsApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let settings = settings_from_json(body.into_inner());
    debug!("💻️ POST update {} settings", settings.len());
    let count = api.update_settings(&settings).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{count} settings updated"))))
}
