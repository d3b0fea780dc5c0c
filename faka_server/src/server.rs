use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use faka_common::Secret;
use faka_engine::{
    events::EventProducers,
    traits::AccountProvisioner,
    CouponApi,
    InventoryApi,
    OrderFlowApi,
    SettingsApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{alerts::create_alert_event_handlers, mail::create_mail_event_handlers, traffic::TrafficProvisioner},
    middleware::ApiKeyMiddlewareFactory,
    routes::{
        health,
        traffic_query,
        BulkCouponsRoute,
        CheckoutRoute,
        CouponValidateRoute,
        CreateCouponRoute,
        EpayNotifyGetRoute,
        EpayNotifyPostRoute,
        ExpireOrdersRoute,
        GetSettingsRoute,
        ImportLicensesRoute,
        ListCouponsRoute,
        ListLicensesRoute,
        ModifyOrderRoute,
        OrderLookupRoute,
        OrderStatusRoute,
        UpdateSettingsRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database {} is ready", config.database_url);
    let handlers = create_mail_event_handlers(db.clone(), config.mail.clone(), config.public_url.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mut producers = handlers.producers();
    handlers.start_handlers().await;
    let alerts = create_alert_event_handlers();
    producers.extend(alerts.producers());
    alerts.start_handlers().await;
    let provisioner =
        TrafficProvisioner::new(config.traffic.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // The worker runs for the lifetime of the server, so its handle is not kept
    let _ = start_expiry_worker(
        db.clone(),
        provisioner.clone(),
        producers.clone(),
        config.payment_window,
        config.sweep_interval,
    );
    let srv = create_server_instance(config, db, provisioner, producers)?;
    srv.await.map_err(|e| ServerError::InitializeError(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provisioner: TrafficProvisioner,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), provisioner.clone(), producers.clone())
            .with_payment_window(config.payment_window);
        let coupon_api = CouponApi::new(db.clone());
        let inventory_api = InventoryApi::new(db.clone());
        let settings_api = SettingsApi::new(db.clone());
        let options = ServerOptions::from_config(&config);
        let admin_key = config.admin_api_key.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("faka::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(coupon_api))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(settings_api))
            .app_data(web::Data::new(config.gateway.clone()))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(provisioner.clone()))
            .configure(move |cfg| configure_routes::<TrafficProvisioner>(cfg, admin_key))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_addr.0.as_str(), bind_addr.1))?
    .run();
    Ok(srv)
}

/// Registers every route of the store. The APIs that the handlers use must already be present as app data.
///
/// Routes under `/admin` require the admin key.
pub fn configure_routes<P>(cfg: &mut ServiceConfig, admin_key: Secret<String>)
where P: AccountProvisioner + 'static {
    // `/orders/query` must be registered before `/orders/{order_no}`, which would otherwise capture it
    let api_scope = web::scope("/api")
        .service(CheckoutRoute::<SqliteDatabase, P, SqliteDatabase>::new())
        .service(OrderLookupRoute::<SqliteDatabase, P>::new())
        .service(OrderStatusRoute::<SqliteDatabase, P>::new())
        .service(CouponValidateRoute::<SqliteDatabase>::new())
        .service(traffic_query)
        .service(EpayNotifyGetRoute::<SqliteDatabase, P, SqliteDatabase>::new())
        .service(EpayNotifyPostRoute::<SqliteDatabase, P, SqliteDatabase>::new());
    let admin_scope = web::scope("/admin")
        .wrap(ApiKeyMiddlewareFactory::new(admin_key))
        .service(ExpireOrdersRoute::<SqliteDatabase, P>::new())
        .service(ModifyOrderRoute::<SqliteDatabase, P>::new())
        .service(ListLicensesRoute::<SqliteDatabase>::new())
        .service(ImportLicensesRoute::<SqliteDatabase>::new())
        .service(ListCouponsRoute::<SqliteDatabase>::new())
        .service(CreateCouponRoute::<SqliteDatabase>::new())
        .service(BulkCouponsRoute::<SqliteDatabase>::new())
        .service(GetSettingsRoute::<SqliteDatabase>::new())
        .service(UpdateSettingsRoute::<SqliteDatabase>::new());
    cfg.service(health).service(api_scope).service(admin_scope);
}
