use chrono::Duration;
use faka_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::traffic::TrafficProvisioner;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval` the worker expires pending orders whose payment window has closed, and removes provisioned
/// accounts whose lifetime has ended. The two jobs are independent: a failure in one is logged and does not stop the
/// other, and both are retried on the next tick.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    provisioner: TrafficProvisioner,
    producers: EventProducers,
    payment_window: Duration,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = OrderFlowApi::new(db, provisioner, producers).with_payment_window(payment_window);
        info!("🕰️ Expiry worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running stale order expiry job");
            match api.expire_stale_orders().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running stale order expiry job: {e}");
                },
            }
            trace!("🕰️ Running provisioned account expiry job");
            match api.sweep_expired_accounts().await {
                Ok(0) => trace!("🕰️ No accounts removed"),
                Ok(n) => info!("🕰️ {n} expired accounts removed"),
                Err(e) => {
                    error!("🕰️ Error running provisioned account expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] product: {} contact: {}", o.order_no, o.product_id, o.contact))
        .collect::<Vec<String>>()
        .join(", ")
}
