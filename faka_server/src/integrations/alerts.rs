//! Operator alerts for orders that need a human.
//!
//! A payment that arrives after its order's window has closed leaves money with the gateway and no goods with the
//! buyer. The order flow expires such orders and publishes an `OrderExpired` event with
//! [`ExpiryReason::LatePayment`]. This hook turns that event into an alert in the server log, with enough detail to
//! refund or fulfil by hand.
use faka_engine::events::{EventHandlers, EventHooks, ExpiryReason, OrderExpiredEvent};
use log::*;

pub const ALERT_EVENT_BUFFER_SIZE: usize = 25;

/// The alert text for an expired order, if it needs one. Orders that simply timed out do not.
pub fn late_payment_alert(event: &OrderExpiredEvent) -> Option<String> {
    match event.reason {
        ExpiryReason::Timeout => None,
        ExpiryReason::LatePayment => {
            let order = &event.order;
            Some(format!(
                "Order [{}] was paid after its payment window closed. {} from {} via {} is unmatched. Refund the buyer \
                 or fulfil the order by hand.",
                order.order_no, order.total_amount, order.contact, order.payment_method
            ))
        },
    }
}

pub fn create_alert_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_expired(|ev| {
        Box::pin(async move {
            match late_payment_alert(&ev) {
                Some(alert) => error!("🚨️ {alert}"),
                None => trace!("🚨️ Order [{}] timed out", ev.order.order_no),
            }
        })
    });
    EventHandlers::new(ALERT_EVENT_BUFFER_SIZE, hooks)
}
