use std::{collections::BTreeMap, fmt::Debug};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderNo, OrderStatusType, Product},
    events::{EventProducers, ExpiryReason, OrderExpiredEvent, OrderPaidEvent},
    helpers::{payment_url, GatewayConfig, PaymentRequest, VerifiedCallback, DEFAULT_CHANNEL, MAX_ORDER_QUANTITY},
    store_api::{
        errors::OrderFlowError,
        order_objects::{CallbackOutcome, CheckoutRequest, CheckoutResult, OrderSummary},
    },
    traits::{AccountProvisioner, FulfilmentResult, ProvisionedCredentials, StorefrontDatabase, StorefrontError},
};

/// How long a buyer has to pay for an order.
pub const DEFAULT_PAYMENT_WINDOW_MINUTES: i64 = 30;
/// The number of orders returned when looking orders up by contact.
pub const LOOKUP_LIMIT: i64 = 20;
/// The payment method recorded when a verified notification does not name its channel.
pub const GATEWAY_PAYMENT_METHOD: &str = "epay";
/// The payment method recorded when an operator marks an order as paid.
pub const MANUAL_PAYMENT_METHOD: &str = "manual";

/// `OrderFlowApi` is the primary API for the order lifecycle. Every path that can pay for an order (gateway
/// notifications and manual fulfilment alike) goes through [`Self::mark_paid`].
pub struct OrderFlowApi<B, P> {
    db: B,
    provisioner: P,
    producers: EventProducers,
    payment_window: Duration,
}

impl<B, P> Debug for OrderFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (window: {}min)", self.payment_window.num_minutes())
    }
}

impl<B, P> OrderFlowApi<B, P> {
    pub fn new(db: B, provisioner: P, producers: EventProducers) -> Self {
        Self { db, provisioner, producers, payment_window: Duration::minutes(DEFAULT_PAYMENT_WINDOW_MINUTES) }
    }

    pub fn with_payment_window(mut self, window: Duration) -> Self {
        self.payment_window = window;
        self
    }

    pub fn payment_window(&self) -> Duration {
        self.payment_window
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> OrderFlowApi<B, P>
where
    B: StorefrontDatabase,
    P: AccountProvisioner,
{
    /// Creates a `Pending` order and the signed gateway URL the buyer should be sent to.
    ///
    /// The coupon, if any, is consumed together with the order. An order that is never paid still uses up its coupon.
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        gateway: &GatewayConfig,
        public_url: &str,
    ) -> Result<CheckoutResult, OrderFlowError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&request.quantity) {
            return Err(OrderFlowError::InvalidInput(format!("Quantity must be between 1 and {MAX_ORDER_QUANTITY}")));
        }
        if request.buyer_contact.trim().is_empty() {
            return Err(OrderFlowError::InvalidInput("A contact address is required".into()));
        }
        let channel = request
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_CHANNEL)
            .to_string();
        let mut new_order = NewOrder::new(request.product_id, request.quantity, &request.buyer_contact, &channel);
        if let Some(code) = request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
            new_order = new_order.with_coupon(code);
        }
        let order = self.db.create_order(new_order).await?;
        let product = self.product_for(&order).await?;
        info!("🔄️📦️ Order [{}] created for {} x{}. Total {}", order.order_no, product.name, order.quantity, order.total_amount);
        let base = public_url.trim_end_matches('/');
        let request = PaymentRequest {
            order_no: order.order_no.clone(),
            name: format!("{} x{}", product.name, order.quantity),
            amount: order.total_amount,
            channel,
            notify_url: format!("{base}/api/payments/epay/notify"),
            return_url: format!("{base}/orders/{}", order.order_no),
        };
        let pay_url = payment_url(gateway, &request).map_err(|e| {
            error!("🔄️📦️ Order [{}] was created, but the payment request could not be signed. {e}", order.order_no);
            e
        })?;
        Ok(CheckoutResult { order_no: order.order_no, total_amount: order.total_amount, pay_url })
    }

    /// Handles an asynchronous payment notification from the gateway.
    ///
    /// The signature is checked before anything else. An unverified notification is rejected without touching any
    /// state. A verified notification for anything but a completed payment is acknowledged and ignored. Replaying the
    /// same notification is safe.
    pub async fn process_payment_callback(
        &self,
        params: &BTreeMap<String, String>,
        gateway: &GatewayConfig,
    ) -> Result<CallbackOutcome, OrderFlowError> {
        let callback = VerifiedCallback::verify(params, gateway).map_err(|e| {
            let order_no = params.get("out_trade_no").map(String::as_str).unwrap_or("<none>");
            warn!("🔐️ Rejected payment notification for order [{order_no}]. {e}");
            e
        })?;
        trace!("🔐️ Payment notification for [{}] verified with {}", callback.order_no, callback.scheme);
        if !callback.is_paid() {
            info!("🔄️💰️ Notification for order [{}] has status {}. Ignoring it.", callback.order_no, callback.trade_status);
            return Ok(CallbackOutcome::Ignored { order_no: callback.order_no, trade_status: callback.trade_status });
        }
        let method = callback.channel.as_deref().unwrap_or(GATEWAY_PAYMENT_METHOD);
        let result = self.mark_paid(&callback.order_no, method).await?;
        if let Some(trade_no) = &callback.trade_no {
            debug!("🔄️💰️ Order [{}] settled by gateway trade {trade_no}", callback.order_no);
        }
        Ok(CallbackOutcome::Processed(result))
    }

    /// Presents a payment for the order. This is the single path to `Paid`, shared by gateway notifications and
    /// manual fulfilment.
    ///
    /// * An order that is already paid is returned untouched.
    /// * An order past its payment window is expired instead. This is logged as an anomaly, since money may have
    ///   moved without goods.
    /// * Otherwise inventory is allocated and the order is paid, atomically. If allocation fails the order keeps its
    ///   status and the error is returned.
    ///
    /// For provisioned products the upstream account is created before the database transaction starts. If the
    /// transaction then does not pay the order, the account is removed again, unless it is recorded against an order.
    pub async fn mark_paid(&self, order_no: &OrderNo, payment_method: &str) -> Result<FulfilmentResult, OrderFlowError> {
        let now = Utc::now();
        let order =
            self.db.fetch_order(order_no).await?.ok_or_else(|| StorefrontError::OrderNotFound(order_no.clone()))?;
        let product = self.product_for(&order).await?;
        let needs_account = product.is_provisioned()
            && order.status == OrderStatusType::Pending
            && !order.is_stale(now, self.payment_window);
        let credentials = if needs_account {
            let creds = self.provisioner.provision(order_no).await.map_err(|e| {
                error!("🔄️💰️ Could not provision an account for paid order [{order_no}]. {e}");
                e
            })?;
            debug!("🔄️💰️ Provisioned account {} for order [{order_no}]", creds.username);
            Some(creds)
        } else {
            None
        };
        let result =
            self.db.fulfil_order(order_no, payment_method, self.payment_window, now, credentials.clone()).await;
        // Concurrent deliveries of one notification provision the same username. The one that loses the race sees
        // `AlreadyPaid` and must leave the winner's account alone.
        let unused = !matches!(result, Ok(FulfilmentResult::Paid { .. }) | Ok(FulfilmentResult::AlreadyPaid { .. }));
        if let Some(creds) = credentials.as_ref().filter(|_| unused) {
            self.withdraw_account(order_no, creds).await;
        }
        let result = result.map_err(|e| {
            error!("🔄️💰️ Payment for order [{order_no}] could not be fulfilled. Manual action is required. {e}");
            e
        })?;
        match &result {
            FulfilmentResult::Paid { order, licenses } => {
                info!("🔄️💰️ Order [{order_no}] is paid via {payment_method}. {} units delivered", licenses.len());
                let event = OrderPaidEvent::new(order.clone(), product, licenses.clone());
                self.producers.publish_order_paid(event).await;
            },
            FulfilmentResult::AlreadyPaid { .. } => {
                debug!("🔄️💰️ Order [{order_no}] was already paid. Nothing to do.");
            },
            FulfilmentResult::Expired { order, newly_expired } => {
                error!(
                    "🔄️💰️ Payment received for order [{order_no}] after its payment window closed. The order is \
                     expired and nothing was delivered. Reconcile {} manually.",
                    order.total_amount
                );
                if *newly_expired {
                    let event = OrderExpiredEvent::new(order.clone(), ExpiryReason::LatePayment);
                    self.producers.publish_order_expired(event).await;
                }
            },
        }
        Ok(result)
    }

    /// Expires every pending order whose payment window has closed. Safe to run at any time, including concurrently.
    pub async fn expire_stale_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        let cutoff = Utc::now() - self.payment_window;
        let expired = self.db.expire_stale_orders(cutoff).await?;
        if !expired.is_empty() {
            info!("🔄️⏰️ {} unpaid orders have expired", expired.len());
        }
        for order in &expired {
            let event = OrderExpiredEvent::new(order.clone(), ExpiryReason::Timeout);
            self.producers.publish_order_expired(event).await;
        }
        Ok(expired)
    }

    /// Removes upstream accounts whose lifetime has ended. The local record is only deleted once the provider has
    /// confirmed the removal, so failures are retried on the next sweep. Failures are logged and do not stop the
    /// sweep. Returns the number of accounts removed.
    pub async fn sweep_expired_accounts(&self) -> Result<usize, OrderFlowError> {
        let accounts = self.db.fetch_expired_traffic_accounts(Utc::now()).await?;
        let mut removed = 0;
        for account in accounts {
            match self.provisioner.deprovision(&account.username).await {
                Ok(true) => match self.db.delete_traffic_account(account.id).await {
                    Ok(()) => {
                        debug!("🔄️⏰️ Account {} has been removed", account.username);
                        removed += 1;
                    },
                    Err(e) => error!("🔄️⏰️ Account {} was removed upstream, but not locally. {e}", account.username),
                },
                Ok(false) => warn!("🔄️⏰️ Provider did not confirm removal of {}. Will retry.", account.username),
                Err(e) => warn!("🔄️⏰️ Could not remove account {}. Will retry. {e}", account.username),
            }
        }
        Ok(removed)
    }

    /// The buyer's view of an order. Codes are withheld unless the order is paid.
    pub async fn order_summary(&self, order_no: &OrderNo) -> Result<OrderSummary, OrderFlowError> {
        let order =
            self.db.fetch_order(order_no).await?.ok_or_else(|| StorefrontError::OrderNotFound(order_no.clone()))?;
        let product = self.product_for(&order).await?;
        let licenses = match order.status {
            OrderStatusType::Paid => self.db.fetch_licenses_for_order(order.id).await?,
            _ => Vec::new(),
        };
        Ok(OrderSummary::new(order, product.name, product.delivery_format, &licenses))
    }

    /// Finds orders by exact order number, or failing that, the most recent orders for a buyer contact.
    pub async fn lookup(&self, query: &str) -> Result<Vec<Order>, OrderFlowError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OrderFlowError::InvalidInput("Enter an order number or contact".into()));
        }
        if let Some(order) = self.db.fetch_order(&OrderNo::from(query)).await? {
            return Ok(vec![order]);
        }
        Ok(self.db.fetch_orders_for_contact(query, LOOKUP_LIMIT).await?)
    }

    /// Records that the buyer has been sent their goods. Returns `false` if that had already happened.
    pub async fn mark_notification_sent(&self, order_no: &OrderNo) -> Result<bool, OrderFlowError> {
        Ok(self.db.mark_email_sent(order_no).await?)
    }

    async fn product_for(&self, order: &Order) -> Result<Product, StorefrontError> {
        self.db.fetch_product(order.product_id).await?.ok_or(StorefrontError::ProductNotFound(order.product_id))
    }

    async fn withdraw_account(&self, order_no: &OrderNo, creds: &ProvisionedCredentials) {
        match self.db.fetch_traffic_account(&creds.username).await {
            Ok(None) => {},
            Ok(Some(account)) => {
                warn!(
                    "🔄️💰️ Provider handed out account {} for order [{order_no}], but it belongs to order #{}. \
                     Leaving it in place.",
                    creds.username, account.order_id
                );
                return;
            },
            Err(e) => {
                error!("🔄️💰️ Could not check whether account {} is in use. Leaving it in place. {e}", creds.username);
                return;
            },
        }
        match self.provisioner.deprovision(&creds.username).await {
            Ok(true) => info!("🔄️💰️ Withdrew account {} since order [{order_no}] was not paid", creds.username),
            Ok(false) => {
                error!("🔄️💰️ Account {} for unpaid order [{order_no}] could not be withdrawn", creds.username)
            },
            Err(e) => error!("🔄️💰️ Account {} for unpaid order [{order_no}] could not be withdrawn. {e}", creds.username),
        }
    }
}
