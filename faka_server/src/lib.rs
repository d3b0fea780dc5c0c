//! # Faka server
//! This crate hosts the HTTP server for the Faka digital goods store. It is responsible for:
//! * Taking checkouts and sending buyers to the payment gateway.
//! * Receiving payment notifications from the gateway and handing them to the order flow, which allocates the goods.
//! * Showing buyers their orders and, once paid, their codes.
//! * Admin routes for stock, coupons, settings and manual fulfilment.
//! * The background worker that expires unpaid orders and removes lapsed provisioned accounts.
//! * Emailing buyers their codes once an order is paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders`, `/api/orders/query`, `/api/orders/{orderNo}`: checkout, order lookup and order status.
//! * `/api/coupons/validate`: checks a coupon without using it.
//! * `/api/traffic/query`: usage for a provisioned account.
//! * `/api/payments/epay/notify`: the gateway's payment notification (GET or POST).
//! * `/admin/...`: operator routes. These require the `X-API-KEY` header.

pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
