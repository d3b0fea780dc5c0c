pub mod alerts;
pub mod mail;
pub mod traffic;
