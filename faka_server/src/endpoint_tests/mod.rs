mod admin;
mod helpers;
mod orders;
mod payments;
