//! GroupCache: shared expenses, per-member shares and the debts they leave behind.
//!
//! [`share`], [`balance`] and [`projection`] form the settlement engine. They are
//! pure and synchronous. [`store`] and [`routes`] are the HTTP host around it.

pub mod balance;
pub mod config;
pub mod error;
pub mod projection;
pub mod routes;
pub mod schemas;
pub mod share;
pub mod store;
pub mod validation;
