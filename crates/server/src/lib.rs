pub mod accounts;
pub mod api;
pub mod auth;
pub mod db;
pub mod eligibility;
pub mod facts;
pub mod generator;
pub mod metrics;
pub mod pdf;
pub mod service;
pub mod state;
pub mod store;
pub mod verification;

#[cfg(test)]
mod testing;
