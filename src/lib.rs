pub mod app;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod maintenance;
pub mod middleware;
pub mod policy;
pub mod request;
pub mod services;

#[cfg(test)]
pub mod testing;
