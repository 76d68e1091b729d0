pub mod action;
pub mod actions;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod datastore;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod presenter;

#[cfg(test)]
pub mod testing;
