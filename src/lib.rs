pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod storage;
#[cfg(test)]
mod testing;
pub mod workspace;
