pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;

mod ai;
mod auth;
mod extractor;
