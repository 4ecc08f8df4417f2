//! Library management service: book catalog, copy pool, issue requests
//! and overdue fines, served over HTTP.

pub mod access;
pub mod catalog;
pub mod circulation;
pub mod config;
pub mod database;
pub mod error;
pub mod fine;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
