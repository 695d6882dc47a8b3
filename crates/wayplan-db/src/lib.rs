//! Persistence for wayplan: PostgreSQL schema, row models, and query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
