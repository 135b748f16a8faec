//! Credit-billed image generation backend
//!
//! Uploads are turned into generation jobs on a bounded in-process queue and
//! processed by a fixed pool of workers; a synchronous path generates inline.
//! Every successful generation debits the user's credits and appends a ledger
//! entry.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
