//! Palm Reading Service
//!
//! This library provides the core of the palm-reader service: an in-memory
//! job store with bounded capacity and age-based eviction, a per-job progress
//! bus, and the coordinator that drives uploaded photos through a vision
//! model while streaming progress to any number of observers.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
