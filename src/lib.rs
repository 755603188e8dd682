// src/lib.rs

//! tos-radar library: watches legal documents for meaningful changes.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
