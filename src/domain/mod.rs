//! Core domain types and logic.

pub mod bar;
pub mod error;
pub mod indicator;
pub mod signal;
pub mod position;
pub mod pair_config;
pub mod trade;
pub mod execution;
pub mod portfolio;
pub mod strategy;
pub mod session;
pub mod symbol_data;
pub mod backtest;
pub mod live;
pub mod metrics;
pub mod config_validation;
