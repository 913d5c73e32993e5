//! FOOTBALL BETS: Intelligent-contract node for football match predictions
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod storage;
pub mod web;
pub mod llm;
pub mod nondet;
pub mod contracts;
pub mod api;
