#![forbid(unsafe_code)]

//! Core model and mass-balance engine for hemp biomass fractionation.
//!
//! This crate provides:
//! - Component and mass record types
//! - The stream and loss ledger
//! - Unit operation rules (split, compose, additive, moisture adjust)
//! - Stage pipelines with up-front wiring validation
//! - Step recording and balance checking
//! - Configuration, logging and report export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod ledger;
pub mod rules;
pub mod pipeline;
pub mod process;
pub mod recorder;
pub mod balance;
pub mod simulation;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use ledger::Ledger;
pub use recorder::{StepLog, StepRecord};
pub use balance::{BalanceSummary, ImbalanceWarning};
pub use simulation::{run, RunReport, Simulation};
