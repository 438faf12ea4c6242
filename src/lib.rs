pub mod classifier;
pub mod conditions;
pub mod config;
pub mod connect;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod journal;
pub mod levels;
pub mod mtf_analysis;
pub mod notify;
pub mod patterns;
pub mod policy;
pub mod resolver;
pub mod scanner;
pub mod sources;
pub mod targets;
pub mod tracker;
pub mod types;
pub mod validation;
