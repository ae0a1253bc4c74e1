pub mod ai_guard;
pub mod analytics;
pub mod assessment;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod governance;
pub mod initiative;
pub mod integration;
pub mod organization;
pub mod password;
pub mod pdf;
pub mod project;
pub mod prompt;
pub mod ratelimit;
pub mod rbac;
pub mod report;
pub mod roadmap;
pub mod seed;
pub mod task;
pub mod types;
pub mod user;

pub use error::{ConsultifyError, Result};
