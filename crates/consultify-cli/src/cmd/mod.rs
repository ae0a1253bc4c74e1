pub mod billing;
pub mod config;
pub mod drd;
pub mod migrate;
pub mod org;
pub mod report;
pub mod seed;
pub mod serve;
pub mod user;
