pub mod backup;
pub mod config;
pub mod once;
pub mod plan;
pub mod run;
