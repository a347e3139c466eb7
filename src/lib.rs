pub mod config;
pub mod drivers;
pub mod error;
pub mod ops;
pub mod registry;
pub mod report;
pub mod utils;
