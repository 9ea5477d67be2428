pub mod cloud;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod table;
