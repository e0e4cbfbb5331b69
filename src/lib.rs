pub mod archive;
pub mod config;
pub mod discover;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod summary;
pub mod table;
