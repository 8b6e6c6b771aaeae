pub mod automation;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod lifecycle;
pub mod pipeline;
pub mod scoring;
pub mod store;
pub mod terminal;
