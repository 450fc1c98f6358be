pub mod api;
pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod extraction;
pub mod global;
pub mod pipeline;
pub mod session;
pub mod task;
pub mod transcription;
