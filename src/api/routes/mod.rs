//! API route modules.

pub mod voice;
