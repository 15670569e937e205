//! Relay services: one per upstream-facing operation.
//!
//! Handlers in [`crate::routes`] only decode HTTP input and encode output;
//! validation, provider calls and error mapping live here.

pub mod chat;
pub mod image;
pub mod upload;

pub use chat::ChatRelay;
pub use image::ImageRelay;
pub use upload::{IncomingImage, UploadAnalyzer};
