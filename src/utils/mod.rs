//! # Utility Modules
//!
//! Supporting utilities for hashing, logging, timing and text presentation.
//!
//! ## Components
//! - **Digest**: MD5 hex digests for the master server handshake
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]
//! - **Timeout**: Default protocol deadlines and an async timeout wrapper
//! - **Color**: Inline color code stripping and segmentation
//! - **CD key**: Normalization of user-supplied keys

pub mod cdkey;
pub mod color;
pub mod digest;
pub mod logging;
pub mod timeout;

// Re-export the helpers collaborators reach for most
pub use cdkey::normalize_cdkey;
pub use color::{color_segments, strip_colors, ColorSegment};
pub use digest::md5_hex;
