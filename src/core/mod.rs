//! # Core Wire Components
//!
//! Low-level encodings shared by the master server client.
//!
//! This module provides the foundation of the master protocol: the compact
//! index integer encoding, length-prefixed strings, and the length-prefixed
//! packet framing used on the TCP stream.
//!
//! ## Components
//! - **Compact**: 1-5 byte signed integer encoding
//! - **Archive**: cursor-style reader and writer over packet payloads
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Text**: Latin-1 / UTF-16 conversion and control character cleanup
//!
//! ## Wire Format
//! ```text
//! [Length(4, little-endian)] [Payload(N)]
//! ```
//!
//! ## Safety Limits
//! - Maximum string length: 10,000 units
//! - Maximum frame size: 1 MiB (configurable)
//! - Length validation before allocation

pub mod archive;
pub mod codec;
pub mod compact;
pub mod text;
