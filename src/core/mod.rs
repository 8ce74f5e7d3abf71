//! Core types shared across the application
//!
//! This module contains:
//! - Target bitrate selection for the MP3 encoder
//! - Input validation helpers used at selection time

pub mod bitrate;
pub mod validation;

pub use bitrate::Bitrate;
