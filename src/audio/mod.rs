//! # Audio Input
//!
//! Everything the tester knows about audio: loading the sample files and
//! finding the raw payload inside them. The tester never decodes audio; it
//! only needs to know which bytes to put on the wire.
//!
//! ## Key Components:
//! - **sample**: sample discovery, loading, and expected-label derivation
//! - **wave**: RIFF/WAVE chunk walk that locates the payload offset

pub mod sample;   // Audio samples and their expected transcripts
pub mod wave;     // Payload offset inside RIFF/WAVE containers

pub use sample::AudioSample;
pub use wave::{locate_payload, PayloadLocation};
