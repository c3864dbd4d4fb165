//! Core config and errors for vtuber-voice.

pub mod config;
pub mod error;
