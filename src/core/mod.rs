//! Shared types used across the tool system and the protocol layer.

pub mod tool;
