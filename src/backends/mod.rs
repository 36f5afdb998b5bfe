//! Backends bundled with the crate.

pub mod loopback;

pub use loopback::{LoopbackClient, LoopbackFactory, LoopbackPlatform, LOOPBACK_ID};
