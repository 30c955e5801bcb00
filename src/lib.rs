//! MATLAB Bridge Library
//!
//! This library provides the core components for the MATLAB bridge
//! subprocess:
//!
//! - `engine` - engine seam: the `Engine` trait and the PyO3-backed
//!   `MatlabEngine` driving the `matlab.engine` Python binding
//! - `figures` - per-request staging directories, the figure capture
//!   script, and harvesting of saved figures into transport artifacts
//! - `protocol` - line-delimited JSON wire types shared with the parent
//! - `session` - readiness signaling and the blocking command loop
//!
//! # Session Protocol
//!
//! The bridge speaks newline-delimited JSON over stdin/stdout:
//!
//! ```ignore
//! use std::io;
//! use matlab_bridge::{engine::MatlabEngine, session};
//!
//! let mut engine = MatlabEngine::start()?;
//! let mut out = io::stdout().lock();
//! session::announce_ready(&mut out)?;
//! session::run(&mut engine, io::stdin().lock(), &mut out)?;
//! ```

pub mod engine;
pub mod figures;
pub mod protocol;
pub mod session;
