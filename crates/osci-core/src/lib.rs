#![forbid(unsafe_code)]

//! Core types for the OSCI 1.2 transport security library: the error
//! taxonomy, the algorithm-URI registry, namespace constants, and the
//! dialog configuration shared by all other crates.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod ns;

pub use config::{DialogConfig, MemBufferFactory, SwapBuffer, SwapBufferFactory};
pub use error::{Error, Result};
