//! `tm-engine` - Multi-process tiled matrix multiplication for tilemul.
//!
//! This crate provides:
//! - `ParallelEngine`, which splits the tile grid across worker processes
//!   that compute into a shared result segment
//! - `SharedOperands`, the three named segments holding A, B and C
//! - Launchers for workers as forked children or as separate executables
//! - `run_attached`, the entry point for a worker started by name
//!
//! Workers share only A, B and C. They do not communicate with each other,
//! and the coordinating process reads C only after every worker has exited.

pub mod config;
pub mod engine;
pub mod error;
pub mod launcher;
pub mod operands;
pub mod worker;

pub use config::{EngineConfig, FailurePolicy, DEFAULT_TILE_SIZE};
pub use engine::{ParallelEngine, ParallelRun, WorkerOutcome, WorkerStatus};
pub use error::{EngineError, Result};
pub use launcher::{default_launcher, CommandLauncher, WorkerExit, WorkerHandle, WorkerLauncher};
#[cfg(unix)]
pub use launcher::ForkLauncher;
pub use operands::{SegmentNames, SharedOperands};
pub use worker::{run_attached, WorkerArgs, WorkerJob};
