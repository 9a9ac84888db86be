//! sifforge-lib: core orchestration for container image builds
//!
//! This crate provides the control logic for building, testing, and
//! publishing a set of container images from declarative definition files:
//! - `resolve`: expand requested names and groups into concrete targets
//! - `gate`: decide whether an existing artifact makes a build unnecessary
//! - `pipeline`: bounded-parallel per-target build/test/push state machine
//! - `backend`: adapter over the external container-build tool

pub mod backend;
pub mod config;
pub mod gate;
pub mod pipeline;
pub mod resolve;
pub mod target;
