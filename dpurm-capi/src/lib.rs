// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

#![warn(missing_docs)]

//! An unstable DPURM C API for display drivers.
//!
//! This crate provides an unstable C API for display drivers written in C.  The driver supplies
//! the capability catalog and a table of hardware callbacks, and calls into the resource manager
//! from its encoder and connector code.

pub mod capi;
mod log;
