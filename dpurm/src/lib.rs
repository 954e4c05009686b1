// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

#![warn(missing_docs)]

//! DPURM is a display hardware resource manager.
//!
//! This crate provides a library to assign the hardware blocks of a display processing unit to
//! display pipelines.  A pipeline is an encoder, a CRTC and a connector.  The hardware blocks
//! are layer mixers and their hardwired companions, controllers, compressors, chroma
//! down-samplers, interfaces and write-backs.
//!
//! A reservation is divided into 3 steps.  The requirement step matches the dimensions the
//! encoder measures against the topology catalog.  The proposal step tags a self-consistent set
//! of free blocks with a proposed owner.  The commit step either makes the proposal current or
//! discards it, depending on whether the reservation is a test.
//!
//! When the firmware left a display running, `ResourceManager::cont_splash_res_init` reads the
//! routing back so that the first reservation reproduces it.

mod catalog;
mod config;
mod hw;
mod ledger;
mod manager;
mod registry;
mod requirements;
mod solver;
mod splash;
pub mod topology;
mod types;

pub use catalog::*;
pub use config::Config;
pub use hw::*;
pub use manager::*;
pub use registry::HwIter;
pub use requirements::{
    ConnectorState, ConnectorType, CrtcState, Encoder, TopologyControl,
};
pub use splash::{CtlTop, SplashData};
pub use topology::{TopologyDef, TopologyName};
pub use types::*;
