// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Hardware objects.
//!
//! The resource manager does not program registers.  It consumes hardware objects created by a
//! `HwFactory`, which owns the register window.  A hardware object is destroyed when it is
//! dropped.
//!
//! Most operations are optional and only used by continuity adoption.  The default
//! implementations return `Error::Unsupported`.

use super::catalog::Catalog;
use super::types::{BlockType, Error, Result};

/// The auto-refresh configuration of a pingpong buffer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Autorefresh {
    /// Whether auto-refresh is enabled.
    pub enable: bool,
    /// The auto-refresh frame count.
    pub frame_count: u32,
}

/// The vsync counters of a pingpong buffer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VsyncInfo {
    /// The read pointer init value.
    pub rd_ptr_init_val: u32,
    /// The write pointer line count.
    pub wr_ptr_line_count: u32,
}

/// A hardware object of a tracked block.
pub trait HwBlock: Send {
    /// Reads the routing word of a controller.
    fn read_ctl_top(&self) -> Result<u32> {
        Error::unsupported()
    }

    /// Reads the blend stage configuration a controller has for a mixer.  Non-zero means the
    /// mixer is active.
    fn read_ctl_layers(&self, _lm: u32) -> Result<u32> {
        Error::unsupported()
    }

    /// Returns whether compression is active on a pingpong buffer.
    fn dsc_status(&self) -> Result<bool> {
        Error::unsupported()
    }

    /// Reads the auto-refresh configuration of a pingpong buffer.
    fn autorefresh(&self) -> Result<Autorefresh> {
        Error::unsupported()
    }

    /// Writes the auto-refresh configuration of a pingpong buffer.
    fn setup_autorefresh(&mut self, _cfg: Autorefresh) -> Result<()> {
        Error::unsupported()
    }

    /// Connects or disconnects the external tear check of a pingpong buffer.
    fn connect_external_te(&mut self, _enable: bool) -> Result<()> {
        Error::unsupported()
    }

    /// Reads the vsync counters of a pingpong buffer.
    fn vsync_info(&self) -> Result<VsyncInfo> {
        Error::unsupported()
    }
}

/// The hardware object of the top-level block.
pub trait HwTop: Send {
    /// Returns whether single flush across controllers is enabled.
    fn split_flush_status(&self) -> Result<bool> {
        Error::unsupported()
    }
}

/// An interrupt source of a pingpong buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IrqKind {
    /// Pingpong done.
    PingpongDone,
    /// Auto-refresh done.
    Autorefresh,
}

/// The interrupt controller, used to quiesce auto-refresh.
pub trait Interrupts {
    /// Looks up the interrupt index of a source on a pingpong buffer.
    fn irq_index(&self, kind: IrqKind, pingpong: u32) -> Option<u32>;

    /// Reads the raw status of an interrupt, ignoring its enable mask.
    fn status(&self, irq: u32) -> u32;

    /// Clears the raw status bits of an interrupt.
    fn clear(&self, irq: u32, status: u32);
}

/// Creates hardware objects.
///
/// A factory owns the register window.  Creation failures abort the registry build-out.
pub trait HwFactory {
    /// Creates the hardware object of the top-level block.
    fn create_top(&self, catalog: &Catalog) -> Result<Box<dyn HwTop>>;

    /// Creates the hardware object of a tracked block.
    fn create_block(&self, kind: BlockType, id: u32, catalog: &Catalog)
        -> Result<Box<dyn HwBlock>>;
}

/// A hardware object without optional operations.
#[derive(Debug, Default)]
pub struct Passive;

impl HwBlock for Passive {}

impl HwTop for Passive {}

/// A factory that creates `Passive` hardware objects.
///
/// This is useful when the registers are programmed elsewhere and continuity adoption is not
/// needed.
#[derive(Debug, Default)]
pub struct PassiveFactory;

impl HwFactory for PassiveFactory {
    fn create_top(&self, _catalog: &Catalog) -> Result<Box<dyn HwTop>> {
        Ok(Box::new(Passive))
    }

    fn create_block(
        &self,
        _kind: BlockType,
        _id: u32,
        _catalog: &Catalog,
    ) -> Result<Box<dyn HwBlock>> {
        Ok(Box::new(Passive))
    }
}
