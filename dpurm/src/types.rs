// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Simple types.
//!
//! This module defines simple dpurm-specific types.

use log::warn;
use std::{fmt, result};

/// The error type for resource manager operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A validation error indicating a bad user input.
    #[error("bad user input")]
    User,
    /// No combination of free blocks satisfies the request.  The caller may retry later.
    #[error("not available")]
    NotAvailable,
    /// A block that is fixed at registry build time is missing.
    #[error("internal inconsistency: {0}")]
    Internal(&'static str),
    /// The hardware capability catalog is not usable.
    #[error("bad hardware configuration: {0}")]
    Config(&'static str),
    /// Indicates an unsupported hardware operation.
    #[error("unsupported")]
    Unsupported,
    /// A bounded hardware poll expired.
    #[error("timed out")]
    Timeout,
    /// A hardware-object-specific opaque error code.
    #[error("error code {0}")]
    Code(i32),
}

impl Error {
    pub(crate) fn user<T>() -> Result<T> {
        Err(Error::User)
    }

    pub(crate) fn unavailable<T>() -> Result<T> {
        Err(Error::NotAvailable)
    }

    pub(crate) fn internal<T>(s: &'static str) -> Result<T> {
        Err(Error::Internal(s))
    }

    pub(crate) fn config<T>(s: &'static str) -> Result<T> {
        Err(Error::Config(s))
    }

    /// Returns an `Unsupported` error.  Hardware objects use this for optional operations.
    pub fn unsupported<T>() -> Result<T> {
        Err(Error::Unsupported)
    }
}

/// A specialized `Result` type for resource manager operations.
pub type Result<T> = result::Result<T, Error>;

/// The stable id of a display pipeline.
///
/// This is the id of the encoder that drives the pipeline.  Id 0 is reserved to mean "any
/// pipeline" in iterator filters.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PipelineId(pub u32);

impl PipelineId {
    /// Matches blocks regardless of their owner.
    pub const ANY: PipelineId = PipelineId(0);

    pub(crate) fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl From<u32> for PipelineId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A tracked hardware block type.
///
/// Source pipes, rotators and the top-level block are not tracked.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlockType {
    /// Layer mixer.
    Mixer,
    /// Post-blend color processor.
    Dspp,
    /// Destination scaler.
    Ds,
    /// Controller.
    Ctl,
    /// Chroma down-sampler.
    Cdm,
    /// Pingpong buffer.
    Pingpong,
    /// Display interface.
    Intf,
    /// Write-back engine.
    Wb,
    /// Display stream compressor.
    Dsc,
}

impl BlockType {
    /// The number of tracked block types.
    pub const COUNT: usize = 9;

    /// All tracked block types, in registry order.
    pub const ALL: [BlockType; Self::COUNT] = [
        BlockType::Mixer,
        BlockType::Dspp,
        BlockType::Ds,
        BlockType::Ctl,
        BlockType::Cdm,
        BlockType::Pingpong,
        BlockType::Intf,
        BlockType::Wb,
        BlockType::Dsc,
    ];

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the short name of the block type.
    pub fn name(&self) -> &'static str {
        match self {
            BlockType::Mixer => "lm",
            BlockType::Dspp => "dspp",
            BlockType::Ds => "ds",
            BlockType::Ctl => "ctl",
            BlockType::Cdm => "cdm",
            BlockType::Pingpong => "pp",
            BlockType::Intf => "intf",
            BlockType::Wb => "wb",
            BlockType::Dsc => "dsc",
        }
    }
}

impl TryFrom<u32> for BlockType {
    type Error = Error;

    fn try_from(val: u32) -> Result<Self> {
        Self::ALL.get(val as usize).copied().ok_or(Error::User)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A reference to a tracked hardware block.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlockRef {
    /// The block type.
    pub kind: BlockType,
    /// The block id, unique within its type.
    pub id: u32,
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

/// The mode of an interface or a write-back as reported by an encoder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IntfMode {
    /// Not used by the pipeline.
    #[default]
    None,
    /// Video mode.
    Video,
    /// Command mode.
    Command,
    /// Write-back block mode.
    WbBlock,
    /// Write-back line mode.
    WbLine,
}

/// The hardware block counts a display needs, as measured by its encoder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TopologyDims {
    /// Layer mixer count.
    pub num_lm: u32,
    /// Compression encoder count.
    pub num_enc: u32,
    /// Interface count.
    pub num_intf: u32,
}

impl TopologyDims {
    /// Creates topology dimensions.
    pub fn new(num_lm: u32, num_enc: u32, num_intf: u32) -> Self {
        Self {
            num_lm,
            num_enc,
            num_intf,
        }
    }
}

/// The maximum number of interfaces an encoder can report.
pub const MAX_INTFS: usize = 8;
/// The maximum number of write-backs an encoder can report.
pub const MAX_WBS: usize = 4;

/// The hardware resources an encoder needs for a connector state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HwResources {
    /// Per-interface mode, indexed by interface id.
    pub intfs: [IntfMode; MAX_INTFS],
    /// Per-write-back mode, indexed by write-back id.
    pub wbs: [IntfMode; MAX_WBS],
    /// Whether the active interfaces or write-backs need chroma down-sampling.
    pub needs_cdm: bool,
    /// Whether the display is the primary display.
    pub is_primary: bool,
    /// The number of horizontal tiles of the display.
    pub display_num_of_h_tiles: u32,
    /// The measured topology.
    pub topology: TopologyDims,
}

impl HwResources {
    /// Creates an empty resource report.
    pub fn new() -> Self {
        Default::default()
    }

    /// Marks an interface active.  Ids of `MAX_INTFS` or more are ignored.
    pub fn intf(mut self, id: usize, mode: IntfMode) -> Self {
        match self.intfs.get_mut(id) {
            Some(slot) => *slot = mode,
            None => warn!("intf {} out of range", id),
        }
        self
    }

    /// Marks a write-back active.  Ids of `MAX_WBS` or more are ignored.
    pub fn wb(mut self, id: usize, mode: IntfMode) -> Self {
        match self.wbs.get_mut(id) {
            Some(slot) => *slot = mode,
            None => warn!("wb {} out of range", id),
        }
        self
    }

    /// Sets whether chroma down-sampling is needed.
    pub fn needs_cdm(mut self, needs_cdm: bool) -> Self {
        self.needs_cdm = needs_cdm;
        self
    }

    /// Sets whether this is the primary display.
    pub fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Sets the horizontal tile count.
    pub fn h_tiles(mut self, count: u32) -> Self {
        self.display_num_of_h_tiles = count;
        self
    }

    /// Sets the measured topology.
    pub fn topology(mut self, dims: TopologyDims) -> Self {
        self.topology = dims;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type() {
        for (idx, kind) in BlockType::ALL.iter().enumerate() {
            assert_eq!(kind.index(), idx);
            assert_eq!(BlockType::try_from(idx as u32), Ok(*kind));
        }

        assert_eq!(
            BlockType::try_from(BlockType::COUNT as u32),
            Err(Error::User)
        );
    }

    #[test]
    fn test_pipeline_id() {
        assert!(PipelineId::ANY.is_any());
        assert!(!PipelineId(3).is_any());
        assert_eq!(format!("{}", PipelineId(3)), "e3");
    }

    #[test]
    fn test_hw_resources() {
        let res = HwResources::new()
            .intf(1, IntfMode::Video)
            .wb(0, IntfMode::WbLine)
            .needs_cdm(true)
            .topology(TopologyDims::new(1, 0, 1));

        assert_eq!(res.intfs[0], IntfMode::None);
        assert_eq!(res.intfs[1], IntfMode::Video);
        assert_eq!(res.wbs[0], IntfMode::WbLine);
        assert!(res.needs_cdm);
        assert!(!res.is_primary);
        assert_eq!(res.topology.num_lm, 1);
    }

    #[test]
    fn test_hw_resources_out_of_range() {
        let res = HwResources::new()
            .intf(MAX_INTFS, IntfMode::Video)
            .wb(MAX_WBS, IntfMode::WbLine);

        assert_eq!(res, HwResources::new());
    }
}
