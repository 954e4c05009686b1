// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! The topology catalog.
//!
//! A topology is a named wiring pattern of mixers, compression encoders, interfaces and
//! controllers.  The catalog is a static table.  Lookups by dimensions return the first exact
//! match.

use super::types::{Error, Result, TopologyDims};
use std::fmt;

/// A named topology.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum TopologyName {
    /// No topology.
    #[default]
    None,
    /// One mixer, one interface.
    SinglePipe,
    /// One mixer with compression, one interface.
    SinglePipeDsc,
    /// Two mixers driving two interfaces.
    DualPipe,
    /// Two mixers with compression driving two interfaces.
    DualPipeDsc,
    /// Two mixers merged into one interface.
    DualPipe3dMerge,
    /// Two mixers merged into one compressor and one interface.
    DualPipe3dMergeDsc,
    /// Two mixers and two compressors merged into one interface.
    DualPipeDscMerge,
    /// One mixer split by pingpong buffers into two interfaces.
    PpSplit,
    /// Four mixers merged into two interfaces.
    QuadPipe3dMerge,
    /// Four mixers and four compressors merged into two interfaces.
    QuadPipeDscMerge,
    /// Four mixers merged into two compressors and two interfaces.
    QuadPipe3dMergeDsc,
}

impl TopologyName {
    /// Returns the name userspace sees in the connector property.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyName::None => "none",
            TopologyName::SinglePipe => "sde_singlepipe",
            TopologyName::SinglePipeDsc => "sde_singlepipe_dsc",
            TopologyName::DualPipe => "sde_dualpipe",
            TopologyName::DualPipeDsc => "sde_dualpipe_dsc",
            TopologyName::DualPipe3dMerge => "sde_dualpipemerge",
            TopologyName::DualPipe3dMergeDsc => "sde_dualpipemerge_dsc",
            TopologyName::DualPipeDscMerge => "sde_dualpipe_dscmerge",
            TopologyName::PpSplit => "sde_ppsplit",
            TopologyName::QuadPipe3dMerge => "sde_quadpipemerge",
            TopologyName::QuadPipeDscMerge => "sde_quadpipe_dscmerge",
            TopologyName::QuadPipe3dMergeDsc => "sde_quadpipe_3dmerge_dsc",
        }
    }
}

impl TryFrom<u32> for TopologyName {
    type Error = Error;

    fn try_from(val: u32) -> Result<Self> {
        TOPOLOGIES
            .iter()
            .map(|def| def.name)
            .find(|name| *name as u32 == val)
            .ok_or(Error::User)
    }
}

impl fmt::Display for TopologyName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the topology catalog.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TopologyDef {
    /// The topology name.
    pub name: TopologyName,
    /// Required layer mixers.
    pub num_lm: u32,
    /// Required compression encoders.
    pub num_comp_enc: u32,
    /// Required interfaces.
    pub num_intf: u32,
    /// Required controllers.
    pub num_ctl: u32,
    /// Whether the controllers must support split display.
    pub needs_split_display: bool,
}

impl TopologyDef {
    const fn new(
        name: TopologyName,
        num_lm: u32,
        num_comp_enc: u32,
        num_intf: u32,
        num_ctl: u32,
        needs_split_display: bool,
    ) -> Self {
        Self {
            name,
            num_lm,
            num_comp_enc,
            num_intf,
            num_ctl,
            needs_split_display,
        }
    }

    fn matches(&self, dims: &TopologyDims) -> bool {
        self.num_lm == dims.num_lm
            && self.num_comp_enc == dims.num_enc
            && self.num_intf == dims.num_intf
    }

    /// Returns a copy with `needs_split_display` forced.
    pub(crate) fn with_split_display(mut self, needs_split_display: bool) -> Self {
        self.needs_split_display = needs_split_display;
        self
    }
}

// the order matters for first-match-wins lookups
const TOPOLOGIES: [TopologyDef; 12] = [
    TopologyDef::new(TopologyName::None, 0, 0, 0, 0, false),
    TopologyDef::new(TopologyName::SinglePipe, 1, 0, 1, 1, false),
    TopologyDef::new(TopologyName::SinglePipeDsc, 1, 1, 1, 1, false),
    TopologyDef::new(TopologyName::DualPipe, 2, 0, 2, 2, true),
    TopologyDef::new(TopologyName::DualPipeDsc, 2, 2, 2, 2, true),
    TopologyDef::new(TopologyName::DualPipe3dMerge, 2, 0, 1, 1, false),
    TopologyDef::new(TopologyName::DualPipe3dMergeDsc, 2, 1, 1, 1, false),
    TopologyDef::new(TopologyName::DualPipeDscMerge, 2, 2, 1, 1, false),
    TopologyDef::new(TopologyName::PpSplit, 1, 0, 2, 1, true),
    TopologyDef::new(TopologyName::QuadPipe3dMerge, 4, 0, 2, 2, true),
    TopologyDef::new(TopologyName::QuadPipeDscMerge, 4, 4, 2, 2, true),
    TopologyDef::new(TopologyName::QuadPipe3dMergeDsc, 4, 2, 2, 2, true),
];

/// Returns the catalog row exactly matching the dimensions, if any.
pub fn find(dims: &TopologyDims) -> Option<&'static TopologyDef> {
    TOPOLOGIES.iter().find(|def| def.matches(dims))
}

/// Returns the name of the topology matching the dimensions, or `TopologyName::None`.
pub fn name(dims: &TopologyDims) -> TopologyName {
    find(dims).map_or(TopologyName::None, |def| def.name)
}

/// Looks up a topology by name.
pub fn lookup(name: TopologyName) -> Option<&'static TopologyDef> {
    TOPOLOGIES.iter().find(|def| def.name == name)
}

/// Returns the compression encoder count of a topology, or 0 if the name is unknown.
pub fn num_comp_encoders(name: TopologyName) -> u32 {
    lookup(name).map_or(0, |def| def.num_comp_enc)
}
