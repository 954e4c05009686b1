// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! The hardware capability catalog.
//!
//! The catalog describes the hardware blocks a chip has and how they are wired.  It is the input
//! to the registry build-out.  Ids are zero-based and unique within a block type.

use log::warn;

// ids that do not fit in a connect mask are dropped
fn id_mask(what: &str, ids: &[u32]) -> u64 {
    ids.iter().fold(0, |mask, &id| match 1u64.checked_shl(id) {
        Some(bit) => mask | bit,
        None => {
            warn!("{} id {} out of range", what, id);
            mask
        }
    })
}

bitflags::bitflags! {
    /// Layer mixer features.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct MixerFeatures: u32 {
        /// The mixer is reserved for the primary display.
        const PRIMARY_PREF = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Pingpong buffer features.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct PingpongFeatures: u32 {
        /// The pingpong can split its output to two interfaces.
        const SPLIT = 1 << 0;
        /// The pingpong can be the slave of a split.
        const SLAVE = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Controller features.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct CtlFeatures: u32 {
        /// The controller can drive split displays.
        const SPLIT_DISPLAY = 1 << 0;
        /// The controller can drive pingpong split.
        const PINGPONG_SPLIT = 1 << 1;
        /// The controller is reserved for the primary display.
        const PRIMARY_PREF = 1 << 2;
    }
}

/// A layer mixer entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MixerCfg {
    /// Mixer id.
    pub id: u32,
    /// The hardwired color processor, if any.
    pub dspp: Option<u32>,
    /// The hardwired destination scaler, if any.
    pub ds: Option<u32>,
    /// The hardwired pingpong buffer.  Every mixer must have one.
    pub pingpong: Option<u32>,
    /// Mixer features.
    pub features: MixerFeatures,
    /// Bit `n` is set when mixer `n` can be paired with this mixer.
    pub pair_mask: u64,
    /// The maximum line width.
    pub max_width: u32,
}

impl MixerCfg {
    /// Creates a mixer entry wired to a pingpong.
    pub fn new(id: u32, pingpong: u32) -> Self {
        Self {
            id,
            pingpong: Some(pingpong),
            max_width: 2560,
            ..Default::default()
        }
    }

    /// Wires a color processor.
    pub fn dspp(mut self, id: u32) -> Self {
        self.dspp = Some(id);
        self
    }

    /// Wires a destination scaler.
    pub fn ds(mut self, id: u32) -> Self {
        self.ds = Some(id);
        self
    }

    /// Sets the features.
    pub fn features(mut self, features: MixerFeatures) -> Self {
        self.features = features;
        self
    }

    /// Sets the peer mixers.
    pub fn peers(mut self, ids: &[u32]) -> Self {
        self.pair_mask = id_mask("peer", ids);
        self
    }

    /// Sets the maximum line width.
    pub fn max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    pub(crate) fn is_peer(&self, id: u32) -> bool {
        id < u64::BITS && self.pair_mask & (1 << id) != 0
    }
}

/// A pingpong buffer entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PingpongCfg {
    /// Pingpong id.
    pub id: u32,
    /// Pingpong features.
    pub features: PingpongFeatures,
}

impl PingpongCfg {
    /// Creates a pingpong entry.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Sets the features.
    pub fn features(mut self, features: PingpongFeatures) -> Self {
        self.features = features;
        self
    }
}

/// A controller entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CtlCfg {
    /// Controller id.
    pub id: u32,
    /// Controller features.
    pub features: CtlFeatures,
}

impl CtlCfg {
    /// Creates a controller entry.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Sets the features.
    pub fn features(mut self, features: CtlFeatures) -> Self {
        self.features = features;
        self
    }
}

/// A chroma down-sampler entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CdmCfg {
    /// Chroma down-sampler id.
    pub id: u32,
    /// Bit `n` is set when interface `n` can be fed.
    pub intf_connect: u64,
    /// Bit `n` is set when write-back `n` can be fed.
    pub wb_connect: u64,
}

impl CdmCfg {
    /// Creates a chroma down-sampler entry.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Sets the reachable interfaces.
    pub fn intfs(mut self, ids: &[u32]) -> Self {
        self.intf_connect = id_mask("intf", ids);
        self
    }

    /// Sets the reachable write-backs.
    pub fn wbs(mut self, ids: &[u32]) -> Self {
        self.wb_connect = id_mask("wb", ids);
        self
    }
}

/// The physical type of an interface slot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IntfType {
    /// The slot is not populated on this chip.
    #[default]
    None,
    /// MIPI DSI.
    Dsi,
    /// HDMI.
    Hdmi,
    /// DisplayPort.
    Dp,
}

/// An interface entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IntfCfg {
    /// Interface id.
    pub id: u32,
    /// Interface type.
    pub kind: IntfType,
}

impl IntfCfg {
    /// Creates an interface entry.
    pub fn new(id: u32, kind: IntfType) -> Self {
        Self { id, kind }
    }
}

/// The top-level block entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TopCfg {
    /// Whether destination scalers are present.
    pub has_dest_scaler: bool,
}

/// The hardware capability catalog.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// The top-level block.
    pub top: TopCfg,
    /// Layer mixers.
    pub mixers: Vec<MixerCfg>,
    /// Color processor ids.
    pub dspps: Vec<u32>,
    /// Destination scaler ids.
    pub dss: Vec<u32>,
    /// Pingpong buffers.
    pub pingpongs: Vec<PingpongCfg>,
    /// Display stream compressor ids.
    pub dscs: Vec<u32>,
    /// Interfaces.
    pub intfs: Vec<IntfCfg>,
    /// Write-back ids.
    pub wbs: Vec<u32>,
    /// Controllers.
    pub ctls: Vec<CtlCfg>,
    /// Chroma down-samplers.
    pub cdms: Vec<CdmCfg>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets whether destination scalers are present.
    pub fn dest_scaler(mut self, has_dest_scaler: bool) -> Self {
        self.top.has_dest_scaler = has_dest_scaler;
        self
    }

    /// Adds a layer mixer.
    pub fn mixer(mut self, cfg: MixerCfg) -> Self {
        self.mixers.push(cfg);
        self
    }

    /// Adds a color processor.
    pub fn dspp(mut self, id: u32) -> Self {
        self.dspps.push(id);
        self
    }

    /// Adds a destination scaler.
    pub fn ds(mut self, id: u32) -> Self {
        self.dss.push(id);
        self
    }

    /// Adds a pingpong buffer.
    pub fn pingpong(mut self, cfg: PingpongCfg) -> Self {
        self.pingpongs.push(cfg);
        self
    }

    /// Adds a display stream compressor.
    pub fn dsc(mut self, id: u32) -> Self {
        self.dscs.push(id);
        self
    }

    /// Adds an interface.
    pub fn intf(mut self, cfg: IntfCfg) -> Self {
        self.intfs.push(cfg);
        self
    }

    /// Adds a write-back.
    pub fn wb(mut self, id: u32) -> Self {
        self.wbs.push(id);
        self
    }

    /// Adds a controller.
    pub fn ctl(mut self, cfg: CtlCfg) -> Self {
        self.ctls.push(cfg);
        self
    }

    /// Adds a chroma down-sampler.
    pub fn cdm(mut self, cfg: CdmCfg) -> Self {
        self.cdms.push(cfg);
        self
    }

    pub(crate) fn mixer_cfg(&self, id: u32) -> Option<&MixerCfg> {
        self.mixers.iter().find(|cfg| cfg.id == id)
    }

    pub(crate) fn pingpong_cfg(&self, id: u32) -> Option<&PingpongCfg> {
        self.pingpongs.iter().find(|cfg| cfg.id == id)
    }

    pub(crate) fn ctl_cfg(&self, id: u32) -> Option<&CtlCfg> {
        self.ctls.iter().find(|cfg| cfg.id == id)
    }

    pub(crate) fn cdm_cfg(&self, id: u32) -> Option<&CdmCfg> {
        self.cdms.iter().find(|cfg| cfg.id == id)
    }
}
