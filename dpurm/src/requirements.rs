// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Pipeline requirements.
//!
//! This module defines the view of the display pipeline the resource manager consumes: the
//! encoder, the CRTC state and the connector state.  `Requirements` is derived from them for
//! every reservation attempt.

use super::registry::Registry;
use super::topology::{self, TopologyDef, TopologyName};
use super::types::{Error, HwResources, PipelineId, Result};
use log::{debug, error};

bitflags::bitflags! {
    /// The topology control bits a client sets on a connector.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct TopologyControl: u64 {
        /// Keep the reservation across test-only cycles and releases.
        const RESERVE_LOCK = 1 << 0;
        /// Drop the current reservation before a test-only reservation.
        const RESERVE_CLEAR = 1 << 1;
        /// Request mixers with a color processor.
        const DSPP = 1 << 2;
        /// Request mixers with a destination scaler.
        const DS = 1 << 3;
    }
}

/// The type of a connector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectorType {
    /// MIPI DSI.
    Dsi,
    /// DisplayPort.
    DisplayPort,
    /// HDMI.
    Hdmi,
    /// Embedded DisplayPort.
    Edp,
    /// Virtual.
    Virtual,
    /// Write-back.
    Writeback,
    /// Any other type.
    #[default]
    Other,
}

impl From<u32> for ConnectorType {
    /// Converts a `DRM_MODE_CONNECTOR_*` value.
    fn from(val: u32) -> Self {
        match val {
            10 => ConnectorType::DisplayPort,
            11 | 12 => ConnectorType::Hdmi,
            14 => ConnectorType::Edp,
            15 => ConnectorType::Virtual,
            16 => ConnectorType::Dsi,
            18 => ConnectorType::Writeback,
            _ => ConnectorType::Other,
        }
    }
}

#[cfg(feature = "drm")]
impl From<drm::control::connector::Interface> for ConnectorType {
    fn from(val: drm::control::connector::Interface) -> Self {
        use drm::control::connector::Interface;

        match val {
            Interface::DSI => ConnectorType::Dsi,
            Interface::DisplayPort => ConnectorType::DisplayPort,
            Interface::HDMIA | Interface::HDMIB => ConnectorType::Hdmi,
            Interface::EmbeddedDisplayPort => ConnectorType::Edp,
            Interface::Virtual => ConnectorType::Virtual,
            Interface::Writeback => ConnectorType::Writeback,
            _ => ConnectorType::Other,
        }
    }
}

/// The connector state of a pipeline.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConnectorState {
    /// The connector object id.
    pub connector_id: u32,
    /// The connector type.
    pub kind: ConnectorType,
    /// The topology control property.
    pub topology_control: TopologyControl,
    /// The topology name property.  The resource manager writes it.
    pub topology_name: TopologyName,
}

impl ConnectorState {
    /// Creates a connector state.
    pub fn new(connector_id: u32, kind: ConnectorType) -> Self {
        Self {
            connector_id,
            kind,
            ..Default::default()
        }
    }

    /// Sets the topology control property.
    pub fn topology_control(mut self, ctrl: TopologyControl) -> Self {
        self.topology_control = ctrl;
        self
    }
}

/// The CRTC state of a pipeline.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CrtcState {
    /// The CRTC object id.
    pub crtc_id: u32,
    /// Whether the commit changes the mode.  Page flips do not.
    pub needs_modeset: bool,
    /// The horizontal resolution of the mode.
    pub hdisplay: u32,
}

impl CrtcState {
    /// Creates a CRTC state for a modeset.
    pub fn modeset(crtc_id: u32, hdisplay: u32) -> Self {
        Self {
            crtc_id,
            needs_modeset: true,
            hdisplay,
        }
    }

    /// Creates a CRTC state for a page flip.
    pub fn flip(crtc_id: u32) -> Self {
        Self {
            crtc_id,
            ..Default::default()
        }
    }
}

/// The encoder driving a pipeline.
pub trait Encoder {
    /// Returns the stable id of the encoder.  It identifies the pipeline and must not be
    /// `PipelineId::ANY`.
    fn id(&self) -> PipelineId;

    /// Reports the hardware resources the encoder needs for a connector state.
    fn hw_resources(&self, conn: &ConnectorState) -> HwResources;

    /// Returns the current state of the connector attached to the encoder, if any.
    fn connector_state(&self) -> Option<ConnectorState>;
}

/// The requirements of one reservation attempt.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Requirements {
    pub(crate) top_ctrl: TopologyControl,
    pub(crate) topology: &'static TopologyDef,
    pub(crate) hw_res: HwResources,
}

impl Requirements {
    pub(crate) fn populate(
        reg: &Registry,
        enc: &dyn Encoder,
        crtc: &CrtcState,
        conn: &ConnectorState,
    ) -> Result<Self> {
        let mut top_ctrl = conn.topology_control;
        let hw_res = enc.hw_resources(conn);

        let Some(topology) = topology::find(&hw_res.topology) else {
            error!("invalid topology for the display");
            return Error::user();
        };

        // destination scalers are wired to the mixers of the primary dsi panel
        if !top_ctrl.contains(TopologyControl::DS)
            && reg.catalog().top.has_dest_scaler
            && conn.kind == ConnectorType::Dsi
        {
            top_ctrl |= TopologyControl::DS;
        }

        debug!(
            "top_ctrl: {:#x} num_h_tiles: {}",
            top_ctrl.bits(),
            hw_res.display_num_of_h_tiles
        );
        debug!(
            "num_lm: {} num_ctl: {} topology: {} split_display: {} hdisplay: {} lm_max_width: {}",
            topology.num_lm,
            topology.num_ctl,
            topology.name,
            topology.needs_split_display,
            crtc.hdisplay,
            reg.lm_max_width()
        );

        Ok(Self {
            top_ctrl,
            topology,
            hw_res,
        })
    }

    pub(crate) fn wants_lock(&self) -> bool {
        self.top_ctrl.contains(TopologyControl::RESERVE_LOCK)
    }

    pub(crate) fn wants_clear(&self) -> bool {
        self.top_ctrl.contains(TopologyControl::RESERVE_CLEAR)
    }
}
