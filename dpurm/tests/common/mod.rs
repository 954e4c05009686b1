// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use dpurm::{
    Autorefresh, BlockRef, BlockType, Catalog, ConnectorState, ConnectorType, CrtcState, Encoder,
    Error, HwBlock, HwFactory, HwIter, HwResources, HwTop, IntfMode, Interrupts, IrqKind,
    PipelineId, ResourceManager, Result, TopologyControl, TopologyDims, VsyncInfo,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An encoder with a fixed resource report.
#[derive(Clone, Copy, Debug)]
pub struct FakeEncoder {
    pub id: u32,
    pub hw_res: HwResources,
    pub conn: ConnectorState,
}

impl FakeEncoder {
    pub fn new(id: u32, dims: TopologyDims, intfs: &[usize]) -> Self {
        let mut hw_res = HwResources::new().topology(dims);
        for &intf in intfs {
            hw_res = hw_res.intf(intf, IntfMode::Video);
        }

        Self {
            id,
            hw_res,
            conn: ConnectorState::new(id, ConnectorType::DisplayPort),
        }
    }

    pub fn primary(mut self) -> Self {
        self.hw_res = self.hw_res.primary(true);
        self
    }

    pub fn control(mut self, ctrl: TopologyControl) -> Self {
        self.conn = self.conn.topology_control(ctrl);
        self
    }

    pub fn reserve(&self, rm: &ResourceManager, test_only: bool) -> Result<()> {
        rm.reserve(self, &CrtcState::modeset(self.id, 1920), &self.conn, test_only)
    }
}

impl Encoder for FakeEncoder {
    fn id(&self) -> PipelineId {
        PipelineId(self.id)
    }

    fn hw_resources(&self, _conn: &ConnectorState) -> HwResources {
        self.hw_res
    }

    fn connector_state(&self) -> Option<ConnectorState> {
        Some(self.conn)
    }
}

/// Returns the ids of the blocks of a type a pipeline owns.
pub fn owned(rm: &ResourceManager, pipeline: u32, kind: BlockType) -> Vec<u32> {
    let mut ids = Vec::new();

    let mut iter = HwIter::new(PipelineId(pipeline), kind);
    while rm.get_hw(&mut iter) {
        if let Some(BlockRef { id, .. }) = iter.block() {
            ids.push(id);
        }
    }

    ids
}

/// The state a fake factory scripts into the hardware objects it creates.
#[derive(Clone, Debug, Default)]
pub struct Script {
    /// ctl id to routing word
    pub ctl_tops: HashMap<u32, u32>,
    /// ctl id to the mixers it drives
    pub ctl_layers: HashMap<u32, Vec<u32>>,
    /// pingpongs with compression active
    pub dsc_active: HashSet<u32>,
    /// pingpongs with auto-refresh enabled
    pub autorefresh: HashSet<u32>,
    pub single_flush: bool,
}

pub struct FakeBlock {
    kind: BlockType,
    id: u32,
    script: Arc<Script>,
    autorefresh: Autorefresh,
    te: bool,
}

impl HwBlock for FakeBlock {
    fn read_ctl_top(&self) -> Result<u32> {
        if self.kind != BlockType::Ctl {
            return Err(Error::Unsupported);
        }

        Ok(self.script.ctl_tops.get(&self.id).copied().unwrap_or(0))
    }

    fn read_ctl_layers(&self, lm: u32) -> Result<u32> {
        if self.kind != BlockType::Ctl {
            return Err(Error::Unsupported);
        }

        let active = self
            .script
            .ctl_layers
            .get(&self.id)
            .is_some_and(|lms| lms.contains(&lm));

        Ok(if active { 0x7 } else { 0 })
    }

    fn dsc_status(&self) -> Result<bool> {
        if self.kind != BlockType::Pingpong {
            return Err(Error::Unsupported);
        }

        Ok(self.script.dsc_active.contains(&self.id))
    }

    fn autorefresh(&self) -> Result<Autorefresh> {
        Ok(self.autorefresh)
    }

    fn setup_autorefresh(&mut self, cfg: Autorefresh) -> Result<()> {
        self.autorefresh = cfg;
        Ok(())
    }

    fn connect_external_te(&mut self, enable: bool) -> Result<()> {
        self.te = enable;
        Ok(())
    }

    fn vsync_info(&self) -> Result<VsyncInfo> {
        Ok(VsyncInfo {
            rd_ptr_init_val: 0,
            wr_ptr_line_count: 1080,
        })
    }
}

pub struct FakeTop {
    single_flush: bool,
}

impl HwTop for FakeTop {
    fn split_flush_status(&self) -> Result<bool> {
        Ok(self.single_flush)
    }
}

/// A factory creating hardware objects with scripted readback.
#[derive(Clone, Debug, Default)]
pub struct FakeFactory {
    script: Arc<Script>,
}

impl FakeFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
        }
    }
}

impl HwFactory for FakeFactory {
    fn create_top(&self, _catalog: &Catalog) -> Result<Box<dyn HwTop>> {
        Ok(Box::new(FakeTop {
            single_flush: self.script.single_flush,
        }))
    }

    fn create_block(&self, kind: BlockType, id: u32, _catalog: &Catalog) -> Result<Box<dyn HwBlock>> {
        let enable = kind == BlockType::Pingpong && self.script.autorefresh.contains(&id);

        Ok(Box::new(FakeBlock {
            kind,
            id,
            script: self.script.clone(),
            autorefresh: Autorefresh {
                enable,
                frame_count: if enable { 1 } else { 0 },
            },
            te: true,
        }))
    }
}

/// An interrupt controller on which every frame is done.
pub struct FakeInterrupts;

impl Interrupts for FakeInterrupts {
    fn irq_index(&self, kind: IrqKind, pingpong: u32) -> Option<u32> {
        match kind {
            IrqKind::PingpongDone => Some(pingpong * 2),
            IrqKind::Autorefresh => Some(pingpong * 2 + 1),
        }
    }

    fn status(&self, irq: u32) -> u32 {
        if irq % 2 == 0 {
            1
        } else {
            0
        }
    }

    fn clear(&self, _irq: u32, _status: u32) {}
}
