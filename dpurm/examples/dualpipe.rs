// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

use dpurm::{
    BlockType, ConnectorState, ConnectorType, CrtcState, CtlCfg, CtlFeatures, Encoder, HwIter,
    HwResources, IntfCfg, IntfMode, IntfType, MixerCfg, PassiveFactory, PingpongCfg, PipelineId,
    ResourceManager, TopologyDims,
};

struct Panel {
    conn: ConnectorState,
}

impl Encoder for Panel {
    fn id(&self) -> PipelineId {
        PipelineId(1)
    }

    fn hw_resources(&self, _conn: &ConnectorState) -> HwResources {
        HwResources::new()
            .intf(1, IntfMode::Video)
            .intf(2, IntfMode::Video)
            .primary(true)
            .h_tiles(2)
            .topology(TopologyDims::new(2, 0, 2))
    }

    fn connector_state(&self) -> Option<ConnectorState> {
        Some(self.conn)
    }
}

#[cfg(feature = "drm")]
fn connector_type() -> ConnectorType {
    ConnectorType::from(drm::control::connector::Interface::DSI)
}

#[cfg(not(feature = "drm"))]
fn connector_type() -> ConnectorType {
    ConnectorType::Dsi
}

fn print_blocks(rm: &ResourceManager, pipeline: PipelineId) {
    for kind in BlockType::ALL {
        let mut iter = HwIter::new(pipeline, kind);
        while rm.get_hw(&mut iter) {
            if let Some(blk) = iter.block() {
                println!("{}: {}_{}", pipeline, blk.kind, blk.id);
            }
        }
    }
}

fn main() {
    env_logger::init();

    let mut catalog = dpurm::Catalog::new();
    for id in 0..4 {
        catalog = catalog
            .mixer(MixerCfg::new(id, id).peers(&[id ^ 1]))
            .pingpong(PingpongCfg::new(id));
    }
    catalog = catalog
        .ctl(CtlCfg::new(0).features(CtlFeatures::SPLIT_DISPLAY))
        .ctl(CtlCfg::new(1).features(CtlFeatures::SPLIT_DISPLAY))
        .ctl(CtlCfg::new(2))
        .intf(IntfCfg::new(0, IntfType::None))
        .intf(IntfCfg::new(1, IntfType::Dsi))
        .intf(IntfCfg::new(2, IntfType::Dsi));

    let rm = dpurm::Builder::new()
        .catalog(catalog)
        .factory(PassiveFactory)
        .build()
        .unwrap();

    let panel = Panel {
        conn: ConnectorState::new(1, connector_type()),
    };
    let crtc = CrtcState::modeset(1, 2880);

    rm.reserve(&panel, &crtc, &panel.conn, true).unwrap();
    rm.reserve(&panel, &crtc, &panel.conn, false).unwrap();

    println!(
        "topology: {:?}",
        rm.topology(panel.id()).unwrap_or_default()
    );
    print_blocks(&rm, panel.id());

    rm.release(&panel);
}
