// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

mod common;

use common::{init_logger, owned, FakeEncoder, FakeFactory, FakeInterrupts, Script};
use dpurm::{
    BlockRef, BlockType, Builder, Catalog, Config, CrtcState, CtlCfg, CtlFeatures, IntfCfg,
    IntfType, MixerCfg, PassiveFactory, PingpongCfg, PipelineId, ResourceManager, TopologyDims,
};
use std::sync::Arc;
use std::time::Duration;

// routing word with intf_sel 1
const CTL_TOP_ACTIVE: u32 = 1 << 4;

fn catalog() -> Catalog {
    let mut cat = Catalog::new();
    for id in 0..3 {
        cat = cat
            .mixer(MixerCfg::new(id, id).peers(&[0, 1, 2]))
            .pingpong(PingpongCfg::new(id))
            .ctl(CtlCfg::new(id).features(CtlFeatures::PRIMARY_PREF))
            .dsc(id);
    }

    cat.intf(IntfCfg::new(0, IntfType::Dsi))
        .intf(IntfCfg::new(1, IntfType::Dsi))
}

fn build(script: Script) -> Arc<ResourceManager> {
    let config = Config::new()
        .poll_timeout(Duration::from_millis(1))
        .poll_interval(Duration::from_micros(100))
        .settle_delay(Duration::from_micros(100));

    Builder::new()
        .catalog(catalog())
        .factory(FakeFactory::new(script))
        .config(config)
        .build()
        .unwrap()
}

fn dsc_panel(id: u32) -> FakeEncoder {
    FakeEncoder::new(id, TopologyDims::new(1, 1, 1), &[0]).primary()
}

#[test]
fn adoption_scenario() {
    init_logger();

    let mut script = Script::default();
    script.ctl_tops.insert(0, CTL_TOP_ACTIVE);
    script.ctl_layers.insert(0, vec![0]);
    script.dsc_active.insert(0);
    let rm = build(script);

    assert!(rm.cont_splash_res_init(Some(&FakeInterrupts)));

    let enc = dsc_panel(1);
    enc.reserve(&rm, false).unwrap();
    assert_eq!(owned(&rm, 1, BlockType::Mixer), [0]);
    assert_eq!(owned(&rm, 1, BlockType::Ctl), [0]);
    assert_eq!(owned(&rm, 1, BlockType::Dsc), [0]);
}

#[test]
fn adoption_overrides_free_choice() {
    init_logger();

    // the firmware drives lm 1 from ctl 1 with dsc 1, while block 0 of every type is free
    let mut script = Script::default();
    script.ctl_tops.insert(1, CTL_TOP_ACTIVE | (2 << 8));
    script.ctl_layers.insert(1, vec![1]);
    script.dsc_active.insert(1);
    script.autorefresh.insert(1);
    script.single_flush = true;
    let rm = build(script);

    assert!(rm.cont_splash_res_init(Some(&FakeInterrupts)));

    let data = rm.splash_data();
    assert!(data.enabled);
    assert_eq!(data.lm_ids, [1]);
    assert_eq!(data.ctl_ids, [1]);
    assert_eq!(data.dsc_ids, [1]);
    assert!(data.single_flush);
    assert_eq!(data.tops.len(), 3);
    assert!(!data.tops[0].is_active());
    assert_eq!(data.tops[1].pp_sel, 2);
    assert_eq!(data.tops[1].mixers, [1]);

    // auto-refresh was quiesced and the tear check reconnected
    let pp1 = BlockRef {
        kind: BlockType::Pingpong,
        id: 1,
    };
    let autorefresh = rm.with_hw(pp1, |hw| hw.autorefresh()).unwrap().unwrap();
    assert!(!autorefresh.enable);

    let enc = dsc_panel(1);
    enc.reserve(&rm, false).unwrap();
    assert_eq!(owned(&rm, 1, BlockType::Mixer), [1]);
    assert_eq!(owned(&rm, 1, BlockType::Pingpong), [1]);
    assert_eq!(owned(&rm, 1, BlockType::Ctl), [1]);
    assert_eq!(owned(&rm, 1, BlockType::Dsc), [1]);

    // adoption stays in effect until finished, even for page flips
    enc.reserve(&rm, false).unwrap();
    rm.reserve(&enc, &CrtcState::flip(1), &enc.conn, false)
        .unwrap();
    assert_eq!(owned(&rm, 1, BlockType::Mixer), [1]);

    rm.finish_cont_splash();
    assert!(!rm.splash_data().enabled);

    let other = FakeEncoder::new(2, TopologyDims::new(1, 0, 1), &[1]).primary();
    other.reserve(&rm, false).unwrap();
    assert_eq!(owned(&rm, 2, BlockType::Mixer), [0]);
    assert_eq!(owned(&rm, 2, BlockType::Ctl), [0]);
}

#[test]
fn adoption_requires_primary_display() {
    init_logger();

    let mut script = Script::default();
    script.ctl_tops.insert(0, CTL_TOP_ACTIVE);
    script.ctl_layers.insert(0, vec![0]);
    let rm = build(script);

    assert!(rm.cont_splash_res_init(Some(&FakeInterrupts)));
    assert!(rm.splash_data().dsc_ids.is_empty());

    let secondary = FakeEncoder::new(1, TopologyDims::new(1, 0, 1), &[0]);
    assert!(secondary.reserve(&rm, false).is_err());
    assert_eq!(rm.hw_count(PipelineId(1), BlockType::Mixer), 0);

    let primary = secondary.primary();
    primary.reserve(&rm, false).unwrap();
    assert_eq!(owned(&rm, 1, BlockType::Mixer), [0]);
}

#[test]
fn nothing_discovered() {
    init_logger();

    // no controller drives a display
    let rm = build(Script::default());
    assert!(!rm.cont_splash_res_init(Some(&FakeInterrupts)));
    assert_eq!(rm.splash_data().tops.len(), 3);

    // the hardware objects cannot read back
    let rm = Builder::new()
        .catalog(catalog())
        .factory(PassiveFactory)
        .build()
        .unwrap();
    assert!(!rm.cont_splash_res_init(None));
    assert!(rm.splash_data().tops.is_empty());

    let enc = dsc_panel(1);
    enc.reserve(&rm, false).unwrap();
    assert_eq!(owned(&rm, 1, BlockType::Mixer), [0]);
}

#[test]
fn no_interrupts() {
    init_logger();

    let mut script = Script::default();
    script.ctl_tops.insert(0, CTL_TOP_ACTIVE);
    script.ctl_layers.insert(0, vec![0]);
    script.dsc_active.insert(0);
    let rm = build(script);

    // compressors are not read back without an interrupt controller
    assert!(rm.cont_splash_res_init(None));
    let data = rm.splash_data();
    assert_eq!(data.lm_ids, [0]);
    assert!(data.dsc_ids.is_empty());

    assert!(dsc_panel(1).reserve(&rm, false).is_err());
}
