// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Continuity adoption.
//!
//! When the firmware left a display running, the routing of the controllers is read back so that
//! the first reservation reproduces it.  Readback failures degrade to "nothing discovered".

use super::config::Config;
use super::hw::{Autorefresh, HwBlock, Interrupts, IrqKind};
use super::registry::{HwIter, Registry};
use super::requirements::Requirements;
use super::solver::Hint;
use super::types::{BlockType, Error, PipelineId, Result};
use log::{debug, error, warn};
use std::thread;

/// The decoded routing word of a controller.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CtlTop {
    /// The controller id.
    pub ctl_id: u32,
    /// The raw routing word.
    pub value: u32,
    /// The interface select field.  Non-zero means the controller drives a display.
    pub intf_sel: u32,
    /// The pingpong select field.
    pub pp_sel: u32,
    /// The color processor select field.
    pub dspp_sel: u32,
    /// The mode select field.
    pub mode_sel: u32,
    /// The mixers the controller drives.
    pub mixers: Vec<u32>,
}

impl CtlTop {
    /// Decodes a routing word.
    pub fn decode(ctl_id: u32, value: u32) -> Self {
        Self {
            ctl_id,
            value,
            intf_sel: (value >> 4) & 0xf,
            pp_sel: (value >> 8) & 0x7,
            dspp_sel: (value >> 11) & 0x3,
            mode_sel: (value >> 17) & 0x1,
            mixers: Vec::new(),
        }
    }

    /// Returns true if the controller drives a display.
    pub fn is_active(&self) -> bool {
        self.intf_sel != 0
    }
}

/// The display state discovered at attach.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SplashData {
    /// Whether a display was left running.  Reservations reproduce the discovered state while
    /// this is set.
    pub enabled: bool,
    /// The routing of every controller that could be read.
    pub tops: Vec<CtlTop>,
    /// The active mixers, in discovery order.
    pub lm_ids: Vec<u32>,
    /// The active controllers, in discovery order.
    pub ctl_ids: Vec<u32>,
    /// The active compressors, in discovery order.
    pub dsc_ids: Vec<u32>,
    /// Whether single flush across controllers is enabled.
    pub single_flush: bool,
}

impl SplashData {
    pub(crate) fn hint(&self, reqs: &Requirements) -> Hint<'_> {
        debug!("splash lm_ids {:?}", self.lm_ids);
        if self.lm_ids.len() != reqs.topology.num_lm as usize {
            debug!("configured splash screen LMs != needed LM cnt");
        }
        debug!("splash ctl_ids {:?}", self.ctl_ids);
        debug!("splash dsc_ids {:?}", self.dsc_ids);

        Hint {
            lm_ids: Some(&self.lm_ids),
            ctl_ids: Some(&self.ctl_ids),
            dsc_ids: Some(&self.dsc_ids),
        }
    }
}

fn ctl_mixers(reg: &Registry, hw: &dyn HwBlock, ctl_id: u32) -> Vec<u32> {
    let mut mixers = Vec::new();

    for lm in &reg.catalog().mixers {
        let value = match hw.read_ctl_layers(lm.id) {
            Ok(value) => value,
            Err(err) => {
                warn!("ctl {} failed to read lm {} layers: {}", ctl_id, lm.id, err);
                0
            }
        };

        debug!("ctl[{}]_top --> lm[{}]={:#x}", ctl_id, lm.id, value);
        if value != 0 {
            mixers.push(lm.id);
        }
    }

    mixers
}

/// Reads back the routing of the controllers.
fn discover_ctls(reg: &Registry, data: &mut SplashData) {
    let mut iter = HwIter::new(PipelineId::ANY, BlockType::Ctl);
    while let Some(idx) = reg.advance(&mut iter) {
        let blk = reg.block(BlockType::Ctl, idx);
        let value = match blk.hw.read_ctl_top() {
            Ok(value) => value,
            Err(err) => {
                error!("ctl {} read_ctl_top failed: {}", blk.id, err);
                continue;
            }
        };

        let mut top = CtlTop::decode(blk.id, value);
        debug!(
            "id={},top->{:#x},pp_sel={:#x},dspp_sel={:#x},intf_sel={}",
            blk.id, top.value, top.pp_sel, top.dspp_sel, top.intf_sel
        );

        if top.is_active() {
            top.mixers = ctl_mixers(reg, blk.hw.as_ref(), blk.id);
            data.lm_ids.extend_from_slice(&top.mixers);
            data.ctl_ids.push(blk.id);
            data.enabled = true;
        }

        data.tops.push(top);
    }
}

/// Reads back the active compressors and quiesces auto-refresh on every pingpong.
fn discover_dscs(
    reg: &mut Registry,
    intr: Option<&dyn Interrupts>,
    config: &Config,
) -> Vec<u32> {
    let mut dsc_ids = Vec::new();

    let Some(intr) = intr else {
        error!("hw_intr handler not initialized");
        return dsc_ids;
    };

    let dsc_blocks: Vec<u32> = reg.blocks(BlockType::Dsc).iter().map(|blk| blk.id).collect();

    for idx in 0..reg.blocks(BlockType::Pingpong).len() {
        let blk = reg.block_mut(BlockType::Pingpong, idx);
        let pp_id = blk.id;

        let active = match blk.hw.dsc_status() {
            Ok(active) => active,
            Err(err) => {
                error!("get_dsc_status failed: {}", err);
                return Vec::new();
            }
        };

        debug!("DSC[{}]={}, dsc_cnt = {}", idx, active, dsc_ids.len());
        if active {
            // pingpong n feeds the n-th compressor
            match dsc_blocks.get(idx) {
                Some(&id) => dsc_ids.push(id),
                None => warn!("pp {} has dsc active without a dsc block", pp_id),
            }
        }

        if let Err(err) = autorefresh_disable(blk.hw.as_mut(), pp_id, intr, config) {
            warn!("pp {} autorefresh disable failed: {}", pp_id, err);
        }
    }

    dsc_ids
}

/// Reads back the display state left by the firmware.
pub(crate) fn discover(
    reg: &mut Registry,
    intr: Option<&dyn Interrupts>,
    config: &Config,
) -> SplashData {
    let cat = reg.catalog();
    debug!(
        "mixer_count={}, ctl_count={}, dsc_count={}",
        cat.mixers.len(),
        cat.ctls.len(),
        cat.dscs.len()
    );

    let mut data = SplashData::default();
    discover_ctls(reg, &mut data);

    if !data.enabled {
        return data;
    }

    data.dsc_ids = discover_dscs(reg, intr, config);

    match reg.top().split_flush_status() {
        Ok(single_flush) => data.single_flush = single_flush,
        Err(err) => debug!("split flush status unavailable: {}", err),
    }

    debug!(
        "splash_data: ctl_top_cnt={}, lm_cnt={}, dsc_cnt={} sf={}",
        data.ctl_ids.len(),
        data.lm_ids.len(),
        data.dsc_ids.len(),
        data.single_flush
    );

    data
}

fn clear_irq_status(intr: &dyn Interrupts, irqs: &[Option<u32>]) {
    for irq in irqs.iter().flatten() {
        let status = intr.status(*irq);
        intr.clear(*irq, status);
    }
}

/// Waits for a pingpong-done interrupt that is not followed by another auto-refresh.
fn poll_irq(
    intr: &dyn Interrupts,
    pp_done: Option<u32>,
    autorefresh: Option<u32>,
    config: &Config,
) -> Result<()> {
    let Some(pp_done) = pp_done else {
        return Ok(());
    };

    let mut status = 0;
    for i in 0..config.poll_count() {
        status = intr.status(pp_done);
        if status != 0 {
            debug!("pp_done received i={}, status={:#x}", i, status);

            let refreshing = autorefresh.is_some_and(|irq| intr.status(irq) != 0);
            if !refreshing {
                return Ok(());
            }

            clear_irq_status(intr, &[Some(pp_done), autorefresh]);
        }

        thread::sleep(config.poll_interval);
    }

    debug!("polling timed out. status = {:#x}", status);
    Err(Error::Timeout)
}

fn quiesce(
    pp: &mut dyn HwBlock,
    pp_id: u32,
    intr: &dyn Interrupts,
    config: &Config,
    mut cfg: Autorefresh,
) -> Result<()> {
    let pp_done = intr.irq_index(IrqKind::PingpongDone, pp_id);
    let autorefresh = intr.irq_index(IrqKind::Autorefresh, pp_id);
    debug!(
        "pp_done irq_idx = {:?} autorefresh irq_idx = {:?}",
        pp_done, autorefresh
    );

    cfg.enable = false;
    pp.setup_autorefresh(cfg)?;

    clear_irq_status(intr, &[pp_done, autorefresh]);

    // a fixed number of pp_done polls; the line counts are only logged for diagnosis
    let mut res = Ok(());
    for i in 0..config.settle_retries {
        let before = pp.vsync_info()?;
        res = poll_irq(intr, pp_done, autorefresh, config);
        let after = pp.vsync_info()?;

        debug!(
            "i={}, line count={} -> {}",
            i, before.wr_ptr_line_count, after.wr_ptr_line_count
        );

        if res.is_ok() {
            break;
        }

        thread::sleep(config.settle_delay);
    }

    res
}

/// Disables auto-refresh on a pingpong buffer and waits for the last frame.
fn autorefresh_disable(
    pp: &mut dyn HwBlock,
    pp_id: u32,
    intr: &dyn Interrupts,
    config: &Config,
) -> Result<()> {
    let cfg = match pp.autorefresh() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("autorefresh update api not supported: {}", err);
            return Ok(());
        }
    };

    if !cfg.enable {
        debug!("pp {} autorefresh already disabled", pp_id);
        return Ok(());
    }

    pp.connect_external_te(false)?;
    let res = quiesce(pp, pp_id, intr, config, cfg);
    let te = pp.connect_external_te(true);

    res.and(te)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::VsyncInfo;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    #[test]
    fn test_decode() {
        let top = CtlTop::decode(1, (1 << 17) | (2 << 11) | (5 << 8) | (3 << 4));
        assert_eq!(top.intf_sel, 3);
        assert_eq!(top.pp_sel, 5);
        assert_eq!(top.dspp_sel, 2);
        assert_eq!(top.mode_sel, 1);
        assert!(top.is_active());

        assert!(!CtlTop::decode(0, 0xf00).is_active());
    }

    #[derive(Default)]
    struct Pp {
        autorefresh: Autorefresh,
        te: Vec<bool>,
        line_count: u32,
        vsync_reads: Cell<u32>,
    }

    impl HwBlock for Pp {
        fn autorefresh(&self) -> Result<Autorefresh> {
            Ok(self.autorefresh)
        }

        fn setup_autorefresh(&mut self, cfg: Autorefresh) -> Result<()> {
            self.autorefresh = cfg;
            Ok(())
        }

        fn connect_external_te(&mut self, enable: bool) -> Result<()> {
            self.te.push(enable);
            Ok(())
        }

        fn vsync_info(&self) -> Result<VsyncInfo> {
            self.vsync_reads.set(self.vsync_reads.get() + 1);
            Ok(VsyncInfo {
                rd_ptr_init_val: 0,
                wr_ptr_line_count: self.line_count,
            })
        }
    }

    // irq 0 is pp_done, irq 1 is autorefresh
    struct Intr {
        pp_done: RefCell<Vec<u32>>,
        cleared: RefCell<Vec<u32>>,
    }

    impl Interrupts for Intr {
        fn irq_index(&self, kind: IrqKind, _pingpong: u32) -> Option<u32> {
            match kind {
                IrqKind::PingpongDone => Some(0),
                IrqKind::Autorefresh => Some(1),
            }
        }

        fn status(&self, irq: u32) -> u32 {
            if irq == 0 {
                self.pp_done.borrow_mut().pop().unwrap_or(0)
            } else {
                0
            }
        }

        fn clear(&self, irq: u32, _status: u32) {
            self.cleared.borrow_mut().push(irq);
        }
    }

    fn config() -> Config {
        Config::new()
            .poll_timeout(Duration::from_millis(2))
            .poll_interval(Duration::from_micros(100))
            .settle_delay(Duration::from_micros(100))
    }

    #[test]
    fn test_autorefresh_disable() {
        let mut pp = Pp {
            autorefresh: Autorefresh {
                enable: true,
                frame_count: 1,
            },
            ..Default::default()
        };
        // the first read is consumed by the clear
        let intr = Intr {
            pp_done: RefCell::new(vec![1, 0, 0]),
            cleared: RefCell::new(Vec::new()),
        };

        autorefresh_disable(&mut pp, 0, &intr, &config()).unwrap();
        assert!(!pp.autorefresh.enable);
        assert_eq!(pp.autorefresh.frame_count, 1);
        assert_eq!(pp.te, [false, true]);
        assert_eq!(*intr.cleared.borrow(), [0, 1]);
    }

    #[test]
    fn test_autorefresh_disable_timeout() {
        let mut pp = Pp {
            autorefresh: Autorefresh {
                enable: true,
                frame_count: 1,
            },
            ..Default::default()
        };
        let intr = Intr {
            pp_done: RefCell::new(Vec::new()),
            cleared: RefCell::new(Vec::new()),
        };

        assert_eq!(
            autorefresh_disable(&mut pp, 0, &intr, &config()),
            Err(Error::Timeout)
        );
        // te is reconnected regardless
        assert_eq!(pp.te, [false, true]);
    }

    #[test]
    fn test_settle_retries() {
        let mut pp = Pp {
            autorefresh: Autorefresh {
                enable: true,
                frame_count: 1,
            },
            line_count: 100,
            ..Default::default()
        };
        let intr = Intr {
            pp_done: RefCell::new(Vec::new()),
            cleared: RefCell::new(Vec::new()),
        };
        let config = config().settle_retries(4);

        // a still line count does not end the wait early
        assert_eq!(
            autorefresh_disable(&mut pp, 0, &intr, &config),
            Err(Error::Timeout)
        );
        assert_eq!(pp.vsync_reads.get(), 8);
    }

    #[test]
    fn test_autorefresh_already_disabled() {
        let mut pp = Pp::default();
        let intr = Intr {
            pp_done: RefCell::new(Vec::new()),
            cleared: RefCell::new(Vec::new()),
        };

        autorefresh_disable(&mut pp, 0, &intr, &config()).unwrap();
        assert!(pp.te.is_empty());
    }
}
