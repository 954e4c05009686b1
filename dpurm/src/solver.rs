// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! The assignment solver.
//!
//! The solver tags a self-consistent set of blocks with the proposed owner of an in-flight
//! token.  It never touches the current owners.  When it fails, the caller releases the token to
//! drop whatever was proposed.

use super::catalog::{CtlFeatures, MixerFeatures, PingpongFeatures};
use super::ledger::TokenId;
use super::registry::{HwIter, Registry};
use super::requirements::{Requirements, TopologyControl};
use super::topology::{TopologyDef, TopologyName};
use super::types::{BlockType, Error, HwResources, IntfMode, PipelineId, Result};
use log::{debug, error};

/// Ordered id lists the solver must reproduce.  They come from continuity adoption.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Hint<'a> {
    pub(crate) lm_ids: Option<&'a [u32]>,
    pub(crate) ctl_ids: Option<&'a [u32]>,
    pub(crate) dsc_ids: Option<&'a [u32]>,
}

// returns true if the hint has no opinion or expects id at pos
fn hint_allows(ids: Option<&[u32]>, pos: usize, id: u32) -> bool {
    ids.map_or(true, |ids| ids.get(pos) == Some(&id))
}

/// The hardwired companions of a mixer, as registry indices.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Companions {
    dspp: Option<usize>,
    ds: Option<usize>,
    pp: usize,
}

/// The mixer tiers to try in order.  Mixers without a color processor are given away first.
fn mixer_tiers(ctrl: TopologyControl) -> Vec<TopologyControl> {
    if ctrl.contains(TopologyControl::DSPP) {
        vec![ctrl]
    } else {
        vec![ctrl, ctrl | TopologyControl::DSPP]
    }
}

/// The controller tiers to try in order.  Controllers without split display are given away
/// first.
fn ctl_tiers(top: &TopologyDef) -> Vec<TopologyDef> {
    if top.needs_split_display {
        vec![*top]
    } else {
        vec![*top, top.with_split_display(true)]
    }
}

fn tag(reg: &mut Registry, kind: BlockType, idx: usize, tok: TokenId) {
    let blk = reg.block_mut(kind, idx);
    blk.rsvp_nxt = Some(tok);
    debug!("propose {}_{} for rsvp {}", kind, blk.id, tok);
}

fn find_companion(
    reg: &Registry,
    tok: TokenId,
    kind: BlockType,
    id: u32,
    lm: u32,
) -> Option<usize> {
    let Some(idx) = reg.find(kind, id) else {
        debug!("lm {} failed to retrieve {} {}", lm, kind, id);
        return None;
    };

    if reg.block(kind, idx).reserved_by_other(tok) {
        debug!("lm {} {} {} already reserved", lm, kind, id);
        return None;
    }

    Some(idx)
}

/// Checks whether a mixer is eligible and returns its companions.
///
/// When `primary` is given, the mixer must be a peer of it.
fn check_lm(
    reg: &Registry,
    tok: TokenId,
    reqs: &Requirements,
    ctrl: TopologyControl,
    lm: usize,
    primary: Option<usize>,
) -> Result<Option<Companions>> {
    let blk = reg.block(BlockType::Mixer, lm);
    let Some(cfg) = reg.catalog().mixer_cfg(blk.id) else {
        error!("lm {} missing from the catalog", blk.id);
        return Error::internal("mixer without capabilities");
    };
    let display_pref = cfg.features.contains(MixerFeatures::PRIMARY_PREF);

    debug!(
        "check lm {}: dspp {:?} ds {:?} pp {:?} display_pref: {}",
        cfg.id, cfg.dspp, cfg.ds, cfg.pingpong, display_pref
    );

    if let Some(primary) = primary {
        let prim_id = reg.block(BlockType::Mixer, primary).id;
        let is_peer = reg
            .catalog()
            .mixer_cfg(prim_id)
            .is_some_and(|prim| prim.is_peer(cfg.id));
        if !is_peer {
            debug!("lm {} not peer of lm {}", cfg.id, prim_id);
            return Ok(None);
        }
    }

    // mixers preferred by the primary display skip the capability match
    if !display_pref {
        let has_dspp = cfg.dspp.is_some();
        let has_ds = cfg.ds.is_some();
        let want_dspp = ctrl.contains(TopologyControl::DSPP);
        let want_ds = ctrl.contains(TopologyControl::DS);

        let matched = match (want_dspp, want_ds) {
            (true, true) => has_dspp && has_ds,
            (true, false) => has_dspp,
            (false, true) => has_ds,
            (false, false) => !(has_dspp || has_ds),
        };

        if !matched {
            debug!(
                "fail: lm {} req_dspp {} dspp {:?} req_ds {} ds {:?}",
                cfg.id, want_dspp, cfg.dspp, want_ds, cfg.ds
            );
            return Ok(None);
        }
    } else if !reqs.hw_res.is_primary {
        debug!(
            "display preference is not met. is_primary: {} display_pref: {}",
            reqs.hw_res.is_primary, display_pref
        );
        return Ok(None);
    }

    if blk.reserved_by_other(tok) {
        debug!("lm {} already reserved", cfg.id);
        return Ok(None);
    }

    let dspp = match cfg.dspp {
        Some(id) => match find_companion(reg, tok, BlockType::Dspp, id, cfg.id) {
            Some(idx) => Some(idx),
            None => return Ok(None),
        },
        None => None,
    };

    let ds = match cfg.ds {
        Some(id) => match find_companion(reg, tok, BlockType::Ds, id, cfg.id) {
            Some(idx) => Some(idx),
            None => return Ok(None),
        },
        None => None,
    };

    let Some(pp_id) = cfg.pingpong else {
        error!("lm {} without pingpong", cfg.id);
        return Error::internal("mixer without pingpong");
    };
    let Some(pp) = reg.find(BlockType::Pingpong, pp_id) else {
        error!("failed to get pp {} on lm {}", pp_id, cfg.id);
        return Error::internal("pingpong missing");
    };

    if reg.block(BlockType::Pingpong, pp).reserved_by_other(tok) {
        debug!("lm {} pp {} already reserved", cfg.id, pp_id);
        return Ok(None);
    }

    if reqs.topology.name == TopologyName::PpSplit {
        let split = reg
            .catalog()
            .pingpong_cfg(pp_id)
            .is_some_and(|pp_cfg| pp_cfg.features.contains(PingpongFeatures::SPLIT));
        if !split {
            debug!("pp {} doesn't support ppsplit", pp_id);
            return Ok(None);
        }
    }

    Ok(Some(Companions { dspp, ds, pp }))
}

fn find_slave_pp(reg: &Registry, tok: TokenId, picked: &[(usize, Companions)]) -> Option<usize> {
    let mut iter = HwIter::new(PipelineId::ANY, BlockType::Pingpong);
    while let Some(idx) = reg.advance(&mut iter) {
        let blk = reg.block(BlockType::Pingpong, idx);
        let slave = reg
            .catalog()
            .pingpong_cfg(blk.id)
            .is_some_and(|cfg| cfg.features.contains(PingpongFeatures::SLAVE));

        if !slave || blk.reserved_by_other(tok) {
            continue;
        }

        if picked.iter().any(|(_, comp)| comp.pp == idx) {
            continue;
        }

        return Some(idx);
    }

    None
}

/// Reserves the mixers of a topology along with their companions.
fn reserve_lms(
    reg: &mut Registry,
    tok: TokenId,
    reqs: &Requirements,
    ctrl: TopologyControl,
    lm_ids: Option<&[u32]>,
) -> Result<()> {
    let num_lm = reqs.topology.num_lm as usize;
    if num_lm == 0 {
        error!("invalid number of lm: {}", num_lm);
        return Error::user();
    }

    let mut picked: Vec<(usize, Companions)> = Vec::with_capacity(num_lm);

    // find a primary mixer
    let mut iter_i = HwIter::new(PipelineId::ANY, BlockType::Mixer);
    while picked.len() != num_lm {
        let Some(i) = reg.advance(&mut iter_i) else {
            break;
        };
        picked.clear();

        let id = reg.block(BlockType::Mixer, i).id;
        debug!("blk id = {}, lm_ids[0] = {:?}", id, lm_ids.and_then(|ids| ids.first()));
        if !hint_allows(lm_ids, 0, id) {
            continue;
        }

        let Some(comp) = check_lm(reg, tok, reqs, ctrl, i, None)? else {
            continue;
        };
        picked.push((i, comp));

        // find its peers
        let mut iter_j = HwIter::new(PipelineId::ANY, BlockType::Mixer);
        while picked.len() != num_lm {
            let Some(j) = reg.advance(&mut iter_j) else {
                break;
            };
            if j == i {
                continue;
            }

            let id = reg.block(BlockType::Mixer, j).id;
            if !hint_allows(lm_ids, picked.len(), id) {
                continue;
            }

            if let Some(comp) = check_lm(reg, tok, reqs, ctrl, j, Some(i))? {
                picked.push((j, comp));
            }
        }
    }

    if picked.len() != num_lm {
        debug!("unable to find appropriate mixers");
        return Error::unavailable();
    }

    let slave = if reqs.topology.name == TopologyName::PpSplit {
        let Some(idx) = find_slave_pp(reg, tok, &picked) else {
            debug!("unable to find a free slave pingpong");
            return Error::unavailable();
        };
        Some(idx)
    } else {
        None
    };

    for (lm, comp) in picked {
        tag(reg, BlockType::Mixer, lm, tok);
        tag(reg, BlockType::Pingpong, comp.pp, tok);
        if let Some(dspp) = comp.dspp {
            tag(reg, BlockType::Dspp, dspp, tok);
        }
        if let Some(ds) = comp.ds {
            tag(reg, BlockType::Ds, ds, tok);
        }
    }

    if let Some(slave) = slave {
        tag(reg, BlockType::Pingpong, slave, tok);
    }

    Ok(())
}

/// Reserves the controllers of a topology.
fn reserve_ctls(
    reg: &mut Registry,
    tok: TokenId,
    reqs: &Requirements,
    top: &TopologyDef,
    ctl_ids: Option<&[u32]>,
) -> Result<()> {
    let num_ctl = top.num_ctl as usize;
    let mut picked = Vec::with_capacity(num_ctl);

    let mut iter = HwIter::new(PipelineId::ANY, BlockType::Ctl);
    while picked.len() != num_ctl {
        let Some(idx) = reg.advance(&mut iter) else {
            break;
        };

        let blk = reg.block(BlockType::Ctl, idx);
        if blk.reserved_by_other(tok) {
            continue;
        }

        let features = reg
            .catalog()
            .ctl_cfg(blk.id)
            .map_or(CtlFeatures::empty(), |cfg| cfg.features);
        let has_split_display = features.contains(CtlFeatures::SPLIT_DISPLAY);
        let has_ppsplit = features.contains(CtlFeatures::PINGPONG_SPLIT);
        let primary_pref = features.contains(CtlFeatures::PRIMARY_PREF);

        debug!("ctl {} caps {:#x}", blk.id, features.bits());

        // controllers preferred by the primary display skip the feature match
        if !primary_pref && ctl_ids.is_none() {
            if top.needs_split_display != has_split_display {
                continue;
            }

            if top.name == TopologyName::PpSplit && !has_ppsplit {
                continue;
            }
        } else if !(reqs.hw_res.is_primary && primary_pref) {
            debug!(
                "display pref not met. is_primary: {} primary_pref: {}",
                reqs.hw_res.is_primary, primary_pref
            );
            continue;
        }

        debug!(
            "blk id = {}, ctl_ids[{}] = {:?}",
            blk.id,
            picked.len(),
            ctl_ids.and_then(|ids| ids.get(picked.len()))
        );
        if !hint_allows(ctl_ids, picked.len(), blk.id) {
            continue;
        }

        debug!("ctl {} match", blk.id);
        picked.push(idx);
    }

    if picked.len() != num_ctl {
        debug!("unable to find {} ctls", num_ctl);
        return Error::unavailable();
    }

    for idx in picked {
        tag(reg, BlockType::Ctl, idx, tok);
    }

    Ok(())
}

/// Reserves the compression encoders of a topology.
fn reserve_dsc(
    reg: &mut Registry,
    tok: TokenId,
    top: &TopologyDef,
    dsc_ids: Option<&[u32]>,
) -> Result<()> {
    let num_dsc = top.num_comp_enc as usize;
    if num_dsc == 0 {
        return Ok(());
    }

    let mut picked = Vec::with_capacity(num_dsc);

    let mut iter = HwIter::new(PipelineId::ANY, BlockType::Dsc);
    while picked.len() != num_dsc {
        let Some(idx) = reg.advance(&mut iter) else {
            break;
        };

        let blk = reg.block(BlockType::Dsc, idx);
        if blk.reserved_by_other(tok) {
            continue;
        }

        debug!(
            "blk id = {}, dsc_ids[{}] = {:?}",
            blk.id,
            picked.len(),
            dsc_ids.and_then(|ids| ids.get(picked.len()))
        );
        if !hint_allows(dsc_ids, picked.len(), blk.id) {
            continue;
        }

        picked.push(idx);
    }

    if picked.len() != num_dsc {
        error!(
            "couldn't reserve {} dsc blocks for {}",
            num_dsc, tok.pipeline
        );
        return Error::unavailable();
    }

    for idx in picked {
        tag(reg, BlockType::Dsc, idx, tok);
    }

    Ok(())
}

/// Reserves a chroma down-sampler that can feed an interface or a write-back.
fn reserve_cdm(reg: &mut Registry, tok: TokenId, id: u32, kind: BlockType) -> Result<()> {
    let mut found = None;

    let mut iter = HwIter::new(PipelineId::ANY, BlockType::Cdm);
    while let Some(idx) = reg.advance(&mut iter) {
        let blk = reg.block(BlockType::Cdm, idx);
        if blk.reserved_by_other(tok) {
            continue;
        }

        let Some(cfg) = reg.catalog().cdm_cfg(blk.id) else {
            continue;
        };
        let mask = match kind {
            BlockType::Intf => cfg.intf_connect,
            BlockType::Wb => cfg.wb_connect,
            _ => 0,
        };
        let matched = id < u64::BITS && mask & (1 << id) != 0;

        debug!(
            "{} {}, cdm intfs {:#x} wbs {:#x} match {}",
            kind, id, cfg.intf_connect, cfg.wb_connect, matched
        );

        if matched {
            found = Some(idx);
            break;
        }
    }

    let Some(idx) = found else {
        error!("couldn't reserve cdm for {} {}", kind, id);
        return Error::unavailable();
    };

    tag(reg, BlockType::Cdm, idx, tok);

    Ok(())
}

/// Reserves a fixed interface or write-back and, when asked, a chroma down-sampler for it.
fn reserve_intf_or_wb(
    reg: &mut Registry,
    tok: TokenId,
    id: u32,
    kind: BlockType,
    needs_cdm: bool,
) -> Result<()> {
    let mut found = None;

    let mut iter = HwIter::new(PipelineId::ANY, kind);
    while let Some(idx) = reg.advance(&mut iter) {
        let blk = reg.block(kind, idx);
        if blk.id != id {
            continue;
        }

        if blk.reserved_by_other(tok) {
            error!("{} {} already reserved", kind, id);
            return Error::unavailable();
        }

        found = Some(idx);
        break;
    }

    // interfaces and write-backs are fixed at registry build time
    let Some(idx) = found else {
        error!("couldn't find {} {}", kind, id);
        return Error::internal("interface or write-back missing");
    };

    tag(reg, kind, idx, tok);

    if needs_cdm {
        reserve_cdm(reg, tok, id, kind)?;
    }

    Ok(())
}

fn reserve_intf_related_hw(reg: &mut Registry, tok: TokenId, hw_res: &HwResources) -> Result<()> {
    for (id, mode) in hw_res.intfs.iter().enumerate() {
        if *mode == IntfMode::None {
            continue;
        }

        reserve_intf_or_wb(reg, tok, id as u32, BlockType::Intf, hw_res.needs_cdm)?;
    }

    for (id, mode) in hw_res.wbs.iter().enumerate() {
        if *mode == IntfMode::None {
            continue;
        }

        reserve_intf_or_wb(reg, tok, id as u32, BlockType::Wb, hw_res.needs_cdm)?;
    }

    Ok(())
}

/// Proposes a complete assignment for a token.
///
/// Mixers go first, then controllers, interfaces and write-backs, and compressors last.  The
/// first failure aborts the proposal.
pub(crate) fn make_next_rsvp(
    reg: &mut Registry,
    tok: TokenId,
    reqs: &Requirements,
    hint: &Hint,
) -> Result<()> {
    let mut res = Error::unavailable();
    for ctrl in mixer_tiers(reqs.top_ctrl) {
        res = reserve_lms(reg, tok, reqs, ctrl, hint.lm_ids);
        if res != Err(Error::NotAvailable) {
            break;
        }
    }
    if let Err(err) = res {
        error!("unable to find appropriate mixers");
        return Err(err);
    }

    let mut res = Error::unavailable();
    for top in ctl_tiers(reqs.topology) {
        res = reserve_ctls(reg, tok, reqs, &top, hint.ctl_ids);
        if res != Err(Error::NotAvailable) {
            break;
        }
    }
    if let Err(err) = res {
        error!("unable to find appropriate CTL");
        return Err(err);
    }

    reserve_intf_related_hw(reg, tok, &reqs.hw_res)?;

    reserve_dsc(reg, tok, reqs.topology, hint.dsc_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CdmCfg, CtlCfg, IntfCfg, IntfType, MixerCfg, PingpongCfg};
    use crate::hw::PassiveFactory;
    use crate::ledger::Ledger;
    use crate::topology;
    use crate::types::TopologyDims;

    const TOK: TokenId = TokenId {
        seq: 1,
        pipeline: PipelineId(1),
    };
    const OTHER: TokenId = TokenId {
        seq: 2,
        pipeline: PipelineId(2),
    };

    fn reqs(dims: TopologyDims, hw_res: HwResources) -> Requirements {
        Requirements {
            top_ctrl: TopologyControl::empty(),
            topology: topology::find(&dims).unwrap(),
            hw_res: hw_res.topology(dims),
        }
    }

    fn proposed(reg: &Registry, kind: BlockType) -> Vec<u32> {
        reg.blocks(kind)
            .iter()
            .filter(|blk| blk.rsvp_nxt == Some(TOK))
            .map(|blk| blk.id)
            .collect()
    }

    fn own(reg: &mut Registry, kind: BlockType, id: u32) {
        let idx = reg.find(kind, id).unwrap();
        reg.block_mut(kind, idx).rsvp = Some(OTHER);
    }

    // lm 0-1 are plain, lm 2-3 have dspps, all peers of each other
    fn catalog() -> Catalog {
        let mut cat = Catalog::new();
        for id in 0..4 {
            let mut lm = MixerCfg::new(id, id).peers(&[0, 1, 2, 3]);
            if id >= 2 {
                lm = lm.dspp(id - 2);
            }
            cat = cat.mixer(lm).pingpong(PingpongCfg::new(id));
        }

        cat.dspp(0)
            .dspp(1)
            .ctl(CtlCfg::new(0))
            .ctl(CtlCfg::new(1).features(CtlFeatures::SPLIT_DISPLAY))
            .ctl(CtlCfg::new(2).features(CtlFeatures::SPLIT_DISPLAY))
            .intf(IntfCfg::new(0, IntfType::Dsi))
            .intf(IntfCfg::new(1, IntfType::Dsi))
            .wb(0)
            .dsc(0)
            .dsc(1)
            .cdm(CdmCfg::new(0).intfs(&[1]).wbs(&[0]))
    }

    #[test]
    fn test_single_pipe() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );

        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [0]);
        assert_eq!(proposed(&reg, BlockType::Pingpong), [0]);
        assert_eq!(proposed(&reg, BlockType::Dspp), [] as [u32; 0]);
        assert_eq!(proposed(&reg, BlockType::Ctl), [0]);
        assert_eq!(proposed(&reg, BlockType::Intf), [0]);
        // proposals are not current
        assert_eq!(reg.count(PipelineId(1), BlockType::Mixer), 0);
    }

    #[test]
    fn test_dspp_tier() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Mixer, 0);
        own(&mut reg, BlockType::Pingpong, 1);

        let reqs = reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [2]);
        assert_eq!(proposed(&reg, BlockType::Dspp), [0]);

        // both tiers exhausted
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        for id in 0..4 {
            own(&mut reg, BlockType::Mixer, id);
        }
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::NotAvailable)
        );
        assert!(reg.all_blocks().all(|blk| blk.rsvp_nxt.is_none()));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(
            mixer_tiers(TopologyControl::empty()),
            [TopologyControl::empty(), TopologyControl::DSPP]
        );
        assert_eq!(
            mixer_tiers(TopologyControl::DSPP | TopologyControl::DS),
            [TopologyControl::DSPP | TopologyControl::DS]
        );

        let top = topology::lookup(TopologyName::SinglePipe).unwrap();
        let tiers = ctl_tiers(top);
        assert_eq!(tiers.len(), 2);
        assert!(!tiers[0].needs_split_display);
        assert!(tiers[1].needs_split_display);

        let top = topology::lookup(TopologyName::DualPipe).unwrap();
        assert_eq!(ctl_tiers(top), [*top]);
    }

    #[test]
    fn test_ctl_fallback() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Ctl, 0);

        let reqs = reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Ctl), [1]);
    }

    #[test]
    fn test_check_lm_companion_busy() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Dspp, 0);

        let reqs = reqs(TopologyDims::new(1, 0, 1), HwResources::new());
        let ctrl = TopologyControl::DSPP;
        let lm2 = reg.find(BlockType::Mixer, 2).unwrap();
        let lm3 = reg.find(BlockType::Mixer, 3).unwrap();
        assert_eq!(check_lm(&reg, TOK, &reqs, ctrl, lm2, None), Ok(None));

        let comp = check_lm(&reg, TOK, &reqs, ctrl, lm3, None).unwrap().unwrap();
        assert_eq!(comp.dspp, reg.find(BlockType::Dspp, 1));
        assert_eq!(comp.pp, reg.find(BlockType::Pingpong, 3).unwrap());

        // plain mixers are rejected when a dspp is requested
        let lm0 = reg.find(BlockType::Mixer, 0).unwrap();
        assert_eq!(check_lm(&reg, TOK, &reqs, ctrl, lm0, None), Ok(None));
    }

    #[test]
    fn test_primary_pref() {
        let cat = Catalog::new()
            .mixer(MixerCfg::new(0, 0).features(MixerFeatures::PRIMARY_PREF))
            .mixer(MixerCfg::new(1, 1))
            .pingpong(PingpongCfg::new(0))
            .pingpong(PingpongCfg::new(1))
            .ctl(CtlCfg::new(0).features(CtlFeatures::PRIMARY_PREF))
            .ctl(CtlCfg::new(1))
            .intf(IntfCfg::new(0, IntfType::Dsi));
        let hw_res = HwResources::new().intf(0, IntfMode::Command);

        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        let secondary = reqs(TopologyDims::new(1, 0, 1), hw_res);
        make_next_rsvp(&mut reg, TOK, &secondary, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [1]);
        assert_eq!(proposed(&reg, BlockType::Ctl), [1]);

        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        let primary = reqs(TopologyDims::new(1, 0, 1), hw_res.primary(true));
        make_next_rsvp(&mut reg, TOK, &primary, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [0]);
        assert_eq!(proposed(&reg, BlockType::Ctl), [0]);
    }

    #[test]
    fn test_peers() {
        let cat = Catalog::new()
            .mixer(MixerCfg::new(0, 0).peers(&[2]))
            .mixer(MixerCfg::new(1, 1).peers(&[]))
            .mixer(MixerCfg::new(2, 2).peers(&[0]))
            .pingpong(PingpongCfg::new(0))
            .pingpong(PingpongCfg::new(1))
            .pingpong(PingpongCfg::new(2))
            .ctl(CtlCfg::new(0))
            .intf(IntfCfg::new(0, IntfType::Dsi));
        let reqs = reqs(
            TopologyDims::new(2, 0, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );

        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [0, 2]);

        // lm 1 has no peers
        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Mixer, 2);
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::NotAvailable)
        );
    }

    #[test]
    fn test_ppsplit() {
        let cat = Catalog::new()
            .mixer(MixerCfg::new(0, 0))
            .pingpong(PingpongCfg::new(0).features(PingpongFeatures::SPLIT))
            .pingpong(PingpongCfg::new(1).features(PingpongFeatures::SLAVE))
            .ctl(CtlCfg::new(0).features(CtlFeatures::SPLIT_DISPLAY | CtlFeatures::PINGPONG_SPLIT))
            .intf(IntfCfg::new(0, IntfType::Dsi))
            .intf(IntfCfg::new(1, IntfType::Dsi));
        let reqs = reqs(
            TopologyDims::new(1, 0, 2),
            HwResources::new()
                .intf(0, IntfMode::Command)
                .intf(1, IntfMode::Command),
        );
        assert_eq!(reqs.topology.name, TopologyName::PpSplit);

        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Pingpong), [0, 1]);

        let mut reg = Registry::new(&cat, &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Pingpong, 1);
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::NotAvailable)
        );
        assert!(reg.all_blocks().all(|blk| blk.rsvp_nxt.is_none()));
    }

    #[test]
    fn test_hint() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs(
            TopologyDims::new(1, 1, 1),
            HwResources::new().intf(0, IntfMode::Command).primary(true),
        );
        let hint = Hint {
            lm_ids: Some(&[1]),
            ctl_ids: None,
            dsc_ids: Some(&[1]),
        };

        make_next_rsvp(&mut reg, TOK, &reqs, &hint).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [1]);
        assert_eq!(proposed(&reg, BlockType::Dsc), [1]);

        // the hinted mixer is busy
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Mixer, 1);
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &hint),
            Err(Error::NotAvailable)
        );
    }

    #[test]
    fn test_intf_wb_cdm() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().wb(0, IntfMode::WbLine).needs_cdm(true),
        );
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Wb), [0]);
        assert_eq!(proposed(&reg, BlockType::Cdm), [0]);

        // cdm 0 cannot feed intf 0
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs_with_intf(0);
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::NotAvailable)
        );

        // intf 5 was never built
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs_with_intf(5);
        assert!(matches!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::Internal(_))
        ));
    }

    fn reqs_with_intf(id: usize) -> Requirements {
        reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().intf(id, IntfMode::Video).needs_cdm(true),
        )
    }

    #[test]
    fn test_dsc_count() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs(
            TopologyDims::new(2, 1, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );
        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [0, 1]);
        assert_eq!(proposed(&reg, BlockType::Dsc), [0]);
    }

    // lm 0 is plain, lm 1 has a dspp, lm 2 a scaler, lm 3 both
    fn ds_catalog() -> Catalog {
        let mut cat = Catalog::new().dest_scaler(true);
        for id in 0..4 {
            let lm = MixerCfg::new(id, id).peers(&[0, 1, 2, 3]);
            let lm = match id {
                1 => lm.dspp(0),
                2 => lm.ds(0),
                3 => lm.dspp(1).ds(1),
                _ => lm,
            };
            cat = cat.mixer(lm).pingpong(PingpongCfg::new(id));
        }

        cat.dspp(0)
            .dspp(1)
            .ds(0)
            .ds(1)
            .ctl(CtlCfg::new(0))
            .intf(IntfCfg::new(0, IntfType::Dsi))
    }

    fn ds_reqs(ctrl: TopologyControl) -> Requirements {
        let mut reqs = reqs(
            TopologyDims::new(1, 0, 1),
            HwResources::new().intf(0, IntfMode::Video),
        );
        reqs.top_ctrl = ctrl;
        reqs
    }

    #[test]
    fn test_ds_only() {
        let mut reg = Registry::new(&ds_catalog(), &PassiveFactory).unwrap();
        let reqs = ds_reqs(TopologyControl::DS);

        // mixers without a scaler are skipped
        let lm0 = reg.find(BlockType::Mixer, 0).unwrap();
        let lm1 = reg.find(BlockType::Mixer, 1).unwrap();
        let ctrl = TopologyControl::DS;
        assert_eq!(check_lm(&reg, TOK, &reqs, ctrl, lm0, None), Ok(None));
        assert_eq!(check_lm(&reg, TOK, &reqs, ctrl, lm1, None), Ok(None));

        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [2]);
        assert_eq!(proposed(&reg, BlockType::Ds), [0]);
        assert_eq!(proposed(&reg, BlockType::Dspp), [] as [u32; 0]);
    }

    #[test]
    fn test_ds_commit_release() {
        let mut reg = Registry::new(&ds_catalog(), &PassiveFactory).unwrap();
        let reqs = ds_reqs(TopologyControl::DS);
        let mut ledger = Ledger::new();
        let tok = ledger.allocate(PipelineId(1), reqs.topology.name);

        make_next_rsvp(&mut reg, tok.id, &reqs, &Hint::default()).unwrap();
        let ds0 = reg.find(BlockType::Ds, 0).unwrap();
        assert_eq!(reg.block(BlockType::Ds, ds0).rsvp_nxt, Some(tok.id));
        assert_eq!(reg.count(PipelineId(1), BlockType::Ds), 0);

        ledger.commit(&mut reg, tok);
        assert_eq!(reg.block(BlockType::Ds, ds0).rsvp, Some(tok.id));
        assert_eq!(reg.block(BlockType::Ds, ds0).rsvp_nxt, None);
        assert_eq!(reg.count(PipelineId(1), BlockType::Ds), 1);

        ledger.release(&mut reg, &tok);
        assert_eq!(reg.block(BlockType::Ds, ds0).rsvp, None);
        assert_eq!(reg.count(PipelineId(1), BlockType::Ds), 0);
        assert_eq!(ledger.current(PipelineId(1)), None);
    }

    #[test]
    fn test_dspp_and_ds() {
        let mut reg = Registry::new(&ds_catalog(), &PassiveFactory).unwrap();
        let reqs = ds_reqs(TopologyControl::DSPP | TopologyControl::DS);

        make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()).unwrap();
        assert_eq!(proposed(&reg, BlockType::Mixer), [3]);
        assert_eq!(proposed(&reg, BlockType::Dspp), [1]);
        assert_eq!(proposed(&reg, BlockType::Ds), [1]);

        // the only mixer with both has a busy scaler
        let mut reg = Registry::new(&ds_catalog(), &PassiveFactory).unwrap();
        own(&mut reg, BlockType::Ds, 1);
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::NotAvailable)
        );
        assert!(reg.all_blocks().all(|blk| blk.rsvp_nxt.is_none()));
    }

    #[test]
    fn test_no_mixers() {
        let mut reg = Registry::new(&catalog(), &PassiveFactory).unwrap();
        let reqs = reqs(TopologyDims::new(0, 0, 0), HwResources::new());
        assert_eq!(
            make_next_rsvp(&mut reg, TOK, &reqs, &Hint::default()),
            Err(Error::User)
        );
    }
}
