// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! The hardware block registry.
//!
//! The registry owns one `Block` per physical instance, grouped by type in catalog order.  The
//! population is fixed at build time.  Blocks are walked through `HwIter`, which applies the
//! ownership filter.

use super::catalog::{Catalog, IntfType};
use super::hw::{HwBlock, HwFactory, HwTop};
use super::ledger::TokenId;
use super::types::{BlockRef, BlockType, Error, PipelineId, Result};
use log::{debug, error, trace};

/// A tracked hardware block.
pub(crate) struct Block {
    pub(crate) kind: BlockType,
    pub(crate) id: u32,
    // the committed owner
    pub(crate) rsvp: Option<TokenId>,
    // the proposed owner, swapped into rsvp on commit
    pub(crate) rsvp_nxt: Option<TokenId>,
    pub(crate) hw: Box<dyn HwBlock>,
}

impl Block {
    pub(crate) fn owner(&self) -> Option<PipelineId> {
        self.rsvp.map(|tok| tok.pipeline)
    }

    /// Returns true if the block is owned by a pipeline other than the token's.
    pub(crate) fn reserved_by_other(&self, tok: TokenId) -> bool {
        self.rsvp.is_some_and(|cur| cur.pipeline != tok.pipeline)
    }

    pub(crate) fn to_ref(&self) -> BlockRef {
        BlockRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// An iterator over the blocks of a type, optionally filtered by owner.
///
/// A pipeline of `PipelineId::ANY` matches all blocks.  Otherwise, only blocks currently owned
/// by the pipeline match.
#[derive(Clone, Debug)]
pub struct HwIter {
    pipeline: PipelineId,
    kind: BlockType,
    next: usize,
    current: Option<(usize, BlockRef)>,
    exhausted: bool,
}

impl HwIter {
    /// Creates an iterator.
    pub fn new(pipeline: PipelineId, kind: BlockType) -> Self {
        Self {
            pipeline,
            kind,
            next: 0,
            current: None,
            exhausted: false,
        }
    }

    /// Returns the block found by the last advance, if any.
    pub fn block(&self) -> Option<BlockRef> {
        self.current.map(|(_, blk)| blk)
    }

    /// Returns the block type of the iterator.
    pub fn kind(&self) -> BlockType {
        self.kind
    }

    /// Returns the pipeline filter of the iterator.
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }
}

/// The hardware block registry.
pub(crate) struct Registry {
    catalog: Catalog,
    top: Box<dyn HwTop>,
    blocks: [Vec<Block>; BlockType::COUNT],
    lm_max_width: u32,
}

impl Registry {
    /// Builds the registry from a capability catalog.
    ///
    /// On failure, all hardware objects created so far are destroyed.
    pub(crate) fn new(catalog: &Catalog, factory: &dyn HwFactory) -> Result<Self> {
        let top = factory.create_top(catalog).map_err(|err| {
            error!("failed: mdp hw not available");
            err
        })?;

        let mut reg = Self {
            catalog: catalog.clone(),
            top,
            blocks: Default::default(),
            lm_max_width: 0,
        };

        for lm in &catalog.mixers {
            if lm.pingpong.is_none() {
                error!("mixer {} without pingpong", lm.id);
                return Error::config("mixer without pingpong");
            }

            reg.add(factory, BlockType::Mixer, lm.id)?;

            if reg.lm_max_width == 0 {
                reg.lm_max_width = lm.max_width;
            } else if reg.lm_max_width != lm.max_width {
                error!("unsupported: lm maxwidth differs");
                reg.lm_max_width = reg.lm_max_width.min(lm.max_width);
            }
        }

        for &id in &catalog.dspps {
            reg.add(factory, BlockType::Dspp, id)?;
        }

        if catalog.top.has_dest_scaler {
            for &id in &catalog.dss {
                reg.add(factory, BlockType::Ds, id)?;
            }
        }

        for pp in &catalog.pingpongs {
            reg.add(factory, BlockType::Pingpong, pp.id)?;
        }

        for &id in &catalog.dscs {
            reg.add(factory, BlockType::Dsc, id)?;
        }

        for (idx, intf) in catalog.intfs.iter().enumerate() {
            if intf.kind == IntfType::None {
                debug!("skip intf {} with type none", idx);
                continue;
            }

            reg.add(factory, BlockType::Intf, intf.id)?;
        }

        for &id in &catalog.wbs {
            reg.add(factory, BlockType::Wb, id)?;
        }

        for ctl in &catalog.ctls {
            reg.add(factory, BlockType::Ctl, ctl.id)?;
        }

        for cdm in &catalog.cdms {
            reg.add(factory, BlockType::Cdm, cdm.id)?;
        }

        Ok(reg)
    }

    fn add(&mut self, factory: &dyn HwFactory, kind: BlockType, id: u32) -> Result<()> {
        let hw = factory
            .create_block(kind, id, &self.catalog)
            .map_err(|err| {
                error!("failed: {} {} hw not available: {}", kind, id, err);
                err
            })?;

        self.blocks[kind.index()].push(Block {
            kind,
            id,
            rsvp: None,
            rsvp_nxt: None,
            hw,
        });

        Ok(())
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn top(&self) -> &dyn HwTop {
        self.top.as_ref()
    }

    pub(crate) fn top_mut(&mut self) -> &mut dyn HwTop {
        self.top.as_mut()
    }

    pub(crate) fn lm_max_width(&self) -> u32 {
        self.lm_max_width
    }

    pub(crate) fn blocks(&self, kind: BlockType) -> &[Block] {
        &self.blocks[kind.index()]
    }

    pub(crate) fn block(&self, kind: BlockType, idx: usize) -> &Block {
        &self.blocks[kind.index()][idx]
    }

    pub(crate) fn block_mut(&mut self, kind: BlockType, idx: usize) -> &mut Block {
        &mut self.blocks[kind.index()][idx]
    }

    pub(crate) fn all_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().flatten()
    }

    pub(crate) fn all_blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.iter_mut().flatten()
    }

    /// Returns the index of a block by id.
    pub(crate) fn find(&self, kind: BlockType, id: u32) -> Option<usize> {
        self.blocks(kind).iter().position(|blk| blk.id == id)
    }

    /// Advances an iterator to the next matching block and returns its index.
    pub(crate) fn advance(&self, iter: &mut HwIter) -> Option<usize> {
        iter.current = None;

        if iter.exhausted {
            debug!("attempt resume iteration past last");
            return None;
        }

        let blocks = self.blocks(iter.kind);
        while iter.next < blocks.len() {
            let idx = iter.next;
            iter.next += 1;

            let blk = &blocks[idx];
            if iter.pipeline.is_any() || blk.owner() == Some(iter.pipeline) {
                trace!(
                    "found type {} id {} for {}",
                    iter.kind,
                    blk.id,
                    iter.pipeline
                );
                iter.current = Some((idx, blk.to_ref()));
                return Some(idx);
            }
        }

        debug!("no match, type {} for {}", iter.kind, iter.pipeline);
        iter.exhausted = true;

        None
    }

    /// Counts the blocks of a type currently owned by a pipeline.
    pub(crate) fn count(&self, pipeline: PipelineId, kind: BlockType) -> usize {
        self.blocks(kind)
            .iter()
            .filter(|blk| blk.owner() == Some(pipeline))
            .count()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let count: usize = self.blocks.iter().map(Vec::len).sum();
        debug!("destroying {} hw blocks", count);
    }
}
