// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! The reservation ledger.
//!
//! The ledger owns the committed reservation tokens.  A token is in flight between `allocate`
//! and either `commit` or `release`.  Only one token is ever in flight, so `commit` sweeps every
//! proposed owner into the current owner.

use super::registry::Registry;
use super::topology::TopologyName;
use super::types::PipelineId;
use log::{debug, trace};
use std::fmt;

/// The identity of a reservation token.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct TokenId {
    pub(crate) seq: u32,
    pub(crate) pipeline: PipelineId,
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.seq, self.pipeline)
    }
}

/// A reservation token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Token {
    pub(crate) id: TokenId,
    pub(crate) topology: TopologyName,
}

/// A point in a reserve call at which the ledger is dumped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Stage {
    Begin,
    AfterClear,
    AfterProposal,
    Final,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Begin => "begin",
            Stage::AfterClear => "after_clear",
            Stage::AfterProposal => "after_proposal",
            Stage::Final => "final",
        }
    }
}

#[derive(Default)]
pub(crate) struct Ledger {
    tokens: Vec<Token>,
    next_seq: u32,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    /// Allocates an in-flight token.  It is not committed.
    pub(crate) fn allocate(&mut self, pipeline: PipelineId, topology: TopologyName) -> Token {
        self.next_seq = self.next_seq.wrapping_add(1);

        Token {
            id: TokenId {
                seq: self.next_seq,
                pipeline,
            },
            topology,
        }
    }

    /// Returns the committed token of a pipeline.
    pub(crate) fn current(&self, pipeline: PipelineId) -> Option<Token> {
        self.tokens
            .iter()
            .find(|tok| tok.id.pipeline == pipeline)
            .copied()
    }

    /// Returns the topology recorded by the committed token of a pipeline.
    pub(crate) fn topology(&self, pipeline: PipelineId) -> Option<TopologyName> {
        self.current(pipeline).map(|tok| tok.topology)
    }

    /// Drops a token, committed or in flight, and everything it owns or proposes to own.
    pub(crate) fn release(&mut self, reg: &mut Registry, tok: &Token) {
        debug!("release rsvp {} topology {}", tok.id, tok.topology);

        for blk in reg.all_blocks_mut() {
            if blk.rsvp == Some(tok.id) {
                blk.rsvp = None;
                debug!("rel rsvp {} {}_{}", tok.id, blk.kind, blk.id);
            }
            if blk.rsvp_nxt == Some(tok.id) {
                blk.rsvp_nxt = None;
                debug!("rel rsvp_nxt {} {}_{}", tok.id, blk.kind, blk.id);
            }
        }

        self.tokens.retain(|cur| cur.id != tok.id);
    }

    /// Commits the in-flight token.
    pub(crate) fn commit(&mut self, reg: &mut Registry, tok: Token) {
        for blk in reg.all_blocks_mut() {
            if let Some(nxt) = blk.rsvp_nxt.take() {
                blk.rsvp = Some(nxt);
                debug!("rsvp {} -> {}_{}", nxt, blk.kind, blk.id);
            }
        }

        self.tokens.push(tok);
    }

    /// Dumps the tokens and the block ownership.
    pub(crate) fn print(&self, reg: &Registry, stage: Stage) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }

        trace!("rsvps at stage {}", stage.name());
        for tok in &self.tokens {
            trace!("rsvp {} topology {}", tok.id, tok.topology);
        }

        for blk in reg.all_blocks() {
            if blk.rsvp.is_none() && blk.rsvp_nxt.is_none() {
                continue;
            }

            let show = |id: Option<TokenId>| id.map_or("-".to_string(), |id| id.to_string());
            trace!(
                "{}_{} rsvp {} rsvp_nxt {}",
                blk.kind,
                blk.id,
                show(blk.rsvp),
                show(blk.rsvp_nxt)
            );
        }
    }
}
