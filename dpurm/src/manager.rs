// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Resource manager.
//!
//! This module defines `ResourceManager` and `Builder`.

use super::catalog::Catalog;
use super::config::Config;
use super::hw::{HwBlock, HwFactory, HwTop, Interrupts};
use super::ledger::{Ledger, Stage};
use super::registry::{HwIter, Registry};
use super::requirements::{ConnectorState, CrtcState, Encoder, Requirements, TopologyControl};
use super::solver::{self, Hint};
use super::splash::{self, SplashData};
use super::topology::{self, TopologyName};
use super::types::{BlockRef, BlockType, Error, PipelineId, Result, TopologyDims};
use log::{debug, error};
use std::sync::{Arc, Mutex};

struct State {
    registry: Registry,
    ledger: Ledger,
    splash: SplashData,
}

/// A display hardware resource manager.
///
/// A resource manager tracks which pipeline owns which hardware block.  All operations are
/// serialized by one lock.
pub struct ResourceManager {
    state: Mutex<State>,
    config: Config,
}

impl ResourceManager {
    /// Reserves hardware blocks for a pipeline.
    ///
    /// Page flips return immediately unless continuity adoption is pending.  A test-only
    /// reservation is discarded after validation unless the connector asks to lock it.  On
    /// success, the new assignment replaces the current one of the pipeline.  On failure, the
    /// current assignment is left untouched, except when a test-only reservation asked to clear
    /// it.
    pub fn reserve(
        &self,
        enc: &dyn Encoder,
        crtc: &CrtcState,
        conn: &ConnectorState,
        test_only: bool,
    ) -> Result<()> {
        let pipeline = enc.id();
        if pipeline.is_any() {
            error!("invalid encoder id");
            return Error::user();
        }

        let mut state = self.state.lock().unwrap();
        let State {
            registry: reg,
            ledger,
            splash,
        } = &mut *state;

        // page flip
        if !splash.enabled && !crtc.needs_modeset {
            return Ok(());
        }

        debug!(
            "reserving hw for conn {} {} crtc {} test_only {}",
            conn.connector_id, pipeline, crtc.crtc_id, test_only
        );

        ledger.print(reg, Stage::Begin);

        let reqs = Requirements::populate(reg, enc, crtc, conn).map_err(|err| {
            error!("failed to populate hw requirements");
            err
        })?;

        let tok = ledger.allocate(pipeline, reqs.topology.name);
        let mut cur = ledger.current(pipeline);

        if let Some(old) = cur.filter(|_| test_only && reqs.wants_clear()) {
            debug!("test_only & CLEAR: clear rsvp {}", old.id);
            ledger.release(reg, &old);
            cur = None;
            ledger.print(reg, Stage::AfterClear);
        }

        let res = if splash.enabled {
            debug!("cont_splash feature enabled");
            solver::make_next_rsvp(reg, tok.id, &reqs, &splash.hint(&reqs))
        } else {
            solver::make_next_rsvp(reg, tok.id, &reqs, &Hint::default())
        };

        ledger.print(reg, Stage::AfterProposal);

        match res {
            Err(ref err) => {
                error!("failed to reserve hw resources: {}", err);
                ledger.release(reg, &tok);
            }
            Ok(()) if test_only && !reqs.wants_lock() => {
                debug!("test_only: discard test rsvp {}", tok.id);
                ledger.release(reg, &tok);
            }
            Ok(()) => {
                if test_only {
                    debug!("test_only & LOCK: lock rsvp {}", tok.id);
                }

                if let Some(old) = cur {
                    ledger.release(reg, &old);
                }

                debug!("rsrv {} topology {}", pipeline, tok.topology);
                ledger.commit(reg, tok);
            }
        }

        ledger.print(reg, Stage::Final);

        res
    }

    /// Releases the hardware blocks of a pipeline.
    ///
    /// This is a no-op when the pipeline has no reservation or when its connector asks to lock
    /// the reservation.
    pub fn release(&self, enc: &dyn Encoder) {
        let pipeline = enc.id();

        let mut state = self.state.lock().unwrap();
        let State {
            registry: reg,
            ledger,
            ..
        } = &mut *state;

        let Some(tok) = ledger.current(pipeline) else {
            error!("failed to find rsvp for {}", pipeline);
            return;
        };

        let Some(conn) = enc.connector_state() else {
            error!("failed to get connector for {}", pipeline);
            return;
        };

        if conn
            .topology_control
            .contains(TopologyControl::RESERVE_LOCK)
        {
            debug!("rsvp {} not releasing locked resources", tok.id);
        } else {
            debug!("release rsvp {}", tok.id);
            ledger.release(reg, &tok);
        }
    }

    /// Returns the number of blocks of a type a pipeline currently owns.
    pub fn hw_count(&self, pipeline: PipelineId, kind: BlockType) -> usize {
        let state = self.state.lock().unwrap();
        state.registry.count(pipeline, kind)
    }

    /// Advances an iterator.  Returns false when there are no more matching blocks.
    pub fn get_hw(&self, iter: &mut HwIter) -> bool {
        let state = self.state.lock().unwrap();
        state.registry.advance(iter).is_some()
    }

    /// Runs a closure against the hardware object of a block.
    pub fn with_hw<F, R>(&self, blk: BlockRef, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn HwBlock) -> R,
    {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.registry.find(blk.kind, blk.id) else {
            return Error::user();
        };

        Ok(f(state.registry.block_mut(blk.kind, idx).hw.as_mut()))
    }

    /// Runs a closure against the hardware object of the top-level block.
    pub fn with_top<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut dyn HwTop) -> R,
    {
        let mut state = self.state.lock().unwrap();
        f(state.registry.top_mut())
    }

    /// Returns the maximum line width every mixer supports.
    pub fn mixer_max_width(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.registry.lm_max_width()
    }

    /// Returns the topology of the current reservation of a pipeline.
    pub fn topology(&self, pipeline: PipelineId) -> Option<TopologyName> {
        let state = self.state.lock().unwrap();
        state.ledger.topology(pipeline)
    }

    /// Discovers the display state left by the firmware.
    ///
    /// This should be called once before the first reservation.  Returns true if a running
    /// display was found, in which case reservations reproduce it until `finish_cont_splash`.
    pub fn cont_splash_res_init(&self, intr: Option<&dyn Interrupts>) -> bool {
        let mut state = self.state.lock().unwrap();
        let data = splash::discover(&mut state.registry, intr, &self.config);
        let enabled = data.enabled;
        state.splash = data;

        enabled
    }

    /// Returns the discovered display state.
    pub fn splash_data(&self) -> SplashData {
        let state = self.state.lock().unwrap();
        state.splash.clone()
    }

    /// Stops reproducing the discovered display state.
    pub fn finish_cont_splash(&self) {
        let mut state = self.state.lock().unwrap();
        if state.splash.enabled {
            debug!("cont_splash finished");
            state.splash.enabled = false;
        }
    }

    /// Returns the name of the topology matching the dimensions.
    pub fn topology_name(dims: &TopologyDims) -> TopologyName {
        topology::name(dims)
    }

    /// Returns the compression encoder count of a topology.
    pub fn topology_num_encoders(name: TopologyName) -> u32 {
        topology::num_comp_encoders(name)
    }

    /// Writes the name of the topology matching the dimensions to a connector state.
    pub fn update_topology(conn: &mut ConnectorState, dims: Option<&TopologyDims>) {
        conn.topology_name = dims.map_or(TopologyName::None, topology::name);
    }
}

/// A resource manager builder.
///
/// The sole purpose of a builder is to build a `ResourceManager`.
#[derive(Default)]
pub struct Builder {
    catalog: Option<Catalog>,
    factory: Option<Box<dyn HwFactory>>,
    config: Config,
}

impl Builder {
    /// Creates a resource manager builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the hardware capability catalog.
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Sets the hardware object factory.
    pub fn factory<T>(mut self, factory: T) -> Self
    where
        T: HwFactory + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Sets the tunables.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds a `ResourceManager`.
    ///
    /// This creates a hardware object for every block in the catalog.
    pub fn build(self) -> Result<Arc<ResourceManager>> {
        let (Some(catalog), Some(factory)) = (self.catalog, self.factory) else {
            return Error::user();
        };

        let registry = Registry::new(&catalog, factory.as_ref())?;

        let state = State {
            registry,
            ledger: Ledger::new(),
            splash: SplashData::default(),
        };

        let rm = ResourceManager {
            state: Mutex::new(state),
            config: self.config,
        };

        Ok(Arc::new(rm))
    }
}
