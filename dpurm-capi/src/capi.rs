// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

use dpurm::{
    Autorefresh, BlockRef, BlockType, Builder, Catalog, CdmCfg, ConnectorState, ConnectorType,
    CrtcState, CtlCfg, CtlFeatures, Encoder, Error, HwBlock, HwFactory, HwIter, HwResources,
    HwTop, IntfCfg, IntfMode, IntfType, Interrupts, IrqKind, MixerCfg, MixerFeatures,
    PingpongCfg, PingpongFeatures, PipelineId, ResourceManager, Result, TopCfg, TopologyControl,
    TopologyDims, TopologyName, VsyncInfo, MAX_INTFS, MAX_WBS,
};
use log::error;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::{ffi, mem, ptr, slice};

pub const DPURM_HW_LM: u32 = 0;
pub const DPURM_HW_DSPP: u32 = 1;
pub const DPURM_HW_DS: u32 = 2;
pub const DPURM_HW_CTL: u32 = 3;
pub const DPURM_HW_CDM: u32 = 4;
pub const DPURM_HW_PINGPONG: u32 = 5;
pub const DPURM_HW_INTF: u32 = 6;
pub const DPURM_HW_WB: u32 = 7;
pub const DPURM_HW_DSC: u32 = 8;
pub const DPURM_HW_TOP: u32 = 9;

pub const DPURM_ID_NONE: i32 = -1;

pub const DPURM_MIXER_PRIMARY_PREF: u32 = 1 << 0;

pub const DPURM_PINGPONG_SPLIT: u32 = 1 << 0;
pub const DPURM_PINGPONG_SLAVE: u32 = 1 << 1;

pub const DPURM_CTL_SPLIT_DISPLAY: u32 = 1 << 0;
pub const DPURM_CTL_PINGPONG_SPLIT: u32 = 1 << 1;
pub const DPURM_CTL_PRIMARY_PREF: u32 = 1 << 2;

pub const DPURM_INTF_TYPE_NONE: u32 = 0;
pub const DPURM_INTF_TYPE_DSI: u32 = 1;
pub const DPURM_INTF_TYPE_HDMI: u32 = 2;
pub const DPURM_INTF_TYPE_DP: u32 = 3;

pub const DPURM_INTF_MODE_NONE: u32 = 0;
pub const DPURM_INTF_MODE_VIDEO: u32 = 1;
pub const DPURM_INTF_MODE_CMD: u32 = 2;
pub const DPURM_INTF_MODE_WB_BLOCK: u32 = 3;
pub const DPURM_INTF_MODE_WB_LINE: u32 = 4;

pub const DPURM_TOP_CTRL_RESERVE_LOCK: u64 = 1u64 << 0;
pub const DPURM_TOP_CTRL_RESERVE_CLEAR: u64 = 1u64 << 1;
pub const DPURM_TOP_CTRL_DSPP: u64 = 1u64 << 2;
pub const DPURM_TOP_CTRL_DS: u64 = 1u64 << 3;

pub const DPURM_IRQ_PINGPONG_DONE: u32 = 0;
pub const DPURM_IRQ_AUTOREFRESH: u32 = 1;

#[repr(C)]
pub enum dpurm_log_level {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

#[allow(non_camel_case_types)]
pub type dpurm_log_callback = Option<
    unsafe extern "C" fn(lv: dpurm_log_level, msg: *const ffi::c_char, cb_data: *mut ffi::c_void),
>;

fn errno(err: Error) -> i32 {
    match err {
        Error::User | Error::Config(_) => -libc::EINVAL,
        Error::NotAvailable => -libc::ENAVAIL,
        Error::Unsupported => -libc::EOPNOTSUPP,
        Error::Timeout => -libc::ETIMEDOUT,
        // backends may hand back either sign
        Error::Code(code) => match code.checked_abs() {
            Some(code) if code != 0 => -code,
            _ => -libc::EFAULT,
        },
        _ => -libc::EFAULT,
    }
}

fn check(ret: i32) -> Result<()> {
    match ret {
        0 => Ok(()),
        ret if ret == -libc::EOPNOTSUPP => Error::unsupported(),
        ret if ret == -libc::ETIMEDOUT => Err(Error::Timeout),
        ret => Err(Error::Code(ret)),
    }
}

fn block_type(hw_type: u32) -> Option<BlockType> {
    BlockType::try_from(hw_type).ok()
}

fn slice_from<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        return &[];
    }

    // SAFETY: ptr points to count elements by contract
    unsafe { slice::from_raw_parts(ptr, count as usize) }
}

fn write_out<T>(dst: *mut T, val: T) {
    if dst.is_null() {
        return;
    }

    // SAFETY: dst is non-NULL and writable by contract
    unsafe { dst.write(val) };
}

fn opt_id(id: i32) -> Option<u32> {
    u32::try_from(id).ok()
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_mixer_cfg {
    pub id: u32,
    /// `DPURM_ID_NONE` when not wired.
    pub dspp: i32,
    /// `DPURM_ID_NONE` when not wired.
    pub ds: i32,
    pub pingpong: i32,
    pub features: u32,
    pub pair_mask: u64,
    pub max_width: u32,
}

impl dpurm_mixer_cfg {
    fn to_cfg(&self) -> MixerCfg {
        MixerCfg {
            id: self.id,
            dspp: opt_id(self.dspp),
            ds: opt_id(self.ds),
            pingpong: opt_id(self.pingpong),
            features: MixerFeatures::from_bits_truncate(self.features),
            pair_mask: self.pair_mask,
            max_width: self.max_width,
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_pingpong_cfg {
    pub id: u32,
    pub features: u32,
}

impl dpurm_pingpong_cfg {
    fn to_cfg(&self) -> PingpongCfg {
        PingpongCfg::new(self.id).features(PingpongFeatures::from_bits_truncate(self.features))
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_ctl_cfg {
    pub id: u32,
    pub features: u32,
}

impl dpurm_ctl_cfg {
    fn to_cfg(&self) -> CtlCfg {
        CtlCfg::new(self.id).features(CtlFeatures::from_bits_truncate(self.features))
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_cdm_cfg {
    pub id: u32,
    pub intf_connect: u64,
    pub wb_connect: u64,
}

impl dpurm_cdm_cfg {
    fn to_cfg(&self) -> CdmCfg {
        CdmCfg {
            id: self.id,
            intf_connect: self.intf_connect,
            wb_connect: self.wb_connect,
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_intf_cfg {
    pub id: u32,
    pub intf_type: u32,
}

impl dpurm_intf_cfg {
    fn to_cfg(&self) -> IntfCfg {
        let kind = match self.intf_type {
            DPURM_INTF_TYPE_DSI => IntfType::Dsi,
            DPURM_INTF_TYPE_HDMI => IntfType::Hdmi,
            DPURM_INTF_TYPE_DP => IntfType::Dp,
            _ => IntfType::None,
        };

        IntfCfg::new(self.id, kind)
    }
}

#[repr(C)]
pub struct dpurm_catalog {
    pub has_dest_scaler: bool,

    pub mixers: *const dpurm_mixer_cfg,
    pub mixer_count: u32,
    pub dspps: *const u32,
    pub dspp_count: u32,
    pub dss: *const u32,
    pub ds_count: u32,
    pub pingpongs: *const dpurm_pingpong_cfg,
    pub pingpong_count: u32,
    pub dscs: *const u32,
    pub dsc_count: u32,
    pub intfs: *const dpurm_intf_cfg,
    pub intf_count: u32,
    pub wbs: *const u32,
    pub wb_count: u32,
    pub ctls: *const dpurm_ctl_cfg,
    pub ctl_count: u32,
    pub cdms: *const dpurm_cdm_cfg,
    pub cdm_count: u32,
}

impl dpurm_catalog {
    fn into(cat: *const Self) -> Catalog {
        // SAFETY: cat is non-NULL
        let cat = unsafe { &*cat };

        Catalog {
            top: TopCfg {
                has_dest_scaler: cat.has_dest_scaler,
            },
            mixers: slice_from(cat.mixers, cat.mixer_count)
                .iter()
                .map(dpurm_mixer_cfg::to_cfg)
                .collect(),
            dspps: slice_from(cat.dspps, cat.dspp_count).to_vec(),
            dss: slice_from(cat.dss, cat.ds_count).to_vec(),
            pingpongs: slice_from(cat.pingpongs, cat.pingpong_count)
                .iter()
                .map(dpurm_pingpong_cfg::to_cfg)
                .collect(),
            dscs: slice_from(cat.dscs, cat.dsc_count).to_vec(),
            intfs: slice_from(cat.intfs, cat.intf_count)
                .iter()
                .map(dpurm_intf_cfg::to_cfg)
                .collect(),
            wbs: slice_from(cat.wbs, cat.wb_count).to_vec(),
            ctls: slice_from(cat.ctls, cat.ctl_count)
                .iter()
                .map(dpurm_ctl_cfg::to_cfg)
                .collect(),
            cdms: slice_from(cat.cdms, cat.cdm_count)
                .iter()
                .map(dpurm_cdm_cfg::to_cfg)
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct dpurm_autorefresh {
    pub enable: bool,
    pub frame_count: u32,
}

#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct dpurm_vsync_info {
    pub rd_ptr_init_val: u32,
    pub wr_ptr_line_count: u32,
}

/// Hardware callbacks.  All but `create` are optional.  A callback returns 0 on success or a
/// negative errno.  `-EOPNOTSUPP` means the operation is not supported by the block.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_hw_funcs {
    pub create: Option<
        unsafe extern "C" fn(
            hw_type: u32,
            id: u32,
            out_hw: *mut *mut ffi::c_void,
            data: *mut ffi::c_void,
        ) -> i32,
    >,
    pub destroy:
        Option<unsafe extern "C" fn(hw_type: u32, hw: *mut ffi::c_void, data: *mut ffi::c_void)>,

    pub read_ctl_top: Option<unsafe extern "C" fn(hw: *mut ffi::c_void, out_val: *mut u32) -> i32>,
    pub read_ctl_layers:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, lm: u32, out_val: *mut u32) -> i32>,
    pub get_dsc_status:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, out_active: *mut bool) -> i32>,
    pub get_autorefresh:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, out_cfg: *mut dpurm_autorefresh) -> i32>,
    pub setup_autorefresh:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, cfg: *const dpurm_autorefresh) -> i32>,
    pub connect_external_te: Option<unsafe extern "C" fn(hw: *mut ffi::c_void, enable: bool) -> i32>,
    pub get_vsync_info:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, out_info: *mut dpurm_vsync_info) -> i32>,
    pub get_split_flush_status:
        Option<unsafe extern "C" fn(hw: *mut ffi::c_void, out_enabled: *mut bool) -> i32>,
}

impl dpurm_hw_funcs {
    fn from(funcs: *const Self) -> Self {
        // SAFETY: funcs is non-NULL
        unsafe { *funcs }
    }
}

struct CHw {
    hw_type: u32,
    hw: *mut ffi::c_void,
    funcs: dpurm_hw_funcs,
    data: *mut ffi::c_void,
}

// SAFETY: users should provide the guarantees
unsafe impl Send for CHw {}

impl HwBlock for CHw {
    fn read_ctl_top(&self) -> Result<u32> {
        let Some(read_ctl_top) = self.funcs.read_ctl_top else {
            return Error::unsupported();
        };

        let mut val = 0;
        // SAFETY: hw was created by funcs.create
        check(unsafe { read_ctl_top(self.hw, &mut val) })?;

        Ok(val)
    }

    fn read_ctl_layers(&self, lm: u32) -> Result<u32> {
        let Some(read_ctl_layers) = self.funcs.read_ctl_layers else {
            return Error::unsupported();
        };

        let mut val = 0;
        // SAFETY: hw was created by funcs.create
        check(unsafe { read_ctl_layers(self.hw, lm, &mut val) })?;

        Ok(val)
    }

    fn dsc_status(&self) -> Result<bool> {
        let Some(get_dsc_status) = self.funcs.get_dsc_status else {
            return Error::unsupported();
        };

        let mut active = false;
        // SAFETY: hw was created by funcs.create
        check(unsafe { get_dsc_status(self.hw, &mut active) })?;

        Ok(active)
    }

    fn autorefresh(&self) -> Result<Autorefresh> {
        let Some(get_autorefresh) = self.funcs.get_autorefresh else {
            return Error::unsupported();
        };

        let mut cfg = dpurm_autorefresh::default();
        // SAFETY: hw was created by funcs.create
        check(unsafe { get_autorefresh(self.hw, &mut cfg) })?;

        Ok(Autorefresh {
            enable: cfg.enable,
            frame_count: cfg.frame_count,
        })
    }

    fn setup_autorefresh(&mut self, cfg: Autorefresh) -> Result<()> {
        let Some(setup_autorefresh) = self.funcs.setup_autorefresh else {
            return Error::unsupported();
        };

        let cfg = dpurm_autorefresh {
            enable: cfg.enable,
            frame_count: cfg.frame_count,
        };
        // SAFETY: hw was created by funcs.create
        check(unsafe { setup_autorefresh(self.hw, &cfg) })
    }

    fn connect_external_te(&mut self, enable: bool) -> Result<()> {
        let Some(connect_external_te) = self.funcs.connect_external_te else {
            return Error::unsupported();
        };

        // SAFETY: hw was created by funcs.create
        check(unsafe { connect_external_te(self.hw, enable) })
    }

    fn vsync_info(&self) -> Result<VsyncInfo> {
        let Some(get_vsync_info) = self.funcs.get_vsync_info else {
            return Error::unsupported();
        };

        let mut info = dpurm_vsync_info::default();
        // SAFETY: hw was created by funcs.create
        check(unsafe { get_vsync_info(self.hw, &mut info) })?;

        Ok(VsyncInfo {
            rd_ptr_init_val: info.rd_ptr_init_val,
            wr_ptr_line_count: info.wr_ptr_line_count,
        })
    }
}

impl HwTop for CHw {
    fn split_flush_status(&self) -> Result<bool> {
        let Some(get_split_flush_status) = self.funcs.get_split_flush_status else {
            return Error::unsupported();
        };

        let mut enabled = false;
        // SAFETY: hw was created by funcs.create
        check(unsafe { get_split_flush_status(self.hw, &mut enabled) })?;

        Ok(enabled)
    }
}

impl Drop for CHw {
    fn drop(&mut self) {
        if let Some(destroy) = self.funcs.destroy {
            // SAFETY: hw was created by funcs.create and is not used after this
            unsafe { destroy(self.hw_type, self.hw, self.data) };
        }
    }
}

// the C handles of the hardware objects, for the iterator and get_mdp
#[derive(Default)]
struct Handles {
    top: usize,
    blocks: HashMap<BlockRef, usize>,
}

struct CFactory {
    funcs: dpurm_hw_funcs,
    data: *mut ffi::c_void,
    handles: Arc<Mutex<Handles>>,
}

impl CFactory {
    fn create(&self, hw_type: u32, id: u32) -> Result<CHw> {
        let Some(create) = self.funcs.create else {
            return Err(Error::Config("no hw constructor"));
        };

        let mut hw = ptr::null_mut();
        // SAFETY: data is passed back as is
        check(unsafe { create(hw_type, id, &mut hw, self.data) })?;

        Ok(CHw {
            hw_type,
            hw,
            funcs: self.funcs,
            data: self.data,
        })
    }
}

impl HwFactory for CFactory {
    fn create_top(&self, _catalog: &Catalog) -> Result<Box<dyn HwTop>> {
        let hw = self.create(DPURM_HW_TOP, 0)?;
        self.handles.lock().unwrap().top = hw.hw as usize;

        Ok(Box::new(hw))
    }

    fn create_block(
        &self,
        kind: BlockType,
        id: u32,
        _catalog: &Catalog,
    ) -> Result<Box<dyn HwBlock>> {
        let hw = self.create(kind as u32, id)?;
        self.handles
            .lock()
            .unwrap()
            .blocks
            .insert(BlockRef { kind, id }, hw.hw as usize);

        Ok(Box::new(hw))
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_intr_funcs {
    /// Returns the irq index of a `DPURM_IRQ_*` source on a pingpong, or a negative value.
    pub get_irq_index:
        Option<unsafe extern "C" fn(kind: u32, pingpong: u32, data: *mut ffi::c_void) -> i32>,
    pub read_status: Option<unsafe extern "C" fn(irq: u32, data: *mut ffi::c_void) -> u32>,
    pub clear_status: Option<unsafe extern "C" fn(irq: u32, status: u32, data: *mut ffi::c_void)>,
}

struct CInterrupts {
    funcs: dpurm_intr_funcs,
    data: *mut ffi::c_void,
}

impl Interrupts for CInterrupts {
    fn irq_index(&self, kind: IrqKind, pingpong: u32) -> Option<u32> {
        let get_irq_index = self.funcs.get_irq_index?;
        let kind = match kind {
            IrqKind::PingpongDone => DPURM_IRQ_PINGPONG_DONE,
            IrqKind::Autorefresh => DPURM_IRQ_AUTOREFRESH,
        };

        // SAFETY: data is passed back as is
        let irq = unsafe { get_irq_index(kind, pingpong, self.data) };
        u32::try_from(irq).ok()
    }

    fn status(&self, irq: u32) -> u32 {
        let Some(read_status) = self.funcs.read_status else {
            return 0;
        };

        // SAFETY: data is passed back as is
        unsafe { read_status(irq, self.data) }
    }

    fn clear(&self, irq: u32, status: u32) {
        if let Some(clear_status) = self.funcs.clear_status {
            // SAFETY: data is passed back as is
            unsafe { clear_status(irq, status, self.data) };
        }
    }
}

#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct dpurm_topology {
    pub num_lm: u32,
    pub num_enc: u32,
    pub num_intf: u32,
}

impl dpurm_topology {
    fn into(top: *const Self) -> TopologyDims {
        // SAFETY: top is non-NULL
        let top = unsafe { &*top };

        TopologyDims::new(top.num_lm, top.num_enc, top.num_intf)
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_hw_resources {
    /// `DPURM_INTF_MODE_*` per interface id.
    pub intfs: [u32; MAX_INTFS],
    /// `DPURM_INTF_MODE_*` per write-back id.
    pub wbs: [u32; MAX_WBS],
    pub needs_cdm: bool,
    pub is_primary: bool,
    pub display_num_of_h_tiles: u32,
    pub topology: dpurm_topology,
}

fn intf_mode(mode: u32) -> IntfMode {
    match mode {
        DPURM_INTF_MODE_VIDEO => IntfMode::Video,
        DPURM_INTF_MODE_CMD => IntfMode::Command,
        DPURM_INTF_MODE_WB_BLOCK => IntfMode::WbBlock,
        DPURM_INTF_MODE_WB_LINE => IntfMode::WbLine,
        _ => IntfMode::None,
    }
}

impl dpurm_hw_resources {
    fn into(res: *const Self) -> HwResources {
        // SAFETY: res is non-NULL
        let res = unsafe { &*res };

        let mut hw_res = HwResources::new()
            .needs_cdm(res.needs_cdm)
            .primary(res.is_primary)
            .h_tiles(res.display_num_of_h_tiles)
            .topology(dpurm_topology::into(&res.topology));
        for (id, &mode) in res.intfs.iter().enumerate() {
            hw_res = hw_res.intf(id, intf_mode(mode));
        }
        for (id, &mode) in res.wbs.iter().enumerate() {
            hw_res = hw_res.wb(id, intf_mode(mode));
        }

        hw_res
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_crtc_state {
    pub crtc_id: u32,
    pub needs_modeset: bool,
    pub hdisplay: u32,
}

impl dpurm_crtc_state {
    fn into(crtc: *const Self) -> CrtcState {
        // SAFETY: crtc is non-NULL
        let crtc = unsafe { &*crtc };

        CrtcState {
            crtc_id: crtc.crtc_id,
            needs_modeset: crtc.needs_modeset,
            hdisplay: crtc.hdisplay,
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct dpurm_connector_state {
    pub connector_id: u32,
    /// A `DRM_MODE_CONNECTOR_*` value.
    pub connector_type: u32,
    /// `DPURM_TOP_CTRL_*` bits.
    pub topology_control: u64,
    pub topology_name: u32,
}

impl dpurm_connector_state {
    fn into(conn: *const Self) -> Option<ConnectorState> {
        if conn.is_null() {
            return None;
        }

        // SAFETY: conn is non-NULL
        let conn = unsafe { &*conn };

        let mut state = ConnectorState::new(conn.connector_id, ConnectorType::from(conn.connector_type))
            .topology_control(TopologyControl::from_bits_truncate(conn.topology_control));
        state.topology_name = TopologyName::try_from(conn.topology_name).unwrap_or_default();

        Some(state)
    }

    fn as_mut<'a>(conn: *mut Self) -> &'a mut Self {
        // SAFETY: conn is non-NULL
        unsafe { &mut *conn }
    }
}

// the encoder as seen from the C driver, which measures the resources in advance
struct CEncoder {
    id: u32,
    hw_res: HwResources,
    conn: Option<ConnectorState>,
}

impl Encoder for CEncoder {
    fn id(&self) -> PipelineId {
        PipelineId(self.id)
    }

    fn hw_resources(&self, _conn: &ConnectorState) -> HwResources {
        self.hw_res
    }

    fn connector_state(&self) -> Option<ConnectorState> {
        self.conn
    }
}

#[repr(C)]
pub struct dpurm_rm {
    _data: [u8; 0],
}

struct CRm {
    rm: Arc<ResourceManager>,
    handles: Handles,
}

impl CRm {
    fn into(rm: Self) -> *mut dpurm_rm {
        let rm = Box::new(rm);
        Box::into_raw(rm) as *mut dpurm_rm
    }

    fn from(rm: *mut dpurm_rm) -> Box<Self> {
        // SAFETY: rm was created by Self::into
        unsafe { Box::from_raw(rm as *mut Self) }
    }

    fn as_ref<'a>(rm: *mut dpurm_rm) -> &'a Self {
        // SAFETY: rm was created by Self::into
        unsafe { &*(rm as *const Self) }
    }
}

#[repr(C)]
pub struct dpurm_hw_iter {
    _data: [u8; 0],
}

impl dpurm_hw_iter {
    fn from(iter: HwIter) -> *mut dpurm_hw_iter {
        let iter = Box::new(iter);
        Box::into_raw(iter) as *mut dpurm_hw_iter
    }

    fn into(iter: *mut Self) -> Box<HwIter> {
        // SAFETY: iter was created by Self::from
        unsafe { Box::from_raw(iter as *mut HwIter) }
    }

    fn as_mut<'a>(iter: *mut Self) -> &'a mut HwIter {
        // SAFETY: iter was created by Self::from
        unsafe { &mut *(iter as *mut HwIter) }
    }
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_log_init(
    max_lv: dpurm_log_level,
    log_cb: dpurm_log_callback,
    cb_data: *mut ffi::c_void,
) {
    let filter = match max_lv {
        dpurm_log_level::Off => log::LevelFilter::Off,
        dpurm_log_level::Error => log::LevelFilter::Error,
        dpurm_log_level::Warn => log::LevelFilter::Warn,
        dpurm_log_level::Info => log::LevelFilter::Info,
        dpurm_log_level::Debug => log::LevelFilter::Debug,
    };

    let Some(log_cb) = log_cb.filter(|_| filter != log::LevelFilter::Off) else {
        super::log::init(log::LevelFilter::Off, Box::new(|_| {}));
        return;
    };

    let cb_data = cb_data as usize;
    let cb = move |rec: &log::Record| {
        let lv = match rec.level() {
            log::Level::Error => dpurm_log_level::Error,
            log::Level::Warn => dpurm_log_level::Warn,
            log::Level::Info => dpurm_log_level::Info,
            log::Level::Debug => dpurm_log_level::Debug,
            log::Level::Trace => dpurm_log_level::Debug,
        };
        let msg = format!("{}", rec.args());
        if let Ok(c_msg) = ffi::CString::new(msg) {
            // SAFETY: we trust the client
            unsafe {
                log_cb(lv, c_msg.as_ptr(), cb_data as *mut ffi::c_void);
            }
        }
    };

    super::log::init(filter, Box::new(cb));
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_init(
    cat: *const dpurm_catalog,
    funcs: *const dpurm_hw_funcs,
    data: *mut ffi::c_void,
) -> *mut dpurm_rm {
    if cat.is_null() || funcs.is_null() {
        error!("invalid catalog or hw funcs");
        return ptr::null_mut();
    }

    let handles = Arc::new(Mutex::new(Handles::default()));
    let factory = CFactory {
        funcs: dpurm_hw_funcs::from(funcs),
        data,
        handles: handles.clone(),
    };

    let rm = match Builder::new()
        .catalog(dpurm_catalog::into(cat))
        .factory(factory)
        .build()
    {
        Ok(rm) => rm,
        Err(err) => {
            error!("failed to init rm: {}", err);
            return ptr::null_mut();
        }
    };

    let handles = mem::take(&mut *handles.lock().unwrap());

    CRm::into(CRm { rm, handles })
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_destroy(rm: *mut dpurm_rm) {
    if rm.is_null() {
        return;
    }

    let _ = CRm::from(rm);
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_reserve(
    rm: *mut dpurm_rm,
    enc_id: u32,
    hw_res: *const dpurm_hw_resources,
    crtc: *const dpurm_crtc_state,
    conn: *const dpurm_connector_state,
    test_only: bool,
) -> i32 {
    if rm.is_null() || hw_res.is_null() || crtc.is_null() {
        return -libc::EINVAL;
    }

    let rm = CRm::as_ref(rm);
    let Some(conn) = dpurm_connector_state::into(conn) else {
        return -libc::EINVAL;
    };

    let enc = CEncoder {
        id: enc_id,
        hw_res: dpurm_hw_resources::into(hw_res),
        conn: Some(conn),
    };
    let crtc = dpurm_crtc_state::into(crtc);

    match rm.rm.reserve(&enc, &crtc, &conn, test_only) {
        Ok(()) => 0,
        Err(err) => errno(err),
    }
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_release(
    rm: *mut dpurm_rm,
    enc_id: u32,
    conn: *const dpurm_connector_state,
) {
    if rm.is_null() {
        return;
    }

    let rm = CRm::as_ref(rm);
    let enc = CEncoder {
        id: enc_id,
        hw_res: HwResources::new(),
        conn: dpurm_connector_state::into(conn),
    };

    rm.rm.release(&enc);
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_hw_count(rm: *mut dpurm_rm, enc_id: u32, hw_type: u32) -> i32 {
    if rm.is_null() {
        return -libc::EINVAL;
    }

    let rm = CRm::as_ref(rm);
    let Some(kind) = block_type(hw_type) else {
        error!("invalid hw type {}", hw_type);
        return -libc::EINVAL;
    };

    let count = rm.rm.hw_count(PipelineId(enc_id), kind);
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_iter_create(enc_id: u32, hw_type: u32) -> *mut dpurm_hw_iter {
    let Some(kind) = block_type(hw_type) else {
        error!("invalid hw type {}", hw_type);
        return ptr::null_mut();
    };

    dpurm_hw_iter::from(HwIter::new(PipelineId(enc_id), kind))
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_iter_destroy(iter: *mut dpurm_hw_iter) {
    if iter.is_null() {
        return;
    }

    let _ = dpurm_hw_iter::into(iter);
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_hw(
    rm: *mut dpurm_rm,
    iter: *mut dpurm_hw_iter,
    out_hw: *mut *mut ffi::c_void,
) -> bool {
    if rm.is_null() || iter.is_null() {
        return false;
    }

    let rm = CRm::as_ref(rm);
    let iter = dpurm_hw_iter::as_mut(iter);

    if !rm.rm.get_hw(iter) {
        return false;
    }

    let hw = iter
        .block()
        .and_then(|blk| rm.handles.blocks.get(&blk))
        .copied()
        .unwrap_or(0);
    write_out(out_hw, hw as *mut ffi::c_void);

    true
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_mdp(rm: *mut dpurm_rm) -> *mut ffi::c_void {
    if rm.is_null() {
        return ptr::null_mut();
    }

    let rm = CRm::as_ref(rm);
    rm.handles.top as *mut ffi::c_void
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_mixer_max_width(rm: *mut dpurm_rm) -> u32 {
    if rm.is_null() {
        return 0;
    }

    let rm = CRm::as_ref(rm);
    rm.rm.mixer_max_width()
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_topology_name(top: *const dpurm_topology) -> u32 {
    if top.is_null() {
        return TopologyName::None as u32;
    }

    ResourceManager::topology_name(&dpurm_topology::into(top)) as u32
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_get_topology_num_encoders(name: u32) -> u32 {
    match TopologyName::try_from(name) {
        Ok(name) => ResourceManager::topology_num_encoders(name),
        Err(_) => 0,
    }
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_update_topology(
    conn: *mut dpurm_connector_state,
    top: *const dpurm_topology,
) -> i32 {
    let Some(mut state) = dpurm_connector_state::into(conn) else {
        return -libc::EINVAL;
    };

    let dims = (!top.is_null()).then(|| dpurm_topology::into(top));
    ResourceManager::update_topology(&mut state, dims.as_ref());

    dpurm_connector_state::as_mut(conn).topology_name = state.topology_name as u32;

    0
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_cont_splash_res_init(
    rm: *mut dpurm_rm,
    intr: *const dpurm_intr_funcs,
    data: *mut ffi::c_void,
) -> bool {
    if rm.is_null() {
        return false;
    }

    let rm = CRm::as_ref(rm);
    let intr = (!intr.is_null()).then(|| CInterrupts {
        // SAFETY: intr is non-NULL
        funcs: unsafe { *intr },
        data,
    });

    rm.rm
        .cont_splash_res_init(intr.as_ref().map(|intr| intr as &dyn Interrupts))
}

/// # Safety
#[no_mangle]
pub unsafe extern "C" fn dpurm_rm_finish_cont_splash(rm: *mut dpurm_rm) {
    if rm.is_null() {
        return;
    }

    let rm = CRm::as_ref(rm);
    rm.rm.finish_cont_splash();
}
