//! Field offsets inside the Setup structure.
//!
//! Setup is a packed (unaligned) C struct. Only the fields worth keeping are
//! listed; the gaps hold deprecated values, signal-acquisition settings and
//! viewer state.

use crate::cine_pipeline::common::{ByteCursor, Result};
use crate::cine_pipeline::headers::types::Setup;

const FRAME_RATE16: u64 = 0;
const SHUTTER16: u64 = 2;
const POST_TRIGGER16: u64 = 4;
const FRAME_DELAY16: u64 = 6;
const ASPECT_RATIO: u64 = 8;
pub(crate) const TRIG_FRAME: u64 = 17;
pub(crate) const MARK: u64 = 140;
pub(crate) const LENGTH: u64 = 142;

pub(crate) const IM_WIDTH: u64 = 737;
pub(crate) const IM_HEIGHT: u64 = 739;
const EDR_SHUTTER16: u64 = 741;
pub(crate) const SERIAL: u64 = 743;
const SATURATION: u64 = 747;
const AUTO_EXPOSURE: u64 = 752;
const FLIP_H: u64 = 756;
const FLIP_V: u64 = 760;
const GRID: u64 = 764;
pub(crate) const FRAME_RATE: u64 = 768;
pub(crate) const SHUTTER: u64 = 772;
const EDR_SHUTTER: u64 = 776;
const POST_TRIGGER: u64 = 780;
const FRAME_DELAY: u64 = 784;
const ENABLE_COLOR: u64 = 788;
const CAMERA_VERSION: u64 = 792;
const FIRMWARE_VERSION: u64 = 796;
const SOFTWARE_VERSION: u64 = 800;
const RECORDING_TIME_ZONE: u64 = 804;
const CFA: u64 = 808;
const BRIGHT: u64 = 812;
const CONTRAST: u64 = 816;
const GAMMA: u64 = 820;
const AUTO_EXP_LEVEL: u64 = 828;
const AUTO_EXP_SPEED: u64 = 832;
const AUTO_EXP_RECT: u64 = 836;
const WB_GAIN: u64 = 852;
const ROTATE: u64 = 884;
const WB_VIEW: u64 = 888;
pub(crate) const REAL_BPP: u64 = 896;

const CI_CALIB: u64 = 1504;
const CALIB_WIDTH: u64 = 1508;
const CALIB_HEIGHT: u64 = 1512;
const CALIB_RATE: u64 = 1516;
const CALIB_EXP: u64 = 1520;
const CALIB_EDR: u64 = 1524;
const CALIB_TEMP: u64 = 1528;
const SENSOR: u64 = 1564;
pub(crate) const SHUTTER_NS: u64 = 1568;
const EDR_SHUTTER_NS: u64 = 1572;
const FRAME_DELAY_NS: u64 = 1576;
const IM_POS_X_ACQ: u64 = 1580;
const IM_POS_Y_ACQ: u64 = 1584;
const IM_WIDTH_ACQ: u64 = 1588;
const IM_HEIGHT_ACQ: u64 = 1592;
pub(crate) const DESCRIPTION: u64 = 1596;
pub(crate) const DESCRIPTION_LEN: u64 = 4096;

/// Decodes the Setup block starting at `base`. The caller has already checked
/// that the declared length covers every offset used here.
pub(crate) fn decode_setup(cursor: ByteCursor<'_>, base: u64) -> Result<Setup> {
    let u16_at = |rel: u64| cursor.read::<u16>(base + rel);
    let u32_at = |rel: u64| cursor.read::<u32>(base + rel);
    let i32_at = |rel: u64| cursor.read::<i32>(base + rel);
    let bool_at = |rel: u64| cursor.read_bool32(base + rel);

    let rect = cursor.read_array::<u32>(base + AUTO_EXP_RECT, 4)?;
    let gains = cursor.read_array::<f32>(base + WB_GAIN, 8)?;
    let view = cursor.read_array::<f32>(base + WB_VIEW, 2)?;

    let mut auto_exp_rect = [0u32; 4];
    auto_exp_rect.copy_from_slice(&rect);
    let mut wb_gain = [0f32; 8];
    wb_gain.copy_from_slice(&gains);
    let mut wb_view = [0f32; 2];
    wb_view.copy_from_slice(&view);

    Ok(Setup {
        frame_rate16: u16_at(FRAME_RATE16)?,
        shutter16: u16_at(SHUTTER16)?,
        post_trigger16: u16_at(POST_TRIGGER16)?,
        frame_delay16: u16_at(FRAME_DELAY16)?,
        aspect_ratio: u16_at(ASPECT_RATIO)?,
        trig_frame: cursor.read::<u8>(base + TRIG_FRAME)?,
        mark: cursor.read_str(base + MARK, 2)?,
        length: u16_at(LENGTH)?,
        im_width: u16_at(IM_WIDTH)?,
        im_height: u16_at(IM_HEIGHT)?,
        edr_shutter16: u16_at(EDR_SHUTTER16)?,
        serial: u32_at(SERIAL)?,
        saturation: i32_at(SATURATION)?,
        auto_exposure: u32_at(AUTO_EXPOSURE)?,
        flip_h: bool_at(FLIP_H)?,
        flip_v: bool_at(FLIP_V)?,
        grid: u32_at(GRID)?,
        frame_rate: u32_at(FRAME_RATE)?,
        shutter: u32_at(SHUTTER)?,
        edr_shutter: u32_at(EDR_SHUTTER)?,
        post_trigger: u32_at(POST_TRIGGER)?,
        frame_delay: u32_at(FRAME_DELAY)?,
        enable_color: bool_at(ENABLE_COLOR)?,
        camera_version: u32_at(CAMERA_VERSION)?,
        firmware_version: u32_at(FIRMWARE_VERSION)?,
        software_version: u32_at(SOFTWARE_VERSION)?,
        recording_time_zone: i32_at(RECORDING_TIME_ZONE)?,
        cfa: u32_at(CFA)?,
        bright: i32_at(BRIGHT)?,
        contrast: i32_at(CONTRAST)?,
        gamma: i32_at(GAMMA)?,
        auto_exp_level: u32_at(AUTO_EXP_LEVEL)?,
        auto_exp_speed: u32_at(AUTO_EXP_SPEED)?,
        auto_exp_rect,
        wb_gain,
        rotate: i32_at(ROTATE)?,
        wb_view,
        real_bpp: u32_at(REAL_BPP)?,
        ci_calib: u32_at(CI_CALIB)?,
        calib_width: u32_at(CALIB_WIDTH)?,
        calib_height: u32_at(CALIB_HEIGHT)?,
        calib_rate: u32_at(CALIB_RATE)?,
        calib_exp: u32_at(CALIB_EXP)?,
        calib_edr: u32_at(CALIB_EDR)?,
        calib_temp: u32_at(CALIB_TEMP)?,
        sensor: u32_at(SENSOR)?,
        shutter_ns: u32_at(SHUTTER_NS)?,
        edr_shutter_ns: u32_at(EDR_SHUTTER_NS)?,
        frame_delay_ns: u32_at(FRAME_DELAY_NS)?,
        im_pos_x_acq: u32_at(IM_POS_X_ACQ)?,
        im_pos_y_acq: u32_at(IM_POS_Y_ACQ)?,
        im_width_acq: u32_at(IM_WIDTH_ACQ)?,
        im_height_acq: u32_at(IM_HEIGHT_ACQ)?,
        description: cursor.read_str(base + DESCRIPTION, DESCRIPTION_LEN)?,
    })
}
