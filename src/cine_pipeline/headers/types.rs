//! Cine header structures

/// "CI", the first two bytes of every cine file.
pub const CINE_MAGIC: [u8; 2] = *b"CI";

/// Size of the CineFileHeader structure.
pub const FILE_HEADER_SIZE: u64 = 44;

/// Size of the BitmapInfoHeader structure.
pub const BITMAP_INFO_HEADER_SIZE: u64 = 40;

/// Smallest Setup that still holds every field this crate decodes
/// (ends with the 4096-byte Description).
pub const SETUP_MIN_SIZE: u64 = 5692;

/// Setup size written by current Phantom software.
pub const SETUP_NOMINAL_SIZE: u64 = 6904;

/// The only bit depth supported: two pixels packed into three bytes.
pub const PACKED_12_BIT: u16 = 12;

/// TIME64: 32.32 fixed point, fraction of a second first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Time64 {
    pub fraction: u32,
    pub seconds: u32,
}

impl Time64 {
    const FRACTION_SCALE: f64 = 4_294_967_296.0;

    pub fn new(seconds: u32, fraction: u32) -> Self {
        Self { fraction, seconds }
    }

    /// Seconds since the epoch as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.fraction as f64 / Self::FRACTION_SCALE
    }

    /// Signed distance from `origin`, in seconds.
    pub fn secs_since(&self, origin: Time64) -> f64 {
        (self.seconds as f64 - origin.seconds as f64)
            + (self.fraction as f64 - origin.fraction as f64) / Self::FRACTION_SCALE
    }
}

/// File-level record at offset 0.
#[derive(Debug, Clone, PartialEq)]
pub struct CineFileHeader {
    pub file_type: [u8; 2],
    pub header_size: u16,
    pub compression: u16,
    pub version: u16,
    pub first_movie_image: i32,
    pub total_image_count: u32,
    pub first_image_no: i32,
    pub image_count: u32,
    pub off_image_header: u32,
    pub off_setup: u32,
    pub off_image_offsets: u32,
    pub trigger_time: Time64,
}

/// Per-frame raster description, Windows BITMAPINFOHEADER layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

/// Acquisition settings recorded with the movie.
///
/// Fields ending in `16` are the legacy 16-bit copies kept for old readers;
/// the 32-bit fields further down are authoritative.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Setup {
    pub frame_rate16: u16,
    pub shutter16: u16,
    pub post_trigger16: u16,
    pub frame_delay16: u16,
    pub aspect_ratio: u16,
    pub trig_frame: u8,
    pub mark: String,
    pub length: u16,
    pub im_width: u16,
    pub im_height: u16,
    pub edr_shutter16: u16,
    pub serial: u32,
    pub saturation: i32,
    pub auto_exposure: u32,
    pub flip_h: bool,
    pub flip_v: bool,
    pub grid: u32,
    pub frame_rate: u32,
    pub shutter: u32,
    pub edr_shutter: u32,
    pub post_trigger: u32,
    pub frame_delay: u32,
    pub enable_color: bool,
    pub camera_version: u32,
    pub firmware_version: u32,
    pub software_version: u32,
    pub recording_time_zone: i32,
    pub cfa: u32,
    pub bright: i32,
    pub contrast: i32,
    pub gamma: i32,
    pub auto_exp_level: u32,
    pub auto_exp_speed: u32,
    pub auto_exp_rect: [u32; 4],
    /// Four (red, blue) gain pairs.
    pub wb_gain: [f32; 8],
    pub rotate: i32,
    pub wb_view: [f32; 2],
    pub real_bpp: u32,
    pub ci_calib: u32,
    pub calib_width: u32,
    pub calib_height: u32,
    pub calib_rate: u32,
    pub calib_exp: u32,
    pub calib_edr: u32,
    pub calib_temp: u32,
    pub sensor: u32,
    pub shutter_ns: u32,
    pub edr_shutter_ns: u32,
    pub frame_delay_ns: u32,
    pub im_pos_x_acq: u32,
    pub im_pos_y_acq: u32,
    pub im_width_acq: u32,
    pub im_height_acq: u32,
    pub description: String,
}

/// Everything the header decoder recovers; the context handed to every later
/// stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CineHeaders {
    pub file: CineFileHeader,
    pub bitmap: BitmapInfoHeader,
    pub setup: Setup,
    /// Absolute offset of each recorded frame, in capture order.
    pub image_offsets: Vec<u64>,
}

impl CineHeaders {
    /// Byte range `[start, end)` holding the tagged blocks: after the Setup,
    /// before the offset table.
    pub fn tagged_block_region(&self) -> (u64, u64) {
        let start = self.file.off_setup as u64 + self.setup.length as u64;
        (start, self.file.off_image_offsets as u64)
    }

    pub fn frame_count(&self) -> usize {
        self.image_offsets.len()
    }

    pub fn width(&self) -> usize {
        self.bitmap.width.max(0) as usize
    }

    pub fn height(&self) -> usize {
        self.bitmap.height.max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time64_to_float() {
        let t = Time64::new(1000, 1 << 31);
        assert_eq!(t.as_secs_f64(), 1000.5);
        assert_eq!(Time64::new(1000, 0).as_secs_f64(), 1000.0);
    }

    #[test]
    fn test_time64_relative_to_trigger() {
        let trigger = Time64::new(1000, 1 << 31);
        assert_eq!(Time64::new(1001, 0).secs_since(trigger), 0.5);
        assert_eq!(Time64::new(1000, 0).secs_since(trigger), -0.5);
    }
}
