use tracing::{debug, info, instrument, warn};

use crate::cine_pipeline::common::{ConversionError, Result};
use crate::cine_pipeline::document::types::{
    AttrValue, Dataset, Document, Group, ImageStack, Node,
};
use crate::cine_pipeline::frames::{Frame, FrameSequence};
use crate::cine_pipeline::headers::{BitmapInfoHeader, CineFileHeader, CineHeaders, Setup, Time64};
use crate::cine_pipeline::tagged::{TaggedBlock, TaggedBlockSet};

/// Where `time_float` at the root points.
pub const TIME_FLOAT_TARGET: &str = "/TaggedBlocks/Time/time_float";

/// Receives frames one at a time, in offset-table order.
pub trait FrameSink {
    fn accept(&mut self, frame: Frame) -> Result<()>;
}

impl FrameSink for Vec<Frame> {
    fn accept(&mut self, frame: Frame) -> Result<()> {
        self.push(frame);
        Ok(())
    }
}

/// Outcome of pulling frames from a [`FrameSequence`].
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Frames listed in the (possibly sliced) offset table.
    pub requested: usize,
    pub decoded: usize,
    /// The error that ended the sequence early, if any.
    pub truncated: Option<ConversionError>,
}

impl FrameReport {
    pub fn skipped(&self) -> usize {
        self.requested - self.decoded
    }
}

#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    progress_interval: usize,
    first_frame: usize,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self {
            progress_interval: 500,
            first_frame: 0,
        }
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs progress every `interval` frames; zero disables it.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Offset-table index of the first frame, recorded on the root group.
    pub fn with_first_frame(mut self, first_frame: usize) -> Self {
        self.first_frame = first_frame;
        self
    }

    /// Builds a document with every frame held in memory.
    pub fn build(
        &self,
        headers: &CineHeaders,
        tagged: &TaggedBlockSet,
        frames: &FrameSequence<'_>,
    ) -> Result<(Document, FrameReport)> {
        let mut collected: Vec<Frame> = Vec::with_capacity(frames.len());
        let report = self.stream(frames, &mut collected)?;
        let geometry = frames.geometry();
        let images = ImageStack::Loaded {
            width: geometry.width,
            height: geometry.height,
            frames: collected.into_iter().map(|f| f.pixels).collect(),
        };
        let document = self.assemble(headers, tagged, images)?;
        Ok((document, report))
    }

    /// Pulls every frame into `sink`. A truncated frame ends the pass and is
    /// reported; errors from the sink are fatal.
    #[instrument(skip_all, fields(frames = frames.len()))]
    pub fn stream<S: FrameSink + ?Sized>(
        &self,
        frames: &FrameSequence<'_>,
        sink: &mut S,
    ) -> Result<FrameReport> {
        let mut report = FrameReport {
            requested: frames.len(),
            ..FrameReport::default()
        };

        for frame in frames {
            match frame {
                Ok(frame) => {
                    sink.accept(frame)?;
                    report.decoded += 1;
                    if self.progress_interval > 0 && report.decoded % self.progress_interval == 0 {
                        info!(
                            decoded = report.decoded,
                            total = report.requested,
                            "Frame progress"
                        );
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, decoded = report.decoded, "Frame sequence ended early");
                    report.truncated = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(decoded = report.decoded, skipped = report.skipped(), "Frames pulled");
        Ok(report)
    }

    /// Assembles the document tree around an image stack.
    pub fn assemble(
        &self,
        headers: &CineHeaders,
        tagged: &TaggedBlockSet,
        images: ImageStack,
    ) -> Result<Document> {
        if images.frame_count() == 0 {
            return Err(ConversionError::EmptyRecording);
        }

        let mut meta = Group::new();
        meta.insert_group("CineFileHeader", file_header_group(&headers.file));
        meta.insert_group("BitmapInfoHeader", bitmap_group(&headers.bitmap));
        meta.insert_group("Setup", setup_group(&headers.setup));

        let mut root = Group::new().with_attr("first_frame", self.first_frame);
        root.insert_group("Meta", meta);
        root.insert_group(
            "TaggedBlocks",
            tagged_group(tagged, headers.file.trigger_time),
        );
        root.insert_dataset("images", Dataset::Images(images));
        root.insert("time_float", Node::Link(TIME_FLOAT_TARGET.to_string()));

        Ok(Document::new(root))
    }
}

fn file_header_group(file: &CineFileHeader) -> Group {
    Group::new()
        .with_attr("type", String::from_utf8_lossy(&file.file_type).into_owned())
        .with_attr("header_size", file.header_size)
        .with_attr("compression", file.compression)
        .with_attr("version", file.version)
        .with_attr("first_movie_image", file.first_movie_image)
        .with_attr("total_image_count", file.total_image_count)
        .with_attr("first_image_no", file.first_image_no)
        .with_attr("image_count", file.image_count)
        .with_attr("off_image_header", file.off_image_header)
        .with_attr("off_setup", file.off_setup)
        .with_attr("off_image_offsets", file.off_image_offsets)
        .with_attr("trigger_time_seconds", file.trigger_time.seconds)
        .with_attr("trigger_time_fraction", file.trigger_time.fraction)
        .with_attr("trigger_time", file.trigger_time.as_secs_f64())
}

fn bitmap_group(bitmap: &BitmapInfoHeader) -> Group {
    Group::new()
        .with_attr("size", bitmap.size)
        .with_attr("width", bitmap.width)
        .with_attr("height", bitmap.height)
        .with_attr("planes", bitmap.planes)
        .with_attr("bit_count", bitmap.bit_count)
        .with_attr("compression", bitmap.compression)
        .with_attr("size_image", bitmap.size_image)
        .with_attr("x_pels_per_meter", bitmap.x_pels_per_meter)
        .with_attr("y_pels_per_meter", bitmap.y_pels_per_meter)
        .with_attr("clr_used", bitmap.clr_used)
        .with_attr("clr_important", bitmap.clr_important)
}

fn setup_group(setup: &Setup) -> Group {
    let floats = |values: &[f32]| values.iter().map(|&v| v as f64).collect::<Vec<_>>();
    let mut group = Group::new();

    group.set_attr("frame_rate16", setup.frame_rate16);
    group.set_attr("shutter16", setup.shutter16);
    group.set_attr("post_trigger16", setup.post_trigger16);
    group.set_attr("frame_delay16", setup.frame_delay16);
    group.set_attr("aspect_ratio", setup.aspect_ratio);
    group.set_attr("trig_frame", setup.trig_frame);
    group.set_attr("mark", setup.mark.as_str());
    group.set_attr("length", setup.length);
    group.set_attr("im_width", setup.im_width);
    group.set_attr("im_height", setup.im_height);
    group.set_attr("edr_shutter16", setup.edr_shutter16);
    group.set_attr("serial", setup.serial);
    group.set_attr("saturation", setup.saturation);
    group.set_attr("auto_exposure", setup.auto_exposure);
    group.set_attr("flip_h", setup.flip_h);
    group.set_attr("flip_v", setup.flip_v);
    group.set_attr("grid", setup.grid);
    group.set_attr("frame_rate", setup.frame_rate);
    group.set_attr("shutter", setup.shutter);
    group.set_attr("edr_shutter", setup.edr_shutter);
    group.set_attr("post_trigger", setup.post_trigger);
    group.set_attr("frame_delay", setup.frame_delay);
    group.set_attr("enable_color", setup.enable_color);
    group.set_attr("camera_version", setup.camera_version);
    group.set_attr("firmware_version", setup.firmware_version);
    group.set_attr("software_version", setup.software_version);
    group.set_attr("recording_time_zone", setup.recording_time_zone);
    group.set_attr("cfa", setup.cfa);
    group.set_attr("bright", setup.bright);
    group.set_attr("contrast", setup.contrast);
    group.set_attr("gamma", setup.gamma);
    group.set_attr("auto_exp_level", setup.auto_exp_level);
    group.set_attr("auto_exp_speed", setup.auto_exp_speed);
    group.set_attr(
        "auto_exp_rect",
        AttrValue::UIntArray(setup.auto_exp_rect.iter().map(|&v| v as u64).collect()),
    );
    group.set_attr("wb_gain", AttrValue::FloatArray(floats(&setup.wb_gain)));
    group.set_attr("rotate", setup.rotate);
    group.set_attr("wb_view", AttrValue::FloatArray(floats(&setup.wb_view)));
    group.set_attr("real_bpp", setup.real_bpp);
    group.set_attr("ci_calib", setup.ci_calib);
    group.set_attr("calib_width", setup.calib_width);
    group.set_attr("calib_height", setup.calib_height);
    group.set_attr("calib_rate", setup.calib_rate);
    group.set_attr("calib_exp", setup.calib_exp);
    group.set_attr("calib_edr", setup.calib_edr);
    group.set_attr("calib_temp", setup.calib_temp);
    group.set_attr("sensor", setup.sensor);
    group.set_attr("shutter_ns", setup.shutter_ns);
    group.set_attr("edr_shutter_ns", setup.edr_shutter_ns);
    group.set_attr("frame_delay_ns", setup.frame_delay_ns);
    group.set_attr("im_pos_x_acq", setup.im_pos_x_acq);
    group.set_attr("im_pos_y_acq", setup.im_pos_y_acq);
    group.set_attr("im_width_acq", setup.im_width_acq);
    group.set_attr("im_height_acq", setup.im_height_acq);
    group.set_attr("description", setup.description.as_str());

    group
}

fn tagged_group(tagged: &TaggedBlockSet, trigger: Time64) -> Group {
    let mut group = Group::new().with_attr("malformed_blocks", tagged.gaps().len());

    for (name, block) in tagged.iter() {
        match block {
            TaggedBlock::Time(times) => {
                let mut time = Group::new();
                time.insert_dataset(
                    "seconds",
                    Dataset::U32(times.iter().map(|t| t.seconds).collect()),
                );
                time.insert_dataset(
                    "fraction",
                    Dataset::U32(times.iter().map(|t| t.fraction).collect()),
                );
                time.insert_dataset(
                    "time_float",
                    Dataset::F64(tagged.time_float().unwrap_or_default()),
                );
                time.insert_dataset(
                    "time_from_trigger",
                    Dataset::F64(tagged.time_from_trigger(trigger).unwrap_or_default()),
                );
                group.insert_group(name, time);
            }
            TaggedBlock::Exposure(values) => {
                let mut exposure = Group::new();
                exposure.insert_dataset("fraction", Dataset::U32(values.clone()));
                exposure.insert_dataset(
                    "exposure_float",
                    Dataset::F64(tagged.exposure_float().unwrap_or_default()),
                );
                group.insert_group(name, exposure);
            }
            TaggedBlock::Opaque { payload, .. } => {
                group.insert_dataset(name, Dataset::Bytes(payload.clone()));
            }
        }
    }

    if tagged.times().is_none() {
        warn!("No usable Time block; time_float will be empty");
        let mut time = Group::new();
        time.insert_dataset("time_float", Dataset::F64(Vec::new()));
        group.insert_group("Time", time);
    }

    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cine_pipeline::fixture::CineFixture;
    use crate::cine_pipeline::frames::{FrameLayout, unpack_frames};
    use crate::cine_pipeline::headers::decode_headers;
    use crate::cine_pipeline::tagged::decode_tagged_blocks;

    fn convert(bytes: &[u8]) -> Result<(Document, FrameReport)> {
        let headers = decode_headers(bytes)?;
        let tagged = decode_tagged_blocks(bytes, &headers)?;
        let frames = unpack_frames(
            bytes,
            &headers.image_offsets,
            headers.bitmap.width as i64,
            headers.bitmap.height as i64,
            headers.bitmap.bit_count,
        )?
        .with_layout(FrameLayout::Annotated);
        DocumentBuilder::new().build(&headers, &tagged, &frames)
    }

    #[test]
    fn test_two_frame_recording() {
        let fixture = CineFixture::new(4, 2).frames(2);
        let (doc, report) = convert(&fixture.build()).unwrap();

        let images = doc.images().unwrap();
        assert_eq!(images.shape(), (2, 2, 4));
        assert_eq!(images.frame(0).unwrap(), fixture.pixels(0).as_slice());
        assert_eq!(images.frame(1).unwrap(), fixture.pixels(1).as_slice());
        assert_eq!(report.decoded, 2);
        assert!(report.truncated.is_none());

        let time_float = doc.dataset("time_float").unwrap().as_f64().unwrap();
        assert_eq!(time_float.len(), 2);
        assert!((time_float[0] - 1000.0).abs() < 1e-6);
        assert!((time_float[1] - 1000.01).abs() < 1e-6);

        assert_eq!(
            doc.attr("Meta/BitmapInfoHeader", "width"),
            Some(&AttrValue::Int(4))
        );
        assert_eq!(
            doc.attr("Meta/Setup", "description"),
            Some(&AttrValue::Text("synthetic recording".to_string()))
        );
    }

    #[test]
    fn test_alias_matches_target() {
        let (doc, _) = convert(&CineFixture::new(4, 2).frames(3).build()).unwrap();
        assert_eq!(doc.dataset("time_float"), doc.dataset(TIME_FLOAT_TARGET));
        assert!(matches!(doc.node("time_float"), Some(Node::Link(_))));
    }

    #[test]
    fn test_decoding_twice_is_identical() {
        let bytes = CineFixture::new(6, 4).frames(3).build();
        let (first, _) = convert(&bytes).unwrap();
        let (second, _) = convert(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncated_last_frame_keeps_earlier_frames() {
        let fixture = CineFixture::new(4, 2).frames(3).truncate(1);
        let (doc, report) = convert(&fixture.build()).unwrap();

        assert_eq!(doc.images().unwrap().shape(), (2, 2, 4));
        assert_eq!(report.skipped(), 1);
        assert!(matches!(
            report.truncated,
            Some(ConversionError::TruncatedFrame { frame: 2, .. })
        ));
        // Per-frame series still describe the whole recording.
        assert_eq!(doc.dataset("time_float").unwrap().shape(), vec![3]);
    }

    #[test]
    fn test_missing_time_block_gives_empty_series() {
        let bytes = CineFixture::new(4, 2).without_time().build();
        let (doc, _) = convert(&bytes).unwrap();

        assert_eq!(doc.dataset("time_float"), Some(&Dataset::F64(Vec::new())));
        assert!(doc.dataset("TaggedBlocks/Exposure/exposure_float").is_some());
    }

    #[test]
    fn test_opaque_blocks_are_datasets() {
        let bytes = CineFixture::new(4, 2).extra_block(1010, vec![7, 8]).build();
        let (doc, _) = convert(&bytes).unwrap();
        assert_eq!(
            doc.dataset("TaggedBlocks/Block1010").and_then(Dataset::as_bytes),
            Some(&[7u8, 8][..])
        );
    }

    #[test]
    fn test_no_frames_is_empty_recording() {
        let bytes = CineFixture::new(4, 2).frames(0).build();
        assert!(matches!(convert(&bytes), Err(ConversionError::EmptyRecording)));
    }

    #[test]
    fn test_sink_errors_are_fatal() {
        struct FailingSink;
        impl FrameSink for FailingSink {
            fn accept(&mut self, _frame: Frame) -> Result<()> {
                Err(ConversionError::EncodeError("disk full".to_string()))
            }
        }

        let bytes = CineFixture::new(4, 2).build();
        let headers = decode_headers(&bytes).unwrap();
        let frames = unpack_frames(&bytes, &headers.image_offsets, 4, 2, 12)
            .unwrap()
            .with_layout(FrameLayout::Annotated);
        let result = DocumentBuilder::new().stream(&frames, &mut FailingSink);
        assert!(matches!(result, Err(ConversionError::EncodeError(_))));
    }
}
