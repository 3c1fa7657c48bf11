use std::path::Path;

use tracing::{Span, info, info_span, instrument, warn};

use crate::cine_pipeline::{
    common::error::Result,
    conversions::report::ConversionReport,
    document::{Document, DocumentBuilder, FrameReport, FrameSink, ImageStack},
    frames::{Frame, FrameSequence, unpack_frames},
    headers::{CineHeaders, decode_headers},
    output::{ConversionConfig, DocumentWriter, StandardDocumentWriter},
    source::CineSource,
    tagged::{TaggedBlockSet, decode_tagged_blocks},
};

pub struct CineToDocumentPipeline<W: DocumentWriter> {
    writer: W,
    config: ConversionConfig,
}

impl CineToDocumentPipeline<StandardDocumentWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            writer: StandardDocumentWriter,
            config,
        }
    }
}

impl<W: DocumentWriter> CineToDocumentPipeline<W> {
    pub fn with_custom(writer: W, config: ConversionConfig) -> Self {
        Self { writer, config }
    }

    fn builder(&self, first_frame: usize) -> DocumentBuilder {
        DocumentBuilder::new()
            .with_progress_interval(self.config.progress_interval)
            .with_first_frame(first_frame)
    }

    /// Frame sequence for the configured slice of the offset table.
    fn frame_sequence<'a>(
        &self,
        bytes: &'a [u8],
        headers: &'a CineHeaders,
    ) -> Result<(FrameSequence<'a>, (usize, usize))> {
        let (start, end) = self.config.frame_window(headers.frame_count());
        if (start, end) != (0, headers.frame_count()) {
            info!(start, end, "Converting a slice of the recording");
        }
        let frames = unpack_frames(
            bytes,
            &headers.image_offsets[start..end],
            headers.bitmap.width as i64,
            headers.bitmap.height as i64,
            headers.bitmap.bit_count,
        )?
        .with_layout(self.config.frame_layout)
        .starting_at(start);
        Ok((frames, (start, end)))
    }

    /// Tagged-block decoding and frame streaming, run side by side.
    fn decode_concurrently<S: FrameSink + Send>(
        &self,
        bytes: &[u8],
        headers: &CineHeaders,
        frames: &FrameSequence<'_>,
        builder: &DocumentBuilder,
        sink: &mut S,
    ) -> (Result<TaggedBlockSet>, Result<FrameReport>) {
        let parent = Span::current();
        rayon::join(
            || {
                parent.in_scope(|| {
                    let _span = info_span!("decode_tagged_blocks").entered();
                    decode_tagged_blocks(bytes, headers)
                })
            },
            || {
                parent.in_scope(|| {
                    let _span = info_span!("stream_frames").entered();
                    builder.stream(frames, sink)
                })
            },
        )
    }

    /// Decodes a whole recording into an in-memory document.
    #[instrument(skip(self, input_data), fields(input_size = input_data.len()))]
    pub fn decode(&self, input_data: &[u8]) -> Result<(Document, ConversionReport)> {
        let headers = {
            let _span = info_span!("decode_headers").entered();
            decode_headers(input_data)?
        };
        let (frames, (start, end)) = self.frame_sequence(input_data, &headers)?;
        let builder = self.builder(start);

        let mut collected: Vec<Frame> = Vec::with_capacity(frames.len());
        let (tagged, frame_report) =
            self.decode_concurrently(input_data, &headers, &frames, &builder, &mut collected);
        let tagged = tagged?.select_frames(start, end);
        let frame_report = frame_report?;

        let geometry = frames.geometry();
        let images = ImageStack::Loaded {
            width: geometry.width,
            height: geometry.height,
            frames: collected.into_iter().map(|f| f.pixels).collect(),
        };
        let document = {
            let _span = info_span!("assemble_document").entered();
            builder.assemble(&headers, &tagged, images)?
        };

        let report =
            ConversionReport::new(geometry.width, geometry.height, start, frame_report, &tagged);
        Ok((document, report))
    }

    /// Converts a recording held in memory, streaming frames to `output`.
    ///
    /// Header problems fail before anything is written. Once output exists,
    /// any fatal error discards it.
    #[instrument(skip(self, input_data, output), fields(input_size = input_data.len()))]
    pub fn convert(&self, input_data: &[u8], output: &Path) -> Result<ConversionReport> {
        info!("Starting cine to document conversion");

        let headers = {
            let _span = info_span!("decode_headers").entered();
            decode_headers(input_data)?
        };
        info!(
            width = headers.width(),
            height = headers.height(),
            frames = headers.frame_count(),
            "Headers decoded"
        );

        let (frames, (start, end)) = self.frame_sequence(input_data, &headers)?;
        let builder = self.builder(start);

        let mut sink = {
            let _span = info_span!("open_output").entered();
            self.writer.begin(output, frames.geometry(), &self.config)?
        };

        let (tagged, frame_report) =
            self.decode_concurrently(input_data, &headers, &frames, &builder, &mut sink);

        let assembled = tagged.and_then(|tagged| {
            let frame_report = frame_report?;
            let tagged = tagged.select_frames(start, end);
            let geometry = frames.geometry();
            let images = ImageStack::Streamed {
                width: geometry.width,
                height: geometry.height,
                frame_count: frame_report.decoded,
            };
            let _span = info_span!("assemble_document").entered();
            let document = builder.assemble(&headers, &tagged, images)?;
            Ok((document, tagged, frame_report))
        });

        let (document, tagged, frame_report) = match assembled {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "Conversion failed; discarding partial output");
                self.writer.discard(sink, output);
                return Err(e);
            }
        };

        {
            let _span = info_span!("write_document").entered();
            self.writer.finish(sink, &document, output)?;
        }

        let geometry = frames.geometry();
        let report =
            ConversionReport::new(geometry.width, geometry.height, start, frame_report, &tagged);
        info!(
            frames = report.frames_decoded,
            skipped = report.frames_skipped(),
            malformed_blocks = tagged.gaps().len(),
            "Conversion complete"
        );
        Ok(report)
    }

    #[instrument(skip(self, input_path, output_path))]
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<ConversionReport> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let source = {
            let _span = info_span!("map_input_file").entered();
            CineSource::open(input_path)?
        };

        self.convert(source.bytes(), output_path)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConversionConfig) {
        self.config = config;
    }
}
