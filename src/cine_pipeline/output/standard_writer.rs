use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tiff::encoder::colortype::Gray16;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::{debug, info, instrument, warn};

use crate::cine_pipeline::common::error::{ConversionError, Result};
use crate::cine_pipeline::document::{Dataset, Document, FrameSink, Group, Node};
use crate::cine_pipeline::frames::{Frame, FrameGeometry};
use crate::cine_pipeline::output::types::{ConversionConfig, TiffCompression};
use crate::cine_pipeline::output::writer::DocumentWriter;

pub const IMAGES_FILE: &str = "images.tiff";
pub const DOCUMENT_FILE: &str = "document.json";

/// Writes a directory holding `images.tiff` (one Gray16 page per frame) and
/// `document.json` (the tree, with `images` as an external reference).
pub struct StandardDocumentWriter;

/// Buffered `images.tiff` handle shared with the encoder.
///
/// The encoder cannot hand its writer back, so `finish` reclaims the buffer
/// through this handle once the encoder is dropped and flushes it explicitly.
#[derive(Clone)]
struct ImageFile(Arc<Mutex<BufWriter<File>>>);

impl ImageFile {
    fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(BufWriter::new(file))))
    }

    fn with<T>(&self, op: impl FnOnce(&mut BufWriter<File>) -> io::Result<T>) -> io::Result<T> {
        let mut writer = self
            .0
            .lock()
            .map_err(|_| io::Error::other("image file lock poisoned"))?;
        op(&mut writer)
    }

    /// Flushes buffered pages and syncs the file. Fails if the encoder still
    /// holds a handle.
    fn close(self) -> io::Result<()> {
        let writer = Arc::try_unwrap(self.0)
            .map_err(|_| io::Error::other("image file still in use"))?
            .into_inner()
            .map_err(|_| io::Error::other("image file lock poisoned"))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl Write for ImageFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|w| w.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|w| w.flush())
    }
}

impl Seek for ImageFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.with(|w| w.seek(pos))
    }
}

/// Appends frames to `images.tiff` as they arrive.
pub struct TiffPageSink {
    encoder: TiffEncoder<ImageFile>,
    file: ImageFile,
    width: u32,
    height: u32,
    pages: usize,
    images_path: PathBuf,
    /// Set when `begin` had to create the output directory.
    created_dir: Option<PathBuf>,
}

impl TiffPageSink {
    pub fn pages(&self) -> usize {
        self.pages
    }
}

impl FrameSink for TiffPageSink {
    fn accept(&mut self, frame: Frame) -> Result<()> {
        self.encoder
            .write_image::<Gray16>(self.width, self.height, &frame.pixels)
            .map_err(|e| ConversionError::EncodeError(format!("frame {}: {}", frame.index, e)))?;
        self.pages += 1;
        Ok(())
    }
}

fn tiff_compression(compression: TiffCompression) -> Compression {
    match compression {
        TiffCompression::None => Compression::Uncompressed,
        TiffCompression::Lzw => Compression::Lzw,
        TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
        TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
        TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> ConversionError {
    ConversionError::OutputWriteError(format!("{}: {}", path.display(), e))
}

/// Removes whatever the run left in `output`. Pre-existing content stays.
fn remove_partial_output(output: &Path, images_path: &Path, created_dir: Option<PathBuf>) {
    if let Err(e) = fs::remove_file(images_path) {
        warn!(path = %images_path.display(), error = %e, "Could not remove partial image stack");
    }
    let staging = output.join(format!("{DOCUMENT_FILE}.partial"));
    if staging.exists() {
        if let Err(e) = fs::remove_file(&staging) {
            warn!(path = %staging.display(), error = %e, "Could not remove staged document");
        }
    }
    if let Some(dir) = created_dir {
        if let Err(e) = fs::remove_dir(&dir) {
            warn!(path = %dir.display(), error = %e, "Could not remove output directory");
        }
    }
    debug!(output = %output.display(), "Discarded partial output");
}

fn write_document(
    file: ImageFile,
    images_path: &Path,
    document: &Document,
    output: &Path,
) -> Result<()> {
    file.close().map_err(|e| write_error(images_path, e))?;

    let tree = group_json(&document.root)?;
    let text = serde_json::to_string_pretty(&tree)
        .map_err(|e| ConversionError::OutputWriteError(e.to_string()))?;

    // Rename into place so a partial document.json never exists.
    let final_path = output.join(DOCUMENT_FILE);
    let staging = output.join(format!("{DOCUMENT_FILE}.partial"));
    fs::write(&staging, text).map_err(|e| write_error(&staging, e))?;
    fs::rename(&staging, &final_path).map_err(|e| write_error(&final_path, e))?;
    Ok(())
}

impl DocumentWriter for StandardDocumentWriter {
    type Sink = TiffPageSink;

    #[instrument(skip_all, fields(output = %output.display()))]
    fn begin(
        &self,
        output: &Path,
        geometry: FrameGeometry,
        config: &ConversionConfig,
    ) -> Result<TiffPageSink> {
        let created_dir = if output.is_dir() {
            None
        } else {
            fs::create_dir_all(output).map_err(|e| write_error(output, e))?;
            Some(output.to_path_buf())
        };

        let images_path = output.join(IMAGES_FILE);
        let file = File::create(&images_path).map_err(|e| write_error(&images_path, e))?;
        let file = ImageFile::new(file);

        let mut encoder = TiffEncoder::new(file.clone())
            .map_err(|e| ConversionError::EncodeError(e.to_string()))?
            .with_compression(tiff_compression(config.compression));

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        debug!(
            width = geometry.width,
            height = geometry.height,
            compression = ?config.compression,
            "Opened image stack"
        );

        Ok(TiffPageSink {
            encoder,
            file,
            width: geometry.width as u32,
            height: geometry.height as u32,
            pages: 0,
            images_path,
            created_dir,
        })
    }

    /// Flushes the image stack and writes `document.json`. On failure the
    /// partial output is removed as in [`DocumentWriter::discard`].
    #[instrument(skip_all, fields(output = %output.display()))]
    fn finish(&self, sink: TiffPageSink, document: &Document, output: &Path) -> Result<()> {
        let TiffPageSink {
            encoder,
            file,
            pages,
            images_path,
            created_dir,
            ..
        } = sink;
        drop(encoder);

        if let Err(e) = write_document(file, &images_path, document, output) {
            warn!(error = %e, "Could not finish document; discarding partial output");
            remove_partial_output(output, &images_path, created_dir);
            return Err(e);
        }

        info!(
            pages,
            document = %output.join(DOCUMENT_FILE).display(),
            "Document written"
        );
        Ok(())
    }

    fn discard(&self, sink: TiffPageSink, output: &Path) {
        let TiffPageSink {
            encoder,
            file,
            images_path,
            created_dir,
            ..
        } = sink;
        drop(encoder);
        drop(file);
        remove_partial_output(output, &images_path, created_dir);
    }
}

fn group_json(group: &Group) -> Result<Value> {
    let attributes = serde_json::to_value(&group.attributes)
        .map_err(|e| ConversionError::OutputWriteError(e.to_string()))?;

    let mut children = Map::new();
    for (name, node) in &group.children {
        let value = match node {
            Node::Group(child) => group_json(child)?,
            Node::Dataset(dataset) => dataset_json(dataset),
            Node::Link(target) => json!({ "link": target }),
        };
        children.insert(name.clone(), value);
    }

    Ok(json!({
        "attributes": attributes,
        "children": Value::Object(children),
    }))
}

fn dataset_json(dataset: &Dataset) -> Value {
    let data = match dataset {
        Dataset::Images(_) => return json!({
            "dtype": dataset.dtype(),
            "shape": dataset.shape(),
            "external": IMAGES_FILE,
        }),
        Dataset::F64(values) => json!(values),
        Dataset::U32(values) => json!(values),
        Dataset::Bytes(values) => json!(values),
    };
    json!({
        "dtype": dataset.dtype(),
        "shape": dataset.shape(),
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cine_pipeline::document::ImageStack;

    fn frame(index: usize, value: u16) -> Frame {
        Frame {
            index,
            width: 4,
            height: 2,
            pixels: vec![value; 8],
        }
    }

    fn document(frames: usize) -> Document {
        let mut time = Group::new();
        time.insert_dataset("time_float", Dataset::F64(vec![1000.0, 1000.5]));
        let mut tagged = Group::new();
        tagged.insert_group("Time", time);

        let mut root = Group::new().with_attr("first_frame", 0usize);
        root.insert_group("TaggedBlocks", tagged);
        root.insert_dataset(
            "images",
            Dataset::Images(ImageStack::Streamed {
                width: 4,
                height: 2,
                frame_count: frames,
            }),
        );
        root.insert(
            "time_float",
            Node::Link("/TaggedBlocks/Time/time_float".to_string()),
        );
        Document::new(root)
    }

    fn geometry() -> FrameGeometry {
        FrameGeometry::new(4, 2, 12).unwrap()
    }

    #[test]
    fn test_writes_pages_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("recording.cinedoc");
        let writer = StandardDocumentWriter;

        let mut sink = writer
            .begin(&output, geometry(), &ConversionConfig::default())
            .unwrap();
        sink.accept(frame(0, 100)).unwrap();
        sink.accept(frame(1, 4095)).unwrap();
        assert_eq!(sink.pages(), 2);
        writer.finish(sink, &document(2), &output).unwrap();

        let text = fs::read_to_string(output.join(DOCUMENT_FILE)).unwrap();
        let tree: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            tree["children"]["time_float"]["link"],
            "/TaggedBlocks/Time/time_float"
        );
        assert_eq!(tree["children"]["images"]["shape"], json!([2, 2, 4]));
        assert_eq!(tree["children"]["images"]["external"], IMAGES_FILE);
        assert_eq!(
            tree["children"]["TaggedBlocks"]["children"]["Time"]["children"]["time_float"]["data"],
            json!([1000.0, 1000.5])
        );
        assert_eq!(tree["attributes"]["first_frame"], 0);

        let mut decoder = tiff::decoder::Decoder::new(File::open(output.join(IMAGES_FILE)).unwrap())
            .unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (4, 2));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U16(pixels) => assert_eq!(pixels, vec![100u16; 8]),
            _ => panic!("expected 16-bit pixels"),
        }
        assert!(decoder.more_images());
        decoder.next_image().unwrap();
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U16(pixels) => assert_eq!(pixels, vec![4095u16; 8]),
            _ => panic!("expected 16-bit pixels"),
        }
    }

    #[test]
    fn test_compressed_stack() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .compression(TiffCompression::DeflateBalanced)
            .predictor(Some(2))
            .build();
        let writer = StandardDocumentWriter;

        let mut sink = writer.begin(dir.path(), geometry(), &config).unwrap();
        sink.accept(frame(0, 7)).unwrap();
        writer.finish(sink, &document(1), dir.path()).unwrap();

        assert!(dir.path().join(IMAGES_FILE).exists());
        assert!(dir.path().join(DOCUMENT_FILE).exists());
    }

    #[test]
    fn test_discard_removes_only_created_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("new");
        let writer = StandardDocumentWriter;

        let mut sink = writer
            .begin(&output, geometry(), &ConversionConfig::default())
            .unwrap();
        sink.accept(frame(0, 1)).unwrap();
        writer.discard(sink, &output);
        assert!(!output.exists());

        fs::write(dir.path().join("keep.txt"), b"mine").unwrap();
        let sink = writer
            .begin(dir.path(), geometry(), &ConversionConfig::default())
            .unwrap();
        writer.discard(sink, dir.path());
        assert!(dir.path().exists());
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join(IMAGES_FILE).exists());
        assert!(!dir.path().join(DOCUMENT_FILE).exists());
    }

    #[test]
    fn test_wrong_frame_size_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StandardDocumentWriter;
        let mut sink = writer
            .begin(dir.path(), geometry(), &ConversionConfig::default())
            .unwrap();

        let short = Frame {
            index: 3,
            width: 4,
            height: 2,
            pixels: vec![0; 5],
        };
        assert!(matches!(
            sink.accept(short),
            Err(ConversionError::EncodeError(_))
        ));
    }

    #[test]
    fn test_failed_finish_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StandardDocumentWriter;
        fs::create_dir(dir.path().join(DOCUMENT_FILE)).unwrap();
        fs::write(dir.path().join(DOCUMENT_FILE).join("occupied"), b"x").unwrap();

        let mut sink = writer
            .begin(dir.path(), geometry(), &ConversionConfig::default())
            .unwrap();
        sink.accept(frame(0, 5)).unwrap();

        assert!(matches!(
            writer.finish(sink, &document(1), dir.path()),
            Err(ConversionError::OutputWriteError(_))
        ));
        assert!(!dir.path().join(IMAGES_FILE).exists());
        assert!(!dir.path().join(format!("{DOCUMENT_FILE}.partial")).exists());
        assert!(dir.path().join(DOCUMENT_FILE).join("occupied").exists());
    }

    #[test]
    fn test_image_file_close_flushes_buffered_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffered.bin");
        let file = ImageFile::new(File::create(&path).unwrap());

        let mut handle = file.clone();
        handle.write_all(b"page").unwrap();
        assert_eq!(handle.stream_position().unwrap(), 4);
        assert!(file.clone().close().is_err());
        drop(handle);

        file.close().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"page");
    }
}
