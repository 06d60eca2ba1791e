//! Smart converter
//!
//! Maps a source file's type to suggested target formats and dispatches the
//! conversion to one of three backends: the in-process image encoder, the
//! ffmpeg binary, or pandoc for documents.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageFormat, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::core::config::AppConfig;
use crate::core::models::{
    AppError, AppResult, ConversionRequest, MediaKind, TargetFormat,
};
use crate::core::progress::ProgressReporter;
use crate::core::tools::{stderr_tail, Tool};
use crate::utils::file_utils::{ensure_dir_exists, get_file_extension};

/// Icon sizes embedded in generated `.ico` files
pub const ICO_SIZES: [u32; 6] = [16, 32, 48, 64, 128, 256];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "avi", "mov", "flv", "wmv", "m4v", "mpeg", "mpg", "3gp", "ts", "ogv",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "oga", "opus", "m4a", "wma", "aiff", "aif",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "ico", "tif", "tiff", "svg",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "txt", "md", "markdown", "html", "htm", "epub", "tex",
];

/// Guess the media kind of a file from its extension
pub fn detect_kind(path: &Path) -> MediaKind {
    let ext = match path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(get_file_extension)
    {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return MediaKind::Unknown,
    };

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Document
    } else {
        MediaKind::Unknown
    }
}

/// Target formats offered for a kind of input
pub fn suggest_targets(kind: MediaKind) -> Vec<TargetFormat> {
    use TargetFormat::*;
    match kind {
        MediaKind::Video => vec![Mp4, Mp3, Wav, Gif],
        MediaKind::Audio => vec![Mp3, Wav, Mp4],
        MediaKind::Image => vec![Png, Jpg, Ico, Webp],
        MediaKind::Document => vec![Pdf, Docx, Txt, Md],
        MediaKind::Unknown => vec![Mp3, Mp4, Png, Jpg, Pdf, Txt],
    }
}

/// Suggestions for a concrete file
pub fn suggest_for_path(path: &Path) -> Vec<TargetFormat> {
    suggest_targets(detect_kind(path))
}

/// `<folder>/<input stem>.<target>`; folder is the explicit one, else the
/// input's folder, else the default output folder
pub fn output_path_for(
    input: &Path,
    target: TargetFormat,
    output_dir: Option<&Path>,
    default_output: &Path,
) -> PathBuf {
    let folder = output_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| {
            input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| default_output.to_path_buf());

    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    folder.join(format!("{}.{}", stem, target.extension()))
}

/// Which backend handles a conversion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendKind {
    Image,
    Pandoc,
    Ffmpeg,
}

/// Dispatch table. Order matters: images (including image to PDF) first,
/// then documents when pandoc is installed, then ffmpeg for everything else
pub fn plan(input_kind: MediaKind, target: TargetFormat, pandoc_available: bool) -> BackendKind {
    if input_kind == MediaKind::Image && (target.is_image() || target == TargetFormat::Pdf) {
        BackendKind::Image
    } else if target.is_document() && pandoc_available {
        BackendKind::Pandoc
    } else if input_kind.is_av() {
        BackendKind::Ffmpeg
    } else {
        debug!(
            "No dedicated backend for {:?} -> {}, falling back to ffmpeg",
            input_kind, target
        );
        BackendKind::Ffmpeg
    }
}

#[async_trait]
pub trait ConversionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn convert(&self, input: &Path, output: &Path, target: TargetFormat) -> AppResult<()>;
}

/// In-process raster conversion
pub struct ImageBackend;

#[async_trait]
impl ConversionBackend for ImageBackend {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn convert(&self, input: &Path, output: &Path, target: TargetFormat) -> AppResult<()> {
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || convert_image(&input, &output, target))
            .await
            .map_err(|e| AppError::System(format!("Image conversion task failed: {}", e)))?
    }
}

/// Decode `input` and write it as `target`
pub fn convert_image(input: &Path, output: &Path, target: TargetFormat) -> AppResult<()> {
    let rgba = image::open(input)?.to_rgba8();

    match target {
        TargetFormat::Ico => write_ico(&rgba, output),
        TargetFormat::Jpg => {
            flatten_onto_white(&rgba).save_with_format(output, ImageFormat::Jpeg)?;
            Ok(())
        }
        TargetFormat::Png => save_rgba(rgba, output, ImageFormat::Png),
        TargetFormat::Webp => save_rgba(rgba, output, ImageFormat::WebP),
        TargetFormat::Gif => save_rgba(rgba, output, ImageFormat::Gif),
        TargetFormat::Pdf => write_pdf(&rgba, output),
        other => Err(AppError::Unsupported(format!(
            "image to {} is not an image conversion",
            other
        ))),
    }
}

fn save_rgba(rgba: RgbaImage, output: &Path, format: ImageFormat) -> AppResult<()> {
    DynamicImage::ImageRgba8(rgba).save_with_format(output, format)?;
    Ok(())
}

/// JPEG has no alpha channel; composite over white
pub fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}

/// Scale into a `size`x`size` transparent square, keeping the aspect ratio
fn fit_square(rgba: &RgbaImage, size: u32) -> RgbaImage {
    let fitted = DynamicImage::ImageRgba8(rgba.clone())
        .resize(size, size, FilterType::Lanczos3)
        .to_rgba8();
    let mut canvas = RgbaImage::new(size, size);
    let x = i64::from((size - fitted.width()) / 2);
    let y = i64::from((size - fitted.height()) / 2);
    image::imageops::overlay(&mut canvas, &fitted, x, y);
    canvas
}

fn write_ico(rgba: &RgbaImage, output: &Path) -> AppResult<()> {
    let squares: Vec<RgbaImage> = ICO_SIZES
        .iter()
        .map(|&size| fit_square(rgba, size))
        .collect();

    let frames = squares
        .iter()
        .map(|square| {
            IcoFrame::as_png(
                square.as_raw(),
                square.width(),
                square.height(),
                ExtendedColorType::Rgba8,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let file = std::io::BufWriter::new(std::fs::File::create(output)?);
    IcoEncoder::new(file).encode_images(&frames)?;
    Ok(())
}

/// Single-page PDF holding the image as a JPEG at 72 dpi
fn write_pdf(rgba: &RgbaImage, output: &Path) -> AppResult<()> {
    let (width, height) = (i64::from(rgba.width()), i64::from(rgba.height()));

    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(flatten_onto_white(rgba))
        .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content
            .encode()
            .map_err(|e| AppError::Conversion(format!("Failed to encode PDF page: {}", e)))?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(output)
        .map_err(|e| AppError::Conversion(format!("Failed to write PDF: {}", e)))?;
    Ok(())
}

/// Audio/video conversion through `ffmpeg -y -i <in> <out>`
pub struct FfmpegBackend {
    program: PathBuf,
}

impl FfmpegBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: Tool::Ffmpeg.program(config),
        }
    }
}

#[async_trait]
impl ConversionBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn convert(&self, input: &Path, output: &Path, _target: TargetFormat) -> AppResult<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg(output);
        run_tool(command, Tool::Ffmpeg).await
    }
}

/// Document conversion through pandoc
pub struct PandocBackend {
    program: PathBuf,
}

impl PandocBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: Tool::Pandoc.program(config),
        }
    }

    /// pandoc writer name; pdf is inferred from the output extension
    pub fn writer_for(target: TargetFormat) -> Option<&'static str> {
        match target {
            TargetFormat::Txt => Some("plain"),
            TargetFormat::Md => Some("markdown"),
            TargetFormat::Docx => Some("docx"),
            TargetFormat::Rtf => Some("rtf"),
            _ => None,
        }
    }
}

#[async_trait]
impl ConversionBackend for PandocBackend {
    fn name(&self) -> &'static str {
        "pandoc"
    }

    async fn convert(&self, input: &Path, output: &Path, target: TargetFormat) -> AppResult<()> {
        let mut command = Command::new(&self.program);
        command.arg(input).arg("-o").arg(output);
        if let Some(writer) = Self::writer_for(target) {
            command.arg("-t").arg(writer);
        }
        run_tool(command, Tool::Pandoc).await
    }
}

async fn run_tool(mut command: Command, tool: Tool) -> AppResult<()> {
    let output = command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::ToolNotFound {
                tool: tool.binary_name().to_string(),
            },
            _ => AppError::Conversion(format!("Failed to run {}: {}", tool.binary_name(), e)),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr_tail(&stderr, 3);
        Err(AppError::Conversion(if tail.is_empty() {
            format!("{} exited with {}", tool.binary_name(), output.status)
        } else {
            tail
        }))
    }
}

/// Result of a finished conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: TargetFormat,
    pub backend: BackendKind,
}

pub struct SmartConverter {
    config: AppConfig,
}

impl SmartConverter {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn backend(&self, kind: BackendKind) -> Box<dyn ConversionBackend> {
        match kind {
            BackendKind::Image => Box::new(ImageBackend),
            BackendKind::Pandoc => Box::new(PandocBackend::new(&self.config)),
            BackendKind::Ffmpeg => Box::new(FfmpegBackend::new(&self.config)),
        }
    }

    /// PATH lookup touches the file system, keep it off the runtime workers
    async fn pandoc_available(&self) -> bool {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || Tool::Pandoc.is_available(&config))
            .await
            .unwrap_or(false)
    }

    /// Check the request and work out where the result goes
    pub fn prepare(&self, request: &ConversionRequest) -> AppResult<PathBuf> {
        if request.input.as_os_str().is_empty() || !request.input.is_file() {
            return Err(AppError::InvalidInput(
                "Select a valid input file.".to_string(),
            ));
        }

        let output = output_path_for(
            &request.input,
            request.target,
            request.output_dir.as_deref(),
            &self.config.default_output,
        );

        if same_file(&request.input, &output) {
            return Err(AppError::InvalidInput(format!(
                "{} is already a {} file in that folder",
                request.input.display(),
                request.target
            )));
        }

        Ok(output)
    }

    pub async fn convert(
        &self,
        request: &ConversionRequest,
        reporter: &ProgressReporter,
    ) -> AppResult<ConversionOutcome> {
        match self.convert_inner(request, reporter).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("❌ Conversion failed for {}: {}", request.input.display(), e);
                reporter.log(format!("❌ Conversion error: {}", e)).await;
                reporter.progress(0.0).await;
                Err(e)
            }
        }
    }

    async fn convert_inner(
        &self,
        request: &ConversionRequest,
        reporter: &ProgressReporter,
    ) -> AppResult<ConversionOutcome> {
        reporter.progress(0.0).await;
        let output = self.prepare(request)?;

        let input_name = display_name(&request.input);
        let output_name = display_name(&output);
        reporter
            .log(format!("Starting conversion: {} → {}", input_name, output_name))
            .await;

        if let Some(parent) = output.parent() {
            ensure_dir_exists(parent)?;
        }

        let kind = detect_kind(&request.input);
        let pandoc_available = request.target.is_document() && self.pandoc_available().await;
        let backend_kind = plan(kind, request.target, pandoc_available);
        let backend = self.backend(backend_kind);

        info!(
            "🔄 Converting {} -> {} via {}",
            request.input.display(),
            output.display(),
            backend.name()
        );
        reporter
            .log(format!("Converting {} → {}", input_name, output_name))
            .await;

        backend
            .convert(&request.input, &output, request.target)
            .await?;

        reporter.progress(80.0).await;
        reporter
            .log(format!("✅ Converted to {}: {}", request.target, output.display()))
            .await;
        reporter.progress(100.0).await;

        Ok(ConversionOutcome {
            input: request.input.clone(),
            output,
            target: request.target,
            backend: backend_kind,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(Path::new("clip.MP4")), MediaKind::Video);
        assert_eq!(detect_kind(Path::new("/music/song.flac")), MediaKind::Audio);
        assert_eq!(detect_kind(Path::new("photo.jpeg")), MediaKind::Image);
        assert_eq!(detect_kind(Path::new("notes.txt")), MediaKind::Document);
        assert_eq!(detect_kind(Path::new("archive.zip")), MediaKind::Unknown);
        assert_eq!(detect_kind(Path::new("Makefile")), MediaKind::Unknown);
    }

    #[test]
    fn test_suggestions_per_kind() {
        use TargetFormat::*;
        assert_eq!(suggest_targets(MediaKind::Video), vec![Mp4, Mp3, Wav, Gif]);
        assert_eq!(suggest_targets(MediaKind::Audio), vec![Mp3, Wav, Mp4]);
        assert_eq!(suggest_targets(MediaKind::Image), vec![Png, Jpg, Ico, Webp]);
        assert_eq!(suggest_targets(MediaKind::Document), vec![Pdf, Docx, Txt, Md]);
        assert_eq!(
            suggest_targets(MediaKind::Unknown),
            vec![Mp3, Mp4, Png, Jpg, Pdf, Txt]
        );
        assert_eq!(suggest_for_path(Path::new("a.wav")), vec![Mp3, Wav, Mp4]);
    }

    #[test]
    fn test_output_path_resolution() {
        let default = Path::new("/default");
        assert_eq!(
            output_path_for(
                Path::new("/videos/clip.mkv"),
                TargetFormat::Mp4,
                Some(Path::new("/chosen")),
                default
            ),
            PathBuf::from("/chosen/clip.mp4")
        );
        assert_eq!(
            output_path_for(Path::new("/videos/clip.mkv"), TargetFormat::Mp3, None, default),
            PathBuf::from("/videos/clip.mp3")
        );
        assert_eq!(
            output_path_for(
                Path::new("clip.mkv"),
                TargetFormat::Wav,
                Some(Path::new("")),
                default
            ),
            PathBuf::from("/default/clip.wav")
        );
    }

    #[test]
    fn test_dispatch_order() {
        use TargetFormat::*;
        assert_eq!(plan(MediaKind::Image, Png, true), BackendKind::Image);
        assert_eq!(plan(MediaKind::Image, Pdf, true), BackendKind::Image);
        assert_eq!(plan(MediaKind::Image, Pdf, false), BackendKind::Image);
        assert_eq!(plan(MediaKind::Image, Docx, true), BackendKind::Pandoc);
        assert_eq!(plan(MediaKind::Image, Mp4, false), BackendKind::Ffmpeg);
        assert_eq!(plan(MediaKind::Document, Docx, true), BackendKind::Pandoc);
        assert_eq!(plan(MediaKind::Document, Docx, false), BackendKind::Ffmpeg);
        assert_eq!(plan(MediaKind::Video, Mp3, true), BackendKind::Ffmpeg);
        assert_eq!(plan(MediaKind::Video, Txt, true), BackendKind::Pandoc);
        assert_eq!(plan(MediaKind::Unknown, Mp3, false), BackendKind::Ffmpeg);
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));

        let rgb = flatten_onto_white(&rgba);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_pandoc_writers() {
        assert_eq!(PandocBackend::writer_for(TargetFormat::Txt), Some("plain"));
        assert_eq!(PandocBackend::writer_for(TargetFormat::Pdf), None);
    }

    #[test]
    fn test_prepare_rejects_missing_input() {
        let converter = SmartConverter::new(AppConfig::default());
        let request = ConversionRequest {
            input: PathBuf::from("/no/such/file.mp4"),
            target: TargetFormat::Mp3,
            output_dir: None,
        };
        let err = converter.prepare(&request).unwrap_err();
        assert_eq!(err.to_string(), "Select a valid input file.");
    }

    #[test]
    fn test_prepare_rejects_overwriting_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.mp3");
        std::fs::write(&input, b"not really audio").unwrap();

        let converter = SmartConverter::new(AppConfig::default());
        let request = ConversionRequest {
            input,
            target: TargetFormat::Mp3,
            output_dir: None,
        };
        assert!(matches!(
            converter.prepare(&request),
            Err(AppError::InvalidInput(_))
        ));
    }
}
