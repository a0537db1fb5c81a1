//! # Canvas Render CLI
//!
//! Renders a JSON item document to a PNG or JPEG file.
//!
//! ## Usage
//!
//! ```bash
//! canvas-render card.json --out card.png --width 800 --height 600
//! canvas-render card.json --dry-run
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `RenderJob` - Resolved surface size, render/resolver/export configuration and output
//! - `render_job` - Runs one pass on a raster or recording surface
//! - `write_output` - Encodes pixels to the output file or prints the operation log

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use canvas_core::ItemDocument;
use canvas_renderer::tiny_skia::Pixmap;
use canvas_renderer::{
    DefaultImageResolver, DrawOp, ExportConfig, ExportFormat, PixmapExporter, PixmapSurface,
    RecordingSurface, RenderConfig, RenderReport, Renderer, ResolverConfig, SurfaceSize,
};
use clap::Parser;

/// Surface width when neither the flags nor the document give one.
pub const DEFAULT_WIDTH: u32 = 800;
/// Surface height when neither the flags nor the document give one.
pub const DEFAULT_HEIGHT: u32 = 600;

/// Command-line arguments for canvas-render.
#[derive(Debug, Clone, Parser)]
#[command(name = "canvas-render")]
#[command(about = "Render a canvas item document to PNG or JPEG")]
#[command(version)]
pub struct CliArgs {
    /// Item document: `{"width", "height", "items": [...]}` or a bare item array
    pub scene: PathBuf,

    /// Output file (format taken from the extension unless --format is given)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Surface width in pixels (overrides the document)
    #[arg(long, env = "CANVAS_WIDTH")]
    pub width: Option<u32>,

    /// Surface height in pixels (overrides the document)
    #[arg(long, env = "CANVAS_HEIGHT")]
    pub height: Option<u32>,

    /// Output format: png or jpeg
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Image sources resolved ahead of the draw
    #[arg(long, env = "CANVAS_PREFETCH", default_value_t = 1)]
    pub prefetch: usize,

    /// Directory relative image paths are resolved against (default: the document's directory)
    #[arg(long, env = "CANVAS_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// JPEG quality 1-100
    #[arg(long, default_value_t = 85)]
    pub jpeg_quality: u8,

    /// Print the drawing operations instead of rasterizing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the render report as JSON on stdout
    #[arg(long)]
    pub report_json: bool,
}

/// Where a job's result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Print the recorded operations.
    DryRun,
    /// Encode the raster surface to a file.
    File {
        /// Output path.
        path: PathBuf,
        /// Encoding.
        format: ExportFormat,
    },
}

/// A fully resolved render invocation.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Items to draw.
    pub document: ItemDocument,
    /// Surface size.
    pub size: SurfaceSize,
    /// Renderer configuration.
    pub render: RenderConfig,
    /// Image resolver configuration.
    pub resolver: ResolverConfig,
    /// Encoder configuration.
    pub export: ExportConfig,
    /// Destination.
    pub output: Output,
}

impl RenderJob {
    /// Combine parsed arguments with the loaded document.
    ///
    /// Flags win over the document's own size, which wins over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if no output is given outside a dry run, or the
    /// output format cannot be determined.
    pub fn from_args(args: CliArgs, document: ItemDocument) -> anyhow::Result<Self> {
        let size = SurfaceSize::new(
            args.width.or(document.width).unwrap_or(DEFAULT_WIDTH),
            args.height.or(document.height).unwrap_or(DEFAULT_HEIGHT),
        );
        if size.is_empty() {
            anyhow::bail!("surface size {}x{} has no pixels", size.width, size.height);
        }

        let output = if args.dry_run {
            Output::DryRun
        } else {
            let path = args
                .out
                .context("--out is required unless --dry-run is given")?;
            let format = match args.format {
                Some(format) => format,
                None => format_for(&path)?,
            };
            Output::File { path, format }
        };

        let base_dir = args
            .base_dir
            .or_else(|| args.scene.parent().map(Path::to_path_buf));

        Ok(Self {
            document,
            size,
            render: RenderConfig {
                prefetch: args.prefetch.max(1),
                clear_size: Some(size),
            },
            resolver: ResolverConfig {
                base_dir,
                ..ResolverConfig::default()
            },
            export: ExportConfig {
                jpeg_quality: args.jpeg_quality.clamp(1, 100),
                ..ExportConfig::default()
            },
            output,
        })
    }
}

fn format_for(path: &Path) -> anyhow::Result<ExportFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    ExportFormat::from_extension(ext).with_context(|| {
        format!(
            "cannot tell the output format from {}; pass --format",
            path.display()
        )
    })
}

/// Surface contents after a pass.
pub enum Rendered {
    /// Operation log from a dry run.
    Ops(Vec<DrawOp>),
    /// Raster pixels.
    Pixels(Pixmap),
}

/// Run one render pass for `job`.
///
/// # Errors
///
/// Returns an error if the surface or resolver cannot be created, or the
/// pass is aborted. Items that fail individually are only reported.
pub async fn render_job(job: &RenderJob) -> anyhow::Result<(RenderReport, Rendered)> {
    let resolver = DefaultImageResolver::new(job.resolver.clone())?;
    let renderer = Renderer::with_config(resolver, job.render.clone());
    let items = &job.document.items;

    match job.output {
        Output::DryRun => {
            let mut surface = RecordingSurface::new(job.size);
            let report = renderer.render(&mut surface, items).await?;
            Ok((report, Rendered::Ops(surface.take_ops())))
        }
        Output::File { .. } => {
            let mut surface = PixmapSurface::new(job.size)?;
            let report = renderer.render(&mut surface, items).await?;
            Ok((report, Rendered::Pixels(surface.into_pixmap())))
        }
    }
}

/// Write the rendered result to its destination.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub async fn write_output(
    job: &RenderJob,
    rendered: Rendered,
    stdout: &mut impl Write,
) -> anyhow::Result<()> {
    match (&job.output, rendered) {
        (Output::File { path, format }, Rendered::Pixels(pixmap)) => {
            let bytes = PixmapExporter::new(job.export.clone()).export(&pixmap, *format)?;
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        }
        (_, Rendered::Ops(ops)) => {
            for op in ops {
                writeln!(stdout, "{op}")?;
            }
        }
        (Output::DryRun, Rendered::Pixels(_)) => {
            anyhow::bail!("dry run produced pixels instead of an operation log");
        }
    }
    Ok(())
}

/// Load an item document from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_document(path: &Path) -> anyhow::Result<ItemDocument> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let document =
        ItemDocument::from_json(&json).with_context(|| format!("parsing {}", path.display()))?;
    Ok(document)
}
