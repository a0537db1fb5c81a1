//! # Canvas Render
//!
//! Renders a canvas item document from the command line.

use std::io::Write;

use canvas_cli::{load_document, render_job, write_output, CliArgs, RenderJob};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing on stderr, leaving stdout for operation logs and reports.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canvas_cli=debug,canvas_renderer=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    // Use JSON format when RUST_LOG_FORMAT=json
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let report_json = args.report_json;
    let document = load_document(&args.scene).await?;
    tracing::info!(
        "Loaded {} items from {}",
        document.len(),
        args.scene.display()
    );

    let job = RenderJob::from_args(args, document)?;
    tracing::debug!(
        "Surface {}x{}, prefetch {}",
        job.size.width,
        job.size.height,
        job.render.prefetch
    );

    let (report, rendered) = render_job(&job).await?;
    for failed in report.failed() {
        tracing::warn!(
            "Item {} ({}) was not drawn: {:?}",
            failed.index,
            failed.kind,
            failed.status
        );
    }

    let mut stdout = std::io::stdout().lock();
    write_output(&job, rendered, &mut stdout).await?;
    if report_json {
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    }

    tracing::info!(
        "Rendered {} of {} items in {:?}",
        report.drawn(),
        report.items.len(),
        report.total_time
    );
    Ok(())
}
