use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wikinorm::{
    compression::open_dump,
    config::{Config, LogFormat, LoggingConfig},
    dump_parser::DumpParser,
    pipeline::Pipeline,
    record::JsonLinesSink,
};

/// Convert a bzip2 compressed Wikipedia XML dump into JSON lines records.
#[derive(Debug, clap::Parser)]
#[command(version)]
struct CommandLine {
    /// The `.xml.bz2` dump, overrides `input.path` of the config file.
    input_file: Option<PathBuf>,
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write records here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of normalization workers, 0 for the sequential loop.
    #[arg(short, long)]
    workers: Option<usize>,
    /// Stop after reading this many pages.
    #[arg(long)]
    max_pages: Option<usize>,
    /// More log output, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CommandLine {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(input_file) = self.input_file {
            config.input.path = input_file;
        }
        if let Some(output) = self.output {
            config.output.path = Some(output);
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(max_pages) = self.max_pages {
            config.pipeline.max_pages = Some(max_pages);
        }
        config.logging.level = config.logging.level.more_verbose(self.verbose);

        config.validate()?;
        Ok(config)
    }
}

// records go to stdout, so all logging goes to stderr
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = CommandLine::parse();
    let config = args.into_config().context("invalid configuration")?;
    init_logging(&config.logging);

    let reader = open_dump(&config.input.path)?;
    let parser = DumpParser::new(reader).context("failed to read site info")?;

    let writer: Box<dyn Write + Send> = match &config.output.path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let pipeline = Pipeline::new(
        config.admission.filter(),
        &config.output.record_type,
        config.pipeline.options(),
    );
    tracing::info!(
        message = "Starting conversion",
        input = %config.input.path.display(),
        workers = config.pipeline.workers,
        max_pages = config.pipeline.max_pages
    );

    let summary = pipeline
        .run(parser, JsonLinesSink::new(writer))
        .context("conversion failed")?;

    eprintln!(
        "{} pages read, {} records published, {} pages skipped{}",
        summary.pages_read,
        summary.published,
        summary.rejected(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
