use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use xml_bindgen::{Envelope, Model, ProtocolDefaults};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvelopeArg {
    /// The output structure is the document root
    Bare,
    /// The output sits in <OpResponse><OpResult>
    Wrapped,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate Rust types and XML decoders from shape models")]
struct Args {
    /// Where to write the bindings, `-` for stdout
    #[arg(short, long, default_value = "-")]
    out: String,

    /// How operation outputs are enclosed
    #[arg(long, value_enum, default_value_t = EnvelopeArg::Bare)]
    envelope: EnvelopeArg,

    /// Error documents have a bare <Error> root
    #[arg(long)]
    no_error_wrapping: bool,

    /// Prefix for every element name that has none of its own
    #[arg(long)]
    namespace_prefix: Option<String>,

    /// Model files, or directories holding them
    #[arg(required = true)]
    models: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut model = Model::new();
    for path in &args.models {
        load(path, &mut model)?;
    }

    let defaults = ProtocolDefaults {
        envelope: match args.envelope {
            EnvelopeArg::Bare => Envelope::Bare,
            EnvelopeArg::Wrapped => Envelope::Wrapped,
        },
        error_wrapping: !args.no_error_wrapping,
        namespace_prefix: args.namespace_prefix.clone(),
        ..ProtocolDefaults::default()
    };
    let tokens = xml_bindgen::generate(&model, &defaults).context("generate bindings")?;
    let src = xml_bindgen::render(tokens).context("render bindings")?;

    if args.out == "-" {
        let mut out = std::io::stdout().lock();
        out.write_all(xml_bindgen::HEADER.as_bytes())?;
        out.write_all(src.as_bytes())?;
    } else {
        std::fs::write(&args.out, format!("{}{src}", xml_bindgen::HEADER))
            .with_context(|| format!("write {}", args.out))?;
    }
    info!(out = %args.out, shapes = model.shapes.len(), "wrote bindings");
    Ok(())
}

fn load(path: &Path, model: &mut Model) -> Result<()> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.is_dir() {
        let mut entries = std::fs::read_dir(path)
            .with_context(|| format!("read dir {}", path.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        for entry in entries {
            if entry.is_dir() || entry.extension().map_or(false, |ext| ext == "xml") {
                load(&entry, model)?;
            }
        }
        return Ok(());
    }

    debug!(path = %path.display(), "loading model");
    let xml = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let loaded = xml_bindgen::parse(&xml).with_context(|| format!("parse {}", path.display()))?;
    model.merge(loaded).with_context(|| format!("merge {}", path.display()))?;
    Ok(())
}
