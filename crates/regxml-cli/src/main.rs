//! Command-line RegXML extractor.
//!
//! Reads the header partition of an MXF file, resolves it against one
//! or more metadictionaries, and writes the RegXML fragment of its
//! root set. Diagnostics go to stderr, optionally as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use regxml_dict::{import_dictionary, MetaDictionaryCollection};
use regxml_fragment::build_fragment;
use regxml_klv::Auid;
use regxml_mxf::EventLog;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "regxml",
    version,
    about = "Dump MXF header metadata as a RegXML fragment"
)]
struct Args {
    /// MXF file to read
    input: PathBuf,

    /// Metadictionary XML file (repeat for each scheme)
    #[arg(short = 'd', long = "dict", required = true)]
    dicts: Vec<PathBuf>,

    /// Root class URN; defaults to the Preface set
    #[arg(long)]
    root: Option<String>,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the diagnostic events as JSON on stderr
    #[arg(long)]
    events_json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut dicts = MetaDictionaryCollection::new();
    for path in &args.dicts {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("reading dictionary {}", path.display()))?;
        let dict = import_dictionary(&xml)
            .with_context(|| format!("importing dictionary {}", path.display()))?;
        dicts.add_dictionary(dict);
    }

    let root_class = args
        .root
        .as_deref()
        .map(str::parse::<Auid>)
        .transpose()
        .context("parsing the root class URN")?;

    let data = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let mut log = EventLog::new();
    let fragment = build_fragment(&data, &dicts, Some(&dicts), root_class.as_ref(), &mut log);

    if args.events_json {
        eprintln!("{}", serde_json::to_string_pretty(&log.events)?);
    } else {
        for event in &log.events {
            eprintln!("{event}");
        }
    }

    let Some(fragment) = fragment else {
        bail!("no fragment produced; see the diagnostics above");
    };

    let xml = fragment.to_xml();
    match &args.output {
        Some(path) => fs::write(path, xml)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{xml}"),
    }

    Ok(())
}
