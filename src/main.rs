//! Command line front end for the USB descriptor generator.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Error};
use argh::FromArgs;
use log::{LevelFilter, info};

use usbconfig::{Catalog, Document, Templates, generate};

mod logger;
mod version;

mod built {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(FromArgs, PartialEq, Debug)]
/// Generate TinyUSB descriptors and class definitions from a USB configuration.
#[argh(
    note = "Run with --version [--dependencies] to print build information.",
    error_code(2, "The configuration could not be turned into output files."),
)]
struct Args {
    /// only print warnings and errors
    #[argh(switch, short = 'q')]
    quiet: bool,
    /// print debugging messages
    #[argh(switch, short = 'v')]
    verbose: bool,
    /// template catalog to use instead of the built-in one
    #[argh(option)]
    catalog: Option<PathBuf>,
    /// directory with output templates overriding the built-in ones
    #[argh(option)]
    templates: Option<PathBuf>,
    /// JSON configuration file
    #[argh(positional)]
    input: PathBuf,
    /// directory to write generated files into
    #[argh(positional)]
    output: PathBuf,
}

impl Args {
    fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog, Error> {
    match path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog '{}'", path.display())),
        None => Ok(Catalog::builtin()?),
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let templates = match &args.templates {
        Some(dir) => Templates::with_overrides(dir)
            .with_context(|| format!("Failed to read templates from '{}'", dir.display()))?,
        None => Templates::builtin(),
    };

    info!("Reading '{}'", args.input.display());
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read '{}'", args.input.display()))?;
    let doc = Document::from_json(&text, &catalog)?;

    let files = generate(&doc, &catalog, &templates)?;
    files.write(&args.output)
        .with_context(|| format!("Failed to write output to '{}'", args.output.display()))?;
    Ok(())
}

fn exit_status(result: Result<(), Error>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("** ERROR! {e:#}");
            2
        }
    }
}

fn main() -> ExitCode {
    // Handled before parsing, as no input or output is needed.
    let flags: Vec<String> = std::env::args().skip(1).collect();
    if flags.iter().any(|arg| arg == "--version") {
        println!("usbconfig version {}\n\n{}",
                 version::version(),
                 version::version_info(flags.iter().any(|arg| arg == "--dependencies")));
        return ExitCode::SUCCESS;
    }

    let args: Args = argh::from_env();
    logger::init(args.level());
    ExitCode::from(exit_status(run(&args)))
}
