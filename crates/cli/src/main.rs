//! CLI tool for generating a slide deck from a DOCX outline and a PPTX template.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck_core::{OutlineEntry, OutlineOptions};
use deck_docx::DocxParser;
use deck_pptx::{
    decorate_slides, load_decorations, populate, DecorateOptions, GenerateOptions, Presentation,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Build a deck from an outline document and a template presentation.
#[derive(Parser, Debug)]
#[command(name = "deck-generate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory the other paths are relative to
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Template presentation; slide 2 is duplicated per outline entry
    #[arg(short, long, default_value = "sample.pptx")]
    template: PathBuf,

    /// Outline document (.docx)
    #[arg(short = 'i', long, default_value = "Mod1.docx")]
    outline: PathBuf,

    /// Output presentation
    #[arg(short, long, default_value = "sample_generated.pptx")]
    output: PathBuf,

    /// Primary directory of decorative images
    #[arg(long, default_value = "shapes")]
    shapes: PathBuf,

    /// Supplementary directory of decorative images
    #[arg(long, default_value = "elements")]
    elements: PathBuf,

    /// Paragraph prefix that starts a new slide in the outline
    #[arg(long, default_value = "Slide ")]
    slide_marker: String,

    /// Separator between the slide label and its title
    #[arg(long, default_value_t = '\u{2013}')]
    title_delimiter: char,

    /// Seed for decoration choice (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the parsed outline as JSON and exit
    #[arg(long)]
    dump_outline: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn outline_options(&self) -> OutlineOptions {
        OutlineOptions {
            slide_marker: self.slide_marker.clone(),
            title_delimiter: self.title_delimiter,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let stdout = std::io::stdout();
    run(&args, &mut stdout.lock())
}

fn run<W: Write>(args: &Args, out: &mut W) -> Result<()> {
    let outline_path = args.resolve(&args.outline);
    let entries = read_outline(&outline_path, args.outline_options())?;

    if args.dump_outline {
        serde_json::to_writer_pretty(&mut *out, &entries).context("Failed to write outline")?;
        writeln!(out)?;
        return Ok(());
    }

    let template_path = args.resolve(&args.template);
    let output_path = args.resolve(&args.output);
    if output_path == template_path {
        bail!(
            "Refusing to overwrite the template {}",
            template_path.display()
        );
    }

    let mut pres = Presentation::open(&template_path)
        .with_context(|| format!("Failed to open {}", template_path.display()))?;
    log::debug!(
        "Template {} has {} slides",
        template_path.display(),
        pres.slide_count()
    );

    let generated = populate(&mut pres, &entries, &GenerateOptions::default())
        .with_context(|| format!("Failed to populate {}", template_path.display()))?;
    log::debug!("Generated {} slides", generated.generated.len());

    let (pool, asset_skips) = load_decorations(&args.resolve(&args.shapes), &args.resolve(&args.elements));
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let decorated = decorate_slides(&mut pres, &pool, &mut rng, &DecorateOptions::default());
    log::debug!(
        "Decorated {} slides ({} at fallback size)",
        decorated.placed.len(),
        decorated.fallbacks()
    );

    let skipped = generated.skipped.len() + asset_skips.len() + decorated.skipped.len();
    if skipped > 0 {
        log::warn!("{} steps were skipped", skipped);
    }

    pres.save(&output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    writeln!(out, "Saved updated presentation to {}", output_path.display())?;

    Ok(())
}

/// Parse the outline entries of a DOCX file.
fn read_outline(path: &Path, options: OutlineOptions) -> Result<Vec<OutlineEntry>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let entries = DocxParser::new()
        .with_options(options)
        .parse(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    log::debug!("Read {} outline entries from {}", entries.len(), path.display());
    Ok(entries)
}
