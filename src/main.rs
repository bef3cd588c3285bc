use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use rusty_timescale::aggregate::{annualized_yield, flex_requirement_curve, hour_of_year_profile, AggregationMode};
use rusty_timescale::calendar::{to_hour_of_year, LeapDayPolicy};
use rusty_timescale::config::{Config, SummaryConfig};
use rusty_timescale::data::filter::{select_columns, Selection};
use rusty_timescale::data::loader::{load_file, pretty_format, save_file, RowIndex};
use rusty_timescale::data::model::{TaggedTable, TimeSeriesDataset};
use rusty_timescale::spectral::{decompose, BandSet, BandingStrategy, DecompositionConfig, SPECTRUM_TAG};

#[derive(Parser)]
#[command(name = "rusty-timescale")]
#[command(version, about = "Split hourly time series into seasonal, weekly, daily, ... components")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add one reconstructed series per duration band
    Decompose {
        /// Input dataset (.csv or .parquet)
        input: PathBuf,
        /// Output dataset (.csv or .parquet)
        output: PathBuf,
        #[command(flatten)]
        bands: BandArgs,
    },

    /// Hour-of-year profile averaged over the years
    Profile {
        input: PathBuf,
        /// Write the table here instead of printing it
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        bands: BandArgs,
        #[command(flatten)]
        summary: SummaryArgs,
    },

    /// Downward flexibility requirement per percentile
    Flex {
        input: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        bands: BandArgs,
        #[command(flatten)]
        summary: SummaryArgs,
    },

    /// Annualized energy per channel
    Yield { input: PathBuf },
}

#[derive(Args)]
struct BandArgs {
    /// JSON configuration file with the duration bands
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use seasonal/monthly/weekly/daily/hourly bands
    #[arg(long, conflicts_with = "config")]
    standard_bands: bool,
    #[arg(long, value_enum)]
    strategy: Option<BandingStrategy>,
    /// Add each channel's mean back to every band
    #[arg(long)]
    keep_dc: bool,
}

#[derive(Args)]
struct SummaryArgs {
    #[arg(long)]
    region: Vec<String>,
    #[arg(long)]
    variable: Vec<String>,
    #[arg(long)]
    spectrum: Vec<String>,
    /// Report upper/lower 95% confidence bounds next to the mean
    #[arg(long)]
    confidence: bool,
    #[arg(long, value_enum)]
    leap_day: Option<LeapDayPolicy>,
}

impl BandArgs {
    fn load(&self) -> Result<Option<Config>> {
        self.config.as_deref().map(Config::load_from_file).transpose()
    }

    fn decomposition(&self, config: Option<&Config>) -> Result<DecompositionConfig> {
        let mut decomposition = match (config, self.standard_bands) {
            (Some(c), _) => c.decomposition.clone(),
            (None, true) => DecompositionConfig::new(BandSet::standard_timescales()),
            (None, false) => bail!("pass --config <file> or --standard-bands"),
        };
        if let Some(strategy) = self.strategy {
            decomposition.strategy = strategy;
        }
        if self.keep_dc {
            decomposition.remove_dc = false;
        }
        Ok(decomposition)
    }
}

impl SummaryArgs {
    fn selection(&self) -> Selection {
        [("region", &self.region), ("variable", &self.variable), (SPECTRUM_TAG, &self.spectrum)]
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(tag, values)| (tag.to_string(), values.iter().cloned().collect::<BTreeSet<_>>()))
            .collect()
    }

    fn apply(&self, mut summary: SummaryConfig) -> SummaryConfig {
        if self.confidence {
            summary.aggregation = AggregationMode::WithConfidence;
        }
        if let Some(policy) = self.leap_day {
            summary.leap_day = policy;
        }
        summary
    }
}

fn run_decompose(input: &Path, bands: &BandArgs) -> Result<TimeSeriesDataset> {
    let config = bands.load()?;
    let decomposition = bands.decomposition(config.as_ref())?;
    let dataset = load_file(input).with_context(|| format!("loading {}", input.display()))?;
    let labels: Vec<&str> = decomposition
        .bands
        .display_order()
        .into_iter()
        .map(|b| b.label.as_str())
        .collect();
    log::info!(
        "Decomposing into {} bands [{}] ({:?}, remove_dc = {})",
        labels.len(),
        labels.join(", "),
        decomposition.strategy,
        decomposition.remove_dc
    );
    Ok(decompose(&dataset, &decomposition)?)
}

/// Load `input`, decomposing it unless it already carries a spectrum tag.
fn prepare(input: &Path, bands: &BandArgs, args: &SummaryArgs) -> Result<(TimeSeriesDataset, SummaryConfig)> {
    let config = bands.load()?;
    let dataset = load_file(input).with_context(|| format!("loading {}", input.display()))?;
    let dataset = if dataset.tag_position(SPECTRUM_TAG).is_some() {
        dataset
    } else {
        decompose(&dataset, &bands.decomposition(config.as_ref())?)?
    };
    let summary = args.apply(config.map(|c| c.summary).unwrap_or_default());
    summary.validate()?;
    Ok((select_columns(&dataset, &args.selection())?, summary))
}

fn emit<I: RowIndex>(table: &TaggedTable<I>, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => save_file(path, table),
        None => {
            println!("{}", pretty_format(table)?);
            Ok(())
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Decompose { input, output, bands } => {
            let decomposed = run_decompose(&input, &bands)?;
            save_file(&output, &decomposed)
        }
        Commands::Profile { input, output, bands, summary } => {
            let (dataset, settings) = prepare(&input, &bands, &summary)?;
            let normalized = to_hour_of_year(&dataset, settings.leap_day)?;
            let profile = hour_of_year_profile(&normalized, settings.aggregation, settings.confidence_level)?;
            emit(&profile, output.as_deref())
        }
        Commands::Flex { input, output, bands, summary } => {
            let (dataset, settings) = prepare(&input, &bands, &summary)?;
            let normalized = to_hour_of_year(&dataset, settings.leap_day)?;
            let curve = flex_requirement_curve(
                &normalized,
                &settings.percentiles,
                settings.aggregation,
                settings.confidence_level,
            )?;
            emit(&curve, output.as_deref())
        }
        Commands::Yield { input } => {
            let dataset = load_file(&input).with_context(|| format!("loading {}", input.display()))?;
            for (key, value) in annualized_yield(&dataset)? {
                println!("{key}\t{value:.2}");
            }
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
