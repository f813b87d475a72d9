//! `ziwei`: build charts from astrolabe snapshots and read them from the
//! command line.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ziwei_core::config::{ZiweiConfig, DEFAULT_CONFIG_FILE};
use ziwei_core::{
    analysis_prompt, flying_stars_for, time_slot_from, true_solar_time, ChartOptions, Gender,
    KnowledgeBase, Location, SnapshotOracle, ZiweiCalculator, ZiweiChart,
};

#[derive(Parser)]
#[command(name = "ziwei")]
#[command(version, about = "Zi Wei Dou Shu charts, flying stars and palace readings")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct a clock time to true solar time and show its time slot
    SolarTime {
        /// Civil birth time, e.g. 2023-04-15T12:00
        #[arg(long, value_parser = parse_date_time)]
        date_time: NaiveDateTime,
        #[command(flatten)]
        place: PlaceArgs,
    },
    /// Build a chart and print it as JSON
    Chart(ChartArgs),
    /// Show the four stars a heavenly stem transforms
    Flying {
        #[arg(long)]
        stem: String,
    },
    /// Match a palace against the knowledge base
    Interpret {
        #[command(flatten)]
        chart: ChartArgs,
        /// Palace index (0-11)
        #[arg(long)]
        palace: usize,
        /// Judge the palace with the major stars of its opposite palace
        #[arg(long)]
        borrowed: bool,
    },
    /// Print the chat assistant prompt for a palace
    Prompt {
        #[command(flatten)]
        chart: ChartArgs,
        /// Palace index (0-11)
        #[arg(long)]
        palace: usize,
    },
}

#[derive(Args)]
struct PlaceArgs {
    /// Birthplace longitude in degrees east
    #[arg(long, conflicts_with = "city", allow_hyphen_values = true)]
    longitude: Option<f64>,
    /// Birthplace city, e.g. 成都
    #[arg(long)]
    city: Option<String>,
}

#[derive(Args)]
struct ChartArgs {
    /// Astrolabe snapshot exported from the astrology library
    #[arg(long)]
    snapshot: PathBuf,
    /// Solar birth date, YYYY-MM-DD
    #[arg(long, conflicts_with = "date_time", requires = "slot")]
    date: Option<String>,
    /// Time slot 0-12
    #[arg(long)]
    slot: Option<u8>,
    /// Civil birth time, corrected to true solar time
    #[arg(long, value_parser = parse_date_time)]
    date_time: Option<NaiveDateTime>,
    #[command(flatten)]
    place: PlaceArgs,
    /// male or female
    #[arg(long)]
    gender: Gender,
    #[arg(long)]
    flow_year: Option<i32>,
}

fn parse_date_time(value: &str) -> std::result::Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM[:SS], got `{}`", value))
}

fn init_tracing(config: &ZiweiConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn longitude(place: &PlaceArgs, config: &ZiweiConfig) -> Result<f64> {
    match (place.longitude, place.city.as_deref()) {
        (Some(longitude), _) => Ok(longitude),
        (None, Some(city)) => Location::city(city)
            .map(|location| location.longitude)
            .ok_or_else(|| anyhow!("unknown city `{}`", city)),
        (None, None) => Ok(config.chart.default_longitude),
    }
}

fn build_chart(args: &ChartArgs, config: &ZiweiConfig) -> Result<ZiweiChart> {
    let oracle = SnapshotOracle::from_path(&args.snapshot)
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let calculator = ZiweiCalculator::new(oracle).with_options(ChartOptions::from(&config.chart));

    let chart = match (&args.date, args.slot, args.date_time) {
        (Some(date), Some(slot), _) => calculator.chart(date, slot, args.gender, args.flow_year)?,
        (None, _, Some(date_time)) => calculator.chart_by_date(
            date_time,
            longitude(&args.place, config)?,
            args.gender,
            args.flow_year,
        )?,
        _ => bail!("either --date with --slot or --date-time is required"),
    };
    Ok(chart)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ZiweiConfig::load(&cli.config)?;
    init_tracing(&config);

    match cli.command {
        Commands::SolarTime { date_time, place } => {
            let corrected = true_solar_time(date_time, longitude(&place, &config)?)?;
            let slot = time_slot_from(corrected);
            println!("{}  {}", corrected.format("%Y-%m-%d %H:%M:%S%.3f"), slot);
        }
        Commands::Chart(args) => {
            print_json(&build_chart(&args, &config)?)?;
        }
        Commands::Flying { stem } => {
            let stars = flying_stars_for(&stem);
            if stars.lu.is_empty() {
                bail!("`{}` is not a heavenly stem", stem);
            }
            for (mutagen, star) in stars.iter() {
                println!("化{}  {}", mutagen, star);
            }
        }
        Commands::Interpret {
            chart,
            palace,
            borrowed,
        } => {
            let chart = build_chart(&chart, &config)?;
            let loaded;
            let knowledge_base = match &config.knowledge_base.path {
                Some(path) => {
                    loaded = KnowledgeBase::from_json_file(path)?;
                    &loaded
                }
                None => KnowledgeBase::builtin(),
            };

            let query = if borrowed {
                chart.query_borrowing_opposite(palace)
            } else {
                chart.query(palace, false)
            }
            .ok_or_else(|| anyhow!("palace index {} is out of range", palace))?;
            print_json(&knowledge_base.interpret(&query))?;
        }
        Commands::Prompt { chart, palace } => {
            let chart = build_chart(&chart, &config)?;
            let prompt = analysis_prompt(&chart, palace)
                .ok_or_else(|| anyhow!("palace index {} is out of range", palace))?;
            println!("{}", prompt);
        }
    }

    Ok(())
}
