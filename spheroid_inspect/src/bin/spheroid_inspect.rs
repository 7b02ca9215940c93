use std::path::PathBuf;

use clap::Parser;
use spheroid_api::{Channel, Config, FitMode};
use spheroid_inspect::{discover, Error, Session, Tabulation};

#[derive(Parser, Debug)]
struct Args {
    /// Experiment folder with BF/Texas Red folders, DAY folders or a z-stack.
    folder: PathBuf,

    /// Timepoint id every other timepoint is tracked against.  Defaults to the
    /// first timepoint.
    #[arg(short, long)]
    base: Option<String>,

    /// Fit sensors as ellipses instead of circles.
    #[arg(long)]
    sensor_ellipses: bool,

    /// Fit spheroids as ellipses.  Spheroids are then neither pruned nor
    /// numbered against sensors.
    #[arg(long)]
    spheroid_ellipses: bool,

    /// JSON file with detection, tracking and strain settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the CSV files.  Defaults to the experiment folder.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Only export the base timepoint.
    #[arg(long)]
    single: bool,

    /// Increase logging, repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn mode(ellipses: bool) -> FitMode {
    if ellipses {
        FitMode::Ellipse
    } else {
        FitMode::Circle
    }
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(match args.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        })
        .init();

    let config = match &args.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    let mut session = Session::new(config);
    session.load(discover(&args.folder)?);

    let timepoints = session.timepoints();
    for id in &timepoints {
        // Sensors first so the spheroid pass numbers the current sensors.
        for (channel, ellipses) in [
            (Channel::Sensor, args.sensor_ellipses),
            (Channel::Spheroid, args.spheroid_ellipses),
        ] {
            if !session.collection(channel).contains(id) {
                tracing::warn!("Timepoint {} has no {} image", id, channel);
                continue;
            }
            session.detect(channel, id, mode(ellipses))?;
        }
    }

    let base = match args.base.as_ref().or(timepoints.first()) {
        Some(base) => base.clone(),
        None => return Err(Error::NoBaseImage),
    };
    session.set_base(&base)?;

    let tabulation = if args.single {
        Tabulation::single(&session)?
    } else {
        Tabulation::all(&session)?
    };

    let name = args
        .folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spheroids".to_string());
    let out = args.out.unwrap_or_else(|| args.folder.clone());
    tabulation.export(&out, &name)?;

    Ok(())
}
