use std::path::{Path, PathBuf};

use regex::Regex;
use spheroid_api::Channel;

use crate::image::ImageSource;

const VALID_FORMATS: [&str; 2] = [".TIF", ".TIFF"];
const ID_PATTERN: &str = r"(p\d{1,4})";
const DAY_FOLDER_PATTERN: &str = r"DAY(\d{1,2})";
const DAY_FILE_PATTERN: &str = r"_.{6}d(\d)";
const Z_STACK_PATTERN: &str = r"z(\d{1,4}).*d(\d)";

#[derive(Debug)]
pub enum DiscoveryError {
    UnsupportedStructure(PathBuf),
    MissingBrightField(PathBuf),
    MissingTexasRed(PathBuf),
    Io(std::io::Error),
    Pattern(regex::Error),
}

impl From<std::io::Error> for DiscoveryError {
    fn from(value: std::io::Error) -> Self {
        DiscoveryError::Io(value)
    }
}

impl From<regex::Error> for DiscoveryError {
    fn from(value: regex::Error) -> Self {
        DiscoveryError::Pattern(value)
    }
}

type Result<T> = std::result::Result<T, DiscoveryError>;

/// How an experiment folder is organised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `BF` and `TEXAS RED` subfolders holding one frame per timepoint.
    Channels {
        bright_field: PathBuf,
        texas_red: PathBuf,
    },
    /// One `DAYn` subfolder per timepoint holding both channels.
    Days(Vec<(u32, PathBuf)>),
    /// A flat folder of z-slices, both channels side by side.
    ZStack,
}

struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

fn entries(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_dir: entry.file_type()?.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn is_tiff(name: &str) -> bool {
    let name = name.to_uppercase();
    VALID_FORMATS.iter().any(|format| name.ends_with(format))
}

/// Works out which layout `folder` uses.  Day folders win over channel
/// folders; a z-stack is only recognised in a folder with no subfolders.
pub fn classify(folder: &Path) -> Result<Layout> {
    let day_pattern = Regex::new(DAY_FOLDER_PATTERN)?;
    let entries = entries(folder)?;

    let mut bright_field = None;
    let mut texas_red = None;
    let mut days = Vec::new();
    let mut has_subfolders = false;

    for entry in entries.iter().filter(|entry| entry.is_dir) {
        has_subfolders = true;
        let name = entry.name.trim().to_uppercase();
        match name.as_str() {
            "BF" => bright_field = Some(entry.path.clone()),
            "TEXAS RED" => texas_red = Some(entry.path.clone()),
            _ => {}
        }
        if let Some(day) = day_pattern
            .captures(&name)
            .and_then(|captures| captures[1].parse::<u32>().ok())
        {
            days.push((day, entry.path.clone()));
        }
    }

    if !days.is_empty() {
        days.sort();
        return Ok(Layout::Days(days));
    }

    if !has_subfolders {
        let z_stack = Regex::new(Z_STACK_PATTERN)?;
        if entries.iter().any(|entry| z_stack.is_match(&entry.name)) {
            return Ok(Layout::ZStack);
        }
    }

    match (bright_field, texas_red) {
        (Some(bright_field), Some(texas_red)) => Ok(Layout::Channels {
            bright_field,
            texas_red,
        }),
        (None, None) => Err(DiscoveryError::UnsupportedStructure(folder.to_path_buf())),
        (None, Some(_)) => Err(DiscoveryError::MissingBrightField(folder.to_path_buf())),
        (Some(_), None) => Err(DiscoveryError::MissingTexasRed(folder.to_path_buf())),
    }
}

/// Lists every frame of the experiment in `folder`.
#[tracing::instrument]
pub fn discover(folder: &Path) -> Result<Vec<ImageSource>> {
    let layout = classify(folder)?;
    tracing::info!("Detected {:?}", layout);

    let sources = match layout {
        Layout::Channels {
            bright_field,
            texas_red,
        } => {
            let mut sources = channel_folder(&bright_field, Channel::Spheroid)?;
            sources.extend(channel_folder(&texas_red, Channel::Sensor)?);
            sources
        }
        Layout::Days(days) => {
            let mut sources = Vec::new();
            for (day, path) in days {
                sources.extend(day_folder(day, &path)?);
            }
            sources
        }
        Layout::ZStack => z_stack(folder)?,
    };

    tracing::info!("Found {} images", sources.len());
    Ok(sources)
}

fn channel_folder(dir: &Path, channel: Channel) -> Result<Vec<ImageSource>> {
    let id_pattern = Regex::new(ID_PATTERN)?;
    let mut sources = Vec::new();

    for entry in entries(dir)? {
        if entry.is_dir || !is_tiff(&entry.name) {
            continue;
        }
        let Some(id) = id_pattern.find(&entry.name) else {
            tracing::debug!("Skipping {} without a timepoint id", entry.name);
            continue;
        };
        sources.push(ImageSource {
            id: id.as_str().to_string(),
            name: entry.name.clone(),
            channel,
            path: entry.path,
        });
    }
    Ok(sources)
}

/// Every file in a day folder carries `p00`, which is replaced by the day's
/// own id.
fn day_folder(day: u32, dir: &Path) -> Result<Vec<ImageSource>> {
    let file_pattern = Regex::new(DAY_FILE_PATTERN)?;
    let id = format!("p{:02}", day);
    let mut sources = Vec::new();

    for entry in entries(dir)? {
        if entry.is_dir {
            continue;
        }
        let channel = match file_pattern
            .captures(&entry.name)
            .map(|captures| captures[1].to_string())
            .as_deref()
        {
            Some("4") => Channel::Spheroid,
            Some("3") => Channel::Sensor,
            _ => continue,
        };
        sources.push(ImageSource {
            id: id.clone(),
            name: entry.name.replace("p00", &id),
            channel,
            path: entry.path,
        });
    }
    Ok(sources)
}

fn z_stack(dir: &Path) -> Result<Vec<ImageSource>> {
    let pattern = Regex::new(Z_STACK_PATTERN)?;
    let mut sources = Vec::new();

    for entry in entries(dir)? {
        if entry.is_dir || !is_tiff(&entry.name) {
            continue;
        }
        let Some(captures) = pattern.captures(&entry.name) else {
            continue;
        };
        let channel = match &captures[2] {
            "4" => Channel::Spheroid,
            "2" => Channel::Sensor,
            _ => continue,
        };
        sources.push(ImageSource {
            id: captures[1].to_string(),
            name: entry.name.clone(),
            channel,
            path: entry.path.clone(),
        });
    }
    Ok(sources)
}
