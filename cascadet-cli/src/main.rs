use cascadet::io::load_gray_image;
use cascadet::{DetectConfig, Detector, InitConfig, Object, PixelFormat, Rect, Size, Tag};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Cascadet CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
struct CascadeEntry {
    path: PathBuf,
    #[serde(default = "undefined_tag")]
    tag: i32,
}

fn undefined_tag() -> i32 {
    Tag::UNDEFINED.0
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct InitConfigJson {
    scale_factor: f64,
    size_min: [usize; 2],
    size_max: Option<[usize; 2]>,
    thread_count: usize,
    prefer_int16: bool,
}

impl Default for InitConfigJson {
    fn default() -> Self {
        let cfg = InitConfig::default();
        Self {
            scale_factor: cfg.scale_factor,
            size_min: [cfg.size_min.width, cfg.size_min.height],
            size_max: None,
            thread_count: cfg.thread_count,
            prefer_int16: cfg.prefer_int16,
        }
    }
}

impl From<InitConfigJson> for InitConfig {
    fn from(value: InitConfigJson) -> Self {
        Self {
            scale_factor: value.scale_factor,
            size_min: Size::new(value.size_min[0], value.size_min[1]),
            size_max: value
                .size_max
                .map(|[w, h]| Size::new(w, h))
                .unwrap_or(Size::MAX),
            thread_count: value.thread_count,
            prefer_int16: value.prefer_int16,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectConfigJson {
    group_size_min: usize,
    size_difference_max: f64,
    /// Regions as `[left, top, right, bottom]`.
    motion_regions: Option<Vec<[isize; 4]>>,
}

impl Default for DetectConfigJson {
    fn default() -> Self {
        let cfg = DetectConfig::default();
        Self {
            group_size_min: cfg.group_size_min,
            size_difference_max: cfg.size_difference_max,
            motion_regions: None,
        }
    }
}

impl From<DetectConfigJson> for DetectConfig {
    fn from(value: DetectConfigJson) -> Self {
        Self {
            group_size_min: value.group_size_min,
            size_difference_max: value.size_difference_max,
            motion_regions: value.motion_regions.map(|regions| {
                regions
                    .into_iter()
                    .map(|[l, t, r, b]| Rect::new(l, t, r, b))
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    image_path: String,
    roi_path: Option<String>,
    output_path: Option<String>,
    cascades: Vec<CascadeEntry>,
    init: InitConfigJson,
    detect: DetectConfigJson,
}

#[derive(Debug, Serialize)]
struct ObjectRecord {
    left: isize,
    top: isize,
    right: isize,
    bottom: isize,
    weight: usize,
    tag: i32,
}

impl From<Object> for ObjectRecord {
    fn from(value: Object) -> Self {
        Self {
            left: value.rect.left,
            top: value.rect.top,
            right: value.rect.right,
            bottom: value.rect.bottom,
            weight: value.weight,
            tag: value.tag.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    image_width: usize,
    image_height: usize,
    levels: usize,
    objects: Vec<ObjectRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("cascadet=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_path.is_empty() {
        return Err("image_path must be set in the config".into());
    }
    if config.cascades.is_empty() {
        return Err("at least one cascade must be listed in the config".into());
    }

    let mut detector = Detector::new();
    for entry in &config.cascades {
        detector
            .load(&entry.path, Tag(entry.tag))
            .map_err(|err| format!("{}: {err}", entry.path.display()))?;
    }

    let image = load_gray_image(&config.image_path)?;
    let roi = config.roi_path.as_deref().map(load_gray_image).transpose()?;
    detector.init(
        image.size(),
        &config.init.into(),
        roi.as_ref().map(|mask| mask.view()),
    )?;

    let objects = detector.detect(image.view(), PixelFormat::Gray8, &config.detect.into())?;
    let output = Output {
        image_width: image.width(),
        image_height: image.height(),
        levels: detector.level_scales().len(),
        objects: objects.into_iter().map(ObjectRecord::from).collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
