use crate::chart::plot_scene;
use crate::config::load_config;
use crate::render::{write_output_png, write_output_svg};
use crate::scene::Scene;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use flexi_logger::{Logger, LoggerHandle};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "skylabel", version, about = "Places collision-free labels on a star chart")]
pub struct Args {
    /// Scene file (.json or .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (theme, placement, policy and render settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width, when the scene does not set one
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Height, when the scene does not set one
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Seed for area-label sampling; fixes the output across runs
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Log filter, e.g. "debug" or "skylabel=trace". Falls back to RUST_LOG.
    #[arg(long = "log-level", env = "SKYLABEL_LOG")]
    pub log_level: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let _logger = setup_logging(args.log_level.as_deref())?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(seed) = args.seed {
        config.policy = config.policy.to_builder().seed(Some(seed)).build()?;
    }

    let scene = read_scene(args.input.as_deref())?;
    let chart = plot_scene(&scene, &config)?;
    log::info!(
        "placed {} labels ({} forced, {} dropped)",
        chart.stats.placed + chart.stats.forced,
        chart.stats.forced,
        chart.stats.dropped
    );

    let svg = chart.to_svg(&config.theme);
    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            config.render.width = chart.canvas.width;
            config.render.height = chart.canvas.height;
            write_output_png(&svg, &output, &config.render, &config.theme)?;
        }
    }
    Ok(())
}

fn setup_logging(level: Option<&str>) -> Result<LoggerHandle> {
    let logger = match level {
        Some(level) => Logger::try_with_str(level)?,
        None => Logger::try_with_env_or_str("warn")?,
    };
    Ok(logger.log_to_stderr().start()?)
}

fn read_scene(path: Option<&Path>) -> Result<Scene> {
    let (input, is_json5) = read_input(path)?;
    let scene = if is_json5 {
        Scene::from_json5_str(&input)
    } else {
        Scene::from_json_str(&input)
    };
    match path {
        Some(path) => scene.with_context(|| format!("failed to load scene {}", path.display())),
        None => scene.context("failed to load scene from stdin"),
    }
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_json5 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json5"));
        return Ok((content, is_json5));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_flags() {
        let args = Args::try_parse_from([
            "skylabel", "-i", "scene.json", "-o", "chart.png", "-e", "png", "--seed", "3",
        ])
        .expect("args");
        assert_eq!(args.input.as_deref(), Some(Path::new("scene.json")));
        assert!(matches!(args.output_format, OutputFormat::Png));
        assert_eq!(args.seed, Some(3));
    }

    #[test]
    fn png_needs_an_output_path() {
        assert!(ensure_output(&None, "png").is_err());
        assert!(ensure_output(&Some(PathBuf::from("a.png")), "png").is_ok());
    }

    #[test]
    fn json5_scene_is_detected_by_extension() {
        let dir = std::env::temp_dir().join(format!("skylabel-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("scene.json5");
        std::fs::write(&path, "{ stars: [ { position: [1, 2], name: 'Mira' } ] }").expect("write");
        let scene = read_scene(Some(&path)).expect("scene");
        assert_eq!(scene.stars[0].name.as_deref(), Some("Mira"));
    }
}
