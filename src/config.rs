use crate::placement::PlacementConfig;
use crate::policy::{CollisionPolicy, PolicyOverrides};
use crate::theme::Theme;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    /// Measure labels with the built-in width table instead of system fonts.
    pub fast_text_metrics: bool,
    pub star_radius: f64,
    pub marker_radius: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            fast_text_metrics: true,
            star_radius: 2.0,
            marker_radius: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub placement: PlacementConfig,
    pub policy: CollisionPolicy,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    label_color: Option<String>,
    area_label_color: Option<String>,
    area_label_font_size: Option<f32>,
    star_color: Option<String>,
    marker_color: Option<String>,
    line_color: Option<String>,
    line_width: Option<f32>,
    region_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PlacementConfigFile {
    wrap_period: Option<f64>,
    edge_margin: Option<f64>,
    min_area_retention: Option<f64>,
    padding: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RenderConfigFile {
    width: Option<f64>,
    height: Option<f64>,
    fast_text_metrics: Option<bool>,
    star_radius: Option<f64>,
    marker_radius: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    placement: Option<PlacementConfigFile>,
    policy: Option<PolicyOverrides>,
    render: Option<RenderConfigFile>,
}

/// Reads a config file over the defaults. `.json5` files may use comments and
/// trailing commas; anything else is parsed as strict JSON.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let is_json5 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json5"));
    let parsed: ConfigFile = if is_json5 {
        json5::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };

    apply_config_file(&mut config, parsed)?;
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) -> anyhow::Result<()> {
    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "dark" | "blue-dark" => config.theme = Theme::blue_dark(),
            "light" | "blue-light" | "default" => config.theme = Theme::blue_light(),
            other => log::warn!("unknown theme {other:?}; keeping the default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.label_color {
            config.theme.label_color = v;
        }
        if let Some(v) = vars.area_label_color {
            config.theme.area_label_color = v;
        }
        if let Some(v) = vars.area_label_font_size {
            config.theme.area_label_font_size = v;
        }
        if let Some(v) = vars.star_color {
            config.theme.star_color = v;
        }
        if let Some(v) = vars.marker_color {
            config.theme.marker_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.line_width {
            config.theme.line_width = v;
        }
        if let Some(v) = vars.region_color {
            config.theme.region_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(placement) = parsed.placement {
        if let Some(v) = placement.wrap_period {
            config.placement.wrap_period = (v > 0.0).then_some(v);
        }
        if let Some(v) = placement.edge_margin {
            config.placement.edge_margin = v.max(0.0);
        }
        if let Some(v) = placement.min_area_retention {
            config.placement.min_area_retention = v.clamp(0.0, 1.0);
        }
        if let Some(v) = placement.padding {
            config.placement.padding = v.max(0.0);
        }
    }

    if let Some(overrides) = parsed.policy {
        config.policy = overrides
            .apply(&config.policy)
            .context("invalid collision policy in config")?;
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.fast_text_metrics {
            config.render.fast_text_metrics = v;
        }
        if let Some(v) = render.star_radius {
            config.render.star_radius = v;
        }
        if let Some(v) = render.marker_radius {
            config.render.marker_radius = v;
        }
    }

    Ok(())
}
