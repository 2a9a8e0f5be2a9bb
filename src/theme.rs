use crate::policy::AnchorPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub label_color: String,
    pub area_label_color: String,
    pub area_label_font_size: f32,
    pub star_color: String,
    pub marker_color: String,
    pub line_color: String,
    pub line_width: f32,
    pub region_color: String,
    pub background: String,
}

impl Theme {
    pub fn blue_light() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            label_color: "#1C2430".to_string(),
            area_label_color: "#6A7A96".to_string(),
            area_label_font_size: 16.0,
            star_color: "#1C2430".to_string(),
            marker_color: "#C0392B".to_string(),
            line_color: "#7A8AA6".to_string(),
            line_width: 1.0,
            region_color: "#D7E0F0".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn blue_dark() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 13.0,
            label_color: "#E6ECF5".to_string(),
            area_label_color: "#8FA3C7".to_string(),
            area_label_font_size: 16.0,
            star_color: "#FFFFFF".to_string(),
            marker_color: "#F5B041".to_string(),
            line_color: "#4B5F85".to_string(),
            line_width: 1.0,
            region_color: "#2A3550".to_string(),
            background: "#0B1426".to_string(),
        }
    }

    /// Style for a label pinned to a point, using the theme's font.
    pub fn point_label_style(&self) -> LabelStyle {
        LabelStyle {
            font_family: Some(self.font_family.clone()),
            font_size: self.font_size as f64,
            color: Some(self.label_color.clone()),
            ..LabelStyle::default()
        }
    }

    /// Style for a label centred inside a region.
    pub fn area_label_style(&self) -> LabelStyle {
        LabelStyle {
            anchor: AnchorPoint::Center,
            offset_x: 0.0,
            offset_y: 0.0,
            font_family: Some(self.font_family.clone()),
            font_size: self.area_label_font_size as f64,
            color: Some(self.area_label_color.clone()),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::blue_light()
    }
}

/// Per-label text style: preferred anchor, pixel offset from the target and
/// font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub anchor: AnchorPoint,
    pub offset_x: f64,
    pub offset_y: f64,
    pub font_size: f64,
    pub font_family: Option<String>,
    pub color: Option<String>,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            anchor: AnchorPoint::BottomRight,
            offset_x: 4.0,
            offset_y: 4.0,
            font_size: 13.0,
            font_family: None,
            color: None,
        }
    }
}

impl LabelStyle {
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }
}
