use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// `n` visually distinct colours with evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.5);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Series name → Color32
// ---------------------------------------------------------------------------

/// Stable colours for chart series and pie slices (metrics and agents), so
/// an agent keeps its colour when the filters change.
#[derive(Debug, Clone, Default)]
pub struct SeriesColors {
    mapping: BTreeMap<String, Color32>,
}

impl SeriesColors {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let mut names: Vec<String> = names.into_iter().collect();
        names.dedup();
        let palette = generate_palette(names.len());
        Self {
            mapping: names.into_iter().zip(palette).collect(),
        }
    }

    /// Colour for `name`; names not seen at load time get a neutral grey.
    pub fn color_for(&self, name: &str) -> Color32 {
        self.mapping.get(name).copied().unwrap_or(Color32::GRAY)
    }
}
