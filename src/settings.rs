//! Surface settings and quality presets
//!
//! Persisted in LocalStorage on the web; read from a JSON file on native.

use serde::{Deserialize, Serialize};

use crate::sim::{FieldTuning, GridTuning};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Ambient noise octave weights (base octave first)
    pub fn octave_weights(&self) -> Vec<f32> {
        match self {
            QualityPreset::Low => vec![0.65, 0.35],
            QualityPreset::Medium => vec![0.55, 0.3, 0.15],
            QualityPreset::High => vec![0.5, 0.27, 0.15, 0.08],
        }
    }

    /// Tiles per viewport axis (fewer tiles = fewer draw batches)
    pub fn target_tile_count(&self) -> u32 {
        match self {
            QualityPreset::Low => 2,
            QualityPreset::Medium => 3,
            QualityPreset::High => 4,
        }
    }
}

/// Water surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,

    /// Displacement field tuning
    pub field: FieldTuning,
    /// Tile grid sizing
    pub grid: GridTuning,

    // === Accessibility ===
    /// Reduced motion (no tile drift, softer ripples)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_preset(QualityPreset::default())
    }
}

impl Settings {
    /// Create settings from a quality preset (applies preset defaults)
    pub fn from_preset(preset: QualityPreset) -> Self {
        let mut settings = Self {
            quality: preset,
            field: FieldTuning::default(),
            grid: GridTuning::default(),
            reduced_motion: false,
        };
        settings.apply_preset(preset);
        settings
    }

    /// Apply a quality preset (updates quality-dependent settings)
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
        self.field.octave_weights = preset.octave_weights();
        self.grid.target_tile_count = preset.target_tile_count();
    }

    /// Field tuning with accessibility applied
    pub fn effective_field_tuning(&self) -> FieldTuning {
        let mut tuning = self.field.clone();
        if self.reduced_motion {
            tuning.tile_drift_amplitude = 0.0;
        }
        tuning
    }

    /// Multiplier applied to gameplay ripple amplitudes
    pub fn ripple_amplitude_scale(&self) -> f32 {
        if self.reduced_motion { 0.5 } else { 1.0 }
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "water_surface_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(settings) = serde_json::from_str(&json) {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native has no settings store; use `load_from` for a file
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        log::debug!("No settings store on native ({}), using defaults", Self::STORAGE_KEY);
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read settings from a JSON file, falling back to defaults on any error
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Could not read settings {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Invalid settings in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!(QualityPreset::from_str("HIGH"), Some(QualityPreset::High));
        assert_eq!(QualityPreset::from_str("med"), Some(QualityPreset::Medium));
        assert_eq!(QualityPreset::from_str("ultra"), None);
        assert_eq!(QualityPreset::Low.as_str(), "Low");
    }

    #[test]
    fn test_presets_keep_two_octaves() {
        for preset in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            let settings = Settings::from_preset(preset);
            assert!(settings.field.octave_weights.len() >= 2);
            assert_eq!(settings.grid.target_tile_count, preset.target_tile_count());
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{"reduced_motion": true, "field": {"falloff_radius": 90.0}}"#)
            .unwrap();
        assert!(settings.reduced_motion);
        assert_eq!(settings.field.falloff_radius, 90.0);
        assert_eq!(settings.field.ripple_speed, FieldTuning::default().ripple_speed);
        assert_eq!(settings.grid, Settings::default().grid);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(Settings::from_json("{ not json").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings = Settings::load_from("/nonexistent/water-settings.json");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_reduced_motion_effects() {
        let mut settings = Settings::default();
        assert_eq!(settings.ripple_amplitude_scale(), 1.0);
        assert!(settings.effective_field_tuning().tile_drift_amplitude > 0.0);

        settings.reduced_motion = true;
        assert_eq!(settings.ripple_amplitude_scale(), 0.5);
        assert_eq!(settings.effective_field_tuning().tile_drift_amplitude, 0.0);
    }
}
