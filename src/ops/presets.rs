// ============================================================================
// PRESETS — fixed filter looks
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::EditorError;
use crate::ops::filters::FilterState;

/// The closed set of one-click looks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    #[default]
    None,
    Grayscale,
    Sepia,
    Vintage,
    Cold,
    Warm,
}

/// Values a preset writes; everything else in [`FilterState`] is left alone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresetValues {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur: f32,
    pub hue: f32,
}

impl Preset {
    pub fn all() -> &'static [Preset] {
        &[
            Preset::None,
            Preset::Grayscale,
            Preset::Sepia,
            Preset::Vintage,
            Preset::Cold,
            Preset::Warm,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::None      => "none",
            Preset::Grayscale => "grayscale",
            Preset::Sepia     => "sepia",
            Preset::Vintage   => "vintage",
            Preset::Cold      => "cold",
            Preset::Warm      => "warm",
        }
    }

    pub fn values(&self) -> PresetValues {
        let (brightness, contrast, saturation, blur, hue) = match self {
            Preset::None      => (100.0, 100.0, 100.0, 0.0, 0.0),
            Preset::Grayscale => (100.0, 100.0, 0.0, 0.0, 0.0),
            Preset::Sepia     => (110.0, 90.0, 80.0, 0.0, 20.0),
            Preset::Vintage   => (95.0, 85.0, 70.0, 0.5, 10.0),
            Preset::Cold      => (105.0, 110.0, 120.0, 0.0, 200.0),
            Preset::Warm      => (110.0, 105.0, 130.0, 0.0, 30.0),
        };
        PresetValues { brightness, contrast, saturation, blur, hue }
    }

    /// Overwrite the preset's five fields. Rotate, opacity, sharpen and the
    /// flips keep their current values.
    pub fn apply_to(&self, state: &mut FilterState) {
        let v = self.values();
        state.brightness = v.brightness;
        state.contrast = v.contrast;
        state.saturation = v.saturation;
        state.blur = v.blur;
        state.hue = v.hue;
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let wanted = if wanted == "greyscale" { "grayscale".to_string() } else { wanted };
        Preset::all()
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| EditorError::UnknownPreset(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_zeroes_saturation_only() {
        let mut state = FilterState { rotate: 45.0, opacity: 60.0, sharpen: 20.0, ..Default::default() };
        state.flip_horizontal = true;
        Preset::Grayscale.apply_to(&mut state);
        assert_eq!(state.saturation, 0.0);
        assert_eq!(state.brightness, 100.0);
        assert_eq!(state.rotate, 45.0);
        assert_eq!(state.opacity, 60.0);
        assert_eq!(state.sharpen, 20.0);
        assert!(state.flip_horizontal);
    }

    #[test]
    fn none_restores_neutral_look() {
        let mut state = FilterState::default();
        Preset::Cold.apply_to(&mut state);
        assert_eq!(state.hue, 200.0);
        Preset::None.apply_to(&mut state);
        assert!(state.is_default());
    }

    #[test]
    fn preset_values_stay_in_range() {
        for preset in Preset::all() {
            let mut state = FilterState::default();
            preset.apply_to(&mut state);
            assert_eq!(state.sanitized(), state, "{preset}");
        }
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("Vintage".parse::<Preset>().unwrap(), Preset::Vintage);
        assert_eq!(" WARM ".parse::<Preset>().unwrap(), Preset::Warm);
        assert_eq!("greyscale".parse::<Preset>().unwrap(), Preset::Grayscale);
        assert!(matches!("neon".parse::<Preset>(), Err(EditorError::UnknownPreset(name)) if name == "neon"));
    }
}
