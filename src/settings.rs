use std::path::{Path, PathBuf};

use crate::components::history::DEFAULT_MAX_HISTORY;
use crate::error::Result;
use crate::ops::transform::Interpolation;

const SETTINGS_FILE: &str = "settings.cfg";

/// Persistent editor preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// History bound (snapshots kept for undo).
    pub max_undo_steps: usize,
    /// Gaussian σ per unit of the blur slider.
    pub blur_sigma_scale: f32,
    pub resize_interpolation: Interpolation,
    /// File name prefix for downloads.
    pub export_prefix: String,
    pub log_file: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_HISTORY,
            blur_sigma_scale: 1.0,
            resize_interpolation: Interpolation::default(),
            export_prefix: "pixels-edited".to_string(),
            log_file: None,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixels-editor/settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelsEditor\settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelsEditor/settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PixelsEditor").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelsEditor")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixels-editor").join(SETTINGS_FILE))
        }
    }

    /// Load from the platform path (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path` (defaults if missing or unreadable).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys, comments and bad values are
    /// ignored; the affected field keeps its default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "max_undo_steps" => {
                    if let Ok(n) = val.parse::<usize>()
                        && n > 0
                    {
                        s.max_undo_steps = n;
                    }
                }
                "blur_sigma_scale" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v >= 0.0
                    {
                        s.blur_sigma_scale = v;
                    }
                }
                "resize_interpolation" => {
                    if let Ok(i) = val.parse() {
                        s.resize_interpolation = i;
                    }
                }
                "export_prefix" => {
                    if !val.is_empty() {
                        s.export_prefix = val.to_string();
                    }
                }
                "log_file" => {
                    s.log_file = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             blur_sigma_scale={}\n\
             resize_interpolation={}\n\
             export_prefix={}\n\
             log_file={}\n",
            self.max_undo_steps,
            self.blur_sigma_scale,
            self.resize_interpolation.name(),
            self.export_prefix,
            self.log_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        )
    }

    /// Save to the platform path. Silently does nothing when no config
    /// directory can be determined.
    pub fn save(&self) -> Result<()> {
        match Self::settings_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = EditorSettings::default();
        assert_eq!(s.max_undo_steps, 20);
        assert_eq!(s.blur_sigma_scale, 1.0);
        assert_eq!(s.resize_interpolation, Interpolation::Bicubic);
        assert_eq!(s.export_prefix, "pixels-edited");
        assert_eq!(s.log_file, None);
    }

    #[test]
    fn parse_ignores_junk() {
        let s = EditorSettings::parse(
            "# comment\n\
             max_undo_steps = 5\n\
             blur_sigma_scale=nope\n\
             resize_interpolation=lanczos3\n\
             theme=dark\n\
             no equals sign here\n\
             export_prefix=shot\n",
        );
        assert_eq!(s.max_undo_steps, 5);
        assert_eq!(s.blur_sigma_scale, 1.0);
        assert_eq!(s.resize_interpolation, Interpolation::Lanczos3);
        assert_eq!(s.export_prefix, "shot");
    }

    #[test]
    fn zero_undo_steps_falls_back() {
        assert_eq!(EditorSettings::parse("max_undo_steps=0").max_undo_steps, 20);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let s = EditorSettings {
            max_undo_steps: 7,
            blur_sigma_scale: 0.5,
            resize_interpolation: Interpolation::Bilinear,
            export_prefix: "out".into(),
            log_file: Some(PathBuf::from("/tmp/editor.log")),
        };
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EditorSettings::load_from(&dir.path().join("absent.cfg")), EditorSettings::default());
    }
}
