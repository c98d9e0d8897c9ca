//! Pixel pipeline for a single-image photo editor.
//!
//! An [`EditorContext`] owns the base image, the live [`FilterState`], the
//! crop tool and a bounded undo history. Rendering is always
//! `orient -> filters -> sharpen` over an untouched base, so slider changes
//! never accumulate rounding error.
#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod settings;

pub use canvas::PixelBuffer;
pub use components::crop::{CropController, CropHandle, CropRect, CropState, PointerEvent, PointerTarget};
pub use components::history::{HistorySnapshot, HistoryStack};
pub use editor::{Download, EditorContext};
pub use error::{EditorError, Result};
pub use io::SaveFormat;
pub use ops::filters::{FilterParam, FilterState};
pub use ops::presets::Preset;
pub use ops::transform::Interpolation;
pub use settings::EditorSettings;
