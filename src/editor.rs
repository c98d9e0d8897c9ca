use std::path::Path;
use std::time::SystemTime;

use uuid::Uuid;

use crate::canvas::PixelBuffer;
use crate::components::crop::{CropController, CropRect, CropState, PointerEvent, PointerTarget};
use crate::components::history::{HistorySnapshot, HistoryStack};
use crate::error::{EditorError, Result};
use crate::io::{self, PendingDecode, SaveFormat};
use crate::ops::filters::{FilterParam, FilterState};
use crate::ops::presets::Preset;
use crate::ops::render::render;
use crate::ops::transform;
use crate::settings::EditorSettings;
use crate::{log_debug, log_info, log_warn};

/// Grab distance for crop handles, in image pixels.
pub const HANDLE_TOLERANCE: f32 = 8.0;

/// An encoded render ready to be saved by the caller.
#[derive(Clone, Debug)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One editing session: the committed base image, the live filter state,
/// the crop tool and the undo history.
///
/// Every command either succeeds or returns an error with the session left
/// exactly as it was.
pub struct EditorContext {
    pub id: Uuid,
    base: Option<PixelBuffer>,
    state: FilterState,
    crop: CropController,
    history: HistoryStack,
    settings: EditorSettings,
    /// Bumped by every accepted `begin_load`; older decodes are ignored.
    load_generation: u64,
}

impl Default for EditorContext {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

/// Log a refused command at WARN and hand the error back.
fn refuse(op: &str, err: EditorError) -> EditorError {
    log_warn!("{} refused: {}", op, err);
    err
}

impl EditorContext {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            base: None,
            state: FilterState::default(),
            crop: CropController::new(),
            history: HistoryStack::new(settings.max_undo_steps),
            settings,
            load_generation: 0,
        }
    }

    // ---- accessors ----------------------------------------------------------

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// The committed image, before the live filter state is applied.
    pub fn base(&self) -> Option<&PixelBuffer> {
        self.base.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.base.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base.as_ref().map(|b| b.dimensions())
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn crop(&self) -> &CropController {
        &self.crop
    }

    fn require_base(&self, op: &str) -> Result<&PixelBuffer> {
        self.base.as_ref().ok_or_else(|| refuse(op, EditorError::NoImageLoaded))
    }

    /// Snapshot the candidate state first, then install it. Nothing changes
    /// if the snapshot fails.
    fn commit(&mut self, description: String, base: Option<PixelBuffer>, state: FilterState) -> Result<()> {
        let snapshot = {
            let b = match base.as_ref().or(self.base.as_ref()) {
                Some(b) => b,
                None => return Err(refuse(&description, EditorError::NoImageLoaded)),
            };
            HistorySnapshot::capture(description.clone(), b, &state).map_err(|e| refuse(&description, e))?
        };
        if let Some(b) = base {
            self.base = Some(b);
        }
        self.state = state;
        self.history.push(snapshot);
        log_info!(
            "{} (history {}/{})",
            description,
            self.history.len(),
            self.history.max_history_size()
        );
        Ok(())
    }

    // ---- loading ------------------------------------------------------------

    /// Start a fresh session on `image`: history cleared, filters reset,
    /// crop mode left, then the loaded image becomes the first snapshot.
    /// Any background decode still in flight is superseded.
    pub fn load_image(&mut self, image: PixelBuffer) -> Result<()> {
        if image.is_empty() {
            let (w, h) = image.dimensions();
            return Err(refuse(
                "Load image",
                EditorError::InvalidDimensions { width: w as i64, height: h as i64 },
            ));
        }
        let (w, h) = image.dimensions();
        let snapshot = HistorySnapshot::capture("Load image", &image, &FilterState::default())
            .map_err(|e| refuse("Load image", e))?;

        self.history = HistoryStack::new(self.settings.max_undo_steps);
        self.history.push(snapshot);
        self.base = Some(image);
        self.load_generation += 1;
        self.state = FilterState::default();
        self.crop.cancel();
        log_info!("Loaded {}x{} image", w, h);
        Ok(())
    }

    /// Decode and load a file from disk.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let image = io::load_image_sync(path).map_err(|e| refuse("Open file", e))?;
        log_debug!("Decoded {}", path.display());
        self.load_image(image)
    }

    /// Kick off a background decode. Any decode started earlier is
    /// superseded: its result will be dropped by [`Self::finish_load`].
    pub fn begin_load(&mut self, bytes: Vec<u8>, extension: Option<String>) -> Result<PendingDecode> {
        let generation = self.load_generation + 1;
        let pending = io::spawn_decode(bytes, extension, generation).map_err(|e| refuse("Open file", e))?;
        self.load_generation = generation;
        log_debug!("Decode #{} started", generation);
        Ok(pending)
    }

    /// Wait for `pending` and load it if it is still the latest request.
    /// Returns `Ok(false)` for a superseded decode.
    pub fn finish_load(&mut self, pending: PendingDecode) -> Result<bool> {
        if pending.generation() != self.load_generation {
            log_debug!(
                "Dropping superseded decode #{} (latest #{})",
                pending.generation(),
                self.load_generation
            );
            return Ok(false);
        }
        let image = pending.wait().map_err(|e| refuse("Open file", e))?;
        self.load_image(image)?;
        Ok(true)
    }

    // ---- live filters -------------------------------------------------------

    /// Move one slider. This is a live preview: nothing is pushed to
    /// history until [`Self::commit_filters`].
    pub fn set_filter(&mut self, param: FilterParam, value: f32) -> Result<f32> {
        self.require_base("Set filter")?;
        let stored = self.state.set(param, value);
        log_debug!("{} = {}", param, stored);
        Ok(stored)
    }

    /// Commit the current sliders (slider release).
    pub fn commit_filters(&mut self) -> Result<()> {
        self.require_base("Adjust filters")?;
        self.commit("Adjust filters".to_string(), None, self.state)
    }

    /// Set a slider and commit in one step.
    pub fn apply_filter(&mut self, param: FilterParam, value: f32) -> Result<()> {
        self.require_base("Adjust filters")?;
        let mut state = self.state;
        let stored = state.set(param, value);
        self.commit(format!("Set {} to {}", param, stored), None, state)
    }

    /// Replace the whole filter state (e.g. from a recipe) and commit.
    pub fn apply_state(&mut self, state: FilterState) -> Result<()> {
        self.require_base("Apply recipe")?;
        self.commit("Apply recipe".to_string(), None, state.sanitized())
    }

    /// The image as currently displayed.
    pub fn render(&self) -> Result<PixelBuffer> {
        let base = self.require_base("Render")?;
        Ok(render(base, &self.state, self.settings.blur_sigma_scale))
    }

    pub fn flip_horizontal(&mut self) -> Result<()> {
        self.require_base("Flip horizontal")?;
        let mut state = self.state;
        state.flip_horizontal = !state.flip_horizontal;
        self.commit("Flip horizontal".to_string(), None, state)
    }

    pub fn flip_vertical(&mut self) -> Result<()> {
        self.require_base("Flip vertical")?;
        let mut state = self.state;
        state.flip_vertical = !state.flip_vertical;
        self.commit("Flip vertical".to_string(), None, state)
    }

    pub fn apply_preset(&mut self, preset: Preset) -> Result<()> {
        self.require_base("Apply preset")?;
        let mut state = self.state;
        preset.apply_to(&mut state);
        self.commit(format!("Preset {}", preset), None, state)
    }

    pub fn apply_preset_name(&mut self, name: &str) -> Result<()> {
        let preset = name.parse::<Preset>().map_err(|e| refuse("Apply preset", e))?;
        self.apply_preset(preset)
    }

    /// Restore every slider and flip to its default and leave crop mode.
    /// Pushes history only when an image is loaded.
    pub fn reset_filters(&mut self) -> Result<()> {
        if self.crop.cancel().is_some() {
            log_info!("Crop cancelled by reset");
        }
        if self.base.is_none() {
            self.state.reset();
            return Ok(());
        }
        self.commit("Reset filters".to_string(), None, FilterState::default())
    }

    // ---- destructive geometry -----------------------------------------------

    /// Resample the displayed image. A missing side keeps the aspect ratio.
    /// The result becomes the new base and the filters return to defaults.
    pub fn apply_resize(&mut self, width: Option<i64>, height: Option<i64>) -> Result<(u32, u32)> {
        let composite = self.render()?;
        let (ow, oh) = composite.dimensions();
        let (nw, nh) = transform::resolve_resize_dimensions(ow, oh, width, height)
            .map_err(|e| refuse("Resize", e))?;
        let resized = transform::resize(&composite, nw, nh, self.settings.resize_interpolation)
            .map_err(|e| refuse("Resize", e))?;
        self.commit(format!("Resize to {}x{}", nw, nh), Some(resized), FilterState::default())?;
        self.crop.cancel();
        Ok((nw, nh))
    }

    // ---- crop tool ----------------------------------------------------------

    /// Enter crop mode with the default rectangle.
    pub fn start_crop(&mut self) -> Result<CropRect> {
        let (w, h) = self.require_base("Crop")?.dimensions();
        let rect = self.crop.start(w, h);
        log_info!("Crop started at {}", rect);
        Ok(rect)
    }

    /// Feed a pointer event to the crop tool.
    pub fn crop_event(&mut self, event: PointerEvent) -> Result<CropState> {
        if !self.crop.is_active() {
            return Err(refuse("Crop gesture", EditorError::CropNotActive));
        }
        Ok(*self.crop.handle(event))
    }

    /// Pointer-down with the target resolved by hit testing. Missing the
    /// rectangle entirely starts no gesture.
    pub fn crop_pointer_down(&mut self, x: f32, y: f32) -> Result<CropState> {
        let target = self.crop.hit_test(x, y, HANDLE_TOLERANCE).unwrap_or(PointerTarget::Body);
        self.crop_event(PointerEvent::Down { x, y, target })
    }

    pub fn crop_pointer_move(&mut self, x: f32, y: f32) -> Result<CropState> {
        self.crop_event(PointerEvent::Move { x, y })
    }

    pub fn crop_pointer_up(&mut self) -> Result<CropState> {
        self.crop_event(PointerEvent::Up)
    }

    /// Leave crop mode without cropping. Returns whether it was active.
    pub fn cancel_crop(&mut self) -> bool {
        let was_active = self.crop.cancel().is_some();
        if was_active {
            log_info!("Crop cancelled");
        }
        was_active
    }

    /// Crop the displayed image to the active rectangle and leave crop mode.
    pub fn apply_crop(&mut self) -> Result<(u32, u32)> {
        let rect = self.crop.rect().ok_or_else(|| refuse("Apply crop", EditorError::CropNotActive))?;
        let size = self.crop_to(&rect)?;
        self.crop.cancel();
        Ok(size)
    }

    /// Crop the displayed image to `rect` without going through the crop
    /// tool. Any active crop is left.
    pub fn apply_crop_rect(&mut self, rect: CropRect) -> Result<(u32, u32)> {
        let size = self.crop_to(&rect)?;
        self.crop.cancel();
        Ok(size)
    }

    fn crop_to(&mut self, rect: &CropRect) -> Result<(u32, u32)> {
        let composite = self.render()?;
        let cropped = transform::crop(&composite, rect).map_err(|e| refuse("Apply crop", e))?;
        let size = cropped.dimensions();
        self.commit(format!("Crop to {}x{}", size.0, size.1), Some(cropped), FilterState::default())?;
        Ok(size)
    }

    // ---- history ------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Committed steps, most recent first.
    pub fn history_descriptions(&self) -> Vec<String> {
        self.history.undo_history()
    }

    /// Step back one commit. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let undone = self.history.undo_description().map(str::to_string);
        let restored = match self.history.undo() {
            Some(snapshot) => snapshot.restore(),
            None => return Ok(false),
        };
        match restored {
            Ok((base, state)) => {
                self.install(base, state);
                log_info!("Undo: {}", undone.unwrap_or_default());
                Ok(true)
            }
            Err(e) => {
                self.history.redo();
                Err(refuse("Undo", e))
            }
        }
    }

    /// Step forward one commit. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        let redone = self.history.redo_description().map(str::to_string);
        let restored = match self.history.redo() {
            Some(snapshot) => snapshot.restore(),
            None => return Ok(false),
        };
        match restored {
            Ok((base, state)) => {
                self.install(base, state);
                log_info!("Redo: {}", redone.unwrap_or_default());
                Ok(true)
            }
            Err(e) => {
                self.history.undo();
                Err(refuse("Redo", e))
            }
        }
    }

    fn install(&mut self, base: PixelBuffer, state: FilterState) {
        self.base = Some(base);
        self.state = state;
        self.crop.cancel();
    }

    // ---- export -------------------------------------------------------------

    /// PNG of the displayed image with a timestamped file name.
    pub fn download(&self) -> Result<Download> {
        self.download_at(SystemTime::now())
    }

    pub fn download_at(&self, now: SystemTime) -> Result<Download> {
        let composite = self.render()?;
        let bytes = io::encode_png(&composite).map_err(|e| refuse("Download", e))?;
        let file_name = io::export_file_name(&self.settings.export_prefix, now);
        log_info!("Download {} ({} bytes)", file_name, bytes.len());
        Ok(Download { file_name, bytes })
    }

    /// Encode the displayed image straight to a file.
    pub fn export(&self, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
        let composite = self.render()?;
        io::encode_and_write(&composite, path, format, quality).map_err(|e| refuse("Export", e))?;
        log_info!("Exported {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn loaded(w: u32, h: u32) -> EditorContext {
        let mut ed = EditorContext::default();
        let mut img = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put_pixel(x, y, Rgba([(x % 256) as u8, (y % 256) as u8, 60, 255]));
            }
        }
        ed.load_image(img).unwrap();
        ed
    }

    #[test]
    fn commands_need_an_image() {
        let mut ed = EditorContext::default();
        assert!(matches!(ed.render(), Err(EditorError::NoImageLoaded)));
        assert!(matches!(ed.flip_horizontal(), Err(EditorError::NoImageLoaded)));
        assert!(matches!(ed.apply_resize(Some(10), None), Err(EditorError::NoImageLoaded)));
        assert!(matches!(ed.start_crop(), Err(EditorError::NoImageLoaded)));
        assert!(matches!(ed.download(), Err(EditorError::NoImageLoaded)));
        assert!(matches!(ed.set_filter(FilterParam::Hue, 5.0), Err(EditorError::NoImageLoaded)));
        assert!(!ed.crop().is_active());
        assert!(ed.history().is_empty());
    }

    #[test]
    fn load_pushes_first_snapshot() {
        let ed = loaded(10, 10);
        assert_eq!(ed.history().len(), 1);
        assert!(!ed.can_undo());
        assert_eq!(ed.history_descriptions(), vec!["Load image"]);
    }

    #[test]
    fn slider_drag_does_not_push_history() {
        let mut ed = loaded(10, 10);
        for v in [110.0, 120.0, 130.0] {
            ed.set_filter(FilterParam::Brightness, v).unwrap();
            ed.render().unwrap();
        }
        assert_eq!(ed.history().len(), 1);
        ed.commit_filters().unwrap();
        assert_eq!(ed.history().len(), 2);
        assert_eq!(ed.state().brightness, 130.0);
    }

    #[test]
    fn flip_toggles_and_undoes() {
        let mut ed = loaded(4, 2);
        let before = ed.render().unwrap();
        ed.flip_horizontal().unwrap();
        assert!(ed.state().flip_horizontal);
        assert_ne!(ed.render().unwrap(), before);
        assert!(ed.undo().unwrap());
        assert_eq!(ed.render().unwrap(), before);
        assert!(ed.redo().unwrap());
        assert!(ed.state().flip_horizontal);
    }

    #[test]
    fn preset_keeps_rotate() {
        let mut ed = loaded(8, 8);
        ed.apply_filter(FilterParam::Rotate, 90.0).unwrap();
        ed.apply_preset_name("sepia").unwrap();
        assert_eq!(ed.state().rotate, 90.0);
        assert_eq!(ed.state().hue, 20.0);
        assert!(matches!(ed.apply_preset_name("neon"), Err(EditorError::UnknownPreset(_))));
        assert_eq!(ed.history().len(), 3);
    }

    #[test]
    fn reset_cancels_crop_and_commits() {
        let mut ed = loaded(100, 100);
        ed.apply_filter(FilterParam::Contrast, 150.0).unwrap();
        ed.start_crop().unwrap();
        ed.reset_filters().unwrap();
        assert!(!ed.crop().is_active());
        assert!(ed.state().is_default());
        assert_eq!(ed.history_descriptions()[0], "Reset filters");
    }

    #[test]
    fn resize_bakes_filters() {
        let mut ed = loaded(200, 100);
        ed.apply_filter(FilterParam::Brightness, 50.0).unwrap();
        assert_eq!(ed.apply_resize(Some(50), None).unwrap(), (50, 25));
        assert_eq!(ed.dimensions(), Some((50, 25)));
        assert!(ed.state().is_default());
        // Bake happened once: rendering now equals the base.
        assert_eq!(&ed.render().unwrap(), ed.base().unwrap());
    }

    #[test]
    fn failed_resize_changes_nothing() {
        let mut ed = loaded(20, 10);
        ed.set_filter(FilterParam::Saturation, 0.0).unwrap();
        let err = ed.apply_resize(Some(0), Some(5)).unwrap_err();
        assert!(matches!(err, EditorError::InvalidDimensions { .. }));
        assert_eq!(ed.dimensions(), Some((20, 10)));
        assert_eq!(ed.state().saturation, 0.0);
        assert_eq!(ed.history().len(), 1);
    }

    #[test]
    fn crop_gesture_then_apply() {
        let mut ed = loaded(200, 200);
        assert!(matches!(ed.crop_pointer_move(1.0, 1.0), Err(EditorError::CropNotActive)));
        assert!(matches!(ed.apply_crop(), Err(EditorError::CropNotActive)));

        let rect = ed.start_crop().unwrap();
        assert_eq!(rect, CropRect::new(20.0, 20.0, 160.0, 160.0));

        // Grab the south-east corner and pull it in.
        ed.crop_pointer_down(180.0, 180.0).unwrap();
        ed.crop_pointer_move(120.0, 100.0).unwrap();
        ed.crop_pointer_up().unwrap();
        assert_eq!(ed.crop().rect(), Some(CropRect::new(20.0, 20.0, 100.0, 80.0)));

        assert_eq!(ed.apply_crop().unwrap(), (100, 80));
        assert!(!ed.crop().is_active());
        assert_eq!(ed.base().unwrap().get_pixel(0, 0), Some(Rgba([20, 20, 60, 255])));

        assert!(ed.undo().unwrap());
        assert_eq!(ed.dimensions(), Some((200, 200)));
    }

    #[test]
    fn cancel_crop_discards() {
        let mut ed = loaded(120, 90);
        ed.start_crop().unwrap();
        assert!(ed.cancel_crop());
        assert!(!ed.cancel_crop());
        assert_eq!(ed.dimensions(), Some((120, 90)));
        assert_eq!(ed.history().len(), 1);
    }

    #[test]
    fn invalid_crop_rect_is_refused() {
        let mut ed = loaded(100, 100);
        let err = ed.apply_crop_rect(CropRect::new(60.0, 0.0, 50.0, 50.0)).unwrap_err();
        assert!(matches!(err, EditorError::InvalidRect { canvas_width: 100, .. }));
        assert_eq!(ed.dimensions(), Some((100, 100)));
    }

    #[test]
    fn history_bound_comes_from_settings() {
        let settings = EditorSettings { max_undo_steps: 3, ..Default::default() };
        let mut ed = EditorContext::new(settings);
        ed.load_image(PixelBuffer::new_filled(2, 2, Rgba([1, 2, 3, 255]))).unwrap();
        for _ in 0..5 {
            ed.flip_vertical().unwrap();
        }
        assert_eq!(ed.history().len(), 3);
        assert!(ed.undo().unwrap());
        assert!(ed.undo().unwrap());
        assert!(!ed.undo().unwrap());
    }

    #[test]
    fn download_names_and_encodes() {
        let ed = loaded(6, 6);
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_secs(86_400 + 3_661);
        let dl = ed.download_at(t).unwrap();
        assert_eq!(dl.file_name, "pixels-edited-1970-01-02T01-01-01.png");
        assert_eq!(io::decode(&dl.bytes, Some("png")).unwrap(), ed.render().unwrap());
    }

    #[test]
    fn superseded_decode_is_dropped() {
        let mut ed = EditorContext::default();
        let first = io::encode_png(&PixelBuffer::new_filled(3, 3, Rgba([9, 9, 9, 255]))).unwrap();
        let second = io::encode_png(&PixelBuffer::new_filled(5, 4, Rgba([1, 1, 1, 255]))).unwrap();

        let stale = ed.begin_load(first, Some("png".into())).unwrap();
        let latest = ed.begin_load(second, Some("png".into())).unwrap();

        assert!(!ed.finish_load(stale).unwrap());
        assert!(!ed.has_image());
        assert!(ed.finish_load(latest).unwrap());
        assert_eq!(ed.dimensions(), Some((5, 4)));
    }

    #[test]
    fn direct_load_supersedes_pending_decode() {
        let mut ed = EditorContext::default();
        let bytes = io::encode_png(&PixelBuffer::new_filled(3, 3, Rgba([9, 9, 9, 255]))).unwrap();
        let pending = ed.begin_load(bytes, Some("png".into())).unwrap();

        ed.load_image(PixelBuffer::new_filled(7, 5, Rgba([1, 2, 3, 255]))).unwrap();
        ed.apply_filter(FilterParam::Brightness, 120.0).unwrap();

        assert!(!ed.finish_load(pending).unwrap());
        assert_eq!(ed.dimensions(), Some((7, 5)));
        assert_eq!(ed.history().len(), 2);

        let bytes = io::encode_png(&PixelBuffer::new_filled(4, 4, Rgba([5, 5, 5, 255]))).unwrap();
        let next = ed.begin_load(bytes, Some("png".into())).unwrap();
        assert!(ed.finish_load(next).unwrap());
        assert_eq!(ed.dimensions(), Some((4, 4)));
    }

    #[test]
    fn unsupported_upload_leaves_session_alone() {
        let mut ed = loaded(10, 10);
        let err = ed.begin_load(b"GIF89a....".to_vec(), Some("gif".into())).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFileType(_)));
        assert_eq!(ed.dimensions(), Some((10, 10)));
        assert_eq!(ed.history().len(), 1);
    }
}
