// ============================================================================
// CROP TOOL — interactive crop rectangle state machine
// ============================================================================
//
// All coordinates are image pixels. Converting from on-screen positions is
// the caller's job; the controller only sees already-scaled pointers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// Smallest crop edge, in pixels.
pub const MIN_CROP_SIZE: f32 = 50.0;

/// Fraction of each canvas dimension left outside a freshly placed rectangle.
pub const INITIAL_INSET: f32 = 0.1;

/// Slack for float drift when checking bounds.
const BOUNDS_EPSILON: f32 = 1e-3;

/// Minimum edge for a canvas side; canvases under [`MIN_CROP_SIZE`] use
/// their full extent.
#[inline]
pub fn min_crop_extent(canvas_dim: f32) -> f32 {
    MIN_CROP_SIZE.min(canvas_dim)
}

// ============================================================================
// CROP RECT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// The default rectangle for a canvas: inset by [`INITIAL_INSET`] on
    /// every side, grown to the minimum size on tiny canvases.
    pub fn initial(canvas_w: u32, canvas_h: u32) -> Self {
        let (cw, ch) = (canvas_w as f32, canvas_h as f32);
        let width = (cw * (1.0 - 2.0 * INITIAL_INSET)).max(min_crop_extent(cw));
        let height = (ch * (1.0 - 2.0 * INITIAL_INSET)).max(min_crop_extent(ch));
        Self {
            x: (cw * INITIAL_INSET).min(cw - width),
            y: (ch * INITIAL_INSET).min(ch - height),
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f32 { self.x + self.width }

    #[inline]
    pub fn bottom(&self) -> f32 { self.y + self.height }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Check the rectangle against a canvas: inside its bounds and no
    /// smaller than the minimum crop size.
    pub fn validate(&self, canvas_w: u32, canvas_h: u32) -> Result<()> {
        let (cw, ch) = (canvas_w as f32, canvas_h as f32);
        let finite = [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite());
        let ok = finite
            && canvas_w > 0
            && canvas_h > 0
            && self.x >= 0.0
            && self.y >= 0.0
            && self.right() <= cw + BOUNDS_EPSILON
            && self.bottom() <= ch + BOUNDS_EPSILON
            && self.width >= min_crop_extent(cw) - BOUNDS_EPSILON
            && self.height >= min_crop_extent(ch) - BOUNDS_EPSILON;
        if ok {
            Ok(())
        } else {
            Err(EditorError::InvalidRect {
                rect: *self,
                canvas_width: canvas_w,
                canvas_height: canvas_h,
            })
        }
    }

    /// Integer `(x, y, width, height)` on a canvas. The size is the rounded
    /// rectangle size; the origin is pulled back if rounding would spill
    /// past the canvas edge. Only meaningful after [`CropRect::validate`].
    pub fn pixel_bounds(&self, canvas_w: u32, canvas_h: u32) -> (u32, u32, u32, u32) {
        let w = (self.width.round().max(1.0) as u32).min(canvas_w);
        let h = (self.height.round().max(1.0) as u32).min(canvas_h);
        let x = (self.x.round().max(0.0) as u32).min(canvas_w - w);
        let y = (self.y.round().max(0.0) as u32).min(canvas_h - h);
        (x, y, w, h)
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

// ============================================================================
// HANDLES / EVENTS
// ============================================================================

/// The eight resize grips, named by compass direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropHandle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl CropHandle {
    pub fn all() -> &'static [CropHandle] {
        &[
            CropHandle::NW,
            CropHandle::NE,
            CropHandle::SE,
            CropHandle::SW,
            CropHandle::N,
            CropHandle::E,
            CropHandle::S,
            CropHandle::W,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CropHandle::N  => "n",
            CropHandle::S  => "s",
            CropHandle::E  => "e",
            CropHandle::W  => "w",
            CropHandle::NE => "ne",
            CropHandle::NW => "nw",
            CropHandle::SE => "se",
            CropHandle::SW => "sw",
        }
    }

    pub fn north(&self) -> bool { matches!(self, CropHandle::N | CropHandle::NE | CropHandle::NW) }
    pub fn south(&self) -> bool { matches!(self, CropHandle::S | CropHandle::SE | CropHandle::SW) }
    pub fn east(&self)  -> bool { matches!(self, CropHandle::E | CropHandle::NE | CropHandle::SE) }
    pub fn west(&self)  -> bool { matches!(self, CropHandle::W | CropHandle::NW | CropHandle::SW) }

    /// Where this grip sits on `rect`.
    pub fn anchor(&self, rect: &CropRect) -> (f32, f32) {
        let x = if self.west() {
            rect.x
        } else if self.east() {
            rect.right()
        } else {
            rect.x + rect.width * 0.5
        };
        let y = if self.north() {
            rect.y
        } else if self.south() {
            rect.bottom()
        } else {
            rect.y + rect.height * 0.5
        };
        (x, y)
    }
}

impl FromStr for CropHandle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n"  => Ok(CropHandle::N),
            "s"  => Ok(CropHandle::S),
            "e"  => Ok(CropHandle::E),
            "w"  => Ok(CropHandle::W),
            "ne" => Ok(CropHandle::NE),
            "nw" => Ok(CropHandle::NW),
            "se" => Ok(CropHandle::SE),
            "sw" => Ok(CropHandle::SW),
            other => Err(format!("unknown crop handle '{}'", other)),
        }
    }
}

/// What a pointer-down landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    Body,
    Handle(CropHandle),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32, target: PointerTarget },
    Move { x: f32, y: f32 },
    Up,
}

/// The gesture in progress while the tool is active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    /// Moving the whole rectangle; the grab offset is pointer − origin at
    /// pointer-down.
    Dragging { grab_x: f32, grab_y: f32 },
    /// Moving the edges named by `handle`; deltas are taken against the
    /// previous pointer position.
    Resizing { handle: CropHandle, last_x: f32, last_y: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum CropState {
    #[default]
    Idle,
    Active { rect: CropRect, gesture: Option<Gesture> },
}

impl CropState {
    /// Pure transition: the state after `event` on a `canvas_w × canvas_h`
    /// canvas. Idle ignores pointer events.
    pub fn next(self, event: PointerEvent, canvas_w: f32, canvas_h: f32) -> CropState {
        let CropState::Active { rect, gesture } = self else {
            return self;
        };

        match (event, gesture) {
            // One gesture at a time.
            (PointerEvent::Down { .. }, Some(_)) => self,
            (PointerEvent::Down { x, y, target }, None) => {
                let gesture = match target {
                    PointerTarget::Body if rect.contains(x, y) => Some(Gesture::Dragging {
                        grab_x: x - rect.x,
                        grab_y: y - rect.y,
                    }),
                    PointerTarget::Body => None,
                    PointerTarget::Handle(handle) => Some(Gesture::Resizing {
                        handle,
                        last_x: x,
                        last_y: y,
                    }),
                };
                CropState::Active { rect, gesture }
            }
            (PointerEvent::Move { .. }, None) => self,
            (PointerEvent::Move { x, y }, Some(Gesture::Dragging { grab_x, grab_y })) => {
                CropState::Active {
                    rect: drag_to(&rect, x - grab_x, y - grab_y, canvas_w, canvas_h),
                    gesture,
                }
            }
            (PointerEvent::Move { x, y }, Some(Gesture::Resizing { handle, last_x, last_y })) => {
                CropState::Active {
                    rect: resize_by(&rect, handle, x - last_x, y - last_y, canvas_w, canvas_h),
                    gesture: Some(Gesture::Resizing { handle, last_x: x, last_y: y }),
                }
            }
            (PointerEvent::Up, _) => CropState::Active { rect, gesture: None },
        }
    }
}

/// Move the origin to `(x, y)`, clamped so the rectangle stays on the canvas.
fn drag_to(rect: &CropRect, x: f32, y: f32, canvas_w: f32, canvas_h: f32) -> CropRect {
    CropRect {
        x: x.min(canvas_w - rect.width).max(0.0),
        y: y.min(canvas_h - rect.height).max(0.0),
        ..*rect
    }
}

/// Apply a pointer delta to the edges named by `handle`. Each edge is
/// clamped to the canvas and the minimum size; west/north edges move the
/// origin so the opposite edge stays put.
fn resize_by(
    rect: &CropRect,
    handle: CropHandle,
    dx: f32,
    dy: f32,
    canvas_w: f32,
    canvas_h: f32,
) -> CropRect {
    let min_w = min_crop_extent(canvas_w);
    let min_h = min_crop_extent(canvas_h);
    let mut out = *rect;

    if handle.east() {
        out.width = (rect.width + dx).min(canvas_w - rect.x).max(min_w);
    }
    if handle.west() {
        let right = rect.right();
        out.width = (rect.width - dx).max(min_w).min(right);
        out.x = right - out.width;
    }
    if handle.south() {
        out.height = (rect.height + dy).min(canvas_h - rect.y).max(min_h);
    }
    if handle.north() {
        let bottom = rect.bottom();
        out.height = (rect.height - dy).max(min_h).min(bottom);
        out.y = bottom - out.height;
    }
    out
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Owns the crop state for one canvas.
#[derive(Clone, Debug, Default)]
pub struct CropController {
    state: CropState,
    canvas_w: f32,
    canvas_h: f32,
}

impl CropController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter crop mode with the default rectangle. Restarting while active
    /// places a fresh rectangle.
    pub fn start(&mut self, canvas_w: u32, canvas_h: u32) -> CropRect {
        let rect = CropRect::initial(canvas_w, canvas_h);
        self.canvas_w = canvas_w as f32;
        self.canvas_h = canvas_h as f32;
        self.state = CropState::Active { rect, gesture: None };
        rect
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, CropState::Active { .. })
    }

    pub fn rect(&self) -> Option<CropRect> {
        match self.state {
            CropState::Active { rect, .. } => Some(rect),
            CropState::Idle => None,
        }
    }

    pub fn gesture(&self) -> Option<Gesture> {
        match self.state {
            CropState::Active { gesture, .. } => gesture,
            CropState::Idle => None,
        }
    }

    /// Feed one pointer event and return the resulting state.
    pub fn handle(&mut self, event: PointerEvent) -> &CropState {
        self.state = self.state.next(event, self.canvas_w, self.canvas_h);
        &self.state
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, target: PointerTarget) -> &CropState {
        self.handle(PointerEvent::Down { x, y, target })
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> &CropState {
        self.handle(PointerEvent::Move { x, y })
    }

    pub fn pointer_up(&mut self) -> &CropState {
        self.handle(PointerEvent::Up)
    }

    /// Resolve a pointer position to a grip (within `tolerance` pixels on
    /// each axis) or the rectangle body. Corners win over edges.
    pub fn hit_test(&self, x: f32, y: f32, tolerance: f32) -> Option<PointerTarget> {
        let rect = self.rect()?;
        for handle in CropHandle::all() {
            let (hx, hy) = handle.anchor(&rect);
            if (x - hx).abs() <= tolerance && (y - hy).abs() <= tolerance {
                return Some(PointerTarget::Handle(*handle));
            }
        }
        rect.contains(x, y).then_some(PointerTarget::Body)
    }

    /// Leave crop mode, returning the discarded rectangle.
    pub fn cancel(&mut self) -> Option<CropRect> {
        let rect = self.rect();
        self.state = CropState::Idle;
        rect
    }
}
