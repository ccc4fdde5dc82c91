//! Guidance annotation layout
//!
//! Turns a target box and instruction text into a drawable scene:
//!
//! - a dashed, rounded highlight around the target, inflated by a padding
//! - an arrow whose head sits just outside the highlight and whose tail lies
//!   on the side with more free vertical space, breathing back and forth
//! - an instruction box placed where it does not cover the target or arrow,
//!   trying above, below, left and right in that order before falling back
//!   to above with a minimum top offset
//!
//! The scene is static data plus the animation parameters; the pulse and
//! fade curves are evaluated by whoever draws it.

use super::payload::VisualCue;
use crate::config::GuidanceConfig;
use crate::geometry::{PixelBox, Point, Rect, ScreenMetrics};
use serde::Serialize;
use std::f64::consts::PI;

/// Gap between the highlight outline and the arrow head
const ARROW_GAP_PX: f64 = 8.0;
const ARROW_HEAD_LENGTH_PX: f64 = 40.0;
const ARROW_STROKE_PX: f64 = 10.0;
/// Half-angle between the arrowhead wings and the shaft
const ARROW_HEAD_SPREAD_DEG: f64 = 30.0;

const HIGHLIGHT_CORNER_RADIUS_PX: f64 = 24.0;
const HIGHLIGHT_STROKE_PX: f64 = 8.0;
const HIGHLIGHT_DASH_PX: [f64; 2] = [24.0, 12.0];

/// Average glyph advance relative to the text size
const CHAR_WIDTH_RATIO: f64 = 0.55;
const LINE_HEIGHT_RATIO: f64 = 1.3;
const TEXT_PADDING_PX: f64 = 24.0;
const TEXT_CORNER_RADIUS_PX: f64 = 20.0;

const CUE_COLOUR: &str = "#FFC107";
const TEXT_BACKGROUND: &str = "rgba(33, 33, 33, 0.9)";
const TEXT_FOREGROUND: &str = "#FFFFFF";
const DEBUG_COLOUR: &str = "#FF1744";

/// Which way the arrow points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowDirection {
    /// Tail above the target, pointing down at it
    Down,
    /// Tail below the target, pointing up at it
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowLayout {
    pub direction: ArrowDirection,
    /// Arrow tip, fixed just outside the highlight
    pub head: Point,
    /// Tail position at the start of the pulse cycle
    pub tail_rest: Point,
    /// Extra distance the tail travels away from the target at peak
    pub pulse_px: f64,
    pub pulse_period_ms: u64,
    pub head_length: f64,
    pub stroke_width: f64,
    pub colour: &'static str,
}

impl ArrowLayout {
    /// Tail position `elapsed_ms` into the animation
    pub fn tail_at(&self, elapsed_ms: u64) -> Point {
        let offset = self.pulse_px * pulse_ease(elapsed_ms, self.pulse_period_ms);
        let length = self.head.distance_to(&self.tail_rest);
        if length == 0.0 {
            return self.tail_rest;
        }
        let ux = (self.tail_rest.x - self.head.x) / length;
        let uy = (self.tail_rest.y - self.head.y) / length;
        Point::new(self.tail_rest.x + ux * offset, self.tail_rest.y + uy * offset)
    }

    /// The two arrowhead wing end points for a given tail position
    pub fn head_wings(&self, tail: Point) -> (Point, Point) {
        let angle = (self.head.y - tail.y).atan2(self.head.x - tail.x);
        let spread = ARROW_HEAD_SPREAD_DEG.to_radians();
        let wing = |a: f64| {
            Point::new(
                self.head.x - self.head_length * a.cos(),
                self.head.y - self.head_length * a.sin(),
            )
        };
        (wing(angle - spread), wing(angle + spread))
    }

    /// Region swept by the arrow over a full pulse
    pub fn extent(&self) -> Rect {
        let far = self.tail_at(self.pulse_period_ms / 2);
        let half = self.head_length;
        Rect::new(
            self.head.x.min(far.x) - half,
            self.head.y.min(far.y),
            self.head.x.max(far.x) + half,
            self.head.y.max(far.y),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightLayout {
    pub rect: Rect,
    pub corner_radius: f64,
    pub stroke_width: f64,
    /// Dash on/off lengths
    pub dash: [f64; 2],
    pub colour: &'static str,
}

/// Where the instruction box ended up relative to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPlacement {
    Above,
    Below,
    Left,
    Right,
    /// Nothing fit; above the target, pushed down to the minimum offset
    FallbackAbove,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayout {
    pub rect: Rect,
    pub placement: TextPlacement,
    pub lines: Vec<String>,
    pub font_size: f64,
    pub line_height: f64,
    pub padding: f64,
    pub corner_radius: f64,
    pub background: &'static str,
    pub foreground: &'static str,
}

/// Everything needed to draw one guidance annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceScene {
    pub cue: VisualCue,
    pub target: PixelBox,
    pub highlight: HighlightLayout,
    pub arrow: ArrowLayout,
    /// `None` when the instruction text is blank
    pub text: Option<TextLayout>,
    pub fade_in_ms: u64,
    /// Raw target outline, drawn only in debug mode
    pub debug_outline: Option<Rect>,
    pub debug_colour: Option<&'static str>,
}

/// Pulse easing in `[0, 1]`: a raised cosine that starts and ends at rest
pub fn pulse_ease(elapsed_ms: u64, period_ms: u64) -> f64 {
    if period_ms == 0 {
        return 0.0;
    }
    let phase = (elapsed_ms % period_ms) as f64 / period_ms as f64;
    (1.0 - (2.0 * PI * phase).cos()) / 2.0
}

/// Opacity `elapsed_ms` after the annotation first appeared
pub fn fade_alpha(elapsed_ms: u64, fade_in_ms: u64) -> f64 {
    if fade_in_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f64 / fade_in_ms as f64).min(1.0)
}

/// Compute the full scene for a target and instruction
pub fn compute_scene(
    target: &PixelBox,
    instruction: &str,
    cue: VisualCue,
    metrics: &ScreenMetrics,
    style: &GuidanceConfig,
    debug: bool,
) -> GuidanceScene {
    let target_rect = target.to_rect();
    let highlight = HighlightLayout {
        rect: target_rect.inflate(style.highlight_padding_px),
        corner_radius: HIGHLIGHT_CORNER_RADIUS_PX,
        stroke_width: HIGHLIGHT_STROKE_PX,
        dash: HIGHLIGHT_DASH_PX,
        colour: CUE_COLOUR,
    };

    let arrow = layout_arrow(&highlight.rect, target, metrics, style);
    let obstacle = highlight.rect.union(&arrow.extent());
    let text = layout_text(instruction, &obstacle, target, metrics, style);

    if debug {
        tracing::info!(
            "Guidance layout: target={:?} arrow={:?} text={:?}",
            target,
            arrow.direction,
            text.as_ref().map(|t| t.placement)
        );
    }

    GuidanceScene {
        cue,
        target: *target,
        highlight,
        arrow,
        text,
        fade_in_ms: style.fade_in_ms,
        debug_outline: debug.then_some(target_rect),
        debug_colour: debug.then_some(DEBUG_COLOUR),
    }
}

fn layout_arrow(
    highlight: &Rect,
    target: &PixelBox,
    metrics: &ScreenMetrics,
    style: &GuidanceConfig,
) -> ArrowLayout {
    let centre = target.center();

    // More room above a target in the lower half, so come from there
    let direction = if centre.y > metrics.usable_height() / 2.0 {
        ArrowDirection::Down
    } else {
        ArrowDirection::Up
    };

    let (head, tail_rest) = match direction {
        ArrowDirection::Down => {
            let head = Point::new(centre.x, highlight.top - ARROW_GAP_PX);
            (head, Point::new(centre.x, head.y - style.arrow_distance_px))
        }
        ArrowDirection::Up => {
            let head = Point::new(centre.x, highlight.bottom + ARROW_GAP_PX);
            (head, Point::new(centre.x, head.y + style.arrow_distance_px))
        }
    };

    ArrowLayout {
        direction,
        head,
        tail_rest,
        pulse_px: style.arrow_pulse_px,
        pulse_period_ms: style.arrow_pulse_period_ms,
        head_length: ARROW_HEAD_LENGTH_PX,
        stroke_width: ARROW_STROKE_PX,
        colour: CUE_COLOUR,
    }
}

fn layout_text(
    instruction: &str,
    obstacle: &Rect,
    target: &PixelBox,
    metrics: &ScreenMetrics,
    style: &GuidanceConfig,
) -> Option<TextLayout> {
    if instruction.trim().is_empty() {
        return None;
    }

    let screen_w = metrics.width();
    let screen_h = metrics.usable_height();
    let margin = style.text_margin_px;
    let char_w = style.text_size_px * CHAR_WIDTH_RATIO;
    let line_h = style.text_size_px * LINE_HEIGHT_RATIO;

    let max_box_w = style.text_max_width_px.min(screen_w - 2.0 * margin);
    let max_chars = ((max_box_w - 2.0 * TEXT_PADDING_PX) / char_w).floor().max(1.0) as usize;
    let lines = wrap_text(instruction, max_chars);
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let w = longest as f64 * char_w + 2.0 * TEXT_PADDING_PX;
    let h = lines.len() as f64 * line_h + 2.0 * TEXT_PADDING_PX;
    let centre = target.center();

    let centred_x = clamp_span(centre.x - w / 2.0, margin, screen_w - margin - w);
    let centred_y = clamp_span(centre.y - h / 2.0, margin, screen_h - margin - h);

    let (placement, left, top) = if obstacle.top - margin - h >= margin {
        (TextPlacement::Above, centred_x, obstacle.top - margin - h)
    } else if obstacle.bottom + margin + h <= screen_h - margin {
        (TextPlacement::Below, centred_x, obstacle.bottom + margin)
    } else if obstacle.left - margin - w >= margin {
        (TextPlacement::Left, obstacle.left - margin - w, centred_y)
    } else if obstacle.right + margin + w <= screen_w - margin {
        (TextPlacement::Right, obstacle.right + margin, centred_y)
    } else {
        (
            TextPlacement::FallbackAbove,
            centred_x,
            (obstacle.top - margin - h).max(margin),
        )
    };

    Some(TextLayout {
        rect: Rect::from_origin(left, top, w, h),
        placement,
        lines,
        font_size: style.text_size_px,
        line_height: line_h,
        padding: TEXT_PADDING_PX,
        corner_radius: TEXT_CORNER_RADIUS_PX,
        background: TEXT_BACKGROUND,
        foreground: TEXT_FOREGROUND,
    })
}

/// Clamp into `[lo, hi]`, preferring `lo` when the span is empty
fn clamp_span(value: f64, lo: f64, hi: f64) -> f64 {
    if hi < lo {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Greedy word wrap on character counts. Explicit newlines are kept and
/// words longer than a line are split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.trim().lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> ScreenMetrics {
        ScreenMetrics::new(1000, 2000, 0)
    }

    fn scene_for(target: PixelBox, text: &str) -> GuidanceScene {
        compute_scene(
            &target,
            text,
            VisualCue::Arrow,
            &phone(),
            &GuidanceConfig::default(),
            false,
        )
    }

    #[test]
    fn test_highlight_is_inflated_target() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "Tap here");
        assert_eq!(scene.highlight.rect, Rect::new(84.0, 184.0, 216.0, 416.0));
    }

    #[test]
    fn test_upper_target_gets_arrow_from_below() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "Tap here");
        assert_eq!(scene.arrow.direction, ArrowDirection::Up);
        assert_eq!(scene.arrow.head, Point::new(150.0, 424.0));
        assert_eq!(scene.arrow.tail_rest, Point::new(150.0, 574.0));
    }

    #[test]
    fn test_lower_target_gets_arrow_from_above() {
        let scene = scene_for(PixelBox::new(1500, 400, 1600, 600), "Tap here");
        assert_eq!(scene.arrow.direction, ArrowDirection::Down);
        assert!(scene.arrow.tail_rest.y < scene.arrow.head.y);
        assert!(scene.arrow.head.y < 1500.0);
    }

    #[test]
    fn test_pulse_stays_within_bounds() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "Tap here");
        let arrow = &scene.arrow;

        assert_eq!(arrow.tail_at(0), arrow.tail_rest);
        let peak = arrow.tail_at(arrow.pulse_period_ms / 2);
        assert!((peak.y - (arrow.tail_rest.y + arrow.pulse_px)).abs() < 1e-9);

        for ms in (0..2000).step_by(50) {
            let tail = arrow.tail_at(ms);
            assert!(tail.y >= arrow.tail_rest.y - 1e-9);
            assert!(tail.y <= arrow.tail_rest.y + arrow.pulse_px + 1e-9);
        }
    }

    #[test]
    fn test_arrowhead_wings_are_symmetric() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "Tap here");
        let arrow = &scene.arrow;
        let (a, b) = arrow.head_wings(arrow.tail_rest);

        // Pointing up: both wings sit below the head, mirrored about the shaft
        assert!(a.y > arrow.head.y && b.y > arrow.head.y);
        assert!((a.y - b.y).abs() < 1e-9);
        assert!(((a.x - arrow.head.x) + (b.x - arrow.head.x)).abs() < 1e-9);
        let half_width = (a.x - b.x).abs() / 2.0;
        let expected = arrow.head_length * 30f64.to_radians().sin();
        assert!((half_width - expected).abs() < 1e-9);
    }

    #[test]
    fn test_text_goes_above_when_room() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "Tap here");
        let text = scene.text.unwrap();
        assert_eq!(text.placement, TextPlacement::Above);
        assert!(!text.rect.intersects(&scene.highlight.rect));
        assert_eq!(text.lines, vec!["Tap here".to_string()]);
    }

    #[test]
    fn test_text_goes_below_target_at_top_edge() {
        let scene = scene_for(PixelBox::new(0, 300, 60, 700), "Open the menu");
        let text = scene.text.unwrap();
        assert_eq!(text.placement, TextPlacement::Below);
        assert!(!text.rect.intersects(&scene.highlight.rect));
        assert!(!text.rect.intersects(&scene.arrow.extent()));
    }

    #[test]
    fn test_text_goes_left_when_target_fills_height() {
        let scene = scene_for(PixelBox::new(0, 700, 2000, 950), "Swipe");
        let text = scene.text.unwrap();
        assert_eq!(text.placement, TextPlacement::Left);
        assert!(text.rect.right <= scene.highlight.rect.left);
    }

    #[test]
    fn test_text_goes_right_when_target_hugs_left_edge() {
        let scene = scene_for(PixelBox::new(0, 0, 2000, 250), "Swipe");
        let text = scene.text.unwrap();
        assert_eq!(text.placement, TextPlacement::Right);
        assert!(text.rect.left >= scene.highlight.rect.right);
        assert!(!text.rect.intersects(&scene.arrow.extent()));
        assert!(text.rect.right <= 1000.0 - GuidanceConfig::default().text_margin_px);
    }

    #[test]
    fn test_text_falls_back_when_nothing_fits() {
        let scene = scene_for(PixelBox::new(0, 0, 2000, 1000), "Everything");
        let text = scene.text.unwrap();
        assert_eq!(text.placement, TextPlacement::FallbackAbove);
        assert_eq!(text.rect.top, GuidanceConfig::default().text_margin_px);
    }

    #[test]
    fn test_blank_instruction_has_no_text_box() {
        let scene = scene_for(PixelBox::new(200, 100, 400, 200), "   ");
        assert!(scene.text.is_none());
    }

    #[test]
    fn test_degenerate_target_still_lays_out() {
        let scene = scene_for(PixelBox::new(500, 500, 500, 500), "Here");
        assert_eq!(scene.highlight.rect, Rect::new(484.0, 484.0, 516.0, 516.0));
        assert!(scene.text.is_some());
    }

    #[test]
    fn test_long_text_wraps_within_max_width() {
        let style = GuidanceConfig::default();
        let scene = scene_for(
            PixelBox::new(1200, 100, 1300, 900),
            "Scroll down until you see the blue button labelled Continue and then tap it",
        );
        let text = scene.text.unwrap();
        assert!(text.lines.len() > 1);
        assert!(text.rect.width() <= style.text_max_width_px + 1e-9);
    }

    #[test]
    fn test_debug_outline_only_in_debug_mode() {
        let target = PixelBox::new(200, 100, 400, 200);
        assert!(scene_for(target, "x").debug_outline.is_none());

        let debug = compute_scene(
            &target,
            "x",
            VisualCue::Arrow,
            &phone(),
            &GuidanceConfig::default(),
            true,
        );
        assert_eq!(debug.debug_outline, Some(target.to_rect()));
    }

    #[test]
    fn test_wrap_splits_long_words() {
        assert_eq!(
            wrap_text("abcdefgh ij", 3),
            vec!["abc", "def", "gh", "ij"]
        );
        assert_eq!(wrap_text("one\ntwo", 20), vec!["one", "two"]);
    }

    #[test]
    fn test_fade_and_pulse_curves() {
        assert_eq!(fade_alpha(0, 300), 0.0);
        assert_eq!(fade_alpha(150, 300), 0.5);
        assert_eq!(fade_alpha(900, 300), 1.0);
        assert_eq!(fade_alpha(0, 0), 1.0);

        assert_eq!(pulse_ease(0, 1000), 0.0);
        assert!((pulse_ease(500, 1000) - 1.0).abs() < 1e-12);
        assert_eq!(pulse_ease(123, 0), 0.0);
    }
}
