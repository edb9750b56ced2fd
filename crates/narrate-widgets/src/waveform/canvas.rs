//! Canvas Program for the waveform pane
//!
//! Draws the computed tiles and everything layered over them. Pointer
//! gestures are turned into messages through the caller's closures.

use super::reducer::MAX_CHANNELS;
use super::state::{PointerGesture, WaveformState, CLICK_TOLERANCE};
use super::surface_pool::TileImage;
use super::time_ticks::cursor_label;
use crate::theme;
use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Event, Frame, Geometry, Path, Program, Stroke, Text};
use iced::{mouse, Color, Point, Rectangle, Size, Theme};
use narrate_core::config::DrawStyle;

/// Pixels scrolled per mouse wheel line
pub const WHEEL_LINE_PIXELS: f32 = 40.0;

const LOADING_BAR_HEIGHT: f32 = 3.0;
const RULER_TEXT_SIZE: f32 = 11.0;
const LABEL_TEXT_SIZE: f32 = 12.0;
/// Rough glyph width for sizing the cursor label backdrop
const CURSOR_CHAR_WIDTH: f32 = 6.5;

// =============================================================================
// Canvas Interaction State
// =============================================================================

/// Pointer tracking, in pixels relative to the pane
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveformInteraction {
    /// Where the left button went down
    pub drag_start_x: Option<f32>,
    /// Latest cursor x while dragging
    pub drag_x: Option<f32>,
    /// Cursor x while hovering
    pub hover_x: Option<f32>,
}

// =============================================================================
// Waveform Canvas Program
// =============================================================================

/// Canvas program for the waveform pane
///
/// * `on_seek` gets the byte offset of a click
/// * `on_select` gets the byte range of a drag
/// * `on_scroll` gets a horizontal scroll delta in pixels
pub struct WaveformCanvas<'a, Message, SeekFn, SelectFn, ScrollFn>
where
    SeekFn: Fn(u64) -> Message,
    SelectFn: Fn(u64, u64) -> Message,
    ScrollFn: Fn(f64) -> Message,
{
    pub state: &'a WaveformState,
    pub on_seek: SeekFn,
    pub on_select: SelectFn,
    pub on_scroll: ScrollFn,
}

impl<'a, Message, SeekFn, SelectFn, ScrollFn> Program<Message>
    for WaveformCanvas<'a, Message, SeekFn, SelectFn, ScrollFn>
where
    Message: Clone,
    SeekFn: Fn(u64) -> Message,
    SelectFn: Fn(u64, u64) -> Message,
    ScrollFn: Fn(f64) -> Message,
{
    type State = WaveformInteraction;

    fn update(
        &self,
        interaction: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        let position = cursor.position_in(bounds);
        match event {
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = position?;
                interaction.drag_start_x = Some(position.x);
                interaction.drag_x = Some(position.x);
                Some(canvas::Action::request_redraw())
            }
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                interaction.hover_x = position.map(|p| p.x);
                if interaction.drag_start_x.is_some() {
                    if let Some(position) = position {
                        interaction.drag_x = Some(position.x);
                    }
                }
                Some(canvas::Action::request_redraw())
            }
            Event::Mouse(mouse::Event::CursorLeft) => {
                interaction.hover_x = None;
                Some(canvas::Action::request_redraw())
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let start = interaction.drag_start_x.take()?;
                let end = position
                    .map(|p| p.x)
                    .or(interaction.drag_x.take())
                    .unwrap_or(start)
                    .clamp(0.0, bounds.width);
                interaction.drag_x = None;

                let scroll = self.state.scroll();
                let gesture = self
                    .state
                    .classify_gesture(start as f64 + scroll, end as f64 + scroll);
                let message = match gesture {
                    PointerGesture::Click(byte_offset) => (self.on_seek)(byte_offset),
                    PointerGesture::Select(begin, end) => (self.on_select)(begin, end),
                };
                Some(canvas::Action::publish(message))
            }
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if position.is_none() {
                    return None;
                }
                let (dx, dy) = match *delta {
                    mouse::ScrollDelta::Lines { x, y } => (x * WHEEL_LINE_PIXELS, y * WHEEL_LINE_PIXELS),
                    mouse::ScrollDelta::Pixels { x, y } => (x, y),
                };
                let amount = if dx != 0.0 { -dx } else { -dy };
                Some(canvas::Action::publish((self.on_scroll)(amount as f64)).and_capture())
            }
            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        _interaction: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if cursor.is_over(bounds) && self.state.has_stream() {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }

    fn draw(
        &self,
        interaction: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), theme::BACKGROUND);

        let state = self.state;
        if !state.has_stream() {
            return vec![frame.into_geometry()];
        }

        let width = bounds.width;
        let height = bounds.height;
        let scroll = state.scroll() as f32;
        let bpp = state.bytes_per_pixel();
        let overlay = state.overlay();
        let style = state.config().draw_style;

        for (tile_x, image) in state.visible_tiles() {
            draw_tile(&mut frame, image, tile_x, style);
        }

        // Selection, then the in-progress drag on top
        if let Some((begin, end)) = state.selection() {
            if let Some(rect) = overlay.selection_rect(begin, end, bpp, height) {
                fill_shifted(&mut frame, rect, scroll, theme::SELECTION);
            }
        }
        if let (Some(start), Some(current)) = (interaction.drag_start_x, interaction.drag_x) {
            if ((start - current).abs() as f64) > CLICK_TOLERANCE {
                frame.fill_rectangle(
                    Point::new(start.min(current), 0.0),
                    Size::new((start - current).abs(), height),
                    theme::SELECTION,
                );
            }
        }

        if let Some(segment) = state.current_segment() {
            if let Some(bars) = overlay.segment_bracket(&segment, bpp, height) {
                for bar in bars {
                    fill_shifted(&mut frame, bar, scroll, theme::SEGMENT_BRACKET);
                }
            }
        }

        if let Some(markers) = state.markers() {
            for label in overlay.segment_labels(&markers, bpp, state.scroll(), width as f64) {
                frame.fill_text(Text {
                    content: label.text,
                    position: Point::new(label.x - scroll, height - overlay.arrow_depth - 2.0),
                    size: LABEL_TEXT_SIZE.into(),
                    color: theme::LABEL_TEXT,
                    align_x: Horizontal::Left.into(),
                    align_y: Vertical::Bottom.into(),
                    ..Text::default()
                });
            }
        }

        draw_time_ruler(&mut frame, state);

        if let Some(playhead) = state.playhead() {
            if let Some(points) = overlay.playhead_chevron(playhead as f64, bpp, height) {
                let chevron = Path::new(|builder| {
                    builder.move_to(Point::new(points[0].x - scroll, points[0].y));
                    for point in &points[1..] {
                        builder.line_to(Point::new(point.x - scroll, point.y));
                    }
                    builder.close();
                });
                frame.fill(&chevron, theme::PLAYHEAD);
                frame.stroke(
                    &chevron,
                    Stroke::default().with_color(theme::PLAYHEAD).with_width(1.0),
                );
            }
        }

        if let (Some(hover_x), Some(format)) = (interaction.hover_x, state.format()) {
            frame.stroke(
                &Path::line(Point::new(hover_x, 0.0), Point::new(hover_x, height)),
                Stroke::default().with_color(theme::TIME_TICK).with_width(1.0),
            );
            let label = cursor_label(format, bpp, state.scroll(), hover_x as f64);
            let label_width = label.chars().count() as f32 * CURSOR_CHAR_WIDTH;
            let x = (hover_x - label_width / 2.0)
                .min(width - label_width - 5.0)
                .max(5.0);
            let y = height - RULER_TEXT_SIZE - 8.0;
            frame.fill_rectangle(
                Point::new(x - 2.0, y),
                Size::new(label_width + 4.0, RULER_TEXT_SIZE + 4.0),
                theme::CURSOR_LABEL_BACKGROUND,
            );
            frame.fill_text(Text {
                content: label,
                position: Point::new(x, y + 2.0),
                size: RULER_TEXT_SIZE.into(),
                color: Color::WHITE,
                align_x: Horizontal::Left.into(),
                align_y: Vertical::Top.into(),
                ..Text::default()
            });
        }

        // Loading indicator with progress
        if let Some(progress) = state.load_state().progress() {
            let y = height - LOADING_BAR_HEIGHT;
            frame.fill_rectangle(
                Point::new(0.0, y),
                Size::new(width, LOADING_BAR_HEIGHT),
                theme::with_alpha(theme::LOADING, 0.3),
            );
            frame.fill_rectangle(
                Point::new(0.0, y),
                Size::new(width * progress.clamp(0.0, 1.0), LOADING_BAR_HEIGHT),
                theme::LOADING,
            );
        }

        vec![frame.into_geometry()]
    }
}

// =============================================================================
// Drawing Helper Functions
// =============================================================================

/// Draw one tile picture at `tile_x` (pane coordinates)
fn draw_tile(frame: &mut Frame, image: &TileImage, tile_x: f32, style: DrawStyle) {
    let columns = &image.columns;
    if let Some(first) = columns.first() {
        for channel in 0..image.channel_count.min(MAX_CHANNELS) {
            let color = theme::CHANNEL_COLORS[channel];

            if style.has_fill() {
                let outline = Path::new(|builder| {
                    let start = first.channels[channel];
                    builder.move_to(Point::new(tile_x + first.x, start.top));
                    for column in &columns[1..] {
                        builder.line_to(Point::new(tile_x + column.x, column.channels[channel].top));
                    }
                    for column in columns.iter().rev() {
                        builder.line_to(Point::new(tile_x + column.x, column.channels[channel].bottom));
                    }
                    builder.close();
                });
                frame.fill(&outline, theme::with_alpha(color, theme::FILL_ALPHA));
            }

            if style.has_bars() {
                let bars = Stroke::default()
                    .with_color(theme::with_alpha(color, theme::BARS_ALPHA))
                    .with_width(1.0);
                for column in columns {
                    let envelope = column.channels[channel];
                    frame.stroke(
                        &Path::line(
                            Point::new(tile_x + column.x, envelope.top),
                            Point::new(tile_x + column.x, envelope.bottom),
                        ),
                        bars,
                    );
                }
            }

            if style.has_border() {
                let border = Stroke::default().with_color(color).with_width(1.0);
                let top = Path::new(|builder| {
                    builder.move_to(Point::new(tile_x + first.x, first.channels[channel].top));
                    for column in &columns[1..] {
                        builder.line_to(Point::new(tile_x + column.x, column.channels[channel].top));
                    }
                });
                let bottom = Path::new(|builder| {
                    builder.move_to(Point::new(tile_x + first.x, first.channels[channel].bottom));
                    for column in &columns[1..] {
                        builder.line_to(Point::new(tile_x + column.x, column.channels[channel].bottom));
                    }
                });
                frame.stroke(&top, border);
                frame.stroke(&bottom, border);
            }
        }
    }

    let tick = Stroke::default().with_color(theme::SEGMENT_TICK).with_width(1.0);
    for &x in &image.boundary_ticks {
        frame.stroke(
            &Path::line(
                Point::new(tile_x + x, 0.0),
                Point::new(tile_x + x, image.height),
            ),
            tick,
        );
    }
}

/// Ticks along the top edge, labels under the major ones
fn draw_time_ruler(frame: &mut Frame, state: &WaveformState) {
    let stroke = Stroke::default().with_color(theme::TIME_TICK).with_width(1.0);
    for tick in state.time_ticks() {
        frame.stroke(
            &Path::line(Point::new(tick.x, 0.0), Point::new(tick.x, tick.height)),
            stroke,
        );
        if let Some(label) = tick.label {
            frame.fill_text(Text {
                content: label,
                position: Point::new(tick.x, tick.height),
                size: RULER_TEXT_SIZE.into(),
                color: theme::TIME_TICK,
                align_x: Horizontal::Center.into(),
                align_y: Vertical::Top.into(),
                ..Text::default()
            });
        }
    }
}

/// Fill a content-space rectangle shifted into pane space
fn fill_shifted(frame: &mut Frame, rect: Rectangle, scroll: f32, color: Color) {
    frame.fill_rectangle(
        Point::new(rect.x - scroll, rect.y),
        Size::new(rect.width, rect.height),
        color,
    );
}
