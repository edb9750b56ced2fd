//! Waveform pane view function
//!
//! ## Usage
//!
//! ```ignore
//! fn view(&self) -> Element<Message> {
//!     let pane = waveform_pane(
//!         &self.waveform,
//!         Message::Seek,
//!         Message::Select,
//!         Message::ScrollBy,
//!     );
//!
//!     column![pane, /* transport controls */].into()
//! }
//! ```

use super::canvas::WaveformCanvas;
use super::state::WaveformState;
use iced::widget::Canvas;
use iced::{Element, Length};

/// Create the waveform pane element
///
/// # Arguments
///
/// * `state` - Engine state with the computed tiles, playhead and selection
/// * `on_seek` - Called with the byte offset of a click
/// * `on_select` - Called with the `[begin, end)` byte range of a drag
/// * `on_scroll` - Called with a horizontal scroll delta in pixels
///
/// The pane fills the available width; its height follows `state.height()`.
pub fn waveform_pane<'a, Message>(
    state: &'a WaveformState,
    on_seek: impl Fn(u64) -> Message + 'a,
    on_select: impl Fn(u64, u64) -> Message + 'a,
    on_scroll: impl Fn(f64) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    Canvas::new(WaveformCanvas {
        state,
        on_seek,
        on_select,
        on_scroll,
    })
    .width(Length::Fill)
    .height(Length::Fixed(state.height() as f32))
    .into()
}
