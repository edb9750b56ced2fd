//! Configuration for the narration audio pane
//!
//! - `WaveformSettings`: every option the waveform renderer recognizes
//! - `NarrateConfig`: root YAML document
//! - Generic YAML load/save helpers
//!
//! ```ignore
//! use narrate_core::config::{default_config_path, load_config, save_config, NarrateConfig};
//!
//! let path = default_config_path();
//! let mut config: NarrateConfig = load_config(&path);
//! config.waveform.use_decibels = true;
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod waveform;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILE_NAME};
pub use waveform::{DrawStyle, NarrateConfig, WaveformSettings};
