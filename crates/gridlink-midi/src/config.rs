//! Bridge configuration schema and loader
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/gridlink/bridge.yaml
//!
//! The file is only ever read. Every field has a default, so a partial file
//! overrides just what it names.

use crate::codec::ChannelId;
use crate::drum::DrumProfile;
use crate::layout::{LayoutScheme, DEFAULT_ROOT_NOTE, MAX_ROOT_NOTE};
use crate::scale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lowest accepted DAW refresh interval
const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Root bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Port names and matching
    pub ports: PortConfig,
    /// Startup layout and drum settings
    pub layout: LayoutDefaults,
    /// LED colors and brightness values
    pub palette: LedPalette,
    /// How often to ask the DAW to resend its state (milliseconds)
    pub refresh_interval_ms: u64,
    /// Pad velocities are raised to at least this value
    pub min_velocity: u8,
    /// MIDI channel (0-15) for notes on the note output port
    pub note_channel: u8,
    /// MIDI channel (0-15) for drum triggers on the devices channel
    pub drum_channel: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ports: PortConfig::default(),
            layout: LayoutDefaults::default(),
            palette: LedPalette::default(),
            refresh_interval_ms: 1000,
            min_velocity: 40,
            note_channel: 0,
            drum_channel: 0,
        }
    }
}

impl BridgeConfig {
    /// Clamp out-of-range values to something usable
    pub fn sanitized(mut self) -> Self {
        if self.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            log::warn!(
                "Config: refresh_interval_ms {} too low, using {}",
                self.refresh_interval_ms,
                MIN_REFRESH_INTERVAL_MS
            );
            self.refresh_interval_ms = MIN_REFRESH_INTERVAL_MS;
        }
        self.min_velocity = self.min_velocity.clamp(1, 127);
        self.note_channel &= 0x0F;
        self.drum_channel &= 0x0F;
        self.layout.root_note = self.layout.root_note.min(MAX_ROOT_NOTE);
        self.layout.root_pitch_class %= 12;
        if scale::scale_index(&self.layout.scale).is_none() {
            log::warn!("Config: unknown scale '{}', using Major", self.layout.scale);
            self.layout.scale = scale::SCALES[0].name.to_string();
        }
        self
    }
}

/// Port names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// MIDI client name used when creating ports
    pub client_name: String,
    /// Surface port name substring to match (case-insensitive)
    pub surface_match: String,
    /// Virtual port for transport traffic
    pub transport: String,
    /// Virtual port for device traffic
    pub devices: String,
    /// Virtual port for mixer traffic
    pub mixer: String,
    /// Virtual port the pads play notes on
    pub notes: String,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            client_name: "gridlink".to_string(),
            surface_match: "Ableton Push".to_string(),
            transport: "gridlink transport".to_string(),
            devices: "gridlink devices".to_string(),
            mixer: "gridlink mixer".to_string(),
            notes: "gridlink notes".to_string(),
        }
    }
}

impl PortConfig {
    /// Port name for each DAW channel
    pub fn channel_names(&self) -> Vec<(ChannelId, String)> {
        vec![
            (ChannelId::Transport, self.transport.clone()),
            (ChannelId::Devices, self.devices.clone()),
            (ChannelId::Mixer, self.mixer.clone()),
        ]
    }
}

/// Startup layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDefaults {
    /// Note of the bottom-left pad
    pub root_note: u8,
    /// Key (0 = C)
    pub root_pitch_class: u8,
    pub scheme: LayoutScheme,
    /// Scale name from the built-in catalogue
    pub scale: String,
    pub in_key: bool,
    pub drum_profile: DrumProfile,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            root_note: DEFAULT_ROOT_NOTE,
            root_pitch_class: 0,
            scheme: LayoutScheme::default(),
            scale: scale::SCALES[0].name.to_string(),
            in_key: false,
            drum_profile: DrumProfile::default(),
        }
    }
}

/// LED values for the surface
///
/// These are hardware calibration values: pad entries are palette indices,
/// button entries are brightness levels that don't blink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedPalette {
    pub pad_root: u8,
    pub pad_in_scale: u8,
    pub pad_out_of_scale: u8,
    pub pad_playing: u8,
    pub drum_pad: u8,
    pub drum_playing: u8,
    pub button_on: u8,
    pub button_dim: u8,
    pub button_off: u8,
    /// Upper row buttons (color palette)
    pub upper_on: u8,
    pub upper_dim: u8,
    /// Lower row buttons (color palette)
    pub lower_on: u8,
    pub lower_dim: u8,
}

impl Default for LedPalette {
    fn default() -> Self {
        Self {
            pad_root: 45,
            pad_in_scale: 3,
            pad_out_of_scale: 1,
            pad_playing: 21,
            drum_pad: 13,
            drum_playing: 21,
            button_on: 4,
            button_dim: 1,
            button_off: 0,
            upper_on: 10,
            upper_dim: 7,
            lower_on: 10,
            lower_dim: 7,
        }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/gridlink/bridge.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("gridlink")
        .join("bridge.yaml")
}

/// Load bridge configuration from a YAML file
///
/// If the file doesn't exist, returns the default config.
/// If the file exists but is invalid, logs a warning and returns the default config.
pub fn load_bridge_config(path: &Path) -> BridgeConfig {
    log::info!("load_bridge_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_bridge_config: Config file doesn't exist, using defaults");
        return BridgeConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<BridgeConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_bridge_config: surface '{}', refresh every {} ms",
                    config.ports.surface_match,
                    config.refresh_interval_ms
                );
                config.sanitized()
            }
            Err(e) => {
                log::warn!("load_bridge_config: Failed to parse config: {}", e);
                BridgeConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_bridge_config: Failed to read config file: {}", e);
            BridgeConfig::default()
        }
    }
}

/// Normalize a port name by stripping hardware IDs
///
/// Port names vary across platforms and reconnects:
/// - "Ableton Push User Port [hw:3,0,1]" -> "Ableton Push User Port"
/// - "Ableton Push:Ableton Push User Port 24:1" -> "Ableton Push:Ableton Push User Port"
pub fn normalize_port_name(name: &str) -> String {
    let mut result = name.trim();

    if let Some(bracket_pos) = result.rfind('[') {
        result = result[..bracket_pos].trim();
    }

    // Trailing ALSA client:port pair
    if let Some(last_space) = result.rfind(' ') {
        let suffix = &result[last_space + 1..];
        if let Some((client, port)) = suffix.split_once(':') {
            if !client.is_empty()
                && !port.is_empty()
                && client.chars().all(|c| c.is_ascii_digit())
                && port.chars().all(|c| c.is_ascii_digit())
            {
                result = result[..last_space].trim();
            }
        }
    }

    result.to_string()
}

/// Check if a port name matches a configured pattern
///
/// Case-insensitive substring match; both sides are normalized.
pub fn port_matches(actual_port: &str, pattern: &str) -> bool {
    let pattern = normalize_port_name(pattern).to_lowercase();
    !pattern.is_empty() && normalize_port_name(actual_port).to_lowercase().contains(&pattern)
}
