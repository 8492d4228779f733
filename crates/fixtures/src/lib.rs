use serde::{Deserialize, Serialize};

pub use definition_file::{parse_definition, parse_definition_file};
pub use error::DefinitionParseError;
pub use fixture_library::{load_definitions, FixtureLibrary, LoadReport};
pub use physics::{AxisHint, HomePosition, MotorType, Orientation, PhysicsProfile, TiltLimits};
pub use wheel::{ColorWheelMap, Rgb, WheelColor};

mod definition_file;
mod error;
mod fixture_library;
mod physics;
mod wheel;

/// Highest addressable slot in a DMX512 universe.
pub const DMX_UNIVERSE_SIZE: usize = 512;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixtureType {
    MovingHead,
    Par,
    Wash,
    Bar,
    Strobe,
    Scanner,
    Laser,
    Blinder,
    #[default]
    Generic,
}

impl FixtureType {
    /// Parses a fixture class token. Returns `None` for tokens that do not name
    /// a class so the caller can fall back to deduction.
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = normalize_token(token);
        let fixture_type = match normalized.as_str() {
            "moving_head" | "movinghead" | "moving_head_spot" | "moving_head_wash"
            | "moving_head_beam" | "spot" | "beam" => FixtureType::MovingHead,
            "par" => FixtureType::Par,
            "wash" => FixtureType::Wash,
            "bar" | "led_bar" | "ledbar" => FixtureType::Bar,
            "strobe" => FixtureType::Strobe,
            "scanner" => FixtureType::Scanner,
            "laser" => FixtureType::Laser,
            "blinder" => FixtureType::Blinder,
            "generic" => FixtureType::Generic,
            _ => return None,
        };
        Some(fixture_type)
    }

    /// Guesses the fixture class from its model name first, then from what its
    /// channels can do.
    pub fn deduce(name: &str, capabilities: &Capabilities) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("strobe") {
            return FixtureType::Strobe;
        }
        if lower.contains("par") {
            return FixtureType::Par;
        }
        if lower.contains("wash") {
            return FixtureType::Wash;
        }
        if lower.contains("beam") || lower.contains("spot") {
            return FixtureType::MovingHead;
        }

        if capabilities.has_pan_tilt {
            FixtureType::MovingHead
        } else if capabilities.has_color_mixing {
            FixtureType::Par
        } else if capabilities.has_strobe {
            FixtureType::Strobe
        } else {
            FixtureType::Generic
        }
    }
}

impl std::fmt::Display for FixtureType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FixtureType::MovingHead => write!(f, "Moving Head"),
            FixtureType::Par => write!(f, "PAR"),
            FixtureType::Wash => write!(f, "Wash"),
            FixtureType::Bar => write!(f, "Bar"),
            FixtureType::Strobe => write!(f, "Strobe"),
            FixtureType::Scanner => write!(f, "Scanner"),
            FixtureType::Laser => write!(f, "Laser"),
            FixtureType::Blinder => write!(f, "Blinder"),
            FixtureType::Generic => write!(f, "Generic"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Dimmer,
    Strobe,
    Shutter,
    Red,
    Green,
    Blue,
    White,
    Amber,
    #[serde(rename = "uv")]
    UV,
    Pan,
    PanFine,
    Tilt,
    TiltFine,
    ColorWheel,
    Gobo,
    GoboRotation,
    Prism,
    PrismRotation,
    Focus,
    Zoom,
    Iris,
    Frost,
    Speed,
    Macro,
    Control,
    Unknown,
}

impl ChannelType {
    /// Value a channel of this type holds when nothing drives it. Shutters
    /// rest open.
    pub fn resting_value(self) -> u8 {
        match self {
            ChannelType::Shutter => 255,
            _ => 0,
        }
    }

    /// Maps a definition-file token onto a channel type. Tokens that name no
    /// known role come back as `Unknown` so partially mapped hardware still loads.
    pub fn from_token(token: &str) -> Self {
        match normalize_token(token).as_str() {
            "dimmer" | "intensity" => ChannelType::Dimmer,
            "strobe" => ChannelType::Strobe,
            "shutter" => ChannelType::Shutter,
            "red" => ChannelType::Red,
            "green" => ChannelType::Green,
            "blue" => ChannelType::Blue,
            "white" | "ww" | "cw" => ChannelType::White,
            "amber" => ChannelType::Amber,
            "uv" => ChannelType::UV,
            "pan" => ChannelType::Pan,
            "pan_fine" => ChannelType::PanFine,
            "tilt" => ChannelType::Tilt,
            "tilt_fine" => ChannelType::TiltFine,
            "color_wheel" | "colour_wheel" | "color" => ChannelType::ColorWheel,
            "gobo" | "gobo_wheel" => ChannelType::Gobo,
            "gobo_rotation" | "gobo_rot" => ChannelType::GoboRotation,
            "prism" => ChannelType::Prism,
            "prism_rotation" | "prism_rot" => ChannelType::PrismRotation,
            "focus" => ChannelType::Focus,
            "zoom" => ChannelType::Zoom,
            "iris" => ChannelType::Iris,
            "frost" => ChannelType::Frost,
            "speed" | "pan_tilt_speed" => ChannelType::Speed,
            "macro" | "color_macro" => ChannelType::Macro,
            "control" | "reset" | "lamp" => ChannelType::Control,
            _ => ChannelType::Unknown,
        }
    }

    /// The coarse channel a fine channel extends, if this is a fine channel.
    pub fn coarse_counterpart(self) -> Option<ChannelType> {
        match self {
            ChannelType::PanFine => Some(ChannelType::Pan),
            ChannelType::TiltFine => Some(ChannelType::Tilt),
            _ => None,
        }
    }

    pub fn is_fine(self) -> bool {
        self.coarse_counterpart().is_some()
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChannelType::Dimmer => write!(f, "Dimmer"),
            ChannelType::Strobe => write!(f, "Strobe"),
            ChannelType::Shutter => write!(f, "Shutter"),
            ChannelType::Red => write!(f, "Red"),
            ChannelType::Green => write!(f, "Green"),
            ChannelType::Blue => write!(f, "Blue"),
            ChannelType::White => write!(f, "White"),
            ChannelType::Amber => write!(f, "Amber"),
            ChannelType::UV => write!(f, "UV"),
            ChannelType::Pan => write!(f, "Pan"),
            ChannelType::PanFine => write!(f, "PanFine"),
            ChannelType::Tilt => write!(f, "Tilt"),
            ChannelType::TiltFine => write!(f, "TiltFine"),
            ChannelType::ColorWheel => write!(f, "ColorWheel"),
            ChannelType::Gobo => write!(f, "Gobo"),
            ChannelType::GoboRotation => write!(f, "GoboRotation"),
            ChannelType::Prism => write!(f, "Prism"),
            ChannelType::PrismRotation => write!(f, "PrismRotation"),
            ChannelType::Focus => write!(f, "Focus"),
            ChannelType::Zoom => write!(f, "Zoom"),
            ChannelType::Iris => write!(f, "Iris"),
            ChannelType::Frost => write!(f, "Frost"),
            ChannelType::Speed => write!(f, "Speed"),
            ChannelType::Macro => write!(f, "Macro"),
            ChannelType::Control => write!(f, "Control"),
            ChannelType::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub index: usize,
    pub name: String,
    pub channel_type: ChannelType,
    pub default_value: u8,
    pub is_16bit: bool,
}

impl Channel {
    pub fn new(index: usize, name: &str, channel_type: ChannelType) -> Self {
        Channel {
            index,
            name: name.to_string(),
            channel_type,
            default_value: channel_type.resting_value(),
            is_16bit: false,
        }
    }

    pub fn with_default(mut self, default_value: u8) -> Self {
        self.default_value = default_value;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMixing {
    #[default]
    None,
    Rgb,
    Rgbw,
    Wheel,
    /// RGB mixing plus a mechanical wheel.
    Hybrid,
}

/// What a fixture can do, read off its channel layout.
///
/// There is no way to build one other than [`Capabilities::derive`], so the
/// flags always agree with the channels they were computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub has_pan_tilt: bool,
    pub has_color_mixing: bool,
    pub color_mixing: ColorMixing,
    pub has_color_wheel: bool,
    pub has_gobos: bool,
    pub has_gobo_rotation: bool,
    pub has_prism: bool,
    pub has_zoom: bool,
    pub has_focus: bool,
    pub has_frost: bool,
    pub has_iris: bool,
    pub has_shutter: bool,
    pub has_dimmer: bool,
    pub has_strobe: bool,
    pub is_16bit: bool,
    #[serde(skip)]
    _sealed: (),
}

impl Capabilities {
    pub fn derive(channels: &[Channel]) -> Self {
        let has = |channel_type: ChannelType| channels.iter().any(|c| c.channel_type == channel_type);

        let has_rgb = has(ChannelType::Red) && has(ChannelType::Green) && has(ChannelType::Blue);
        let has_color_wheel = has(ChannelType::ColorWheel);
        let color_mixing = match (has_rgb, has_color_wheel) {
            (true, true) => ColorMixing::Hybrid,
            (true, false) if has(ChannelType::White) => ColorMixing::Rgbw,
            (true, false) => ColorMixing::Rgb,
            (false, true) => ColorMixing::Wheel,
            (false, false) => ColorMixing::None,
        };

        Capabilities {
            has_pan_tilt: has(ChannelType::Pan) && has(ChannelType::Tilt),
            has_color_mixing: has_rgb,
            color_mixing,
            has_color_wheel,
            has_gobos: has(ChannelType::Gobo),
            has_gobo_rotation: has(ChannelType::GoboRotation),
            has_prism: has(ChannelType::Prism),
            has_zoom: has(ChannelType::Zoom),
            has_focus: has(ChannelType::Focus),
            has_frost: has(ChannelType::Frost),
            has_iris: has(ChannelType::Iris),
            has_shutter: has(ChannelType::Shutter),
            has_dimmer: has(ChannelType::Dimmer) || has(ChannelType::Shutter),
            has_strobe: has(ChannelType::Strobe) || has(ChannelType::Shutter),
            is_16bit: channels.iter().any(|c| c.is_16bit),
            _sealed: (),
        }
    }
}

/// An immutable fixture model. Instances share it behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct FixtureDefinition {
    id: String,
    name: String,
    manufacturer: String,
    fixture_type: FixtureType,
    channels: Vec<Channel>,
    capabilities: Capabilities,
    physics: PhysicsProfile,
    wheel: Option<ColorWheelMap>,
}

impl FixtureDefinition {
    /// Validates the channel layout, physics and wheel, then derives the
    /// capability flags. Channels are taken in index order.
    pub fn new(
        id: &str,
        name: &str,
        manufacturer: &str,
        fixture_type: Option<FixtureType>,
        mut channels: Vec<Channel>,
        physics: PhysicsProfile,
        wheel: Option<ColorWheelMap>,
    ) -> Result<Self, DefinitionParseError> {
        if name.trim().is_empty() {
            return Err(DefinitionParseError::MissingName);
        }
        if channels.is_empty() {
            return Err(DefinitionParseError::NoChannels);
        }

        channels.sort_by_key(|c| c.index);
        for pair in channels.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(DefinitionParseError::DuplicateChannelIndex {
                    index: pair[0].index,
                });
            }
        }
        for (expected, channel) in channels.iter().enumerate() {
            if channel.index != expected {
                return Err(DefinitionParseError::NonContiguousChannels {
                    expected,
                    found: channel.index,
                });
            }
        }

        normalize_fine_channels(&mut channels)?;
        physics.validate()?;
        if let Some(wheel) = &wheel {
            wheel.validate()?;
        }

        let capabilities = Capabilities::derive(&channels);
        let fixture_type =
            fixture_type.unwrap_or_else(|| FixtureType::deduce(name, &capabilities));
        let id = if id.trim().is_empty() {
            generate_id(manufacturer, name)
        } else {
            id.to_string()
        };

        Ok(FixtureDefinition {
            id,
            name: name.to_string(),
            manufacturer: manufacturer.to_string(),
            fixture_type,
            channels,
            capabilities,
            physics,
            wheel,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn fixture_type(&self) -> FixtureType {
        self.fixture_type
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn physics(&self) -> &PhysicsProfile {
        &self.physics
    }

    pub fn wheel(&self) -> Option<&ColorWheelMap> {
        self.wheel.as_ref()
    }
}

impl std::fmt::Display for FixtureDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.name)
    }
}

/// A fine channel is only 16-bit when its coarse channel sits directly before
/// it. Fine channels placed that way get the flag even if the file left it out;
/// a flag anywhere else is rejected.
fn normalize_fine_channels(channels: &mut [Channel]) -> Result<(), DefinitionParseError> {
    for i in 0..channels.len() {
        let follows_coarse = match channels[i].channel_type.coarse_counterpart() {
            Some(coarse) => i > 0 && channels[i - 1].channel_type == coarse,
            None => false,
        };

        if channels[i].is_16bit && !follows_coarse {
            return Err(DefinitionParseError::MisplacedFineChannel {
                index: channels[i].index,
                name: channels[i].name.clone(),
            });
        }
        channels[i].is_16bit = follows_coarse;
    }
    Ok(())
}

fn generate_id(manufacturer: &str, name: &str) -> String {
    let clean = |s: &str| {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect::<String>()
    };
    format!("{}_{}", clean(manufacturer), clean(name))
}

fn normalize_token(token: &str) -> String {
    token
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Builds an index-ordered channel list. An optional third element sets the
/// channel's default value.
#[macro_export]
macro_rules! channel_layout {
    ($(($name:expr, $type:expr $(, $default:expr)?)),* $(,)?) => {{
        let mut channels: Vec<$crate::Channel> = Vec::new();
        $(
            let index = channels.len();
            channels.push($crate::Channel::new(index, $name, $type)$(.with_default($default))?);
        )*
        channels
    }};
}
