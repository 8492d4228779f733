use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    channel_layout, parse_definition_file, ChannelType, ColorWheelMap, DefinitionParseError,
    FixtureDefinition, FixtureType, MotorType, PhysicsProfile, Rgb, WheelColor,
};

/// Outcome of loading a definitions directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(PathBuf, DefinitionParseError)>,
    pub duplicates: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.duplicates.is_empty()
    }
}

/// Read-only catalog of fixture models, keyed by definition id.
#[derive(Clone, Debug, Default)]
pub struct FixtureLibrary {
    definitions: HashMap<String, Arc<FixtureDefinition>>,
}

impl FixtureLibrary {
    pub fn new() -> Self {
        FixtureLibrary::default()
    }

    /// The house rig shipped with the engine.
    pub fn builtin() -> Self {
        let mut library = FixtureLibrary::new();
        for definition in builtin_definitions() {
            match definition {
                Ok(definition) => {
                    library.insert(definition);
                }
                Err(e) => log::error!("Built-in fixture definition rejected: {}", e),
            }
        }
        library
    }

    /// Parses every `*.json` file in `dir`. Malformed files are skipped and
    /// reported; the first file to claim an id keeps it.
    pub fn load_dir(&mut self, dir: &Path) -> io::Result<LoadReport> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_json = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if path.is_file() && is_json {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = LoadReport::default();
        for path in paths {
            match parse_definition_file(&path) {
                Ok(definition) => {
                    let id = definition.id().to_string();
                    if self.definitions.contains_key(&id) {
                        log::warn!(
                            "Skipping {}: definition id '{}' already loaded",
                            path.display(),
                            id
                        );
                        report.duplicates.push((path, id));
                    } else {
                        self.insert(definition);
                        report.loaded.push(id);
                    }
                }
                Err(e) => {
                    log::warn!("Skipping fixture definition {}: {}", path.display(), e);
                    report.skipped.push((path, e));
                }
            }
        }

        log::info!(
            "Loaded {} fixture definitions from {} ({} skipped)",
            report.loaded.len(),
            dir.display(),
            report.skipped.len() + report.duplicates.len()
        );
        Ok(report)
    }

    pub fn insert(&mut self, definition: FixtureDefinition) -> Option<Arc<FixtureDefinition>> {
        self.definitions
            .insert(definition.id().to_string(), Arc::new(definition))
    }

    /// Adds every definition from `other` whose id is not already present.
    pub fn merge_missing(&mut self, other: FixtureLibrary) -> usize {
        let mut added = 0;
        for (id, definition) in other.definitions {
            if let std::collections::hash_map::Entry::Vacant(slot) = self.definitions.entry(id) {
                slot.insert(definition);
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, id: &str) -> Option<Arc<FixtureDefinition>> {
        self.definitions.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FixtureDefinition>> {
        self.definitions.values()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn by_type(&self, fixture_type: FixtureType) -> Vec<Arc<FixtureDefinition>> {
        self.definitions
            .values()
            .filter(|d| d.fixture_type() == fixture_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Loads a definitions directory into a fresh map keyed by id.
pub fn load_definitions(
    dir: &Path,
) -> io::Result<(HashMap<String, Arc<FixtureDefinition>>, LoadReport)> {
    let mut library = FixtureLibrary::new();
    let report = library.load_dir(dir)?;
    Ok((library.definitions, report))
}

fn beam_wheel() -> ColorWheelMap {
    ColorWheelMap::new(vec![
        WheelColor::new(0, "Open", Rgb::WHITE),
        WheelColor::new(15, "Red", Rgb::RED),
        WheelColor::new(30, "Orange", Rgb::ORANGE),
        WheelColor::new(45, "Yellow", Rgb::YELLOW),
        WheelColor::new(60, "Green", Rgb::GREEN),
        WheelColor::new(75, "Cyan", Rgb::CYAN),
        WheelColor::new(90, "Blue", Rgb::BLUE),
        WheelColor::new(105, "Magenta", Rgb::MAGENTA),
        WheelColor::new(120, "Light Blue", Rgb::new(128, 128, 255)),
        WheelColor::new(135, "Pink", Rgb::new(255, 128, 255)),
        WheelColor::new(150, "UV Purple", Rgb::PURPLE),
        WheelColor::new(165, "CTO", Rgb::new(255, 200, 150)),
    ])
    .with_spin(190)
}

fn spot_wheel() -> ColorWheelMap {
    ColorWheelMap::new(vec![
        WheelColor::new(0, "White", Rgb::WHITE),
        WheelColor::new(10, "Red", Rgb::RED),
        WheelColor::new(20, "Green", Rgb::GREEN),
        WheelColor::new(30, "Blue", Rgb::BLUE),
        WheelColor::new(40, "Yellow", Rgb::YELLOW),
        WheelColor::new(50, "Orange", Rgb::ORANGE),
        WheelColor::new(60, "Cyan", Rgb::CYAN),
        WheelColor::new(70, "Pink", Rgb::PINK),
    ])
    .with_spin(128)
}

fn builtin_definitions() -> Vec<Result<FixtureDefinition, DefinitionParseError>> {
    vec![
        FixtureDefinition::new(
            "shehds-rgbw-par",
            "LED Flat PAR 12x3W RGBW",
            "Shehds",
            Some(FixtureType::Par),
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Strobe", ChannelType::Strobe),
                ("Program", ChannelType::Macro),
                ("Function", ChannelType::Control),
            ],
            PhysicsProfile::default(),
            None,
        ),
        FixtureDefinition::new(
            "led-par-rgb",
            "LED PAR RGB",
            "Generic",
            Some(FixtureType::Par),
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("Strobe", ChannelType::Strobe),
                ("Macro", ChannelType::Macro),
            ],
            PhysicsProfile::default(),
            None,
        ),
        FixtureDefinition::new(
            "shehds-led-spot-60w",
            "LED Spot 60W Lighting",
            "Shehds",
            Some(FixtureType::MovingHead),
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Tilt", ChannelType::Tilt),
                ("Color", ChannelType::ColorWheel),
                ("Gobo", ChannelType::Gobo),
                ("Strobe", ChannelType::Strobe),
                ("Dimmer", ChannelType::Dimmer),
                ("Speed", ChannelType::Speed),
                ("Auto", ChannelType::Macro),
                ("Reset", ChannelType::Control),
            ],
            MotorType::StepperCheap.default_profile(),
            Some(spot_wheel()),
        ),
        FixtureDefinition::new(
            "shehds-led-wash-7x18w-rgbwa-uv",
            "LED Wash 7x18W RGBWA+UV",
            "Shehds",
            Some(FixtureType::Wash),
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Tilt", ChannelType::Tilt),
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Amber", ChannelType::Amber),
                ("UV", ChannelType::UV),
                ("Function", ChannelType::Control),
            ],
            MotorType::StepperQuality.default_profile(),
            None,
        ),
        FixtureDefinition::new(
            "shehds-mini-led-pinspot-10w",
            "Mini LED Pinspot 10W",
            "Shehds",
            Some(FixtureType::Par),
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Strobe", ChannelType::Strobe),
                ("Function", ChannelType::Macro),
                ("Speed", ChannelType::Speed),
            ],
            PhysicsProfile::default(),
            None,
        ),
        FixtureDefinition::new(
            "beam-2r",
            "Beam 2R",
            "Generic",
            Some(FixtureType::MovingHead),
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Pan Fine", ChannelType::PanFine),
                ("Tilt", ChannelType::Tilt),
                ("Tilt Fine", ChannelType::TiltFine),
                ("Color Wheel", ChannelType::ColorWheel),
                ("Gobo", ChannelType::Gobo),
                ("Prism", ChannelType::Prism),
                ("Strobe", ChannelType::Strobe),
                ("Dimmer", ChannelType::Dimmer, 255),
                ("Speed", ChannelType::Speed, 128),
                ("Control", ChannelType::Control),
            ],
            MotorType::StepperQuality.default_profile(),
            Some(beam_wheel()),
        ),
        FixtureDefinition::new(
            "led-wash-16bit",
            "LED Moving Wash",
            "Generic",
            Some(FixtureType::Wash),
            channel_layout![
                ("Pan", ChannelType::Pan),
                ("Pan Fine", ChannelType::PanFine),
                ("Tilt", ChannelType::Tilt),
                ("Tilt Fine", ChannelType::TiltFine),
                ("Speed", ChannelType::Speed),
                ("Dimmer", ChannelType::Dimmer),
                ("Strobe", ChannelType::Strobe),
                ("Red", ChannelType::Red),
                ("Green", ChannelType::Green),
                ("Blue", ChannelType::Blue),
                ("White", ChannelType::White),
                ("Zoom", ChannelType::Zoom, 128),
            ],
            MotorType::StepperQuality.default_profile(),
            None,
        ),
        FixtureDefinition::new(
            "generic-strobe",
            "DMX Strobe",
            "Generic",
            Some(FixtureType::Strobe),
            channel_layout![
                ("Dimmer", ChannelType::Dimmer),
                ("Strobe", ChannelType::Strobe),
            ],
            PhysicsProfile::default(),
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_catalog() {
        let library = FixtureLibrary::builtin();
        assert_eq!(library.len(), 8);

        let beam = library.get("beam-2r").unwrap();
        assert_eq!(beam.channel_count(), 11);
        assert!(beam.capabilities().is_16bit);
        assert_eq!(beam.wheel().unwrap().colors.len(), 12);
        assert_eq!(beam.channels()[8].default_value, 255);

        let par = library.get("shehds-rgbw-par").unwrap();
        assert!(par.capabilities().has_color_mixing);
        assert!(!par.capabilities().has_pan_tilt);
        assert_eq!(library.by_type(FixtureType::Strobe).len(), 1);
    }

    #[test]
    fn test_load_dir_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a_par.json"),
            r#"{ "id": "my-par", "name": "My Par", "channels": [
                { "type": "dimmer" }, { "type": "red" }, { "type": "green" }, { "type": "blue" } ] }"#,
        )
        .unwrap();
        fs::write(dir.path().join("b_broken.json"), "{ \"name\": ").unwrap();
        fs::write(
            dir.path().join("c_dupe.json"),
            r#"{ "id": "my-par", "name": "Other", "channels": [ { "type": "dimmer" } ] }"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a fixture").unwrap();

        let mut library = FixtureLibrary::new();
        let report = library.load_dir(dir.path()).unwrap();

        assert_eq!(report.loaded, vec!["my-par".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(library.get("my-par").unwrap().name(), "My Par");
    }

    #[test]
    fn test_directory_definitions_win_over_builtins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("strobe.json"),
            r#"{ "id": "generic-strobe", "name": "House Strobe",
                 "channels": [ { "type": "shutter" } ] }"#,
        )
        .unwrap();

        let mut library = FixtureLibrary::new();
        library.load_dir(dir.path()).unwrap();
        let added = library.merge_missing(FixtureLibrary::builtin());

        assert_eq!(added, 7);
        assert_eq!(library.get("generic-strobe").unwrap().name(), "House Strobe");
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_definitions(&missing).is_err());
    }
}
