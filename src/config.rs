// config.rs — Mod options surface: the two steering toggles.
//
// The loader owns the options page and hands the raw TOML text over;
// nothing here touches the filesystem. Defaults are all-off so a missing
// or unparsable options page behaves exactly like the unpatched game.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringOptions {
    /// Steer with the right hand while free-swimming underwater.
    pub steer_underwater: bool,
    /// Steer with the right hand while riding the glide vehicle.
    pub steer_glide: bool,
}

impl SteeringOptions {
    /// True when at least one steering toggle is on.
    pub fn any_enabled(&self) -> bool {
        self.steer_underwater || self.steer_glide
    }

    /// Parse an options page. Missing keys fall back to off.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
