// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scenario and expansion selection for a new game

use std::fmt;
use std::str::FromStr;

use crate::{CompanionError, Result};

/// A playable scenario, by its printed name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    ApproachOfAzathoth,
    FeastForUmordhoth,
    VeilOfTwilight,
    EchoesOfTheDeep,
    ShotsInTheDark,
    SilenceOfTsathoggua,
    DreamsOfRlyeh,
    ThePaleLantern,
    TyrantsOfRuin,
    IthaquasChildren,
    TheDeadCryOut,
    TheKeyAndTheGate,
    BoundToServe,
}

impl Scenario {
    pub const ALL: [Scenario; 13] = [
        Scenario::ApproachOfAzathoth,
        Scenario::FeastForUmordhoth,
        Scenario::VeilOfTwilight,
        Scenario::EchoesOfTheDeep,
        Scenario::ShotsInTheDark,
        Scenario::SilenceOfTsathoggua,
        Scenario::DreamsOfRlyeh,
        Scenario::ThePaleLantern,
        Scenario::TyrantsOfRuin,
        Scenario::IthaquasChildren,
        Scenario::TheDeadCryOut,
        Scenario::TheKeyAndTheGate,
        Scenario::BoundToServe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::ApproachOfAzathoth => "Approach of Azathoth",
            Scenario::FeastForUmordhoth => "Feast for Umordhoth",
            Scenario::VeilOfTwilight => "Veil of Twilight",
            Scenario::EchoesOfTheDeep => "Echoes of the Deep",
            Scenario::ShotsInTheDark => "Shots in the Dark",
            Scenario::SilenceOfTsathoggua => "Silence of Tsathoggua",
            Scenario::DreamsOfRlyeh => "Dreams of R'lyeh",
            Scenario::ThePaleLantern => "The Pale Lantern",
            Scenario::TyrantsOfRuin => "Tyrants of Ruin",
            Scenario::IthaquasChildren => "Ithaqua's Children",
            Scenario::TheDeadCryOut => "The Dead Cry Out",
            Scenario::TheKeyAndTheGate => "The Key and the Gate",
            Scenario::BoundToServe => "Bound to Serve",
        }
    }

    /// Expansion whose box the scenario ships in; `None` for the base game
    pub fn required_expansion(self) -> Option<Expansion> {
        match self {
            Scenario::ShotsInTheDark | Scenario::SilenceOfTsathoggua => Some(Expansion::DeadOfNight),
            Scenario::DreamsOfRlyeh
            | Scenario::ThePaleLantern
            | Scenario::TyrantsOfRuin
            | Scenario::IthaquasChildren => Some(Expansion::UnderDarkWaves),
            Scenario::TheDeadCryOut | Scenario::TheKeyAndTheGate | Scenario::BoundToServe => {
                Some(Expansion::SecretsOfTheOrder)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| CompanionError::InvalidSettings(format!("Unknown scenario: {}", s)))
    }
}

/// Expansion boxes, each one bit of the `expansions` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expansion {
    DeadOfNight = 1,
    UnderDarkWaves = 2,
    SecretsOfTheOrder = 4,
}

impl Expansion {
    pub const ALL: [Expansion; 3] = [
        Expansion::DeadOfNight,
        Expansion::UnderDarkWaves,
        Expansion::SecretsOfTheOrder,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Expansion::DeadOfNight => "Dead of Night",
            Expansion::UnderDarkWaves => "Under Dark Waves",
            Expansion::SecretsOfTheOrder => "Secrets of the Order",
        }
    }
}

/// Every expansion bit set
pub const ALL_EXPANSIONS: u8 = 0b111;

/// Human-readable list of the enabled boxes, base game first
pub fn expansion_text(expansions: u8) -> String {
    let mut names = vec!["Base Game"];
    names.extend(
        Expansion::ALL
            .into_iter()
            .filter(|e| expansions & e.bit() != 0)
            .map(Expansion::name),
    );
    names.join(", ")
}

/// Validated settings a game is started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub scenario: Scenario,
    pub expansions: u8,
}

impl GameSettings {
    /// Check the expansion flag range and that the scenario's box is enabled
    pub fn new(scenario: Scenario, expansions: i64) -> Result<Self> {
        let expansions = u8::try_from(expansions)
            .ok()
            .filter(|e| *e <= ALL_EXPANSIONS)
            .ok_or_else(|| {
                CompanionError::InvalidSettings(format!("Expansion flags out of range: {}", expansions))
            })?;

        if let Some(required) = scenario.required_expansion() {
            if expansions & required.bit() == 0 {
                return Err(CompanionError::InvalidSettings(format!(
                    "{} needs {}",
                    scenario,
                    required.name()
                )));
            }
        }

        Ok(Self { scenario, expansions })
    }

    pub fn has(&self, expansion: Expansion) -> bool {
        self.expansions & expansion.bit() != 0
    }

    pub fn expansion_text(&self) -> String {
        expansion_text(self.expansions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("Approach of Azathoth ".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_expansion_text() {
        assert_eq!(expansion_text(0), "Base Game");
        assert_eq!(expansion_text(2), "Base Game, Under Dark Waves");
        assert_eq!(
            expansion_text(7),
            "Base Game, Dead of Night, Under Dark Waves, Secrets of the Order"
        );
    }

    #[test]
    fn test_base_scenarios_need_no_expansion() {
        let settings = GameSettings::new(Scenario::VeilOfTwilight, 0).unwrap();
        assert!(!settings.has(Expansion::DeadOfNight));
    }

    #[test]
    fn test_expansion_scenario_needs_its_box() {
        assert!(GameSettings::new(Scenario::ThePaleLantern, 1).is_err());
        let settings = GameSettings::new(Scenario::ThePaleLantern, 3).unwrap();
        assert!(settings.has(Expansion::UnderDarkWaves));
        assert_eq!(settings.expansion_text(), "Base Game, Dead of Night, Under Dark Waves");
    }

    #[test]
    fn test_out_of_range_flags_rejected() {
        assert!(GameSettings::new(Scenario::ApproachOfAzathoth, 8).is_err());
        assert!(GameSettings::new(Scenario::ApproachOfAzathoth, -1).is_err());
    }
}
