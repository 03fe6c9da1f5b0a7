// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shared game session played over the `/game` WebSocket

pub mod messages;
pub mod scenarios;
pub mod session;
pub mod settings;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use messages::{parse_inbound, Command, InboundError, LogEntry, Outgoing};
pub use scenarios::{Neighbourhood, Terror};
pub use session::{ClientId, SessionHub};
pub use settings::{expansion_text, Expansion, GameSettings, Scenario};

/// A running game
#[derive(Debug, Clone)]
pub struct Game {
    pub settings: GameSettings,
    pub started_at: DateTime<Utc>,
}

/// Board summary sent in `update` frames
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameData {
    pub scenario: String,
    pub expansions: u8,
    pub expansion_text: String,
    pub neighbourhoods: Vec<Neighbourhood>,
    pub later_neighbourhoods: Vec<Neighbourhood>,
    pub terror: Option<Terror>,
    pub terror_neighbourhood: Option<Neighbourhood>,
    pub players: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl Game {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            settings,
            started_at: Utc::now(),
        }
    }

    pub fn data(&self, players: Vec<String>) -> GameData {
        let scenario = self.settings.scenario;
        let terror = scenarios::terror(scenario);
        GameData {
            scenario: scenario.name().to_string(),
            expansions: self.settings.expansions,
            expansion_text: self.settings.expansion_text(),
            neighbourhoods: scenarios::starting_neighbourhoods(scenario).to_vec(),
            later_neighbourhoods: scenarios::later_neighbourhoods(scenario).to_vec(),
            terror: terror.map(|(deck, _)| deck),
            terror_neighbourhood: terror.map(|(_, home)| home),
            players,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_data_for_dreams_of_rlyeh() {
        let game = Game::new(GameSettings::new(Scenario::DreamsOfRlyeh, 2).unwrap());
        let data = game.data(vec!["Ann".to_string()]);
        assert_eq!(data.scenario, "Dreams of R'lyeh");
        assert_eq!(data.expansion_text, "Base Game, Under Dark Waves");
        assert_eq!(data.neighbourhoods.len(), 6);
        assert_eq!(data.later_neighbourhoods.len(), 4);
        assert!(data.terror.is_none());
        assert_eq!(data.players, vec!["Ann"]);
    }

    #[test]
    fn test_game_data_carries_terror() {
        let game = Game::new(GameSettings::new(Scenario::IthaquasChildren, 2).unwrap());
        let value = serde_json::to_value(game.data(Vec::new())).unwrap();
        assert_eq!(value["terror"], "Frozen City");
        assert_eq!(value["terror_neighbourhood"], "Easttown");
    }
}
