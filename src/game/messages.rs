// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! JSON frames exchanged over `/game`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::GameData;
use crate::Result;

/// One entry of the game log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub card: Option<Value>,
    pub colour: String,
}

/// Server to client frames, tagged by `action`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outgoing {
    Hello {
        game_available: bool,
        taken_names: Option<Vec<String>>,
        taken_colours: Option<Vec<String>>,
    },
    Error {
        message: String,
    },
    Log(LogEntry),
    AllLogs {
        logs: Vec<LogEntry>,
    },
    Update {
        game_data: GameData,
        can_undo: bool,
        can_redo: bool,
    },
    ReconnectReply {
        name: String,
        colour: String,
    },
    Boot,
}

impl Outgoing {
    pub fn error(message: impl Into<String>) -> Self {
        Outgoing::Error { message: message.into() }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Client to server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    StartGame,
    Connect,
    Reconnect,
    Draw,
    ResolveEvent,
    ViewDiscard,
    ViewCodex,
    ViewArchive,
    AddCodex,
    FlipCodex,
    RemoveCodex,
    ViewAttachedCodex,
    AddCounterCodex,
    RemoveCounterCodex,
    DrawTerror,
    AddDeck,
    SpreadClue,
    SpreadDoom,
    SpreadTerror,
    PlaceTerror,
    GateBurst,
    Headline,
    ViewRumor,
    RemoveRumor,
    AddCounterRumor,
    RemoveCounterRumor,
    Undo,
    Redo,
}

/// Why an inbound frame was rejected before dispatch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    #[error("Invalid Json received")]
    InvalidJson,

    #[error("Invalid Command received")]
    InvalidCommand,
}

/// Split a frame into its action and the full body
pub fn parse_inbound(text: &str) -> std::result::Result<(Command, Value), InboundError> {
    let body: Value = serde_json::from_str(text).map_err(|_| InboundError::InvalidJson)?;
    let action = body
        .get("action")
        .cloned()
        .ok_or(InboundError::InvalidCommand)?;
    let command = serde_json::from_value(action).map_err(|_| InboundError::InvalidCommand)?;
    Ok((command, body))
}

/// The app sends the expansion flag as a number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpansionFlags {
    Number(i64),
    Text(String),
}

impl ExpansionFlags {
    pub fn value(&self) -> Option<i64> {
        match self {
            ExpansionFlags::Number(n) => Some(*n),
            ExpansionFlags::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartGame {
    pub scenario: String,
    pub expansions: ExpansionFlags,
    pub player_name: String,
    pub player_colour: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Join {
    pub player_name: String,
    pub player_colour: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_action() {
        let (command, body) = parse_inbound(r#"{"action":"view_rumor"}"#).unwrap();
        assert_eq!(command, Command::ViewRumor);
        assert_eq!(body["action"], "view_rumor");
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(parse_inbound("{oops"), Err(InboundError::InvalidJson));
        assert_eq!(parse_inbound(r#"{"deck":"Uptown"}"#), Err(InboundError::InvalidCommand));
        assert_eq!(parse_inbound(r#"{"action":"shuffle"}"#), Err(InboundError::InvalidCommand));
        assert_eq!(parse_inbound(r#"{"action":3}"#), Err(InboundError::InvalidCommand));
        assert_eq!(InboundError::InvalidJson.to_string(), "Invalid Json received");
    }

    #[test]
    fn test_hello_without_game_has_null_lists() {
        let hello = Outgoing::Hello {
            game_available: false,
            taken_names: None,
            taken_colours: None,
        };
        let value: Value = serde_json::from_str(&hello.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"action": "hello", "game_available": false, "taken_names": null, "taken_colours": null})
        );
    }

    #[test]
    fn test_tagged_frames() {
        let boot: Value = serde_json::from_str(&Outgoing::Boot.encode().unwrap()).unwrap();
        assert_eq!(boot, json!({"action": "boot"}));

        let log = Outgoing::Log(LogEntry {
            message: "Ann has joined!".to_string(),
            card: None,
            colour: "red".to_string(),
        });
        let value: Value = serde_json::from_str(&log.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"action": "log", "message": "Ann has joined!", "card": null, "colour": "red"})
        );

        let reply: Value =
            serde_json::from_str(&Outgoing::error("Command not implemented!").encode().unwrap()).unwrap();
        assert_eq!(reply["action"], "error");
    }

    #[test]
    fn test_expansion_flags_accept_strings() {
        let start: StartGame = serde_json::from_value(json!({
            "scenario": "Veil of Twilight",
            "expansions": "5",
            "player_name": "Ann",
            "player_colour": "red"
        }))
        .unwrap();
        assert_eq!(start.expansions.value(), Some(5));
        assert_eq!(ExpansionFlags::Text("many".into()).value(), None);
    }
}
