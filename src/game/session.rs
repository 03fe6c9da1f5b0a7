// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Connected clients, players and the single shared game

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::messages::{parse_inbound, Command, Join, LogEntry, Outgoing, StartGame};
use super::settings::{GameSettings, Scenario};
use super::Game;

/// Identifies one WebSocket connection
pub type ClientId = Uuid;

const BAD_SETTINGS: &str = "Bad scenario or expansion values.";
const NO_GAME: &str = "The game has not been started yet.";
const NAME_TAKEN: &str = "That name has already been chosen.";
const COLOUR_TAKEN: &str = "That color has already been chosen.";
const CANNOT_RECONNECT: &str = "Can't Reconnect. Please use the join button.";
const BAD_CONNECT: &str = "Bad connection message";
const NOT_IMPLEMENTED: &str = "Command not implemented!";

#[derive(Debug, Clone)]
struct Player {
    client: ClientId,
    name: String,
    colour: String,
}

#[derive(Default)]
struct Session {
    clients: HashMap<ClientId, UnboundedSender<String>>,
    players: Vec<Player>,
    game: Option<Game>,
    /// Newest first
    logs: Vec<LogEntry>,
}

fn frame(message: &Outgoing) -> Option<String> {
    match message.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Cannot encode {:?}: {}", message, e);
            None
        }
    }
}

impl Session {
    fn player(&self, client: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.client == client)
    }

    fn send_to(&self, client: ClientId, message: &Outgoing) {
        let (Some(tx), Some(text)) = (self.clients.get(&client), frame(message)) else {
            return;
        };
        // a closed channel means the client is on its way out
        let _ = tx.send(text);
    }

    fn broadcast(&self, message: &Outgoing) {
        if let Some(text) = frame(message) {
            for tx in self.clients.values() {
                let _ = tx.send(text.clone());
            }
        }
    }

    fn broadcast_players(&self, message: &Outgoing) {
        if let Some(text) = frame(message) {
            for player in &self.players {
                if let Some(tx) = self.clients.get(&player.client) {
                    let _ = tx.send(text.clone());
                }
            }
        }
    }

    fn error(&self, client: ClientId, message: &str) {
        debug!("Error reply to {}: {}", client, message);
        self.send_to(client, &Outgoing::error(message));
    }

    fn send_hellos(&self) {
        let hello = match self.game {
            Some(_) => Outgoing::Hello {
                game_available: true,
                taken_names: Some(self.players.iter().map(|p| p.name.clone()).collect()),
                taken_colours: Some(self.players.iter().map(|p| p.colour.clone()).collect()),
            },
            None => Outgoing::Hello {
                game_available: false,
                taken_names: None,
                taken_colours: None,
            },
        };
        self.broadcast(&hello);
    }

    fn update_message(&self) -> Option<Outgoing> {
        let game = self.game.as_ref()?;
        let names = self.players.iter().map(|p| p.name.clone()).collect();
        Some(Outgoing::Update {
            game_data: game.data(names),
            can_undo: false,
            can_redo: false,
        })
    }

    /// Record a log line in the game log and send it to every player. `text`
    /// follows the player's name.
    fn push_log(&mut self, client: ClientId, text: &str) {
        let Some(player) = self.player(client) else {
            return;
        };
        let entry = LogEntry {
            message: format!("{} {}", player.name, text),
            card: None,
            colour: player.colour.clone(),
        };
        info!("Game log: {}", entry.message);
        self.broadcast_players(&Outgoing::Log(entry.clone()));
        self.logs.insert(0, entry);
    }

    fn start_game(&mut self, client: ClientId, body: Value) {
        let request: StartGame = match serde_json::from_value(body) {
            Ok(request) => request,
            Err(_) => return self.error(client, BAD_SETTINGS),
        };
        let settings = request
            .scenario
            .parse::<Scenario>()
            .ok()
            .zip(request.expansions.value())
            .and_then(|(scenario, flags)| GameSettings::new(scenario, flags).ok());
        let Some(settings) = settings else {
            return self.error(client, BAD_SETTINGS);
        };

        if self.game.is_some() {
            info!("Replacing running game, booting {} player(s)", self.players.len());
            self.broadcast_players(&Outgoing::Boot);
        }
        self.players.clear();
        self.logs.clear();
        self.game = Some(Game::new(settings));
        self.players.push(Player {
            client,
            name: request.player_name,
            colour: request.player_colour,
        });

        if let Some(update) = self.update_message() {
            self.send_to(client, &update);
        }
        self.send_hellos();
        self.push_log(
            client,
            &format!(
                "Started the Game! Scenario: {}; Expansion(s): {}",
                settings.scenario,
                settings.expansion_text()
            ),
        );
    }

    fn connect(&mut self, client: ClientId, body: Value) {
        if self.game.is_none() {
            return self.error(client, NO_GAME);
        }
        let request: Join = match serde_json::from_value(body) {
            Ok(request) => request,
            Err(_) => return self.error(client, BAD_CONNECT),
        };

        let others = || self.players.iter().filter(|p| p.client != client);
        if others().any(|p| p.name == request.player_name) {
            return self.error(client, NAME_TAKEN);
        }
        if others().any(|p| p.colour == request.player_colour) {
            return self.error(client, COLOUR_TAKEN);
        }

        self.players.retain(|p| p.client != client);
        self.players.push(Player {
            client,
            name: request.player_name,
            colour: request.player_colour,
        });

        if let Some(update) = self.update_message() {
            self.broadcast_players(&update);
        }
        self.send_to(client, &Outgoing::AllLogs { logs: self.logs.clone() });
        self.send_hellos();
        self.push_log(client, "has joined!");
    }

    fn reconnect(&mut self, client: ClientId) {
        let Some(player) = self.player(client) else {
            return self.error(client, CANNOT_RECONNECT);
        };
        let reply = Outgoing::ReconnectReply {
            name: player.name.clone(),
            colour: player.colour.clone(),
        };
        self.send_to(client, &reply);
        self.push_log(client, "has reconnected!");
    }
}

/// Owns the session state shared by every `/game` connection
#[derive(Default)]
pub struct SessionHub {
    session: Mutex<Session>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection; frames for it are pushed into `outbound`
    pub fn register(&self, outbound: UnboundedSender<String>) -> ClientId {
        let client = Uuid::new_v4();
        let mut session = self.lock();
        session.clients.insert(client, outbound);
        info!("Client connected: {} (total {})", client, session.clients.len());
        session.send_hellos();
        client
    }

    /// Drop a connection. The game is discarded once nobody is left.
    pub fn unregister(&self, client: ClientId) {
        let mut session = self.lock();
        if session.player(client).is_some() {
            session.push_log(client, "has disconnected!");
            session.players.retain(|p| p.client != client);
        }
        session.clients.remove(&client);
        info!("Client disconnected: {} (total {})", client, session.clients.len());

        if session.clients.is_empty() && session.game.is_some() {
            info!("No players left in game, discarding it");
            session.game = None;
            session.players.clear();
            session.logs.clear();
        }
        session.send_hellos();
    }

    /// Dispatch one text frame from `client`
    pub fn handle_message(&self, client: ClientId, text: &str) {
        debug!("Message from {}: {}", client, text);
        let mut session = self.lock();
        let (command, body) = match parse_inbound(text) {
            Ok(parsed) => parsed,
            Err(e) => return session.error(client, &e.to_string()),
        };

        match command {
            Command::StartGame => session.start_game(client, body),
            Command::Connect => session.connect(client, body),
            Command::Reconnect => session.reconnect(client),
            other => {
                debug!("No handler for {:?}", other);
                session.error(client, NOT_IMPLEMENTED);
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn player_count(&self) -> usize {
        self.lock().players.len()
    }

    pub fn has_game(&self) -> bool {
        self.lock().game.is_some()
    }
}
