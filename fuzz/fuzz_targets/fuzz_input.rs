// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;

use companion::game::{parse_inbound, SessionHub};
use companion::sidecar::SidecarMatcher;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_inbound(text);
    let _ = SidecarMatcher::default().matches_path(text);

    let hub = SessionHub::new();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let client = hub.register(tx);
    hub.handle_message(client, text);
    hub.unregister(client);
});
