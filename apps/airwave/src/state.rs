// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use airwave_engine::Radio;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub radio: Arc<Radio>,
    pub config: Arc<Config>,
    /// Process start, in epoch seconds; reported by `/broadcast_metadata` so
    /// clients can align their playback clocks.
    pub start_time_s: u64,
}

impl AppState {
    pub fn new(radio: Arc<Radio>, config: Arc<Config>) -> Self {
        let start_time_s = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { radio, config, start_time_s }
    }
}
