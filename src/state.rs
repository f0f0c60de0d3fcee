// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::AuthProtocol;
use crate::config::AppConfig;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthProtocol>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(auth: Arc<AuthProtocol>, config: Arc<AppConfig>) -> Self {
        Self { auth, config }
    }
}
