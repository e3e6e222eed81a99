//! Application context, resolved once at startup and handed to commands.

use crate::preferences::{KeyValueStore, Preferences, Theme};
use edutrack_core::{Role, Route};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Error, Debug, PartialEq)]
pub enum ContextError {
    #[error("no role selected; pass --role teacher|admin or run `edutrack prefs set role <role>`")]
    NoRole,
    #[error("the {role} role cannot open {route}")]
    Forbidden { role: Role, route: Route },
}

/// Where the server URL comes from, highest precedence first.
pub struct Overrides {
    pub role: Option<Role>,
    pub server_flag: Option<String>,
    pub server_env: Option<String>,
}

pub struct AppContext<S: KeyValueStore> {
    pub preferences: Preferences<S>,
    pub role: Role,
    pub server_url: String,
}

impl<S: KeyValueStore> AppContext<S> {
    pub fn resolve(preferences: Preferences<S>, overrides: Overrides) -> Result<Self, ContextError> {
        let role = overrides
            .role
            .or_else(|| preferences.role())
            .ok_or(ContextError::NoRole)?;
        let server_url = overrides
            .server_flag
            .or(overrides.server_env)
            .or_else(|| preferences.server_url().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        tracing::debug!(%role, server = %server_url, "context resolved");
        Ok(Self {
            preferences,
            role,
            server_url,
        })
    }

    /// Fail unless the current role's route table includes `route`.
    pub fn require(&self, route: Route) -> Result<(), ContextError> {
        if self.role.allows(route) {
            Ok(())
        } else {
            Err(ContextError::Forbidden {
                role: self.role,
                route,
            })
        }
    }

    pub fn palette(&self, is_terminal: bool) -> Palette {
        Palette::for_theme(self.preferences.theme(), is_terminal)
    }
}

/// ANSI colours for result lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub ok: &'static str,
    pub err: &'static str,
    pub reset: &'static str,
}

impl Palette {
    const PLAIN: Palette = Palette { ok: "", err: "", reset: "" };

    pub fn for_theme(theme: Theme, is_terminal: bool) -> Self {
        if !is_terminal {
            return Self::PLAIN;
        }
        match theme {
            // Bright variants stay readable on dark backgrounds.
            Theme::Dark | Theme::System => Palette {
                ok: "\x1b[92m",
                err: "\x1b[91m",
                reset: "\x1b[0m",
            },
            Theme::Light => Palette {
                ok: "\x1b[32m",
                err: "\x1b[31m",
                reset: "\x1b[0m",
            },
        }
    }
}
