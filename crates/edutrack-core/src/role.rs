//! Signed-in user roles and the screens each one can reach.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Admin,
}

/// Navigation targets in the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Dashboard,
    MarkAttendance,
    Students,
    Teachers,
    Notifications,
    Reports,
    Settings,
}

const TEACHER_ROUTES: &[Route] = &[
    Route::Dashboard,
    Route::MarkAttendance,
    Route::Students,
    Route::Reports,
    Route::Settings,
];

const ADMIN_ROUTES: &[Route] = &[
    Route::Dashboard,
    Route::MarkAttendance,
    Route::Students,
    Route::Teachers,
    Route::Notifications,
    Route::Reports,
    Route::Settings,
];

impl Role {
    /// Routes reachable by this role, in menu order. The first is home.
    pub fn routes(self) -> &'static [Route] {
        match self {
            Role::Teacher => TEACHER_ROUTES,
            Role::Admin => ADMIN_ROUTES,
        }
    }

    pub fn home(self) -> Route {
        self.routes()[0]
    }

    pub fn allows(self, route: Route) -> bool {
        self.routes().contains(&route)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown role '{0}' (expected teacher or admin)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Dashboard => "dashboard",
            Route::MarkAttendance => "mark-attendance",
            Route::Students => "students",
            Route::Teachers => "teachers",
            Route::Notifications => "notifications",
            Route::Reports => "reports",
            Route::Settings => "settings",
        };
        f.write_str(name)
    }
}
