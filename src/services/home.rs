//! Role-gated landing view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::check_in::{self, WorkerHome};
use super::portal::{self, Portal};
use super::session::SessionUser;
use super::stats::{DashboardStats, StatsCache};
use crate::model::{Profile, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Login,
    Admin,
    Worker,
    Client,
}

/// Pick the view for a caller. Anyone without an active profile gets `Login`.
#[must_use]
pub fn select_view(user: Option<&SessionUser>, profile: Option<&Profile>) -> View {
    match (user, profile) {
        (Some(_), Some(profile)) if profile.is_active => match profile.role {
            UserRole::Admin => View::Admin,
            UserRole::Worker => View::Worker,
            UserRole::Client => View::Client,
        },
        _ => View::Login,
    }
}

/// The selected view with the data it renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Home {
    Login,
    Admin { stats: DashboardStats },
    Worker { home: WorkerHome },
    Client { portal: Portal },
}

pub async fn load_home(
    pool: &PgPool,
    stats: &StatsCache,
    user: Option<&SessionUser>,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
) -> Result<Home, sqlx::Error> {
    let view = select_view(user, profile);
    let Some(profile) = profile else {
        return Ok(Home::Login);
    };
    Ok(match view {
        View::Login => Home::Login,
        View::Admin => Home::Admin { stats: stats.get_or_refresh(pool).await? },
        View::Worker => Home::Worker { home: check_in::worker_home(pool, profile.id, now).await? },
        View::Client => Home::Client { portal: portal::client_portal(pool, profile.id, now).await? },
    })
}

#[cfg(test)]
#[path = "home_test.rs"]
mod tests;
