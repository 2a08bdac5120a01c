//! The engagement catalog: which platforms exist, which actions each one
//! supports, and what every action costs and pays.
//!
//! Platforms and actions are closed enumerations. Rates, verification waits,
//! and per-platform capabilities are static records resolved through `match`,
//! so an unpriced action or an unknown platform cannot reach the ledger.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A social platform tasks can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "platform", rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Telegram,
    Facebook,
    Tiktok,
    Instagram,
}

/// An engagement action a task commissions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "action_type", rename_all = "lowercase")]
pub enum ActionType {
    Subscribe,
    Like,
    Comment,
    #[serde(rename = "view_30")]
    #[sqlx(rename = "view_30")]
    View30,
    #[serde(rename = "view_300")]
    #[sqlx(rename = "view_300")]
    View300,
    Follow,
    Share,
    Join,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
    Stopped,
    Finished,
}

/// Account role. Admins get the moderation surface, nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Point rates and verification wait for one action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRate {
    /// Points debited from the task owner per completed execution.
    pub cost: i64,
    /// Points credited to the executor per completed execution.
    pub reward: i64,
    /// How long an executor must stay on the target before claiming.
    pub wait: Duration,
}

const DEFAULT_WAIT: Duration = Duration::from_secs(15);

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::Subscribe,
        ActionType::Like,
        ActionType::Comment,
        ActionType::View30,
        ActionType::View300,
        ActionType::Follow,
        ActionType::Share,
        ActionType::Join,
    ];

    /// The static rate record for this action.
    pub fn rate(self) -> ActionRate {
        let (cost, reward, wait) = match self {
            ActionType::Subscribe => (5, 3, DEFAULT_WAIT),
            ActionType::Like => (2, 1, DEFAULT_WAIT),
            ActionType::Comment => (3, 2, DEFAULT_WAIT),
            ActionType::View30 => (2, 1, Duration::from_secs(30)),
            ActionType::View300 => (12, 10, Duration::from_secs(300)),
            ActionType::Follow => (5, 3, DEFAULT_WAIT),
            ActionType::Share => (2, 2, DEFAULT_WAIT),
            ActionType::Join => (5, 3, DEFAULT_WAIT),
        };
        ActionRate { cost, reward, wait }
    }

    /// Wire name, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Subscribe => "subscribe",
            ActionType::Like => "like",
            ActionType::Comment => "comment",
            ActionType::View30 => "view_30",
            ActionType::View300 => "view_300",
            ActionType::Follow => "follow",
            ActionType::Share => "share",
            ActionType::Join => "join",
        }
    }
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Youtube,
        Platform::Telegram,
        Platform::Facebook,
        Platform::Tiktok,
        Platform::Instagram,
    ];

    /// Actions that can be commissioned on this platform.
    pub fn actions(self) -> &'static [ActionType] {
        match self {
            Platform::Youtube => &[
                ActionType::Subscribe,
                ActionType::Like,
                ActionType::Comment,
                ActionType::View30,
                ActionType::View300,
            ],
            Platform::Telegram => &[ActionType::Join],
            Platform::Facebook | Platform::Tiktok | Platform::Instagram => {
                &[ActionType::Follow, ActionType::Like, ActionType::Comment]
            }
        }
    }

    pub fn supports(self, action: ActionType) -> bool {
        self.actions().contains(&action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Telegram => "telegram",
            Platform::Facebook => "facebook",
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hosts recognized as public telegram channel links.
const TELEGRAM_HOSTS: [&str; 3] = ["t.me", "telegram.me", "telegram.dog"];

/// Rewrite a public telegram link into a `tg://resolve` deep link.
///
/// `https://t.me/somechannel` becomes `tg://resolve?domain=somechannel`,
/// which opens the native app directly instead of bouncing through the
/// web preview. Returns `None` when the URL is not a recognizable channel
/// link; callers pass those through unchanged.
pub fn telegram_deep_link(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    if !TELEGRAM_HOSTS.contains(&host.to_ascii_lowercase().as_str()) {
        return None;
    }
    let name: String = path
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#') && !c.is_whitespace())
        .collect();
    if name.is_empty() {
        return None;
    }
    Some(format!("tg://resolve?domain={}", name))
}

/// The URL an executor should actually open for a task.
///
/// Telegram links are rewritten to deep links; everything else is used as-is.
pub fn execution_url(platform: Platform, url: &str) -> String {
    match platform {
        Platform::Telegram => telegram_deep_link(url).unwrap_or_else(|| url.to_string()),
        _ => url.to_string(),
    }
}
