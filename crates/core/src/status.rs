//! Status enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. On the wire the
//! variants serialize as their snake_case label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[repr(i16)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant = $val ),+
        }

        impl $name {
            /// Every variant, in lookup-table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Return the wire label.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                match id {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Unknown {} id: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $label => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Unknown {}: \"{other}\"",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Issue lifecycle status.
    IssueStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        PendingMerge = 3 => "pending_merge",
        Merged = 4 => "merged",
        Terminated = 5 => "terminated",
    }
}

define_status_enum! {
    /// Node availability status.
    NodeStatus {
        Idle = 1 => "idle",
        Running = 2 => "running",
        Offline = 3 => "offline",
    }
}

define_status_enum! {
    /// Credential category. The coding-agent categories carry a personal
    /// access token; `generic` carries a username/password pair for a service.
    CredentialCategory {
        GithubCopilot = 1 => "github_copilot",
        Cursor = 2 => "cursor",
        ClaudeCode = 3 => "claude_code",
        Generic = 4 => "generic",
    }
}

impl IssueStatus {
    /// Whether an issue in this status holds a node (`assigned_node_id` is set).
    pub fn holds_node(self) -> bool {
        matches!(self, IssueStatus::Processing | IssueStatus::PendingMerge)
    }

    /// Whether the status accepts no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, IssueStatus::Merged)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Issue priority. Higher values are dispatched first.
///
/// Serialized as the bare integer (`0`, `1`, `2`) to match the issue payload.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    sqlx::Type,
)]
#[repr(i16)]
#[serde(try_from = "i16", into = "i16")]
pub enum Priority {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
}

impl From<Priority> for i16 {
    fn from(value: Priority) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for Priority {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::Low),
            1 => Ok(Priority::Medium),
            2 => Ok(Priority::High),
            other => Err(CoreError::Validation(format!(
                "Priority must be 0 (low), 1 (medium) or 2 (high), got {other}"
            ))),
        }
    }
}
