use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::ResourceKind;

/// Condition reason Config Connector reports once a resource is in sync.
pub const REASON_UP_TO_DATE: &str = "UpToDate";
/// Reason some resources report while still initializing; not a real failure.
pub const REASON_UPDATE_FAILED: &str = "UpdateFailed";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition_time: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SqlInstanceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub connection_name: Option<String>,
    pub public_ip_address: Option<String>,
    pub private_ip_address: Option<String>,
    pub self_link: Option<String>,
    pub observed_generation: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SqlDatabaseStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub self_link: Option<String>,
    pub observed_generation: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SqlUserStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected a {expected} object, got {found}")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("unreadable {kind} status: {message}")]
    Status {
        kind: &'static str,
        message: String,
    },
}

/// Observed status of one Cloud SQL resource, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlResourceStatus {
    Instance(SqlInstanceStatus),
    Database(SqlDatabaseStatus),
    User(SqlUserStatus),
}

impl SqlResourceStatus {
    /// Decode a raw control-plane object (`apiVersion`, `kind`, `metadata`,
    /// `status`) as the given kind. Objects of any other kind, including
    /// payload-less bookmarks, are rejected.
    pub fn decode(kind: ResourceKind, object: &Value) -> Result<Self, DecodeError> {
        let expected = kind.k8s_kind();
        let found = object.get("kind").and_then(Value::as_str);
        if found != Some(expected) {
            return Err(DecodeError::KindMismatch {
                expected,
                found: found.unwrap_or("<none>").to_string(),
            });
        }
        let status = match object.get("status") {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(s) => s.clone(),
        };
        let err = |e: serde_json::Error| DecodeError::Status {
            kind: expected,
            message: e.to_string(),
        };
        Ok(match kind {
            ResourceKind::Instance => {
                Self::Instance(serde_json::from_value(status).map_err(err)?)
            }
            ResourceKind::Database => {
                Self::Database(serde_json::from_value(status).map_err(err)?)
            }
            ResourceKind::User => {
                Self::User(serde_json::from_value(status).map_err(err)?)
            }
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Instance(_) => ResourceKind::Instance,
            Self::Database(_) => ResourceKind::Database,
            Self::User(_) => ResourceKind::User,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Instance(s) => &s.conditions,
            Self::Database(s) => &s.conditions,
            Self::User(s) => &s.conditions,
        }
    }

    /// The authoritative condition. Config Connector keeps a single `Ready`
    /// condition in practice; only the first entry is consulted, assuming
    /// most-recent-first ordering.
    pub fn latest_condition(&self) -> Option<&Condition> {
        self.conditions().first()
    }

    pub fn reason(&self) -> Option<&str> {
        self.latest_condition().and_then(|c| c.reason.as_deref())
    }

    pub fn is_up_to_date(&self) -> bool {
        self.reason() == Some(REASON_UP_TO_DATE)
    }

    /// Still initializing: reported as `UpdateFailed` and worth re-polling.
    pub fn is_transient_failure(&self) -> bool {
        self.reason() == Some(REASON_UPDATE_FAILED)
    }
}
