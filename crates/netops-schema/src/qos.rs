use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Queueing discipline used for a slice's class hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassType {
    #[default]
    #[serde(rename = "HTB")]
    Htb,
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassType::Htb => write!(f, "HTB"),
        }
    }
}

impl FromStr for ClassType {
    type Err = SchemaError;

    /// An empty string selects the default kind, matching a controller that
    /// leaves the enum field at its zero value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "HTB" | "htb" => Ok(ClassType::Htb),
            other => Err(SchemaError::InvalidClassType(other.to_owned())),
        }
    }
}

/// Role of a slice gateway on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayRole {
    #[serde(rename = "SLICE_GW_CLIENT")]
    Client,
    #[serde(rename = "SLICE_GW_SERVER")]
    Server,
}

impl fmt::Display for GatewayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayRole::Client => write!(f, "SLICE_GW_CLIENT"),
            GatewayRole::Server => write!(f, "SLICE_GW_SERVER"),
        }
    }
}

impl FromStr for GatewayRole {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SLICE_GW_CLIENT" | "CLIENT" => Ok(GatewayRole::Client),
            "SLICE_GW_SERVER" | "SERVER" => Ok(GatewayRole::Server),
            other => Err(SchemaError::InvalidGatewayRole(other.to_owned())),
        }
    }
}

/// Slice lifecycle events emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    #[serde(rename = "EV_CREATE")]
    Create,
    #[serde(rename = "EV_UPDATE")]
    Update,
    #[serde(rename = "EV_DELETE")]
    Delete,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Create => write!(f, "EV_CREATE"),
            LifecycleEvent::Update => write!(f, "EV_UPDATE"),
            LifecycleEvent::Delete => write!(f, "EV_DELETE"),
        }
    }
}

impl FromStr for LifecycleEvent {
    type Err = SchemaError;

    /// An empty string is the protobuf zero value, `EV_CREATE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "EV_CREATE" | "CREATE" => Ok(LifecycleEvent::Create),
            "EV_UPDATE" | "UPDATE" => Ok(LifecycleEvent::Update),
            "EV_DELETE" | "DELETE" => Ok(LifecycleEvent::Delete),
            other => Err(SchemaError::InvalidEvent(other.to_owned())),
        }
    }
}

/// QoS profile pushed by the controller for a slice.
///
/// Only `class`, `bw_ceiling`, `bw_guaranteed` and `priority` drive shaping;
/// the remaining fields are kept for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceQosProfile {
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub tc_type: String,
    pub class: ClassType,
    /// Bandwidth ceiling in kbit/s.
    pub bw_ceiling: u32,
    /// Guaranteed bandwidth in kbit/s.
    pub bw_guaranteed: u32,
    pub priority: u32,
    #[serde(default)]
    pub dscp_class: String,
}

/// Shaping parameters actually applied to a slice's classes.
///
/// Value equality between the applied and the requested `TcInfo` is what lets
/// a repeated push converge without touching the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TcInfo {
    pub class: ClassType,
    pub bw_ceiling: u32,
    pub bw_guaranteed: u32,
    pub priority: u32,
}

impl From<&SliceQosProfile> for TcInfo {
    fn from(profile: &SliceQosProfile) -> Self {
        Self {
            class: profile.class,
            bw_ceiling: profile.bw_ceiling,
            bw_guaranteed: profile.bw_guaranteed,
            priority: profile.priority,
        }
    }
}

impl fmt::Display for TcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ceil={}kbit rate={}kbit prio={}",
            self.class, self.bw_ceiling, self.bw_guaranteed, self.priority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_type_parses_htb_and_zero_value() {
        assert_eq!("HTB".parse::<ClassType>().unwrap(), ClassType::Htb);
        assert_eq!("".parse::<ClassType>().unwrap(), ClassType::Htb);
        assert!("CBQ".parse::<ClassType>().is_err());
    }

    #[test]
    fn gateway_role_accepts_long_and_short_names() {
        assert_eq!(
            "SLICE_GW_CLIENT".parse::<GatewayRole>().unwrap(),
            GatewayRole::Client
        );
        assert_eq!("SERVER".parse::<GatewayRole>().unwrap(), GatewayRole::Server);
        assert!("".parse::<GatewayRole>().is_err());
        assert!("ROUTER".parse::<GatewayRole>().is_err());
    }

    #[test]
    fn lifecycle_event_parsing() {
        assert_eq!(
            "EV_DELETE".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::Delete
        );
        assert_eq!("".parse::<LifecycleEvent>().unwrap(), LifecycleEvent::Create);
        assert!("EV_EXPLODE".parse::<LifecycleEvent>().is_err());
    }

    #[test]
    fn tc_info_from_profile_ignores_informational_fields() {
        let a = SliceQosProfile {
            profile_name: "gold".to_owned(),
            bw_ceiling: 1000,
            bw_guaranteed: 500,
            priority: 1,
            ..SliceQosProfile::default()
        };
        let b = SliceQosProfile {
            profile_name: "silver".to_owned(),
            dscp_class: "AF11".to_owned(),
            ..a.clone()
        };
        assert_eq!(TcInfo::from(&a), TcInfo::from(&b));
    }

    #[test]
    fn tc_info_differs_on_any_shaping_field() {
        let base = TcInfo {
            class: ClassType::Htb,
            bw_ceiling: 1000,
            bw_guaranteed: 500,
            priority: 1,
        };
        assert_ne!(base, TcInfo { priority: 2, ..base });
        assert_ne!(base, TcInfo { bw_ceiling: 2000, ..base });
        assert_ne!(base, TcInfo { bw_guaranteed: 100, ..base });
    }

    #[test]
    fn role_serializes_with_wire_name() {
        let json = serde_json::to_string(&GatewayRole::Server).unwrap();
        assert_eq!(json, "\"SLICE_GW_SERVER\"");
    }
}
