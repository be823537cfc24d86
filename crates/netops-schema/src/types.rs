//! Newtype wrappers for controller-assigned identifiers.
//!
//! All newtypes serialize/deserialize as plain strings so they can sit directly
//! in RPC bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Controller-assigned slice identifier. Primary key of the policy store.
    SliceId
);

string_newtype!(
    /// Human-readable slice name. Lifecycle events address slices by name.
    SliceName
);

string_newtype!(
    /// Identifier of a slice gateway instance on this node.
    GatewayId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_id_display_and_as_ref() {
        let id = SliceId::new("s1");
        assert_eq!(id.to_string(), "s1");
        assert_eq!(id.as_str(), "s1");
        assert_eq!(AsRef::<str>::as_ref(&id), "s1");
    }

    #[test]
    fn slice_name_serializes_as_plain_string() {
        let name = SliceName::new("slice-a");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"slice-a\"");
        let back: SliceName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn gateway_id_compares_with_str() {
        let gw = GatewayId::from("gw-0");
        assert_eq!(gw, "gw-0");
        assert!(gw != "gw-1");
    }

    #[test]
    fn default_is_empty() {
        assert!(SliceId::default().is_empty());
    }
}
