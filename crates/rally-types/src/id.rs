use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a fresh 24-hex-char identifier.
///
/// Ids only need to be unique within one deployment, so 12 random bytes
/// run through Blake3 are plenty. Not a security credential.
pub fn fresh_id() -> String {
    let mut seed = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut seed);
    let hash = blake3::hash(&seed);
    hex::encode(&hash.as_bytes()[..12])
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(fresh_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque participant identifier supplied by the auth layer.
    UserId
);
string_id!(
    /// Campaign identifier; campaign content itself lives outside the core.
    CampaignId
);
string_id!(TeamId);
string_id!(GroupId);
string_id!(
    /// Internal id of a smart link (distinct from its public slug).
    LinkId
);
string_id!(
    /// Id of an append-only row (ledger entry, activity event, snapshot row).
    EntryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_id_shape() {
        let id = fresh_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fresh_ids_distinct() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_display_roundtrip() {
        let id = CampaignId::new("spring-drive");
        assert_eq!(id.to_string(), "spring-drive");
        assert_eq!(CampaignId::from("spring-drive"), id);
    }
}
