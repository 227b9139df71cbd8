//! Cache key derivation for the derived relation views.
//!
//! Every view key is a literal per-view tag followed by the owner id. The tags
//! differ from their first byte on, so no `(view, owner)` pair can produce the
//! key of another pair.

use std::fmt;

const FOLLOWER_USER_IDS_PREFIX: &str = "FOLLOWER_USER_IDS:";
const SUBSCRIBER_USER_IDS_PREFIX: &str = "SUBSCRIBER_USER_IDS:";

/// Derived view cached per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Related ids following the owner and not blocked.
    Followers,
    /// Related ids subscribed to the owner and not blocked.
    Subscribers,
}

impl ViewKind {
    pub const ALL: [ViewKind; 2] = [ViewKind::Followers, ViewKind::Subscribers];

    pub fn prefix(self) -> &'static str {
        match self {
            ViewKind::Followers => FOLLOWER_USER_IDS_PREFIX,
            ViewKind::Subscribers => SUBSCRIBER_USER_IDS_PREFIX,
        }
    }

    pub fn key_for(self, owner_user_id: &str) -> String {
        let prefix = self.prefix();
        let mut key = String::with_capacity(prefix.len() + owner_user_id.len());
        key.push_str(prefix);
        key.push_str(owner_user_id);
        key
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::Followers => "followers",
            ViewKind::Subscribers => "subscribers",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn follower_user_ids_key(owner_user_id: &str) -> String {
    ViewKind::Followers.key_for(owner_user_id)
}

pub fn subscriber_user_ids_key(owner_user_id: &str) -> String {
    ViewKind::Subscribers.key_for(owner_user_id)
}

/// Split a derived key back into its view and owner id.
pub fn parse_key(key: &str) -> Option<(ViewKind, &str)> {
    ViewKind::ALL
        .into_iter()
        .find_map(|view| key.strip_prefix(view.prefix()).map(|owner| (view, owner)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_use_literal_prefixes() {
        assert_eq!(follower_user_ids_key("u1"), "FOLLOWER_USER_IDS:u1");
        assert_eq!(subscriber_user_ids_key("u1"), "SUBSCRIBER_USER_IDS:u1");
    }

    #[test]
    fn derivation_is_stable() {
        assert_eq!(follower_user_ids_key("abc"), follower_user_ids_key("abc"));
        assert_eq!(
            ViewKind::Subscribers.key_for("abc"),
            subscriber_user_ids_key("abc")
        );
    }

    #[test]
    fn distinct_pairs_never_collide() {
        let owners = [
            "",
            "u1",
            "u2",
            "u1:",
            ":u1",
            "FOLLOWER_USER_IDS:u1",
            "SUBSCRIBER_USER_IDS:",
            "ユーザー",
        ];

        let mut seen = HashSet::new();
        for owner in owners {
            for view in ViewKind::ALL {
                assert!(
                    seen.insert(view.key_for(owner)),
                    "collision for {view} / {owner:?}"
                );
            }
        }
        assert_eq!(seen.len(), owners.len() * ViewKind::ALL.len());
    }

    #[test]
    fn parse_key_inverts_derivation() {
        for view in ViewKind::ALL {
            let key = view.key_for("owner:with:colons");
            assert_eq!(parse_key(&key), Some((view, "owner:with:colons")));
        }
        assert_eq!(parse_key("POST_LIST:1"), None);
    }
}
