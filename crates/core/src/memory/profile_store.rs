use chrono::{DateTime, Utc};

use crate::identity::profile::{Profile, ProfileUpdate};
use crate::identity::schema::decode_profile;
use crate::store::{KvStore, Lookup, history_key, profile_key};

/// Where a loaded profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOrigin {
    /// Decoded from the stored record.
    Stored,
    /// The store answered and holds nothing for this user.
    Absent,
    /// A record exists but is not a JSON object.
    Unreadable,
    /// The store did not answer; nothing is known about this user.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    pub profile: Profile,
    pub origin: ProfileOrigin,
}

impl LoadedProfile {
    /// True only when the store confirmed there is no record at all.
    pub fn is_first_contact(&self) -> bool {
        self.origin == ProfileOrigin::Absent
    }
}

/// Per-user profile persistence with default backfill on read.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    store: KvStore,
    set_cap: usize,
}

impl ProfileStore {
    pub fn new(store: KvStore, set_cap: usize) -> Self {
        Self { store, set_cap }
    }

    /// Stored profile, or a fresh one when absent, unreadable or the store is down.
    pub async fn get_profile(&self, user_id: &str, now: DateTime<Utc>) -> Profile {
        self.load(user_id, now).await.profile
    }

    /// Like [`get_profile`](Self::get_profile), also reporting why a fresh profile was used.
    pub async fn load(&self, user_id: &str, now: DateTime<Utc>) -> LoadedProfile {
        let (profile, origin) = match self.store.lookup(&profile_key(user_id)).await {
            Lookup::Found(raw) => match decode_profile(&raw, now, self.set_cap) {
                Some(profile) => (profile, ProfileOrigin::Stored),
                None => {
                    tracing::warn!(user_id, "stored profile unreadable, starting fresh");
                    (Profile::new(now), ProfileOrigin::Unreadable)
                }
            },
            Lookup::Missing => (Profile::new(now), ProfileOrigin::Absent),
            Lookup::Unavailable => (Profile::new(now), ProfileOrigin::Unavailable),
        };
        LoadedProfile { profile, origin }
    }

    pub async fn set_profile(&self, user_id: &str, profile: &Profile) -> bool {
        match serde_json::to_string(profile) {
            Ok(encoded) => self.store.set(&profile_key(user_id), &encoded, None).await,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "profile encode failed");
                false
            }
        }
    }

    /// Delete history, then the profile. Both are attempted; true only if both succeed.
    pub async fn erase_all(&self, user_id: &str) -> bool {
        let history = self.store.delete(&history_key(user_id)).await;
        let profile = self.store.delete(&profile_key(user_id)).await;
        history && profile
    }

    /// Apply a client edit to the stored profile and save it.
    pub async fn update(&self, user_id: &str, update: &ProfileUpdate, now: DateTime<Utc>) -> (Profile, bool) {
        let edited = self.get_profile(user_id, now).await.with_update(update);
        let saved = self.set_profile(user_id, &edited).await;
        (edited, saved)
    }
}
