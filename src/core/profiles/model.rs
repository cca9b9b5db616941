use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{UpdaterError, UpdaterResult};

/// File name of the launcher's profile database inside the install directory.
pub const PROFILES_FILE: &str = "launcher_profiles.json";

/// The only on-disk schema this tool reads or writes.
pub const EXPECTED_SCHEMA_VERSION: i64 = 3;

const NO_NAME: &str = "<no name>";

/// One launcher profile.
///
/// Timestamps are kept as the launcher wrote them so an untouched profile
/// serialises back identically; use [`Profile::created_at`] for a parsed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Key of the entry in the `profiles` object, not a field of the entry.
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub last_version_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
    /// Fields this tool does not interpret (`type`, `javaArgs`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created.as_deref()?)
    }

    /// Trimmed name, or `<no name>` when blank.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            NO_NAME
        } else {
            trimmed
        }
    }

    pub fn is_at(&self, version_id: &str) -> bool {
        self.last_version_id == version_id
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Profiles in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSet {
    entries: Vec<Profile>,
}

impl ProfileSet {
    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The whole `launcher_profiles.json` document.
///
/// Held as the raw JSON object (insertion ordered) so that writing it back
/// reproduces every field, including `settings` and anything newer launchers
/// add, exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDatabase {
    document: Map<String, Value>,
}

impl ProfileDatabase {
    /// Parse and validate a database.
    ///
    /// Fails with [`UpdaterError::SchemaMismatch`] when `version` is not
    /// [`EXPECTED_SCHEMA_VERSION`], and with `ProfilesUnready` for anything
    /// that is not shaped like a profile database.
    pub fn parse(raw: &str) -> UpdaterResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(document) = value else {
            return Err(UpdaterError::ProfilesUnready(
                "top level is not a JSON object".into(),
            ));
        };

        let found = document
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| UpdaterError::ProfilesUnready("missing numeric `version`".into()))?;
        if found != EXPECTED_SCHEMA_VERSION {
            return Err(UpdaterError::SchemaMismatch {
                expected: EXPECTED_SCHEMA_VERSION,
                found,
            });
        }

        let db = Self { document };
        // Surface malformed entries now rather than on first listing.
        db.profiles()?;
        Ok(db)
    }

    /// The opaque `settings` blob, if present.
    pub fn settings(&self) -> Option<&Value> {
        self.document.get("settings")
    }

    fn raw_profiles(&self) -> UpdaterResult<&Map<String, Value>> {
        match self.document.get("profiles") {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(UpdaterError::ProfilesUnready(
                "`profiles` is not an object".into(),
            )),
            None => Err(UpdaterError::ProfilesUnready("missing `profiles`".into())),
        }
    }

    pub fn profiles(&self) -> UpdaterResult<ProfileSet> {
        let mut entries = Vec::new();
        for (id, raw) in self.raw_profiles()? {
            let mut profile: Profile = serde_json::from_value(raw.clone()).map_err(|e| {
                UpdaterError::ProfilesUnready(format!("profile {id} is malformed: {e}"))
            })?;
            profile.id = id.clone();
            entries.push(profile);
        }
        Ok(ProfileSet { entries })
    }

    /// Set `lastVersionId` of profile `id`. Returns `false` if there is no such profile.
    pub fn set_last_version_id(&mut self, id: &str, version_id: &str) -> bool {
        let Some(Value::Object(profile)) = self
            .document
            .get_mut("profiles")
            .and_then(Value::as_object_mut)
            .and_then(|profiles| profiles.get_mut(id))
        else {
            return false;
        };
        profile.insert(
            "lastVersionId".to_string(),
            Value::String(version_id.to_string()),
        );
        true
    }

    pub fn to_json_pretty(&self) -> UpdaterResult<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}
