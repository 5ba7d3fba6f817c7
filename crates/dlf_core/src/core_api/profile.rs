use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::changelog::ChangeLog;
use super::error::{CoreError, CoreErrorCode};

pub const DEFAULT_PROFILE_NAME: &str = "DefaultProfile";
pub const DEFAULT_OUTPUT_FILTER_FILENAME: &str = "DynamicLootFilter.filter";

const GENERAL_CONFIG_FILE: &str = "general.json";
const PROFILES_DIR: &str = "profiles";
const PROFILE_EXTENSION: &str = "json";

const KEY_DOWNLOAD_DIRECTORY: &str = "DownloadDirectory";
const KEY_POE_DIRECTORY: &str = "PathOfExileDirectory";
const KEY_DOWNLOADED_FILENAME: &str = "DownloadedLootFilterFilename";
const KEY_OUTPUT_FILENAME: &str = "OutputLootFilterFilename";
const KEY_REMOVE_DOWNLOADED: &str = "RemoveDownloadedFilter";

fn default_output_filter_filename() -> String {
    DEFAULT_OUTPUT_FILTER_FILENAME.to_string()
}

/// Where a profile reads the downloaded filter and writes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub download_directory: PathBuf,
    pub path_of_exile_directory: PathBuf,
    pub downloaded_filter_filename: String,
    #[serde(default = "default_output_filter_filename")]
    pub output_filter_filename: String,
    #[serde(default)]
    pub remove_downloaded_filter: bool,
}

impl ProfileConfig {
    pub fn new(
        download_directory: impl Into<PathBuf>,
        path_of_exile_directory: impl Into<PathBuf>,
        downloaded_filter_filename: impl Into<String>,
    ) -> Self {
        Self {
            download_directory: download_directory.into(),
            path_of_exile_directory: path_of_exile_directory.into(),
            downloaded_filter_filename: downloaded_filter_filename.into(),
            output_filter_filename: default_output_filter_filename(),
            remove_downloaded_filter: false,
        }
    }

    /// Parse `Keyword:value` lines. Blank lines and `#` comments are ignored;
    /// unknown keywords are skipped with a warning.
    pub fn from_key_values(text: &str) -> Result<Self, CoreError> {
        let mut download_directory = None;
        let mut poe_directory = None;
        let mut downloaded_filename = None;
        let mut output_filename = None;
        let mut remove_downloaded = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(CoreError::new(
                    CoreErrorCode::Parse,
                    format!("line {}: expected Keyword:value, got '{line}'", index + 1),
                ));
            };
            let value = value.trim().to_string();
            match key.trim() {
                KEY_DOWNLOAD_DIRECTORY => download_directory = Some(value),
                KEY_POE_DIRECTORY => poe_directory = Some(value),
                KEY_DOWNLOADED_FILENAME => downloaded_filename = Some(value),
                KEY_OUTPUT_FILENAME => output_filename = Some(value),
                KEY_REMOVE_DOWNLOADED => remove_downloaded = Some(parse_bool(&value, index + 1)?),
                other => tracing::warn!(line = index + 1, key = other, "unknown profile keyword"),
            }
        }

        let required = |value: Option<String>, key: &str| {
            value.ok_or_else(|| {
                CoreError::new(CoreErrorCode::Parse, format!("missing required keyword {key}"))
            })
        };

        Ok(Self {
            download_directory: required(download_directory, KEY_DOWNLOAD_DIRECTORY)?.into(),
            path_of_exile_directory: required(poe_directory, KEY_POE_DIRECTORY)?.into(),
            downloaded_filter_filename: required(downloaded_filename, KEY_DOWNLOADED_FILENAME)?,
            output_filter_filename: output_filename
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_output_filter_filename),
            remove_downloaded_filter: remove_downloaded.unwrap_or(false),
        })
    }

    pub fn downloaded_filter_path(&self) -> PathBuf {
        self.download_directory.join(&self.downloaded_filter_filename)
    }

    pub fn output_filter_path(&self) -> PathBuf {
        self.path_of_exile_directory.join(&self.output_filter_filename)
    }
}

fn parse_bool(value: &str, line: usize) -> Result<bool, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CoreError::new(
            CoreErrorCode::Parse,
            format!("line {line}: expected true or false, got '{value}'"),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub config: ProfileConfig,
    #[serde(default)]
    pub changes: ChangeLog,
}

impl Profile {
    pub fn new(name: impl Into<String>, config: ProfileConfig) -> Self {
        Self {
            name: name.into(),
            config,
            changes: ChangeLog::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub active_profile: Option<String>,
}

/// Profile records on disk:
///
/// ```text
/// <root>/general.json
/// <root>/profiles/<name>.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn profiles_dir(&self) -> PathBuf {
        self.root.join(PROFILES_DIR)
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir()
            .join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    fn general_path(&self) -> PathBuf {
        self.root.join(GENERAL_CONFIG_FILE)
    }

    /// Every stored profile, the active one first and the rest by name.
    pub fn profile_names(&self) -> Result<Vec<String>, CoreError> {
        let dir = self.profiles_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to list {}: {e}", dir.display()),
            )
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();

        if let Some(active) = self.active_profile()? {
            if let Some(pos) = names.iter().position(|n| *n == active) {
                let name = names.remove(pos);
                names.insert(0, name);
            }
        }
        Ok(names)
    }

    pub fn is_first_launch(&self) -> Result<bool, CoreError> {
        Ok(self
            .profile_names()?
            .iter()
            .all(|n| n == DEFAULT_PROFILE_NAME))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name).is_file()
    }

    /// Create `name` with an empty change log. Returns false when the
    /// profile already exists; the stored record is left alone.
    pub fn create_profile(&self, name: &str, config: ProfileConfig) -> Result<bool, CoreError> {
        validate_profile_name(name)?;
        if self.exists(name) {
            return Ok(false);
        }
        self.save(&Profile::new(name, config))?;
        if self.active_profile()?.is_none() {
            self.set_active_profile(name)?;
        }
        tracing::info!(profile = name, "created profile");
        Ok(true)
    }

    pub fn set_active_profile(&self, name: &str) -> Result<(), CoreError> {
        validate_profile_name(name)?;
        if !self.exists(name) {
            return Err(CoreError::new(
                CoreErrorCode::NotFound,
                format!("profile '{name}' does not exist"),
            ));
        }
        let general = GeneralConfig {
            active_profile: Some(name.to_string()),
        };
        write_json(&self.general_path(), &general)
    }

    pub fn active_profile(&self) -> Result<Option<String>, CoreError> {
        let path = self.general_path();
        if !path.is_file() {
            return Ok(None);
        }
        let general: GeneralConfig = read_json(&path)?;
        Ok(general.active_profile)
    }

    pub fn load(&self, name: &str) -> Result<Profile, CoreError> {
        validate_profile_name(name)?;
        let path = self.profile_path(name);
        if !path.is_file() {
            return Err(CoreError::new(
                CoreErrorCode::NotFound,
                format!("profile '{name}' does not exist"),
            ));
        }
        read_json(&path)
    }

    pub fn save(&self, profile: &Profile) -> Result<(), CoreError> {
        validate_profile_name(&profile.name)?;
        write_json(&self.profile_path(&profile.name), profile)?;
        tracing::info!(
            profile = %profile.name,
            changes = profile.changes.len(),
            "saved profile"
        );
        Ok(())
    }
}

fn validate_profile_name(name: &str) -> Result<(), CoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CoreError::new(
            CoreErrorCode::InvalidEnum,
            format!("invalid profile name '{name}'; use letters, digits, '_' or '-'"),
        ))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let text = fs::read_to_string(path).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("failed to read {}: {e}", path.display()),
        )
    })?;
    serde_json::from_str(&text).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Serialization,
            format!("failed to decode {}: {e}", path.display()),
        )
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Serialization,
            format!("failed to encode {}: {e}", path.display()),
        )
    })?;
    write_atomically(path, text.as_bytes())
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    let io_error = |action: &str, target: &Path, e: std::io::Error| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("failed to {action} {}: {e}", target.display()),
        )
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error("create", parent, e))?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    fs::write(&temp, bytes).map_err(|e| io_error("write", &temp, e))?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        io_error("replace", path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values_parse_with_defaults() {
        let text = "# profile\n\
                    DownloadDirectory: C:\\Users\\me\\Downloads\n\
                    PathOfExileDirectory: C:\\Users\\me\\Documents\\My Games\\Path of Exile\n\
                    DownloadedLootFilterFilename: NeverSink.filter\n";
        let config = ProfileConfig::from_key_values(text).expect("failed to parse config");
        assert_eq!(config.downloaded_filter_filename, "NeverSink.filter");
        assert_eq!(config.output_filter_filename, DEFAULT_OUTPUT_FILTER_FILENAME);
        assert!(!config.remove_downloaded_filter);
        assert_eq!(
            config.download_directory,
            PathBuf::from("C:\\Users\\me\\Downloads")
        );
    }

    #[test]
    fn key_values_require_paths() {
        let err = ProfileConfig::from_key_values("DownloadDirectory: /tmp\n").unwrap_err();
        assert_eq!(err.code, CoreErrorCode::Parse);
        assert!(err.message.contains(KEY_POE_DIRECTORY));

        let err = ProfileConfig::from_key_values(
            "DownloadDirectory: a\nPathOfExileDirectory: b\nDownloadedLootFilterFilename: c\nRemoveDownloadedFilter: maybe\n",
        )
        .unwrap_err();
        assert_eq!(err.code, CoreErrorCode::Parse);
    }

    #[test]
    fn profile_names_reject_path_characters() {
        assert!(validate_profile_name("Main_2").is_ok());
        for bad in ["", "../x", "a b", "a/b"] {
            assert_eq!(
                validate_profile_name(bad).unwrap_err().code,
                CoreErrorCode::InvalidEnum
            );
        }
    }
}
