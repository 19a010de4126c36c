//! persisted deployment configuration
//!
//! [DeploymentConfig] is the working state shared between invocations. It is stored as a flat json object in
//! `<home>/config.json`, where `<home>` is managed by [ConfigStore]:
//!
//! ```text
//! <home>/
//!   config.json                 current configuration
//!   configs/<name>.json         named snapshots (--save/--open)
//!   deployment_packages/<name>  package directory per function
//! ```
//!
//! Every field is either a non-empty string or unset (`null`). Empty strings are treated as unset wherever a value
//! enters the configuration.
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Default terraform document
pub const DEFAULT_TF_FILE: &str = crate::terraform::MAIN_FILE;

/// Environment variable overriding the store location
pub const HOME_ENV: &str = "MANIPLE_HOME";

const CONFIG_FILE: &str = "config.json";
const SAVED_CONFIGS_DIR: &str = "configs";
const DEPLOYMENT_PACKAGES_DIR: &str = "deployment_packages";

/// Names of the configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Package,
    Requirements,
    S3Bucket,
    S3Key,
    Script,
    TfFile,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Name,
        Field::Package,
        Field::Requirements,
        Field::S3Bucket,
        Field::S3Key,
        Field::Script,
        Field::TfFile,
    ];
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Name => f.write_str("name"),
            Field::Package => f.write_str("package"),
            Field::Requirements => f.write_str("requirements"),
            Field::S3Bucket => f.write_str("s3_bucket"),
            Field::S3Key => f.write_str("s3_key"),
            Field::Script => f.write_str("script"),
            Field::TfFile => f.write_str("tf_file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default, deserialize_with = "non_empty")]
    name: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    package: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    requirements: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    s3_bucket: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    s3_key: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    script: Option<String>,
    #[serde(default = "default_tf_file", deserialize_with = "tf_file_or_default")]
    tf_file: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            name: None,
            package: None,
            requirements: None,
            s3_bucket: None,
            s3_key: None,
            script: None,
            tf_file: default_tf_file(),
        }
    }
}

impl DeploymentConfig {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn requirements(&self) -> Option<&str> {
        self.requirements.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    pub fn s3_key(&self) -> Option<&str> {
        self.s3_key.as_deref()
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn tf_file(&self) -> &str {
        &self.tf_file
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => self.name(),
            Field::Package => self.package(),
            Field::Requirements => self.requirements(),
            Field::S3Bucket => self.s3_bucket(),
            Field::S3Key => self.s3_key(),
            Field::Script => self.script(),
            Field::TfFile => Some(self.tf_file()),
        }
    }

    /// Select a function by name
    ///
    /// Everything resolved for a previous function is dropped: `tf_file` goes back to its default and `package`
    /// becomes `<deployment_root>/<name>`. An empty name resets the whole configuration.
    pub fn set_name(&mut self, name: &str, deployment_root: &Path) {
        *self = Self::default();
        if name.is_empty() {
            return;
        }

        self.name = Some(name.to_string());
        self.package = Some(deployment_root.join(name).to_string_lossy().into_owned());
    }

    /// Adopt a name chosen while resolving an unnamed configuration, keeping explicit settings
    pub(crate) fn select_name(&mut self, name: &str) {
        self.name = non_empty_value(Some(name.to_string()));
    }

    pub fn set_requirements(&mut self, value: impl Into<Option<String>>) {
        self.requirements = non_empty_value(value.into());
    }

    pub fn set_s3_bucket(&mut self, value: impl Into<Option<String>>) {
        self.s3_bucket = non_empty_value(value.into());
    }

    pub fn set_s3_key(&mut self, value: impl Into<Option<String>>) {
        self.s3_key = non_empty_value(value.into());
    }

    pub fn set_script(&mut self, value: impl Into<Option<String>>) {
        self.script = non_empty_value(value.into());
    }

    pub fn set_tf_file(&mut self, value: impl Into<Option<String>>) {
        self.tf_file = non_empty_value(value.into()).unwrap_or_else(default_tf_file);
    }

    pub(crate) fn set_package(&mut self, value: impl Into<Option<String>>) {
        self.package = non_empty_value(value.into());
    }

    /// Unset fields in declaration order
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Replace every occurrence of `from` with `to` in all set fields
    pub fn replace(&mut self, from: &str, to: &str) {
        let rewrite = |value: &mut Option<String>| {
            *value = non_empty_value(value.take().map(|v| v.replace(from, to)));
        };

        rewrite(&mut self.name);
        rewrite(&mut self.package);
        rewrite(&mut self.requirements);
        rewrite(&mut self.s3_bucket);
        rewrite(&mut self.s3_key);
        rewrite(&mut self.script);

        let tf_file = self.tf_file.replace(from, to);
        self.set_tf_file(tf_file);
    }
}

fn default_tf_file() -> String {
    DEFAULT_TF_FILE.to_string()
}

fn non_empty_value(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_value(Option::<String>::deserialize(deserializer)?))
}

fn tf_file_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.unwrap_or_else(default_tf_file))
}

/// Location of the persisted configuration, saved snapshots and package directories
#[derive(derive_new::new, Debug, Clone)]
pub struct ConfigStore {
    home: PathBuf,
}

impl ConfigStore {
    /// `$MANIPLE_HOME`, falling back to `~/.maniple`
    pub fn from_env() -> Result<Self, StoreError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|home| !home.is_empty()) {
            return Ok(Self::new(home.into()));
        }

        let home = dirs::home_dir().ok_or(StoreError::NoHomeDirectory)?;
        Ok(Self::new(home.join(".maniple")))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn deployment_root(&self) -> PathBuf {
        self.home.join(DEPLOYMENT_PACKAGES_DIR)
    }

    /// Package directory for `name`, created if absent
    pub fn ensure_package_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        let package_dir = self.deployment_root().join(name);
        std::fs::create_dir_all(&package_dir)?;
        Ok(package_dir)
    }

    /// Current configuration
    ///
    /// A missing file yields the default configuration. A file that can not be parsed is reset.
    pub fn load(&self) -> Result<DeploymentConfig, StoreError> {
        let config_path = self.config_path();
        if !config_path.is_file() {
            tracing::debug!(path=%config_path.display(), "no config file, using defaults");
            return Ok(DeploymentConfig::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!(%err, path=%config_path.display(), "config may be corrupted, resetting");
                self.reset()
            }
        }
    }

    pub fn save(&self, config: &DeploymentConfig) -> Result<(), StoreError> {
        write_json(&self.config_path(), config)?;
        tracing::debug!(?config, "config saved");
        Ok(())
    }

    /// Persist and return the default configuration
    pub fn reset(&self) -> Result<DeploymentConfig, StoreError> {
        let config = DeploymentConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    /// Store `config` as named snapshot
    pub fn save_as(&self, name: &str, config: &DeploymentConfig) -> Result<(), StoreError> {
        write_json(&self.saved_path(name)?, config)
    }

    /// Make the named snapshot the current configuration
    pub fn open(&self, name: &str) -> Result<DeploymentConfig, StoreError> {
        let saved_path = self.saved_path(name)?;
        if !saved_path.is_file() {
            return Err(StoreError::SavedConfigNotFound(name.to_string()));
        }

        let config: DeploymentConfig = serde_json::from_str(&std::fs::read_to_string(saved_path)?)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Names of all saved snapshots, sorted
    pub fn list_saved(&self) -> Result<Vec<String>, StoreError> {
        let saved_dir = self.home.join(SAVED_CONFIGS_DIR);
        if !saved_dir.is_dir() {
            return Ok(vec![]);
        }

        let mut names = vec![];
        for dir_entry in std::fs::read_dir(saved_dir)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn saved_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let is_plain_name = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(|c: char| c == '/' || c == '\\');
        if !is_plain_name {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        Ok(self.home.join(SAVED_CONFIGS_DIR).join(format!("{name}.json")))
    }
}

fn write_json(path: &Path, config: &DeploymentConfig) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut contents = serde_json::to_string_pretty(config)?;
    contents.push('\n');
    std::fs::write(path, contents)?;
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Unable to determine home directory, set {HOME_ENV}")]
    NoHomeDirectory,
    #[error("No saved config named '{0}'")]
    SavedConfigNotFound(String),
    #[error("Invalid config name '{0}'")]
    InvalidName(String),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to read or write config json")]
    JsonFailed(#[from] serde_json::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete_config() -> DeploymentConfig {
        let mut config = DeploymentConfig::default();
        config.set_name("basic", Path::new("/packages"));
        config.set_requirements("/work/requirements.txt".to_string());
        config.set_s3_bucket("aws-lambda-project-code".to_string());
        config.set_s3_key("maniple/1.0.0/basic.zip".to_string());
        config.set_script("/work/basic.py".to_string());
        config.set_tf_file("infra.tf".to_string());
        config
    }

    #[test]
    fn set_name_resets_fields() {
        let mut config = complete_config();
        assert!(config.is_complete());

        config.set_name("other", Path::new("/packages"));

        assert_eq!(config.name(), Some("other"));
        assert_eq!(config.package(), Some("/packages/other"));
        assert_eq!(config.tf_file(), "main.tf");
        assert_eq!(
            config.missing_fields(),
            vec![Field::Requirements, Field::S3Bucket, Field::S3Key, Field::Script]
        );
    }

    #[test]
    fn empty_values_are_unset() {
        let mut config = complete_config();
        config.set_s3_bucket(String::new());
        config.set_script(None::<String>);
        config.set_tf_file(String::new());

        assert_eq!(config.s3_bucket(), None);
        assert_eq!(config.script(), None);
        assert_eq!(config.tf_file(), "main.tf");
    }

    #[test]
    fn json_shape() {
        let config: DeploymentConfig = serde_json::from_str(
            r#"{"name": "basic", "package": "", "requirements": null, "s3_bucket": "bucket"}"#,
        )
        .unwrap();

        assert_eq!(config.name(), Some("basic"));
        assert_eq!(config.package(), None);
        assert_eq!(config.s3_bucket(), Some("bucket"));
        assert_eq!(config.tf_file(), "main.tf");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "basic",
                "package": null,
                "requirements": null,
                "s3_bucket": "bucket",
                "s3_key": null,
                "script": null,
                "tf_file": "main.tf",
            })
        );
    }

    #[test]
    fn replace_in_all_fields() {
        let mut config = complete_config();
        config.replace("basic", "renamed");

        assert_eq!(config.name(), Some("renamed"));
        assert_eq!(config.package(), Some("/packages/renamed"));
        assert_eq!(config.s3_key(), Some("maniple/1.0.0/renamed.zip"));
        assert_eq!(config.script(), Some("/work/renamed.py"));
    }

    #[test]
    fn store_round_trip() {
        let home = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(home.path().to_path_buf());

        assert_eq!(store.load().unwrap(), DeploymentConfig::default());

        let config = complete_config();
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn corrupted_config_is_reset() {
        let home = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(home.path().to_path_buf());
        std::fs::write(store.config_path(), "{ not json").unwrap();

        assert_eq!(store.load().unwrap(), DeploymentConfig::default());
        assert!(serde_json::from_str::<DeploymentConfig>(
            &std::fs::read_to_string(store.config_path()).unwrap()
        )
        .is_ok());
    }

    #[test]
    fn saved_configs() {
        let home = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(home.path().to_path_buf());
        let config = complete_config();

        store.save_as("second", &DeploymentConfig::default()).unwrap();
        store.save_as("first", &config).unwrap();
        assert_eq!(store.list_saved().unwrap(), vec!["first", "second"]);

        assert_eq!(store.open("first").unwrap(), config);
        assert_eq!(store.load().unwrap(), config);

        assert!(matches!(
            store.open("missing"),
            Err(StoreError::SavedConfigNotFound(_))
        ));
        assert!(matches!(
            store.save_as("../escape", &config),
            Err(StoreError::InvalidName(_))
        ));
    }
}
