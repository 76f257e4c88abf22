use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const ENV_API_KEY: &str = "PASHUSEWA_FIREBASE_API_KEY";
const ENV_PROJECT_ID: &str = "PASHUSEWA_FIREBASE_PROJECT_ID";
const ENV_DATA_DIR: &str = "PASHUSEWA_DATA_DIR";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub firebase: Option<FirebaseSettings>,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseSettings {
    pub api_key: String,
    pub project_id: String,
    pub identity_base_url: String,
    pub firestore_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Directory holding `session_data.json`.
    pub data_dir: PathBuf,
    /// Persist the vet flag so restored sessions keep their role.
    pub persist_role: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Firebase not configured—add a `firebase` section to pashusewa.yaml.")]
    MissingFirebase,
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingFirebase => {
                "Sign-in is not configured—set the Firebase api key and project id in pashusewa.yaml."
                    .to_string()
            }
            Self::Invalid(detail) => format!("Configuration problem—{detail}. Update pashusewa.yaml."),
        }
    }
}

impl RuntimeSettings {
    /// Load `pashusewa.yaml` (if any) and apply environment overrides.
    ///
    /// A missing file is not an error; sessions still work locally and only a
    /// remote sign-in needs Firebase credentials.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let raw = match locate_config_file() {
            Some(path) => {
                let contents = fs::read_to_string(&path).map_err(|err| {
                    ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
                })?;
                parse_config(&contents)?
            }
            None => RawConfig::default(),
        };
        resolve_settings(raw, |key| std::env::var(key).ok())
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        resolve_settings(parse_config(contents)?, |_| None)
    }

    pub fn firebase(&self) -> Result<&FirebaseSettings, ConfigError> {
        self.firebase.as_ref().ok_or(ConfigError::MissingFirebase)
    }
}

fn parse_config(contents: &str) -> Result<RawConfig, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    serde_yaml::from_str(contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid pashusewa.yaml: {err}")))
}

fn resolve_settings<F>(raw: RawConfig, env: F) -> Result<RuntimeSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let section = raw.firebase.unwrap_or_default();
    let api_key = non_empty(env(ENV_API_KEY)).or_else(|| non_empty(section.api_key));
    let project_id = non_empty(env(ENV_PROJECT_ID)).or_else(|| non_empty(section.project_id));

    let firebase = match (api_key, project_id) {
        (Some(api_key), Some(project_id)) => Some(FirebaseSettings {
            api_key,
            project_id,
            identity_base_url: resolve_base_url(
                section.identity_base_url,
                DEFAULT_IDENTITY_BASE_URL,
            )?,
            firestore_base_url: resolve_base_url(
                section.firestore_base_url,
                DEFAULT_FIRESTORE_BASE_URL,
            )?,
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(ConfigError::Invalid(
                "missing Firebase project id".to_string(),
            ))
        }
        (None, Some(_)) => {
            return Err(ConfigError::Invalid("missing Firebase api key".to_string()))
        }
    };

    let session = raw.session.unwrap_or_default();
    let data_dir = non_empty(env(ENV_DATA_DIR))
        .map(PathBuf::from)
        .or(session.data_dir)
        .unwrap_or_else(default_data_dir);

    Ok(RuntimeSettings {
        firebase,
        session: SessionSettings {
            data_dir,
            persist_role: session.persist_role,
        },
    })
}

fn resolve_base_url(configured: Option<String>, default: &str) -> Result<String, ConfigError> {
    let Some(url) = non_empty(configured) else {
        return Ok(default.to_string());
    };
    url::Url::parse(&url)
        .map_err(|err| ConfigError::Invalid(format!("invalid base url {url}: {err}")))?;
    Ok(url.trim_end_matches('/').to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("org", "pashusewa", "PashuSewa")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".pashusewa"))
}

fn locate_config_file() -> Option<PathBuf> {
    config_candidates().into_iter().find(|path| path.exists())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("pashusewa.yaml")];
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("pashusewa");
        paths.push(config_dir.join("pashusewa.yaml"));
        paths.push(config_dir.join("pashusewa.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".pashusewa").join("pashusewa.yaml"));
        paths.push(home_dir.join(".pashusewa").join("pashusewa.yml"));
    }
    paths
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    firebase: Option<FirebaseSection>,
    session: Option<SessionSection>,
}

#[derive(Debug, Default, Deserialize)]
struct FirebaseSection {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    identity_base_url: Option<String>,
    #[serde(default)]
    firestore_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    persist_role: bool,
}
