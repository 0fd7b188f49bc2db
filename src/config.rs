use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::ViewLocation;
use crate::service::{SearchParams, DEFAULT_PER_PAGE};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const PREFERENCES_FILE: &str = "preferences.json";
const LOG_FILE: &str = "contribview.log";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "contribview",
    version,
    about = "Browse contributions from a listing API in the terminal",
    long_about = "Browse contributions from a listing API in the terminal.\n\n\
                  Examples:\n  \
                  contribview\n  \
                  contribview --api-url http://localhost:8000 --title news\n  \
                  contribview --location 'page=3&owner=BBC'\n\n\
                  The current location is printed on exit so the same view can be reopened."
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_API_URL,
        help = "Base URL of the listing API."
    )]
    pub api_url: String,

    #[arg(
        long,
        value_name = "QUERY",
        help = "Open a saved location, e.g. 'page=2&title=news'."
    )]
    pub location: Option<String>,

    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Start on this page (overrides --location)."
    )]
    pub page: Option<u32>,

    #[arg(long, value_name = "TEXT", help = "Title filter (overrides --location).")]
    pub title: Option<String>,

    #[arg(long, value_name = "TEXT", help = "Owner filter (overrides --location).")]
    pub owner: Option<String>,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_PER_PAGE,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Contributions per page."
    )]
    pub per_page: u32,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Request timeout in seconds."
    )]
    pub timeout: u64,

    #[arg(long, value_name = "DIR", help = "Directory holding preferences.json.")]
    pub config_dir: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Write diagnostics to this file.")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn initial_location(&self) -> ViewLocation {
        let base = self
            .location
            .as_deref()
            .map(ViewLocation::parse)
            .unwrap_or_default();
        let title = self.title.as_deref().unwrap_or(&base.search.title);
        let owner = self.owner.as_deref().unwrap_or(&base.search.owner);
        ViewLocation::new(
            self.page.unwrap_or(base.page),
            SearchParams::new(title, owner),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a home directory")]
    NoHome,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid preferences in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where preferences and diagnostics live on disk.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppDirs {
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let project = ProjectDirs::from("", "", "contribview");
        let config_dir = match (&cli.config_dir, &project) {
            (Some(dir), _) => dir.clone(),
            (None, Some(p)) => p.config_dir().to_path_buf(),
            (None, None) => return Err(ConfigError::NoHome),
        };
        let data_dir = match &project {
            Some(p) => p.data_dir().to_path_buf(),
            None => config_dir.clone(),
        };
        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn log_path(&self, cli: &Cli) -> PathBuf {
        cli.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(LOG_FILE))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.config_dir.join(PREFERENCES_FILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn is_dark(&self) -> bool {
        *self == Theme::Dark
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Stored choice first, then the terminal's background hint, then light.
    pub fn initial(prefs: &Preferences, colorfgbg: Option<&str>) -> Self {
        match prefs.dark_mode {
            Some(true) => Theme::Dark,
            Some(false) => Theme::Light,
            None if terminal_prefers_dark(colorfgbg) => Theme::Dark,
            None => Theme::Light,
        }
    }
}

/// `COLORFGBG` is `fg;bg` (sometimes `fg;default;bg`); ANSI 0-6 and 8 are dark backgrounds.
fn terminal_prefers_dark(colorfgbg: Option<&str>) -> bool {
    colorfgbg
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .is_some_and(|bg| bg <= 6 || bg == 8)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
}

pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means defaults.
    pub fn load(&self) -> Result<Preferences, ConfigError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Preferences::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })
    }

    /// Like `load`, but a broken file is logged and treated as defaults.
    pub fn load_or_default(&self) -> Preferences {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable preferences");
            Preferences::default()
        })
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(prefs).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(io_err)
    }

    pub fn save_theme(&self, theme: Theme) -> Result<(), ConfigError> {
        let mut prefs = self.load_or_default();
        prefs.dark_mode = Some(theme.is_dark());
        self.save(&prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["contribview"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    // CLI

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.api_url, DEFAULT_API_URL);
        assert_eq!(cli.per_page, 14);
        assert_eq!(cli.request_timeout(), Duration::from_secs(10));
        assert_eq!(cli.initial_location(), ViewLocation::default());
    }

    #[test]
    fn test_cli_location_with_overrides() {
        let cli = parse(&["--location", "page=4&title=news&owner=BBC", "--owner", "ITV"]);
        let loc = cli.initial_location();
        assert_eq!(loc.page, 4);
        assert_eq!(loc.search.title, "news");
        assert_eq!(loc.search.owner, "ITV");
    }

    #[test]
    fn test_cli_page_override() {
        let cli = parse(&["--location", "page=4", "--page", "2"]);
        assert_eq!(cli.initial_location().page, 2);
    }

    #[test]
    fn test_cli_rejects_zero_page_and_per_page() {
        assert!(Cli::try_parse_from(["contribview", "--page", "0"]).is_err());
        assert!(Cli::try_parse_from(["contribview", "--per-page", "0"]).is_err());
    }

    // Theme

    #[test]
    fn test_theme_prefers_stored_choice() {
        let prefs = Preferences {
            dark_mode: Some(false),
        };
        assert_eq!(Theme::initial(&prefs, Some("15;0")), Theme::Light);
        let prefs = Preferences {
            dark_mode: Some(true),
        };
        assert_eq!(Theme::initial(&prefs, None), Theme::Dark);
    }

    #[test]
    fn test_theme_falls_back_to_terminal_hint() {
        let prefs = Preferences::default();
        assert_eq!(Theme::initial(&prefs, Some("15;0")), Theme::Dark);
        assert_eq!(Theme::initial(&prefs, Some("15;default;8")), Theme::Dark);
        assert_eq!(Theme::initial(&prefs, Some("0;15")), Theme::Light);
        assert_eq!(Theme::initial(&prefs, Some("garbage")), Theme::Light);
        assert_eq!(Theme::initial(&prefs, None), Theme::Light);
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled().label(), "light");
    }

    // Preference store

    #[test]
    fn test_missing_preferences_are_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("preferences.json"));
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_save_theme_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("nested").join("preferences.json"));
        store.save_theme(Theme::Dark).unwrap();
        assert_eq!(store.load().unwrap().dark_mode, Some(true));
        store.save_theme(Theme::Light).unwrap();
        assert_eq!(store.load().unwrap().dark_mode, Some(false));

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"darkMode\": false"));
    }

    #[test]
    fn test_corrupt_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{not json").unwrap();
        let store = PreferenceStore::new(&path);
        assert!(matches!(store.load(), Err(ConfigError::Invalid { .. })));
        assert_eq!(store.load_or_default(), Preferences::default());
    }

    #[test]
    fn test_dirs_honor_config_override() {
        let cli = parse(&["--config-dir", "/tmp/cv", "--log-file", "/tmp/cv.log"]);
        let dirs = AppDirs::resolve(&cli).unwrap();
        assert_eq!(dirs.preferences_path(), PathBuf::from("/tmp/cv/preferences.json"));
        assert_eq!(dirs.log_path(&cli), PathBuf::from("/tmp/cv.log"));
    }
}
