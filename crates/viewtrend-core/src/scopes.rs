use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_SCOPE_LIMIT: u32 = 50;
const MAX_SCOPE_LIMIT: u32 = 200;

fn default_limit() -> u32 {
    DEFAULT_SCOPE_LIMIT
}

/// One ingestion scope: a named partition polled as a single batch.
///
/// `regions` are ISO 3166-1 alpha-2 codes. When `keyword` is set the scope is
/// filled from keyword search instead of the trending chart, optionally
/// restricted to videos published in the last `published_within_days`.
/// `shorts` narrows results to short-form (`true`) or long-form (`false`)
/// videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub name: String,
    pub regions: Vec<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub shorts: Option<bool>,
    #[serde(default)]
    pub published_within_days: Option<u32>,
}

impl ScopeConfig {
    /// A trending-chart scope for a single region, named after the region.
    #[must_use]
    pub fn single_region(region: &str) -> Self {
        let region = region.trim().to_uppercase();
        Self {
            name: region.clone(),
            regions: vec![region],
            keyword: None,
            limit: DEFAULT_SCOPE_LIMIT,
            shorts: None,
            published_within_days: None,
        }
    }

    /// The search keyword, if any, with surrounding whitespace removed.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScopesFile {
    pub scopes: Vec<ScopeConfig>,
}

impl ScopesFile {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ScopeConfig> {
        self.scopes.iter().find(|s| s.name == name)
    }
}

/// Load and validate the scope definitions from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_scopes(path: &Path) -> Result<ScopesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ScopesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_scopes(&content)
}

/// Parse and validate scope definitions from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_scopes(content: &str) -> Result<ScopesFile, ConfigError> {
    let mut scopes_file: ScopesFile =
        serde_yaml::from_str(content).map_err(ConfigError::ScopesFileParse)?;

    for scope in &mut scopes_file.scopes {
        scope.name = scope.name.trim().to_string();
        for region in &mut scope.regions {
            *region = region.trim().to_uppercase();
        }
    }

    validate_scopes(&scopes_file)?;

    Ok(scopes_file)
}

fn validate_scopes(scopes_file: &ScopesFile) -> Result<(), ConfigError> {
    if scopes_file.scopes.is_empty() {
        return Err(ConfigError::Validation(
            "at least one scope must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();

    for scope in &scopes_file.scopes {
        validate_scope(scope)?;

        if !seen.insert(scope.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate scope name: '{}'",
                scope.name
            )));
        }
    }

    Ok(())
}

/// Check one scope definition on its own. Used for the scopes file and for
/// ad-hoc scopes built from live queries.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] naming the first problem found.
pub fn validate_scope(scope: &ScopeConfig) -> Result<(), ConfigError> {
    if scope.name.is_empty() {
        return Err(ConfigError::Validation(
            "scope name must be non-empty".to_string(),
        ));
    }

    if scope.regions.is_empty() {
        return Err(ConfigError::Validation(format!(
            "scope '{}' must list at least one region",
            scope.name
        )));
    }

    if let Some(bad) = scope
        .regions
        .iter()
        .find(|r| r.len() != 2 || !r.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(ConfigError::Validation(format!(
            "scope '{}' has invalid region code '{bad}'",
            scope.name
        )));
    }

    if !(1..=MAX_SCOPE_LIMIT).contains(&scope.limit) {
        return Err(ConfigError::Validation(format!(
            "scope '{}' has invalid limit {}; must be 1..={MAX_SCOPE_LIMIT}",
            scope.name, scope.limit
        )));
    }

    match scope.published_within_days {
        Some(0) => {
            return Err(ConfigError::Validation(format!(
                "scope '{}' has published_within_days 0; omit it to search all dates",
                scope.name
            )));
        }
        Some(_) if scope.keyword().is_none() => {
            return Err(ConfigError::Validation(format!(
                "scope '{}' sets published_within_days without a keyword",
                scope.name
            )));
        }
        _ => {}
    }

    Ok(())
}
