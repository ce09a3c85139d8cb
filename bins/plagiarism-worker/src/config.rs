// Language tables for the plagiarism worker
use anyhow::{bail, Context, Result};
use plagiarism_common::types::LanguageId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageMapping {
    pub language_id: LanguageId,
    #[serde(default)]
    pub name: String,
    pub analyzer_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageMapping>,
    /// analyzer code -> file extension (with leading dot)
    extensions: BTreeMap<String, String>,
}

/// Analyzer-facing language resolved from a judge language id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerLanguage {
    pub code: String,
    pub extension: String,
}

/// Validated `languageId -> analyzer code -> extension` tables
#[derive(Debug, Clone)]
pub struct LanguageTable {
    by_id: HashMap<LanguageId, AnalyzerLanguage>,
}

impl LanguageTable {
    /// Load and validate the tables from a languages.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Invalid language config {}", config_path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse language tables")?;

        Self::from_tables(languages_json.languages, languages_json.extensions)
    }

    fn from_tables(
        languages: Vec<LanguageMapping>,
        extensions: BTreeMap<String, String>,
    ) -> Result<Self> {
        for (code, ext) in &extensions {
            if code.trim().is_empty() {
                bail!("Empty analyzer code in extension table");
            }
            if !ext.starts_with('.') || ext.len() < 2 {
                bail!("Extension for '{}' must start with '.', got '{}'", code, ext);
            }
        }

        let mut by_id = HashMap::new();
        for mapping in languages {
            if mapping.analyzer_code.trim().is_empty() {
                bail!("Language {} has an empty analyzer code", mapping.language_id);
            }
            let Some(extension) = extensions.get(&mapping.analyzer_code) else {
                bail!(
                    "Analyzer code '{}' (language {}) has no file extension",
                    mapping.analyzer_code,
                    mapping.language_id
                );
            };
            let resolved = AnalyzerLanguage {
                code: mapping.analyzer_code.clone(),
                extension: extension.clone(),
            };
            if by_id.insert(mapping.language_id, resolved).is_some() {
                bail!("Language id {} is configured twice", mapping.language_id);
            }
        }

        if by_id.is_empty() {
            bail!("No languages configured");
        }

        Ok(Self { by_id })
    }

    /// Built-in tables, used when no languages.json is deployed
    pub fn builtin() -> Self {
        const BUILTIN: [(LanguageId, &str, &str); 8] = [
            (62, "java", ".java"),
            (71, "python3", ".py"),
            (48, "c", ".c"),
            (52, "cpp", ".cpp"),
            (53, "cpp", ".cpp"),
            (54, "cpp", ".cpp"),
            (63, "javascript", ".js"),
            (60, "go", ".go"),
        ];

        let by_id = BUILTIN
            .iter()
            .map(|(id, code, ext)| {
                (
                    *id,
                    AnalyzerLanguage {
                        code: code.to_string(),
                        extension: ext.to_string(),
                    },
                )
            })
            .collect();
        Self { by_id }
    }

    /// Load from PLAGIARISM_LANGUAGES (or config/languages.json), falling back
    /// to the built-in tables when the file does not exist
    pub fn load_default() -> Result<Self> {
        let path = std::env::var("PLAGIARISM_LANGUAGES")
            .unwrap_or_else(|_| DEFAULT_LANGUAGES_PATH.to_string());
        let path = Path::new(&path);

        if !path.exists() {
            warn!(path = %path.display(), "Language config not found, using built-in tables");
            return Ok(Self::builtin());
        }
        Self::load(path)
    }

    /// Resolve a judge language id. None means plagiarism checks are not
    /// supported for that language.
    pub fn lookup(&self, language_id: LanguageId) -> Option<&AnalyzerLanguage> {
        self.by_id.get(&language_id)
    }

    pub fn is_supported(&self, language_id: LanguageId) -> bool {
        self.by_id.contains_key(&language_id)
    }

    /// Supported language ids in ascending order
    pub fn language_ids(&self) -> Vec<LanguageId> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
