/// Result Locator & Parser
///
/// The analyzer writes its findings in one of several layouts depending on its
/// version and options. Each layout has a detector; detectors are tried in a
/// fixed order and the first one that recognises its layout wins:
///
/// 1. Archived overview: `results.zip` holding an `overview.json` manifest
/// 2. Per-pair files: `<tokenA>-<tokenB>.json` metric files, on disk under the
///    results directory, or inside the archive when the disk has none
/// 3. Flat manifest: `overview.json` directly in the results directory
///
/// Detectors only read, and archive entries are only decompressed when a
/// detector asks for them. A detector that finds its layout but cannot parse it
/// fails the run; it does not fall through to the next detector.

use crate::error::{Diagnostic, PipelineError};
use crate::workspace::TokenMap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const ARCHIVE_NAME: &str = "results.zip";
pub const OVERVIEW_NAME: &str = "overview.json";
pub const PAIR_SEPARATOR: char = '-';
pub const PAIR_EXTENSION: &str = "json";

/// One comparison as reported by the analyzer, before correlation
#[derive(Debug, Clone, PartialEq)]
pub struct RawComparisonRecord {
    pub token_a: String,
    pub token_b: String,
    /// Always within [0, 1]
    pub similarity_ratio: f64,
}

impl RawComparisonRecord {
    fn new(token_a: impl Into<String>, token_b: impl Into<String>, ratio: f64) -> Self {
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
            similarity_ratio: clamp_ratio(ratio),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    ArchivedOverview,
    PerPairFiles,
    FlatManifest,
}

#[derive(Debug)]
pub struct LocatedResults {
    pub shape: OutputShape,
    pub records: Vec<RawComparisonRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What a detector saw in the results directory
enum Detection {
    Found {
        records: Vec<RawComparisonRecord>,
        diagnostics: Vec<Diagnostic>,
    },
    NotThisShape,
}

/// Read-only view of one run's output handed to every detector
pub struct SearchScope<'a> {
    pub results_dir: &'a Path,
    pub tokens: &'a TokenMap,
}

impl SearchScope<'_> {
    /// Archive locations, in lookup order: inside the results directory, then
    /// the `<results_dir>.zip` sibling some analyzer versions write instead
    fn archive_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.results_dir.join(ARCHIVE_NAME),
            archive_sibling(self.results_dir),
        ]
    }

    fn archive(&self) -> Option<PathBuf> {
        self.archive_candidates().into_iter().find(|p| p.is_file())
    }
}

/// `<dir>.zip` next to `dir`
pub fn archive_sibling(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".zip");
    dir.with_file_name(name)
}

type Detector = fn(&SearchScope<'_>) -> Result<Detection, PipelineError>;

const DETECTORS: [(OutputShape, Detector); 3] = [
    (OutputShape::ArchivedOverview, detect_archived_overview),
    (OutputShape::PerPairFiles, detect_per_pair_files),
    (OutputShape::FlatManifest, detect_flat_manifest),
];

/// Run the detector chain over a results directory
pub fn locate(scope: &SearchScope<'_>) -> Result<LocatedResults, PipelineError> {
    for (shape, detect) in DETECTORS {
        match detect(scope)? {
            Detection::Found {
                records,
                diagnostics,
            } => {
                debug!(
                    shape = ?shape,
                    comparisons = records.len(),
                    results_dir = %scope.results_dir.display(),
                    "Located analyzer output"
                );
                return Ok(LocatedResults {
                    shape,
                    records,
                    diagnostics,
                });
            }
            Detection::NotThisShape => {
                debug!(shape = ?shape, "Output shape not present");
            }
        }
    }

    Err(PipelineError::ResultMissing {
        results_dir: scope.results_dir.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Overview {
    #[serde(rename = "topComparisons", alias = "top_comparisons")]
    top_comparisons: Vec<OverviewComparison>,
}

#[derive(Debug, Deserialize)]
struct OverviewComparison {
    #[serde(rename = "firstSubmission", alias = "first_submission")]
    first_submission: String,
    #[serde(rename = "secondSubmission", alias = "second_submission")]
    second_submission: String,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default)]
    similarities: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PairFile {
    Wrapped { similarities: HashMap<String, f64> },
    Bare(HashMap<String, f64>),
}

impl PairFile {
    fn metrics(&self) -> &HashMap<String, f64> {
        match self {
            PairFile::Wrapped { similarities } => similarities,
            PairFile::Bare(metrics) => metrics,
        }
    }
}

/// `MAX` when present and nonzero, otherwise `AVG`, otherwise 0
pub fn pick_metric(metrics: &HashMap<String, f64>) -> f64 {
    match metrics.get("MAX") {
        Some(max) if *max != 0.0 => *max,
        _ => metrics.get("AVG").copied().unwrap_or(0.0),
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

fn parse_overview(path: &Path, bytes: &[u8]) -> Result<Vec<RawComparisonRecord>, PipelineError> {
    let overview: Overview =
        serde_json::from_slice(bytes).map_err(|e| PipelineError::parse(path, e))?;

    overview
        .top_comparisons
        .into_iter()
        .map(|c| {
            let ratio = match (c.similarity, &c.similarities) {
                (Some(ratio), _) => ratio,
                (None, Some(metrics)) => pick_metric(metrics),
                (None, None) => {
                    return Err(PipelineError::parse(
                        path,
                        format!(
                            "comparison {} / {} has no similarity value",
                            c.first_submission, c.second_submission
                        ),
                    ))
                }
            };
            Ok(RawComparisonRecord::new(c.first_submission, c.second_submission, ratio))
        })
        .collect()
}

fn parse_pair_file(path: &Path, bytes: &[u8]) -> Result<f64, PipelineError> {
    let pair: PairFile = serde_json::from_slice(bytes).map_err(|e| PipelineError::parse(path, e))?;
    Ok(pick_metric(pair.metrics()))
}

/// Split `s3-s7.json` into its two tokens
pub fn split_pair_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name.strip_suffix(PAIR_EXTENSION)?.strip_suffix('.')?;
    let (a, b) = stem.split_once(PAIR_SEPARATOR)?;
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some((a, b))
}

fn read_file(path: &Path) -> Result<Vec<u8>, PipelineError> {
    fs::read(path).map_err(|e| PipelineError::parse(path, e))
}

/// An opened analyzer archive. Only the central directory is read on open;
/// entries are decompressed one at a time, on request.
struct Archive {
    path: PathBuf,
    zip: zip::ZipArchive<fs::File>,
}

impl Archive {
    fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = fs::File::open(path).map_err(|e| PipelineError::parse(path, e))?;
        let zip = zip::ZipArchive::new(file).map_err(|e| PipelineError::parse(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            zip,
        })
    }

    /// Names of file entries, directories excluded
    fn file_names(&self) -> Vec<String> {
        self.zip
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Shallowest entry whose last path segment is `file_name`
    fn find(&self, file_name: &str) -> Option<String> {
        self.file_names()
            .into_iter()
            .filter(|name| entry_file_name(name) == file_name)
            .min_by_key(|name| name.matches('/').count())
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>, PipelineError> {
        let entry_path = self.entry_path(name);
        let mut entry = self
            .zip
            .by_name(name)
            .map_err(|e| PipelineError::parse(&entry_path, e))?;
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| PipelineError::parse(&entry_path, e))?;
        Ok(contents)
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

fn entry_file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Pair records collected by the per-pair detector. Each unordered token pair
/// is kept once; later files for the same pair are ignored.
#[derive(Default)]
struct PairScan {
    records: Vec<RawComparisonRecord>,
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(String, String)>,
}

impl PairScan {
    /// Whether a pair file is worth reading. Unknown tokens are recorded as
    /// skipped; repeats of an already collected pair are dropped.
    fn admit(&mut self, tokens: &TokenMap, path: &Path, token_a: &str, token_b: &str) -> bool {
        let resolvable =
            token_a != token_b && tokens.contains_token(token_a) && tokens.contains_token(token_b);
        if !resolvable {
            warn!(path = %path.display(), "Skipping result file for unknown submissions");
            self.diagnostics.push(Diagnostic::SkippedPairFile {
                path: path.to_path_buf(),
            });
            return false;
        }

        let key = if token_a < token_b {
            (token_a.to_string(), token_b.to_string())
        } else {
            (token_b.to_string(), token_a.to_string())
        };
        if !self.seen.insert(key) {
            debug!(path = %path.display(), "Ignoring repeated result file for pair");
            return false;
        }
        true
    }

    fn push(&mut self, path: &Path, token_a: &str, token_b: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let ratio = parse_pair_file(path, bytes)?;
        self.records.push(RawComparisonRecord::new(token_a, token_b, ratio));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

fn detect_archived_overview(scope: &SearchScope<'_>) -> Result<Detection, PipelineError> {
    let Some(archive_path) = scope.archive() else {
        return Ok(Detection::NotThisShape);
    };

    let mut archive = Archive::open(&archive_path)?;
    let Some(name) = archive.find(OVERVIEW_NAME) else {
        return Ok(Detection::NotThisShape);
    };

    let bytes = archive.read(&name)?;
    let records = parse_overview(&archive.entry_path(&name), &bytes)?;
    Ok(Detection::Found {
        records,
        diagnostics: Vec::new(),
    })
}

/// On-disk pair files win. The archive is only consulted when the results
/// directory holds no pair file for a known pair.
fn detect_per_pair_files(scope: &SearchScope<'_>) -> Result<Detection, PipelineError> {
    let mut scan = PairScan::default();

    if scope.results_dir.is_dir() {
        for entry in WalkDir::new(scope.results_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| PipelineError::parse(scope.results_dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            let Some((token_a, token_b)) = split_pair_name(&file_name) else {
                continue;
            };
            if scan.admit(scope.tokens, entry.path(), token_a, token_b) {
                let bytes = read_file(entry.path())?;
                scan.push(entry.path(), token_a, token_b, &bytes)?;
            }
        }
    }

    if scan.records.is_empty() {
        if let Some(archive_path) = scope.archive() {
            let mut archive = Archive::open(&archive_path)?;
            for name in archive.file_names() {
                let Some((token_a, token_b)) = split_pair_name(entry_file_name(&name)) else {
                    continue;
                };
                let path = archive.entry_path(&name);
                if scan.admit(scope.tokens, &path, token_a, token_b) {
                    let bytes = archive.read(&name)?;
                    scan.push(&path, token_a, token_b, &bytes)?;
                }
            }
        }
    }

    if scan.records.is_empty() {
        Ok(Detection::NotThisShape)
    } else {
        Ok(Detection::Found {
            records: scan.records,
            diagnostics: scan.diagnostics,
        })
    }
}

fn detect_flat_manifest(scope: &SearchScope<'_>) -> Result<Detection, PipelineError> {
    let path = scope.results_dir.join(OVERVIEW_NAME);
    if !path.is_file() {
        return Ok(Detection::NotThisShape);
    }

    let bytes = read_file(&path)?;
    Ok(Detection::Found {
        records: parse_overview(&path, &bytes)?,
        diagnostics: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn tokens() -> TokenMap {
        TokenMap::from_ids([1, 2, 3])
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Stored (uncompressed) archive bytes, so payloads can be damaged in place
    fn stored_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Flip the first byte of `needle` so the entry fails its CRC check
    fn damage(bytes: &mut [u8], needle: &str) {
        let at = bytes
            .windows(needle.len())
            .position(|w| w == needle.as_bytes())
            .unwrap();
        bytes[at] ^= 0xFF;
    }

    const DAMAGED_SOURCE: &str = "class Main { int checksum_target = 1; }";

    const OVERVIEW: &str = r#"{
        "topComparisons": [
            { "firstSubmission": "s1", "secondSubmission": "s2", "similarity": 0.75 },
            { "firstSubmission": "s3", "secondSubmission": "s1", "similarity": 0.1 }
        ]
    }"#;

    #[test]
    fn test_pick_metric() {
        let metrics = |pairs: &[(&str, f64)]| -> HashMap<String, f64> {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };
        assert_eq!(pick_metric(&metrics(&[("MAX", 0.8), ("AVG", 0.5)])), 0.8);
        assert_eq!(pick_metric(&metrics(&[("MAX", 0.0), ("AVG", 0.5)])), 0.5);
        assert_eq!(pick_metric(&metrics(&[("AVG", 0.4)])), 0.4);
        assert_eq!(pick_metric(&metrics(&[("MIN", 0.9)])), 0.0);
    }

    #[test]
    fn test_split_pair_name() {
        assert_eq!(split_pair_name("s1-s2.json"), Some(("s1", "s2")));
        assert_eq!(split_pair_name("overview.json"), None);
        assert_eq!(split_pair_name("s1-s2.txt"), None);
        assert_eq!(split_pair_name("-s2.json"), None);
    }

    #[test]
    fn test_archive_sibling() {
        assert_eq!(
            archive_sibling(Path::new("/opt/jplag/results/run_x")),
            PathBuf::from("/opt/jplag/results/run_x.zip")
        );
    }

    #[test]
    fn test_archived_overview() {
        let dir = TempDir::new().unwrap();
        write_zip(&dir.path().join(ARCHIVE_NAME), &[("overview.json", OVERVIEW)]);
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::ArchivedOverview);
        assert_eq!(
            located.records,
            vec![
                RawComparisonRecord::new("s1", "s2", 0.75),
                RawComparisonRecord::new("s3", "s1", 0.1),
            ]
        );
    }

    #[test]
    fn test_sibling_archive_is_found() {
        let root = TempDir::new().unwrap();
        let results_dir = root.path().join("run_x");
        fs::create_dir(&results_dir).unwrap();
        write_zip(&archive_sibling(&results_dir), &[("overview.json", OVERVIEW)]);
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: &results_dir, tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::ArchivedOverview);
        assert_eq!(located.records.len(), 2);
    }

    #[test]
    fn test_snake_case_overview_with_metric_map() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(OVERVIEW_NAME),
            r#"{"top_comparisons":[{"first_submission":"s1","second_submission":"s2","similarities":{"AVG":0.3,"MAX":0.0}}]}"#,
        )
        .unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::FlatManifest);
        assert_eq!(located.records, vec![RawComparisonRecord::new("s1", "s2", 0.3)]);
    }

    #[test]
    fn test_per_pair_files_on_disk() {
        let dir = TempDir::new().unwrap();
        let comparisons = dir.path().join("comparisons");
        fs::create_dir(&comparisons).unwrap();
        fs::write(comparisons.join("s1-s2.json"), r#"{"similarities":{"MAX":0.9,"AVG":0.7}}"#).unwrap();
        fs::write(comparisons.join("s2-s3.json"), r#"{"AVG":0.45}"#).unwrap();
        fs::write(comparisons.join("s1-s99.json"), r#"{"similarities":{"MAX":1.0}}"#).unwrap();
        fs::write(dir.path().join("submissionFileIndex.json"), "{}").unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::PerPairFiles);
        assert_eq!(
            located.records,
            vec![
                RawComparisonRecord::new("s1", "s2", 0.9),
                RawComparisonRecord::new("s2", "s3", 0.45),
            ]
        );
        assert_eq!(
            located.diagnostics,
            vec![Diagnostic::SkippedPairFile { path: comparisons.join("s1-s99.json") }]
        );
    }

    #[test]
    fn test_per_pair_files_inside_archive_without_overview() {
        let dir = TempDir::new().unwrap();
        write_zip(
            &dir.path().join(ARCHIVE_NAME),
            &[
                ("comparisons/s1-s3.json", r#"{"similarities":{"MAX":0.6}}"#),
                ("options.json", "{}"),
            ],
        );
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::PerPairFiles);
        assert_eq!(located.records, vec![RawComparisonRecord::new("s1", "s3", 0.6)]);
    }

    #[test]
    fn test_disk_pair_files_shadow_archived_copies() {
        let dir = TempDir::new().unwrap();
        write_zip(
            &dir.path().join(ARCHIVE_NAME),
            &[
                ("s1-s2.json", r#"{"similarities":{"MAX":0.2}}"#),
                ("s2-s3.json", r#"{"similarities":{"MAX":0.4}}"#),
            ],
        );
        fs::write(dir.path().join("s1-s2.json"), r#"{"similarities":{"MAX":0.8}}"#).unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::PerPairFiles);
        assert_eq!(located.records, vec![RawComparisonRecord::new("s1", "s2", 0.8)]);
    }

    #[test]
    fn test_reversed_pair_files_are_collapsed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("s1-s2.json"), r#"{"MAX":0.7}"#).unwrap();
        fs::write(dir.path().join("s2-s1.json"), r#"{"MAX":0.7}"#).unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.records, vec![RawComparisonRecord::new("s1", "s2", 0.7)]);
    }

    #[test]
    fn test_damaged_unrelated_entry_does_not_block_overview() {
        let dir = TempDir::new().unwrap();
        let mut bytes = stored_zip(&[
            ("files/s1/solution.java", DAMAGED_SOURCE),
            ("overview.json", OVERVIEW),
        ]);
        damage(&mut bytes, DAMAGED_SOURCE);
        fs::write(dir.path().join(ARCHIVE_NAME), bytes).unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::ArchivedOverview);
        assert_eq!(located.records.len(), 2);
    }

    #[test]
    fn test_damaged_unrelated_entry_does_not_block_pair_files() {
        let dir = TempDir::new().unwrap();
        let mut bytes = stored_zip(&[
            ("files/s1/solution.java", DAMAGED_SOURCE),
            ("comparisons/s1-s2.json", r#"{"similarities":{"MAX":0.5}}"#),
        ]);
        damage(&mut bytes, DAMAGED_SOURCE);
        fs::write(dir.path().join(ARCHIVE_NAME), bytes).unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::PerPairFiles);
        assert_eq!(located.records, vec![RawComparisonRecord::new("s1", "s2", 0.5)]);
    }

    #[test]
    fn test_damaged_overview_entry_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let mut bytes = stored_zip(&[("overview.json", OVERVIEW)]);
        damage(&mut bytes, "topComparisons");
        fs::write(dir.path().join(ARCHIVE_NAME), bytes).unwrap();
        let tokens = tokens();

        let err = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn test_archive_takes_precedence_over_flat_manifest() {
        let dir = TempDir::new().unwrap();
        write_zip(&dir.path().join(ARCHIVE_NAME), &[("overview.json", OVERVIEW)]);
        fs::write(dir.path().join(OVERVIEW_NAME), r#"{"topComparisons":[]}"#).unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.shape, OutputShape::ArchivedOverview);
        assert_eq!(located.records.len(), 2);
    }

    #[test]
    fn test_ratios_are_clamped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(OVERVIEW_NAME),
            r#"{"topComparisons":[
                {"firstSubmission":"s1","secondSubmission":"s2","similarity":1.0000001},
                {"firstSubmission":"s2","secondSubmission":"s3","similarity":-0.01}
            ]}"#,
        )
        .unwrap();
        let tokens = tokens();

        let located = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap();
        assert_eq!(located.records[0].similarity_ratio, 1.0);
        assert_eq!(located.records[1].similarity_ratio, 0.0);
    }

    #[test]
    fn test_empty_results_dir_is_missing() {
        let dir = TempDir::new().unwrap();
        let tokens = tokens();
        let err = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap_err();
        assert!(matches!(err, PipelineError::ResultMissing { .. }));
    }

    #[test]
    fn test_corrupt_archive_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ARCHIVE_NAME), b"definitely not a zip").unwrap();
        let tokens = tokens();
        let err = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn test_malformed_manifest_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OVERVIEW_NAME), r#"{"topComparisons": "nope"}"#).unwrap();
        let tokens = tokens();
        let err = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn test_malformed_pair_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("s1-s2.json"), r#"["MAX", 0.5]"#).unwrap();
        let tokens = tokens();
        let err = locate(&SearchScope { results_dir: dir.path(), tokens: &tokens }).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
