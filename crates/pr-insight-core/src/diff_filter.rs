//! Generated-file filtering for unified diffs.
//!
//! A diff is split into per-file blocks at every line-leading `diff --git `
//! marker. Blocks whose post-change path names a generated or binary asset are
//! dropped; the rest are kept byte-for-byte in their original order. Blocks
//! whose header cannot be parsed are dropped too and counted separately.
//!
//! Filtering is pure and idempotent: filtering an already filtered diff
//! returns it unchanged.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use tracing::debug;

use crate::error::ValidationError;

/// Marker opening each file's segment of a unified diff.
pub const DIFF_DELIMITER: &str = "diff --git ";

/// Returned in place of the diff when every block was excluded.
pub const NO_SUBSTANTIVE_CHANGES: &str = "No non-generated file changes found.";

/// Header form `a/<old> b/<new>`; the second capture is the post-change path.
static HEADER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^a/(.+?) b/(.+)$").expect("Invalid diff header regex"));

/// File-name patterns for lockfiles, minified bundles, IDE state, 3D assets
/// and images.
const DEFAULT_PATTERNS: &[&str] = &[
    r"^package\.json$",
    r"^package-lock\.json$",
    r"^yarn\.lock$",
    r"(?i)\.min\.js$",
    r"(?i)\.min\.css$",
    r"(?i)\.rcuserdata$",
    r"(?i)\.xcuserstate$",
    r"(?i)\.(usdz|usda|usdc)$",
    r"(?i)\.drawing$",
    r"(?i)\.(png|jpg|jpeg|gif|svg|bmp|ico|tiff|webp)$",
];

static DEFAULT_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(DEFAULT_PATTERNS).expect("Invalid default generated-file patterns")
});

// ============================================================================
// Blocks
// ============================================================================

/// One file's segment of a unified diff, starting at its `diff --git ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock<'a> {
    raw: &'a str,
    path: Option<String>,
}

impl<'a> DiffBlock<'a> {
    fn new(raw: &'a str) -> Self {
        let header = raw
            .strip_prefix(DIFF_DELIMITER)
            .unwrap_or(raw)
            .lines()
            .next()
            .unwrap_or_default();

        let path = HEADER_PATH
            .captures(header)
            .and_then(|captures| captures.get(2))
            .map(|m| m.as_str().to_string());

        Self { raw, path }
    }

    /// The block text, delimiter included, exactly as it appeared.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Post-change path, if the header could be parsed.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Split a unified diff into per-file blocks.
///
/// Only delimiters at the start of a line open a block. Text before the first
/// delimiter is discarded.
pub fn split_blocks(diff: &str) -> Vec<DiffBlock<'_>> {
    let mut starts: Vec<usize> = diff
        .match_indices(DIFF_DELIMITER)
        .map(|(index, _)| index)
        .filter(|&index| index == 0 || diff.as_bytes()[index - 1] == b'\n')
        .collect();

    starts.push(diff.len());

    starts
        .windows(2)
        .map(|bounds| DiffBlock::new(&diff[bounds[0]..bounds[1]]))
        .collect()
}

// ============================================================================
// Patterns
// ============================================================================

/// Classifies file paths as generated or binary.
///
/// The built-in patterns match the file name. Additional patterns supplied by
/// configuration match the full post-change path.
#[derive(Debug, Clone, Default)]
pub struct GeneratedFilePatterns {
    additional: Option<RegexSet>,
}

impl GeneratedFilePatterns {
    /// Built-in patterns plus extra path regexes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` if any pattern fails to compile.
    pub fn with_additional<I, S>(patterns: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();

        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let set = RegexSet::new(&patterns).map_err(|e| ValidationError::InvalidFormat {
            field: "analysis.extra_excluded_patterns".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            additional: Some(set),
        })
    }

    /// Whether `path` names a generated or binary file.
    pub fn is_generated(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);

        DEFAULT_SET.is_match(file_name)
            || self
                .additional
                .as_ref()
                .is_some_and(|set| set.is_match(path))
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Result of filtering one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredDiff {
    text: String,
    kept_files: Vec<String>,
    excluded_files: Vec<String>,
    unclassified_blocks: usize,
}

impl FilteredDiff {
    /// The filtered diff, or [`NO_SUBSTANTIVE_CHANGES`] if nothing survived.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Whether every block was excluded.
    pub fn is_empty(&self) -> bool {
        self.kept_files.is_empty()
    }

    pub fn kept_files(&self) -> &[String] {
        &self.kept_files
    }

    pub fn excluded_files(&self) -> &[String] {
        &self.excluded_files
    }

    /// Blocks dropped because their header had no parseable path.
    pub fn unclassified_blocks(&self) -> usize {
        self.unclassified_blocks
    }
}

/// Removes generated-file blocks from unified diffs.
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    patterns: GeneratedFilePatterns,
}

impl DiffFilter {
    pub fn new(patterns: GeneratedFilePatterns) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &GeneratedFilePatterns {
        &self.patterns
    }

    /// Filter a unified diff.
    pub fn filter(&self, diff: &str) -> FilteredDiff {
        let mut text = String::with_capacity(diff.len());
        let mut kept_files = Vec::new();
        let mut excluded_files = Vec::new();
        let mut unclassified_blocks = 0;

        for block in split_blocks(diff) {
            match block.path() {
                None => unclassified_blocks += 1,
                Some(path) if self.patterns.is_generated(path) => {
                    excluded_files.push(path.to_string())
                }
                Some(path) => {
                    kept_files.push(path.to_string());
                    text.push_str(block.raw());
                }
            }
        }

        if unclassified_blocks > 0 {
            debug!(
                unclassified_blocks,
                "Dropped diff blocks with unparseable headers"
            );
        }

        if kept_files.is_empty() {
            text = NO_SUBSTANTIVE_CHANGES.to_string();
        }

        FilteredDiff {
            text,
            kept_files,
            excluded_files,
            unclassified_blocks,
        }
    }
}

/// Filter a diff with the built-in patterns only.
pub fn filter_generated_changes(diff: &str) -> String {
    DiffFilter::default().filter(diff).into_string()
}

#[cfg(test)]
#[path = "diff_filter_tests.rs"]
mod tests;
