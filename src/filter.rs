//! Include/exclude filtering of listed file names.

use globset::{GlobBuilder, GlobMatcher};
use tracing::info;

use crate::error::{GuerreroError, Result};

/// Matching options shared by all patterns of a filter.
#[derive(Debug, Clone, Copy)]
pub struct PatternOptions {
    /// Let wildcards match names starting with a dot.
    pub dot: bool,
    /// Match patterns without a `/` against the basename only.
    pub match_base: bool,
    pub case_sensitive: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            dot: true,
            match_base: true,
            case_sensitive: true,
        }
    }
}

/// A compiled glob that remembers its source text.
#[derive(Debug, Clone)]
struct Pattern {
    text: String,
    matcher: GlobMatcher,
    base_only: bool,
    dot: bool,
    names_hidden: bool,
}

impl Pattern {
    fn new(text: &str, options: PatternOptions) -> Result<Self> {
        let glob = GlobBuilder::new(text)
            .literal_separator(true)
            .case_insensitive(!options.case_sensitive)
            .backslash_escape(true)
            .build()
            .map_err(|e| GuerreroError::Pattern {
                pattern: text.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            text: text.to_string(),
            matcher: glob.compile_matcher(),
            base_only: options.match_base && !text.contains('/'),
            dot: options.dot,
            names_hidden: text.split('/').any(|segment| segment.starts_with('.')),
        })
    }

    fn matches(&self, path: &str) -> bool {
        let candidate = if self.base_only {
            path.rsplit('/').next().unwrap_or(path)
        } else {
            path
        };

        // Without `dot`, hidden entries only match patterns that name them explicitly.
        if !self.dot && !self.names_hidden && has_hidden_component(candidate) {
            return false;
        }

        self.matcher.is_match(candidate)
    }
}

fn has_hidden_component(path: &str) -> bool {
    path.split('/')
        .any(|segment| segment.starts_with('.') && segment != "." && segment != "..")
}

/// Why a file was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion<'a> {
    /// No include patterns exist.
    Default,
    Pattern(&'a str),
    /// Include patterns exist but none matched.
    None,
}

/// Decides which listed files are processed.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    verbose: bool,
}

impl PatternFilter {
    pub fn new<I, E>(include: I, exclude: E, options: PatternOptions) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let includes = include
            .into_iter()
            .map(|p| Pattern::new(p.as_ref(), options))
            .collect::<Result<Vec<_>>>()?;
        let excludes = exclude
            .into_iter()
            .map(|p| Pattern::new(p.as_ref(), options))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            includes,
            excludes,
            verbose: false,
        })
    }

    /// A filter that accepts everything.
    pub fn accept_all() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            verbose: false,
        }
    }

    /// Log the reason of every decision at info level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn accepts(&self, path: &str) -> bool {
        let included_by = self.included_by(path);
        let excluded_by = self.excluded_by(path);

        if self.verbose {
            log_decision(path, included_by, excluded_by);
        }

        included_by != Inclusion::None && excluded_by.is_none()
    }

    /// The first include pattern matching `path`, in list order.
    pub fn included_by(&self, path: &str) -> Inclusion<'_> {
        if self.includes.is_empty() {
            return Inclusion::Default;
        }

        first_match(&self.includes, path).map_or(Inclusion::None, Inclusion::Pattern)
    }

    /// The first exclude pattern matching `path`, in list order.
    pub fn excluded_by(&self, path: &str) -> Option<&str> {
        first_match(&self.excludes, path)
    }
}

fn first_match<'a>(patterns: &'a [Pattern], path: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|p| p.matches(path))
        .map(|p| p.text.as_str())
}

fn log_decision(path: &str, included_by: Inclusion<'_>, excluded_by: Option<&str>) {
    let include_msg = match included_by {
        Inclusion::Default => "included by default".to_string(),
        Inclusion::Pattern(p) => format!("included by pattern \"{}\"", p),
        Inclusion::None => "not included".to_string(),
    };
    let exclude_msg = match excluded_by {
        Some(p) => format!("but excluded by pattern \"{}\"", p),
        None => "and not excluded".to_string(),
    };

    info!("File \"{}\" was {} {}", path, include_msg, exclude_msg);
}
