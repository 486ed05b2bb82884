// Query expansion
// Pulls error-specific cues out of raw error logs and tracebacks so both
// the lexical and vector searches see the identifiers that matter.

#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::text::preprocess_code;
use crate::walker::CODE_EXTENSIONS;

/// Error-message shapes whose first capture group is a cue. One capture per
/// pattern.
static ERROR_MESSAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)error:?\s+([^:]+)").expect("valid regex"),
        Regex::new(r"(?i)exception:?\s+([^:]+)").expect("valid regex"),
        Regex::new(r"(?i)failed:?\s+([^:]+)").expect("valid regex"),
        Regex::new(r"(?i)cannot\s+([^:]+)").expect("valid regex"),
        Regex::new(r"(?i)undefined\s+([^:]+)").expect("valid regex"),
        Regex::new(r"(?i)null\s+([^:]+)").expect("valid regex"),
    ]
});

/// Function-like names in stack frames: `at foo.bar `.
static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at\s+([\w$.]+)\s").expect("valid regex"));

/// Filenames carrying a recognized source extension.
static SOURCE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    let extensions = CODE_EXTENSIONS.join("|");
    Regex::new(&format!(r"([\w./\\-]+\.(?:{extensions}))\b")).expect("valid regex")
});

/// Call expressions: `identifier(...)`.
static CALL_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_]+)\(.*\)").expect("valid regex"));

/// Import targets: `import X` and `require('X')`.
static IMPORT_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"import\s+([A-Za-z0-9_{}]+)").expect("valid regex"));
static REQUIRE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(['"](.*)['"]\)"#).expect("valid regex"));

/// Expand a raw query with the cues found in it, then run the result
/// through the code preprocessor.
#[inline]
pub fn expand_error_query(query: &str) -> String {
    let mut cues: Vec<String> = Vec::new();

    for pattern in ERROR_MESSAGE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(query)
            && let Some(cue) = captures.get(1)
        {
            cues.push(cue.as_str().trim().to_string());
        }
    }

    for pattern in [&*STACK_FRAME, &*CALL_EXPRESSION, &*IMPORT_TARGET, &*REQUIRE_TARGET] {
        for captures in pattern.captures_iter(query) {
            if let Some(cue) = captures.get(1) {
                cues.push(cue.as_str().trim().to_string());
            }
        }
    }

    cues.extend(query_filenames(query));
    cues.retain(|cue| !cue.is_empty());

    let expanded = if cues.is_empty() {
        query.to_string()
    } else {
        debug!("Expanded query with {} cues", cues.len());
        format!("{} {}", query, cues.join(" "))
    };

    preprocess_code(&expanded)
}

/// Filenames with a recognized source extension mentioned in the query.
#[inline]
pub fn query_filenames(query: &str) -> Vec<String> {
    SOURCE_FILENAME
        .captures_iter(query)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Basenames of the filenames mentioned in the query.
#[inline]
pub fn query_file_basenames(query: &str) -> Vec<String> {
    query_filenames(query)
        .into_iter()
        .map(|path| {
            path.rsplit(['/', '\\'])
                .next()
                .unwrap_or(path.as_str())
                .to_string()
        })
        .collect()
}
