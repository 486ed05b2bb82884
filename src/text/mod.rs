// Lexical analysis for source code
// Tokenization shared by the BM25 index and query handling, plus the
// comment-stripping preprocessor applied before index-time tokenization.


use std::collections::HashSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// English stopwords removed from token streams.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Punctuation and operator characters replaced with spaces before splitting.
const CODE_SPLIT_CHARS: &str = "{}()[];:,.-+*/%=<>!&|^~";

/// Options controlling [`tokenize`].
///
/// These ride inside the BM25 snapshot so a loaded index tokenizes queries
/// exactly the way its documents were tokenized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenizerOptions {
    pub lowercase: bool,
    pub code_split: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
}

impl Default for TokenizerOptions {
    #[inline]
    fn default() -> Self {
        Self {
            lowercase: true,
            code_split: true,
            remove_stopwords: true,
            stem: true,
        }
    }
}

/// Tokenize text into an ordered sequence of lexical terms.
#[inline]
pub fn tokenize(text: &str, opts: &TokenizerOptions) -> Vec<String> {
    let text = if opts.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    let text = if opts.code_split {
        text.chars()
            .map(|c| if CODE_SPLIT_CHARS.contains(c) { ' ' } else { c })
            .collect::<String>()
    } else {
        text
    };

    text.split_whitespace()
        .filter(|token| !opts.remove_stopwords || !STOPWORD_SET.contains(token))
        .map(|token| {
            if opts.stem {
                stem(token)
            } else {
                token.to_string()
            }
        })
        .collect()
}

/// Minimal suffix stripper. At most one rule fires per token, and only for
/// tokens longer than three characters.
fn stem(token: &str) -> String {
    if token.chars().count() <= 3 {
        return token.to_string();
    }

    if let Some(base) = token.strip_suffix("ing") {
        base.to_string()
    } else if let Some(base) = token.strip_suffix("ed") {
        base.to_string()
    } else if let Some(base) = token.strip_suffix("ly") {
        base.to_string()
    } else if let Some(base) = token.strip_suffix("ment") {
        base.to_string()
    } else if !token.ends_with("ss")
        && let Some(base) = token.strip_suffix('s')
    {
        base.to_string()
    } else {
        token.to_string()
    }
}

/// Strip comments from source text and collapse whitespace runs to single
/// spaces.
///
/// Removes `/* ... */` block comments, `// ...` line comments, and `# ...`
/// line comments. Applied before index-time tokenization and to expanded
/// queries so both sides of a search see the same text.
#[inline]
pub fn preprocess_code(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                stripped.push(' ');
            }
            '/' if chars.peek() == Some(&'/') => {
                skip_to_eol(&mut chars);
                stripped.push('\n');
            }
            '#' => {
                skip_to_eol(&mut chars);
                stripped.push('\n');
            }
            c => stripped.push(c),
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn skip_to_eol(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            break;
        }
        chars.next();
    }
}
