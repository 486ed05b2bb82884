use super::*;

#[test]
fn error_message_cues_are_extracted() {
    let expanded = expand_error_query("Error: connection refused");
    assert!(expanded.contains("connection refused"));
    // Cue is appended after the original text
    assert!(expanded.starts_with("Error"));
}

#[test]
fn exception_and_failed_cues() {
    let expanded = expand_error_query("Exception: NullPointer in handler");
    assert!(expanded.contains("NullPointer in handler"));

    let expanded = expand_error_query("build failed: missing semicolon");
    assert!(expanded.contains("missing semicolon"));
}

#[test]
fn cannot_undefined_null_cues() {
    let expanded = expand_error_query("cannot read properties of x");
    assert!(expanded.ends_with("read properties of x"));

    let expanded = expand_error_query("undefined variable frobnicate");
    assert!(expanded.ends_with("variable frobnicate"));
}

#[test]
fn cue_stops_at_colon() {
    let expanded = expand_error_query("Error: timeout: retry later");
    // The first capture runs only up to the next colon
    assert!(expanded.contains("Error: timeout: retry later timeout"));
}

#[test]
fn stack_frame_names_are_extracted() {
    let log = "TypeError: x is undefined\n    at Router.handle (/app/src/router.ts:42:10)\n    at processRequest (/app/src/server.ts:17:3)";
    let expanded = expand_error_query(log);
    assert!(expanded.contains("Router.handle"));
    assert!(expanded.contains("processRequest"));
}

#[test]
fn filenames_with_source_extensions_are_extracted() {
    let filenames = query_filenames("failure in src/router.ts near util.py and notes.txt");
    assert_eq!(filenames, vec!["src/router.ts", "util.py"]);
}

#[test]
fn basenames_strip_directories() {
    let basenames = query_file_basenames("see /app/src/router.ts and lib\\helpers.js");
    assert_eq!(basenames, vec!["router.ts", "helpers.js"]);
}

#[test]
fn call_expressions_and_import_targets() {
    let expanded = expand_error_query("parseConfig(raw) blew up after import {loadYaml}");
    assert!(expanded.contains("parseConfig"));
    assert!(expanded.contains("{loadYaml}"));

    let expanded = expand_error_query("require('express') not found");
    assert!(expanded.contains("express"));
}

#[test]
fn plain_queries_pass_through_preprocessed() {
    let expanded = expand_error_query("where is   the retry logic");
    assert_eq!(expanded, "where is the retry logic");
}

#[test]
fn expansion_output_is_comment_stripped() {
    let expanded = expand_error_query("boom // local note");
    assert_eq!(expanded, "boom");
}

#[test]
fn empty_query_stays_empty() {
    assert_eq!(expand_error_query(""), "");
}
