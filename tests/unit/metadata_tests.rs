use mas_control::persistence::metadata::parse_metadata;

#[test]
fn parses_known_keys() {
    let content = "TMUX_SESSION=mas-ab12cd34\n\
                   SESSION_DIR=/work/sessions/ab12cd34\n\
                   CREATED_AT=2025-01-01T00:00:00Z\n\
                   STATUS=inactive\n";

    let metadata = parse_metadata(content);
    assert_eq!(metadata.tmux_session.as_deref(), Some("mas-ab12cd34"));
    assert_eq!(
        metadata.session_dir.as_deref(),
        Some(std::path::Path::new("/work/sessions/ab12cd34"))
    );
    assert_eq!(metadata.created_at.as_deref(), Some("2025-01-01T00:00:00Z"));
    assert_eq!(metadata.status.as_deref(), Some("inactive"));
    assert!(metadata.extra.is_empty());
}

#[test]
fn unknown_keys_land_in_extra() {
    let metadata = parse_metadata("HTTP_SERVER=running\nPROJECT_DIR=/work\n");
    assert_eq!(metadata.extra.get("http_server").map(String::as_str), Some("running"));
    assert_eq!(metadata.extra.get("project_dir").map(String::as_str), Some("/work"));
}

#[test]
fn malformed_and_blank_lines_are_skipped() {
    let content = "\n# comment\nnot a pair\nSTATUS=\nTMUX_SESSION=mas-00000000\n";
    let metadata = parse_metadata(content);
    assert_eq!(metadata.tmux_session.as_deref(), Some("mas-00000000"));
    // Empty value is treated as absent.
    assert!(metadata.status.is_none());
    assert!(metadata.extra.is_empty());
}

#[test]
fn values_may_contain_equals() {
    let metadata = parse_metadata("NOTE=a=b=c\n");
    assert_eq!(metadata.extra.get("note").map(String::as_str), Some("a=b=c"));
}
