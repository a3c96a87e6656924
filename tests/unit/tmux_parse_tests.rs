use mas_control::tmux::agents::{is_agent_command, AGENT_TABLE};
use mas_control::tmux::{
    parse_name_lines, parse_pane_line, parse_session_info_line, parse_window_line,
};

#[test]
fn name_lines_filtered_by_prefix() {
    let stdout = "mas-11111111\nother-session\n\nmas-ab12cd34\n";
    assert_eq!(
        parse_name_lines(stdout, "mas-"),
        vec!["mas-11111111".to_owned(), "mas-ab12cd34".to_owned()]
    );
}

#[test]
fn session_info_line_parses_counts_and_attachment() {
    let (name, info) = parse_session_info_line("mas-11111111|4|1").expect("parse");
    assert_eq!(name, "mas-11111111");
    assert_eq!(info.window_count, 4);
    assert!(info.is_attached);

    let (_, detached) = parse_session_info_line("mas-ab12cd34|2|0").expect("parse");
    assert!(!detached.is_attached);

    assert!(parse_session_info_line("garbage").is_none());
    assert!(parse_session_info_line("name|notanumber|0").is_none());
}

#[test]
fn window_line_parses_all_fields() {
    let window = parse_window_line("2|development|4|1").expect("parse");
    assert_eq!(window.index, 2);
    assert_eq!(window.name, "development");
    assert_eq!(window.pane_count, 4);
    assert!(window.active);

    assert!(parse_window_line("").is_none());
}

#[test]
fn pane_line_splits_index_and_command() {
    assert_eq!(
        parse_pane_line("1|claude"),
        Some((1, "claude".to_owned()))
    );
    assert_eq!(parse_pane_line("0|bash"), Some((0, "bash".to_owned())));
    assert!(parse_pane_line("nodigit").is_none());
}

#[test]
fn agent_classifier_matches_agent_processes() {
    assert!(is_agent_command("claude"));
    assert!(is_agent_command("clauded"));
    assert!(!is_agent_command("bash"));
    assert!(!is_agent_command("vim"));
}

#[test]
fn agent_table_covers_the_fixed_hierarchy() {
    assert_eq!(AGENT_TABLE.len(), 13);

    // One meta manager, four panes each in the three unit windows.
    assert_eq!(AGENT_TABLE.iter().filter(|a| a.window == "meta").count(), 1);
    for window in ["design", "development", "business"] {
        assert_eq!(
            AGENT_TABLE.iter().filter(|a| a.window == window).count(),
            4,
            "window {window}"
        );
    }

    // Ids are unique.
    let mut ids: Vec<&str> = AGENT_TABLE.iter().map(|a| a.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), AGENT_TABLE.len());
}
