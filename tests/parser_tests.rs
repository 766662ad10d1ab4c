use bdd_recon::recording::{
    action_model::{ActionKind, LocatorDescriptor, LocatorStrategy},
    call_chain::{Expr, parse_expression, parse_statement, signature_parameters},
    python_parser::{PythonScriptParser, ScriptParser, selector_descriptor},
};

use crate::common::fixtures::{LOGIN_RECORDING, LOGIN_SNIPPET, POPUP_RECORDING};

mod common;

// =========================================================================
// Action extraction
// =========================================================================

#[test]
fn snippet_without_setup_yields_three_actions() {
    let recording = PythonScriptParser.parse(LOGIN_SNIPPET).unwrap();

    let kinds: Vec<ActionKind> = recording.actions.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::Navigate, ActionKind::Fill, ActionKind::Click]);

    let fill = &recording.actions[1];
    assert_eq!(
        fill.locator_descriptor,
        Some(LocatorDescriptor::role("textbox", Some("Username")))
    );
    assert_eq!(fill.value.as_deref(), Some("tomsmith"));
    assert_eq!(fill.page, "page");
    assert_eq!(fill.source_line, 2);
    assert!(recording.parse_errors.is_empty());
}

#[test]
fn full_codegen_recording_skips_boilerplate() {
    let recording = PythonScriptParser.parse(LOGIN_RECORDING).unwrap();

    assert!(recording.parse_errors.is_empty(), "{:?}", recording.parse_errors);
    assert_eq!(recording.actions.len(), 6);

    let navigate = &recording.actions[0];
    assert_eq!(navigate.kind, ActionKind::Navigate);
    assert_eq!(navigate.source_line, 9);
    assert_eq!(
        navigate.value.as_deref(),
        Some("https://the-internet.herokuapp.com/login")
    );

    let fill = &recording.actions[2];
    assert_eq!(fill.kind, ActionKind::Fill);
    assert_eq!(fill.source_line, 11);
    assert_eq!(fill.value.as_deref(), Some("tomsmith"));

    let expect = &recording.actions[5];
    assert_eq!(expect.kind, ActionKind::Expect);
    assert_eq!(expect.matcher.as_deref(), Some("to_contain_text"));
    assert_eq!(expect.value.as_deref(), Some("You logged into a secure area!"));
    assert_eq!(
        expect.locator_descriptor,
        Some(LocatorDescriptor::new(LocatorStrategy::Css, "#flash"))
    );
}

#[test]
fn metadata_reflects_recording_content() {
    let recording = PythonScriptParser.parse(LOGIN_RECORDING).unwrap();
    let meta = &recording.metadata;

    assert_eq!(
        meta.start_url.as_deref(),
        Some("https://the-internet.herokuapp.com/login")
    );
    assert!(meta.has_assertions);
    assert!(!meta.has_popups);
    assert!(!meta.has_multiple_pages);
}

#[test]
fn popup_block_tags_actions_with_awaited_page() {
    let recording = PythonScriptParser.parse(POPUP_RECORDING).unwrap();

    let kinds: Vec<ActionKind> = recording.actions.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::Navigate,
            ActionKind::Popup,
            ActionKind::Click,
            ActionKind::Fill,
            ActionKind::Close,
        ]
    );

    let popup = &recording.actions[1];
    assert_eq!(popup.page, "page");
    assert_eq!(popup.value.as_deref(), Some("page1"));

    let click = &recording.actions[2];
    assert_eq!(click.popup_block.as_deref(), Some("page1"));

    let fill = &recording.actions[3];
    assert_eq!(fill.page, "page1");
    assert_eq!(fill.popup_block, None);
    assert_eq!(
        fill.locator_descriptor,
        Some(LocatorDescriptor::new(LocatorStrategy::Placeholder, "Search"))
    );

    assert!(recording.metadata.has_popups);
    assert!(recording.metadata.has_multiple_pages);
    assert_eq!(recording.page_contexts(), vec!["page", "page1"]);
}

#[test]
fn chained_builders_keep_first_as_base() {
    let raw = r#"page.get_by_role("row", name="Alice").get_by_role("button", name="Edit").click()"#;
    let recording = PythonScriptParser.parse(raw).unwrap();

    let descriptor = recording.actions[0].locator_descriptor.clone().unwrap();
    assert_eq!(descriptor.strategy, LocatorStrategy::Role);
    assert_eq!(descriptor.value, "row");
}

#[test]
fn filter_has_text_becomes_qualifier() {
    let raw = r#"page.locator("li").filter(has_text="Milk").click()"#;
    let recording = PythonScriptParser.parse(raw).unwrap();

    let descriptor = recording.actions[0].locator_descriptor.clone().unwrap();
    assert_eq!(descriptor.strategy, LocatorStrategy::Css);
    assert_eq!(descriptor.value, "li");
    assert_eq!(descriptor.qualifier.as_deref(), Some("Milk"));
}

#[test]
fn selector_strings_map_to_strategies() {
    assert_eq!(selector_descriptor("#flash").strategy, LocatorStrategy::Css);
    assert_eq!(selector_descriptor("//div[@id='x']").strategy, LocatorStrategy::Xpath);
    assert_eq!(selector_descriptor("xpath=//a").strategy, LocatorStrategy::Xpath);
}

// =========================================================================
// Robustness
// =========================================================================

#[test]
fn unknown_page_call_is_kept_with_diagnostic() {
    let raw = r#"page.goto("https://x")
page.get_by_role("button", name="Go").frobnicate()
"#;
    let recording = PythonScriptParser.parse(raw).unwrap();

    assert_eq!(recording.actions.len(), 2);
    let unknown = &recording.actions[1];
    assert_eq!(unknown.kind, ActionKind::Unknown);
    assert_eq!(unknown.source_line, 2);
    assert!(unknown.locator_descriptor.is_some());

    assert_eq!(recording.parse_errors.len(), 1);
    assert_eq!(recording.parse_errors[0].source_line, 2);
    assert_eq!(recording.known_actions().count(), 1);
}

#[test]
fn garbage_input_never_panics() {
    let inputs = [
        "",
        "\n\n\n",
        "page.goto(",
        "page.get_by_role(\"button\", name=\"unterminated).click()",
        ")))(((",
        "expect(",
        "with page.expect_popup() as",
        "page.locator('a').nth(",
        "\u{1F600} page.click()",
        "page..click()",
        "page.locator(((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((((",
        "expect(page.locator(\"a\")).to_have_count(",
    ];

    for input in inputs {
        let _ = PythonScriptParser.parse(input);
    }
}

#[test]
fn deeply_nested_line_becomes_a_diagnostic() {
    let line = format!("page.locator({}", "[".repeat(200_000));
    let recording = match PythonScriptParser.parse(&line) {
        Ok(recording) => recording,
        Err(e) => e.recording,
    };

    assert_eq!(recording.parse_errors.len(), 1);
    assert!(recording.parse_errors[0].reason.contains("nested deeper than"));

    let bounded = format!("page.locator({}{}).click()", "[".repeat(20), "]".repeat(20));
    assert!(parse_expression(&bounded).is_ok());
}

#[test]
fn names_starting_with_boilerplate_keywords_are_parsed() {
    let recording = PythonScriptParser
        .parse("passed = page.get_by_role(\"checkbox\").is_checked()\nreturned = 1\n")
        .unwrap_or_else(|e| e.recording);

    let covered: Vec<usize> = recording
        .actions
        .iter()
        .map(|a| a.source_line)
        .chain(recording.parse_errors.iter().map(|d| d.source_line))
        .collect();
    assert!(covered.contains(&1), "line 1 vanished: {:?}", recording);

    let recording = PythonScriptParser
        .parse("page.goto(\"https://x.com\")\npass\nreturn\nrun(playwright)\n")
        .unwrap();
    assert_eq!(recording.actions.len(), 1);
    assert!(recording.parse_errors.is_empty());
}

#[test]
fn await_is_only_stripped_from_the_statement() {
    let recording = PythonScriptParser
        .parse("await page.locator(\"#q\").fill(\"x = await y\")\ntitle = await page.get_by_role(\"heading\").inner_text()\n")
        .unwrap();

    let fill = &recording.actions[0];
    assert_eq!(fill.kind, ActionKind::Fill);
    assert_eq!(fill.value.as_deref(), Some("x = await y"));
    assert_eq!(recording.actions[1].source_line, 2);
}

#[test]
fn recording_without_actions_is_an_error_with_diagnostics() {
    let err = PythonScriptParser.parse("print('hello')\n").unwrap_err();

    assert!(err.recording.actions.is_empty());
    assert_eq!(err.recording.parse_errors.len(), 1);
    assert_eq!(err.recording.parse_errors[0].source_line, 1);
}

#[test]
fn empty_input_is_an_error() {
    let err = PythonScriptParser.parse("").unwrap_err();
    assert!(err.recording.parse_errors.is_empty());
}

// =========================================================================
// Call-chain lexer/parser
// =========================================================================

#[test]
fn statement_with_assignment_target() {
    let statement = parse_statement("page1 = page1_info.value").unwrap();

    let target = statement.target.unwrap();
    assert_eq!(target.path(), "page1");
    match statement.value {
        Expr::Chain(chain) => {
            assert_eq!(chain.root(), "page1_info");
            assert_eq!(chain.last().name, "value");
        }
        other => panic!("expected chain, got {:?}", other),
    }
}

#[test]
fn escaped_quotes_are_unescaped() {
    let expr = parse_expression(r#"page.get_by_text("say \"hi\"")"#).unwrap();
    let chain = expr.as_chain().unwrap();
    assert_eq!(chain.last().positional_text(0).as_deref(), Some("say \"hi\""));
}

#[test]
fn signature_parameters_drop_annotations_and_defaults() {
    let params = signature_parameters("context, name: str, count=1").unwrap();
    assert_eq!(params, vec!["context", "name", "count"]);
}
