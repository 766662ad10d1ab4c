use bdd_recon::{
    coordinator::{
        artifacts::merge_step_file,
        generation::{BEHAVE_IMPORT, EXPECT_IMPORT, GenerationCollaborator, MockGenerator, component_name},
        ollama::{LlmGenerator, MockTextInference},
    },
    error::GenerationError,
    recording::{
        action_model::{LocatorDescriptor, ParsedRecording},
        python_parser::{PythonScriptParser, ScriptParser},
    },
};

use crate::common::fixtures::{LOGIN_RECORDING, POPUP_RECORDING};

mod common;

// =========================================================================
// Helpers
// =========================================================================

fn login_recording() -> ParsedRecording {
    PythonScriptParser.parse(LOGIN_RECORDING).unwrap()
}

const LLM_RESPONSE: &str = r#"{
  "featureText": "Feature: login\n\n  Scenario: login\n    Given I am on the login page\n",
  "stepImports": ["from behave import given, when, then"],
  "stepCandidates": [
    { "pattern": "I am on the login page", "paramCount": 0, "code": "@given(\"I am on the login page\")\ndef step_impl(context):\n    context.page.goto(\"/login\")\n" }
  ],
  "componentCandidates": [
    {
      "name": "LoginPage",
      "locators": [
        { "elementName": "username_input", "descriptor": { "strategy": "role", "value": "textbox", "qualifier": "Username" } }
      ],
      "methods": [
        { "methodName": "fill_username_input", "parameterNames": ["value"], "body": "self.username_input.fill(value)" }
      ]
    }
  ]
}"#;

// =========================================================================
// MockGenerator
// =========================================================================

#[test]
fn mock_generator_emits_one_step_per_action() {
    let output = MockGenerator.generate(&login_recording(), "login").unwrap();

    let patterns: Vec<&str> = output.step_candidates.iter().map(|c| c.pattern.as_str()).collect();
    assert_eq!(
        patterns,
        vec![
            r#"I open "{url}""#,
            "I click the username field",
            r#"I fill "{value}" into the username field"#,
            r#"I fill "{value}" into the password field"#,
            "I click the login button",
            r#"the #flash should contain text "{expected}""#,
        ]
    );

    let params: Vec<usize> = output.step_candidates.iter().map(|c| c.param_count).collect();
    assert_eq!(params, vec![1, 0, 1, 1, 0, 1]);

    assert_eq!(
        output.step_candidates[0].code,
        "@given(\"I open \\\"{url}\\\"\")\ndef step_impl(context, url):\n    context.page.goto(url)\n"
    );
    assert_eq!(output.step_imports, vec![BEHAVE_IMPORT, EXPECT_IMPORT]);
}

#[test]
fn mock_generator_feature_text() {
    let output = MockGenerator.generate(&login_recording(), "login").unwrap();

    let expected = r#"Feature: login

  Scenario: login
    Given I open "https://the-internet.herokuapp.com/login"
    When I click the username field
    And I fill "tomsmith" into the username field
    And I fill "SuperSecretPassword!" into the password field
    And I click the login button
    Then the #flash should contain text "You logged into a secure area!"
"#;
    assert_eq!(output.feature_text, expected);
}

#[test]
fn mock_generator_groups_elements_by_page() {
    let output = MockGenerator.generate(&login_recording(), "login").unwrap();

    assert_eq!(output.component_candidates.len(), 1);
    let page = &output.component_candidates[0];
    assert_eq!(page.name, "LoginPage");

    let locators: Vec<&str> = page.locators.iter().map(|l| l.element_name.as_str()).collect();
    assert_eq!(locators, vec!["username_input", "password_input", "login_button", "flash_element"]);
    assert_eq!(
        page.locators[0].descriptor,
        LocatorDescriptor::role("textbox", Some("Username"))
    );

    let methods: Vec<&str> = page.methods.iter().map(|m| m.method_name.as_str()).collect();
    assert_eq!(
        methods,
        vec!["click_username_input", "fill_username_input", "fill_password_input", "click_login_button"]
    );
    assert_eq!(page.methods[1].body, "self.username_input.fill(value)");
    assert_eq!(page.methods[1].parameter_names, vec!["value"]);
}

#[test]
fn mock_generator_handles_popup_pages() {
    let recording = PythonScriptParser.parse(POPUP_RECORDING).unwrap();
    let output = MockGenerator.generate(&recording, "docs search").unwrap();

    assert!(output.feature_text.contains("    When a new tab opens\n"));
    assert!(output.feature_text.contains("    # on page1\n"));
    assert!(output.feature_text.contains("I close the current tab"));

    let names: Vec<&str> = output.component_candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["DocsPage", "Popup1Page"]);
    assert_eq!(output.component_candidates[0].locators[0].element_name, "github_link");
    assert_eq!(output.component_candidates[1].locators[0].element_name, "search_input");
    assert_eq!(output.step_imports, vec![BEHAVE_IMPORT]);
}

#[test]
fn component_names_from_urls_and_page_variables() {
    assert_eq!(component_name(Some("https://x.com/login"), "page"), "LoginPage");
    assert_eq!(component_name(Some("https://x.com/account/order-history?id=3"), "page"), "OrderHistoryPage");
    assert_eq!(component_name(Some("https://x.com/"), "page"), "HomePage");
    assert_eq!(component_name(None, "page"), "HomePage");
    assert_eq!(component_name(None, "page2"), "Popup2Page");
    assert_eq!(component_name(Some("https://x.com/landing-page"), "page"), "LandingPage");
}

// =========================================================================
// LlmGenerator
// =========================================================================

#[test]
fn llm_response_is_parsed() {
    let generator = LlmGenerator::with_mock_response(LLM_RESPONSE);
    let output = generator.generate(&login_recording(), "login").unwrap();

    assert_eq!(output.step_candidates.len(), 1);
    assert_eq!(output.step_candidates[0].pattern, "I am on the login page");
    assert_eq!(output.component_candidates[0].name, "LoginPage");
    assert_eq!(output.component_candidates[0].base_type, None);

    let methods = output.component_candidates[0].method_entries();
    assert_eq!(methods[0].method_name, "fill_username_input");
    assert!(!methods[0].body_hash.is_empty());
}

#[test]
fn llm_response_in_markdown_fence_is_parsed() {
    let fenced = format!("```json\n{}\n```", LLM_RESPONSE);
    let generator = LlmGenerator::with_mock_response(&fenced);
    assert!(generator.generate(&login_recording(), "login").is_ok());
}

#[test]
fn llm_invalid_json_is_permanent() {
    let generator = LlmGenerator::with_mock_response("I think the scenario is about logging in.");
    let err = generator.generate(&login_recording(), "login").unwrap_err();
    assert!(!err.is_transient());
}

#[test]
fn llm_transient_failures_are_retried() {
    let backend = MockTextInference::sequence(vec![
        Err(GenerationError::Transient("connection refused".into())),
        Ok(LLM_RESPONSE.to_string()),
    ]);
    let generator = LlmGenerator::new(Box::new(backend)).with_max_retries(2);

    assert!(generator.generate(&login_recording(), "login").is_ok());
}

#[test]
fn llm_gives_up_after_max_retries() {
    let backend = MockTextInference::sequence(vec![
        Err(GenerationError::Transient("connection refused".into())),
        Err(GenerationError::Transient("connection refused".into())),
        Ok(LLM_RESPONSE.to_string()),
    ]);
    let generator = LlmGenerator::new(Box::new(backend)).with_max_retries(1);

    let err = generator.generate(&login_recording(), "login").unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn llm_permanent_failure_is_not_retried() {
    let backend = MockTextInference::sequence(vec![
        Err(GenerationError::Permanent("model not found".into())),
        Ok(LLM_RESPONSE.to_string()),
    ]);
    let generator = LlmGenerator::new(Box::new(backend));

    assert_eq!(
        generator.generate(&login_recording(), "login").unwrap_err(),
        GenerationError::Permanent("model not found".into())
    );
}

// =========================================================================
// Step file merging
// =========================================================================

#[test]
fn new_step_file_gets_imports_and_definitions() {
    let imports = vec![BEHAVE_IMPORT.to_string()];
    let text = merge_step_file(None, &imports, &["@when(\"a\")\ndef step_impl(context):\n    pass\n"]);

    assert_eq!(
        text,
        "from behave import given, when, then\n\n\n@when(\"a\")\ndef step_impl(context):\n    pass\n"
    );
}

#[test]
fn existing_step_file_is_preserved() {
    let existing = "from behave import given, when, then\n\n\n@given('x')\ndef step_x(context):\n    pass\n\n";
    let imports = vec![BEHAVE_IMPORT.to_string(), EXPECT_IMPORT.to_string()];
    let text = merge_step_file(Some(existing), &imports, &["@then(\"y\")\ndef step_impl(context):\n    pass"]);

    assert_eq!(
        text,
        "from behave import given, when, then\nfrom playwright.sync_api import expect\n\n\n@given('x')\ndef step_x(context):\n    pass\n\n\n@then(\"y\")\ndef step_impl(context):\n    pass\n"
    );
}

#[test]
fn imports_go_above_code_without_import_block() {
    let existing = "@given('x')\ndef step_x(context):\n    pass\n";
    let imports = vec![BEHAVE_IMPORT.to_string()];
    let text = merge_step_file(Some(existing), &imports, &[]);

    assert_eq!(
        text,
        "from behave import given, when, then\n\n@given('x')\ndef step_x(context):\n    pass\n"
    );
}
