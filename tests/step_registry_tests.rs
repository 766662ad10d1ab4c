use std::path::PathBuf;

use bdd_recon::{
    error::RegistryError,
    steps::{
        normalize::{extract_parameters, levenshtein, normalize, similarity, word_diff},
        registry::StepRegistry,
        step_model::{MatchThresholds, StepDefinition, StepRef},
    },
};

use crate::common::{fixtures::LOGIN_STEPS, project::TempProject};

mod common;

// =========================================================================
// Helpers
// =========================================================================

fn login_project() -> TempProject {
    let project = TempProject::new();
    project.write("features/steps/login_steps.py", LOGIN_STEPS);
    project
}

fn initialized(project: &TempProject) -> StepRegistry {
    let mut registry = StepRegistry::new("features/steps");
    registry.initialize(project.root()).unwrap();
    registry
}

// =========================================================================
// Normalization
// =========================================================================

#[test]
fn normalize_collapses_case_whitespace_and_literals() {
    assert_eq!(normalize("I  Click the   LOGIN button"), "i click the login button");
    assert_eq!(
        normalize(r#"I enter "bob" as the username"#),
        "i enter {} as the username"
    );
    assert_eq!(
        normalize("I enter {username} as the username"),
        "i enter {} as the username"
    );
    assert_eq!(
        normalize("I enter <username> as the username"),
        "i enter {} as the username"
    );
    assert_eq!(normalize("I wait {seconds:d} seconds"), "i wait {} seconds");
}

#[test]
fn normalize_is_stable() {
    let inputs = [
        r#"I fill "{value}" into the username field"#,
        "the page title should be 'Home'",
        "I don't see the banner",
        "",
    ];
    for input in inputs {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "input: {:?}", input);
    }
}

#[test]
fn apostrophes_inside_words_are_not_quotes() {
    assert_eq!(normalize("I don't see the banner"), "i don't see the banner");
}

#[test]
fn parameters_in_declaration_order() {
    assert_eq!(
        extract_parameters("I move {count:d} items from <source> to {target}"),
        vec!["count", "source", "target"]
    );
    assert!(extract_parameters("I click the login button").is_empty());
}

#[test]
fn similarity_metrics() {
    assert_eq!(levenshtein("kitten", "sitting"), 3);
    assert_eq!(levenshtein("", "abc"), 3);
    assert_eq!(similarity("", ""), 1.0);
    assert_eq!(similarity("same", "same"), 1.0);
    let s = similarity("i am on the login page", "i am on the login screen");
    assert!((s - 0.7917).abs() < 0.001, "got {}", s);
}

#[test]
fn word_diff_describes_edits() {
    assert_eq!(
        word_diff("i am on the login page", "i am on the login screen"),
        vec!["replace 'page' with 'screen'"]
    );
    assert_eq!(
        word_diff("i click the button", "i click the red button"),
        vec!["insert 'red'"]
    );
    assert_eq!(
        word_diff("i click the red button", "i click the button"),
        vec!["remove 'red'"]
    );
}

// =========================================================================
// Initialization
// =========================================================================

#[test]
fn initialize_indexes_every_decorator() {
    let project = login_project();
    let mut registry = StepRegistry::new("features/steps");
    let report = registry.initialize(project.root()).unwrap();

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.entries, 3);
    assert!(report.skipped.is_empty());

    let entries = registry.entries().unwrap();
    let lines: Vec<usize> = entries.iter().map(|e| e.line_number).collect();
    assert_eq!(lines, vec![4, 9, 14]);

    let enter = &entries[2];
    assert_eq!(enter.normalized_pattern, "i enter {} as the username");
    assert_eq!(enter.parameters, vec!["username"]);
    assert_eq!(enter.keyword.as_deref(), Some("when"));
    assert_eq!(enter.function_name.as_deref(), Some("step_enter_username"));
    assert_eq!(enter.usage_count, 0);
}

#[test]
fn rescan_is_idempotent() {
    let project = login_project();
    let mut registry = initialized(&project);
    let first: Vec<StepDefinition> = registry.entries().unwrap().to_vec();

    registry.initialize(project.root()).unwrap();
    assert_eq!(registry.entries().unwrap(), first.as_slice());
}

#[test]
fn malformed_file_is_skipped() {
    let project = login_project();
    project.write(
        "features/steps/broken_steps.py",
        "from behave import when\n\n@when()\ndef nothing(context):\n    pass\n",
    );

    let mut registry = StepRegistry::new("features/steps");
    let report = registry.initialize(project.root()).unwrap();

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.entries, 3);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path().ends_with("broken_steps.py"));
}

#[test]
fn nested_step_files_are_found_and_caches_skipped() {
    let project = login_project();
    project.write(
        "features/steps/admin/admin_steps.py",
        "from behave import then\n\n@then('I see the admin panel')\ndef step_admin(context):\n    pass\n",
    );
    project.write(
        "features/steps/__pycache__/login_steps.py",
        "from behave import given\n\n@given('stale copy')\ndef step_stale(context):\n    pass\n",
    );
    project.write(
        "features/steps/.backup/old_steps.py",
        "from behave import given\n\n@given('old copy')\ndef step_old(context):\n    pass\n",
    );

    let mut registry = StepRegistry::new("features/steps");
    let report = registry.initialize(project.root()).unwrap();

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.entries, 4);
    assert!(!registry.find_reusable("I see the admin panel", 0).unwrap().is_empty());
    assert!(registry.find_reusable("stale copy", 0).unwrap().is_empty());
}

#[test]
fn missing_steps_directory_is_empty_registry() {
    let project = TempProject::new();
    let mut registry = StepRegistry::new("features/steps");
    let report = registry.initialize(project.root()).unwrap();

    assert_eq!(report.entries, 0);
    assert!(registry.find_reusable("I click the login button", 0).unwrap().is_empty());
}

#[test]
fn missing_project_root_is_an_error() {
    let mut registry = StepRegistry::new("features/steps");
    let err = registry
        .initialize(&PathBuf::from("/definitely/not/a/project"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::ProjectRootMissing(_)));
}

#[test]
fn use_before_initialize_is_rejected() {
    let mut registry = StepRegistry::new("features/steps");

    assert_eq!(
        registry.find_reusable("anything", 0).unwrap_err(),
        RegistryError::NotInitialized("step")
    );
    assert!(registry.analyze_steps(&[("anything".into(), 0)]).is_err());
    assert!(registry.entries().is_err());

    let step = StepRef {
        file_path: PathBuf::from("x.py"),
        line_number: 1,
    };
    assert_eq!(
        registry.record_reuse(&step).unwrap_err(),
        RegistryError::NotInitialized("step")
    );
}

// =========================================================================
// Matching
// =========================================================================

#[test]
fn exact_match_is_reusable() {
    let project = login_project();
    let registry = initialized(&project);

    let candidates = registry.find_reusable("I  CLICK the login button", 0).unwrap();
    let best = &candidates[0];
    assert_eq!(best.similarity_score, 1.0);
    assert!(best.can_reuse_directly);
    assert!(best.adaptation_needed.is_empty());
    assert_eq!(best.target.line_number, 9);
    assert_eq!(best.raw_pattern, "I click the login button");
}

#[test]
fn quoted_literal_matches_named_parameter() {
    let project = login_project();
    let registry = initialized(&project);

    let candidates = registry
        .find_reusable(r#"I enter "tomsmith" as the username"#, 1)
        .unwrap();
    assert!(candidates[0].can_reuse_directly);
    assert_eq!(candidates[0].target.line_number, 14);
}

#[test]
fn near_match_needs_adaptation() {
    let project = login_project();
    let registry = initialized(&project);

    let candidates = registry.find_reusable("I am on the login screen", 0).unwrap();
    assert_eq!(candidates.len(), 1);

    let near = &candidates[0];
    assert_eq!(near.target.line_number, 4);
    assert!(near.similarity_score >= 0.75 && near.similarity_score < 1.0);
    assert!(!near.can_reuse_directly);
    assert_eq!(near.adaptation_needed, vec!["replace 'page' with 'screen'"]);
}

#[test]
fn high_similarity_with_equal_arity_is_reusable() {
    let project = login_project();
    let registry = initialized(&project);

    let candidates = registry
        .find_reusable("I enter {name} as the user name", 1)
        .unwrap();
    let best = &candidates[0];
    assert!(best.similarity_score >= 0.95 && best.similarity_score < 1.0);
    assert!(best.can_reuse_directly);
    assert!(!best.adaptation_needed.is_empty());
}

#[test]
fn arity_mismatch_blocks_direct_reuse() {
    let project = login_project();
    let registry = initialized(&project);

    let candidates = registry
        .find_reusable("I enter {username} as the username", 2)
        .unwrap();
    let best = &candidates[0];
    assert_eq!(best.similarity_score, 1.0);
    assert!(!best.can_reuse_directly);
    assert!(
        best.adaptation_needed
            .iter()
            .any(|n| n.contains("parameter count differs"))
    );
}

#[test]
fn unrelated_pattern_has_no_candidates() {
    let project = login_project();
    let registry = initialized(&project);

    assert!(registry.find_reusable("I open the dashboard", 0).unwrap().is_empty());
}

#[test]
fn stricter_thresholds_drop_near_matches() {
    let project = login_project();
    let mut registry = StepRegistry::new("features/steps").with_thresholds(MatchThresholds {
        min_similarity: 0.9,
        exact_threshold: 0.99,
    });
    registry.initialize(project.root()).unwrap();

    assert!(registry.find_reusable("I am on the login screen", 0).unwrap().is_empty());
    let candidates = registry
        .find_reusable("I enter {name} as the user name", 1)
        .unwrap();
    assert!(!candidates[0].can_reuse_directly);
}

// =========================================================================
// Batch analysis
// =========================================================================

#[test]
fn analyze_steps_partitions_batch() {
    let project = login_project();
    let registry = initialized(&project);

    let batch = vec![
        ("I click the login button".to_string(), 0),
        ("I open the dashboard".to_string(), 0),
        ("i click  the LOGIN button".to_string(), 0),
        ("I open the dashboard".to_string(), 0),
        ("I am on the login screen".to_string(), 0),
    ];
    let analysis = registry.analyze_steps(&batch).unwrap();

    assert_eq!(analysis.total_steps, 5);

    assert_eq!(analysis.reusable_steps.len(), 1);
    assert_eq!(analysis.reusable_steps[0].index, 0);
    assert_eq!(analysis.reusable_steps[0].target.line_number, 9);

    let new: Vec<usize> = analysis.new_steps_needed.iter().map(|s| s.index).collect();
    assert_eq!(new, vec![1, 4]);
    assert!(analysis.new_steps_needed[0].near_matches.is_empty());
    assert_eq!(analysis.new_steps_needed[1].near_matches.len(), 1);

    let dups: Vec<(usize, usize)> = analysis
        .duplicates_within_batch
        .iter()
        .map(|d| (d.index, d.duplicate_of))
        .collect();
    assert_eq!(dups, vec![(2, 0), (3, 1)]);
}

#[test]
fn analyze_empty_batch() {
    let project = login_project();
    let registry = initialized(&project);

    let analysis = registry.analyze_steps(&[]).unwrap();
    assert_eq!(analysis.total_steps, 0);
    assert!(analysis.reusable_steps.is_empty());
    assert!(analysis.new_steps_needed.is_empty());
}

// =========================================================================
// Usage tracking
// =========================================================================

#[test]
fn record_reuse_increments_and_survives_rescan() {
    let project = login_project();
    let mut registry = initialized(&project);

    let target = registry.find_reusable("I click the login button", 0).unwrap()[0]
        .target
        .clone();
    registry.record_reuse(&target).unwrap();
    registry.record_reuse(&target).unwrap();
    assert_eq!(registry.get(&target).unwrap().usage_count, 2);

    registry.initialize(project.root()).unwrap();
    assert_eq!(registry.get(&target).unwrap().usage_count, 2);
}

#[test]
fn record_reuse_of_unknown_step_fails() {
    let project = login_project();
    let mut registry = initialized(&project);

    let bogus = StepRef {
        file_path: project.path("features/steps/login_steps.py"),
        line_number: 5,
    };
    assert!(matches!(
        registry.record_reuse(&bogus),
        Err(RegistryError::UnknownStep { line_number: 5, .. })
    ));
}

#[test]
fn seeded_registry_matches_without_filesystem() {
    let definition = StepDefinition {
        raw_pattern: "I log out".into(),
        normalized_pattern: normalize("I log out"),
        parameters: vec![],
        file_path: PathBuf::from("steps/auth.py"),
        line_number: 3,
        usage_count: 7,
        keyword: Some("when".into()),
        function_name: None,
    };
    let registry = StepRegistry::seeded(vec![definition]);

    assert!(registry.is_initialized());
    let candidates = registry.find_reusable("i log out", 0).unwrap();
    assert!(candidates[0].can_reuse_directly);
}
