use crate::provider::SecretError;
use crate::provider::tests::MockProvider;
use crate::*;
use std::collections::BTreeMap;

const LAYERS: &str = r#"
[layers.app]
APP_ID = "x"
REGION = "us-central1"

[layers.unit]
inherits = "app"
STUB_DB = true

[layers.dev]
inherits = "app"
PROJECT_ID = "$.projects.dev"
JWT_SECRET = "secret:jwt-secret"
DEBUG = true

[layers.prod]
inherits = "app"
REGION = "europe-west1"
JWT_SECRET = "secret:jwt-secret"
DB_PASSWORD = "secret:db-password"
"#;

fn store(toml: &str) -> LayerStore {
    LayerStore::from_documents([toml.parse::<LayerDocument>().unwrap()])
}

fn loader_with(
    env: MemoryEnvironment,
    provider: &MockProvider,
) -> Loader<MemoryEnvironment> {
    Loader::with_environment(store(LAYERS), env)
        .with_secrets(Box::new(provider.clone()))
        .with_projects(Box::new(ProjectMap::parse("dev=proj-dev\nprod=proj-prod\n")))
}

fn default_provider() -> MockProvider {
    MockProvider::new()
        .with_secret("jwt-secret", "jwt-value")
        .with_secret("db-password", "db-value")
}

#[test]
fn test_unit_profile_scenario() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let report = loader.load(&LoadRequest::new("unit")).unwrap();

    let mut expected = ResolvedVariableSet::new();
    expected.insert("APP_ID", ResolvedVariable::new("x", Origin::ResolvedLiteral));
    expected.insert(
        "REGION",
        ResolvedVariable::new("us-central1", Origin::ResolvedLiteral),
    );
    expected.insert("STUB_DB", ResolvedVariable::new("true", Origin::ResolvedLiteral));
    assert_eq!(report.variables, expected);
    assert!(!report.reused);

    assert_eq!(loader.environment().get("STUB_DB").as_deref(), Some("true"));
    assert_eq!(loader.phase(), LoadPhase::Committed);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_child_overrides_parent() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let report = loader.load(&LoadRequest::new("prod")).unwrap();
    assert_eq!(report.variables.value("REGION"), Some("europe-west1"));
    assert_eq!(report.variables.value("APP_ID"), Some("x"));
    assert_eq!(report.variables.value("DB_PASSWORD"), Some("db-value"));
}

#[test]
fn test_preexisting_environment_wins() {
    let provider = default_provider();
    let env: MemoryEnvironment = [("JWT_SECRET", "from-shell")].into_iter().collect();
    let mut loader = loader_with(env, &provider);

    let report = loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(
        report.variables.get("JWT_SECRET"),
        Some(&ResolvedVariable::new(
            "from-shell",
            Origin::PreexistingEnvironment
        ))
    );
    assert_eq!(provider.calls(), 0);

    let state = loader.state().unwrap();
    assert!(!state.applied.contains_key("JWT_SECRET"));

    // Never cleared either
    loader.clear();
    assert_eq!(
        loader.environment().get("JWT_SECRET").as_deref(),
        Some("from-shell")
    );
}

#[test]
fn test_strict_failure_changes_nothing() {
    let provider = MockProvider::new().with_secret("jwt-secret", "jwt-value");
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    let env_before = loader.environment().clone();
    let state_before = loader.state().cloned();

    // db-password is missing
    let err = loader.load(&LoadRequest::new("prod")).unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::SecretNotFound {
            secret: "db-password".into()
        })
    );
    match &err {
        EnvLayerError::Unresolved(failure) => {
            assert_eq!(failure.variable, "DB_PASSWORD");
            assert_eq!(failure.profile, "prod");
        }
        other => panic!("expected unresolved variable, got {:?}", other),
    }

    assert_eq!(loader.phase(), LoadPhase::Aborted);
    assert_eq!(loader.environment(), &env_before);
    assert_eq!(loader.state().cloned(), state_before);
}

#[test]
fn test_permissive_omits_failed_variables() {
    let provider = MockProvider::new()
        .with_secret("jwt-secret", "jwt-value")
        .with_failure("db-password", SecretError::KeyUnavailable);
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let report = loader
        .load(&LoadRequest::new("prod").policy(FailurePolicy::Permissive))
        .unwrap();

    assert!(!report.variables.contains("DB_PASSWORD"));
    assert_eq!(report.variables.value("JWT_SECRET"), Some("jwt-value"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].failure,
        Failure::DecryptionKeyUnavailable {
            secret: "db-password".into()
        }
    );

    // Absent, not empty
    assert_eq!(loader.environment().get("DB_PASSWORD"), None);
}

#[test]
fn test_layer_not_found_aborts_even_when_permissive() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let err = loader
        .load(&LoadRequest::new("staging").policy(FailurePolicy::Permissive))
        .unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::LayerNotFound {
            layer: "staging".into()
        })
    );
    assert!(loader.state().is_none());
    assert!(loader.environment().snapshot().is_empty());

    let err = loader
        .load(&LoadRequest::new("unit").side_load("staging"))
        .unwrap_err();
    assert_eq!(err.failure().map(Failure::kind), Some(FailureKind::LayerNotFound));
    assert!(loader.environment().snapshot().is_empty());
}

#[test]
fn test_clean_replacement() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(loader.environment().contains("STUB_DB"));

    loader.load(&LoadRequest::new("dev")).unwrap();
    let env = loader.environment();
    assert!(!env.contains("STUB_DB"));
    assert_eq!(env.get("PROJECT_ID").as_deref(), Some("proj-dev"));
    assert_eq!(env.get("APP_ID").as_deref(), Some("x"));

    let applied: Vec<_> = loader.state().unwrap().applied.keys().cloned().collect();
    assert_eq!(
        applied,
        vec!["APP_ID", "DEBUG", "JWT_SECRET", "PROJECT_ID", "REGION"]
    );
}

#[test]
fn test_side_load_is_prefixed() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let report = loader
        .load(&LoadRequest::new("unit").side_load("prod"))
        .unwrap();

    assert_eq!(report.variables.value("REGION"), Some("us-central1"));
    assert_eq!(report.variables.value("TARGET_REGION"), Some("europe-west1"));
    assert_eq!(report.variables.value("TARGET_DB_PASSWORD"), Some("db-value"));
    assert!(!report.variables.contains("DB_PASSWORD"));
    assert!(!report.variables.contains("TARGET_STUB_DB"));

    let env = loader.environment();
    assert_eq!(env.get("APP_ID").as_deref(), Some("x"));
    assert_eq!(env.get("TARGET_APP_ID").as_deref(), Some("x"));
}

#[test]
fn test_side_load_checks_prefixed_name_against_environment() {
    let provider = default_provider();
    let env: MemoryEnvironment = [("TARGET_REGION", "local")].into_iter().collect();
    let mut loader = loader_with(env, &provider);

    let report = loader
        .load(&LoadRequest::new("unit").side_load("prod"))
        .unwrap();
    assert_eq!(
        report.variables.get("TARGET_REGION"),
        Some(&ResolvedVariable::new("local", Origin::PreexistingEnvironment))
    );
    assert_eq!(report.variables.value("REGION"), Some("us-central1"));
}

#[test]
fn test_side_load_never_overwrites_primary_names() {
    let provider = default_provider();
    let mut loader = Loader::with_environment(
        store(
            r#"
[layers.primary]
TARGET_URL = "primary"
NAME = "p"

[layers.deployed]
URL = "side"
NAME = "d"
"#,
        ),
        MemoryEnvironment::new(),
    )
    .with_secrets(Box::new(provider));

    let report = loader
        .load(&LoadRequest::new("primary").side_load("deployed"))
        .unwrap();

    assert_eq!(report.variables.value("TARGET_URL"), Some("primary"));
    assert_eq!(report.variables.value("TARGET_NAME"), Some("d"));
    assert_eq!(report.variables.value("NAME"), Some("p"));
    assert_eq!(report.collisions, vec!["TARGET_URL".to_string()]);
    assert_eq!(
        loader.environment().get("TARGET_URL").as_deref(),
        Some("primary")
    );
    assert_eq!(loader.state().unwrap().collisions, report.collisions);
}

#[test]
fn test_edited_project_mapping_is_not_skipped() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join(crate::projects::DEFAULT_PROJECTS_FILE);
    std::fs::write(&path, "dev=one\n").unwrap();

    let provider = default_provider();
    let mut loader = Loader::with_environment(store(LAYERS), MemoryEnvironment::new())
        .with_secrets(Box::new(provider))
        .with_projects(Box::new(ProjectsFile::new(&path)));

    let first = loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(first.variables.value("PROJECT_ID"), Some("one"));
    assert!(loader.load(&LoadRequest::new("dev")).unwrap().reused);

    std::fs::write(&path, "dev=two\n").unwrap();
    let second = loader.load(&LoadRequest::new("dev")).unwrap();
    assert!(!second.reused);
    assert_eq!(second.variables.value("PROJECT_ID"), Some("two"));
    assert_eq!(loader.environment().get("PROJECT_ID").as_deref(), Some("two"));
}

#[test]
fn test_validator_rejection_changes_nothing() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider).with_validator(Box::new(
        RequiredVariables::new("remote-api", ["TARGET_PROJECT_ID", "TARGET_APP_ID"])
            .when("TEST_MODE", "REMOTE"),
    ));

    loader.load(&LoadRequest::new("unit")).unwrap();
    let env_before = loader.environment().clone();
    let state_before = loader.state().cloned();

    // The trigger is staged from the layer, the side-load lacks a project id
    loader.replace_store(store(
        r#"
[layers.unit]
TEST_MODE = "REMOTE"

[layers.target]
APP_ID = "x"
"#,
    ));
    let err = loader
        .load(&LoadRequest::new("unit").side_load("target"))
        .unwrap_err();

    match &err {
        EnvLayerError::Rejected {
            validator,
            profile,
            rejection,
        } => {
            assert_eq!(validator, "remote-api");
            assert_eq!(profile, "unit");
            assert_eq!(rejection.missing, vec!["TARGET_PROJECT_ID".to_string()]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(loader.phase(), LoadPhase::Aborted);
    assert_eq!(loader.environment(), &env_before);
    assert_eq!(loader.state().cloned(), state_before);

    // Satisfied once the side-load provides the project id
    loader.replace_store(store(
        r#"
[layers.unit]
TEST_MODE = "REMOTE"

[layers.target]
APP_ID = "x"
PROJECT_ID = "$.projects.dev"
"#,
    ));
    let report = loader
        .load(&LoadRequest::new("unit").side_load("target"))
        .unwrap();
    assert_eq!(report.variables.value("TARGET_PROJECT_ID"), Some("proj-dev"));
}

#[test]
fn test_validator_is_skipped_when_not_applicable() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider).with_validator(Box::new(
        RequiredVariables::new("remote-api", ["TARGET_PROJECT_ID"]).when("TEST_MODE", "REMOTE"),
    ));

    let report = loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(!report.variables.contains("TARGET_PROJECT_ID"));
}

#[test]
fn test_secret_cache_is_shared_across_profiles() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(provider.calls(), 1);

    loader.load(&LoadRequest::new("prod")).unwrap();
    // Only db-password is new
    assert_eq!(provider.calls(), 2);
    assert!(loader.cache().contains("jwt-secret"));
}

#[test]
fn test_identical_load_is_skipped() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    let first = loader.load(&LoadRequest::new("prod")).unwrap();
    let second = loader.load(&LoadRequest::new("prod")).unwrap();

    assert!(second.reused);
    assert_eq!(first.variables, second.variables);
    assert_eq!(provider.calls(), 2);

    let forced = loader
        .load(&LoadRequest::new("prod").force_reload(true))
        .unwrap();
    assert!(!forced.reused);
}

#[test]
fn test_different_policy_is_not_skipped() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    let report = loader
        .load(&LoadRequest::new("unit").policy(FailurePolicy::Permissive))
        .unwrap();
    assert!(!report.reused);
}

#[test]
fn test_drift_refuses_skip() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    loader.environment_mut().set("STUB_DB", "false");
    assert_eq!(loader.drifted_variables(), vec!["STUB_DB".to_string()]);

    let report = loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(!report.reused);
    assert_eq!(loader.environment().get("STUB_DB").as_deref(), Some("true"));
    assert!(loader.drifted_variables().is_empty());
}

#[test]
fn test_changed_documents_are_not_skipped() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    loader.replace_store(store("[layers.unit]\nSTUB_DB = false\n"));

    let report = loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(!report.reused);
    assert_eq!(report.variables.value("STUB_DB"), Some("false"));
    // APP_ID came from the old `app` layer and is gone
    assert!(!loader.environment().contains("APP_ID"));
}

#[test]
fn test_cycles_do_not_abort() {
    let provider = default_provider();
    let mut loader = Loader::with_environment(
        store(
            r#"
[layers.a]
inherits = "b"
A = "1"

[layers.b]
inherits = "a"
B = "2"
"#,
        ),
        MemoryEnvironment::new(),
    )
    .with_secrets(Box::new(provider));

    let report = loader.load(&LoadRequest::new("a")).unwrap();
    assert_eq!(report.variables.value("A"), Some("1"));
    assert_eq!(report.variables.value("B"), Some("2"));
    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].kind(), FailureKind::CyclicInheritance);
}

#[test]
fn test_clear_removes_applied_variables() {
    let provider = default_provider();
    let env: MemoryEnvironment = [("HOME", "/home/dev")].into_iter().collect();
    let mut loader = loader_with(env, &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    let cleared = loader.clear();

    assert_eq!(cleared, vec!["APP_ID", "REGION", "STUB_DB"]);
    assert!(loader.state().is_none());
    assert_eq!(loader.phase(), LoadPhase::Idle);

    let expected: BTreeMap<String, String> =
        [("HOME".to_string(), "/home/dev".to_string())].into();
    assert_eq!(loader.environment().snapshot(), expected);

    assert!(loader.clear().is_empty());
}

#[test]
fn test_variables_set_after_first_load_are_not_preexisting() {
    let provider = default_provider();
    let mut loader = loader_with(MemoryEnvironment::new(), &provider);

    loader.load(&LoadRequest::new("unit")).unwrap();
    loader.environment_mut().set("DEBUG", "0");

    let report = loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(
        report.variables.get("DEBUG"),
        Some(&ResolvedVariable::new("true", Origin::ResolvedLiteral))
    );
}

#[test]
fn test_no_secret_store_by_default() {
    let mut loader = Loader::with_environment(store(LAYERS), MemoryEnvironment::new());

    let err = loader.load(&LoadRequest::new("dev")).unwrap_err();
    assert_eq!(
        err.failure().map(Failure::kind),
        Some(FailureKind::SecretStoreUnavailable)
    );
}
