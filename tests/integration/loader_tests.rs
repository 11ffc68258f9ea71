use crate::common::{CountingProvider, TestFixture};
use envlayer::{
    Environment, Failure, LayerStore, LoadPhase, LoadRequest, Loader, MemoryEnvironment, Origin,
    ProcessEnvironment, ProjectsFile,
};
use serial_test::serial;

fn fixture_loader(
    fixture: &TestFixture,
    provider: &CountingProvider,
) -> Loader<MemoryEnvironment> {
    let (base, local) = fixture.create_layered_documents();
    let projects = fixture.create_projects_file();
    let store = LayerStore::from_paths(&[base, local]).unwrap();

    Loader::with_environment(store, MemoryEnvironment::new())
        .with_secrets(Box::new(provider.clone()))
        .with_projects(Box::new(ProjectsFile::new(projects)))
}

#[test]
fn test_load_from_documents_on_disk() {
    let fixture = TestFixture::new();
    let provider = CountingProvider::with_secrets(&[("jwt-secret", "signing-key")]);
    let mut loader = fixture_loader(&fixture, &provider);

    let report = loader.load(&LoadRequest::new("dev")).unwrap();

    assert_eq!(report.variables.value("APP_ID"), Some("my-app"));
    assert_eq!(report.variables.value("PORT"), Some("8000"));
    // Overridden by the JSON document
    assert_eq!(report.variables.value("REGION"), Some("europe-west1"));
    assert_eq!(
        report.variables.get("PROJECT_ID").map(|v| v.origin),
        Some(Origin::ResolvedProjectAlias)
    );
    assert_eq!(report.variables.value("PROJECT_ID"), Some("my-app-dev"));
    assert_eq!(report.variables.value("JWT_SECRET"), Some("signing-key"));

    let env = loader.environment();
    assert_eq!(env.get("JWT_SECRET").as_deref(), Some("signing-key"));
    assert_eq!(env.get("PROJECT_ID").as_deref(), Some("my-app-dev"));
}

#[test]
fn test_side_loaded_e2e_profile() {
    let fixture = TestFixture::new();
    let provider = CountingProvider::with_secrets(&[("jwt-secret", "signing-key")]);
    let mut loader = fixture_loader(&fixture, &provider);

    let report = loader
        .load(&LoadRequest::new("unit").side_load("e2e"))
        .unwrap();

    assert_eq!(report.variables.value("STUB_DB"), Some("true"));
    assert_eq!(
        report.variables.value("TARGET_BASE_URL"),
        Some("http://localhost:8000")
    );
    assert_eq!(report.variables.value("TARGET_JWT_SECRET"), Some("signing-key"));
    assert!(!report.variables.contains("BASE_URL"));
    assert!(!report.variables.contains("JWT_SECRET"));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_project_mapping_edits_are_picked_up() {
    let fixture = TestFixture::new();
    let provider = CountingProvider::with_secrets(&[("jwt-secret", "signing-key")]);
    let mut loader = fixture_loader(&fixture, &provider);

    loader.load(&LoadRequest::new("dev")).unwrap();
    fixture.write(".projects", "dev=renamed-dev\n");

    let report = loader.load(&LoadRequest::new("dev")).unwrap();
    assert!(!report.reused);
    assert_eq!(report.variables.value("PROJECT_ID"), Some("renamed-dev"));
}

#[test]
fn test_unknown_alias_reports_alias() {
    let fixture = TestFixture::new();
    let provider = CountingProvider::with_secrets(&[("jwt-secret", "signing-key")]);
    let mut loader = fixture_loader(&fixture, &provider);
    fixture.write(".projects", "prod=my-app-prod\n");

    let err = loader.load(&LoadRequest::new("dev")).unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::ProjectAliasNotFound {
            alias: "dev".into()
        })
    );
    assert_eq!(loader.phase(), LoadPhase::Aborted);
    assert!(loader.environment().snapshot().is_empty());
}

#[test]
fn test_reloading_documents_after_edit() {
    let fixture = TestFixture::new();
    let provider = CountingProvider::with_secrets(&[("jwt-secret", "signing-key")]);
    let mut loader = fixture_loader(&fixture, &provider);

    let first = loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(!first.reused);

    let path = fixture.write(
        "environments.toml",
        "[layers.unit]\nSTUB_DB = false\n",
    );
    loader.replace_store(LayerStore::from_paths(&[path]).unwrap());

    let second = loader.load(&LoadRequest::new("unit")).unwrap();
    assert!(!second.reused);
    assert_eq!(second.variables.len(), 1);
    assert!(!loader.environment().contains("APP_ID"));
}

#[test]
#[serial]
fn test_process_environment_round_trip() {
    let fixture = TestFixture::new();
    let path = fixture.write(
        "environments.toml",
        r#"
[layers.itest]
ENVLAYER_ITEST_APP = "process"
ENVLAYER_ITEST_PRESET = "from-layer"
"#,
    );

    // SAFETY: serialized with every other test touching the environment
    unsafe {
        std::env::set_var("ENVLAYER_ITEST_PRESET", "from-shell");
    }

    let mut loader = Loader::new(LayerStore::from_paths(&[path]).unwrap());
    let report = loader.load(&LoadRequest::new("itest")).unwrap();

    assert_eq!(
        report.variables.get("ENVLAYER_ITEST_PRESET").map(|v| v.origin),
        Some(Origin::PreexistingEnvironment)
    );
    assert_eq!(std::env::var("ENVLAYER_ITEST_APP").as_deref(), Ok("process"));
    assert_eq!(
        std::env::var("ENVLAYER_ITEST_PRESET").as_deref(),
        Ok("from-shell")
    );

    loader.clear();
    assert!(std::env::var("ENVLAYER_ITEST_APP").is_err());
    assert_eq!(
        std::env::var("ENVLAYER_ITEST_PRESET").as_deref(),
        Ok("from-shell")
    );
    assert!(ProcessEnvironment.get("ENVLAYER_ITEST_PRESET").is_some());

    unsafe {
        std::env::remove_var("ENVLAYER_ITEST_PRESET");
    }
}
