use crate::common::TestFixture;
use envlayer::provider::SecretsProvider;
use envlayer::{
    Failure, FailureKind, LayerStore, LoadRequest, Loader, MemoryEnvironment, ProjectsFile,
};
use serial_test::serial;

fn dotenv_provider(fixture: &TestFixture) -> Box<dyn SecretsProvider> {
    let uri = format!("dotenv:{}", fixture.base_path.join(".secrets.env").display());
    Box::<dyn SecretsProvider>::try_from(uri.as_str()).unwrap()
}

#[test]
fn test_dotenv_store_feeds_loader() {
    let fixture = TestFixture::new();
    let (base, _) = fixture.create_layered_documents();
    let projects = fixture.create_projects_file();

    dotenv_provider(&fixture)
        .set("jwt-secret", "from-dotenv")
        .unwrap();

    let mut loader = Loader::with_environment(
        LayerStore::from_paths(&[base]).unwrap(),
        MemoryEnvironment::new(),
    )
    .with_secrets(dotenv_provider(&fixture))
    .with_projects(Box::new(ProjectsFile::new(projects)));

    let report = loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(report.variables.value("JWT_SECRET"), Some("from-dotenv"));
}

#[test]
fn test_missing_dotenv_store_is_unavailable() {
    let fixture = TestFixture::new();
    let (base, _) = fixture.create_layered_documents();
    let projects = fixture.create_projects_file();

    let mut loader = Loader::with_environment(
        LayerStore::from_paths(&[base]).unwrap(),
        MemoryEnvironment::new(),
    )
    .with_secrets(dotenv_provider(&fixture))
    .with_projects(Box::new(ProjectsFile::new(projects)));

    let err = loader.load(&LoadRequest::new("dev")).unwrap_err();
    let failure = err.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::SecretStoreUnavailable);
    assert_eq!(failure.secret_name(), Some("jwt-secret"));
}

#[test]
fn test_missing_secret_in_dotenv_store() {
    let fixture = TestFixture::new();
    let (base, _) = fixture.create_layered_documents();
    let projects = fixture.create_projects_file();
    fixture.write(".secrets.env", "OTHER='x'\n");

    let mut loader = Loader::with_environment(
        LayerStore::from_paths(&[base]).unwrap(),
        MemoryEnvironment::new(),
    )
    .with_secrets(dotenv_provider(&fixture))
    .with_projects(Box::new(ProjectsFile::new(projects)));

    let err = loader.load(&LoadRequest::new("dev")).unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::SecretNotFound {
            secret: "jwt-secret".into()
        })
    );
}

#[test]
#[serial]
fn test_env_provider_reads_ci_variables() {
    let fixture = TestFixture::new();
    let (base, _) = fixture.create_layered_documents();
    let projects = fixture.create_projects_file();

    // SAFETY: serialized with every other test touching the environment
    unsafe {
        std::env::set_var("ITEST_CI_JWT_SECRET", "from-ci");
    }

    let mut loader = Loader::with_environment(
        LayerStore::from_paths(&[base]).unwrap(),
        MemoryEnvironment::new(),
    )
    .with_secrets(Box::<dyn SecretsProvider>::try_from("env://ITEST_CI_").unwrap())
    .with_projects(Box::new(ProjectsFile::new(projects)));

    let report = loader.load(&LoadRequest::new("dev")).unwrap();
    assert_eq!(report.variables.value("JWT_SECRET"), Some("from-ci"));

    unsafe {
        std::env::remove_var("ITEST_CI_JWT_SECRET");
    }
}
