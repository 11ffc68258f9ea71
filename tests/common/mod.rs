use envlayer::provider::{SecretError, SecretsProvider};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test helper for creating temporary directories with layer documents
pub struct TestFixture {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            base_path,
        }
    }

    /// Write a file relative to the fixture root
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.base_path.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Shared layers plus a JSON document with local overrides
    pub fn create_layered_documents(&self) -> (PathBuf, PathBuf) {
        let base = self.write(
            "environments.toml",
            r#"
[layers.app]
APP_ID = "my-app"
REGION = "us-central1"
PORT = 8000

[layers.unit]
inherits = "app"
STUB_DB = true

[layers.dev]
inherits = "app"
PROJECT_ID = "$.projects.dev"
JWT_SECRET = "secret:jwt-secret"

[layers.e2e]
inherits = "dev"
BASE_URL = "http://localhost:8000"
"#,
        );

        let local = self.write(
            "environments.local.json",
            r#"{
  "layers": {
    "dev": { "REGION": "europe-west1" }
  }
}"#,
        );

        (base, local)
    }

    pub fn create_projects_file(&self) -> PathBuf {
        self.write(
            ".projects",
            "# aliases\ndev=my-app-dev  # TODO: move to shared project\nprod=my-app-prod\n",
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider backed by a map that counts lookups
#[derive(Clone, Default)]
pub struct CountingProvider {
    secrets: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl CountingProvider {
    pub fn with_secrets(secrets: &[(&str, &str)]) -> Self {
        let provider = Self::default();
        {
            let mut map = provider.secrets.lock().unwrap();
            for (name, value) in secrets {
                map.insert(name.to_string(), value.to_string());
            }
        }
        provider
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretsProvider for CountingProvider {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.secrets.lock().unwrap().get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> envlayer::Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
