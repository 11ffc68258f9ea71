use crate::common::TestFixture;
use envlayer::{EnvLayerError, Expression, LayerStore, ParseError, resolve_layer_chain};

// Parsing details are unit-tested in envlayer-core; these go through the
// public API and its error conversions.

#[test]
fn test_merged_documents_resolve_end_to_end() {
    let fixture = TestFixture::new();
    let (base, local) = fixture.create_layered_documents();

    let store = LayerStore::from_paths(&[base, local]).unwrap();
    assert_eq!(store.sources().len(), 2);

    let table = resolve_layer_chain("e2e", &store).unwrap();
    assert!(matches!(
        table.entries.get("JWT_SECRET"),
        Some(Expression::Secret(name)) if name == "jwt-secret"
    ));
    assert!(matches!(
        table.entries.get("PROJECT_ID"),
        Some(Expression::ProjectAlias(alias)) if alias == "dev"
    ));
    assert!(table.entries.contains_key("BASE_URL"));
    assert!(table.cycles.is_empty());
}

#[test]
fn test_missing_document_error() {
    let fixture = TestFixture::new();
    let missing = fixture.base_path.join("environments.toml");

    let err: EnvLayerError = LayerStore::from_paths(&[missing]).unwrap_err().into();
    match err {
        EnvLayerError::DocumentNotFound(message) => {
            assert!(message.contains("environments.toml"))
        }
        other => panic!("expected missing document, got {:?}", other),
    }
}

#[test]
fn test_malformed_reference_error() {
    let fixture = TestFixture::new();
    let path = fixture.write(
        "environments.toml",
        "[layers.dev]\nPROJECT_ID = \"$.projects\"\n",
    );

    let parse_err = LayerStore::from_paths(&[path]).unwrap_err();
    assert!(matches!(parse_err, ParseError::InvalidExpression { .. }));

    let err: EnvLayerError = parse_err.into();
    match err {
        EnvLayerError::InvalidDocument(message) => {
            assert!(message.contains("PROJECT_ID"));
            assert!(message.contains("dev"));
        }
        other => panic!("expected invalid document, got {:?}", other),
    }
}

#[test]
fn test_invalid_toml_error() {
    let fixture = TestFixture::new();
    let path = fixture.write("environments.toml", "[layers.dev\n");

    let err: EnvLayerError = LayerStore::from_paths(&[path]).unwrap_err().into();
    assert!(matches!(err, EnvLayerError::Toml(_)));
}
