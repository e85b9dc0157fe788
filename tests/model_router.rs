use scour::llm::{GeminiClient, ModelRouter, TaskKind};

#[test]
fn default_client_returned_when_no_override() {
    let client = GeminiClient::new(
        "key".into(),
        "default-model".into(),
        100,
        Some("http://localhost:1".into()),
    )
    .unwrap();
    let router = ModelRouter::new(client);
    assert_eq!(
        router.client_for(TaskKind::Reflection).model(),
        "default-model"
    );
    assert_eq!(router.client_for(TaskKind::Answer).model(), "default-model");
}

#[test]
fn override_returns_custom_client() {
    let default = GeminiClient::new(
        "key".into(),
        "default-model".into(),
        100,
        Some("http://localhost:1".into()),
    )
    .unwrap();
    let custom = GeminiClient::new(
        "key".into(),
        "custom-model".into(),
        100,
        Some("http://localhost:1".into()),
    )
    .unwrap();
    let router = ModelRouter::new(default).with_client(TaskKind::QueryGeneration, custom);

    assert_eq!(
        router.client_for(TaskKind::QueryGeneration).model(),
        "custom-model"
    );
    assert_eq!(
        router.client_for(TaskKind::WebResearch).model(),
        "default-model"
    );
}
