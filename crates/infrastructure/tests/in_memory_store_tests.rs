use anyhow::Result;
use inspection_domain::{
    JobMode, ScriptParam, ScriptStore, Template, TemplateStore,
};
use inspection_infrastructure::{InMemoryScriptStore, InMemoryTemplateStore};

#[tokio::test]
async fn test_in_memory_script_params_follow_template() -> Result<()> {
    let templates = InMemoryTemplateStore::new();
    let scripts = InMemoryScriptStore::new(templates.clone());

    let id = templates
        .insert(
            &Template::new("gpu", "c1", JobMode::Regular, "Z3200", "alice"),
            &[ScriptParam {
                script_name: "ecc_check".to_string(),
                params: [("threshold".to_string(), "5".to_string())].into(),
            }],
        )
        .await?;

    let params = scripts.find_params_by_template(id, "ecc_check").await?;
    assert_eq!(params.get("threshold").map(String::as_str), Some("5"));

    // 同名模板在同一集群只能有一个
    let duplicate = templates
        .insert(&Template::new("gpu", "c1", JobMode::Regular, "Z3200", "bob"), &[])
        .await;
    assert!(duplicate.is_err());

    templates.delete("gpu", "c1").await?;
    assert!(scripts.find_params_by_template(id, "ecc_check").await?.is_empty());
    Ok(())
}
