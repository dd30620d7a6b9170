use anyhow::{Context as _, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use toolgate_http_tools::{ApiConfig, ConfigLoader, OutboundHttpSafety, RegistryOptions, ToolRegistry};
use toolgate_openapi_tools::{ImportOptions, SpecSource, import_openapi as run_import};
use tracing::info;

pub struct Settings {
    pub config: Option<PathBuf>,
    pub timeout_ms: u64,
    pub max_concurrent_requests: usize,
    pub max_response_bytes: usize,
    pub safety: OutboundHttpSafety,
}

impl Settings {
    fn load_config(&self) -> anyhow::Result<ApiConfig> {
        let mut loader = ConfigLoader::from_env().with_safety(self.safety.clone());
        if let Some(path) = &self.config {
            loader = loader.with_file(path)?;
        }
        loader.load().context("load API configuration")
    }

    fn registry(&self) -> anyhow::Result<ToolRegistry> {
        let config = self.load_config()?;
        let registry = ToolRegistry::new(
            config,
            RegistryOptions {
                safety: self.safety.clone(),
                default_timeout_ms: self.timeout_ms,
                max_concurrent_requests: self.max_concurrent_requests,
                max_response_bytes: self.max_response_bytes,
            },
        )
        .context("build tool registry")?;
        info!(tools = registry.len(), "tool registry ready");
        Ok(registry)
    }
}

pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    let registry = settings.registry()?;
    let config = registry.config();
    println!(
        "OK: {} API(s), {} tool(s)",
        config.apis.len(),
        registry.len()
    );
    for name in registry.tool_names() {
        if let Some((api, tool)) = registry.resolve(name) {
            println!(
                "  {name}  ({} {} {})",
                tool.method.as_str(),
                api.base_url.trim_end_matches('/'),
                tool.endpoint
            );
        }
    }
    Ok(())
}

pub fn list(settings: &Settings) -> anyhow::Result<()> {
    let registry = settings.registry()?;
    let tools = registry.list_tools();
    let out = serde_json::to_string_pretty(&tools).context("serialize tool list")?;
    println!("{out}");
    Ok(())
}

pub async fn call(settings: &Settings, tool: &str, args: &str) -> anyhow::Result<()> {
    let args: Value = serde_json::from_str(args).context("--args must be valid JSON")?;
    if !(args.is_object() || args.is_null()) {
        bail!("--args must be a JSON object");
    }

    let registry = settings.registry()?;
    let result = registry.invoke(tool, args).await?;
    for content in &result.content {
        if let Some(text) = content.as_text() {
            println!("{}", text.text);
        }
    }
    Ok(())
}

pub async fn import_openapi(
    settings: &Settings,
    source: &str,
    options: &ImportOptions,
    spec_hash: Option<&str>,
    output: Option<&Path>,
    previews: Option<&Path>,
) -> anyhow::Result<()> {
    let source = SpecSource::parse(source)?;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("build HTTP client")?;
    let spec = source.load(&client, &settings.safety, spec_hash).await?;

    let imported = run_import(&spec, options)?;
    for skipped in &imported.skipped {
        eprintln!("skipped {skipped}");
    }

    let draft = serde_json::to_string_pretty(&imported.config).context("serialize draft")?;
    match output {
        Some(path) => {
            std::fs::write(path, draft)
                .with_context(|| format!("write {}", path.display()))?;
            eprintln!(
                "wrote {} tool(s) to {}",
                imported.config.tool_count(),
                path.display()
            );
        }
        None => println!("{draft}"),
    }

    if let Some(path) = previews {
        let bytes =
            serde_json::to_vec_pretty(&imported.previews).context("serialize previews")?;
        std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}
