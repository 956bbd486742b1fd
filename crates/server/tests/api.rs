use std::{
    collections::VecDeque,
    io::{Cursor, Read},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use local_deployment::LocalDeployment;
use serde_json::Value;
use services::services::{
    ai_client::{AiGatewayError, CompletionProvider},
    config::Config,
};
use tempfile::TempDir;

const PORTFOLIO: &str = "Here is your site.\n\n\
    **index.html**:\n```html\n<!DOCTYPE html>\n<html><body><h1>Lens</h1></body></html>\n```\n\n\
    **style.css**:\n```css\nh1 { color: #333; }\n```\n";

const PORTFOLIO_DARK: &str = "**index.html**:\n```html\n<html><body class=\"dark\"></body></html>\n```\n\
    **style.css**:\n```css\n.dark { background: #000; }\n```\n";

struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, AiGatewayError>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<&str, AiGatewayError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(str::to_string)).collect()),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AiGatewayError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AiGatewayError::EmptyResponse))
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    async fn start(provider: Arc<dyn CompletionProvider>) -> Self {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output").display().to_string();
        let config = Config::from_lookup(|key| match key {
            "OUTPUT_DIR" => Some(output.clone()),
            _ => None,
        })
        .unwrap();

        let deployment = LocalDeployment::with_provider(config, provider).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, server::router(deployment)).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_prompt(&self, path: &str, prompt: &str) -> (u16, Value) {
        let res = self
            .client
            .post(self.url(path))
            .form(&[("prompt", prompt)])
            .send()
            .await
            .unwrap();
        (res.status().as_u16(), res.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_generate_preview_refine_download_clear() {
    let server = TestServer::start(ScriptedProvider::new(vec![Ok(PORTFOLIO), Ok(PORTFOLIO_DARK)])).await;

    let (status, body) = server
        .post_prompt("/generate", "create a portfolio website for a photographer")
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["files_generated"], serde_json::json!(["index.html", "style.css"]));
    assert_eq!(body["new_tab_url"], "/output/index.html");
    assert_eq!(body["preview_url"], "/output/index.html?v=1");

    let res = server.client.get(server.url("/output/index.html")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["cache-control"], "no-store");
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    assert!(res.text().await.unwrap().contains("<h1>Lens</h1>"));

    let (status, body) = server.post_prompt("/refine", "make it dark").await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["preview_url"], "/output/index.html?v=2");

    let css = server
        .client
        .get(server.url("/output/style.css"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(css, ".dark { background: #000; }\n");

    let project: Value = server
        .client
        .get(server.url("/api/project"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(project["status"], "ready");
    assert_eq!(project["history"].as_array().unwrap().len(), 2);
    assert_eq!(project["history"][1]["kind"], "refinement");

    let res = server.client.get(server.url("/download-zip")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "application/zip");
    assert!(
        res.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("website.zip")
    );
    let bytes = res.bytes().await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut html = String::new();
    archive
        .by_name("index.html")
        .unwrap()
        .read_to_string(&mut html)
        .unwrap();
    assert!(html.contains("dark"));

    let res = server.client.post(server.url("/clear-all")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.json::<Value>().await.unwrap(), serde_json::json!({ "success": true }));

    let res = server.client.get(server.url("/download-zip")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 404);
    assert!(res.json::<Value>().await.unwrap()["error"].is_string());

    let res = server.client.get(server.url("/output/index.html")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn test_error_statuses() {
    let server = TestServer::start(ScriptedProvider::new(vec![
        Ok("I am unable to help with that."),
        Err(AiGatewayError::RateLimited),
    ]))
    .await;

    let (status, body) = server.post_prompt("/generate", "   ").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Please provide a prompt to generate your website.");

    let (status, _) = server.post_prompt("/refine", "make it blue").await;
    assert_eq!(status, 409);

    let (status, body) = server.post_prompt("/generate", "portfolio site").await;
    assert_eq!(status, 502);
    assert!(body["error"].as_str().unwrap().contains("Could not parse"));

    let (status, _) = server.post_prompt("/generate", "portfolio site").await;
    assert_eq!(status, 429);

    let project: Value = server
        .client
        .get(server.url("/api/project"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(project["status"], "failed");
    assert!(project["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_form_body_is_a_json_error() {
    let server = TestServer::start(ScriptedProvider::new(vec![])).await;

    let res = server
        .client
        .post(server.url("/generate"))
        .json(&serde_json::json!({ "prompt": "portfolio site" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 415);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    let res = server.client.post(server.url("/refine")).send().await.unwrap();
    assert!(res.status().is_client_error());
    assert!(res.json::<Value>().await.unwrap()["error"].is_string());
}

#[tokio::test]
async fn test_health_and_landing_page() {
    let server = TestServer::start(ScriptedProvider::new(vec![])).await;

    let health: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let res = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert!(res.text().await.unwrap().contains("<form"));

    let res = server.client.get(server.url("/site/style.css")).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "text/css");

    let res = server.client.get(server.url("/output/../Cargo.toml")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 404);
}
