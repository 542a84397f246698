use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::state::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileContent {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceResponse {
    #[serde(default)]
    structure: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct RenameResponse {
    new_path: String,
}

#[derive(Debug, Deserialize)]
struct MoveResponse {
    destination: String,
}

/// Success body of mutation endpoints; only the absence of `error` matters.
#[derive(Debug, Deserialize)]
struct Ack {}

#[derive(Debug, Serialize)]
struct PathBody<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct ContentBody<'a> {
    path: &'a str,
    content: &'a str,
}

/// JSON client for the workspace file API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|err| ApiError::Transport(format!("invalid server url {base_url}: {err}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub async fn workspace(&self) -> Result<Vec<TreeNode>, ApiError> {
        let response: WorkspaceResponse = self.get("/api/workspace", &[]).await?;
        Ok(response.structure)
    }

    pub async fn file(&self, path: &str) -> Result<FileContent, ApiError> {
        self.get("/api/file", &[("path", path)]).await
    }

    pub async fn save_file(&self, path: &str, content: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .post("/api/file/save", &ContentBody { path, content })
            .await?;
        Ok(())
    }

    pub async fn create_file(&self, path: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .post("/api/file/create", &ContentBody { path, content: "" })
            .await?;
        Ok(())
    }

    pub async fn create_directory(&self, path: &str) -> Result<(), ApiError> {
        let _: Ack = self.post("/api/directory/create", &PathBody { path }).await?;
        Ok(())
    }

    pub async fn rename(&self, path: &str, new_name: &str) -> Result<String, ApiError> {
        let response: RenameResponse = self
            .post("/api/file/rename", &json!({ "path": path, "new_name": new_name }))
            .await?;
        Ok(response.new_path)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let _: Ack = self.post("/api/delete", &PathBody { path }).await?;
        Ok(())
    }

    /// Moves `source` into the directory `destination`; returns the final path.
    pub async fn move_entry(&self, source: &str, destination: &str) -> Result<String, ApiError> {
        let response: MoveResponse = self
            .post(
                "/api/move",
                &json!({ "source": source, "destination": destination }),
            )
            .await?;
        Ok(response.destination)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        read_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    decode_envelope(status, &body)
}

/// Applies the API's envelope rules: an `error` field always wins, then the
/// HTTP status, then the typed body.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    let success = (200..300).contains(&status);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !success => return Err(ApiError::Status(status)),
        Err(err) => return Err(ApiError::Decode(err.to_string())),
    };

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ApiError::Server(message.to_string()));
    }
    if !success {
        return Err(ApiError::Status(status));
    }

    serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_wins_over_status() {
        let result: Result<FileContent, _> = decode_envelope(404, r#"{"error":"File does not exist"}"#);
        assert_eq!(result, Err(ApiError::Server("File does not exist".to_string())));

        let result: Result<FileContent, _> = decode_envelope(200, r#"{"error":"boom"}"#);
        assert_eq!(result, Err(ApiError::Server("boom".to_string())));
    }

    #[test]
    fn status_without_error_field() {
        let result: Result<Ack, _> = decode_envelope(502, "<html>bad gateway</html>");
        assert!(matches!(result, Err(ApiError::Status(502))));
        let result: Result<Ack, _> = decode_envelope(500, "{}");
        assert!(matches!(result, Err(ApiError::Status(500))));
        assert_eq!(ApiError::Status(500).to_string(), "Server error: 500");
    }

    #[test]
    fn decodes_typed_bodies() {
        let file: FileContent = decode_envelope(200, r##"{"path":"a.md","content":"# hi"}"##)
            .expect("file body decodes");
        assert_eq!(file.path, "a.md");
        assert_eq!(file.content, "# hi");

        let moved: MoveResponse = decode_envelope(
            200,
            r#"{"success":true,"source":"a.md","destination":"docs/a.md"}"#,
        )
        .expect("move body decodes");
        assert_eq!(moved.destination, "docs/a.md");

        let _: Ack = decode_envelope(200, r#"{"success":true}"#).expect("ack decodes");
    }

    #[test]
    fn missing_structure_means_empty_workspace() {
        let response: WorkspaceResponse = decode_envelope(200, "{}").expect("decodes");
        assert!(response.structure.is_empty());
    }

    #[test]
    fn undecodable_success_body() {
        let result: Result<RenameResponse, _> = decode_envelope(200, r#"{"success":true}"#);
        assert!(matches!(result, Err(ApiError::Decode(_))));
        let result: Result<Ack, _> = decode_envelope(200, "not json");
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn builds_endpoints_from_base_url() {
        let client = ApiClient::new("http://127.0.0.1:5001", Duration::from_secs(5))
            .expect("client builds");
        let url = client.endpoint("/api/file/save").expect("endpoint joins");
        assert_eq!(url.as_str(), "http://127.0.0.1:5001/api/file/save");
    }
}
