//! HTTP client for the spreadsheet middleware endpoint.

use reqwest::multipart::{Form, Part};
use reqwest::Response;

use crate::error::{Error, Result};
use crate::models::{CollectionName, PhotoUpload, Record};
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{
    parse_fetch_body, parse_write_body, PhotoReceipt, RemoteError, RemoteResult, RemoteService,
};

/// `RemoteService` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Builds a client for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self { endpoint, client })
    }

    /// Returns the endpoint this client was configured with.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read_body(response: Response) -> RemoteResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: compact_text(&body),
            });
        }
        Ok(body)
    }
}

impl RemoteService for HttpRemote {
    async fn fetch(
        &self,
        collection: &CollectionName,
        params: &[(String, String)],
    ) -> RemoteResult<Vec<Record>> {
        let mut query = vec![
            ("action".to_string(), "get".to_string()),
            ("sheet".to_string(), collection.to_string()),
        ];
        query.extend(
            params
                .iter()
                .filter(|(key, _)| key != "action" && key != "sheet")
                .cloned(),
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        parse_fetch_body(&body)
    }

    async fn update(
        &self,
        collection: &CollectionName,
        record: &Record,
        timestamp: &str,
    ) -> RemoteResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "action": "update",
                "sheet": collection.as_str(),
                "data": record,
                "timestamp": timestamp,
            }))
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        parse_write_body(&body).map(|_| ())
    }

    async fn upload_photo(
        &self,
        site_id: &str,
        caption: &str,
        photo: &PhotoUpload,
    ) -> RemoteResult<PhotoReceipt> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.file_type)?;
        let form = Form::new()
            .text("action", "uploadPhoto")
            .text("siteId", site_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        parse_write_body(&body)
    }

    async fn ping(&self) -> RemoteResult<()> {
        // Any HTTP answer means the endpoint is reachable.
        self.client
            .get(&self.endpoint)
            .query(&[("action", "ping")])
            .send()
            .await?;
        Ok(())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{FromRequest, Multipart, Query, Request, State};
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn handle_get(Query(query): Query<HashMap<String, String>>) -> AxumResponse {
        match (query.get("action").map(String::as_str), query.get("sheet").map(String::as_str)) {
            (Some("ping"), _) => StatusCode::NO_CONTENT.into_response(),
            (Some("get"), Some("sites")) => Json(json!([
                {"id": "1", "name": "Depot", "week": query.get("week")},
                {"id": "2", "name": "Bridge", "week": query.get("week")}
            ]))
            .into_response(),
            (Some("get"), Some("broken")) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
            }
            _ => Json(json!({"error": "Invalid sheet"})).into_response(),
        }
    }

    async fn handle_post(State(received): State<Received>, request: Request) -> AxumResponse {
        let is_json = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<Value>::from_request(request, &()).await.unwrap();
            received.lock().unwrap().push(body);
            return Json(json!({"success": true})).into_response();
        }

        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        let mut fields = serde_json::Map::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if name == "photo" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                fields.insert("fileName".to_string(), json!(file_name));
                fields.insert("photoBytes".to_string(), json!(bytes.to_vec()));
            } else {
                fields.insert(name, json!(field.text().await.unwrap()));
            }
        }
        received.lock().unwrap().push(Value::Object(fields));
        Json(json!({"success": true, "url": "https://drive.example/photo/1"})).into_response()
    }

    async fn spawn_endpoint() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/exec", get(handle_get).post(handle_post))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/exec"), received)
    }

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("script.example.com/exec".to_string()).is_err());
        assert_eq!(
            normalize_endpoint(" https://script.example.com/exec/ ".to_string()).unwrap(),
            "https://script.example.com/exec"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_sends_sheet_and_extra_params() {
        let (endpoint, _) = spawn_endpoint().await;
        let remote = HttpRemote::new(endpoint).unwrap();

        let records = remote
            .fetch(
                &CollectionName::new("sites").unwrap(),
                &[("week".to_string(), "12".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Depot");
        assert_eq!(records[1]["week"], "12");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_maps_failures() {
        let (endpoint, _) = spawn_endpoint().await;
        let remote = HttpRemote::new(endpoint).unwrap();

        let error = remote
            .fetch(&CollectionName::new("broken").unwrap(), &[])
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Status { status: 500, .. }));

        let error = remote
            .fetch(&CollectionName::new("unknown").unwrap(), &[])
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Api(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_posts_json_envelope() {
        let (endpoint, received) = spawn_endpoint().await;
        let remote = HttpRemote::new(endpoint).unwrap();

        remote
            .update(
                &CollectionName::progress(),
                &json!({"siteId": "1", "percentage": 75}),
                "2026-10-18T08:00:00.000Z",
            )
            .await
            .unwrap();

        let received = received.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![json!({
                "action": "update",
                "sheet": "progress",
                "data": {"siteId": "1", "percentage": 75},
                "timestamp": "2026-10-18T08:00:00.000Z"
            })]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_photo_sends_multipart_form() {
        let (endpoint, received) = spawn_endpoint().await;
        let remote = HttpRemote::new(endpoint).unwrap();
        let photo = PhotoUpload::new(vec![0xFF, 0xD8, 0x00, 0x7F], "crane.jpg", "image/jpeg").unwrap();

        let receipt = remote.upload_photo("3", "crane on site", &photo).await.unwrap();
        assert_eq!(receipt.url.as_deref(), Some("https://drive.example/photo/1"));

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["action"], "uploadPhoto");
        assert_eq!(received[0]["siteId"], "3");
        assert_eq!(received[0]["caption"], "crane on site");
        assert_eq!(received[0]["fileName"], "crane.jpg");
        assert_eq!(received[0]["photoBytes"], json!([255, 216, 0, 127]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_succeeds_against_live_endpoint() {
        let (endpoint, _) = spawn_endpoint().await;
        let remote = HttpRemote::new(endpoint).unwrap();
        remote.ping().await.unwrap();

        let unreachable = HttpRemote::new("http://127.0.0.1:9/exec").unwrap();
        assert!(unreachable.ping().await.is_err());
    }
}
