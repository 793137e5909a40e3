//! Remote operations on the delivery config.
//!
//! All of them send the bytes last read from or written to disk, so callers
//! that edit the config should [`save`](DeliveryConfigProcessor::save) first.

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, DocumentError, RemoteError, Result};
use crate::model::{AccountDiffs, ActuationPlan, ManagedResourceDiff, PublishError, ValidationErrorDetail, flatten_diffs};
use crate::spinnaker::SpinnakerClient;

use super::DeliveryConfigProcessor;

const DELIVERY_CONFIGS_PATH: &str = "/managed/delivery-configs";

impl DeliveryConfigProcessor {
    /// Asks the API how the live resources differ from the config.
    ///
    /// Diffs of all accounts are returned as one list ordered by resource
    /// id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not the
    /// expected JSON.
    pub async fn diff(&mut self, client: &SpinnakerClient) -> Result<Vec<ManagedResourceDiff>> {
        self.ensure_loaded()?;
        let path = format!("{DELIVERY_CONFIGS_PATH}/diff");
        let body = client.post_yaml(&path, self.content()).await?;
        let batches: Vec<AccountDiffs> = serde_json::from_slice(&body).map_err(|e| {
            DocumentError::invalid_json(&body, e)
                .context(format!("failed to parse diff response from {}", client.url(&path)))
        })?;

        let diffs = flatten_diffs(batches);
        debug!(
            resources = diffs.len(),
            changed = diffs.iter().filter(|diff| diff.has_changes()).count(),
            "Received delivery config diff"
        );
        Ok(diffs)
    }

    /// Publishes the config.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::PublishFailed`] when the API rejects the config
    /// with an error document, or the underlying error otherwise.
    pub async fn publish(&mut self, client: &SpinnakerClient, force: bool) -> Result<()> {
        self.ensure_loaded()?;
        let path = format!("{DELIVERY_CONFIGS_PATH}?force={force}");
        match client.post_yaml(&path, self.content()).await {
            Ok(_) => {
                info!(path = %self.path().display(), force, "Published delivery config");
                Ok(())
            }
            Err(DeliveryError::Remote(RemoteError::UnexpectedResponse(response))) => {
                match response.parse::<PublishError>() {
                    Ok(publish_error) => {
                        warn!(status = response.status, "Delivery config rejected");
                        Err(RemoteError::PublishFailed(Box::new(publish_error)).into())
                    }
                    Err(_) => Err(RemoteError::UnexpectedResponse(response).into()),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Validates the config without publishing it.
    ///
    /// Returns `None` when the config is valid and the validation failure
    /// when the API answers 400.
    ///
    /// # Errors
    ///
    /// Returns an error for any other failure.
    pub async fn validate(&mut self, client: &SpinnakerClient) -> Result<Option<ValidationErrorDetail>> {
        self.ensure_loaded()?;
        let path = format!("{DELIVERY_CONFIGS_PATH}/validate");
        match client.post_yaml(&path, self.content()).await {
            Ok(_) => Ok(None),
            Err(DeliveryError::Remote(RemoteError::UnexpectedResponse(response)))
                if response.status == 400 =>
            {
                let detail = response.parse::<ValidationErrorDetail>().unwrap_or_else(|_| {
                    ValidationErrorDetail {
                        status: response.status,
                        message: response.body_text(),
                        ..ValidationErrorDetail::default()
                    }
                });
                debug!(%detail, "Delivery config failed validation");
                Ok(Some(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the config, addressed by its `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::MissingName`] if the config has no name, or
    /// an error if the request fails.
    pub async fn delete(&mut self, client: &SpinnakerClient) -> Result<()> {
        self.ensure_loaded()?;
        let name = self.delivery_config().name.clone();
        if name.is_empty() {
            return Err(DocumentError::MissingName.into());
        }
        client
            .request(
                Method::DELETE,
                &client.endpoint(&["managed", "delivery-configs", &name], &[]),
                None,
            )
            .await?;
        info!(%name, "Deleted delivery config");
        Ok(())
    }

    /// Asks the API which actions it would take for the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not the
    /// expected JSON.
    pub async fn plan(&mut self, client: &SpinnakerClient) -> Result<ActuationPlan> {
        self.ensure_loaded()?;
        let path = format!("{DELIVERY_CONFIGS_PATH}/actuation-plan");
        let body = client.post_yaml(&path, self.content()).await?;
        let plan = serde_json::from_slice(&body).map_err(|e| {
            DocumentError::invalid_json(&body, e)
                .context(format!("failed to parse actuation plan from {}", client.url(&path)))
        })?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiffStatus;
    use crate::processor::{DEFAULT_FILE_NAME, ProcessorConfig};
    use crate::spinnaker::HttpTransport;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONFIG: &str = "name: myapp-manifest\napplication: myapp\n";

    fn processor(dir: &TempDir, content: &str) -> DeliveryConfigProcessor {
        fs::write(dir.path().join(DEFAULT_FILE_NAME), content).unwrap();
        DeliveryConfigProcessor::new(ProcessorConfig::default().with_dir(dir.path()))
    }

    fn client(server: &MockServer) -> SpinnakerClient {
        SpinnakerClient::new(&server.uri(), Arc::new(HttpTransport::new())).unwrap()
    }

    #[tokio::test]
    async fn test_diff_flattens_and_orders() {
        let server = MockServer::start().await;
        let response = r#"[
            {"resourceDiffs": [
                {"status": "DIFF", "resourceId": "cluster:test:prod",
                 "diff": {"/capacity": {"state": "CHANGED", "desired": "3", "current": "1"}}},
                {"status": "NO_DIFF", "resourceId": "cluster:test:dev-v002"}
            ]},
            {"resourceDiffs": [
                {"status": "NO_DIFF", "resourceId": "cluster:test:dev-v001"},
                {"status": "NO_DIFF", "resourceId": "cluster:test:dev"}
            ]}
        ]"#;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/diff"))
            .and(body_string(CONFIG))
            .respond_with(ResponseTemplate::new(200).set_body_string(response))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let diffs = processor(&dir, CONFIG).diff(&client(&server)).await.unwrap();

        let ids: Vec<&str> = diffs.iter().map(|diff| diff.resource_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["cluster:test:dev", "cluster:test:dev-v001", "cluster:test:dev-v002", "cluster:test:prod"]
        );
        assert_eq!(diffs[3].status, DiffStatus::Diff);
        assert_eq!(diffs[3].diffs["/capacity"].desired, "3");
    }

    #[tokio::test]
    async fn test_diff_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/diff"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let err = processor(&dir, CONFIG).diff(&client(&server)).await.unwrap_err();

        assert!(matches!(
            err.document_error(),
            Some(DocumentError::InvalidContent { content, .. }) if content == b"<html>"
        ));
    }

    #[tokio::test]
    async fn test_publish_force() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs"))
            .and(query_param("force", "true"))
            .and(body_string(CONFIG))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        processor(&dir, CONFIG).publish(&client(&server), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_rejected_with_error_document() {
        let server = MockServer::start().await;
        let body = r#"{"status": 400, "error": "Bad Request", "message": "outer",
            "body": "{\"message\":\"artifact myapp is not used\"}"}"#;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs"))
            .and(query_param("force", "false"))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let err = processor(&dir, CONFIG)
            .publish(&client(&server), false)
            .await
            .unwrap_err();

        let DeliveryError::Remote(RemoteError::PublishFailed(publish_error)) = err else {
            panic!("expected the publish to be rejected");
        };
        assert_eq!(publish_error.message(), "artifact myapp is not used");
        assert_eq!(publish_error.status, 400);
    }

    #[tokio::test]
    async fn test_publish_unparseable_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let err = processor(&dir, CONFIG)
            .publish(&client(&server), false)
            .await
            .unwrap_err();

        assert_eq!(err.unexpected_response().map(|r| r.status), Some(502));
    }

    #[tokio::test]
    async fn test_validate() {
        let server = MockServer::start().await;
        let body = r#"{"error": "Bad Request", "status": 400, "message": "missing field",
            "pathExpression": ".environments[0]", "line": 4, "column": 3}"#;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/validate"))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let detail = processor(&dir, CONFIG)
            .validate(&client(&server))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(detail.message, "missing field");
        assert_eq!(detail.path_expression, ".environments[0]");
        assert_eq!(detail.line, Some(4));
        assert_eq!(detail.column, Some(3));
    }

    #[tokio::test]
    async fn test_validate_ok_and_plain_text_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/validate"))
            .and(body_string(CONFIG))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/validate"))
            .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        assert!(processor(&dir, CONFIG).validate(&client(&server)).await.unwrap().is_none());

        let detail = processor(&dir, "name: other\n")
            .validate(&client(&server))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.status, 400);
        assert_eq!(detail.message, "nope");
    }

    #[tokio::test]
    async fn test_validate_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/validate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let err = processor(&dir, CONFIG).validate(&client(&server)).await.unwrap_err();

        assert_eq!(err.unexpected_response().map(|r| r.status), Some(500));
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/managed/delivery-configs/myapp-manifest"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        processor(&dir, CONFIG).delete(&client(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_requires_name() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let err = processor(&dir, "application: myapp\n")
            .delete(&client(&server))
            .await
            .unwrap_err();

        assert!(matches!(err.document_error(), Some(DocumentError::MissingName)));
    }

    #[tokio::test]
    async fn test_plan() {
        let server = MockServer::start().await;
        let body = r#"{
            "application": "myapp",
            "updatedAt": "2024-03-01T12:00:00Z",
            "environmentPlans": [{
                "environment": "testing",
                "resourcePlans": [{
                    "environment": "testing",
                    "resourceId": "titus:cluster:test:myapp-test",
                    "isManaged": true,
                    "action": "UPDATE",
                    "diff": {"/capacity/desired": {"type": "CHANGED", "desired": "3", "current": "1"}}
                }]
            }]
        }"#;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/actuation-plan"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let plan = processor(&dir, CONFIG).plan(&client(&server)).await.unwrap();

        assert_eq!(plan.application, "myapp");
        let resource = &plan.environment_plans[0].resource_plans[0];
        assert!(resource.has_action());
        assert_eq!(resource.diff["/capacity/desired"].change_type, "CHANGED");
    }
}
