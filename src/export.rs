//! Export of live application resources into the delivery config.
//!
//! The workflow discovers everything deployed for an application, selects
//! the resources to export, merges their delivery config representation into
//! the local file and records the artifacts clusters deploy. Failures on a
//! single resource are collected and the remaining resources are still
//! exported.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{DeliveryArtifact, NETWORK_LOAD_BALANCER_RESOURCE_TYPE, ResourceIdentity};
use crate::processor::{DEFAULT_ENVIRONMENTS, DeliveryConfigProcessor};
use crate::spinnaker::{
    SpinnakerClient, export_artifact, export_resource, exportable_application_resources,
    find_application_resources,
};

/// Which discovered resources to export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every exportable resource.
    #[default]
    All,
    /// Only the clusters with these names.
    Clusters(Vec<String>),
}

/// Options for [`export_application`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Resources to export.
    pub selection: Selection,
    /// Only export resources in this account.
    pub only_account: Option<String>,
    /// Environment for every exported resource, overriding the current one.
    pub env_name: Option<String>,
    /// Environment for resources not yet in the config.
    pub default_env: String,
    /// Service account passed to the export endpoint.
    pub service_account: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            selection: Selection::All,
            only_account: None,
            env_name: None,
            default_env: DEFAULT_ENVIRONMENTS[0].to_string(),
            service_account: String::new(),
        }
    }
}

/// One resource written to the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedResource {
    /// The resource.
    pub identity: ResourceIdentity,
    /// Environment it was written to.
    pub environment: String,
    /// True if it was added, false if an existing entry was replaced.
    pub added: bool,
}

/// One resource that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    /// The resource.
    pub identity: ResourceIdentity,
    /// What went wrong.
    pub message: String,
}

/// Result of an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Application name.
    pub app_name: String,
    /// Resources written to the config.
    pub resources: Vec<ExportedResource>,
    /// Artifacts added to the config, ordered by name and type.
    pub added_artifacts: Vec<DeliveryArtifact>,
    /// Resources that cannot be exported.
    pub skipped: Vec<ResourceIdentity>,
    /// Resources that failed to export.
    pub errors: Vec<ExportFailure>,
}

impl ExportSummary {
    /// Returns true if every selected resource was exported.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Exports the resources of `app_name` into the processor's config file.
///
/// The config is saved once at the end, even when some resources failed.
///
/// # Errors
///
/// Returns an error if discovery fails or the config cannot be loaded or
/// saved. Failures on individual resources are reported in the summary.
pub async fn export_application(
    client: &SpinnakerClient,
    processor: &mut DeliveryConfigProcessor,
    app_name: &str,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let resources = find_application_resources(client, app_name).await?;
    let mut summary = ExportSummary {
        app_name: app_name.to_string(),
        ..ExportSummary::default()
    };

    let mut candidates = exportable_application_resources(&resources);
    if let Some(account) = &options.only_account {
        candidates.retain(|identity| &identity.account == account);
    }
    if candidates.is_empty() {
        info!(app = app_name, "No resources to export");
        return Ok(summary);
    }

    processor.load()?;

    for identity in candidates {
        if identity.resource_type == NETWORK_LOAD_BALANCER_RESOURCE_TYPE {
            warn!(resource = %identity, "Cannot export network load balancers, skipping");
            summary.skipped.push(identity);
            continue;
        }
        if !is_selected(&options.selection, &identity) {
            continue;
        }

        info!(resource = %identity, "Exporting");
        let env_name = options
            .env_name
            .clone()
            .or_else(|| processor.which_environment(&identity))
            .unwrap_or_else(|| options.default_env.clone());

        match export_one(client, processor, &identity, &env_name, &options.service_account).await {
            Ok((added, artifact)) => {
                summary.added_artifacts.extend(artifact);
                summary.resources.push(ExportedResource {
                    identity,
                    environment: env_name,
                    added,
                });
            }
            Err(e) => {
                warn!(resource = %identity, error = %e, "Failed to export");
                summary.errors.push(ExportFailure {
                    identity,
                    message: e.to_string(),
                });
            }
        }
    }

    summary.added_artifacts.sort_by(DeliveryArtifact::display_order);
    processor.save()?;
    Ok(summary)
}

fn is_selected(selection: &Selection, identity: &ResourceIdentity) -> bool {
    match selection {
        Selection::All => true,
        Selection::Clusters(names) => identity.is_cluster() && names.contains(&identity.name),
    }
}

/// Exports one resource. Returns whether it was added and the artifact it
/// added to the config, if any.
async fn export_one(
    client: &SpinnakerClient,
    processor: &mut DeliveryConfigProcessor,
    identity: &ResourceIdentity,
    env_name: &str,
    service_account: &str,
) -> Result<(bool, Option<DeliveryArtifact>)> {
    let content = export_resource(client, identity, service_account).await?;
    let added = processor.upsert_resource(identity, env_name, &content)?;
    if !identity.is_cluster() {
        return Ok((added, None));
    }

    let mut artifact: DeliveryArtifact = export_artifact(client, identity).await?;
    let inserted = processor.insert_artifact(&mut artifact)?;
    if let Some(reference) = &inserted.updated_ref {
        warn!(resource = %identity, %reference, "Artifact reference changed to avoid a collision");
        let content = DeliveryConfigProcessor::update_artifact_reference(&content, reference)?;
        processor.upsert_resource(identity, env_name, &content)?;
    }

    Ok((added, inserted.added.then_some(artifact)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{DEFAULT_FILE_NAME, ProcessorConfig};
    use crate::spinnaker::HttpTransport;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SERVER_GROUPS: &str = r#"[
        {"name": "myapp-test-v001", "account": "test", "region": "us-east-1", "type": "titus",
         "moniker": {"app": "myapp", "cluster": "myapp-test", "stack": "test"}},
        {"name": "myapp-prod-v004", "account": "prod", "region": "us-east-1", "type": "titus",
         "moniker": {"app": "myapp", "cluster": "myapp-prod", "stack": "prod"}}
    ]"#;

    const LOAD_BALANCERS: &str = r#"[
        {"name": "myapp-nlb", "account": "test", "type": "aws", "loadBalancerType": "network",
         "targetGroups": [{"name": "tg"}]}
    ]"#;

    const ARTIFACT: &str = "name: myapp\ntype: docker\ntagVersionStrategy: semver-tag\n";

    fn cluster_yaml(stack: &str, account: &str) -> String {
        format!(
            "kind: titus/cluster@v1\nspec:\n  moniker:\n    app: myapp\n    stack: {stack}\n  \
             locations:\n    account: {account}\n    regions:\n      - name: us-east-1\n  \
             container:\n    reference: myapp\n"
        )
    }

    async fn mount_json(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn discovery_server() -> MockServer {
        let server = MockServer::start().await;
        mount_json(&server, "/applications/myapp/serverGroups", SERVER_GROUPS).await;
        mount_json(&server, "/applications/myapp/loadBalancers", LOAD_BALANCERS).await;
        mount_json(&server, "/search", "[]").await;
        server
    }

    async fn mount_cluster(server: &MockServer, stack: &str, account: &str, artifact: &str) {
        let name = format!("myapp-{stack}");
        Mock::given(method("GET"))
            .and(path(format!("/managed/resources/export/titus/{account}/cluster/{name}")))
            .and(query_param("serviceAccount", "me@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string(cluster_yaml(stack, account)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/managed/resources/export/artifact/titus/{account}/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(artifact))
            .mount(server)
            .await;
    }

    fn setup(dir: &TempDir) -> DeliveryConfigProcessor {
        DeliveryConfigProcessor::new(
            ProcessorConfig::default()
                .with_dir(dir.path())
                .with_app_name("myapp"),
        )
    }

    fn options() -> ExportOptions {
        ExportOptions {
            service_account: String::from("me@example.com"),
            ..ExportOptions::default()
        }
    }

    fn client(server: &MockServer) -> SpinnakerClient {
        SpinnakerClient::new(&server.uri(), Arc::new(HttpTransport::new())).unwrap()
    }

    fn artifact_refs(summary: &ExportSummary) -> Vec<&str> {
        summary
            .added_artifacts
            .iter()
            .map(DeliveryArtifact::ref_name)
            .collect()
    }

    #[tokio::test]
    async fn test_export_all_with_artifact_collision() {
        let server = discovery_server().await;
        mount_cluster(&server, "test", "test", ARTIFACT).await;
        mount_cluster(
            &server,
            "prod",
            "prod",
            "name: myapp\ntype: docker\ntagVersionStrategy: increasing-tag\n",
        )
        .await;
        let dir = TempDir::new().unwrap();
        let mut processor = setup(&dir);

        let summary = export_application(&client(&server), &mut processor, "myapp", &options())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].name, "myapp-nlb");
        assert_eq!(summary.resources.len(), 2);
        assert!(summary.resources.iter().all(|r| r.added && r.environment == "testing"));
        assert_eq!(artifact_refs(&summary), vec!["myapp", "myapp-1"]);

        let saved = fs::read_to_string(dir.path().join(DEFAULT_FILE_NAME)).unwrap();
        assert!(saved.starts_with("name: myapp-manifest\napplication: myapp\n"));
        assert!(saved.contains("kind: titus/cluster@v1 # myapp-prod/prod"));
        assert!(saved.contains("reference: myapp-1\n"));
        assert_eq!(processor.delivery_config().artifacts.len(), 2);
        assert_eq!(processor.delivery_config().environments[0].resources.len(), 2);
    }

    #[tokio::test]
    async fn test_export_lists_added_artifacts_by_name() {
        let server = discovery_server().await;
        mount_cluster(&server, "test", "test", "name: alpha\ntype: docker\n").await;
        mount_cluster(
            &server,
            "prod",
            "prod",
            "name: zeta\ntype: docker\ntagVersionStrategy: increasing-tag\n",
        )
        .await;
        let dir = TempDir::new().unwrap();
        let mut processor = setup(&dir);

        let summary = export_application(&client(&server), &mut processor, "myapp", &options())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(artifact_refs(&summary), vec!["alpha", "zeta"]);
        let names: Vec<&str> = processor
            .delivery_config()
            .artifacts
            .iter()
            .map(|artifact| artifact.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_export_clusters_into_existing_environment() {
        let server = discovery_server().await;
        mount_cluster(&server, "prod", "prod", ARTIFACT).await;
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(DEFAULT_FILE_NAME),
            format!(
                "environments:\n  - name: production\n    resources:\n{}",
                cluster_yaml("prod", "prod")
                    .lines()
                    .enumerate()
                    .map(|(i, line)| if i == 0 { format!("      - {line}\n") } else { format!("        {line}\n") })
                    .collect::<String>()
            ),
        )
        .unwrap();
        let mut processor = setup(&dir);
        let opts = ExportOptions {
            selection: Selection::Clusters(vec![String::from("myapp-prod")]),
            ..options()
        };

        let summary = export_application(&client(&server), &mut processor, "myapp", &opts)
            .await
            .unwrap();

        assert_eq!(summary.resources.len(), 1);
        assert_eq!(summary.resources[0].environment, "production");
        assert!(!summary.resources[0].added);
        assert_eq!(artifact_refs(&summary), vec!["myapp"]);
        assert_eq!(processor.delivery_config().environments.len(), 1);
    }

    #[tokio::test]
    async fn test_export_collects_per_resource_errors() {
        let server = discovery_server().await;
        mount_cluster(&server, "test", "test", ARTIFACT).await;
        Mock::given(method("GET"))
            .and(path("/managed/resources/export/titus/prod/cluster/myapp-prod"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let mut processor = setup(&dir);
        let opts = ExportOptions {
            env_name: Some(String::from("staging")),
            ..options()
        };

        let summary = export_application(&client(&server), &mut processor, "myapp", &opts)
            .await
            .unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].identity.name, "myapp-prod");
        assert_eq!(summary.resources.len(), 1);
        assert_eq!(summary.resources[0].environment, "staging");
        assert!(dir.path().join(DEFAULT_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_export_account_filter_leaves_nothing() {
        let server = discovery_server().await;
        let dir = TempDir::new().unwrap();
        let mut processor = setup(&dir);
        let opts = ExportOptions {
            only_account: Some(String::from("other")),
            ..options()
        };

        let summary = export_application(&client(&server), &mut processor, "myapp", &opts)
            .await
            .unwrap();

        assert_eq!(summary, ExportSummary { app_name: String::from("myapp"), ..ExportSummary::default() });
        assert!(!dir.path().join(DEFAULT_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_export_discovery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let mut processor = setup(&dir);

        let err = export_application(&client(&server), &mut processor, "myapp", &options())
            .await
            .unwrap_err();

        assert_eq!(err.unexpected_response().map(|r| r.status), Some(503));
    }
}
