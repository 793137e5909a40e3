//! Discovery and export of live application resources.

use reqwest::Method;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::{DocumentError, Result};
use crate::model::{
    APPLICATION_LOAD_BALANCER_RESOURCE_TYPE, AWS_CLOUD_PROVIDER,
    CLASSIC_LOAD_BALANCER_RESOURCE_TYPE, CLUSTER_RESOURCE_TYPE, DeliveryArtifact,
    NETWORK_LOAD_BALANCER_RESOURCE_TYPE, ResourceIdentity, SECURITY_GROUP_RESOURCE_TYPE,
};

use super::client::SpinnakerClient;
use super::types::{
    ApplicationResources, LoadBalancer, SearchResults, SecurityGroup, ServerGroup,
};

/// Lists the server groups of an application.
///
/// # Errors
///
/// Returns an error if the request fails or the response is not valid JSON.
pub async fn get_server_groups(client: &SpinnakerClient, app: &str) -> Result<Vec<ServerGroup>> {
    client
        .get_json(&client.endpoint(&["applications", app, "serverGroups"], &[]))
        .await
}

/// Lists the load balancers of an application.
///
/// # Errors
///
/// Returns an error if the request fails or the response is not valid JSON.
pub async fn get_load_balancers(client: &SpinnakerClient, app: &str) -> Result<Vec<LoadBalancer>> {
    client
        .get_json(&client.endpoint(&["applications", app, "loadBalancers"], &[]))
        .await
}

/// Searches for security groups matching the application name.
///
/// # Errors
///
/// Returns an error if the request fails or the response is not valid JSON.
pub async fn get_security_groups(client: &SpinnakerClient, app: &str) -> Result<Vec<SecurityGroup>> {
    let pages: Vec<SearchResults<SecurityGroup>> = client
        .get_json(&client.endpoint(
            &["search"],
            &[("pageSize", "500"), ("q", app), ("type", "securityGroup")],
        ))
        .await?;
    Ok(pages.into_iter().flat_map(|page| page.results).collect())
}

/// Collects everything deployed for an application.
///
/// The three categories are fetched concurrently. The first failure aborts
/// the whole discovery and no partial result is returned.
///
/// # Errors
///
/// Returns the first error from any of the fetches.
pub async fn find_application_resources(
    client: &SpinnakerClient,
    app: &str,
) -> Result<ApplicationResources> {
    info!(app, "Discovering application resources");
    let (server_groups, load_balancers, security_groups) = tokio::try_join!(
        get_server_groups(client, app),
        get_load_balancers(client, app),
        get_security_groups(client, app),
    )?;

    debug!(
        server_groups = server_groups.len(),
        load_balancers = load_balancers.len(),
        security_groups = security_groups.len(),
        "Discovery complete"
    );

    Ok(ApplicationResources {
        app_name: app.to_string(),
        server_groups,
        load_balancers,
        security_groups,
    })
}

/// Returns true for `app` itself and names of the form `app-<anything>`.
#[must_use]
pub fn matches_app_name(app: &str, name: &str) -> bool {
    name.strip_prefix(app)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
}

/// Classifies a load balancer by its target groups and flavor.
#[must_use]
pub fn load_balancer_resource_type(lb: &LoadBalancer) -> &'static str {
    if lb.target_groups.is_empty() {
        CLASSIC_LOAD_BALANCER_RESOURCE_TYPE
    } else if lb.load_balancer_type == "network" {
        NETWORK_LOAD_BALANCER_RESOURCE_TYPE
    } else {
        APPLICATION_LOAD_BALANCER_RESOURCE_TYPE
    }
}

/// Derives the de-duplicated, sorted identities that can be exported.
///
/// Every server group contributes its cluster. Load balancers and security
/// groups are only included when their name matches the application.
#[must_use]
pub fn exportable_application_resources(resources: &ApplicationResources) -> Vec<ResourceIdentity> {
    let mut unique = BTreeSet::new();

    for group in &resources.server_groups {
        let Some(cluster) = group.moniker.cluster.as_deref().filter(|c| !c.is_empty()) else {
            debug!(server_group = %group.name, "Skipping server group without cluster");
            continue;
        };
        unique.insert(ResourceIdentity::new(
            CLUSTER_RESOURCE_TYPE,
            &group.cloud_provider,
            &group.account,
            cluster,
        ));
    }

    for lb in &resources.load_balancers {
        if matches_app_name(&resources.app_name, &lb.name) {
            unique.insert(ResourceIdentity::new(
                load_balancer_resource_type(lb),
                &lb.cloud_provider,
                &lb.account,
                &lb.name,
            ));
        }
    }

    for group in &resources.security_groups {
        if matches_app_name(&resources.app_name, &group.name) {
            unique.insert(ResourceIdentity::new(
                SECURITY_GROUP_RESOURCE_TYPE,
                AWS_CLOUD_PROVIDER,
                &group.account,
                &group.name,
            ));
        }
    }

    unique.into_iter().collect()
}

/// Fetches the delivery config representation of one resource as YAML.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn export_resource(
    client: &SpinnakerClient,
    identity: &ResourceIdentity,
    service_account: &str,
) -> Result<Vec<u8>> {
    debug!(resource = %identity, "Exporting resource");
    client
        .get(&client.endpoint(
            &[
                "managed",
                "resources",
                "export",
                &identity.cloud_provider,
                &identity.account,
                &identity.resource_type,
                &identity.name,
            ],
            &[("serviceAccount", service_account)],
        ))
        .await
}

/// Fetches the artifact deployed by a cluster.
///
/// # Errors
///
/// Returns an error if the request fails or the response is not a valid
/// artifact document.
pub async fn export_artifact(
    client: &SpinnakerClient,
    identity: &ResourceIdentity,
) -> Result<DeliveryArtifact> {
    debug!(resource = %identity, "Exporting artifact");
    let content = client
        .get(&client.endpoint(
            &[
                "managed",
                "resources",
                "export",
                "artifact",
                &identity.cloud_provider,
                &identity.account,
                &identity.name,
            ],
            &[],
        ))
        .await?;
    serde_yaml::from_slice(&content).map_err(|e| {
        DocumentError::invalid_yaml(&content, e)
            .context("failed to parse artifact YAML")
            .into()
    })
}

fn pause_path(client: &SpinnakerClient, app: &str) -> String {
    client.endpoint(&["managed", "application", app, "pause"], &[])
}

/// Pauses management of an application.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn pause_management(client: &SpinnakerClient, app: &str) -> Result<()> {
    info!(app, "Pausing management");
    client
        .request(Method::POST, &pause_path(client, app), None)
        .await?;
    Ok(())
}

/// Resumes management of a paused application.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn resume_management(client: &SpinnakerClient, app: &str) -> Result<()> {
    info!(app, "Resuming management");
    client
        .request(Method::DELETE, &pause_path(client, app), None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Moniker;
    use crate::spinnaker::HttpTransport;
    use crate::spinnaker::types::NamedRef;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_group(cluster: &str, provider: &str, account: &str) -> ServerGroup {
        ServerGroup {
            cloud_provider: provider.to_string(),
            account: account.to_string(),
            moniker: Moniker {
                app: String::from("myapp"),
                cluster: Some(cluster.to_string()),
                ..Moniker::default()
            },
            ..ServerGroup::default()
        }
    }

    fn load_balancer(name: &str, flavor: &str, target_groups: usize) -> LoadBalancer {
        LoadBalancer {
            name: name.to_string(),
            account: String::from("test"),
            cloud_provider: String::from("aws"),
            load_balancer_type: flavor.to_string(),
            target_groups: vec![NamedRef::default(); target_groups],
            ..LoadBalancer::default()
        }
    }

    #[test]
    fn test_matches_app_name() {
        assert!(matches_app_name("myapp", "myapp"));
        assert!(matches_app_name("myapp", "myapp-elb"));
        assert!(!matches_app_name("myapp", "myapp2"));
        assert!(!matches_app_name("myapp", "other-myapp"));
        assert!(matches_app_name("my.app", "my.app-x"));
        assert!(!matches_app_name("my.app", "myxapp"));
    }

    #[test]
    fn test_load_balancer_classification() {
        assert_eq!(
            load_balancer_resource_type(&load_balancer("a", "", 0)),
            CLASSIC_LOAD_BALANCER_RESOURCE_TYPE
        );
        assert_eq!(
            load_balancer_resource_type(&load_balancer("a", "application", 1)),
            APPLICATION_LOAD_BALANCER_RESOURCE_TYPE
        );
        assert_eq!(
            load_balancer_resource_type(&load_balancer("a", "network", 2)),
            NETWORK_LOAD_BALANCER_RESOURCE_TYPE
        );
    }

    #[test]
    fn test_exportable_resources_are_unique_and_filtered() {
        let resources = ApplicationResources {
            app_name: String::from("myapp"),
            server_groups: vec![
                server_group("myapp-prod", "aws", "prod"),
                server_group("myapp-prod", "aws", "prod"),
                server_group("myapp", "titus", "titustest"),
            ],
            load_balancers: vec![load_balancer("myapp-elb", "", 0), load_balancer("shared", "", 0)],
            security_groups: vec![
                SecurityGroup {
                    name: String::from("myapp"),
                    account: String::from("test"),
                    ..SecurityGroup::default()
                },
                SecurityGroup {
                    name: String::from("myapp2"),
                    account: String::from("test"),
                    ..SecurityGroup::default()
                },
            ],
        };

        let exportable = exportable_application_resources(&resources);

        assert_eq!(
            exportable,
            vec![
                ResourceIdentity::new(CLASSIC_LOAD_BALANCER_RESOURCE_TYPE, "aws", "test", "myapp-elb"),
                ResourceIdentity::new(CLUSTER_RESOURCE_TYPE, "titus", "titustest", "myapp"),
                ResourceIdentity::new(CLUSTER_RESOURCE_TYPE, "aws", "prod", "myapp-prod"),
                ResourceIdentity::new(SECURITY_GROUP_RESOURCE_TYPE, "aws", "test", "myapp"),
            ]
        );
    }

    async fn client_for(server: &MockServer) -> SpinnakerClient {
        SpinnakerClient::new(&server.uri(), Arc::new(HttpTransport::new())).unwrap()
    }

    #[tokio::test]
    async fn test_find_application_resources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/applications/myapp/serverGroups"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"name": "myapp-v001", "account": "test", "type": "aws", "moniker": {"app": "myapp", "cluster": "myapp"}}]"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/applications/myapp/loadBalancers"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "myapp"))
            .and(query_param("type", "securityGroup"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"results": [{"name": "myapp", "account": "test", "region": "us-east-1"}]}]"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let resources = find_application_resources(&client, "myapp").await.unwrap();

        assert_eq!(resources.server_groups.len(), 1);
        assert!(resources.load_balancers.is_empty());
        assert_eq!(resources.security_groups[0].region, "us-east-1");
    }

    #[tokio::test]
    async fn test_find_application_resources_fails_on_first_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/applications/myapp/loadBalancers"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = find_application_resources(&client, "myapp").await.unwrap_err();

        assert_eq!(err.unexpected_response().map(|r| r.status), Some(500));
    }

    #[tokio::test]
    async fn test_export_resource_and_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/managed/resources/export/aws/test/cluster/myapp"))
            .and(query_param("serviceAccount", "me@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: ec2/cluster@v1\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/managed/resources/export/artifact/aws/test/myapp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("name: myapp\ntype: deb\n"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let identity = ResourceIdentity::new(CLUSTER_RESOURCE_TYPE, "aws", "test", "myapp");

        let content = export_resource(&client, &identity, "me@example.com").await.unwrap();
        assert_eq!(content, b"kind: ec2/cluster@v1\n");

        let artifact = export_artifact(&client, &identity).await.unwrap();
        assert_eq!(artifact.name, "myapp");
        assert_eq!(artifact.artifact_type, "deb");
    }

    #[tokio::test]
    async fn test_export_resource_encodes_service_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/managed/resources/export/titus/test/cluster/myapp-test"))
            .and(query_param("serviceAccount", "me+ci@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: titus/cluster@v1\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let identity = ResourceIdentity::new(CLUSTER_RESOURCE_TYPE, "titus", "test", "myapp-test");

        let content = export_resource(&client, &identity, "me+ci@example.com").await.unwrap();
        assert_eq!(content, b"kind: titus/cluster@v1\n");
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/application/myapp/pause"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/managed/application/myapp/pause"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        pause_management(&client, "myapp").await.unwrap();
        resume_management(&client, "myapp").await.unwrap();
    }
}
