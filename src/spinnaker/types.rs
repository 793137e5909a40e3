//! Live resource documents returned by the Spinnaker discovery APIs.

use serde::{Deserialize, Serialize};

use crate::model::Moniker;

/// A deployed server group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerGroup {
    /// Server group name, e.g. `myapp-prod-v003`.
    pub name: String,
    /// Owning application.
    pub application: String,
    /// Region.
    pub region: String,
    /// Account.
    pub account: String,
    /// Cloud provider, e.g. `aws` or `titus`.
    #[serde(rename = "type")]
    pub cloud_provider: String,
    /// Naming metadata, including the cluster name.
    pub moniker: Moniker,
    /// Running instances.
    pub instances: Vec<Instance>,
    /// Attached load balancer names.
    pub load_balancers: Vec<String>,
    /// Attached target group names.
    pub target_groups: Vec<String>,
    /// Attached security group names.
    pub security_groups: Vec<String>,
    /// Build metadata.
    pub build_info: BuildInfo,
}

/// A server group instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    /// Instance id.
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Health reports.
    pub health: Vec<InstanceHealth>,
    /// Summarized health.
    pub health_state: String,
    /// Launch time in epoch milliseconds.
    pub launch_time: i64,
    /// Availability zone.
    pub availability_zone: String,
}

/// One health report for an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceHealth {
    /// Reporter type.
    #[serde(rename = "type")]
    pub health_type: String,
    /// Reported state.
    pub state: String,
}

/// Build metadata of a server group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfo {
    /// Package the image was baked from.
    pub package_name: String,
    /// CI build details.
    pub jenkins: JenkinsBuildInfo,
    /// Container image details.
    pub docker: DockerBuildInfo,
}

/// CI build details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JenkinsBuildInfo {
    /// Job name.
    pub name: String,
    /// Build number.
    pub number: String,
    /// CI host.
    pub host: String,
}

/// Container image details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerBuildInfo {
    /// Image name.
    pub image: String,
    /// Image tag.
    pub tag: String,
    /// Image digest.
    pub digest: String,
}

/// A deployed load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancer {
    /// Load balancer name.
    pub name: String,
    /// Account.
    pub account: String,
    /// Region.
    pub region: String,
    /// Cloud provider.
    #[serde(rename = "type")]
    pub cloud_provider: String,
    /// AWS load balancer flavor, e.g. `application` or `network`.
    pub load_balancer_type: String,
    /// Attached security group names.
    pub security_groups: Vec<String>,
    /// Server groups behind the load balancer.
    pub server_groups: Vec<NamedRef>,
    /// Target groups of an application or network load balancer.
    pub target_groups: Vec<NamedRef>,
}

/// A `{name}` reference inside another document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    /// Referenced name.
    pub name: String,
}

/// A security group search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    /// Security group name.
    pub name: String,
    /// Security group id.
    pub id: String,
    /// Region.
    pub region: String,
    /// Account.
    pub account: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchResults<T> {
    /// Matching documents.
    pub results: Vec<T>,
}

/// Everything deployed for an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationResources {
    /// Application name.
    pub app_name: String,
    /// Server groups.
    pub server_groups: Vec<ServerGroup>,
    /// Load balancers.
    pub load_balancers: Vec<LoadBalancer>,
    /// Security groups whose names match the application.
    pub security_groups: Vec<SecurityGroup>,
}
