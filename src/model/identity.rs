//! Logical identity of deployable resources.
//!
//! A [`ResourceIdentity`] is a lookup token: it is built while discovering
//! live resources and used to find the matching entry inside a delivery
//! config. It is never written to the document itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource type for clusters (server groups sharing a moniker cluster).
pub const CLUSTER_RESOURCE_TYPE: &str = "cluster";

/// Resource type for classic elastic load balancers.
pub const CLASSIC_LOAD_BALANCER_RESOURCE_TYPE: &str = "classic-load-balancer";

/// Resource type for application load balancers.
pub const APPLICATION_LOAD_BALANCER_RESOURCE_TYPE: &str = "application-load-balancer";

/// Resource type for network load balancers.
pub const NETWORK_LOAD_BALANCER_RESOURCE_TYPE: &str = "network-load-balancer";

/// Resource type for security groups.
pub const SECURITY_GROUP_RESOURCE_TYPE: &str = "security-group";

/// Cloud provider name for AWS.
pub const AWS_CLOUD_PROVIDER: &str = "aws";

/// Cloud provider name for Titus.
pub const TITUS_CLOUD_PROVIDER: &str = "titus";

/// Maps a cloud provider name to the prefix used in resource kinds.
///
/// AWS resources use `ec2/...` kinds; every other provider uses its own name.
#[must_use]
pub fn kind_provider(cloud_provider: &str) -> &str {
    if cloud_provider == AWS_CLOUD_PROVIDER {
        "ec2"
    } else {
        cloud_provider
    }
}

/// Maps a kind prefix back to its cloud provider name (`ec2` becomes `aws`).
#[must_use]
pub fn cloud_provider_for_kind(kind_prefix: &str) -> &str {
    if kind_prefix == "ec2" {
        AWS_CLOUD_PROVIDER
    } else {
        kind_prefix
    }
}

/// Uniquely identifies a resource stored in a delivery config or exportable
/// from the Spinnaker API.
///
/// Ordering is by resource type, then name, cloud provider and account, which
/// is the order resources are offered for export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentity {
    /// Resource type, e.g. `cluster` or `security-group`.
    pub resource_type: String,
    /// Cloud provider, e.g. `aws` or `titus`.
    pub cloud_provider: String,
    /// Account the resource lives in.
    pub account: String,
    /// Resource name.
    pub name: String,
}

impl ResourceIdentity {
    /// Creates a new resource identity.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        cloud_provider: impl Into<String>,
        account: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            cloud_provider: cloud_provider.into(),
            account: account.into(),
            name: name.into(),
        }
    }

    /// Returns true if a resource `kind` (like `ec2/cluster@v1`) describes
    /// this identity's provider and resource type.
    #[must_use]
    pub fn has_kind(&self, kind: &str) -> bool {
        kind.strip_prefix(kind_provider(&self.cloud_provider))
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_prefix(self.resource_type.as_str()))
            .is_some_and(|rest| rest.starts_with('@'))
    }

    /// Returns true if this identity is a cluster.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.resource_type == CLUSTER_RESOURCE_TYPE
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}/{}]",
            self.resource_type, self.name, self.cloud_provider, self.account
        )
    }
}

impl PartialOrd for ResourceIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceIdentity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.resource_type
            .cmp(&other.resource_type)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.cloud_provider.cmp(&other.cloud_provider))
            .then_with(|| self.account.cmp(&other.account))
    }
}
