//! Typed view of a delivery config document.
//!
//! These types are used for semantic queries (finding environments, matching
//! resources, comparing artifacts). Formatting and unknown fields live in the
//! raw [`Node`](crate::document::Node) tree, so every field here is optional
//! on input and unknown keys are ignored.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::{ResourceIdentity, cloud_provider_for_kind};

/// The root of a delivery config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// Name of the delivery config, used to address it remotely.
    #[serde(default)]
    pub name: String,
    /// Spinnaker application the config belongs to.
    #[serde(default)]
    pub application: String,
    /// Service account the platform acts as.
    #[serde(default)]
    pub service_account: String,
    /// Artifacts referenced by resources.
    #[serde(default)]
    pub artifacts: Vec<DeliveryArtifact>,
    /// Deployment environments in document order.
    #[serde(default)]
    pub environments: Vec<DeliveryEnvironment>,
}

/// A named deployment stage holding resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEnvironment {
    /// Environment name, unique within the config.
    #[serde(default)]
    pub name: String,
    /// Default locations for resources that declare none.
    #[serde(default)]
    pub locations: ResourceLocations,
    /// Resources in document order.
    #[serde(default)]
    pub resources: Vec<DeliveryResource>,
}

/// A build output referenced by resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryArtifact {
    /// Artifact name (package or image name).
    #[serde(default)]
    pub name: String,
    /// Artifact type, e.g. `deb` or `docker`.
    #[serde(default, rename = "type")]
    pub artifact_type: String,
    /// Alias used by resources to refer to this artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// How versions are derived from tags (docker artifacts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_version_strategy: Option<String>,
    /// Image baking options (debian artifacts).
    #[serde(default, skip_serializing_if = "VmOptions::is_empty")]
    pub vm_options: VmOptions,
    /// Source restrictions for the artifact.
    #[serde(default, skip_serializing_if = "ArtifactSource::is_empty")]
    pub from: ArtifactSource,
}

/// Image baking options for an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmOptions {
    /// Base image label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_label: Option<String>,
    /// Base operating system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_os: Option<String>,
    /// Regions to bake in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
    /// Image store type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_type: Option<String>,
}

/// Where artifact versions may come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSource {
    /// Branch restrictions.
    #[serde(default, skip_serializing_if = "BranchFilter::is_empty")]
    pub branch: BranchFilter,
    /// Only accept versions built from pull requests.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pull_request_only: bool,
}

/// Branch restriction for artifact versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFilter {
    /// Exact branch name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Branch name prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    /// Branch name pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl VmOptions {
    /// Returns true if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ArtifactSource {
    /// Returns true if no restriction is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl BranchFilter {
    /// Returns true if no restriction is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl DeliveryArtifact {
    /// Returns the name resources use to refer to this artifact: the
    /// reference when set, otherwise the artifact name.
    #[must_use]
    pub fn ref_name(&self) -> &str {
        match self.reference.as_deref() {
            Some(reference) if !reference.is_empty() => reference,
            _ => &self.name,
        }
    }

    /// Returns true if both artifacts have the same build metadata.
    ///
    /// Names and references are ignored: two artifacts with different names
    /// but identical metadata are duplicates.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.tag_version_strategy == other.tag_version_strategy
            && self.vm_options == other.vm_options
    }

    /// Orders artifacts by name, then type.
    #[must_use]
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.artifact_type.cmp(&other.artifact_type))
    }
}

/// A single managed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResource {
    /// Resource kind, formatted `<provider>/<type>@v<version>`.
    #[serde(default)]
    pub kind: String,
    /// Kind-dependent specification; only identity fields are modeled.
    #[serde(default)]
    pub spec: ResourceSpec,
}

/// The identity-relevant parts of a resource spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Naming metadata.
    #[serde(default)]
    pub moniker: Moniker,
    /// Account and regions.
    #[serde(default)]
    pub locations: ResourceLocations,
    /// Image provider (`ec2/cluster@v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_provider: Option<ImageProvider>,
    /// Artifact reference (`ec2/cluster@v1.1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_reference: Option<String>,
    /// Container reference (`titus/cluster@v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerReference>,
}

/// Account and regions a resource is deployed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocations {
    /// Account name.
    #[serde(default)]
    pub account: String,
    /// Regions.
    #[serde(default)]
    pub regions: Vec<LocationRegion>,
}

/// A region entry in resource locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRegion {
    /// Region name.
    #[serde(default)]
    pub name: String,
}

impl ResourceLocations {
    /// Returns true if neither account nor regions are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.account.is_empty() && self.regions.is_empty()
    }
}

/// Artifact details used to bake an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProvider {
    /// Artifact reference name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Inline artifact definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_artifact: Option<DeliveryArtifact>,
}

/// The image deployed to a container cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerReference {
    /// Artifact reference name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Image name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Image organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// How versions are derived from tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_version_strategy: Option<String>,
}

/// Spinnaker naming metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moniker {
    /// Application name.
    #[serde(default)]
    pub app: String,
    /// Cluster name (server groups only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Stack.
    #[serde(default)]
    pub stack: Option<String>,
    /// Free-form detail.
    #[serde(default)]
    pub detail: Option<String>,
    /// Server group sequence number.
    #[serde(default)]
    pub sequence: Option<u32>,
}

impl fmt::Display for Moniker {
    /// Renders `app[-stack[-detail]]`, followed by `-vNNN` for a positive
    /// sequence. Parts after the first missing one are dropped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let candidates = [
            Some(self.app.as_str()),
            self.stack.as_deref(),
            self.detail.as_deref(),
        ];
        for part in candidates {
            match part {
                Some(part) if !part.is_empty() => parts.push(part.to_string()),
                _ => break,
            }
        }
        if let Some(sequence) = self.sequence.filter(|s| *s > 0) {
            parts.push(format!("v{sequence:03}"));
        }
        f.write_str(&parts.join("-"))
    }
}

impl DeliveryResource {
    /// Returns the resource name derived from its moniker.
    #[must_use]
    pub fn name(&self) -> String {
        self.spec.moniker.to_string()
    }

    /// Returns the account the resource lives in.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.spec.locations.account
    }

    /// Returns the cloud provider for the kind (`ec2` maps to `aws`).
    #[must_use]
    pub fn cloud_provider(&self) -> &str {
        let prefix = self.kind.split('/').next().unwrap_or_default();
        cloud_provider_for_kind(prefix)
    }

    /// Returns the resource type from the kind: `ec2/cluster@v1` gives
    /// `cluster`. Malformed kinds give an empty string.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match (self.kind.find('/'), self.kind.rfind('@')) {
            (Some(left), Some(right)) if left < right => &self.kind[left + 1..right],
            _ => "",
        }
    }

    /// Returns true if this resource is the one `identity` describes.
    #[must_use]
    pub fn matches(&self, identity: &ResourceIdentity) -> bool {
        identity.has_kind(&self.kind)
            && self.cloud_provider() == identity.cloud_provider
            && self.account() == identity.account
            && self.name() == identity.name
    }

    /// Copies `defaults` into the resource when it declares no locations.
    pub fn inherit_locations(&mut self, defaults: &ResourceLocations) {
        if self.spec.locations.is_empty() {
            self.spec.locations = defaults.clone();
        }
    }
}
