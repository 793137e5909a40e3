//! Typed model of delivery configs and the API documents around them.
//!
//! - [`identity`]: logical resource identities used for lookups
//! - [`delivery`]: the typed view of a delivery config document
//! - [`remote`]: diff, plan, and error documents returned by the API

mod delivery;
mod identity;
mod remote;

pub use delivery::{
    ArtifactSource, BranchFilter, ContainerReference, DeliveryArtifact, DeliveryConfig,
    DeliveryEnvironment, DeliveryResource, ImageProvider, LocationRegion, Moniker,
    ResourceLocations, ResourceSpec, VmOptions,
};
pub use identity::{
    APPLICATION_LOAD_BALANCER_RESOURCE_TYPE, AWS_CLOUD_PROVIDER,
    CLASSIC_LOAD_BALANCER_RESOURCE_TYPE, CLUSTER_RESOURCE_TYPE,
    NETWORK_LOAD_BALANCER_RESOURCE_TYPE, ResourceIdentity, SECURITY_GROUP_RESOURCE_TYPE,
    TITUS_CLOUD_PROVIDER, cloud_provider_for_kind, kind_provider,
};
pub use remote::{
    AccountDiffs, ActuationPlan, DiffStatus, EnvironmentPlan, ManagedResourceDiff,
    PlannedChange, PublishError, PublishErrorBody, ResourceDiff, ResourcePlan,
    ValidationErrorDetail, compare_resource_ids, flatten_diffs,
};
