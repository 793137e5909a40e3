//! Spinnaker API integration.
//!
//! This module provides the API client, the transport seam used to reach the
//! API, and the read-only discovery calls used to export live resources.

mod client;
mod discovery;
mod types;

pub use client::{
    ApiRequest, ApiResponse, BASE_URL_ENV, ClientSettings, HttpTransport, SpinnakerClient,
    Transport, YAML_CONTENT_TYPE,
};
pub use discovery::{
    export_artifact, export_resource, exportable_application_resources,
    find_application_resources, get_load_balancers, get_security_groups, get_server_groups,
    load_balancer_resource_type, matches_app_name, pause_management, resume_management,
};
pub use types::{
    ApplicationResources, BuildInfo, DockerBuildInfo, Instance, InstanceHealth, JenkinsBuildInfo,
    LoadBalancer, NamedRef, SearchResults, SecurityGroup, ServerGroup,
};
