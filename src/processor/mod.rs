//! Delivery config processor.
//!
//! The processor owns one delivery config file. It keeps two views of the
//! document in step:
//!
//! - a typed [`DeliveryConfig`] used for lookups and comparisons
//! - a raw [`Document`] tree that carries formatting, comments and every
//!   key the typed view does not model
//!
//! Every mutation updates both views. Saving projects the raw tree back to
//! disk in canonical key order.

mod config;
mod remote;

pub use config::{
    DEFAULT_DIR, DEFAULT_ENVIRONMENTS, DEFAULT_FILE_NAME, EnvironmentProvider, ProcessorConfig,
    default_constraint,
};

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde_yaml::Value;
use tracing::{debug, info};

use crate::document::{Document, Node};
use crate::error::{DeliveryError, DocumentError, Result};
use crate::model::{DeliveryArtifact, DeliveryConfig, DeliveryEnvironment, DeliveryResource, ResourceIdentity};

/// Outcome of [`DeliveryConfigProcessor::insert_artifact`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactInsert {
    /// Whether the artifact was appended to the config.
    pub added: bool,
    /// The reference resources must use instead of the one they declared.
    pub updated_ref: Option<String>,
}

/// Loads, edits and saves one delivery config file.
#[derive(Debug)]
pub struct DeliveryConfigProcessor {
    config: ProcessorConfig,
    document: Option<Document>,
    delivery_config: DeliveryConfig,
    content: Vec<u8>,
    artifact_counter: u64,
}

impl DeliveryConfigProcessor {
    /// Creates a processor. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            document: None,
            delivery_config: DeliveryConfig::default(),
            content: Vec::new(),
            artifact_counter: 0,
        }
    }

    /// Returns the processor configuration.
    #[must_use]
    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Returns the path of the config file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.config.path()
    }

    /// Returns true once the file has been loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Returns the typed view of the config.
    #[must_use]
    pub const fn delivery_config(&self) -> &DeliveryConfig {
        &self.delivery_config
    }

    /// Returns the raw document, if loaded.
    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Returns the bytes last read from or written to disk.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Reads the config file, replacing all in-memory state.
    ///
    /// A missing file yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or
    /// [`DocumentError::InvalidContent`] if it is not a valid delivery config.
    pub fn load(&mut self) -> Result<()> {
        let path = self.path();
        self.document = None;
        self.delivery_config = DeliveryConfig::default();
        self.content = Vec::new();

        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No delivery config found, starting empty");
                self.document = Some(Document::empty());
                return Ok(());
            }
            Err(e) => return Err(DeliveryError::io("read", path, e)),
        };

        let context = || format!("failed to parse contents of {} as yaml", path.display());
        let document = Document::parse(&content).map_err(|e| e.context(context()))?;
        let delivery_config = if document.root.entries().is_some_and(<[_]>::is_empty) {
            DeliveryConfig::default()
        } else {
            serde_yaml::from_slice(&content)
                .map_err(|e| DocumentError::invalid_yaml(&content, e).context(context()))?
        };

        debug!(
            path = %path.display(),
            environments = delivery_config.environments.len(),
            artifacts = delivery_config.artifacts.len(),
            "Loaded delivery config"
        );
        self.document = Some(document);
        self.delivery_config = delivery_config;
        self.content = content;
        Ok(())
    }

    /// Loads the file unless that already happened.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if self.document.is_none() {
            self.load()?;
        }
        Ok(())
    }

    /// Renders the config as it would be saved, without writing it.
    ///
    /// Missing `application`, `name` and `serviceAccount` keys are filled
    /// from the configuration, `artifacts` is always present, every resource
    /// `kind` gets a `<name>/<account>` comment, and keys are put in
    /// canonical order. Both views are updated accordingly.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn render(&mut self) -> Result<Vec<u8>> {
        self.ensure_loaded()?;
        let app_name = self.config.app_name.clone();
        let service_account = self.config.service_account.clone();

        let delivery_config = &mut self.delivery_config;
        let document = loaded(&mut self.document)?;
        let root = mapping_root(document)?;

        if !app_name.is_empty() {
            fill_default(root, "application", &app_name, &mut delivery_config.application);
            let name = format!("{app_name}-manifest");
            fill_default(root, "name", &name, &mut delivery_config.name);
        }
        if !service_account.is_empty() {
            fill_default(
                root,
                "serviceAccount",
                &service_account,
                &mut delivery_config.service_account,
            );
        }
        sequence_entry(root, "artifacts")?;
        annotate_resource_kinds(root, delivery_config);

        document.sort_keys();
        Ok(document.emit().into_bytes())
    }

    /// Writes the config file as produced by [`render`](Self::render),
    /// creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory or file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        let output = self.render()?;
        let path = self.config.path();
        fs::create_dir_all(&self.config.dir)
            .map_err(|e| DeliveryError::io("create directory", &self.config.dir, e))?;
        info!(path = %path.display(), "Writing delivery config");
        fs::write(&path, &output).map_err(|e| DeliveryError::io("write", &path, e))?;

        self.content = output;
        Ok(())
    }

    /// Returns every environment name in document order, followed by any of
    /// `testing`, `staging` and `production` that are missing.
    #[must_use]
    pub fn all_environments(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .delivery_config
            .environments
            .iter()
            .map(|env| env.name.clone())
            .collect();
        for default in DEFAULT_ENVIRONMENTS {
            if !names.iter().any(|name| name == default) {
                names.push(default.to_string());
            }
        }
        names
    }

    /// Returns the index of the first environment named `name`.
    #[must_use]
    pub fn find_env_index(&self, name: &str) -> Option<usize> {
        self.delivery_config
            .environments
            .iter()
            .position(|env| env.name == name)
    }

    /// Returns the index of the resource matching `identity` in an
    /// environment.
    ///
    /// Resources without locations inherit the environment's default
    /// locations before they are compared.
    pub fn find_resource_index(&mut self, identity: &ResourceIdentity, env_index: usize) -> Option<usize> {
        let env = self.delivery_config.environments.get_mut(env_index)?;
        let defaults = env.locations.clone();
        env.resources.iter_mut().position(|resource| {
            resource.inherit_locations(&defaults);
            resource.matches(identity)
        })
    }

    /// Returns true if any environment holds the resource.
    pub fn resource_exists(&mut self, identity: &ResourceIdentity) -> bool {
        self.which_environment(identity).is_some()
    }

    /// Returns the name of the environment holding the resource.
    pub fn which_environment(&mut self, identity: &ResourceIdentity) -> Option<String> {
        (0..self.delivery_config.environments.len())
            .find(|&index| self.find_resource_index(identity, index).is_some())
            .map(|index| self.delivery_config.environments[index].name.clone())
    }

    /// Inserts or replaces a resource in an environment.
    ///
    /// A missing environment is created with provider defaults. An existing
    /// environment gets `constraints` and `notifications` only if it lacks
    /// them, while `verifyWith` and `postDeploy` are always refreshed. A
    /// resource matching `identity` is replaced in place, otherwise the new
    /// one is appended.
    ///
    /// Returns true if the resource was added rather than replaced.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidContent`] if `content` is not a valid
    /// resource document.
    pub fn upsert_resource(
        &mut self,
        identity: &ResourceIdentity,
        env_name: &str,
        content: &[u8],
    ) -> Result<bool> {
        self.ensure_loaded()?;
        let context = || format!("failed to parse resource {identity}");
        let mut resource_node = Document::parse(content).map_err(|e| e.context(context()))?.root;
        let resource: DeliveryResource = serde_yaml::from_slice(content)
            .map_err(|e| DocumentError::invalid_yaml(content, e).context(context()))?;

        let provide = |provider: &EnvironmentProvider, config: &DeliveryConfig| {
            Node::from_value(Value::Sequence(provider(env_name, config)))
        };
        let verify_with = provide(&self.config.verify_with, &self.delivery_config);
        let post_deploy = provide(&self.config.post_deploy, &self.delivery_config);
        let constraints = provide(&self.config.constraints, &self.delivery_config);
        let notifications = provide(&self.config.notifications, &self.delivery_config);

        let Some(env_index) = self.find_env_index(env_name) else {
            let mut env_node = Node::mapping();
            env_node.insert("name", Node::string(env_name));
            env_node.insert("constraints", constraints);
            env_node.insert("notifications", notifications);
            let mut resources = Node::sequence();
            resources.push(resource_node);
            env_node.insert("resources", resources);
            env_node.insert("verifyWith", verify_with);
            env_node.insert("postDeploy", post_deploy);

            let root = mapping_root(loaded(&mut self.document)?)?;
            sequence_entry(root, "environments")?.push(env_node);
            self.delivery_config.environments.push(DeliveryEnvironment {
                name: env_name.to_string(),
                resources: vec![resource],
                ..DeliveryEnvironment::default()
            });
            info!(resource = %identity, env = env_name, "Added resource to new environment");
            return Ok(true);
        };

        let resource_index = self.find_resource_index(identity, env_index);
        let root = mapping_root(loaded(&mut self.document)?)?;
        let env_node = sequence_entry(root, "environments")?
            .items_mut()
            .and_then(|envs| envs.get_mut(env_index))
            .filter(|env| env.is_mapping())
            .ok_or_else(|| DeliveryError::internal(format!("environment {env_name} missing from document")))?;

        if !env_node.has_key("constraints") {
            env_node.insert("constraints", constraints);
        }
        if !env_node.has_key("notifications") {
            env_node.insert("notifications", notifications);
        }

        let items = sequence_entry(env_node, "resources")?
            .items_mut()
            .ok_or_else(|| DeliveryError::internal("`resources` is not a list"))?;
        let typed_resources = &mut self.delivery_config.environments[env_index].resources;
        let added = match resource_index {
            Some(index) if index < items.len() && index < typed_resources.len() => {
                resource_node.head_comment = std::mem::take(&mut items[index].head_comment);
                items[index] = resource_node;
                typed_resources[index] = resource;
                false
            }
            _ => {
                items.push(resource_node);
                typed_resources.push(resource);
                true
            }
        };

        env_node.insert("verifyWith", verify_with);
        env_node.insert("postDeploy", post_deploy);

        info!(
            resource = %identity,
            env = env_name,
            added,
            "Upserted resource"
        );
        Ok(added)
    }

    /// Adds an artifact unless an equivalent one is already declared.
    ///
    /// - An equivalent artifact with the same reference: nothing changes.
    /// - An equivalent artifact with another reference: `artifact` becomes
    ///   an alias of it and that reference is returned.
    /// - A different artifact already using the reference: `artifact` is
    ///   appended under a fresh `<ref>-<n>` reference, which is returned.
    /// - Otherwise `artifact` is appended as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be converted to YAML.
    pub fn insert_artifact(&mut self, artifact: &mut DeliveryArtifact) -> Result<ArtifactInsert> {
        self.ensure_loaded()?;
        let mut collision = false;
        for current in &self.delivery_config.artifacts {
            if current.equivalent(artifact) {
                if current.ref_name() == artifact.ref_name() {
                    debug!(artifact = artifact.ref_name(), "Artifact already declared");
                    return Ok(ArtifactInsert::default());
                }
                let existing = current.ref_name().to_string();
                debug!(artifact = artifact.ref_name(), %existing, "Artifact declared under another reference");
                artifact.reference = Some(existing.clone());
                return Ok(ArtifactInsert {
                    added: false,
                    updated_ref: Some(existing),
                });
            }
            collision |= current.ref_name() == artifact.ref_name();
        }

        let updated_ref = if collision {
            let unique = self.unique_reference(artifact.ref_name());
            info!(artifact = artifact.ref_name(), reference = %unique, "Artifact reference collides, renaming");
            artifact.reference = Some(unique.clone());
            Some(unique)
        } else {
            None
        };

        let node = Node::from_serialize(&*artifact)?;
        let root = mapping_root(loaded(&mut self.document)?)?;
        sequence_entry(root, "artifacts")?.push(node);
        self.delivery_config.artifacts.push(artifact.clone());

        Ok(ArtifactInsert {
            added: true,
            updated_ref,
        })
    }

    /// Draws `<base>-<n>` with a strictly increasing `n` until no declared
    /// artifact uses it.
    fn unique_reference(&mut self, base: &str) -> String {
        loop {
            self.artifact_counter += 1;
            let candidate = format!("{base}-{}", self.artifact_counter);
            let taken = self
                .delivery_config
                .artifacts
                .iter()
                .any(|artifact| artifact.ref_name() == candidate || artifact.name == candidate);
            if !taken {
                return candidate;
            }
        }
    }

    /// Rewrites the artifact reference inside a serialized resource.
    ///
    /// The field depends on the kind: `spec.container.reference` for
    /// `titus/cluster@v1*`, `spec.imageProvider.reference` for
    /// `ec2/cluster@v1` and `spec.artifactReference` for `ec2/cluster@v1.1`.
    /// Key order and comments of the resource are kept.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedResourceKind`] for other kinds and
    /// [`DocumentError::MalformedResource`] if the expected nesting is
    /// missing.
    pub fn update_artifact_reference(content: &[u8], new_ref: &str) -> Result<Vec<u8>> {
        let mut document = Document::parse(content)
            .map_err(|e| e.context("failed to parse resource to update its artifact reference"))?;
        let kind = document
            .root
            .get("kind")
            .and_then(Node::as_str)
            .unwrap_or_default()
            .to_string();

        let (parent_path, field): (&[&str], &str) = if kind.starts_with("titus/cluster@v1") {
            (&["spec", "container"][..], "reference")
        } else if kind == "ec2/cluster@v1" {
            (&["spec", "imageProvider"][..], "reference")
        } else if kind == "ec2/cluster@v1.1" {
            (&["spec"][..], "artifactReference")
        } else {
            return Err(DocumentError::UnsupportedResourceKind { kind }.into());
        };

        let mut parent = &mut document.root;
        for (depth, key) in parent_path.iter().enumerate() {
            parent = parent
                .get_mut(key)
                .filter(|node| node.is_mapping())
                .ok_or_else(|| DocumentError::malformed(&kind, parent_path[..=depth].join(".")))?;
        }
        parent.insert(field, Node::string(new_ref));

        Ok(document.emit().into_bytes())
    }
}

fn loaded(document: &mut Option<Document>) -> Result<&mut Document> {
    document
        .as_mut()
        .ok_or_else(|| DeliveryError::internal("delivery config not loaded"))
}

fn mapping_root(document: &mut Document) -> Result<&mut Node> {
    if document.root.is_mapping() {
        Ok(&mut document.root)
    } else {
        Err(DeliveryError::internal("delivery config root is not a mapping"))
    }
}

/// Returns the sequence under `key`, creating it when the key is missing or
/// null.
fn sequence_entry<'a>(parent: &'a mut Node, key: &str) -> Result<&'a mut Node> {
    let needs_sequence = parent
        .get(key)
        .is_none_or(|node| node.to_value().is_null());
    if needs_sequence {
        parent.insert(key, Node::sequence());
    }
    parent
        .get_mut(key)
        .filter(|node| node.items().is_some())
        .ok_or_else(|| DeliveryError::internal(format!("`{key}` is not a list")))
}

fn fill_default(root: &mut Node, key: &str, value: &str, typed: &mut String) {
    if !root.has_key(key) {
        debug!(key, value, "Filling default");
        root.insert(key, Node::string(value));
        if typed.is_empty() {
            *typed = value.to_string();
        }
    }
}

/// Sets `# <name>/<account>` on every resource `kind`, using the typed
/// resource at the same position.
fn annotate_resource_kinds(root: &mut Node, delivery_config: &DeliveryConfig) {
    let Some(envs) = root.get_mut("environments").and_then(Node::items_mut) else {
        return;
    };
    for (env_node, env) in envs.iter_mut().zip(&delivery_config.environments) {
        let Some(resources) = env_node.get_mut("resources").and_then(Node::items_mut) else {
            continue;
        };
        for (resource_node, resource) in resources.iter_mut().zip(&env.resources) {
            if let Some(entry) = resource_node.entry_mut("kind") {
                let mut resource = resource.clone();
                resource.inherit_locations(&env.locations);
                entry
                    .key
                    .set_line_comment(format!("{}/{}", resource.name(), resource.account()));
            }
        }
    }
}
