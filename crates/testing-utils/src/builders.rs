//! Test data builders for container metadata

use chrono::{DateTime, Utc};
use docker_cron_core::{ContainerInfo, Volume};
use std::collections::HashMap;

/// Builder for creating test ContainerInfo values
pub struct ContainerBuilder {
    attributes: HashMap<String, String>,
    mounts: Vec<Volume>,
}

impl ContainerBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("id".to_string(), id.to_string());
        attributes.insert("name".to_string(), name.to_string());
        Self {
            attributes,
            mounts: Vec::new(),
        }
    }

    pub fn with_image(self, image: &str) -> Self {
        self.with_attribute("image", image)
    }

    pub fn with_host(self, host: &str) -> Self {
        self.with_attribute("host", host)
    }

    pub fn with_created(self, created: DateTime<Utc>) -> Self {
        self.with_attribute("created", &created.to_rfc3339())
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_label(self, key: &str, value: &str) -> Self {
        self.with_attribute(key, value)
    }

    /// 一个步骤的常用标签：调度、命令以及可选的场景
    pub fn with_job(self, job: &str, schedule: &str, command: &str, scenario: Option<&str>) -> Self {
        let builder = self
            .with_label(&format!("job.{job}.schedule"), schedule)
            .with_label(&format!("job.{job}.command"), command);
        match scenario {
            Some(scenario) => builder.with_label(&format!("job.{job}.scenario"), scenario),
            None => builder,
        }
    }

    pub fn with_mount(mut self, name: &str, source: &str, destination: &str) -> Self {
        self.mounts
            .push(Volume::new(name, source, destination, true));
        self
    }

    pub fn build(self) -> ContainerInfo {
        ContainerInfo::from_attributes(self.attributes)
            .expect("ContainerBuilder always sets an id")
            .with_mounts(self.mounts)
    }
}
