use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::job::Job;
use crate::utils::parse_timestamp;
use crate::{SchedulerError, SchedulerResult};

/// 临时工作容器的名称前缀
pub const TEMP_CONTAINER_PREFIX: &str = "Temp-Container-";

/// 临时工作容器名称
pub fn temp_container_name(group_name: &str) -> String {
    format!("{TEMP_CONTAINER_PREFIX}{group_name}")
}

/// 容器挂载卷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub source: String,
    pub destination: String,
    pub read_write: bool,
}

impl Volume {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        read_write: bool,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            read_write,
        }
    }

    /// 主机上的本地路径
    pub fn local_path(&self) -> &str {
        &self.source
    }
}

/// 对容器的轻量引用，作业目标只记录身份信息
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image {
            Some(image) => write!(f, "{} ({})", self.name, image),
            None => f.write_str(&self.name),
        }
    }
}

/// 容器运行时报告的容器元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// 标签以及运行时补充的属性（id、name、host、image、created、volumes…）
    pub attributes: HashMap<String, String>,
    pub mounts: Vec<Volume>,
}

impl ContainerInfo {
    /// 从属性表构造，`id` 与 `name` 必须存在
    pub fn from_attributes(attributes: HashMap<String, String>) -> SchedulerResult<Self> {
        let id = attributes
            .get("id")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| SchedulerError::invalid_attribute("id", ""))?;
        let name = attributes
            .get("name")
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();
        let image = attributes.get("image").cloned();
        let created = attributes.get("created").and_then(|c| parse_timestamp(c));

        Ok(Self {
            id,
            name,
            image,
            created,
            attributes,
            mounts: Vec::new(),
        })
    }

    pub fn with_mounts(mut self, mounts: Vec<Volume>) -> Self {
        self.mounts = mounts;
        self
    }

    pub fn reference(&self) -> ContainerRef {
        ContainerRef {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }

    /// 容器内部配置的主机名
    pub fn hostname(&self) -> Option<&str> {
        self.attributes.get("host").map(String::as_str)
    }

    pub fn is_temp_container(&self) -> bool {
        self.name.starts_with(TEMP_CONTAINER_PREFIX)
    }

    /// 把挂载信息写入属性，供命令模板引用
    pub fn add_volume_attributes(&mut self) {
        if self.mounts.is_empty() {
            return;
        }

        let destinations = join_mounts(&self.mounts, |v| v.destination.as_str());
        let sources = join_mounts(&self.mounts, |v| v.source.as_str());
        let local_paths = join_mounts(&self.mounts, Volume::local_path);

        self.attributes
            .insert("volumes.localpath".to_string(), local_paths);
        self.attributes
            .insert("volumes.source".to_string(), sources);
        self.attributes
            .insert("volumes.destination".to_string(), destinations.clone());
        self.attributes.insert("volumes".to_string(), destinations);
    }
}

fn join_mounts<'a>(mounts: &'a [Volume], field: impl Fn(&'a Volume) -> &'a str) -> String {
    mounts.iter().map(field).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image {
            Some(image) => write!(f, "{} ({})", self.name, image),
            None => f.write_str(&self.name),
        }
    }
}

/// 按容器名筛选，未设置表达式时接受全部容器
#[derive(Debug, Clone, Default)]
pub struct ContainerFilter {
    pattern: Option<Regex>,
}

impl ContainerFilter {
    pub fn new(pattern: &str) -> SchedulerResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| SchedulerError::config_error(format!("无效的容器过滤表达式 {pattern}: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(name))
    }
}

/// 注册表中的容器：元数据以及从标签推导出的作业
#[derive(Debug, Clone)]
pub struct Container {
    pub info: ContainerInfo,
    pub jobs: Vec<Job>,
}

impl Container {
    pub fn new(info: ContainerInfo) -> Self {
        Self {
            info,
            jobs: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// 查找名称和调度相同的作业，不存在时新建
    pub fn find_job(&mut self, name: &str, schedule: &str) -> &mut Job {
        let index = match self
            .jobs
            .iter()
            .position(|job| job.name == name && job.schedule == schedule)
        {
            Some(index) => index,
            None => {
                self.jobs.push(Job::new(name, schedule));
                self.jobs.len() - 1
            }
        };
        &mut self.jobs[index]
    }

    pub fn valid_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|job| job.is_valid())
    }

    pub fn valid_job_count(&self) -> usize {
        self.valid_jobs().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_attributes() {
        let info = ContainerInfo::from_attributes(attributes(&[
            ("id", "abc123"),
            ("name", "/db"),
            ("image", "postgres:16"),
            ("created", "2018-01-07T10:15:30.123456789Z"),
        ]))
        .unwrap();

        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "db");
        assert_eq!(info.image.as_deref(), Some("postgres:16"));
        assert!(info.created.is_some());
        assert_eq!(info.to_string(), "db (postgres:16)");
    }

    #[test]
    fn test_from_attributes_requires_id() {
        assert!(ContainerInfo::from_attributes(attributes(&[("name", "db")])).is_err());
    }

    #[test]
    fn test_volume_attributes() {
        let mut info = ContainerInfo::from_attributes(attributes(&[("id", "1"), ("name", "db")]))
            .unwrap()
            .with_mounts(vec![
                Volume::new("data", "/var/lib/docker/volumes/data", "/data", true),
                Volume::new("", "/srv/conf", "/etc/app", true),
            ]);
        info.add_volume_attributes();

        assert_eq!(info.attributes["volumes"], "/data /etc/app");
        assert_eq!(info.attributes["volumes.destination"], "/data /etc/app");
        assert_eq!(
            info.attributes["volumes.source"],
            "/var/lib/docker/volumes/data /srv/conf"
        );
        assert_eq!(
            info.attributes["volumes.localpath"],
            "/var/lib/docker/volumes/data /srv/conf"
        );
    }

    #[test]
    fn test_no_volume_attributes_without_mounts() {
        let mut info =
            ContainerInfo::from_attributes(attributes(&[("id", "1"), ("name", "db")])).unwrap();
        info.add_volume_attributes();
        assert!(!info.attributes.contains_key("volumes"));
    }

    #[test]
    fn test_temp_container_detection() {
        let info = ContainerInfo::from_attributes(attributes(&[
            ("id", "1"),
            ("name", &temp_container_name("backup-1-db")),
        ]))
        .unwrap();
        assert!(info.is_temp_container());
        assert_eq!(info.name, "Temp-Container-backup-1-db");
    }

    #[test]
    fn test_find_job_reuses_name_and_schedule() {
        let info = ContainerInfo::from_attributes(attributes(&[("id", "1"), ("name", "db")])).unwrap();
        let mut container = Container::new(info);

        container.find_job("backup", "0 1 * * *");
        container.find_job("backup", "0 1 * * *");
        container.find_job("backup", "0 2 * * *");

        assert_eq!(container.jobs.len(), 2);
        assert_eq!(container.valid_job_count(), 0);
    }

    #[test]
    fn test_container_filter() {
        let filter = ContainerFilter::new("^app-").unwrap();
        assert!(filter.matches("app-web"));
        assert!(!filter.matches("db"));
        assert!(ContainerFilter::all().matches("anything"));
        assert!(ContainerFilter::new("(").is_err());
    }
}
