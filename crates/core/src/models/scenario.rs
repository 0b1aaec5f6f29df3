use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{SchedulerError, SchedulerResult};

/// 作业步骤的执行场景
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// 先解析Maven构件再在主机上调用
    Maven,
    /// 在数据源容器内执行
    Local,
    /// 在批处理容器上执行
    Central,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Maven => "Maven",
            Scenario::Local => "Local",
            Scenario::Central => "Central",
        }
    }

    /// 只有Central场景在批处理容器上执行
    pub fn is_central_executor(&self) -> bool {
        matches!(self, Scenario::Central)
    }

    /// 容器未声明场景时的默认值
    pub fn default_for(is_batch_container: bool) -> Self {
        if is_batch_container {
            Scenario::Central
        } else {
            Scenario::Local
        }
    }

    pub fn parse(key: &str, value: &str) -> SchedulerResult<Self> {
        value
            .parse()
            .map_err(|_| SchedulerError::invalid_attribute(key, value))
    }
}

impl FromStr for Scenario {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maven" => Ok(Scenario::Maven),
            "local" => Ok(Scenario::Local),
            "central" => Ok(Scenario::Central),
            _ => Err(SchedulerError::invalid_attribute("scenario", s)),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("Central".parse::<Scenario>().unwrap(), Scenario::Central);
        assert_eq!(" local ".parse::<Scenario>().unwrap(), Scenario::Local);
        assert_eq!("MAVEN".parse::<Scenario>().unwrap(), Scenario::Maven);
    }

    #[test]
    fn test_unknown_literal_is_error() {
        let err = Scenario::parse("job.backup.scenario", "volume").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_default_for_container_role() {
        assert_eq!(Scenario::default_for(true), Scenario::Central);
        assert_eq!(Scenario::default_for(false), Scenario::Local);
        assert!(Scenario::Central.is_central_executor());
        assert!(!Scenario::Maven.is_central_executor());
    }
}
