use serde::{Deserialize, Serialize};
use std::fmt;

use super::container::ContainerRef;
use super::scenario::Scenario;
use crate::utils::is_blank;

/// 作业的执行位置：在哪个容器上执行，处理哪个容器的数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDestination {
    pub execution_container: ContainerRef,
    pub data_source_container: ContainerRef,
}

impl JobDestination {
    pub fn new(execution_container: ContainerRef, data_source_container: ContainerRef) -> Self {
        Self {
            execution_container,
            data_source_container,
        }
    }

    /// 执行容器与数据源容器相同（原地执行）
    pub fn is_one_source(&self) -> bool {
        self.execution_container.id == self.data_source_container.id
    }

    /// 执行容器是否为当前的批处理容器
    pub fn is_central_execution(&self, batch_container_id: Option<&str>) -> bool {
        batch_container_id == Some(self.execution_container.id.as_str())
    }
}

/// 共享同一 (执行容器, 数据源容器, 场景) 的一组命令
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandGroup {
    pub name: String,
    pub destination: JobDestination,
    pub scenario: Option<Scenario>,
    pub script_engine: String,
    pub scripting_as_template: bool,
    commands: Vec<String>,
    valid: bool,
}

impl CommandGroup {
    pub fn new(
        name: impl Into<String>,
        destination: JobDestination,
        scenario: Option<Scenario>,
        script_engine: impl Into<String>,
        scripting_as_template: bool,
    ) -> Self {
        Self {
            name: name.into(),
            destination,
            scenario,
            script_engine: script_engine.into(),
            scripting_as_template,
            commands: Vec::new(),
            valid: false,
        }
    }

    /// 添加渲染后的命令，空白命令被丢弃
    pub fn add_command(&mut self, command: impl Into<String>) -> bool {
        let command = command.into();
        if is_blank(&command) {
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn matches(
        &self,
        execution_container: &ContainerRef,
        data_source_container: &ContainerRef,
        scenario: Option<Scenario>,
    ) -> bool {
        self.destination.execution_container.id == execution_container.id
            && self.destination.data_source_container.id == data_source_container.id
            && self.scenario == scenario
    }
}

/// 定时执行的作业
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 调度器返回的注册ID，未注册时为空
    pub id: Option<String>,
    pub name: String,
    pub schedule: String,
    command_groups: Vec<CommandGroup>,
    valid: bool,
    group_count: usize,
}

impl Job {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            schedule: schedule.into(),
            command_groups: Vec::new(),
            valid: false,
            group_count: 0,
        }
    }

    pub fn command_groups(&self) -> &[CommandGroup] {
        &self.command_groups
    }

    /// 按 (执行容器, 数据源容器, 场景) 查找命令组，不存在时新建
    ///
    /// 新建的命令组命名为 `<作业名>-<序号>-<数据源容器名>`。
    pub fn find_command_group(
        &mut self,
        execution_container: &ContainerRef,
        data_source_container: &ContainerRef,
        scenario: Option<Scenario>,
        script_engine: &str,
        scripting_as_template: bool,
    ) -> &mut CommandGroup {
        let index = match self
            .command_groups
            .iter()
            .position(|g| g.matches(execution_container, data_source_container, scenario))
        {
            Some(index) => index,
            None => {
                self.group_count += 1;
                let name = format!(
                    "{}-{}-{}",
                    self.name, self.group_count, data_source_container.name
                );
                self.command_groups.push(CommandGroup::new(
                    name,
                    JobDestination::new(execution_container.clone(), data_source_container.clone()),
                    scenario,
                    script_engine,
                    scripting_as_template,
                ));
                self.command_groups.len() - 1
            }
        };
        &mut self.command_groups[index]
    }

    /// 重新计算有效性：含非空命令的命令组有效，含有效命令组的作业有效
    pub fn activate(&mut self) -> bool {
        for group in &mut self.command_groups {
            group.valid = group.commands.iter().any(|c| !is_blank(c));
        }
        self.valid = self.command_groups.iter().any(CommandGroup::is_valid);
        self.valid
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// 清空各命令组的命令，命令组及其名称保留
    pub fn clear_commands(&mut self) {
        for group in &mut self.command_groups {
            group.commands.clear();
            group.valid = false;
        }
        self.valid = false;
    }

    /// 按命令组顺序展开的全部命令
    pub fn commands(&self) -> Vec<String> {
        self.command_groups
            .iter()
            .flat_map(|g| g.commands.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.valid {
            f.write_str("(invalid)")?;
        }
        Ok(())
    }
}
