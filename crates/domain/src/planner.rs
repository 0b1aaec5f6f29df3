//! 作业规划
//!
//! 为一个容器生成作业和命令组：
//! 1. 非批处理容器编译自身的步骤，Central 场景在批处理容器上执行，其余在自身执行；
//! 2. 从批处理容器继承步骤：普通容器继承 Local 场景，批处理容器自身继承 Central/Maven 场景，
//!    数据源始终是被规划的容器；
//! 3. 激活：含非空命令的命令组有效，含有效命令组的作业有效。

use std::collections::HashMap;
use std::sync::Arc;

use docker_cron_core::config::EvaluationConfig;
use docker_cron_core::{Container, ContainerInfo, ContainerRef, Scenario};
use tracing::{debug, info, warn};

use crate::attributes::AttributeResolver;
use crate::evaluation::{parameters_for, EvaluationFacade, EvaluatorRegistry};
use crate::steps::{StepCompiler, StepDescriptor};

const LOCAL_LEVELS: &[Scenario] = &[Scenario::Local];
const CENTRAL_LEVELS: &[Scenario] = &[Scenario::Central, Scenario::Maven];

/// 作业规划器
#[derive(Clone)]
pub struct JobPlanner {
    compiler: StepCompiler,
    registry: EvaluatorRegistry,
    config: EvaluationConfig,
}

impl JobPlanner {
    pub fn new(config: EvaluationConfig, registry: EvaluatorRegistry) -> Self {
        let resolver =
            AttributeResolver::new(config.default_script_engine.clone(), config.scripting_as_template);
        Self {
            compiler: StepCompiler::new(resolver),
            registry,
            config,
        }
    }

    /// 开始一轮规划，同一轮内批处理容器的步骤只编译一次
    pub fn pass<'a>(&'a self, batch: Option<&'a ContainerInfo>) -> PlanningPass<'a> {
        PlanningPass {
            planner: self,
            batch,
            compiled: HashMap::new(),
        }
    }

    /// 单独规划一个容器
    pub fn plan(&self, container: &mut Container, batch: Option<&ContainerInfo>) {
        self.pass(batch).plan(container);
    }

    /// 编译容器步骤（不生成作业）
    pub fn compile_steps(&self, container: &ContainerInfo, is_batch: bool) -> Vec<StepDescriptor> {
        self.compiler
            .compile_all(&container.name, &container.attributes, is_batch)
    }
}

impl Default for JobPlanner {
    fn default() -> Self {
        Self::new(EvaluationConfig::default(), EvaluatorRegistry::new())
    }
}

/// 一轮规划，缓存已编译的步骤
pub struct PlanningPass<'a> {
    planner: &'a JobPlanner,
    batch: Option<&'a ContainerInfo>,
    compiled: HashMap<(String, bool), Arc<Vec<StepDescriptor>>>,
}

impl<'a> PlanningPass<'a> {
    pub fn plan(&mut self, container: &mut Container) {
        let is_batch = self
            .batch
            .is_some_and(|batch| batch.id == container.info.id);

        // 每次规划都重新渲染命令，已有的作业和命令组只保留结构
        for job in &mut container.jobs {
            job.clear_commands();
        }

        if !is_batch {
            self.create_local_jobs(container);
        }
        self.create_central_jobs(container, is_batch);

        let valid = container
            .jobs
            .iter_mut()
            .map(|job| job.activate())
            .filter(|valid| *valid)
            .count();

        info!(
            "容器 {} 的作业规划完成: {} 个作业, {} 个有效",
            container.info,
            container.jobs.len(),
            valid
        );
        if valid > 0 {
            for (key, value) in &container.info.attributes {
                debug!(" -- {}: {}", key, value);
            }
        }
    }

    fn steps(&mut self, container: &ContainerInfo, is_batch: bool) -> Arc<Vec<StepDescriptor>> {
        let planner = self.planner;
        self.compiled
            .entry((container.id.clone(), is_batch))
            .or_insert_with(|| Arc::new(planner.compile_steps(container, is_batch)))
            .clone()
    }

    fn create_local_jobs(&mut self, container: &mut Container) {
        let steps = self.steps(&container.info, false);
        let own = container.info.reference();

        for step in steps.iter() {
            let execution = if step.is_central_executor() {
                match self.batch {
                    Some(batch) => batch.reference(),
                    None => {
                        warn!(
                            "没有批处理容器，容器 {} 的Central步骤 {} 被跳过",
                            container.info, step.job_name
                        );
                        continue;
                    }
                }
            } else {
                own.clone()
            };
            self.add_commands(container, step, execution);
        }
    }

    fn create_central_jobs(&mut self, container: &mut Container, is_batch: bool) {
        let Some(batch) = self.batch else {
            return;
        };

        let levels = if is_batch { CENTRAL_LEVELS } else { LOCAL_LEVELS };
        let steps = self.steps(batch, true);
        let own = container.info.reference();

        for step in steps.iter().filter(|s| levels.contains(&s.scenario)) {
            let execution = if step.is_central_executor() {
                batch.reference()
            } else {
                own.clone()
            };
            self.add_commands(container, step, execution);
        }
    }

    fn add_commands(&self, container: &mut Container, step: &StepDescriptor, execution: ContainerRef) {
        let config = &self.planner.config;
        let parameter_sets: Vec<HashMap<String, String>> =
            if config.expand_per_mount && !container.info.mounts.is_empty() {
                container
                    .info
                    .mounts
                    .iter()
                    .map(|volume| parameters_for(&container.info, Some(volume)))
                    .collect()
            } else {
                vec![parameters_for(&container.info, None)]
            };
        let data_source = container.info.reference();
        let container_name = container.info.name.clone();

        let job = container.find_job(&step.job_name, &step.schedule);
        let group = job.find_command_group(
            &execution,
            &data_source,
            Some(step.scenario),
            &step.script_engine,
            step.scripting_as_template,
        );

        for parameters in parameter_sets {
            let facade = match EvaluationFacade::new(
                &self.planner.registry,
                config,
                &step.script_engine,
                step.scripting_as_template,
                parameters,
            ) {
                Ok(facade) => facade,
                Err(e) => {
                    warn!("容器 {} 的步骤 {} 无法求值: {}", container_name, step.job_name, e);
                    continue;
                }
            };

            if !facade.is_valid(step.condition.as_deref()) {
                debug!(
                    "容器 {} 的步骤 {}({}) 条件不满足",
                    container_name, step.job_name, step.step_name
                );
                continue;
            }

            match facade.render(&step.command) {
                Ok(command) => {
                    if !group.add_command(command) {
                        debug!("步骤 {} 渲染结果为空，已忽略", step.job_name);
                    }
                }
                Err(e) => warn!("无法渲染命令 {}: {}", step.command, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docker_cron_core::Volume;

    fn container(id: &str, name: &str, labels: &[(&str, &str)]) -> ContainerInfo {
        let mut attributes: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        attributes.insert("id".to_string(), id.to_string());
        attributes.insert("name".to_string(), name.to_string());
        ContainerInfo::from_attributes(attributes).unwrap()
    }

    #[test]
    fn test_single_step_yields_one_valid_job() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.condition", "true"),
                ("job.backup.command.dump", "pg_dump {name}"),
            ],
        ));

        planner.plan(&mut db, None);

        assert_eq!(db.jobs.len(), 1);
        let job = &db.jobs[0];
        assert!(job.is_valid());
        assert_eq!(job.command_groups().len(), 1);
        let group = &job.command_groups()[0];
        assert!(group.is_valid());
        assert!(group.destination.is_one_source());
        assert_eq!(group.scenario, Some(Scenario::Local));
        assert_eq!(group.commands(), ["pg_dump db".to_string()]);
    }

    #[test]
    fn test_false_condition_leaves_job_invalid() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.condition", "name == \"web\""),
                ("job.backup.command", "pg_dump"),
            ],
        ));

        planner.plan(&mut db, None);
        assert_eq!(db.valid_job_count(), 0);
    }

    #[test]
    fn test_central_step_without_batch_is_skipped() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.scenario", "Central"),
                ("job.backup.command", "pg_dump"),
            ],
        ));

        planner.plan(&mut db, None);
        assert!(db.jobs.is_empty());
    }

    #[test]
    fn test_central_step_runs_on_batch_container() {
        let planner = JobPlanner::default();
        let batch = container("b", "docker-cron", &[]);
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.scenario", "Central"),
                ("job.backup.command", "backup {name}"),
            ],
        ));

        planner.plan(&mut db, Some(&batch));

        let group = &db.jobs[0].command_groups()[0];
        assert_eq!(group.destination.execution_container.id, "b");
        assert_eq!(group.destination.data_source_container.id, "1");
        assert!(group.destination.is_central_execution(Some("b")));
        assert_eq!(group.commands(), ["backup db".to_string()]);
    }

    #[test]
    fn test_batch_local_steps_propagate_to_other_containers() {
        let planner = JobPlanner::default();
        let batch_info = container(
            "b",
            "docker-cron",
            &[
                ("job.du.schedule", "0 3 * * *"),
                ("job.du.scenario", "Local"),
                ("job.du.command", "du -sh {volumes}"),
            ],
        );
        let mut batch = Container::new(batch_info.clone());
        let mut web = Container::new(container("w", "web", &[("volumes", "/srv")]));

        let mut pass = planner.pass(Some(&batch_info));
        pass.plan(&mut batch);
        pass.plan(&mut web);

        assert_eq!(batch.valid_job_count(), 0);
        assert_eq!(web.valid_job_count(), 1);
        let group = &web.jobs[0].command_groups()[0];
        assert!(group.destination.is_one_source());
        assert_eq!(group.commands(), ["du -sh /srv".to_string()]);
    }

    #[test]
    fn test_batch_central_steps_stay_on_batch() {
        let planner = JobPlanner::default();
        let batch_info = container(
            "b",
            "docker-cron",
            &[
                ("job.report.schedule", "0 4 * * *"),
                ("job.report.command", "report"),
            ],
        );
        let mut batch = Container::new(batch_info.clone());
        let mut web = Container::new(container("w", "web", &[]));

        let mut pass = planner.pass(Some(&batch_info));
        pass.plan(&mut batch);
        pass.plan(&mut web);

        assert_eq!(batch.valid_job_count(), 1);
        assert_eq!(web.valid_job_count(), 0);
        let group = &batch.jobs[0].command_groups()[0];
        assert_eq!(group.scenario, Some(Scenario::Central));
        assert!(group.destination.is_one_source());
    }

    #[test]
    fn test_steps_share_job_and_group() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.command.a", "one"),
                ("job.backup.command.b", "two"),
            ],
        ));

        planner.plan(&mut db, None);

        assert_eq!(db.jobs.len(), 1);
        assert_eq!(db.jobs[0].command_groups().len(), 1);
        let mut commands = db.jobs[0].commands();
        commands.sort();
        assert_eq!(commands, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_replanning_does_not_duplicate_groups_or_commands() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[("job.backup.schedule", "0 1 * * *"), ("job.backup.command", "x")],
        ));

        planner.plan(&mut db, None);
        planner.plan(&mut db, None);

        assert_eq!(db.jobs.len(), 1);
        assert_eq!(db.jobs[0].command_groups().len(), 1);
        assert_eq!(db.jobs[0].commands(), vec!["x".to_string()]);
        assert!(db.jobs[0].is_valid());
    }

    #[test]
    fn test_replanning_with_batch_keeps_single_propagated_command() {
        let planner = JobPlanner::default();
        let batch = container(
            "b",
            "docker-cron",
            &[
                ("job.du.schedule", "0 3 * * *"),
                ("job.du.scenario", "Local"),
                ("job.du.command", "du -sh /"),
            ],
        );
        let mut web = Container::new(container("w", "web", &[]));

        planner.plan(&mut web, Some(&batch));
        planner.plan(&mut web, Some(&batch));

        assert_eq!(web.jobs.len(), 1);
        assert_eq!(web.jobs[0].commands(), vec!["du -sh /".to_string()]);
    }

    #[test]
    fn test_render_failure_skips_only_that_step() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.command.a", "broken {name"),
                ("job.backup.command.b", "fine"),
            ],
        ));

        planner.plan(&mut db, None);
        assert_eq!(db.jobs[0].commands(), vec!["fine".to_string()]);
    }

    #[test]
    fn test_unknown_engine_skips_step() {
        let planner = JobPlanner::default();
        let mut db = Container::new(container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.scriptengine", "groovy"),
                ("job.backup.command", "x"),
            ],
        ));

        planner.plan(&mut db, None);
        assert_eq!(db.valid_job_count(), 0);
    }

    #[test]
    fn test_expand_per_mount() {
        let config = EvaluationConfig {
            expand_per_mount: true,
            ..EvaluationConfig::default()
        };
        let planner = JobPlanner::new(config, EvaluatorRegistry::new());
        let info = container(
            "1",
            "db",
            &[
                ("job.backup.schedule", "0 1 * * *"),
                ("job.backup.command", "tar czf /backup/{volume.name}.tgz {volume}"),
            ],
        )
        .with_mounts(vec![
            Volume::new("a", "/var/a", "/a", true),
            Volume::new("b", "/var/b", "/b", true),
        ]);
        let mut db = Container::new(info);

        planner.plan(&mut db, None);
        assert_eq!(
            db.jobs[0].commands(),
            vec![
                "tar czf /backup/a.tgz /a".to_string(),
                "tar czf /backup/b.tgz /b".to_string()
            ]
        );
    }
}
