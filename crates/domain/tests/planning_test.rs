use docker_cron_core::{Container, Scenario};
use docker_cron_domain::JobPlanner;
use docker_cron_testing_utils::ContainerBuilder;

fn fleet(batch_scenario: &str) -> (Container, Vec<Container>) {
    let batch = Container::new(
        ContainerBuilder::new("batch", "docker-cron")
            .with_image("docker-cron:latest")
            .with_job("backup", "0 2 * * *", "backup {name}", Some(batch_scenario))
            .build(),
    );
    let peripherals = (0..10)
        .map(|i| {
            Container::new(
                ContainerBuilder::new(&format!("c{i}"), &format!("app-{i}"))
                    .with_image("nginx")
                    .build(),
            )
        })
        .collect();
    (batch, peripherals)
}

fn plan_fleet(batch: &mut Container, peripherals: &mut [Container]) {
    let planner = JobPlanner::default();
    let batch_info = batch.info.clone();
    let mut pass = planner.pass(Some(&batch_info));
    pass.plan(batch);
    for container in peripherals.iter_mut() {
        pass.plan(container);
    }
}

#[test]
fn test_central_step_stays_on_batch_container() {
    let (mut batch, mut peripherals) = fleet("Central");
    plan_fleet(&mut batch, &mut peripherals);

    let total: usize = batch.valid_job_count()
        + peripherals.iter().map(Container::valid_job_count).sum::<usize>();
    assert_eq!(total, 1);
    assert_eq!(batch.valid_job_count(), 1);
    assert_eq!(
        batch.jobs[0].commands(),
        vec!["backup docker-cron".to_string()]
    );
}

#[test]
fn test_local_step_propagates_to_every_peripheral() {
    let (mut batch, mut peripherals) = fleet("Local");
    plan_fleet(&mut batch, &mut peripherals);

    assert_eq!(batch.valid_job_count(), 0);
    for (i, container) in peripherals.iter().enumerate() {
        assert_eq!(container.valid_job_count(), 1);
        let group = &container.jobs[0].command_groups()[0];
        assert_eq!(group.scenario, Some(Scenario::Local));
        assert!(group.destination.is_one_source());
        assert_eq!(group.commands(), [format!("backup app-{i}")]);
    }
}

#[test]
fn test_peripheral_central_step_uses_batch_execution_container() {
    let planner = JobPlanner::default();
    let batch_info = ContainerBuilder::new("batch", "docker-cron").build();
    let mut batch = Container::new(batch_info.clone());
    let mut db = Container::new(
        ContainerBuilder::new("db1", "db")
            .with_job("dump", "30 1 * * *", "pg_dump -f /backup/{name}.sql", Some("central"))
            .build(),
    );

    let mut pass = planner.pass(Some(&batch_info));
    pass.plan(&mut batch);
    pass.plan(&mut db);

    assert_eq!(batch.valid_job_count(), 0);
    assert_eq!(db.valid_job_count(), 1);
    let group = &db.jobs[0].command_groups()[0];
    assert_eq!(group.name, "dump-1-db");
    assert_eq!(group.destination.execution_container.id, "batch");
    assert_eq!(group.destination.data_source_container.id, "db1");
    assert!(!group.destination.is_one_source());
    assert_eq!(group.commands(), ["pg_dump -f /backup/db.sql".to_string()]);
}

#[test]
fn test_unknown_scenario_only_fails_that_step() {
    let planner = JobPlanner::default();
    let mut db = Container::new(
        ContainerBuilder::new("db1", "db")
            .with_job("broken", "0 1 * * *", "echo broken", Some("Somewhere"))
            .with_job("fine", "0 2 * * *", "echo fine", None)
            .build(),
    );

    planner.plan(&mut db, None);

    assert_eq!(db.valid_job_count(), 1);
    assert_eq!(db.valid_jobs().next().map(|j| j.name.as_str()), Some("fine"));
}

#[test]
fn test_override_chain_prefers_most_specific_key() {
    let planner = JobPlanner::default();
    let mut db = Container::new(
        ContainerBuilder::new("db1", "db")
            .with_label("job.backup.schedule", "0 1 * * *")
            .with_label("job.backup.schedule.full", "0 3 * * 0")
            .with_label("job.backup.command.full", "full {name}")
            .with_label("job.backup.command.incr", "incr {name}")
            .build(),
    );

    planner.plan(&mut db, None);

    let mut schedules: Vec<(String, Vec<String>)> = db
        .valid_jobs()
        .map(|job| (job.schedule.clone(), job.commands()))
        .collect();
    schedules.sort();
    assert_eq!(
        schedules,
        vec![
            ("0 1 * * *".to_string(), vec!["incr db".to_string()]),
            ("0 3 * * 0".to_string(), vec!["full db".to_string()]),
        ]
    );
}

#[test]
fn test_condition_on_container_attribute() {
    let planner = JobPlanner::default();
    let labels = |image: &str| {
        ContainerBuilder::new(image, image)
            .with_image(image)
            .with_job("vacuum", "0 4 * * *", "vacuumdb --all", None)
            .with_label("job.vacuum.condition", "image == \"postgres\"")
            .build()
    };
    let mut pg = Container::new(labels("postgres"));
    let mut my = Container::new(labels("mysql"));

    planner.plan(&mut pg, None);
    planner.plan(&mut my, None);

    assert_eq!(pg.valid_job_count(), 1);
    assert_eq!(my.valid_job_count(), 0);
}
