use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use docker_cron_core::utils::start_of_day;
use docker_cron_core::{Container, JobScheduler, ScheduleEvent};
use tracing::warn;

/// 生成一个容器的日历事件
pub fn project_calendar(
    container: &Container,
    scheduler: &dyn JobScheduler,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BTreeSet<ScheduleEvent> {
    let mut events = BTreeSet::new();
    project_into(&mut events, container, scheduler, from, to, now);
    events
}

/// 把容器的日历事件累加进有序集合
///
/// 没有有效作业的容器不产生任何事件。历史部分：创建时间早于今天零点时生成一个全天事件
/// [创建, 今天零点] 和一个 [今天零点, 现在] 事件，否则生成 [创建, 现在]。未来部分：每个有效作业
/// 在 (max(from, now), to) 内的预测触发时间各生成一个事件。
pub fn project_into(
    events: &mut BTreeSet<ScheduleEvent>,
    container: &Container,
    scheduler: &dyn JobScheduler,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    if container.valid_job_count() == 0 {
        return;
    }

    let title = container.name();
    if let Some(created) = container.info.created {
        let today = start_of_day(now);
        if created < today {
            events.insert(ScheduleEvent::new(title, created, Some(today), false, true));
            events.insert(ScheduleEvent::new(title, today, Some(now), false, false));
        } else {
            events.insert(ScheduleEvent::new(title, created, Some(now), false, false));
        }
    }

    let future_from = from.max(now);
    for job in container.valid_jobs() {
        let dates = match scheduler.predict_fire_dates(&job.schedule, future_from, to) {
            Ok(dates) => dates,
            Err(e) => {
                warn!("无法预测作业 {} 的执行时间 ({}): {}", job.name, job.schedule, e);
                continue;
            }
        };

        let commands = job.commands();
        for date in dates {
            events.insert(
                ScheduleEvent::new(title, date, None, true, false)
                    .with_schedule(job.schedule.clone(), commands.clone()),
            );
        }
    }
}
