pub mod container;
pub mod job;
pub mod log_entry;
pub mod scenario;
pub mod schedule_event;

pub use container::{
    temp_container_name, Container, ContainerFilter, ContainerInfo, ContainerRef, Volume,
    TEMP_CONTAINER_PREFIX,
};
pub use job::{CommandGroup, Job, JobDestination};
pub use log_entry::LogEntry;
pub use scenario::Scenario;
pub use schedule_event::ScheduleEvent;
