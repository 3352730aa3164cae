use fintrack_jobs::observer;
use fintrack_jobs::{JobController, JobStatus, JobUpdate, ObserverRx, TaskLog};

fn drain(rx: &mut ObserverRx) -> Vec<JobUpdate> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[test]
fn import_job_end_to_end() {
    let controller = JobController::new();
    let job = controller.create_job("Import", "alice", "My Tool", "srv1");
    assert_eq!(job.status(), JobStatus::NotStarted);
    assert_eq!(job.task_count(), 0);

    let (tx, mut rx) = observer::channel();
    job.add_observer(tx);

    let task = job.create_sub_task("Fetch", None);
    assert_eq!(job.status(), JobStatus::InProgress);
    assert_eq!(task.progress(), 0);
    assert_eq!(task.status(), JobStatus::InProgress);

    task.set_progress_max(10);
    task.set_progress(10, Some("done"));
    task.info("fetched all rows");
    task.finish_task(JobStatus::Success).unwrap();

    assert_eq!(task.status(), JobStatus::Success);
    assert!(task.end().is_some());
    assert_eq!(task.progress(), 10);
    assert_eq!(task.format_progress_label(), "done");

    job.finish_job(JobStatus::Success).unwrap();
    assert_eq!(job.status(), JobStatus::Success);
    assert!(job.end().unwrap() >= job.start());
    assert_eq!(job.observer_count(), 0);

    let updates = drain(&mut rx);
    let kinds: Vec<&str> = updates
        .iter()
        .map(|u| match u {
            JobUpdate::Job(_) => "job",
            JobUpdate::Task(_) => "task",
            JobUpdate::Status { task: None, .. } => "job-status",
            JobUpdate::Status { task: Some(_), .. } => "task-status",
            JobUpdate::Message { .. } => "message",
            JobUpdate::Progress { .. } => "progress",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "job",
            "job-status",
            "task",
            "progress",
            "progress",
            "message",
            "task-status",
            "message",
            "progress",
            "job-status",
        ]
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn two_observers_at_different_times() {
    let controller = JobController::new();
    let job = controller.create_job("Import", "alice", "My Tool", "srv1");
    let task = job.create_sub_task("Fetch", None);

    let (early_tx, mut early) = observer::channel();
    job.add_observer(early_tx);
    for _ in 0..3 {
        task.increment_progress(1);
    }

    let (late_tx, mut late) = observer::channel();
    job.add_observer(late_tx);

    let late_updates = drain(&mut late);
    assert_eq!(late_updates.len(), 1);
    let JobUpdate::Job(snapshot) = &late_updates[0] else {
        panic!("late observer must start with a snapshot");
    };
    assert_eq!(snapshot.tasks[0].progress, 3);

    task.increment_progress(1);

    let late_values: Vec<u64> = drain(&mut late)
        .into_iter()
        .filter_map(|u| match u {
            JobUpdate::Progress { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(late_values, vec![4]);

    let early_values: Vec<u64> = drain(&mut early)
        .into_iter()
        .filter_map(|u| match u {
            JobUpdate::Progress { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(early_values, vec![1, 2, 3, 4]);
}

#[test]
fn finished_task_cannot_be_finished_again() {
    let controller = JobController::new();
    let job = controller.create_job("Import", "alice", "My Tool", "srv1");
    let task = job.create_sub_task("Fetch", None);
    task.finish_task(JobStatus::Error).unwrap();
    let end = task.end();

    assert!(task.finish_task(JobStatus::Success).is_err());
    assert_eq!(task.status(), JobStatus::Error);
    assert_eq!(task.end(), end);
}

#[test]
fn observers_on_concurrent_drivers_see_total_order() {
    let controller = JobController::new();
    let job = controller.create_job("Import", "alice", "My Tool", "srv1");
    let (tx, mut rx) = observer::channel();
    job.add_observer(tx);

    let a = job.create_sub_task("A", None);
    let b = job.create_sub_task("B", None);
    std::thread::scope(|s| {
        s.spawn(|| (0..50).for_each(|_| a.increment_progress(1)));
        s.spawn(|| (0..50).for_each(|_| b.increment_progress(1)));
    });

    let mut last_a = 0;
    let mut last_b = 0;
    for update in drain(&mut rx) {
        if let JobUpdate::Progress { task, value, .. } = update {
            let last = if task == "A" { &mut last_a } else { &mut last_b };
            assert_eq!(value, *last + 1);
            *last = value;
        }
    }
    assert_eq!((last_a, last_b), (50, 50));
}
