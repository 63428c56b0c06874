//! Multi-tick lifecycle tests for the scheduler driving the agent runner.
//!
//! These drive `Scheduler::tick` directly so every tick boundary is explicit.

use std::sync::Arc;

use stepper::agent::AgentRunner;
use stepper::core::settings::{RunState, SchedulerSettings, Toggle};
use stepper::events::{EventBus, SchedulerEvent};
use stepper::executor::StepExecutor;
use stepper::query::QuerySurface;
use stepper::io::reasoner::Reasoner;
use stepper::scheduler::{Scheduler, SchedulerControl};
use stepper::test_support::{GatedReasoner, ScriptedReasoner, finish, progress};

fn build(reasoner: ScriptedReasoner) -> (Arc<AgentRunner>, QuerySurface, Scheduler) {
    build_with(Arc::new(reasoner))
}

fn build_with(reasoner: Arc<dyn Reasoner>) -> (Arc<AgentRunner>, QuerySurface, Scheduler) {
    let agent = Arc::new(AgentRunner::new(reasoner));
    let control = SchedulerControl::new(SchedulerSettings::default(), EventBus::default());
    let query = QuerySurface::new(agent.clone());
    let scheduler = Scheduler::new(agent.clone(), control);
    (agent, query, scheduler)
}

/// Create "A", run one stepwise tick whose step is the last one, and observe
/// completion plus the automatic pause.
#[tokio::test]
async fn stepwise_tick_completes_task_and_pauses() {
    let (agent, query, scheduler) = build(ScriptedReasoner::new(vec![finish("answer for A")]));
    let control = scheduler.control().clone();

    let task = agent.create_task("A").expect("create");
    assert_eq!(query.tasks().expect("tasks"), vec![task.clone()]);
    assert_eq!(query.active_tasks().expect("active"), vec![task.clone()]);
    assert!(query.completed_tasks().expect("completed").is_empty());

    control.set_running(RunState::Running);
    control.set_stepwise(Toggle::On);
    scheduler.tick().await;

    assert_eq!(query.completed_tasks().expect("completed"), vec![task.clone()]);
    assert!(!control.running());
    assert_eq!(query.output(&task.task_id).expect("output").output, "answer for A");
}

/// Two tasks of different lengths under continuous mode.
///
/// ```text
/// tick 1: short -> progress, long -> progress
/// tick 2: short -> last (finalized), long -> progress
/// tick 3: long -> last (finalized)
/// tick 4: nothing left to step
/// ```
#[tokio::test]
async fn continuous_mode_runs_tasks_to_completion() {
    let (agent, query, scheduler) = build(
        ScriptedReasoner::default()
            .with_task("short", vec![progress("s1"), finish("s2")])
            .with_task("long", vec![progress("l1"), progress("l2"), finish("l3")]),
    );
    let mut events = scheduler.control().events().subscribe();
    scheduler.control().set_running(RunState::Running);

    let short = agent.create_task("short").expect("create");
    let long = agent.create_task("long").expect("create");

    let r1 = scheduler.tick().await;
    assert_eq!(r1.stepped, vec![short.task_id.clone(), long.task_id.clone()]);
    assert!(r1.completed.is_empty());

    let r2 = scheduler.tick().await;
    assert_eq!(r2.completed, vec![short.task_id.clone()]);

    let r3 = scheduler.tick().await;
    assert_eq!(r3.stepped, vec![long.task_id.clone()]);
    assert_eq!(r3.completed, vec![long.task_id.clone()]);

    let r4 = scheduler.tick().await;
    assert!(r4.ran);
    assert!(r4.stepped.is_empty());
    assert!(scheduler.control().running());

    let outputs: Vec<String> = query
        .completed_steps(&long.task_id)
        .expect("steps")
        .into_iter()
        .map(|s| s.output)
        .collect();
    assert_eq!(outputs, vec!["l1", "l2", "l3"]);
    assert!(query.upcoming_steps(&long.task_id).expect("upcoming").is_empty());

    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::TaskCompleted { task_id } = event {
            completed.push(task_id);
        }
    }
    assert_eq!(completed, vec![short.task_id, long.task_id]);
}

/// A task created between ticks joins the next tick.
#[tokio::test]
async fn task_created_between_ticks_is_picked_up() {
    let (agent, _query, scheduler) = build(ScriptedReasoner::repeating(progress("working")));
    scheduler.control().set_running(RunState::Running);

    let first = agent.create_task("first").expect("create");
    assert_eq!(scheduler.tick().await.stepped, vec![first.task_id.clone()]);

    let second = agent.create_task("second").expect("create");
    assert_eq!(
        scheduler.tick().await.stepped,
        vec![first.task_id, second.task_id]
    );
}

/// Reset drops all tasks; the next tick has nothing to do.
#[tokio::test]
async fn reset_clears_work_for_following_ticks() {
    let (agent, query, scheduler) = build(ScriptedReasoner::repeating(progress("working")));
    scheduler.control().set_running(RunState::Running);
    agent.create_task("doomed").expect("create");
    scheduler.tick().await;

    agent.reset().expect("reset");
    assert!(query.tasks().expect("tasks").is_empty());
    assert!(query.messages().expect("messages").is_empty());
    assert!(scheduler.tick().await.stepped.is_empty());
}

/// A tick whose step is blocked inside the reasoner, driven on its own task.
struct BlockedTick {
    agent: Arc<AgentRunner>,
    query: QuerySurface,
    control: SchedulerControl,
    scheduler: Arc<Scheduler>,
    gate: Arc<GatedReasoner>,
}

fn blocked(reasoner: ScriptedReasoner) -> BlockedTick {
    let gate = Arc::new(GatedReasoner::new(reasoner));
    let (agent, query, scheduler) = build_with(gate.clone());
    let control = scheduler.control().clone();
    control.set_running(RunState::Running);
    BlockedTick {
        agent,
        query,
        control,
        scheduler: Arc::new(scheduler),
        gate,
    }
}

#[tokio::test]
async fn queries_and_control_stay_available_during_a_step() {
    let t = blocked(ScriptedReasoner::repeating(progress("slow")));
    let task = t.agent.create_task("slow").expect("create");

    let scheduler = t.scheduler.clone();
    let tick = tokio::spawn(async move { scheduler.tick().await });
    t.gate.entered().await;

    assert_eq!(t.query.tasks().expect("tasks"), vec![task.clone()]);
    assert_eq!(t.query.active_tasks().expect("active"), vec![task.clone()]);
    assert!(t.query.completed_steps(&task.task_id).expect("steps").is_empty());
    assert_eq!(t.query.messages().expect("messages").len(), 1);
    assert_eq!(t.control.set_interval(2).expect("interval"), 2);
    assert!(!t.control.set_stepwise(Toggle::Off));
    assert!(t.control.running());

    t.gate.open();
    let report = tick.await.expect("tick task");
    assert_eq!(report.stepped, vec![task.task_id]);
    assert_eq!(t.control.interval_secs(), 2);
}

#[tokio::test]
async fn stopping_mid_tick_finishes_the_step_and_skips_the_next_tick() {
    let t = blocked(ScriptedReasoner::repeating(progress("slow")));
    let task = t.agent.create_task("slow").expect("create");

    let scheduler = t.scheduler.clone();
    let tick = tokio::spawn(async move { scheduler.tick().await });
    t.gate.entered().await;
    t.control.set_running(RunState::Stopped);
    t.gate.open();

    let report = tick.await.expect("tick task");
    assert_eq!(report.stepped, vec![task.task_id.clone()]);
    assert!(!report.paused);
    assert!(!t.control.running());
    assert_eq!(t.query.completed_steps(&task.task_id).expect("steps").len(), 1);

    assert!(!t.scheduler.tick().await.ran);
    assert_eq!(t.gate.calls().len(), 1);
}

#[tokio::test]
async fn reset_during_a_step_reports_failure_and_leaves_no_tasks() {
    let t = blocked(ScriptedReasoner::repeating(progress("slow")));
    let task = t.agent.create_task("slow").expect("create");
    let mut events = t.control.events().subscribe();

    let scheduler = t.scheduler.clone();
    let tick = tokio::spawn(async move { scheduler.tick().await });
    t.gate.entered().await;
    t.agent.reset().expect("reset");
    t.gate.open();

    let report = tick.await.expect("tick task");
    assert_eq!(report.failed, vec![task.task_id.clone()]);
    assert!(report.stepped.is_empty());
    assert!(t.query.tasks().expect("tasks").is_empty());
    assert!(matches!(
        events.try_recv(),
        Ok(SchedulerEvent::StepFailed { task_id, error }) if task_id == task.task_id && error.contains("reset")
    ));
}
