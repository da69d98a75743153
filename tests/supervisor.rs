use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Barrier, Notify, mpsc};
use tokio::time::timeout;

use watchvisor::{
    Bus, ChangeSender, ChannelWatcher, Event, EventKind, Killer, NotifyHandler, Phase, Subscribe,
    Supervisor, Termination, WorkerError, channel,
};

const LONG_WAIT: Duration = Duration::from_secs(5);
const SHORT_WAIT: Duration = Duration::from_millis(50);

#[derive(Clone, Default)]
struct Actions(Arc<Mutex<Vec<&'static str>>>);

impl Actions {
    fn push(&self, a: &'static str) {
        self.0.lock().unwrap().push(a);
    }

    fn get(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

struct TestHandler {
    actions: Actions,
    watcher: Option<ChannelWatcher<()>>,
    setup_error: Option<WorkerError>,
    teardown_error: Option<WorkerError>,
    handler_error: Option<WorkerError>,
    panic_in_handler: bool,
    gate: Option<Arc<Notify>>,
    handled: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl NotifyHandler for TestHandler {
    type Watcher = ChannelWatcher<()>;

    fn name(&self) -> &str {
        "test notify handler"
    }

    async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
        self.actions.push("setup");
        if let Some(err) = self.setup_error.clone() {
            return Err(err);
        }
        self.watcher
            .take()
            .ok_or_else(|| WorkerError::fail("watcher already taken"))
    }

    async fn react(&mut self, _change: (), _killer: &Killer) -> Result<(), WorkerError> {
        self.actions.push("handler");
        let _ = self.handled.send(());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.panic_in_handler {
            panic!("handler blew up");
        }
        match self.handler_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn release(&mut self) -> Result<(), WorkerError> {
        self.actions.push("teardown");
        match self.teardown_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Fixture {
    handler: TestHandler,
    tx: ChangeSender<()>,
    actions: Actions,
    handled: mpsc::UnboundedReceiver<()>,
}

fn fixture() -> Fixture {
    let (tx, watcher) = channel(1);
    let (handled_tx, handled) = mpsc::unbounded_channel();
    let actions = Actions::default();
    Fixture {
        handler: TestHandler {
            actions: actions.clone(),
            watcher: Some(watcher),
            setup_error: None,
            teardown_error: None,
            handler_error: None,
            panic_in_handler: false,
            gate: None,
            handled: handled_tx,
        },
        tx,
        actions,
        handled,
    }
}

async fn wait_long(sup: &Supervisor) -> Result<(), WorkerError> {
    timeout(LONG_WAIT, sup.wait())
        .await
        .expect("worker did not die in time")
}

async fn wait_handled(rx: &mut mpsc::UnboundedReceiver<()>) {
    timeout(LONG_WAIT, rx.recv())
        .await
        .expect("handler was not called")
        .expect("handler signal closed");
}

async fn trigger(tx: &ChangeSender<()>) {
    timeout(LONG_WAIT, tx.send(()))
        .await
        .expect("timed out triggering change")
        .expect("watcher stopped");
}

#[tokio::test]
async fn kill_returns_clean() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    sup.kill(None);
    assert_eq!(wait_long(&sup).await, Ok(()));
    assert_eq!(sup.phase(), Phase::Dead);
}

#[tokio::test]
async fn stop_then_wait_returns_immediately() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    assert_eq!(sup.stop().await, Ok(()));
    assert_eq!(timeout(SHORT_WAIT, sup.wait()).await.unwrap(), Ok(()));
    assert_eq!(sup.stop().await, Ok(()));
}

#[tokio::test]
async fn wait_blocks_until_killed() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);

    let waiter = tokio::spawn({
        let sup = sup.clone();
        async move { sup.wait().await }
    });
    assert!(timeout(SHORT_WAIT, sup.wait()).await.is_err());
    assert!(!waiter.is_finished());

    sup.kill(None);
    assert_eq!(timeout(LONG_WAIT, waiter).await.unwrap().unwrap(), Ok(()));
}

#[tokio::test]
async fn display_forwards_handler_name() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    assert_eq!(sup.to_string(), "test notify handler");
    assert_eq!(sup.name(), "test notify handler");
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn kill_calls_setup_then_teardown_and_stops_watcher() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    sup.kill(None);
    assert_eq!(wait_long(&sup).await, Ok(()));
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
    assert!(f.tx.is_stopped());
}

#[tokio::test]
async fn changes_trigger_handler_in_order() {
    let mut f = fixture();
    let sup = Supervisor::start(f.handler);

    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    assert_eq!(f.actions.get(), vec!["setup", "handler"]);

    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    assert_eq!(f.actions.get(), vec!["setup", "handler", "handler", "handler"]);

    assert_eq!(sup.stop().await, Ok(()));
    assert_eq!(
        f.actions.get(),
        vec!["setup", "handler", "handler", "handler", "teardown"]
    );
    assert_eq!(sup.handled(), 3);
}

#[tokio::test]
async fn setup_failure_still_tears_down() {
    let mut f = fixture();
    f.handler.setup_error = Some(WorkerError::fail("my special error"));
    let sup = Supervisor::start(f.handler);

    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("my special error"))
    );
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
}

#[tokio::test]
async fn watcher_stop_failure_propagates() {
    let f = fixture();
    f.tx.set_termination(Termination::Failed(WorkerError::fail(
        "error while stopping watcher",
    )));
    let sup = Supervisor::start(f.handler);
    sup.kill(None);
    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("error while stopping watcher"))
    );
}

#[tokio::test]
async fn clean_run_notices_teardown_error() {
    let mut f = fixture();
    f.handler.teardown_error = Some(WorkerError::fail("failed to tear down watcher"));
    let sup = Supervisor::start(f.handler);
    sup.kill(None);
    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("failed to tear down watcher"))
    );
}

#[tokio::test]
async fn handle_error_stops_worker_and_watcher() {
    let mut f = fixture();
    f.handler.handler_error = Some(WorkerError::fail("my handling error"));
    let sup = Supervisor::start(f.handler);

    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("my handling error"))
    );
    assert_eq!(f.actions.get(), vec!["setup", "handler", "teardown"]);
    assert!(f.tx.is_stopped());
    assert_eq!(sup.handled(), 0);
}

#[tokio::test]
async fn first_failure_beats_teardown_failure() {
    let mut f = fixture();
    f.handler.handler_error = Some(WorkerError::fail("my handling error"));
    f.handler.teardown_error = Some(WorkerError::fail("failed to tear down watcher"));
    let sup = Supervisor::start(f.handler);

    trigger(&f.tx).await;
    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("my handling error"))
    );
}

#[tokio::test]
async fn external_reason_wins_and_is_sealed() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    sup.kill(Some(WorkerError::fail("first")));
    sup.kill(Some(WorkerError::fail("second")));
    assert_eq!(wait_long(&sup).await, Err(WorkerError::fail("first")));

    sup.kill(Some(WorkerError::fail("after death")));
    assert_eq!(sup.wait().await, Err(WorkerError::fail("first")));
    assert_eq!(sup.stop().await, Err(WorkerError::fail("first")));
}

#[tokio::test]
async fn notices_stopped_watcher() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    f.tx.close(Termination::Failed(WorkerError::fail("Stopped Watcher")));

    assert_eq!(
        wait_long(&sup).await,
        Err(WorkerError::fail("Stopped Watcher"))
    );
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
}

#[tokio::test]
async fn default_classifier_turns_clean_closure_into_fault() {
    let f = fixture();
    let sup = Supervisor::start(f.handler);
    f.tx.close(Termination::Clean);

    let err = wait_long(&sup).await.unwrap_err();
    assert_eq!(
        err,
        WorkerError::Fatal {
            error: "watcher was stopped cleanly".into()
        }
    );
    assert!(err.is_fatal());
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
}

#[tokio::test]
async fn still_alive_closure_echoed_by_classifier_is_clean() {
    let f = fixture();
    let found: Arc<Mutex<Option<Termination>>> = Arc::default();
    let sup = Supervisor::builder(f.handler)
        .with_closed_handler({
            let found = Arc::clone(&found);
            move |t| {
                *found.lock().unwrap() = Some(t.clone());
                t
            }
        })
        .start();
    f.tx.close(Termination::StillAlive);

    assert_eq!(wait_long(&sup).await, Ok(()));
    assert_eq!(*found.lock().unwrap(), Some(Termination::StillAlive));
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
}

#[tokio::test]
async fn clean_closure_with_noop_classifier_is_clean() {
    let f = fixture();
    let found: Arc<Mutex<Option<Termination>>> = Arc::default();
    let sup = Supervisor::builder(f.handler)
        .with_closed_handler({
            let found = Arc::clone(&found);
            move |t| {
                *found.lock().unwrap() = Some(t.clone());
                t
            }
        })
        .start();
    f.tx.close(Termination::Clean);

    assert_eq!(wait_long(&sup).await, Ok(()));
    assert_eq!(*found.lock().unwrap(), Some(Termination::Clean));
    assert_eq!(f.actions.get(), vec!["setup", "teardown"]);
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let mut f = fixture();
    f.handler.panic_in_handler = true;
    let sup = Supervisor::start(f.handler);

    trigger(&f.tx).await;
    let err = wait_long(&sup).await.unwrap_err();
    assert_eq!(
        err,
        WorkerError::Panicked {
            info: "handler blew up".into()
        }
    );
    assert_eq!(f.actions.get(), vec!["setup", "handler", "teardown"]);
    assert!(f.tx.is_stopped());
}

#[tokio::test]
async fn lifecycle_events_are_published_in_order() {
    let mut f = fixture();
    let bus = Bus::new(64);
    let mut rx = bus.subscribe();
    let sup = Supervisor::builder(f.handler).with_bus(bus).start();
    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    sup.stop().await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        assert!(ev.is_from(sup.id()));
        kinds.push(ev.kind);
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::WorkerStarting,
            EventKind::WorkerDying,
            EventKind::WatcherStopped,
            EventKind::WorkerDead,
        ]
    );
}

#[derive(Default)]
struct Collect(Mutex<Vec<Event>>);

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.clone());
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test]
async fn subscribers_see_the_death_reason() {
    let mut f = fixture();
    f.handler.handler_error = Some(WorkerError::fail("my handling error"));
    let collect = Arc::new(Collect::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];
    let sup = Supervisor::builder(f.handler).with_subscribers(subs).start();

    trigger(&f.tx).await;
    assert!(wait_long(&sup).await.is_err());

    let dead = timeout(LONG_WAIT, async {
        loop {
            let found = collect
                .0
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.kind == EventKind::WorkerDead)
                .cloned();
            if let Some(ev) = found {
                return ev;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber never saw WorkerDead");

    assert_eq!(dead.reason.as_deref(), Some("my handling error"));
    assert_eq!(dead.handled, Some(0));
    let kinds: Vec<_> = collect.0.lock().unwrap().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::ReactFailed));
}

#[tokio::test]
async fn killer_ends_the_worker_from_inside() {
    struct StopAfterOne(Option<ChannelWatcher<u8>>);

    #[async_trait]
    impl NotifyHandler for StopAfterOne {
        type Watcher = ChannelWatcher<u8>;

        async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
            self.0.take().ok_or_else(|| WorkerError::fail("gone"))
        }

        async fn react(&mut self, _n: u8, killer: &Killer) -> Result<(), WorkerError> {
            killer.kill(None);
            assert!(killer.is_dying());
            Ok(())
        }

        async fn release(&mut self) -> Result<(), WorkerError> {
            Ok(())
        }
    }

    let (tx, w) = channel(4);
    let sup = Supervisor::start(StopAfterOne(Some(w)));
    tx.send(1).await.unwrap();
    assert_eq!(wait_long(&sup).await, Ok(()));
    assert_eq!(sup.handled(), 1);
    assert!(tx.is_stopped());
}

#[tokio::test]
async fn kill_does_not_interrupt_a_running_react() {
    let mut f = fixture();
    let gate = Arc::new(Notify::new());
    f.handler.gate = Some(Arc::clone(&gate));
    f.handler.handler_error = Some(WorkerError::fail("late"));
    let sup = Supervisor::start(f.handler);

    trigger(&f.tx).await;
    wait_handled(&mut f.handled).await;
    sup.kill(None);
    assert_eq!(sup.phase(), Phase::Dying);
    assert!(timeout(SHORT_WAIT, sup.wait()).await.is_err());
    assert_eq!(f.actions.get(), vec!["setup", "handler"]);

    gate.notify_one();
    assert_eq!(wait_long(&sup).await, Err(WorkerError::fail("late")));
    assert_eq!(f.actions.get(), vec!["setup", "handler", "teardown"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_kills_agree_on_one_reason() {
    const CALLERS: usize = 12;
    const REASONS: [&str; 3] = ["reason a", "reason b", "reason c"];

    let f = fixture();
    let sup = Supervisor::start(f.handler);
    let barrier = Arc::new(Barrier::new(CALLERS));

    let mut tasks = Vec::with_capacity(CALLERS);
    for i in 0..CALLERS {
        let sup = sup.clone();
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            match i % 3 {
                0 => {
                    sup.kill(Some(WorkerError::fail(REASONS[i % REASONS.len()])));
                    sup.wait().await
                }
                1 => {
                    sup.kill(Some(WorkerError::fail(REASONS[i % REASONS.len()])));
                    sup.stop().await
                }
                _ => sup.wait().await,
            }
        }));
    }

    let mut results = Vec::with_capacity(CALLERS);
    for task in tasks {
        results.push(timeout(LONG_WAIT, task).await.unwrap().unwrap());
    }

    let first = results[0].clone().unwrap_err();
    assert!(REASONS.contains(&first.to_string().as_str()), "{first}");
    assert!(results.iter().all(|r| *r == Err(first.clone())));
    assert_eq!(sup.wait().await, Err(first));
    assert_eq!(
        f.actions.get().iter().filter(|a| **a == "teardown").count(),
        1
    );
}

#[tokio::test]
async fn subscribers_are_released_when_a_shared_bus_lags() {
    let a = fixture();
    let b = fixture();
    let bus = Bus::new(1);
    let collect = Arc::new(Collect::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];

    let sup_a = Supervisor::builder(a.handler)
        .with_bus(bus.clone())
        .with_subscribers(subs)
        .start();
    let sup_b = Supervisor::builder(b.handler).with_bus(bus).start();

    sup_a.kill(None);
    sup_b.kill(None);
    assert_eq!(wait_long(&sup_a).await, Ok(()));
    assert_eq!(wait_long(&sup_b).await, Ok(()));

    timeout(LONG_WAIT, async {
        while Arc::strong_count(&collect) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber workers outlived the worker");
    assert!(collect.0.lock().unwrap().iter().all(|e| e.is_from(sup_a.id())));
}
