//! # Example: notify_worker
//!
//! Supervises a handler that reacts to machine ids pushed through a
//! channel-backed watcher, and prints every lifecycle event.
//!
//! Shows how to:
//! - Implement [`NotifyHandler`] over a [`ChannelWatcher`].
//! - Attach a custom [`Subscribe`] through the builder.
//! - Stop a worker from outside and read its death reason.
//!
//! ## Flow
//! ```text
//! producer ── send(machine) ──► ChannelWatcher ──► Supervisor ──► MachineHandler::react()
//!                                                     │
//!                                                     └─► Bus ──► ConsoleSubscriber
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example notify_worker
//! ```

use std::{sync::Arc, time::Duration};

use watchvisor::{
    ChannelWatcher, Event, Killer, NotifyHandler, Subscribe, Supervisor, Termination, WorkerError,
    channel,
};

/// Prints every event it receives.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        println!(
            "[sub] #{:<3} {:<16} worker={} handled={} reason={}",
            ev.seq,
            ev.kind.as_label(),
            ev.worker.as_deref().unwrap_or("<unknown>"),
            ev.handled.map(|n| n.to_string()).unwrap_or_default(),
            ev.reason.as_deref().unwrap_or("<none>"),
        );
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Provisions machines as they appear; refuses machine ids it cannot parse.
struct MachineHandler {
    source: Option<ChannelWatcher<String>>,
}

#[async_trait::async_trait]
impl NotifyHandler for MachineHandler {
    type Watcher = ChannelWatcher<String>;

    fn name(&self) -> &str {
        "machine-provisioner"
    }

    async fn acquire(&mut self) -> Result<Self::Watcher, WorkerError> {
        println!("[handler] watching machines");
        self.source
            .take()
            .ok_or_else(|| WorkerError::fail("machine watcher already in use"))
    }

    async fn react(&mut self, machine: String, _killer: &Killer) -> Result<(), WorkerError> {
        let id: u32 = machine
            .strip_prefix("machine-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| WorkerError::fail(format!("invalid machine id {machine:?}")))?;
        println!("[handler] provisioning machine {id}");
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), WorkerError> {
        println!("[handler] released");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) A clean run: three machines, then an explicit stop.
    let (tx, watcher) = channel(8);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let sup = Supervisor::builder(MachineHandler {
        source: Some(watcher),
    })
    .with_subscribers(subs)
    .start();

    for n in 0..3 {
        tx.send(format!("machine-{n}")).await.ok();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("[main] {sup} stopped: {:?}", sup.stop().await);

    // 2) A failing run: the handler rejects a change.
    let (tx, watcher) = channel(8);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let sup = Supervisor::builder(MachineHandler {
        source: Some(watcher),
    })
    .with_subscribers(subs)
    .start();

    tx.send("machine-7".into()).await.ok();
    tx.send("container-x".into()).await.ok();
    println!("[main] {sup} died: {:?}", sup.wait().await);

    // 3) The state layer closes the stream with an error.
    let (tx, watcher) = channel::<String>(8);
    let sup = Supervisor::start(MachineHandler {
        source: Some(watcher),
    });
    tx.close(Termination::Failed(WorkerError::fail("state connection lost")));
    println!("[main] {sup} died: {:?}", sup.wait().await);

    // Let subscribers drain before exiting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
