use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::Module;

pub trait SlipWriter: Send + Sync + 'static {
    fn write(&self, modules: Vec<Module>) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Pending,
    Syncing,
    Synced,
    Failed(String),
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Pending => write!(f, "waiting for edits to settle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Failed(reason) => write!(f, "sync failed: {reason}"),
        }
    }
}

enum Command {
    Schedule(Vec<Module>),
    Flush(oneshot::Sender<()>),
}

pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn spawn<W: SlipWriter>(writer: W, delay: Duration) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SyncStatus::Idle);
        let task = tokio::spawn(run(writer, delay, receiver, status_tx));

        Self {
            commands,
            status,
            task,
        }
    }

    pub fn schedule(&self, modules: Vec<Module>) {
        // Only fails once the worker is gone, which shutdown() reports.
        let _ = self.commands.send(Command::Schedule(modules));
    }

    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    pub async fn shutdown(self) -> anyhow::Result<SyncStatus> {
        let SyncHandle {
            commands,
            status,
            task,
        } = self;
        drop(commands);
        task.await.context("sync worker stopped unexpectedly")?;
        let final_status = status.borrow().clone();
        Ok(final_status)
    }
}

async fn run<W: SlipWriter>(
    writer: W,
    delay: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SyncStatus>,
) {
    let mut pending: Option<Vec<Module>> = None;
    let timer = tokio::time::sleep(delay);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule(modules)) => {
                    pending = Some(modules);
                    timer.as_mut().reset(Instant::now() + delay);
                    status.send_replace(SyncStatus::Pending);
                }
                Some(Command::Flush(done)) => {
                    if let Some(modules) = pending.take() {
                        write(&writer, modules, &status).await;
                    }
                    let _ = done.send(());
                }
                None => {
                    if let Some(modules) = pending.take() {
                        write(&writer, modules, &status).await;
                    }
                    break;
                }
            },
            () = &mut timer, if pending.is_some() => {
                if let Some(modules) = pending.take() {
                    write(&writer, modules, &status).await;
                }
            }
        }
    }
}

async fn write<W: SlipWriter>(writer: &W, modules: Vec<Module>, status: &watch::Sender<SyncStatus>) {
    status.send_replace(SyncStatus::Syncing);
    let outcome = match writer.write(modules).await {
        Ok(()) => SyncStatus::Synced,
        Err(err) => SyncStatus::Failed(format!("{err:#}")),
    };
    status.send_replace(outcome);
}
