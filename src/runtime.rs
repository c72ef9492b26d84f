use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::Event;

use crate::error::FollowError;
use crate::follower::{self, FollowProcess, FollowStart, LineReader};
use crate::pane::PaneId;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum Message {
    Input(Event),
    FollowStarted {
        pane: PaneId,
        start: FollowStart,
    },
    LineRead {
        pane: PaneId,
        reader: Option<LineReader>,
        result: Result<String, FollowError>,
    },
    Released {
        pane: PaneId,
    },
}

#[derive(Debug)]
pub enum Task {
    StartFollow {
        pane: PaneId,
        path: String,
        capacity: usize,
    },
    ReadLine {
        pane: PaneId,
        reader: Option<LineReader>,
    },
    Release {
        pane: PaneId,
        process: Option<FollowProcess>,
        reader: Option<LineReader>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    MouseCapture(bool),
    Clipboard(String),
    Pager(String),
    Quit,
}

#[derive(Debug)]
pub enum Cmd {
    Task(Task),
    Effect(Effect),
}

impl From<Task> for Cmd {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<Effect> for Cmd {
    fn from(effect: Effect) -> Self {
        Self::Effect(effect)
    }
}

pub fn run_task(task: Task) -> Message {
    match task {
        Task::StartFollow {
            pane,
            path,
            capacity,
        } => {
            let start = follower::start(&path, capacity);
            Message::FollowStarted { pane, start }
        }
        Task::ReadLine { pane, reader } => match reader {
            Some(mut reader) => {
                let result = follower::read_line(&mut reader);
                Message::LineRead {
                    pane,
                    reader: Some(reader),
                    result,
                }
            }
            None => Message::LineRead {
                pane,
                reader: None,
                result: Err(FollowError::ReaderNotInitialized),
            },
        },
        Task::Release {
            pane,
            process,
            reader,
        } => {
            follower::release(process, reader);
            Message::Released { pane }
        }
    }
}

fn task_name(task: &Task) -> &'static str {
    match task {
        Task::StartFollow { .. } => "start-follow",
        Task::ReadLine { .. } => "read-line",
        Task::Release { .. } => "release",
    }
}

pub struct Runtime {
    tx: SyncSender<Message>,
    rx: Receiver<Message>,
    pending_releases: usize,
}

impl Runtime {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        Self {
            tx,
            rx,
            pending_releases: 0,
        }
    }

    pub fn spawn(&mut self, task: Task) -> io::Result<()> {
        if matches!(task, Task::Release { .. }) {
            self.pending_releases += 1;
        }

        let tx = self.tx.clone();
        thread::Builder::new()
            .name(format!("jobtail-{}", task_name(&task)))
            .spawn(move || {
                let message = run_task(task);
                // The loop may already be gone; the message (and any reader in
                // it) is dropped then.
                let _ = tx.send(message);
            })?;
        Ok(())
    }

    fn note(&mut self, message: &Message) {
        if matches!(message, Message::Released { .. }) {
            self.pending_releases = self.pending_releases.saturating_sub(1);
        }
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.note(&message);
                Some(message)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        match self.rx.try_recv() {
            Ok(message) => {
                self.note(&message);
                Some(message)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn pending_releases(&self) -> usize {
        self.pending_releases
    }

    /// Waits (bounded) for outstanding release tasks so follow processes are
    /// reaped before exit. Other messages are discarded.
    pub fn wait_for_releases(&mut self, limit: Duration) {
        let deadline = Instant::now() + limit;
        while self.pending_releases > 0 {
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    pending = self.pending_releases,
                    "gave up waiting for follow processes"
                );
                return;
            }
            let _ = self.recv_timeout(deadline - now);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Runtime, Task, run_task};
    use crate::error::FollowError;
    use crate::pane::PaneId;
    use std::time::Duration;

    #[test]
    fn read_without_reader_is_a_terminal_error() {
        let message = run_task(Task::ReadLine {
            pane: PaneId::Stderr,
            reader: None,
        });
        match message {
            Message::LineRead {
                pane,
                reader,
                result,
            } => {
                assert_eq!(pane, PaneId::Stderr);
                assert!(reader.is_none());
                assert!(matches!(result, Err(FollowError::ReaderNotInitialized)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn start_without_path_reports_back() {
        let mut runtime = Runtime::new();
        runtime
            .spawn(Task::StartFollow {
                pane: PaneId::Stdout,
                path: String::new(),
                capacity: 10,
            })
            .expect("spawn task");
        let message = runtime
            .recv_timeout(Duration::from_secs(5))
            .expect("message within timeout");
        match message {
            Message::FollowStarted { pane, start } => {
                assert_eq!(pane, PaneId::Stdout);
                assert!(matches!(start.follow, Err(FollowError::NoPath)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn release_tasks_are_counted_until_reported() {
        let mut runtime = Runtime::new();
        for pane in PaneId::ALL {
            runtime
                .spawn(Task::Release {
                    pane,
                    process: None,
                    reader: None,
                })
                .expect("spawn task");
        }
        assert_eq!(runtime.pending_releases(), 2);
        runtime.wait_for_releases(Duration::from_secs(5));
        assert_eq!(runtime.pending_releases(), 0);
    }
}
