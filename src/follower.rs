use std::io::{self, BufRead, BufReader, PipeReader};
use std::process::{Child, Command, Stdio};

use crate::error::FollowError;

pub const TAIL_PROGRAM: &str = "tail";
pub const EMPTY_FILE_HINT: &str = "(file exists but is empty)";

pub type LineReader = BufReader<PipeReader>;

#[derive(Debug)]
pub struct FollowProcess {
    child: Child,
}

impl FollowProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        {
            let Ok(pgid) = libc::pid_t::try_from(self.child.id()) else {
                return;
            };
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc == 0 {
                return;
            }
        }

        if let Err(err) = self.child.kill() {
            tracing::debug!(pid = self.child.id(), %err, "follow process already gone");
        }
    }
}

#[derive(Debug)]
pub struct FollowStart {
    pub initial_lines: Vec<String>,
    pub follow: Result<(FollowProcess, LineReader), FollowError>,
}

#[derive(Debug, Default)]
pub enum FollowSlot {
    #[default]
    Idle,
    Starting,
    Live(FollowProcess),
    Closed,
}

impl FollowSlot {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Hands out the process exactly once; every later call returns `None`.
    pub fn detach(&mut self) -> Option<FollowProcess> {
        match std::mem::replace(self, Self::Closed) {
            Self::Live(process) => Some(process),
            _ => None,
        }
    }
}

fn missing_path_lines() -> Vec<String> {
    [
        "⚠ No log path available",
        "",
        "This can happen when:",
        "  • Job is too old (purged from accounting)",
        "  • The scheduler could not resolve the log paths",
        "  • No archived log was found",
        "  • Job was submitted without output files",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn cannot_read_lines(path: &str, reason: &str) -> Vec<String> {
    vec![
        format!("⚠ Cannot read: {path}"),
        String::new(),
        format!("Error: {reason}"),
        String::new(),
        "Waiting for file to appear (tail -F)...".to_owned(),
    ]
}

pub fn split_tail_output(out: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(out);
    let text = text.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_owned())
        .collect()
}

fn read_history(path: &str, capacity: usize) -> Vec<String> {
    let output = Command::new(TAIL_PROGRAM)
        .args(["-n", &capacity.to_string(), path])
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let lines = split_tail_output(&output.stdout);
            if lines.is_empty() {
                vec![EMPTY_FILE_HINT.to_owned()]
            } else {
                lines
            }
        }
        Ok(output) => {
            tracing::warn!(path, status = %output.status, "initial read failed");
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            let lines = split_tail_output(&combined);
            if lines.is_empty() {
                cannot_read_lines(path, &output.status.to_string())
            } else {
                lines
            }
        }
        Err(err) => {
            tracing::warn!(path, %err, "could not run initial read");
            cannot_read_lines(path, &err.to_string())
        }
    }
}

fn spawn_follow(path: &str) -> Result<(FollowProcess, LineReader), FollowError> {
    let (reader, writer) = io::pipe().map_err(FollowError::Pipe)?;
    let writer_for_stderr = writer.try_clone().map_err(FollowError::Pipe)?;

    let child = {
        let mut command = Command::new(TAIL_PROGRAM);
        command
            .args(["-n", "0", "-F", path])
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_for_stderr);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        // The command owns the write ends; it must drop here so the reader sees
        // end-of-stream once the child exits.
        command.spawn().map_err(FollowError::Spawn)?
    };

    tracing::info!(path, pid = child.id(), "follow process started");
    Ok((FollowProcess { child }, BufReader::new(reader)))
}

/// Two-phase startup: the last `capacity` lines in one shot, then a follow
/// with an empty history window so nothing is replayed line by line. An empty
/// path starts nothing and yields an explanation instead.
pub fn start(path: &str, capacity: usize) -> FollowStart {
    if path.is_empty() {
        return FollowStart {
            initial_lines: missing_path_lines(),
            follow: Err(FollowError::NoPath),
        };
    }

    let initial_lines = read_history(path, capacity);
    let follow = spawn_follow(path);
    if let Err(err) = &follow {
        tracing::warn!(path, %err, "follow process not started");
    }

    FollowStart {
        initial_lines,
        follow,
    }
}

pub fn read_line(reader: &mut LineReader) -> Result<String, FollowError> {
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf) {
        Ok(0) => Err(FollowError::Eof),
        Ok(_) => {
            while buf.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
                buf.pop();
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        Err(err) => Err(FollowError::Read(err)),
    }
}

pub fn release(process: Option<FollowProcess>, reader: Option<LineReader>) {
    if let Some(mut process) = process {
        let pid = process.id();
        process.kill();
        match process.child.wait() {
            Ok(status) => tracing::debug!(pid, %status, "follow process reaped"),
            Err(err) => tracing::warn!(pid, %err, "could not reap follow process"),
        }
    }
    drop(reader);
}

#[cfg(test)]
mod tests {
    use super::{FollowSlot, split_tail_output, start};
    use crate::error::FollowError;

    #[test]
    fn split_drops_final_break_and_carriage_returns() {
        assert_eq!(split_tail_output(b"a\r\nb\n"), vec!["a", "b"]);
        assert_eq!(split_tail_output(b"\n\n"), Vec::<String>::new());
        assert_eq!(split_tail_output(b"one"), vec!["one"]);
        assert_eq!(split_tail_output(b"x\n\ny\n"), vec!["x", "", "y"]);
    }

    #[test]
    fn empty_path_starts_nothing() {
        let started = start("", 10);
        assert!(matches!(started.follow, Err(FollowError::NoPath)));
        assert_eq!(started.initial_lines[0], "⚠ No log path available");
    }

    #[test]
    fn detach_hands_out_nothing_when_not_live() {
        let mut slot = FollowSlot::Starting;
        assert!(slot.detach().is_none());
        assert!(slot.is_closed());
        assert!(slot.detach().is_none());
    }

    #[cfg(unix)]
    mod with_tail {
        use super::super::{EMPTY_FILE_HINT, FollowSlot, read_line, release, start};
        use std::fs::{self, OpenOptions};
        use std::io::Write;
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        static NEXT: AtomicUsize = AtomicUsize::new(0);

        fn temp_log(contents: &str) -> PathBuf {
            let n = NEXT.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "jobtail-follow-{}-{n}.log",
                std::process::id()
            ));
            fs::write(&path, contents).expect("write temp log");
            path
        }

        #[test]
        fn bulk_read_is_capped_and_follow_delivers_new_lines() {
            let path = temp_log("one\ntwo\nthree\n");
            let started = start(path.to_str().expect("utf-8 path"), 2);
            assert_eq!(started.initial_lines, vec!["two", "three"]);

            let (process, mut reader) = started.follow.expect("follow started");
            let mut slot = FollowSlot::Live(process);

            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let line = read_line(&mut reader);
                let _ = tx.send((line.map_err(|err| err.to_string()), reader));
            });

            thread::sleep(Duration::from_millis(300));
            let mut file = OpenOptions::new()
                .append(true)
                .open(&path)
                .expect("open temp log");
            writeln!(file, "four").expect("append");

            let (line, reader) = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("line within timeout");
            assert_eq!(line.as_deref(), Ok("four"));

            release(slot.detach(), Some(reader));
            assert!(slot.detach().is_none());
            let _ = fs::remove_file(path);
        }

        #[test]
        fn empty_file_gets_a_hint() {
            let path = temp_log("");
            let started = start(path.to_str().expect("utf-8 path"), 10);
            assert_eq!(started.initial_lines, vec![EMPTY_FILE_HINT]);
            let (process, reader) = started.follow.expect("follow started");
            release(Some(process), Some(reader));
            let _ = fs::remove_file(path);
        }

        #[test]
        fn missing_file_still_follows() {
            let path = std::env::temp_dir().join(format!(
                "jobtail-missing-{}-{}.log",
                std::process::id(),
                NEXT.fetch_add(1, Ordering::Relaxed)
            ));
            let started = start(path.to_str().expect("utf-8 path"), 10);
            assert!(!started.initial_lines.is_empty());
            assert_ne!(started.initial_lines, vec![EMPTY_FILE_HINT]);
            let (process, reader) = started.follow.expect("follow started");
            release(Some(process), Some(reader));
        }

        #[test]
        fn killed_follower_reads_end_of_stream() {
            let path = temp_log("x\n");
            let started = start(path.to_str().expect("utf-8 path"), 10);
            let (process, mut reader) = started.follow.expect("follow started");
            release(Some(process), None);

            let mut saw_eof = false;
            for _ in 0..8 {
                match read_line(&mut reader) {
                    Err(err) => {
                        saw_eof = err.is_eof();
                        break;
                    }
                    Ok(_) => continue,
                }
            }
            assert!(saw_eof);
            let _ = fs::remove_file(path);
        }
    }
}
