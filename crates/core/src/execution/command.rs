//! Child process execution
//!
//! Child output is streamed into a task's [`Output`] by reader threads while
//! the child runs, so nothing is lost if the task is replayed later.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::output::{Output, SharedWriter};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `command` to completion. Its stdout goes to the primary stream and its
/// stderr to the message stream. If `cancellation` fires first, the child is
/// killed and the returned status reflects that.
pub fn run_process(
    command: &mut Command,
    output: &Output,
    cancellation: &CancellationToken,
) -> io::Result<ExitStatus> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(program = ?command.get_program(), "spawning child process");
    let mut child = command.spawn()?;

    let readers = [
        child
            .stdout
            .take()
            .map(|pipe| forward(pipe, output.primary.clone())),
        child
            .stderr
            .take()
            .map(|pipe| forward(pipe, output.message.clone())),
    ];

    let (status, killed) = wait(&mut child, cancellation)?;

    // A killed child may leave grandchildren holding the pipes open, so the
    // readers are only joined after a normal exit.
    if !killed {
        join_readers(readers.into_iter().flatten().collect(), cancellation);
    }
    Ok(status)
}

/// Join the output readers once they reach end of file. A background
/// grandchild can keep a pipe open past the child's exit, so the wait gives
/// up as soon as `cancellation` fires.
fn join_readers(
    mut pending: Vec<JoinHandle<io::Result<u64>>>,
    cancellation: &CancellationToken,
) {
    while !pending.is_empty() {
        if cancellation.is_cancelled() {
            warn!(
                readers = pending.len(),
                "run cancelled, abandoning child output readers"
            );
            return;
        }
        let (finished, running): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|reader| reader.is_finished());
        for reader in finished {
            match reader.join() {
                Ok(Err(err)) => warn!(error = %err, "failed to forward child output"),
                Err(_) => warn!("child output reader panicked"),
                Ok(Ok(_)) => {}
            }
        }
        pending = running;
        if !pending.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn forward<R: io::Read + Send + 'static>(
    mut pipe: R,
    mut writer: SharedWriter,
) -> JoinHandle<io::Result<u64>> {
    thread::spawn(move || io::copy(&mut pipe, &mut writer))
}

fn wait(child: &mut Child, cancellation: &CancellationToken) -> io::Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if cancellation.is_cancelled() {
            warn!(pid = child.id(), "run cancelled, killing child process");
            // the child may have exited in the meantime
            let _ = child.kill();
            return Ok((child.wait()?, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::{BufferedOutput, Stream};
    use std::time::Instant;

    fn stream_text(buffer: &BufferedOutput, stream: Stream) -> String {
        let bytes: Vec<u8> = buffer
            .entries()
            .into_iter()
            .filter(|e| e.stream == stream)
            .flat_map(|e| e.data)
            .collect();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_streams_are_routed() {
        let buffer = BufferedOutput::new();
        let status = run_process(
            Command::new("sh").arg("-c").arg("echo out; echo err 1>&2"),
            &buffer.output(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(status.success());
        assert_eq!(stream_text(&buffer, Stream::Primary), "out\n");
        assert_eq!(stream_text(&buffer, Stream::Message), "err\n");
    }

    #[test]
    fn test_exit_status_is_returned() {
        let status = run_process(
            Command::new("sh").arg("-c").arg("exit 3"),
            &BufferedOutput::new().output(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let result = run_process(
            &mut Command::new("definitely-not-a-real-program-7f3a"),
            &BufferedOutput::new().output(),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cancellation_kills_the_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let status = run_process(
            Command::new("sleep").arg("30"),
            &BufferedOutput::new().output(),
            &token,
        )
        .unwrap();
        canceller.join().unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_cancellation_stops_waiting_on_background_grandchild() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            trigger.cancel();
        });

        // The shell exits at once but the background sleep keeps its pipes open.
        let started = Instant::now();
        let status = run_process(
            Command::new("sh").arg("-c").arg("sleep 30 & echo started"),
            &BufferedOutput::new().output(),
            &token,
        )
        .unwrap();
        canceller.join().unwrap();

        assert!(status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_readers_are_drained_after_normal_exit() {
        let buffer = BufferedOutput::new();
        let status = run_process(
            Command::new("sh")
                .arg("-c")
                .arg("(sleep 0.2; echo late) & echo early"),
            &buffer.output(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(status.success());
        assert_eq!(stream_text(&buffer, Stream::Primary), "early\nlate\n");
    }
}
