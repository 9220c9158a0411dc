use std::{
    io::{self, Read, Write},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use crate::process::{CommandRunner, Invocation, InvocationOutput, RunError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const TERM_GRACE: Duration = Duration::from_millis(200);
const STDERR_CAP: usize = 4096;

enum Stream {
    Stdin(io::Result<()>),
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// `std::process` backed runner.
///
/// stdin, stdout and stderr are each serviced on their own thread so a chatty
/// child can't deadlock against a full pipe while we wait on it. The threads
/// report over a channel; once the deadline passes they are abandoned, never
/// joined, so a descendant holding a pipe open can't stall the caller.
///
/// On Unix the child leads its own process group and a timeout signals the
/// whole group: SIGTERM, a short grace period, then SIGKILL.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdCommandRunner;

impl StdCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for StdCommandRunner {
    fn run(&self, invocation: &Invocation, stdin: &[u8]) -> Result<InvocationOutput, RunError> {
        let program = invocation.program.display().to_string();
        let deadline = Instant::now() + invocation.timeout;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.to_vec();
            let tx = tx.clone();
            thread::spawn(move || {
                let res = pipe.write_all(&input);
                // EOF for the child.
                drop(pipe);
                let _ = tx.send(Stream::Stdin(res));
            });
            pending += 1;
        }
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(pipe, None, tx.clone(), Stream::Stdout);
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(pipe, Some(STDERR_CAP), tx.clone(), Stream::Stderr);
            pending += 1;
        }
        drop(tx);

        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::warn!("{program} timed out after {:?}, terminating it", invocation.timeout);
                terminate(&mut child);
                return Err(RunError::TimedOut {
                    program,
                    timeout: invocation.timeout,
                });
            }
            Err(source) => {
                terminate(&mut child);
                return Err(RunError::Io { program, source });
            }
        };

        let mut stdin_res = Ok(());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(Stream::Stdin(res)) => stdin_res = res,
                Ok(Stream::Stdout(buf)) => stdout = buf,
                Ok(Stream::Stderr(buf)) => stderr = buf,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    // The child exited but something it spawned still holds a pipe.
                    log::warn!(
                        "{program} exited but left its pipes open past {:?}, killing its group",
                        invocation.timeout
                    );
                    terminate(&mut child);
                    return Err(RunError::TimedOut {
                        program,
                        timeout: invocation.timeout,
                    });
                }
            }
            pending -= 1;
        }

        if let Err(e) = stdin_res {
            // A child that exits without consuming stdin is reported through its
            // exit status; only surface the pipe error if it claims success.
            if status.success() {
                return Err(RunError::Io { program, source: e });
            }
        }

        Ok(InvocationOutput {
            exit_code: status.code(),
            stdout,
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
    cap: Option<usize>,
    tx: Sender<Stream>,
    wrap: fn(Vec<u8>) -> Stream,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        if let Some(cap) = cap {
            buf.truncate(cap);
        }
        let _ = tx.send(wrap(buf));
    });
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child was spawned with process_group(0), so its pid is the group id.
    let group = Pid::from_raw(child.id() as i32);
    let _ = killpg(group, Signal::SIGTERM);

    let grace_end = Instant::now() + TERM_GRACE;
    while Instant::now() < grace_end {
        if let Ok(Some(_)) = child.try_wait() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    // Descendants may have ignored SIGTERM or outlived the leader. ESRCH is fine.
    let _ = killpg(group, Signal::SIGKILL);
    let _ = child.kill();
    let _ = child.wait(); // reap
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait(); // reap
}
