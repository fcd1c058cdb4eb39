use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

/// Bounded wait for a single queue pop while accumulating output.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default overall wait for a command's completion marker.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A persistent interactive shell process.
///
/// Two background tasks drain the child's stdout and stderr into queues for
/// the session's whole lifetime; the caller only ever consumes. Command
/// completion is detected by echoing a sentinel marker after the command and
/// waiting for it to reappear on stdout. At most one command may be in
/// flight at a time; callers must serialize.
pub struct ShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout_rx: mpsc::Receiver<String>,
    stderr_rx: mpsc::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    marker: String,
}

impl ShellSession {
    pub fn spawn() -> std::io::Result<Self> {
        let mut child = Command::new("/bin/bash")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("child stdin was piped");
        let stdout = child.stdout.take().expect("child stdout was piped");
        let stderr = child.stderr.take().expect("child stderr was piped");

        let (stdout_tx, stdout_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (stderr_tx, stderr_rx) = mpsc::channel(QUEUE_CAPACITY);

        let readers = vec![
            tokio::spawn(drain_lines(BufReader::new(stdout), stdout_tx)),
            tokio::spawn(drain_lines(BufReader::new(stderr), stderr_tx)),
        ];

        Ok(Self {
            child,
            stdin,
            stdout_rx,
            stderr_rx,
            readers,
            marker: format!("__END__{}__", std::process::id()),
        })
    }

    /// Run a command and wait for its completion marker.
    ///
    /// If the marker never appears within `wait`, whatever accumulated so far
    /// is returned with no error flag; near-timeout results are suspect and
    /// callers must judge them. Stderr is drained best-effort and may include
    /// output from earlier commands that finished late.
    pub async fn execute(
        &mut self,
        command: &str,
        wait: Option<Duration>,
    ) -> std::io::Result<CommandOutput> {
        let deadline = Instant::now() + wait.unwrap_or(DEFAULT_COMMAND_TIMEOUT);

        let line = format!("{command}; echo {}\n", self.marker);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let mut stdout = String::new();
        while Instant::now() < deadline {
            match timeout(POLL_INTERVAL, self.stdout_rx.recv()).await {
                Ok(Some(line)) => {
                    if line.contains(&self.marker) {
                        break;
                    }
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }

        let mut stderr = String::new();
        while let Ok(Some(line)) = timeout(POLL_INTERVAL, self.stderr_rx.recv()).await {
            stderr.push_str(&line);
            stderr.push('\n');
        }

        Ok(CommandOutput { stdout, stderr })
    }

    /// Tear down the process and its drain tasks and start fresh.
    ///
    /// Unconditional: a command mid-execution is abandoned.
    pub async fn restart(&mut self) -> std::io::Result<()> {
        self.terminate().await;
        *self = Self::spawn()?;
        Ok(())
    }

    /// End the process without recreating it.
    ///
    /// Killing the child closes its pipes; the drain tasks hit EOF and are
    /// joined rather than aborted. Closing the queues first unblocks a drain
    /// task stuck on a full queue.
    pub async fn terminate(&mut self) {
        self.stdout_rx.close();
        self.stderr_rx.close();
        let _ = self.child.kill().await;
        for reader in self.readers.drain(..) {
            let _ = reader.await;
        }
    }
}

async fn drain_lines<R>(reader: BufReader<R>, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}
