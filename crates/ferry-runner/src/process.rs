//! Child-process execution for a single stage.

use crate::runner::{BuildOutput, FailureCause, OutputChunk, OutputStream};
use crate::stage::{StageKind, StageSpec};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How long output may keep arriving after the process exited. A background
/// process that inherited the pipes can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Run one stage to completion inside `workdir`.
///
/// Output is appended to `output` as it arrives. On return
/// `output.exit_code` holds the stage's exit code, or -1 when it could not
/// be launched or was killed.
pub async fn run_stage(
    spec: &StageSpec,
    workdir: &Path,
    deadline: Option<Duration>,
    output: &mut BuildOutput,
) -> Result<(), FailureCause> {
    info!(
        stage = %spec.kind,
        command = %spec.display_command(),
        workspace = %workdir.display(),
        "Starting stage"
    );

    let program = match resolve_program(&spec.program, workdir) {
        Ok(program) => program,
        Err(message) => return Err(launch_failed(spec.kind, output, message)),
    };

    let mut child = match Command::new(&program)
        .args(&spec.args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return Err(launch_failed(
                spec.kind,
                output,
                format!("{}: {}", program.display(), e),
            ));
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, spec.kind, OutputStream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, spec.kind, OutputStream::Stderr, tx.clone()));
    }
    drop(tx);

    let expiry = async {
        match deadline {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);
    let drain = tokio::time::sleep(DRAIN_GRACE);
    tokio::pin!(drain);

    let mut status = None;
    let mut streams_open = true;
    let timed_out = loop {
        tokio::select! {
            chunk = rx.recv(), if streams_open => match chunk {
                Some(chunk) => record(chunk, output),
                None => streams_open = false,
            },
            result = child.wait(), if status.is_none() => {
                status = Some(result);
                drain.as_mut().reset(Instant::now() + DRAIN_GRACE);
            }
            _ = &mut drain, if status.is_some() && streams_open => {
                debug!(stage = %spec.kind, "Output still open after exit, detaching");
                streams_open = false;
            }
            _ = &mut expiry => break true,
        }

        if status.is_some() && !streams_open {
            break false;
        }
    };

    if timed_out {
        let after = deadline.unwrap_or_default();
        warn!(stage = %spec.kind, timeout_ms = after.as_millis() as u64, "Stage timed out, killing process");
        if let Err(e) = child.kill().await {
            debug!(error = %e, "Kill after timeout failed");
        }
        detach(&readers, &mut rx, output);
        output.exit_code = -1;
        output.append_error(&format!(
            "{} timed out after {} ms",
            spec.kind,
            after.as_millis()
        ));
        return Err(FailureCause::TimedOut(after));
    }
    detach(&readers, &mut rx, output);

    let exit_code = match status {
        Some(Ok(status)) => status.code().unwrap_or(-1),
        Some(Err(e)) => {
            output.append_error(&format!("{} failed to wait for process: {}", spec.kind, e));
            -1
        }
        None => -1,
    };
    output.exit_code = exit_code;

    debug!(stage = %spec.kind, exit_code, "Stage process exited");

    if exit_code == 0 {
        Ok(())
    } else {
        Err(FailureCause::ExitCode(exit_code))
    }
}

/// Locate the executable, resolving relative names against `workdir`.
fn resolve_program(program: &str, workdir: &Path) -> Result<PathBuf, String> {
    if program.is_empty() {
        return Err("empty command".to_string());
    }
    which::which_in(program, std::env::var_os("PATH"), workdir)
        .map_err(|e| format!("{}: {}", program, e))
}

fn launch_failed(stage: StageKind, output: &mut BuildOutput, message: String) -> FailureCause {
    warn!(stage = %stage, error = %message, "Stage failed to launch");
    output.exit_code = -1;
    output.append_error(&format!("{} failed to launch: {}", stage, message));
    FailureCause::Launch(message)
}

fn record(chunk: OutputChunk, output: &mut BuildOutput) {
    info!("{} {}: {}", chunk.stage, chunk.stream, chunk.content.trim_end());
    output.append(chunk.stream, &chunk.content);
}

/// Stop the readers and keep whatever they already sent.
fn detach(
    readers: &[JoinHandle<()>],
    rx: &mut mpsc::UnboundedReceiver<OutputChunk>,
    output: &mut BuildOutput,
) {
    for reader in readers {
        reader.abort();
    }
    while let Ok(chunk) = rx.try_recv() {
        record(chunk, output);
    }
}

fn spawn_reader<R>(
    mut reader: R,
    stage: StageKind,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<OutputChunk>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut decoder = Utf8Decoder::default();
        let send = |content: String| {
            tx.send(OutputChunk {
                stage,
                stream,
                content,
            })
        };

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = decoder.push(&buf[..n]);
                    if !text.is_empty() && send(text).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!(stage = %stage, stream = %stream, error = %e, "Output read failed");
                    break;
                }
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            let _ = send(rest);
        }
    })
}

/// Incremental UTF-8 decoding over arbitrary chunk boundaries. Invalid
/// sequences become U+FFFD; an incomplete trailing sequence is held back
/// until the next chunk.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
