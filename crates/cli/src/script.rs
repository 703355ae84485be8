//! Script driver (C8): parses a line-oriented command file and runs each
//! line as an independent job through a bounded work-stealing pool, one
//! queue per worker with round-robin submission and try-steal-then-block
//! popping. Modeled directly on the original toolchain's `notification_queue`
//! / `task_system` pair: a fixed worker count, one deque per worker, and an
//! atomic round-robin index for dispatch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Cli, Command};

type Job = Box<dyn FnOnce() -> bool + Send + 'static>;

struct NotificationQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

struct QueueState {
    jobs: VecDeque<Job>,
    done: bool,
}

impl NotificationQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                done: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Attempts a non-blocking push. Returns the job back to the caller if
    /// the lock was contended, so it can be retried elsewhere.
    fn try_push(&self, job: Job) -> Option<Job> {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.jobs.push_back(job);
                drop(state);
                self.ready.notify_one();
                None
            }
            Err(_) => Some(job),
        }
    }

    fn push(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.jobs.push_back(job);
        drop(state);
        self.ready.notify_one();
    }

    fn try_pop(&self) -> Option<Job> {
        let mut state = self.state.try_lock().ok()?;
        state.jobs.pop_front()
    }

    fn pop(&self) -> Option<Job> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.done {
                return None;
            }
            state = self.ready.wait(state).unwrap();
        }
    }

    fn mark_done(&self) {
        let mut state = self.state.lock().unwrap();
        state.done = true;
        drop(state);
        self.ready.notify_all();
    }
}

/// Bounded worker pool: `worker_count` threads, each trying
/// `worker_count * 32` steal attempts across every queue before falling
/// back to a blocking pop on its own queue.
struct TaskSystem {
    queues: Arc<Vec<NotificationQueue>>,
    threads: Vec<thread::JoinHandle<()>>,
    next_index: AtomicUsize,
}

impl TaskSystem {
    fn new(worker_count: usize) -> Self {
        let queues = Arc::new((0..worker_count).map(|_| NotificationQueue::new()).collect::<Vec<_>>());
        let threads = (0..worker_count)
            .map(|index| {
                let queues = Arc::clone(&queues);
                thread::spawn(move || Self::run_worker(queues, index))
            })
            .collect();
        Self {
            queues,
            threads,
            next_index: AtomicUsize::new(0),
        }
    }

    fn run_worker(queues: Arc<Vec<NotificationQueue>>, index: usize) {
        let count = queues.len();
        loop {
            let mut job = None;
            for steal in 0..count * 32 {
                let target = (index + steal) % count;
                if let Some(j) = queues[target].try_pop() {
                    job = Some(j);
                    break;
                }
            }
            let job = match job {
                Some(j) => Some(j),
                None => queues[index].pop(),
            };
            match job {
                Some(job) => {
                    job();
                }
                None => return,
            }
        }
    }

    /// Round-robin `try_push` across queues, falling back to a guaranteed
    /// blocking push on the originally targeted queue if every queue is
    /// momentarily busy.
    fn submit(&self, job: Job) {
        let count = self.queues.len();
        let start = self.next_index.fetch_add(1, Ordering::Relaxed) % count;
        let mut remaining = job;
        for offset in 0..count {
            let target = (start + offset) % count;
            match self.queues[target].try_push(remaining) {
                None => return,
                Some(job) => remaining = job,
            }
        }
        // Every queue was contended; block on the originally targeted one.
        self.queues[start].push(remaining);
    }

    fn join(self) {
        for queue in self.queues.iter() {
            queue.mark_done();
        }
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

pub struct ScriptOutcome {
    pub command_count: usize,
    pub error_count: usize,
}

/// Runs every non-empty line of `input` as an independent job across
/// `min(jobs, hardware threads)` workers, aggregating `commandCount` and an
/// atomically-incremented `errorCount`.
pub fn run_script(input: &std::path::Path, jobs: usize) -> ktxforge_core::error::Result<ScriptOutcome> {
    let text = std::fs::read_to_string(input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ktxforge_core::error::KtxforgeError::FileNotFound(input.display().to_string())
        } else {
            ktxforge_core::error::KtxforgeError::read_failed(e)
        }
    })?;

    let lines: Vec<String> = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
    let command_count = lines.len();
    let worker_count = jobs.min(thread::available_parallelism().map(|n| n.get()).unwrap_or(1)).max(1);

    let error_count = Arc::new(AtomicUsize::new(0));
    let pool = TaskSystem::new(worker_count);

    for line in lines {
        let error_count = Arc::clone(&error_count);
        let job: Job = Box::new(move || {
            let ok = run_one_line(&line);
            if !ok {
                error_count.fetch_add(1, Ordering::SeqCst);
                error!(line = %line, "job failed");
            }
            ok
        });
        pool.submit(job);
    }
    pool.join();

    let error_count = error_count.load(Ordering::SeqCst);
    info!(command_count, error_count, "script finished");
    Ok(ScriptOutcome {
        command_count,
        error_count,
    })
}

fn run_one_line(line: &str) -> bool {
    let tokens = shell_split(line);
    let mut argv = vec!["ktxforge".to_string()];
    argv.extend(tokens);
    let argv = crate::cli::normalize_argv(argv);
    match Cli::try_parse_from(&argv) {
        Ok(cli) => match &cli.command {
            Command::Encode(args) => crate::commands::encode::run(args).is_ok(),
            Command::Decode(args) => crate::commands::decode::run(args).is_ok(),
            Command::Info(args) => crate::commands::info::run(args).is_ok(),
            Command::Script(_) => false, // a script cannot recursively invoke itself
        },
        Err(_) => false,
    }
}

/// Shell-like whitespace tokenization with support for double-quoted spans.
fn shell_split(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_split_respects_quotes() {
        let tokens = shell_split(r#"encode -input "a b.png" -output c.ktx"#);
        assert_eq!(tokens, vec!["encode", "-input", "a b.png", "-output", "c.ktx"]);
    }

    #[test]
    fn script_counts_nonempty_lines_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("jobs.txt");
        std::fs::write(&script_path, "info -input missing1.ktx\n\ninfo -input missing2.ktx\n").unwrap();
        let outcome = run_script(&script_path, 2).unwrap();
        assert_eq!(outcome.command_count, 2);
        assert_eq!(outcome.error_count, 2);
    }

    #[test]
    fn single_dash_line_parses_past_clap_and_fails_at_file_read() {
        // Confirms the failure above comes from the missing file, not from
        // clap rejecting `-input` as an unrecognized short flag + positional.
        let tokens = shell_split("info -input missing.ktx");
        let mut argv = vec!["ktxforge".to_string()];
        argv.extend(tokens);
        let argv = crate::cli::normalize_argv(argv);
        let cli = Cli::try_parse_from(&argv).expect("single-dash long flags must parse");
        match cli.command {
            Command::Info(args) => {
                let err = crate::commands::info::run(&args).unwrap_err();
                assert!(matches!(err, ktxforge_core::error::KtxforgeError::FileNotFound(_)));
            }
            other => panic!("expected Info command, got {other:?}"),
        }
    }
}
