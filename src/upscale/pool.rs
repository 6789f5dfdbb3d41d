use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering, fence};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::foundation::core::Rgb8;
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::foundation::threads::{ThreadRole, spawn_pinned};
use crate::upscale::blit::render_rows;
use crate::upscale::frame::{FrameBuffer, NativeFrame};
use crate::upscale::lookup::UpscaleTables;

/// Options for [`UpscaleWorkerPool`].
#[derive(Clone, Copy, Debug)]
pub struct UpscalePoolOpts {
    /// How long to wait for both bands before presenting anyway.
    pub join_timeout: Duration,
    /// Cores the top-band and bottom-band workers are pinned to.
    pub cores: Option<[usize; 2]>,
}

impl Default for UpscalePoolOpts {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_millis(50),
            cores: None,
        }
    }
}

/// Result of one pooled upscale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpscaleOutcome {
    /// Which bands (top, bottom) reported completion before the deadline.
    pub completed: [bool; 2],
}

impl UpscaleOutcome {
    /// `true` when both bands finished in time.
    pub fn is_complete(&self) -> bool {
        self.completed[0] && self.completed[1]
    }
}

struct BandTask {
    job: u64,
    band: usize,
    src: Arc<NativeFrame>,
    tables: Arc<UpscaleTables>,
    dst: Arc<FrameBuffer>,
    background: Rgb8,
}

struct BandDone {
    job: u64,
    band: usize,
    result: PlaybackResult<()>,
}

struct Worker {
    tx: Option<Sender<BandTask>>,
    handle: Option<JoinHandle<()>>,
}

/// Two persistent workers that each rasterize one half of the panel.
///
/// Callers are serialized: one upscale is dispatched at a time. A join that times out returns
/// with the late bands marked incomplete; their completions are discarded when they arrive.
pub struct UpscaleWorkerPool {
    workers: Vec<Worker>,
    done_rx: Receiver<BandDone>,
    dispatch: Mutex<u64>,
    join_timeout: Duration,
    timeouts: AtomicU64,
}

impl UpscaleWorkerPool {
    /// Spawn both workers.
    pub fn new(opts: UpscalePoolOpts) -> PlaybackResult<Self> {
        let (done_tx, done_rx) = channel::unbounded::<BandDone>();
        let mut workers = Vec::with_capacity(2);
        for band in 0..2 {
            let (tx, rx) = channel::unbounded::<BandTask>();
            let done_tx = done_tx.clone();
            let core = opts.cores.map(|c| c[band]);
            let name = format!("upscale-{band}");
            let handle = spawn_pinned(&name, ThreadRole::Upscale, core, move || {
                worker_main(rx, done_tx);
            })?;
            workers.push(Worker {
                tx: Some(tx),
                handle: Some(handle),
            });
        }
        Ok(Self {
            workers,
            done_rx,
            dispatch: Mutex::new(0),
            join_timeout: opts.join_timeout,
            timeouts: AtomicU64::new(0),
        })
    }

    /// Number of joins that gave up waiting.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Upscale `src` into `dst`, one band per worker, and wait for both.
    ///
    /// A timeout is not an error: it is logged, counted and reported through the outcome.
    pub fn upscale(
        &self,
        src: &Arc<NativeFrame>,
        tables: &Arc<UpscaleTables>,
        dst: &Arc<FrameBuffer>,
        background: Rgb8,
    ) -> PlaybackResult<UpscaleOutcome> {
        let mut job_counter = self.dispatch.lock();
        *job_counter = job_counter.wrapping_add(1);
        let job = *job_counter;

        // Stale completions from a previous timed-out job.
        while self.done_rx.try_recv().is_ok() {}

        // Scratch and tables must be visible to the workers before they start.
        fence(Ordering::SeqCst);
        for (band, worker) in self.workers.iter().enumerate() {
            let task = BandTask {
                job,
                band,
                src: Arc::clone(src),
                tables: Arc::clone(tables),
                dst: Arc::clone(dst),
                background,
            };
            let sent = worker.tx.as_ref().is_some_and(|tx| tx.send(task).is_ok());
            if !sent {
                return Err(PlaybackError::upscale_timeout(format!(
                    "upscale worker {band} is gone"
                )));
            }
        }

        let mut outcome = UpscaleOutcome::default();
        let deadline = Instant::now() + self.join_timeout;
        let mut first_err = None;
        while !outcome.is_complete() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(done) if done.job == job => {
                    outcome.completed[done.band] = true;
                    if let Err(e) = done.result {
                        first_err.get_or_insert(e);
                    }
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        job,
                        top = outcome.completed[0],
                        bottom = outcome.completed[1],
                        timeout_ms = self.join_timeout.as_millis() as u64,
                        "upscale join timed out, presenting best effort frame"
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PlaybackError::upscale_timeout("upscale workers exited"));
                }
            }
        }
        // The buffer is about to be handed to the display.
        fence(Ordering::SeqCst);

        match first_err {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}

impl Drop for UpscaleWorkerPool {
    fn drop(&mut self) {
        for w in &mut self.workers {
            w.tx.take();
        }
        for w in &mut self.workers {
            if let Some(h) = w.handle.take()
                && h.join().is_err()
            {
                tracing::error!("upscale worker panicked");
            }
        }
    }
}

fn worker_main(rx: Receiver<BandTask>, done_tx: Sender<BandDone>) {
    for task in rx.iter() {
        let (start, end) = task.dst.band_rows(task.band);
        let result = {
            let mut px = task.dst.band(task.band).lock();
            render_rows(&task.src, &task.tables, task.background, start, end, &mut px)
        };
        if let Err(e) = &result {
            tracing::error!(band = task.band, error = %e, "band upscale failed");
        }
        if done_tx
            .send(BandDone {
                job: task.job,
                band: task.band,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/upscale/pool.rs"]
mod tests;
