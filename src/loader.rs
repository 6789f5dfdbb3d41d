use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::engine::state::{BACK, Counters, EngineShared, LoadRequest, Wake};
use crate::foundation::core::{ArtworkRef, SwapIntent};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::prefetch::PrefetchEngine;
use crate::recovery::RecoveryAction;
use crate::slot::{SlotMeta, SlotResources};

/// Producer side: loads the requested artwork into the back slot and prefetches it.
pub(crate) struct Loader {
    shared: Arc<EngineShared>,
    wake_rx: Receiver<Wake>,
}

/// Outcome of one load attempt, with the artwork it was for when known.
type Attempt = Result<(), (Option<ArtworkRef>, PlaybackError)>;

impl Loader {
    pub(crate) fn new(shared: Arc<EngineShared>, wake_rx: Receiver<Wake>) -> Self {
        Self { shared, wake_rx }
    }

    /// Block on wakes until shutdown.
    pub(crate) fn run(self) {
        tracing::debug!("loader started");
        while let Ok(wake) = self.wake_rx.recv() {
            if self.shared.is_shutting_down() {
                break;
            }
            self.handle_wake(wake);
        }
        tracing::debug!("loader stopped");
    }

    /// Handle one pending wake, if any. Returns `false` when none was queued.
    #[cfg(test)]
    pub(crate) fn step(&self) -> bool {
        match self.wake_rx.try_recv() {
            Ok(wake) => {
                self.handle_wake(wake);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn handle_wake(&self, wake: Wake) {
        let request = {
            let mut st = self.shared.lock();
            if st.ui_mode && wake != Wake::Resume {
                tracing::debug!("ui mode active, skipping load");
                st.swap_requested = false;
                st.pending = None;
                self.shared.loader_done(&mut st);
                return;
            }
            match st.pending.take() {
                Some(r) => r,
                None => {
                    self.shared.loader_done(&mut st);
                    return;
                }
            }
        };
        self.load_with_recovery(request);
    }

    fn load_with_recovery(&self, mut request: LoadRequest) {
        loop {
            let (artwork, err) = match self.attempt(&request) {
                Ok(()) => return,
                Err(failure) => failure,
            };
            Counters::bump(&self.shared.counters.failed_loads);

            let Some(artwork) = artwork else {
                tracing::warn!(error = %err, "nothing to load");
                self.shared.discard_request();
                return;
            };

            if err.is_soft() {
                tracing::warn!(error = %err, "load abandoned");
                self.shared.discard_request();
                return;
            }

            let decision = self.shared.recovery.on_failure(&artwork, &err);
            if request.is_live_swap {
                self.shared.discard_request();
                if let Some(live) = &self.shared.live {
                    live.notify_swap_failed(artwork.position);
                    live.recover_from_failed_swap(
                        self.shared.navigator.as_ref(),
                        artwork.position,
                        &err,
                    );
                }
                return;
            }

            match decision.action {
                RecoveryAction::Advance => {
                    self.shared.navigator.advance();
                    self.shared.discard_request();
                    return;
                }
                RecoveryAction::Skip | RecoveryAction::DeleteAndSkip if decision.retry => {
                    tracing::info!(failed = artwork.position, "retrying with the next artwork");
                    self.shared.navigator.advance();
                    request.artwork = None;
                    request.alignment = Default::default();
                    request.intent = SwapIntent::Automated;
                }
                RecoveryAction::Skip | RecoveryAction::DeleteAndSkip => {
                    self.shared.discard_request();
                    return;
                }
            }
        }
    }

    /// Load and prefetch once. Leaves the back slot empty on failure.
    #[tracing::instrument(level = "debug", skip_all)]
    fn attempt(&self, request: &LoadRequest) -> Attempt {
        let artwork = match request
            .artwork
            .clone()
            .or_else(|| self.shared.navigator.current_artwork())
        {
            Some(a) => a,
            None => return Err((None, PlaybackError::validation("catalog is empty"))),
        };

        if artwork.is_vault() && !self.shared.storage.exists(&artwork.path) {
            return Err((
                Some(artwork.clone()),
                PlaybackError::file_missing(artwork.path.display().to_string()),
            ));
        }

        let token = {
            let st = self.shared.lock();
            let mut st = self
                .shared
                .clear_back_slot(st)
                .map_err(|e| (Some(artwork.clone()), e))?;
            let token = st.take_token();
            if let Err(e) = st.slots[BACK].begin_load(token) {
                return Err((Some(artwork), e));
            }
            token
        };

        let loaded = self.open(&artwork, request);
        let mut st = self.shared.lock();
        let committed = loaded.and_then(|(res, meta)| st.slots[BACK].commit_load(token, res, meta));
        if let Err(e) = committed {
            if st.slots[BACK].token() == token {
                st.slots[BACK].unload();
            }
            return Err((Some(artwork), e));
        }
        drop(st);
        tracing::info!(
            position = artwork.position,
            path = %artwork.path.display(),
            "loaded into back slot"
        );

        match PrefetchEngine::new(&self.shared).prefetch_back() {
            Ok(done) => {
                let mut st = self.shared.lock();
                self.shared.loader_done(&mut st);
                tracing::debug!(
                    frame = done.frame_index,
                    delay_ms = done.delay_ms,
                    "back slot ready"
                );
                Ok(())
            }
            Err(e) => Err((Some(artwork), e)),
        }
    }

    /// Read bytes and open the codec. Runs without the state lock.
    fn open(
        &self,
        artwork: &ArtworkRef,
        request: &LoadRequest,
    ) -> PlaybackResult<(Box<SlotResources>, SlotMeta)> {
        let bytes = match self.shared.storage.read(&artwork.path) {
            Ok(b) => b,
            Err(PlaybackError::FileMissing(path)) if !artwork.is_vault() => {
                return Err(PlaybackError::decode(format!("{path} is missing")));
            }
            Err(e) => return Err(e),
        };
        let codec = self.shared.codecs.open(artwork.kind, Arc::clone(&bytes))?;
        let (background, _) = self.shared.settings.background();
        let res = SlotResources::new(
            bytes,
            codec,
            self.shared.config.panel,
            self.shared.settings.rotation(),
            background,
        )?;
        tracing::debug!(
            bytes = res.byte_len(),
            frames = res.info().frame_count,
            "codec opened for back slot"
        );
        let alignment = if artwork.live_eligible {
            request.alignment
        } else {
            Default::default()
        };
        let meta = SlotMeta {
            artwork: artwork.clone(),
            info: res.info(),
            alignment,
            is_live_swap: request.is_live_swap,
            intent: request.intent,
            prefetched_delay_ms: 0,
            prefetched_frame: 0,
        };
        Ok((Box::new(res), meta))
    }
}
