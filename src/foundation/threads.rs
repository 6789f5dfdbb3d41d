use std::thread::{self, JoinHandle};

use anyhow::Context as _;
use thread_priority::{ThreadPriority, ThreadPriorityValue};

use crate::foundation::error::PlaybackResult;

/// Scheduling role of an engine thread.
///
/// The presenter outranks the upscale workers it waits on, and both outrank the loader so a
/// slow decode never starves frame pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThreadRole {
    Loader,
    Upscale,
    Presenter,
}

impl ThreadRole {
    /// Cross-platform priority level, 0 (lowest) to 99.
    pub(crate) fn level(self) -> u8 {
        match self {
            Self::Loader => 30,
            Self::Upscale => 70,
            Self::Presenter => 90,
        }
    }

    pub(crate) fn priority(self) -> Option<ThreadPriority> {
        ThreadPriorityValue::try_from(self.level())
            .ok()
            .map(ThreadPriority::Crossplatform)
    }
}

/// Pin the calling thread to `core`, best effort.
pub(crate) fn pin_current_thread(core: Option<usize>) {
    let Some(core) = core else {
        return;
    };
    let Some(ids) = core_affinity::get_core_ids() else {
        tracing::warn!(core, "cpu affinity is not available on this platform");
        return;
    };
    match ids.into_iter().find(|c| c.id == core) {
        Some(id) => {
            if !core_affinity::set_for_current(id) {
                tracing::warn!(core, "failed to pin thread");
            }
        }
        None => tracing::warn!(core, "requested core does not exist"),
    }
}

/// Apply the priority of `role` to the calling thread, best effort.
pub(crate) fn prioritize_current_thread(role: ThreadRole) {
    let Some(priority) = role.priority() else {
        tracing::warn!(?role, "no priority level for role");
        return;
    };
    if let Err(e) = thread_priority::set_current_thread_priority(priority) {
        tracing::warn!(?role, error = ?e, "failed to set thread priority");
    }
}

/// Spawn a named thread for `role`, optionally pinned to a core.
pub(crate) fn spawn_pinned<F>(
    name: &str,
    role: ThreadRole,
    core: Option<usize>,
    f: F,
) -> PlaybackResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            pin_current_thread(core);
            prioritize_current_thread(role);
            f();
        })
        .with_context(|| format!("failed to spawn {name} thread"))?;
    Ok(handle)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/threads.rs"]
mod tests;
