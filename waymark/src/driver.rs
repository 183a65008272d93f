//! Async event loop for hosts that run on tokio.
//!
//! Host notifications arrive on an mpsc channel; timers are served by
//! sleeping until the minimap's next deadline. Every signal queued at wake-up
//! is applied before a single frame pass, which is how scroll bursts collapse
//! into one synchronization pass.

use tokio::sync::mpsc;
use tokio::time::{Instant as TokioInstant, sleep_until};
use waymark_api::{HostDocument, MarkerId, MarkerSurface};

use crate::minimap::Minimap;

/// A notification or request from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    StructureChanged,
    /// New minimap viewport height.
    Resized(f32),
    Scrolled,
    DragStart(f32),
    DragMove(f32),
    DragEnd,
    ToggleStar(MarkerId),
    JumpTo(MarkerId),
    JumpRelative(isize),
    Teardown,
}

fn now() -> std::time::Instant {
    TokioInstant::now().into_std()
}

async fn wait_for(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => sleep_until(TokioInstant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Apply one signal. Returns `false` when the loop should stop.
fn handle<H, R>(minimap: &mut Minimap<H, R>, signal: HostSignal) -> bool
where
    H: HostDocument,
    R: MarkerSurface,
{
    let result = match signal {
        HostSignal::StructureChanged => {
            minimap.on_structure_changed(now());
            Ok(())
        }
        HostSignal::Resized(height) => {
            minimap.on_resize(height, now());
            Ok(())
        }
        HostSignal::Scrolled => {
            minimap.on_scroll();
            Ok(())
        }
        HostSignal::DragStart(y) => {
            minimap.drag_start(y);
            Ok(())
        }
        HostSignal::DragMove(y) => {
            minimap.drag_move(y);
            Ok(())
        }
        HostSignal::DragEnd => {
            minimap.drag_end();
            Ok(())
        }
        HostSignal::ToggleStar(id) => minimap.toggle_star(&id).map(|_| ()),
        HostSignal::JumpTo(id) => minimap.jump_to(&id).map(|_| ()),
        HostSignal::JumpRelative(step) => minimap.jump_relative(step).map(|_| ()),
        HostSignal::Teardown => return false,
    };
    if let Err(e) = result {
        tracing::warn!("Minimap request failed: {}", e);
    }
    true
}

/// Drive `minimap` until the signal channel closes or a
/// [`HostSignal::Teardown`] arrives, then tear it down and hand it back.
pub async fn run<H, R>(
    mut minimap: Minimap<H, R>,
    mut signals: mpsc::Receiver<HostSignal>,
) -> Minimap<H, R>
where
    H: HostDocument,
    R: MarkerSurface,
{
    tracing::debug!("Minimap driver starting");

    'outer: loop {
        let deadline = minimap.next_deadline();
        tokio::select! {
            signal = signals.recv() => {
                let Some(signal) = signal else {
                    tracing::debug!("Signal channel closed");
                    break;
                };
                if !handle(&mut minimap, signal) {
                    break;
                }
                while let Ok(signal) = signals.try_recv() {
                    if !handle(&mut minimap, signal) {
                        break 'outer;
                    }
                }
                minimap.on_frame(now());
            }

            _ = wait_for(deadline) => {
                minimap.poll(now());
            }
        }
    }

    minimap.teardown();
    minimap
}
