//! Force feedback bridge for a live virtual gamepad
//!
//! Reads kernel events from the gamepad handle and answers the uinput
//! upload/erase handshake. Play and stop requests are handed to a
//! [`RumbleSink`]. The loop runs until the device's running flag is cleared or
//! a read fails with anything other than "would block".

use super::effects::{EffectRecord, EffectStore};
use super::rumble::{RumblePlayback, RumbleSink};
use crate::uinput::abi::{FfErase, FfUpload};
use crate::uinput::codes::{EV_FF, EV_UINPUT, FF_RUMBLE, UI_FF_ERASE, UI_FF_UPLOAD};
use crate::uinput::event::{HidEvent, EVENT_SIZE};
use crate::uinput::sys::UinputIo;
use chrono::Local;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause between reads while the kernel has nothing for us
pub const IDLE_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to read force feedback events: {0}")]
    Read(#[source] io::Error),
}

/// Counters reported periodically by the bridge loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub uploads: u64,
    pub erases: u64,
    pub plays: u64,
    pub stops: u64,
    pub rejected: u64,
}

pub struct ForceFeedbackBridge {
    io: Arc<dyn UinputIo>,
    running: Arc<AtomicBool>,
    effects: Arc<EffectStore>,
    sink: Arc<dyn RumbleSink>,
    stats: BridgeStats,
}

impl ForceFeedbackBridge {
    pub fn new(io: Arc<dyn UinputIo>, running: Arc<AtomicBool>, sink: Arc<dyn RumbleSink>) -> Self {
        Self {
            io,
            running,
            effects: Arc::new(EffectStore::new()),
            sink,
            stats: BridgeStats::default(),
        }
    }

    pub fn effects(&self) -> Arc<EffectStore> {
        Arc::clone(&self.effects)
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Spawns the read loop as a tokio task
    pub fn spawn(self) -> JoinHandle<Result<BridgeStats, BridgeError>> {
        info!("Spawning force feedback bridge");
        let task_handle = tokio::spawn(async move {
            info!("Force feedback bridge task started");
            let result = self.run().await;
            match &result {
                Ok(stats) => info!("Force feedback bridge stopped: {:?}", stats),
                Err(e) => error!("Force feedback bridge terminated with error: {}", e),
            }
            result
        });
        debug!("Tokio task spawned with handle: {:?}", task_handle);
        task_handle
    }

    pub async fn run(mut self) -> Result<BridgeStats, BridgeError> {
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);
        let mut buf = [0u8; EVENT_SIZE];

        while self.running.load(Ordering::SeqCst) {
            match self.io.read_record(&mut buf) {
                Ok(n) if n < EVENT_SIZE => {
                    debug!("Skipping short read of {} bytes", n);
                    tokio::task::yield_now().await;
                }
                Ok(_) => match HidEvent::decode(&buf) {
                    Ok(event) => self.handle_event(&event),
                    Err(e) => debug!("Skipping undecodable record: {}", e),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(IDLE_POLL).await;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Force feedback read failed, stopping bridge");
                    return Err(BridgeError::Read(e));
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let s = self.stats;
                info!(
                    "Force feedback stats: {} uploads, {} erases, {} plays, {} stops, {} rejected in {} seconds",
                    s.uploads,
                    s.erases,
                    s.plays,
                    s.stops,
                    s.rejected,
                    (now - last_stats_time).num_seconds()
                );
                last_stats_time = now;
            }
        }

        info!("Running flag cleared, leaving force feedback loop");
        Ok(self.stats)
    }

    /// Dispatches one kernel event; anything that is not force feedback is ignored
    pub fn handle_event(&mut self, event: &HidEvent) {
        match (event.kind, event.code) {
            (EV_UINPUT, UI_FF_UPLOAD) => self.handle_upload(event.value as u32),
            (EV_UINPUT, UI_FF_ERASE) => self.handle_erase(event.value as u32),
            (EV_FF, effect_id) => self.handle_play(effect_id as i16, event.value),
            _ => {}
        }
    }

    fn handle_upload(&mut self, request_id: u32) {
        let mut upload = FfUpload::new(request_id);

        if let Err(e) = self.io.begin_ff_upload(&mut upload) {
            warn!(error = %e, request_id, "Failed to begin effect upload");
            upload.retval = -libc::EINVAL;
            self.stats.rejected += 1;
            self.end_upload(&upload);
            return;
        }

        if upload.effect.kind == FF_RUMBLE {
            let (strong, weak) = upload.effect.rumble_magnitudes();
            let record = EffectRecord {
                strong,
                weak,
                length_ms: upload.effect.replay_length,
            };
            debug!("Stored rumble effect {}: {:?}", upload.effect.id, record);
            self.effects.upsert(upload.effect.id, record);
            upload.retval = 0;
            self.stats.uploads += 1;
        } else {
            debug!(
                "Rejecting effect {} of type {:#x}",
                upload.effect.id, upload.effect.kind
            );
            upload.retval = -libc::EOPNOTSUPP;
            self.stats.rejected += 1;
        }

        self.end_upload(&upload);
    }

    fn end_upload(&self, upload: &FfUpload) {
        if let Err(e) = self.io.end_ff_upload(upload) {
            warn!(error = %e, request_id = upload.request_id, "Failed to end effect upload");
        }
    }

    fn handle_erase(&mut self, request_id: u32) {
        let mut erase = FfErase::new(request_id);

        match self.io.begin_ff_erase(&mut erase) {
            Ok(()) => {
                self.effects.remove(erase.effect_id as i16);
                debug!("Erased effect {}", erase.effect_id);
                erase.retval = 0;
                self.stats.erases += 1;
            }
            Err(e) => {
                warn!(error = %e, request_id, "Failed to begin effect erase");
                erase.retval = -libc::EINVAL;
                self.stats.rejected += 1;
            }
        }

        if let Err(e) = self.io.end_ff_erase(&erase) {
            warn!(error = %e, request_id, "Failed to end effect erase");
        }
    }

    fn handle_play(&mut self, effect_id: i16, value: i32) {
        let record = if value == 0 {
            None
        } else {
            self.effects.get(effect_id).filter(|r| !r.is_silent())
        };

        let playback = match record {
            Some(r) => {
                self.stats.plays += 1;
                RumblePlayback::play(r.strong, r.weak, r.length_ms)
            }
            None => {
                self.stats.stops += 1;
                RumblePlayback::stop()
            }
        };
        debug!("Effect {} value {} → {:?}", effect_id, value, playback);
        self.sink.on_rumble(playback);
    }
}
