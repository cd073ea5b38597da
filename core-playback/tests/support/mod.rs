//! Test doubles for the host engines and the adapter layer.
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioMode, BackendKind, BridgeError, InitialSoundStatus, MediaElement, MediaElementEvent,
    MediaElementFactory, MediaElementListener, SoundEngine, SoundObject, SoundStatus,
    SoundStatusCallback,
};
use core_playback::{
    AdapterEvent, AdapterFactory, BackendAdapter, EventSink, HandleId, PlaybackError, Track,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub fn track(id: &str, duration: f64) -> Track {
    Track::new(
        id,
        format!("Track {}", id),
        duration,
        format!("https://cdn.example.com/{}.mp3", id),
    )
}

pub fn uri(id: &str) -> String {
    format!("https://cdn.example.com/{}.mp3", id)
}

/// Polls `condition` until it holds, yielding to other tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================================================
// Scripted adapter layer
// ============================================================================

/// Adapter whose events are pushed by the test.
pub struct ScriptedAdapter {
    id: HandleId,
    kind: BackendKind,
    pub track: Track,
    pub looping_at_creation: bool,
    sink: Mutex<Option<EventSink>>,
    calls: Mutex<Vec<String>>,
    unloads: Arc<AtomicUsize>,
    fail_play: bool,
    fail_load: bool,
}

impl ScriptedAdapter {
    /// Emits through the installed sink, stamped with this adapter's generation.
    pub fn emit(&self, event: AdapterEvent) {
        let sink = self.sink.lock().clone().expect("sink installed");
        sink.emit(event);
    }

    pub fn generation(&self) -> u64 {
        self.sink.lock().as_ref().expect("sink installed").generation()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl BackendAdapter for ScriptedAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn handle_id(&self) -> HandleId {
        self.id
    }

    fn subscribe(&self, sink: EventSink) {
        *self.sink.lock() = Some(sink);
    }

    async fn load(&self) -> core_playback::Result<()> {
        self.record("load");
        if self.fail_load {
            return Err(PlaybackError::LoadFailed {
                uri: self.track.audio_url.clone(),
                reason: "404".to_string(),
            });
        }
        Ok(())
    }

    async fn play(&self) -> core_playback::Result<()> {
        self.record("play");
        if self.fail_play {
            return Err(PlaybackError::CommandFailed {
                command: "play",
                reason: "not allowed".to_string(),
            });
        }
        Ok(())
    }

    async fn pause(&self) -> core_playback::Result<()> {
        self.record("pause");
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> core_playback::Result<()> {
        self.record(format!("seek:{}", seconds));
        Ok(())
    }

    async fn set_loop(&self, looping: bool) -> core_playback::Result<()> {
        self.record(format!("loop:{}", looping));
        Ok(())
    }

    async fn unload(&self) {
        self.record("unload");
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out [`ScriptedAdapter`]s and remembering them.
pub struct ScriptedFactory {
    kind: BackendKind,
    adapters: Mutex<Vec<Arc<ScriptedAdapter>>>,
    unloads: Arc<AtomicUsize>,
    fail_play: AtomicBool,
    fail_load: AtomicBool,
}

impl ScriptedFactory {
    pub fn new(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            adapters: Mutex::new(Vec::new()),
            unloads: Arc::new(AtomicUsize::new(0)),
            fail_play: AtomicBool::new(false),
            fail_load: AtomicBool::new(false),
        })
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.adapters.lock().len()
    }

    pub fn adapter(&self, index: usize) -> Arc<ScriptedAdapter> {
        Arc::clone(&self.adapters.lock()[index])
    }

    pub fn last(&self) -> Arc<ScriptedAdapter> {
        Arc::clone(self.adapters.lock().last().expect("an adapter was created"))
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

impl AdapterFactory for ScriptedFactory {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create(
        &self,
        track: &Track,
        looping: bool,
    ) -> core_playback::Result<Arc<dyn BackendAdapter>> {
        let adapter = Arc::new(ScriptedAdapter {
            id: HandleId::new(),
            kind: self.kind,
            track: track.clone(),
            looping_at_creation: looping,
            sink: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            unloads: Arc::clone(&self.unloads),
            fail_play: self.fail_play.load(Ordering::SeqCst),
            fail_load: self.fail_load.load(Ordering::SeqCst),
        });
        self.adapters.lock().push(Arc::clone(&adapter));
        Ok(adapter)
    }
}

// ============================================================================
// Streaming element
// ============================================================================

pub struct MockElement {
    pub src: String,
    listener: Mutex<Option<MediaElementListener>>,
    calls: Mutex<Vec<String>>,
    reject_play: bool,
}

impl MockElement {
    /// Fires an event as the native element would.
    pub fn fire(&self, event: MediaElementEvent) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl MediaElement for MockElement {
    fn set_listener(&self, listener: MediaElementListener) {
        *self.listener.lock() = Some(listener);
    }

    fn set_loop(&self, looping: bool) {
        self.record(format!("loop:{}", looping));
    }

    fn load(&self) {
        self.record("load");
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        if self.reject_play {
            Err(BridgeError::Rejected("autoplay blocked".to_string()))
        } else {
            Ok(())
        }
    }

    fn pause(&self) {
        self.record("pause");
    }

    fn set_current_time(&self, seconds: f64) {
        self.record(format!("seek:{}", seconds));
    }

    fn release(&self) {
        self.record("release");
    }
}

#[derive(Default)]
pub struct MockElementFactory {
    elements: Mutex<Vec<Arc<MockElement>>>,
    reject_play: AtomicBool,
}

impl MockElementFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    pub fn sources(&self) -> Vec<String> {
        self.elements.lock().iter().map(|e| e.src.clone()).collect()
    }

    pub fn last(&self) -> Arc<MockElement> {
        Arc::clone(self.elements.lock().last().expect("an element was created"))
    }

    pub fn element(&self, index: usize) -> Arc<MockElement> {
        Arc::clone(&self.elements.lock()[index])
    }
}

impl MediaElementFactory for MockElementFactory {
    fn create(&self, src: &str) -> BridgeResult<Arc<dyn MediaElement>> {
        let element = Arc::new(MockElement {
            src: src.to_string(),
            listener: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            reject_play: self.reject_play.load(Ordering::SeqCst),
        });
        self.elements.lock().push(Arc::clone(&element));
        Ok(element)
    }
}

// ============================================================================
// Buffered sound engine
// ============================================================================

pub struct MockSound {
    pub uri: String,
    pub initial: InitialSoundStatus,
    status: Mutex<SoundStatus>,
    on_status: SoundStatusCallback,
    calls: Mutex<Vec<String>>,
    unloaded: AtomicBool,
    fail_seek: bool,
    loop_gate: Option<Arc<Notify>>,
}

impl MockSound {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// Positions passed to `set_position`, in call order.
    pub fn seeks(&self) -> Vec<f64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix("seek:"))
            .filter_map(|p| p.parse().ok())
            .collect()
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> f64 {
        self.status.lock().position_secs()
    }

    /// Reports the engine's current status, as one polling tick would.
    pub fn tick(&self) {
        let status = self.status.lock().clone();
        (self.on_status)(status);
    }

    /// Reports an arbitrary snapshot, e.g. one taken before a command applied.
    pub fn report(&self, status: SoundStatus) {
        (self.on_status)(status);
    }

    /// Reports a snapshot whose position lags behind the engine.
    pub fn report_stale_position(&self, seconds: f64) {
        let mut status = self.status.lock().clone();
        status.position = Duration::from_secs_f64(seconds);
        (self.on_status)(status);
    }

    pub fn advance(&self, seconds: f64) {
        let mut status = self.status.lock();
        let duration = status.duration_secs();
        let next = (status.position_secs() + seconds).min(duration);
        status.position = Duration::from_secs_f64(next);
    }

    /// Plays to the end of the media and reports the finishing tick.
    pub fn finish(&self) {
        let status = {
            let mut status = self.status.lock();
            if status.is_looping {
                status.position = Duration::ZERO;
            } else {
                status.position = status.duration.unwrap_or_default();
                status.is_playing = false;
            }
            let mut snapshot = status.clone();
            snapshot.did_just_finish = true;
            snapshot
        };
        (self.on_status)(status);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn check_loaded(&self) -> BridgeResult<()> {
        if self.is_unloaded() {
            Err(BridgeError::AlreadyReleased)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SoundObject for MockSound {
    async fn status(&self) -> BridgeResult<SoundStatus> {
        self.check_loaded()?;
        Ok(self.status.lock().clone())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        self.check_loaded()?;
        self.status.lock().is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        self.check_loaded()?;
        self.status.lock().is_playing = false;
        Ok(())
    }

    async fn set_position(&self, position: Duration) -> BridgeResult<()> {
        self.record(format!("seek:{}", position.as_secs_f64()));
        self.check_loaded()?;
        if self.fail_seek {
            return Err(BridgeError::Rejected("seek not allowed".to_string()));
        }
        self.status.lock().position = position;
        Ok(())
    }

    async fn set_is_looping(&self, looping: bool) -> BridgeResult<()> {
        self.record(format!("loop:{}", looping));
        if let Some(gate) = &self.loop_gate {
            gate.notified().await;
        }
        self.check_loaded()?;
        self.status.lock().is_looping = looping;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        self.check_loaded()?;
        let mut status = self.status.lock();
        status.is_playing = false;
        status.position = Duration::ZERO;
        Ok(())
    }

    async fn unload(&self) -> BridgeResult<()> {
        self.record("unload");
        if self.unloaded.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyReleased);
        }
        self.status.lock().is_loaded = false;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSoundEngine {
    sounds: Mutex<Vec<Arc<MockSound>>>,
    requested: Mutex<Vec<String>>,
    audio_modes: Mutex<Vec<AudioMode>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    durations: Mutex<HashMap<String, f64>>,
    failing: Mutex<HashSet<String>>,
    fail_seek: AtomicBool,
    loop_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockSoundEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds `create_sound` for `uri` until the returned gate is notified.
    pub fn gate(&self, uri: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(uri.to_string(), Arc::clone(&gate));
        gate
    }

    /// Holds `set_is_looping` on every later sound until the gate is notified.
    pub fn gate_loop(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.loop_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_duration(&self, uri: &str, seconds: f64) {
        self.durations.lock().insert(uri.to_string(), seconds);
    }

    pub fn fail(&self, uri: &str) {
        self.failing.lock().insert(uri.to_string());
    }

    pub fn fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    /// URIs passed to `create_sound`, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    pub fn audio_modes(&self) -> Vec<AudioMode> {
        self.audio_modes.lock().clone()
    }

    pub fn sounds(&self) -> Vec<Arc<MockSound>> {
        self.sounds.lock().clone()
    }

    pub fn sound(&self, uri: &str) -> Option<Arc<MockSound>> {
        self.sounds.lock().iter().find(|s| s.uri == uri).cloned()
    }

    pub fn last(&self) -> Arc<MockSound> {
        Arc::clone(self.sounds.lock().last().expect("a sound was created"))
    }
}

#[async_trait]
impl SoundEngine for MockSoundEngine {
    async fn set_audio_mode(&self, mode: AudioMode) -> BridgeResult<()> {
        self.audio_modes.lock().push(mode);
        Ok(())
    }

    async fn create_sound(
        &self,
        uri: &str,
        initial: InitialSoundStatus,
        on_status: SoundStatusCallback,
    ) -> BridgeResult<Arc<dyn SoundObject>> {
        self.requested.lock().push(uri.to_string());

        let gate = self.gates.lock().get(uri).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().contains(uri) {
            return Err(BridgeError::OperationFailed(format!("cannot decode {}", uri)));
        }

        let duration = self.durations.lock().get(uri).copied().unwrap_or(180.0);
        let sound = Arc::new(MockSound {
            uri: uri.to_string(),
            initial,
            status: Mutex::new(SoundStatus {
                is_loaded: true,
                position: Duration::ZERO,
                duration: Some(Duration::from_secs_f64(duration)),
                is_playing: initial.should_play,
                is_looping: initial.is_looping,
                did_just_finish: false,
            }),
            on_status,
            calls: Mutex::new(Vec::new()),
            unloaded: AtomicBool::new(false),
            fail_seek: self.fail_seek.load(Ordering::SeqCst),
            loop_gate: self.loop_gate.lock().clone(),
        });
        self.sounds.lock().push(Arc::clone(&sound));
        Ok(sound)
    }
}
