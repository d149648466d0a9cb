pub mod tone;

use tone::AlarmTone;

use rodio::{OutputStream, Sink};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::alarms::AlarmSound;

/// Plays alarm tones. The concrete backend is swappable so the scheduler can
/// run against a silent player in tests or on hosts without audio.
pub trait TonePlayer: Send + Sync {
    fn play(&self, sound: AlarmSound, volume: f32) -> Result<(), String>;

    /// Idempotent.
    fn stop(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTonePlayer;

impl TonePlayer for NoopTonePlayer {
    fn play(&self, _sound: AlarmSound, _volume: f32) -> Result<(), String> {
        Ok(())
    }

    fn stop(&self) {}
}

enum AudioCommand {
    Play {
        frequency: f32,
        noise_bed: bool,
        volume: f32,
        reply: Sender<Result<(), String>>,
    },
    Stop,
}

/// rodio output on a dedicated thread; `OutputStream` is not `Send`, so the
/// stream and sink never leave the audio thread.
pub struct ToneEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    is_playing: Arc<AtomicBool>,
}

impl Default for ToneEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            is_playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let is_playing = Arc::clone(&self.is_playing);

        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn open_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    let (s, handle) = OutputStream::try_default()
                        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                    let new_sink = Sink::try_new(&handle)
                        .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                    *stream = Some(s);
                    *sink = Some(new_sink);
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play {
                            frequency,
                            noise_bed,
                            volume,
                            reply,
                        } => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;

                            let result = open_sink(&mut _stream, &mut sink).map(|()| {
                                if let Some(ref s) = sink {
                                    s.set_volume(volume.clamp(0.0, 1.0));
                                    if noise_bed {
                                        s.append(AlarmTone::with_noise_bed(frequency));
                                    } else {
                                        s.append(AlarmTone::new(frequency));
                                    }
                                    s.play();
                                }
                            });
                            is_playing.store(result.is_ok(), Ordering::SeqCst);
                            let _ = reply.send(result);
                        }
                        AudioCommand::Stop => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                            is_playing.store(false, Ordering::SeqCst);
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }
}

impl TonePlayer for ToneEngineHandle {
    fn play(&self, sound: AlarmSound, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(AudioCommand::Play {
            frequency: sound.frequency_hz(),
            noise_bed: sound == AlarmSound::Nature,
            volume,
            reply: reply_tx,
        })
        .map_err(|e| e.to_string())?;
        reply_rx
            .recv()
            .map_err(|_| "audio thread exited before starting playback".to_string())?
    }

    fn stop(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
    }
}
