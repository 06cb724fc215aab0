//! Text-to-speech using espeak-ng.
//!
//! espeak renders whole utterances, so fragments are collected until a
//! sentence ends and the remainder is rendered on flush. Output is mono at
//! espeak's native 22.05 kHz; the speaker has to be configured for it.

#![allow(non_upper_case_globals)]

use crate::chunk::AudioChunk;
use crate::constants::CHUNK_FRAMES;
use crate::error::SynthesisError;
use crate::format::PcmFormat;
use crate::synth::{chunk_samples, Synthesizer};

pub struct EspeakSynthesizer {
    voice: String,
    chunk_frames: usize,
    pending: String,
}

impl EspeakSynthesizer {
    pub fn new(voice: impl Into<String>) -> Self {
        EspeakSynthesizer {
            voice: voice.into(),
            chunk_frames: CHUNK_FRAMES,
            pending: String::new(),
        }
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    fn render(&self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError> {
        if text.trim().is_empty() {
            return Ok(vec![]);
        }
        let wav = ffi::speak(&self.voice, text)?;
        Ok(chunk_samples(&wav, self.chunk_frames, &self.format()))
    }
}

impl Synthesizer for EspeakSynthesizer {
    fn format(&self) -> PcmFormat {
        PcmFormat::espeak()
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError> {
        self.pending.push_str(text);

        let Some(end) = self.pending.rfind(['.', '!', '?', '\n']) else {
            return Ok(vec![]);
        };

        let sentence: String = self.pending.drain(..=end).collect();
        self.render(&sentence)
    }

    fn flush(&mut self) -> Result<Vec<AudioChunk>, SynthesisError> {
        let rest = std::mem::take(&mut self.pending);
        self.render(&rest)
    }
}

mod ffi {
    use espeakng_sys::*;
    use lazy_static::lazy_static;
    use std::ffi::{c_void, CString};
    use std::os::raw::{c_char, c_int, c_short};
    use std::sync::{Mutex, MutexGuard};

    use crate::error::SynthesisError;

    const BUFF_LEN: i32 = 500;
    const OPTIONS: i32 = 0;

    lazy_static! {
        /// espeak keeps global state, so only one synthesis may run at a time
        static ref ENGINE: Mutex<()> = Mutex::new(());
        static ref AUDIO_BUFFER: Mutex<Vec<i16>> = Mutex::new(Vec::new());
    }

    pub fn speak(voice: &str, text: &str) -> Result<Vec<i16>, SynthesisError> {
        let _engine = ENGINE.plock();
        AUDIO_BUFFER.plock().clear();

        let output: espeak_AUDIO_OUTPUT = espeak_AUDIO_OUTPUT_AUDIO_OUTPUT_RETRIEVAL;
        let path: *const c_char = std::ptr::null();

        let sample_rate = unsafe { espeak_Initialize(output, BUFF_LEN, path, OPTIONS) };
        if sample_rate <= 0 {
            return Err(SynthesisError("espeak-ng failed to initialize".into()));
        }

        let voice_name = CString::new(voice)
            .map_err(|_| SynthesisError("voice name contains a null byte".into()))?;

        // Filter out null bytes so the text converts to a CString
        let filtered_text: String = text.chars().filter(|&c| c != '\0').collect();
        let text_cstr = CString::new(filtered_text)
            .map_err(|_| SynthesisError("text contains a null byte".into()))?;

        let result = unsafe {
            espeak_SetVoiceByName(voice_name.as_ptr());
            espeak_SetSynthCallback(Some(synth_callback));

            espeak_Synth(
                text_cstr.as_ptr() as *const c_void,
                BUFF_LEN as usize,
                0,
                0,
                0,
                espeakCHARS_AUTO,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            );

            let result = espeak_Synchronize();
            espeak_Terminate();
            result
        };

        if result != espeak_ERROR_EE_OK {
            return Err(SynthesisError(format!("espeak-ng returned error {result}")));
        }

        Ok(std::mem::take(&mut *AUDIO_BUFFER.plock()))
    }

    unsafe extern "C" fn synth_callback(
        wav: *mut c_short,
        sample_count: c_int,
        _events: *mut espeak_EVENT,
    ) -> c_int {
        if !wav.is_null() && sample_count > 0 {
            let wav_slice = std::slice::from_raw_parts(wav, sample_count as usize);
            AUDIO_BUFFER.plock().extend_from_slice(wav_slice);
        }
        0
    }

    trait PoisonlessLock<T> {
        fn plock(&self) -> MutexGuard<'_, T>;
    }

    impl<T> PoisonlessLock<T> for Mutex<T> {
        fn plock(&self) -> MutexGuard<'_, T> {
            match self.lock() {
                Ok(l) => l,
                Err(e) => e.into_inner(),
            }
        }
    }
}
