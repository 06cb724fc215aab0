//! Unit tests for the synthesizers and output sinks

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::chunk::AudioChunk;
    use crate::error::DeviceError;
    use crate::format::PcmFormat;
    use crate::sinks::{AudioSink, MemorySink, PacedSink, SinkEvent, WavFileSink, WavStreamSink};
    use crate::synth::{chunk_samples, Synthesizer, ToneSynthesizer};

    const RATE: u32 = 8000;

    fn tone() -> ToneSynthesizer {
        ToneSynthesizer::new(PcmFormat::mono(RATE))
    }

    fn total_bytes(chunks: &[AudioChunk]) -> usize {
        chunks.iter().map(AudioChunk::len).sum()
    }

    #[test]
    fn test_tone_holds_partial_word() {
        let mut synth = tone();

        let chunks = synth.synthesize("hel").unwrap();
        assert!(chunks.is_empty());
        assert_eq!(synth.pending(), "hel");

        // "hello " is complete, "wor" waits for more text
        let chunks = synth.synthesize("lo wor").unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(synth.pending(), "wor");

        let rest = synth.flush().unwrap();
        assert!(!rest.is_empty());
        assert_eq!(synth.pending(), "");
    }

    #[test]
    fn test_tone_durations() {
        let mut synth = tone();

        // 2 letters * 60ms + 1 gap * 120ms = 240ms
        let chunks = synth.synthesize("ab ").unwrap();
        let expected = PcmFormat::mono(RATE).bytes_per_second() * 240 / 1000;
        assert_eq!(total_bytes(&chunks), expected);
    }

    #[test]
    fn test_tone_gap_is_silence() {
        let mut synth = tone();

        let chunks = synth.synthesize(" ").unwrap();
        let samples: Vec<i16> = chunks.iter().flat_map(AudioChunk::samples).collect();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_tone_letters_are_audible() {
        let mut synth = tone();

        let chunks = synth.flush().unwrap();
        assert!(chunks.is_empty());

        synth.synthesize("a").unwrap();
        let samples: Vec<i16> = synth.flush().unwrap().iter().flat_map(AudioChunk::samples).collect();
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 1000);
        assert!(peak <= (i16::MAX as f64 * 0.3) as u16 + 1);
    }

    #[test]
    fn test_tone_chunk_size() {
        let mut synth = tone().with_chunk_frames(100);

        let chunks = synth.synthesize("abc ").unwrap();
        let (last, full) = chunks.split_last().unwrap();
        assert!(full.iter().all(|chunk| chunk.len() == 200));
        assert!(last.len() <= 200);
    }

    #[test]
    fn test_tone_stereo_duplicates_samples() {
        let format = PcmFormat {
            channels: 2,
            ..PcmFormat::mono(RATE)
        };
        let mut synth = ToneSynthesizer::new(format);

        synth.synthesize("x").unwrap();
        let samples: Vec<i16> = synth.flush().unwrap().iter().flat_map(AudioChunk::samples).collect();
        assert_eq!(samples.len() % 2, 0);
        assert!(samples.chunks(2).all(|frame| frame[0] == frame[1]));
    }

    #[test]
    fn test_chunk_samples_splits_by_frames() {
        let format = PcmFormat::mono(RATE);
        let samples: Vec<i16> = (0..10).collect();

        let chunks = chunk_samples(&samples, 4, &format);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].samples(), vec![0, 1, 2, 3]);
        assert_eq!(chunks[2].samples(), vec![8, 9]);
    }

    #[test]
    fn test_chunk_round_trips_samples() {
        let chunk = AudioChunk::from_samples(&[1, -1, i16::MAX, i16::MIN]);

        assert_eq!(chunk.as_bytes(), &[1, 0, 0xff, 0xff, 0xff, 0x7f, 0x00, 0x80]);
        assert_eq!(chunk.samples(), vec![1, -1, i16::MAX, i16::MIN]);
        assert_eq!(
            chunk.duration(&PcmFormat::mono(4)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_memory_sink_requires_open() {
        let mut sink = MemorySink::new();

        assert!(matches!(sink.write(&[0, 0]), Err(DeviceError::NotOpen)));

        sink.open(&PcmFormat::default()).unwrap();
        sink.write(&[1, 2]).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert_eq!(
            sink.events(),
            vec![
                SinkEvent::Open(PcmFormat::default()),
                SinkEvent::Write(AudioChunk::from(vec![1, 2])),
                SinkEvent::Close,
            ]
        );
    }

    #[test]
    fn test_memory_sink_rejects_bad_format() {
        let mut sink = MemorySink::new();
        let format = PcmFormat {
            bit_depth: 8,
            ..PcmFormat::default()
        };

        assert!(matches!(sink.open(&format), Err(DeviceError::Format(_))));
    }

    #[test]
    fn test_wav_file_sink_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let format = PcmFormat::mono(RATE);

        let mut sink = WavFileSink::new(&path);
        sink.open(&format).unwrap();
        sink.write(AudioChunk::from_samples(&[1, 2, 3]).as_bytes()).unwrap();
        sink.write(AudioChunk::from_samples(&[4]).as_bytes()).unwrap();
        sink.close().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec(), format.wav_spec());
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_wav_file_sink_reassembles_split_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.wav");

        let mut sink = WavFileSink::new(&path);
        sink.open(&PcmFormat::mono(RATE)).unwrap();
        let pcm = AudioChunk::from_samples(&[258, -2]);
        sink.write(&pcm.as_bytes()[..3]).unwrap();
        sink.write(&pcm.as_bytes()[3..]).unwrap();
        sink.close().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![258, -2]);
    }

    #[test]
    fn test_wav_stream_sink_writes_header_then_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.wav");
        let file_path = path.clone();

        let mut sink = WavStreamSink::new(move || std::fs::File::create(&file_path));
        sink.open(&PcmFormat::mono(RATE)).unwrap();
        sink.write(&[7, 0, 8, 0]).unwrap();
        sink.close().unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(&written[..4], b"RIFF");
        assert_eq!(&written[8..12], b"WAVE");
        assert_eq!(&written[written.len() - 4..], &[7, 0, 8, 0]);
    }

    #[test]
    fn test_wav_stream_sink_requires_open() {
        let mut sink = WavStreamSink::new(|| Ok(std::io::sink()));
        assert!(matches!(sink.write(&[0, 0]), Err(DeviceError::NotOpen)));
    }

    #[test]
    fn test_paced_sink_throttles_to_real_time() {
        let memory = MemorySink::new();
        let mut sink = PacedSink::new(memory.clone());
        // 100 bytes per second
        let format = PcmFormat::mono(50);

        sink.open(&format).unwrap();
        let started = Instant::now();
        for _ in 0..3 {
            sink.write(&[0u8; 10]).unwrap();
        }

        // The first chunk may run ahead, the other two are paced
        assert!(started.elapsed() >= Duration::from_millis(180));
        assert_eq!(memory.writes().len(), 3);

        sink.close().unwrap();
        assert_eq!(sink.into_inner().closes(), 1);
    }
}
