//! In-process Ogg Vorbis decoder

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;

use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use lewton::inside_ogg::OggStreamReader;

use crate::decoders::{buffer_bytes, require_file, Decoder, DEFAULT_BUFFER_FRAMES};
use crate::error::{DecodeError, MixerError, Result};
use crate::frame::{CHANNELS, SAMPLE_RATE};
use crate::stream::{pcm_channel, PcmStream, PcmWriter};

/// Decodes Ogg Vorbis files with `lewton`, without a subprocess.
///
/// Only 48 kHz input is accepted since nothing is resampled. Mono input is
/// duplicated to both channels; any other channel count is rejected.
#[derive(Clone, Debug)]
pub struct OggDecoder {
    buffer_frames: usize,
}

impl OggDecoder {
    /// Decoder buffering [`DEFAULT_BUFFER_FRAMES`].
    pub fn new() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    /// How many frames to buffer ahead of the mixer.
    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }
}

impl Default for OggDecoder {
    fn default() -> Self {
        Self::new()
    }
}

type Reader = OggStreamReader<BufReader<File>>;

impl Decoder for OggDecoder {
    fn open(&self, input: &Path) -> Result<PcmStream> {
        require_file(input)?;
        let file = File::open(input).map_err(|e| MixerError::unavailable(input, e.to_string()))?;
        let reader = OggStreamReader::new(BufReader::new(file))
            .map_err(|e| MixerError::unavailable(input, format!("{:?}", e)))?;

        let rate = reader.ident_hdr.audio_sample_rate;
        let channels = reader.ident_hdr.audio_channels as usize;
        if rate != SAMPLE_RATE {
            return Err(MixerError::unavailable(
                input,
                format!("sample rate {} Hz, need {} Hz", rate, SAMPLE_RATE),
            ));
        }
        if channels != 1 && channels != CHANNELS {
            return Err(MixerError::unavailable(
                input,
                format!("{} channels, need mono or stereo", channels),
            ));
        }

        let name = input.display().to_string();
        let (writer, stream) = pcm_channel(name, buffer_bytes(self.buffer_frames));

        thread::Builder::new()
            .name("mischpult-ogg".into())
            .spawn(move || decode(reader, channels, writer))?;

        Ok(stream)
    }
}

fn decode(mut reader: Reader, channels: usize, mut writer: PcmWriter) {
    let mut bytes = Vec::new();
    loop {
        let packet = match reader.read_dec_packet_itl() {
            Ok(Some(packet)) => packet,
            Ok(None) => return writer.finish(),
            Err(err) => return writer.fail(DecodeError::new(format!("{:?}", err))),
        };

        bytes.clear();
        for sample in packet {
            let le = sample.to_le_bytes();
            bytes.extend_from_slice(&le);
            if channels == 1 {
                bytes.extend_from_slice(&le);
            }
        }

        if writer.write_all(&bytes).is_err() {
            return;
        }
    }
}
