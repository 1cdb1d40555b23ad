// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::errors::CodecError;

/// Newline-delimited JSON framing: decodes `D`, encodes `E`.
///
/// Built on `LinesCodec` so a peer that never sends `\n` cannot make us
/// buffer without bound. Blank lines between documents are skipped.
pub struct JsonLinesCodec<D, E> {
    lines: LinesCodec,
    max_length: usize,
    _marker: PhantomData<fn() -> (D, E)>,
}

impl<D, E> JsonLinesCodec<D, E> {
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
            _marker: PhantomData,
        }
    }

    fn map_lines_error(&self, error: LinesCodecError) -> CodecError {
        match error {
            LinesCodecError::MaxLineLengthExceeded => CodecError::FrameTooLarge(self.max_length),
            LinesCodecError::Io(e) => CodecError::Io(e),
        }
    }
}

impl<D: DeserializeOwned, E> Decoder for JsonLinesCodec<D, E> {
    type Item = D;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<D>, CodecError> {
        loop {
            let line = self.lines.decode(src).map_err(|e| self.map_lines_error(e))?;
            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(serde_json::from_str(&line)?)),
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<D>, CodecError> {
        loop {
            let line = self
                .lines
                .decode_eof(src)
                .map_err(|e| self.map_lines_error(e))?;
            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(serde_json::from_str(&line)?)),
                None => return Ok(None),
            }
        }
    }
}

impl<D, E: Serialize> Encoder<E> for JsonLinesCodec<D, E> {
    type Error = CodecError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_string(&item)?;
        if json.len() > self.max_length {
            return Err(CodecError::FrameTooLarge(self.max_length));
        }
        self.lines
            .encode(json, dst)
            .map_err(|e| self.map_lines_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExecutionRequest, ExecutionResponse};

    type ServerCodec = JsonLinesCodec<ExecutionRequest, ExecutionResponse>;

    #[test]
    fn test_decodes_consecutive_documents_and_skips_blank_lines() {
        let mut codec = ServerCodec::new(1024);
        let mut buf = BytesMut::from(
            "{\"code\":\"(module)\",\"function\":\"a\"}\n\n{\"code\":\"(module)\",\"function\":\"b\"}\n",
        );

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.function, "a");
        assert_eq!(second.function, "b");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut codec = ServerCodec::new(1024);
        let mut buf = BytesMut::from("{\"code\":\"(module)\",");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"function\":\"f\"}\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().function, "f");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let mut codec = ServerCodec::new(1024);
        let mut buf = BytesMut::from("not json\n");
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut codec = ServerCodec::new(16);
        let mut buf = BytesMut::from("{\"code\":\"(module (func))\",\"function\":\"f\"}\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge(16))
        ));
    }

    #[test]
    fn test_encoded_response_is_one_line() {
        let mut codec = ServerCodec::new(1024);
        let mut buf = BytesMut::new();
        codec
            .encode(ExecutionResponse::failure("line one\nline two"), &mut buf)
            .unwrap();
        let text = std::str::from_utf8(&buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }
}
