use crate::dataflash::format::{MessageFormat, FMT_PAYLOAD_LEN, FMT_TYPE, HEAD1, HEAD2};
use crate::dataflash::record::Record;
use crate::dataflash::value::Value;
use crate::prelude::DecodeError;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::DecodeMetrics;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::iter::FusedIterator;
use std::path::Path;

/// Forward-only reader turning a DataFlash byte stream into typed records.
///
/// Holds the registered message formats and at most one message payload.
/// Unknown or unhandled messages are skipped, a truncated tail ends the
/// stream quietly, and any other I/O failure is yielded once as an error.
pub struct Decoder<R> {
    reader: R,
    formats: HashMap<u8, MessageFormat>,
    payload: Vec<u8>,
    carry: Option<u8>,
    metrics: DecodeMetrics,
    finished: bool,
    logger: LogManager,
}

impl Decoder<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            formats: HashMap::new(),
            payload: Vec::with_capacity(FMT_PAYLOAD_LEN),
            carry: None,
            metrics: DecodeMetrics::default(),
            finished: false,
            logger: LogManager::new("decoder"),
        }
    }

    pub fn metrics(&self) -> DecodeMetrics {
        self.metrics
    }

    pub fn format(&self, type_id: u8) -> Option<&MessageFormat> {
        self.formats.get(&type_id)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.reader.read_exact(&mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads exactly `len` payload bytes; `false` means the stream ended first.
    fn fill(&mut self, len: usize) -> io::Result<bool> {
        self.payload.resize(len, 0);
        match self.reader.read_exact(&mut self.payload) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.metrics.truncated = true;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Scans to the next `HEAD1 HEAD2` pair and returns the type id after it.
    fn next_header(&mut self) -> io::Result<Option<u8>> {
        let mut prev = self.carry.take();
        loop {
            let Some(byte) = self.read_byte()? else {
                if prev.is_some() {
                    self.metrics.skipped_bytes += 1;
                }
                if prev == Some(HEAD1) {
                    self.metrics.truncated = true;
                }
                return Ok(None);
            };
            if prev == Some(HEAD1) && byte == HEAD2 {
                let type_id = self.read_byte()?;
                if type_id.is_none() {
                    self.metrics.truncated = true;
                }
                return Ok(type_id);
            }
            if prev.is_some() {
                self.metrics.skipped_bytes += 1;
            }
            prev = Some(byte);
        }
    }

    fn register_format(&mut self) {
        let mut raw = [0u8; FMT_PAYLOAD_LEN];
        raw.copy_from_slice(&self.payload);
        if MessageFormat::is_fmt_self_description(&raw) {
            self.logger.detail("skipping FMT self-description");
            return;
        }
        match MessageFormat::from_fmt_payload(&raw) {
            Ok(format) => {
                self.logger.detail(&format!(
                    "registered {} as type {} ({} bytes)",
                    format.name,
                    format.type_id,
                    format.message_len()
                ));
                self.metrics.formats_registered += 1;
                self.formats.insert(format.type_id, format);
            }
            Err(err) => {
                self.logger.warn(&format!("rejected format definition: {}", err));
                self.metrics.rejected_formats += 1;
            }
        }
    }

    fn next_record(&mut self) -> io::Result<Option<Record>> {
        loop {
            let Some(type_id) = self.next_header()? else {
                return Ok(None);
            };

            if type_id == FMT_TYPE {
                if !self.fill(FMT_PAYLOAD_LEN)? {
                    return Ok(None);
                }
                self.register_format();
                continue;
            }

            let Some(format) = self.formats.get(&type_id) else {
                // Length is unknown without a format; resync on the next header.
                self.metrics.unknown_messages += 1;
                self.carry = Some(type_id);
                continue;
            };
            let payload_len = format.payload_len();
            let handled = format.kind.is_some();

            if !self.fill(payload_len)? {
                return Ok(None);
            }
            if !handled {
                self.metrics.unhandled_messages += 1;
                continue;
            }

            let format = &self.formats[&type_id];
            let values = decode_values(format, &self.payload);
            match Record::from_message(format, &values) {
                Some(record) => {
                    self.metrics.records_decoded += 1;
                    return Ok(Some(record));
                }
                None => {
                    self.logger
                        .detail(&format!("skipping malformed {} message", format.name));
                    self.metrics.malformed_messages += 1;
                }
            }
        }
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                if self.metrics.truncated {
                    self.logger.warn("log ends with a truncated message");
                }
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(DecodeError::Io(err)))
            }
        }
    }
}

impl<R: Read> FusedIterator for Decoder<R> {}

fn decode_values(format: &MessageFormat, payload: &[u8]) -> Vec<Value> {
    let mut offset = 0;
    format
        .fields
        .iter()
        .map(|&field| {
            let end = offset + field.size();
            let value = Value::decode(field, &payload[offset..end]);
            offset = end;
            value
        })
        .collect()
}
