//! The three-phase ingestion pipeline that turns a stream of text chunks
//! into a [`crate::piece_table::PieceTable`].

use log::debug;

use crate::buffer::Buffer;
use crate::char_class::EolStats;
use crate::error::{Error, Result};
use crate::piece_table::PieceTable;
use crate::types::{BuilderConfig, Eol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Receiving,
    Built,
    Created,
}

/// Chunks input into per-chunk [`Buffer`]s, repairing the two hazards a
/// chunk boundary can introduce (a split UTF-8 sequence, a split `\r\n`),
/// tallies EOL statistics, and hands the result to [`PieceTable::from_buffers`].
///
/// States advance one-way: `Receiving -> Built -> Created`. Calling a method
/// out of order returns [`Error::InvalidPhase`] rather than panicking, since
/// a misused builder is a caller bug the library should report, not crash on.
#[derive(Debug, Clone)]
pub struct PieceTableBuilder {
    phase: Phase,
    buffers: Vec<Buffer>,
    stats: EolStats,
    /// Bytes withheld from the end of the most recent chunk because they
    /// might be the prefix of a terminator or UTF-8 sequence that continues
    /// in the next chunk.
    pending: Vec<u8>,
}

impl Default for PieceTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceTableBuilder {
    pub fn new() -> Self {
        PieceTableBuilder {
            phase: Phase::Receiving,
            buffers: Vec::new(),
            stats: EolStats::default(),
            pending: Vec::new(),
        }
    }

    /// Appends one chunk of text. Withholds a trailing split CR or a
    /// trailing incomplete UTF-8 sequence, prepending them (along with
    /// anything withheld from the previous call) to this chunk before
    /// scanning it.
    pub fn receive(&mut self, chunk: &str) -> Result<()> {
        if self.phase != Phase::Receiving {
            return Err(Error::InvalidPhase("receive() after build() or create()"));
        }
        if chunk.is_empty() && self.pending.is_empty() {
            return Ok(());
        }

        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk.as_bytes());

        let withheld = trailing_incomplete_utf8(&bytes)
            .or_else(|| trailing_split_cr(&bytes))
            .unwrap_or(0);
        let boundary = bytes.len() - withheld;
        self.pending = bytes[boundary..].to_vec();
        bytes.truncate(boundary);

        if bytes.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        let buffer = Buffer::from_text(text);
        let local_stats = local_eol_stats(&buffer);
        debug!(
            "receive: chunk of {} bytes, {} terminators",
            buffer.len(),
            local_stats.total()
        );
        self.stats.cr += local_stats.cr;
        self.stats.lf += local_stats.lf;
        self.stats.crlf += local_stats.crlf;
        self.buffers.push(buffer);
        Ok(())
    }

    /// Flushes any withheld byte and fixes the resulting buffer list so
    /// `create` can finish. If nothing was ever received, a single empty
    /// buffer keeps the eventual document well-formed.
    pub fn build(&mut self) -> Result<()> {
        if self.phase != Phase::Receiving {
            return Err(Error::InvalidPhase("build() called twice"));
        }
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            let text = String::from_utf8(tail)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
            if text == "\r" {
                self.stats.cr += 1;
            }
            if let Some(last) = self.buffers.last_mut() {
                last.append(&text);
            } else {
                self.buffers.push(Buffer::from_text(text));
            }
        }
        if self.buffers.is_empty() {
            self.buffers.push(Buffer::new());
        }
        self.phase = Phase::Built;
        Ok(())
    }

    /// Chooses an EOL (majority vote, or `config.default_eol` if there were
    /// no terminators at all or `config.force_eol` is set), optionally
    /// rewrites every buffer to use it uniformly, and builds the final
    /// [`PieceTable`].
    pub fn create(&mut self, config: BuilderConfig) -> Result<PieceTable> {
        if self.phase == Phase::Receiving {
            return Err(Error::InvalidPhase("create() called before build()"));
        }
        if self.phase == Phase::Created {
            return Err(Error::InvalidPhase("create() called twice"));
        }

        let total = self.stats.total();
        let chosen = if total == 0 || config.force_eol {
            config.default_eol
        } else {
            let total_cr = self.stats.cr + self.stats.crlf;
            if total_cr > total / 2 {
                Eol::Crlf
            } else {
                Eol::Lf
            }
        };
        debug!("create: chosen eol = {chosen:?}, normalize = {}", config.normalize_eol);

        let buffers = std::mem::take(&mut self.buffers);
        let buffers = if config.normalize_eol {
            buffers
                .into_iter()
                .map(|b| Buffer::from_text(normalize_eol(&b.content, chosen)))
                .collect()
        } else {
            buffers
        };

        self.phase = Phase::Created;
        Ok(PieceTable::from_buffers(buffers))
    }
}

fn local_eol_stats(buffer: &Buffer) -> EolStats {
    let (_, stats) = crate::char_class::read_line_starts(&buffer.content);
    stats
}

/// Index of the start of a trailing incomplete UTF-8 sequence in `bytes`, if
/// any. A continuation byte (`0b10xxxxxx`) run at the very end is incomplete
/// when the lead byte that started it declares more continuation bytes than
/// are actually present.
fn trailing_incomplete_utf8(bytes: &[u8]) -> Option<usize> {
    let len = bytes.len();
    let max_lead_scan = len.min(4);
    for back in 1..=max_lead_scan {
        let idx = len - back;
        let b = bytes[idx];
        let expected = if b & 0x80 == 0 {
            1
        } else if b & 0xE0 == 0xC0 {
            2
        } else if b & 0xF0 == 0xE0 {
            3
        } else if b & 0xF8 == 0xF0 {
            4
        } else {
            continue; // a continuation byte, keep scanning further back for its lead
        };
        return if expected > back { Some(idx) } else { None };
    }
    None
}

/// Index of a trailing lone `\r` that might be the first half of a `\r\n`
/// split across this chunk boundary.
fn trailing_split_cr(bytes: &[u8]) -> Option<usize> {
    if bytes.last() == Some(&crate::char_class::CR) {
        Some(bytes.len() - 1)
    } else {
        None
    }
}

/// Rewrites every maximal run of `\r\n`, `\r`, or `\n` to `eol`.
fn normalize_eol(text: &str, eol: Eol) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            crate::char_class::CR => {
                out.push_str(eol.as_str());
                if bytes.get(i + 1) == Some(&crate::char_class::LF) {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            crate::char_class::LF => {
                out.push_str(eol.as_str());
                i += 1;
            }
            b => {
                // SAFETY-free path: push whole UTF-8 chars by scanning to
                // the next boundary, since we only special-cased ASCII CR/LF.
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i] & 0xC0) == 0x80 {
                    i += 1;
                }
                let _ = b;
                out.push_str(&text[start..i]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_yields_well_formed_empty_document() {
        let mut b = PieceTableBuilder::new();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.buffer_length(), 0);
        assert_eq!(table.line_count(), 1);
    }

    #[test]
    fn receive_after_build_is_invalid_phase() {
        let mut b = PieceTableBuilder::new();
        b.build().unwrap();
        assert!(matches!(b.receive("x"), Err(Error::InvalidPhase(_))));
    }

    #[test]
    fn create_before_build_is_invalid_phase() {
        let mut b = PieceTableBuilder::new();
        assert!(matches!(
            b.create(BuilderConfig::default()),
            Err(Error::InvalidPhase(_))
        ));
    }

    #[test]
    fn double_build_is_invalid_phase() {
        let mut b = PieceTableBuilder::new();
        b.build().unwrap();
        assert!(matches!(b.build(), Err(Error::InvalidPhase(_))));
    }

    #[test]
    fn double_create_is_invalid_phase() {
        let mut b = PieceTableBuilder::new();
        b.build().unwrap();
        b.create(BuilderConfig::default()).unwrap();
        assert!(matches!(
            b.create(BuilderConfig::default()),
            Err(Error::InvalidPhase(_))
        ));
    }

    #[test]
    fn simple_two_chunk_document() {
        let mut b = PieceTableBuilder::new();
        b.receive("hello ").unwrap();
        b.receive("world").unwrap();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.get_content(), "hello world");
    }

    #[test]
    fn split_crlf_across_chunks_counts_one_terminator() {
        let mut b = PieceTableBuilder::new();
        b.receive("ab\r").unwrap();
        b.receive("\ncd").unwrap();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.get_content(), "ab\r\ncd");
        assert_eq!(table.line_count(), 2);
    }

    #[test]
    fn trailing_incomplete_utf8_sequence_is_withheld_to_next_chunk() {
        // 'a' (1 byte) + e-acute (2 bytes) fed as raw bytes split right
        // after the e-acute's lead byte, which &str can't represent
        // directly, so this drives the detector at the byte level.
        let s = "a\u{00e9}b";
        let bytes = s.as_bytes();
        assert_eq!(trailing_incomplete_utf8(&bytes[..2]), Some(1));
        assert_eq!(trailing_incomplete_utf8(bytes), None);
    }

    #[test]
    fn multi_chunk_document_with_utf8_content_round_trips() {
        let mut b = PieceTableBuilder::new();
        b.receive("caf\u{00e9} ").unwrap();
        b.receive("au lait").unwrap();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.get_content(), "caf\u{00e9} au lait");
    }

    #[test]
    fn trailing_lone_cr_is_flushed_on_build() {
        let mut b = PieceTableBuilder::new();
        b.receive("ab\r").unwrap();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.get_content(), "ab\r");
    }

    #[test]
    fn eol_majority_vote_picks_crlf() {
        let mut b = PieceTableBuilder::new();
        b.receive("a\r\nb\r\nc\n").unwrap();
        b.build().unwrap();
        let table = b
            .create(BuilderConfig {
                normalize_eol: true,
                ..BuilderConfig::default()
            })
            .unwrap();
        assert_eq!(table.get_content(), "a\r\nb\r\nc\r\n");
    }

    #[test]
    fn eol_majority_vote_picks_lf() {
        let mut b = PieceTableBuilder::new();
        b.receive("a\nb\nc\r\n").unwrap();
        b.build().unwrap();
        let table = b
            .create(BuilderConfig {
                normalize_eol: true,
                ..BuilderConfig::default()
            })
            .unwrap();
        assert_eq!(table.get_content(), "a\nb\nc\n");
    }

    #[test]
    fn force_eol_ignores_vote() {
        let mut b = PieceTableBuilder::new();
        b.receive("a\nb\nc\n").unwrap();
        b.build().unwrap();
        let table = b
            .create(BuilderConfig {
                normalize_eol: true,
                default_eol: Eol::Crlf,
                force_eol: true,
            })
            .unwrap();
        assert_eq!(table.get_content(), "a\r\nb\r\nc\r\n");
    }

    #[test]
    fn no_terminators_uses_default_eol() {
        let mut b = PieceTableBuilder::new();
        b.receive("abc").unwrap();
        b.build().unwrap();
        let table = b.create(BuilderConfig::default()).unwrap();
        assert_eq!(table.get_content(), "abc");
    }
}
