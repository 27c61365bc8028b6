//! The piece-table document: an append-only added buffer plus an immutable
//! original buffer, indexed by [`crate::tree::Tree`] in document order.

use log::trace;

use crate::buffer::Buffer;
use crate::char_class::{lf_count_in_range, CR, LF};
use crate::error::{Error, Result};
use crate::piece::{BufferCursor, Piece};
use crate::tree::{Tree, NIL};
use crate::types::Position;

/// `lf_count_in_range` tallies terminators by counting `line_starts` entries
/// that fall inside a range, which assumes a CR and its paired LF are never
/// separated. Splitting or trimming a piece so that it ends exactly between
/// an intact CR and the LF that follows it breaks that assumption: the CR is
/// no longer paired with anything inside this fragment, and its owning
/// buffer's `line_starts` has no entry for a lone CR there (the recorded
/// entry sits one byte further, at the LF, which now falls outside the
/// fragment). Patching `lf_count` to account for it is not enough on its own
/// — `nth_terminator_end` and friends index `line_starts` directly and would
/// still look past the fragment. `split_off_straddling_cr` below is the real
/// fix: it carves the CR out into its own marker piece.
fn straddles_crlf(buf: &Buffer, end_offset: usize) -> bool {
    let bytes = buf.content.as_bytes();
    end_offset > 0 && bytes.get(end_offset - 1) == Some(&CR) && bytes.get(end_offset) == Some(&LF)
}

/// A mutable text document backed by a piece table.
///
/// `buffers[0..n]` are the original buffers built once at construction time
/// (one per chunk the document was assembled from) and never mutated again;
/// one further buffer, the added buffer, is created lazily on the first
/// insert and only ever grows by appending. Every piece in the tree names a
/// slice of one of these.
#[derive(Debug, Clone)]
pub struct PieceTable {
    buffers: Vec<Buffer>,
    added_buffer_index: Option<usize>,
    tree: Tree,
    buffer_length: usize,
    line_feed_count: usize,
}

impl PieceTable {
    /// Builds a table over a single `original` buffer, with no content in
    /// the added buffer yet. Prefer [`crate::builder::PieceTableBuilder`]
    /// for multi-chunk ingestion with EOL normalization.
    pub fn from_original(original: Buffer) -> Self {
        Self::from_buffers(vec![original])
    }

    /// Builds a table whose initial tree holds one piece per non-empty
    /// buffer in `buffers`, in order. Used by
    /// [`crate::builder::PieceTableBuilder::create`], which hands over one
    /// `Buffer` per received chunk.
    pub fn from_buffers(buffers: Vec<Buffer>) -> Self {
        let mut tree = Tree::new();
        let mut buffer_length = 0usize;
        let mut line_feed_count = 0usize;
        let mut last = NIL;
        for (buffer_index, buffer) in buffers.iter().enumerate() {
            let length = buffer.len();
            if length == 0 {
                continue;
            }
            let lf_count = lf_count_in_range(&buffer.line_starts, 0, length);
            let start = BufferCursor::default();
            let end = buffer.position_at_offset(length);
            let piece = Piece::new(buffer_index, start, end, length, lf_count);
            last = if last == NIL {
                tree.insert_root(piece)
            } else {
                tree.insert_after(last, piece)
            };
            buffer_length += length;
            line_feed_count += lf_count;
        }
        let buffers = if buffers.is_empty() {
            vec![Buffer::new()]
        } else {
            buffers
        };
        PieceTable {
            buffers,
            added_buffer_index: None,
            tree,
            buffer_length,
            line_feed_count,
        }
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    pub fn line_count(&self) -> usize {
        self.line_feed_count + 1
    }

    fn added_buffer_index(&mut self) -> usize {
        match self.added_buffer_index {
            Some(idx) => idx,
            None => {
                let idx = self.buffers.len();
                self.buffers.push(Buffer::new());
                self.added_buffer_index = Some(idx);
                idx
            }
        }
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        if offset >= self.buffer_length {
            return None;
        }
        let (node, remainder) = self.tree.node_at(offset);
        if node == NIL {
            return None;
        }
        let piece = *self.tree.piece(node);
        let buf = &self.buffers[piece.buffer_index];
        let start = buf.offset_at_cursor(piece.start);
        Some(buf.content.as_bytes()[start + remainder])
    }

    // -- reads ---------------------------------------------------------------

    fn slice_raw(&self, start: usize, end: usize) -> String {
        if start >= end {
            return String::new();
        }
        let mut out = String::with_capacity(end - start);
        let (mut node, mut rem) = self.tree.node_at(start);
        let mut remaining = end - start;
        while node != NIL && remaining > 0 {
            let piece = *self.tree.piece(node);
            let buf = &self.buffers[piece.buffer_index];
            let piece_start = buf.offset_at_cursor(piece.start);
            let avail = piece.length - rem;
            let take = avail.min(remaining);
            let from = piece_start + rem;
            out.push_str(&buf.content[from..from + take]);
            remaining -= take;
            rem = 0;
            node = self.tree.successor(node);
        }
        out
    }

    pub fn get_raw_content(&self) -> String {
        self.slice_raw(0, self.buffer_length)
    }

    pub fn get_content(&self) -> String {
        self.get_raw_content()
    }

    /// Offset immediately after the `n`-th line terminator (`n >= 1`), i.e.
    /// the start offset of line `n`. `nth_terminator_end(0)` is always `0`.
    fn nth_terminator_end(&self, n: usize) -> Option<usize> {
        if n == 0 {
            return Some(0);
        }
        let mut x = self.tree.root();
        let mut doc_offset = 0usize;
        let mut remaining = n;
        loop {
            if x == NIL {
                return None;
            }
            let left_lf = self.tree.left_lf(x);
            if remaining <= left_lf {
                x = self.tree.left(x);
                continue;
            }
            let piece = *self.tree.piece(x);
            if remaining <= left_lf + piece.lf_count {
                let local_n = remaining - left_lf;
                let piece_start_doc_offset = doc_offset + self.tree.left_len(x);
                let buf = &self.buffers[piece.buffer_index];
                let target_line = piece.start.line + local_n;
                let piece_start_buf_offset = buf.offset_at_cursor(piece.start);
                let abs_buf_offset = buf.line_starts[target_line];
                return Some(piece_start_doc_offset + (abs_buf_offset - piece_start_buf_offset));
            }
            doc_offset += self.tree.left_len(x) + piece.length;
            remaining -= left_lf + piece.lf_count;
            x = self.tree.right(x);
        }
    }

    fn line_start_offset(&self, line: usize) -> Option<usize> {
        if line == 0 {
            Some(0)
        } else {
            self.nth_terminator_end(line)
        }
    }

    fn line_bounds_raw(&self, line: usize) -> Result<(usize, usize)> {
        let line_count = self.line_count();
        if line >= line_count {
            return Err(Error::LineOutOfRange { line, line_count });
        }
        let start = self.line_start_offset(line).unwrap_or(self.buffer_length);
        let end = if line + 1 >= line_count {
            self.buffer_length
        } else {
            self.line_start_offset(line + 1).unwrap_or(self.buffer_length)
        };
        Ok((start, end))
    }

    pub fn get_raw_line(&self, line: usize) -> Result<String> {
        let (start, end) = self.line_bounds_raw(line)?;
        Ok(self.slice_raw(start, end))
    }

    pub fn get_line(&self, line: usize) -> Result<String> {
        let mut raw = self.get_raw_line(line)?;
        if raw.ends_with("\r\n") {
            raw.truncate(raw.len() - 2);
        } else if raw.ends_with('\n') || raw.ends_with('\r') {
            raw.truncate(raw.len() - 1);
        }
        Ok(raw)
    }

    pub fn get_raw_line_length(&self, line: usize) -> Result<usize> {
        let (start, end) = self.line_bounds_raw(line)?;
        Ok(end - start)
    }

    pub fn get_line_length(&self, line: usize) -> Result<usize> {
        Ok(self.get_line(line)?.len())
    }

    pub fn get_text_in_range(&self, start: usize, end: usize) -> Result<String> {
        if end > self.buffer_length {
            return Err(Error::OutOfRange {
                offset: end,
                length: self.buffer_length,
            });
        }
        if start > end {
            return Err(Error::OutOfRange {
                offset: start,
                length: self.buffer_length,
            });
        }
        Ok(self.slice_raw(start, end))
    }

    pub fn offset_at(&self, line: usize, column: usize) -> Result<usize> {
        let (start, end) = self.line_bounds_raw(line)?;
        let column = column.min(end - start);
        Ok(start + column)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.buffer_length);
        if self.tree.is_empty() {
            return Position::new(0, 0);
        }
        let (node, remainder) = self.tree.node_at(offset);
        let piece = *self.tree.piece(node);
        let buf = &self.buffers[piece.buffer_index];
        let piece_start_buf_offset = buf.offset_at_cursor(piece.start);
        let buf_pos = buf.position_at_offset(piece_start_buf_offset + remainder);
        let doc_line = self.tree.prefix_lf(node) + (buf_pos.line - piece.start.line);
        let line_start = self.line_start_offset(doc_line).unwrap_or(0);
        Position::new(doc_line, offset - line_start)
    }

    pub fn char_code_at_offset(&self, offset: usize) -> Result<u8> {
        self.byte_at(offset).ok_or(Error::OutOfRange {
            offset,
            length: self.buffer_length,
        })
    }

    pub fn char_code_at_position(&self, line: usize, column: usize) -> Result<u8> {
        let offset = self.offset_at(line, column)?;
        self.char_code_at_offset(offset)
    }

    /// Pre-order visit of every piece in the tree. Unlike every other read
    /// here, this is not document order — it mirrors the tree's own shape
    /// and is meant for whole-tree maintenance passes, not for reconstructing
    /// text.
    pub fn for_each<F: FnMut(&Piece)>(&self, mut f: F) {
        for idx in self.tree.preorder() {
            f(self.tree.piece(idx));
        }
    }

    // -- mutation --------------------------------------------------------------

    /// Appends `text` to the added buffer and returns a piece naming exactly
    /// that slice. Unlike patching an existing piece's `lf_count` by hand,
    /// this piece's `lf_count` and navigability both come from the added
    /// buffer's own freshly extended `line_starts`, so it is always
    /// consistent with `nth_terminator_end` and friends.
    fn append_marker_piece(&mut self, text: &str) -> Piece {
        let added_idx = self.added_buffer_index();
        let append_base = self.buffers[added_idx].len();
        let stats = self.buffers[added_idx].append(text);
        let start_cursor = self.buffers[added_idx].position_at_offset(append_base);
        let end_cursor = self.buffers[added_idx].position_at_offset(append_base + text.len());
        Piece::new(added_idx, start_cursor, end_cursor, text.len(), stats.total())
    }

    /// Builds the piece for buffer `buffer_index`'s run `[start, end_offset)`,
    /// splitting off a trailing CR into its own marker piece when
    /// `end_offset` straddles an intact CRLF (see `straddles_crlf`). The main
    /// piece may come back empty (`length == 0`) when the whole run was that
    /// one CR; callers must handle that instead of inserting an empty piece.
    fn split_off_straddling_cr(
        &mut self,
        buffer_index: usize,
        start: BufferCursor,
        end_offset: usize,
    ) -> (Piece, Option<Piece>) {
        let buf = &self.buffers[buffer_index];
        let start_offset = buf.offset_at_cursor(start);
        if straddles_crlf(buf, end_offset) {
            let trimmed_end_offset = end_offset - 1;
            let trimmed_end = buf.position_at_offset(trimmed_end_offset);
            let lf = lf_count_in_range(&buf.line_starts, start_offset, trimmed_end_offset);
            let main = Piece::new(
                buffer_index,
                start,
                trimmed_end,
                trimmed_end_offset - start_offset,
                lf,
            );
            let cr = self.append_marker_piece("\r");
            (main, Some(cr))
        } else {
            let end = buf.position_at_offset(end_offset);
            let lf = lf_count_in_range(&buf.line_starts, start_offset, end_offset);
            let main = Piece::new(buffer_index, start, end, end_offset - start_offset, lf);
            (main, None)
        }
    }

    /// Shrinks `idx`'s piece by one byte at the end (dropping its last
    /// byte), recomputing `lf_count` fresh. If the piece becomes empty it is
    /// removed from the tree. Returns the removed byte's document-global
    /// line-feed contribution as the before/after delta.
    fn trim_end_by_one(&mut self, idx: crate::tree::NodeIdx) {
        let piece = *self.tree.piece(idx);
        debug_assert!(piece.length > 0);
        let buf = &self.buffers[piece.buffer_index];
        let old_end_offset = buf.offset_at_cursor(piece.end);
        let new_end_offset = old_end_offset - 1;
        let new_end = buf.position_at_offset(new_end_offset);
        if piece.length == 1 {
            self.line_feed_count -= piece.lf_count;
            self.tree.delete(idx);
            return;
        }
        let new_length = piece.length - 1;
        let new_lf = lf_count_in_range(
            &buf.line_starts,
            buf.offset_at_cursor(piece.start),
            new_end_offset,
        );
        self.line_feed_count -= piece.lf_count - new_lf;
        let new_piece = Piece::new(piece.buffer_index, piece.start, new_end, new_length, new_lf);
        self.tree.set_piece(idx, new_piece);
    }

    /// Shrinks `idx`'s piece by one byte at the start (dropping its first
    /// byte), recomputing `lf_count` fresh. Removes the piece if it becomes
    /// empty.
    fn trim_start_by_one(&mut self, idx: crate::tree::NodeIdx) {
        let piece = *self.tree.piece(idx);
        debug_assert!(piece.length > 0);
        let buf = &self.buffers[piece.buffer_index];
        let old_start_offset = buf.offset_at_cursor(piece.start);
        let new_start_offset = old_start_offset + 1;
        let new_start = buf.position_at_offset(new_start_offset);
        if piece.length == 1 {
            self.line_feed_count -= piece.lf_count;
            self.tree.delete(idx);
            return;
        }
        let new_length = piece.length - 1;
        let new_lf = lf_count_in_range(
            &buf.line_starts,
            new_start_offset,
            buf.offset_at_cursor(piece.end),
        );
        self.line_feed_count -= piece.lf_count - new_lf;
        let new_piece = Piece::new(piece.buffer_index, new_start, piece.end, new_length, new_lf);
        self.tree.set_piece(idx, new_piece);
    }

    /// Inserts `text` at document offset `offset`.
    pub fn insert_at(&mut self, offset: usize, text: &str) -> Result<()> {
        if offset > self.buffer_length {
            return Err(Error::OutOfRange {
                offset,
                length: self.buffer_length,
            });
        }
        if text.is_empty() {
            return Ok(());
        }

        let mut insertion_offset = offset;
        let mut text_owned: String;
        let text_to_append: &str;

        let left_byte = if offset > 0 { self.byte_at(offset - 1) } else { None };
        let right_byte = self.byte_at(offset);

        // A byte trimmed off a neighbor below is not new document content —
        // it is relocated into `text_to_append`, not duplicated — so it must
        // not also be counted when `buffer_length` grows by the appended
        // text's length further down.
        let mut moved_from_neighbor = 0usize;

        if text.as_bytes()[0] == LF && left_byte == Some(CR) {
            let (pred_node, _) = self.tree.node_at(offset.saturating_sub(1));
            self.trim_end_by_one(pred_node);
            moved_from_neighbor = 1;
            insertion_offset = offset - 1;
            text_owned = String::with_capacity(text.len() + 1);
            text_owned.push('\r');
            text_owned.push_str(text);
            text_to_append = &text_owned;
        } else if text.as_bytes()[text.len() - 1] == CR && right_byte == Some(LF) {
            let (succ_node, _) = self.tree.node_at(offset);
            self.trim_start_by_one(succ_node);
            moved_from_neighbor = 1;
            text_owned = String::with_capacity(text.len() + 1);
            text_owned.push_str(text);
            text_owned.push('\n');
            text_to_append = &text_owned;
        } else {
            text_owned = String::new();
            text_to_append = text;
        }

        let added_idx = self.added_buffer_index();
        let append_base = self.buffers[added_idx].len();
        let stats = self.buffers[added_idx].append(text_to_append);
        let start_cursor = self.buffers[added_idx].position_at_offset(append_base);
        let end_cursor = self
            .buffers[added_idx]
            .position_at_offset(append_base + text_to_append.len());
        let new_piece = Piece::new(
            added_idx,
            start_cursor,
            end_cursor,
            text_to_append.len(),
            stats.total(),
        );

        self.buffer_length += text_to_append.len() - moved_from_neighbor;
        self.line_feed_count += stats.total();

        if self.tree.is_empty() {
            trace!("insert_at: empty tree, inserting root");
            self.tree.insert_root(new_piece);
        } else {
            let (node, remainder) = self.tree.node_at(insertion_offset);
            if node == NIL {
                let last = self.tree.subtree_max(self.tree.root());
                self.tree.insert_after(last, new_piece);
            } else if remainder == 0 {
                self.tree.insert_before(node, new_piece);
            } else {
                let piece = *self.tree.piece(node);
                if remainder == piece.length {
                    self.tree.insert_after(node, new_piece);
                } else {
                    trace!("insert_at: splitting piece at interior offset");
                    let buf = &self.buffers[piece.buffer_index];
                    let split_offset = buf.offset_at_cursor(piece.start) + remainder;
                    let split_cursor = buf.position_at_offset(split_offset);
                    let right_lf = lf_count_in_range(
                        &buf.line_starts,
                        split_offset,
                        buf.offset_at_cursor(piece.end),
                    );
                    let right_piece = Piece::new(
                        piece.buffer_index,
                        split_cursor,
                        piece.end,
                        piece.length - remainder,
                        right_lf,
                    );
                    let (left_piece, cr_piece) =
                        self.split_off_straddling_cr(piece.buffer_index, piece.start, split_offset);
                    if let Some(cr) = cr_piece {
                        self.line_feed_count += cr.lf_count;
                    }

                    let left_is_empty = left_piece.is_empty();
                    if left_is_empty {
                        self.tree
                            .set_piece(node, cr_piece.expect("empty left piece implies a split-off CR"));
                    } else {
                        self.tree.set_piece(node, left_piece);
                    }
                    self.tree.insert_after(node, right_piece);
                    self.tree.insert_after(node, new_piece);
                    if !left_is_empty {
                        if let Some(cr) = cr_piece {
                            self.tree.insert_after(node, cr);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Deletes `[offset, offset + length)`.
    pub fn delete_at(&mut self, offset: usize, length: usize) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        let end = offset
            .checked_add(length)
            .ok_or(Error::OutOfRange { offset, length: self.buffer_length })?;
        if end > self.buffer_length {
            return Err(Error::OutOfRange {
                offset: end,
                length: self.buffer_length,
            });
        }

        let (start_node, start_rem) = self.tree.node_at(offset);
        let (end_node, end_rem) = self.tree.node_at(end);

        if start_node == end_node && start_node != NIL {
            let piece = *self.tree.piece(start_node);
            let buf_idx = piece.buffer_index;
            let buf = &self.buffers[buf_idx];
            let piece_start_offset = buf.offset_at_cursor(piece.start);
            let left_len = start_rem;
            let right_len = piece.length - end_rem;
            if left_len == 0 && right_len == 0 {
                self.line_feed_count -= piece.lf_count;
                self.tree.delete(start_node);
            } else if left_len == 0 {
                self.trim_start_by_one_n(start_node, end_rem);
            } else if right_len == 0 {
                self.trim_end_by_one_n(start_node, left_len);
            } else {
                let split_offset_left = piece_start_offset + left_len;
                let split_offset_right = piece_start_offset + end_rem;
                let right_cursor = buf.position_at_offset(split_offset_right);
                let right_lf = lf_count_in_range(&buf.line_starts, split_offset_right, buf.offset_at_cursor(piece.end));
                let right_piece = Piece::new(piece.buffer_index, right_cursor, piece.end, right_len, right_lf);

                let (left_piece, cr_piece) =
                    self.split_off_straddling_cr(piece.buffer_index, piece.start, split_offset_left);
                let mut kept_lf = left_piece.lf_count + right_lf;
                if let Some(cr) = cr_piece {
                    kept_lf += cr.lf_count;
                }
                let delta = kept_lf as isize - piece.lf_count as isize;
                self.line_feed_count = (self.line_feed_count as isize + delta) as usize;

                let left_is_empty = left_piece.is_empty();
                if left_is_empty {
                    self.tree
                        .set_piece(start_node, cr_piece.expect("empty left piece implies a split-off CR"));
                } else {
                    self.tree.set_piece(start_node, left_piece);
                }
                self.tree.insert_after(start_node, right_piece);
                if !left_is_empty {
                    if let Some(cr) = cr_piece {
                        self.tree.insert_after(start_node, cr);
                    }
                }
            }
            self.buffer_length -= length;
            self.repair_crlf_seam_at(offset);
            return Ok(());
        }

        // Deletion spans multiple pieces: trim the boundary pieces, then
        // remove every whole piece strictly between them.
        let mut victims = Vec::new();
        if start_node != NIL {
            let mut n = self.tree.successor(start_node);
            while n != NIL && n != end_node {
                victims.push(n);
                n = self.tree.successor(n);
            }
        }

        if start_node != NIL {
            let piece = *self.tree.piece(start_node);
            if start_rem == 0 {
                self.line_feed_count -= piece.lf_count;
                self.tree.delete(start_node);
            } else if start_rem < piece.length {
                self.trim_end_by_one_n(start_node, start_rem);
            }
        }

        for n in victims {
            let piece = *self.tree.piece(n);
            self.line_feed_count -= piece.lf_count;
            self.tree.delete(n);
        }

        if end_node != NIL {
            let piece = *self.tree.piece(end_node);
            if end_rem > 0 {
                self.trim_start_by_one_n(end_node, end_rem);
            }
        }

        self.buffer_length -= length;
        self.repair_crlf_seam_at(offset);
        Ok(())
    }

    /// Shrinks a piece to its first `keep` bytes (`0 < keep < length`),
    /// splitting a trailing straddling CR into its own marker piece (see
    /// `split_off_straddling_cr`) so it stays navigable.
    fn trim_end_by_one_n(&mut self, idx: crate::tree::NodeIdx, keep: usize) {
        let piece = *self.tree.piece(idx);
        debug_assert!(keep > 0 && keep < piece.length);
        let end_offset = self.buffers[piece.buffer_index].offset_at_cursor(piece.start) + keep;
        let (main, cr_piece) = self.split_off_straddling_cr(piece.buffer_index, piece.start, end_offset);

        let mut kept_lf = main.lf_count;
        if let Some(cr) = cr_piece {
            kept_lf += cr.lf_count;
        }
        let delta = kept_lf as isize - piece.lf_count as isize;
        self.line_feed_count = (self.line_feed_count as isize + delta) as usize;

        if main.is_empty() {
            self.tree
                .set_piece(idx, cr_piece.expect("empty main piece implies a split-off CR"));
        } else {
            self.tree.set_piece(idx, main);
            if let Some(cr) = cr_piece {
                self.tree.insert_after(idx, cr);
            }
        }
    }

    /// Shrinks a piece to its last `keep` bytes by dropping `length - keep`
    /// bytes from the front.
    fn trim_start_by_one_n(&mut self, idx: crate::tree::NodeIdx, drop: usize) {
        let piece = *self.tree.piece(idx);
        debug_assert!(drop > 0 && drop <= piece.length);
        let buf = &self.buffers[piece.buffer_index];
        let new_start_offset = buf.offset_at_cursor(piece.start) + drop;
        if drop == piece.length {
            self.line_feed_count -= piece.lf_count;
            self.tree.delete(idx);
            return;
        }
        let new_start = buf.position_at_offset(new_start_offset);
        let new_length = piece.length - drop;
        let new_lf = lf_count_in_range(&buf.line_starts, new_start_offset, buf.offset_at_cursor(piece.end));
        self.line_feed_count -= piece.lf_count - new_lf;
        let new_piece = Piece::new(piece.buffer_index, new_start, piece.end, new_length, new_lf);
        self.tree.set_piece(idx, new_piece);
    }

    /// After a deletion leaves two previously unrelated pieces newly
    /// adjacent, a CR ending the left one and an LF starting the right one
    /// would otherwise be counted as two terminators instead of one. Since
    /// deletion (unlike insert) has no fresh text to fold the CR into,
    /// materialize a small "\r\n" piece in the added buffer that owns the
    /// merged terminator, and trim both neighbors by the byte they no
    /// longer contribute.
    fn repair_crlf_seam_at(&mut self, offset: usize) {
        if offset == 0 || offset >= self.buffer_length {
            return;
        }
        let left_byte = self.byte_at(offset - 1);
        let right_byte = self.byte_at(offset);
        if left_byte != Some(CR) || right_byte != Some(LF) {
            return;
        }
        let (left_node, _) = self.tree.node_at(offset - 1);
        let (right_node, _) = self.tree.node_at(offset);
        if left_node == NIL || right_node == NIL || left_node == right_node {
            return;
        }
        trace!("repairing CRLF seam created by deletion at offset {offset}");
        self.trim_end_by_one(left_node);
        self.trim_start_by_one(right_node);

        let piece = self.append_marker_piece("\r\n");
        self.line_feed_count += piece.lf_count;

        // Re-locate the (possibly now-removed) left node's predecessor to
        // splice the merged piece in at the correct spot.
        let (anchor, rem) = self.tree.node_at(offset - 1);
        if anchor != NIL && rem == 0 {
            self.tree.insert_before(anchor, piece);
        } else if anchor != NIL {
            self.tree.insert_after(anchor, piece);
        } else {
            let last = self.tree.subtree_max(self.tree.root());
            if last == NIL {
                self.tree.insert_root(piece);
            } else {
                self.tree.insert_after(last, piece);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(s: &str) -> PieceTable {
        PieceTable::from_original(Buffer::from_text(s))
    }

    #[test]
    fn empty_document_has_one_line() {
        let t = table("");
        assert_eq!(t.buffer_length(), 0);
        assert_eq!(t.line_count(), 1);
        assert_eq!(t.get_content(), "");
    }

    #[test]
    fn from_original_counts_lines() {
        let t = table("ab\ncd\nef");
        assert_eq!(t.line_count(), 3);
        assert_eq!(t.get_line(0).unwrap(), "ab");
        assert_eq!(t.get_line(1).unwrap(), "cd");
        assert_eq!(t.get_line(2).unwrap(), "ef");
    }

    #[test]
    fn insert_into_empty_document() {
        let mut t = table("");
        t.insert_at(0, "hello").unwrap();
        assert_eq!(t.get_content(), "hello");
        assert_eq!(t.buffer_length(), 5);
    }

    #[test]
    fn insert_at_interior_splits_piece() {
        let mut t = table("hello world");
        t.insert_at(5, ",") .unwrap();
        assert_eq!(t.get_content(), "hello, world");
    }

    #[test]
    fn insert_at_start_and_end() {
        let mut t = table("bc");
        t.insert_at(0, "a").unwrap();
        t.insert_at(3, "d").unwrap();
        assert_eq!(t.get_content(), "abcd");
    }

    #[test]
    fn insert_crlf_seam_counts_one_line_break() {
        let mut t = table("ab\r");
        t.insert_at(3, "\ncd").unwrap();
        assert_eq!(t.get_content(), "ab\r\ncd");
        assert_eq!(t.line_count(), 2);
    }

    #[test]
    fn insert_crlf_seam_from_the_right_side() {
        let mut t = table("\ncd");
        t.insert_at(0, "ab\r").unwrap();
        assert_eq!(t.get_content(), "ab\r\ncd");
        assert_eq!(t.line_count(), 2);
    }

    #[test]
    fn delete_whole_document() {
        let mut t = table("hello");
        t.delete_at(0, 5).unwrap();
        assert_eq!(t.get_content(), "");
        assert_eq!(t.line_count(), 1);
    }

    #[test]
    fn delete_interior_range_within_one_piece() {
        let mut t = table("hello world");
        t.delete_at(5, 1).unwrap();
        assert_eq!(t.get_content(), "helloworld");
    }

    #[test]
    fn delete_across_multiple_pieces() {
        let mut t = table("ab");
        t.insert_at(2, "cd").unwrap();
        t.insert_at(4, "ef").unwrap();
        assert_eq!(t.get_content(), "abcdef");
        t.delete_at(1, 4).unwrap();
        assert_eq!(t.get_content(), "af");
    }

    #[test]
    fn delete_merges_previously_separate_cr_and_lf_into_one_terminator() {
        // "a\rX\nb" has two independent terminators: a lone CR ending line 0
        // and a lone LF ending line 1, so line_count = 3. Deleting the "X"
        // between them makes the CR and LF textually adjacent; that pair
        // must now be recognized as a single CRLF terminator, not two.
        let mut t = table("a\rX\nb");
        assert_eq!(t.line_count(), 3);
        t.delete_at(2, 1).unwrap();
        assert_eq!(t.get_content(), "a\r\nb");
        assert_eq!(t.line_count(), 2);
    }

    #[test]
    fn insert_landing_between_an_existing_cr_and_lf_splits_it_into_two_terminators() {
        // "a\r\nb" has one CRLF terminator (line_count = 2). Inserting "X"
        // exactly between the CR and the LF can no longer keep them paired:
        // the CR now ends a line of its own and the LF starts a new one, so
        // the terminator count goes from 1 to 2 and line_count from 2 to 3.
        let mut t = table("a\r\nb");
        assert_eq!(t.line_count(), 2);
        t.insert_at(2, "X").unwrap();
        assert_eq!(t.get_content(), "a\rX\nb");
        assert_eq!(t.line_count(), 3);
    }

    #[test]
    fn straddling_split_leaves_line_boundaries_navigable() {
        // Splitting "a\r\nb" between its CR and LF must not just bump
        // lf_count on the old piece: get_raw_line and line_start_offset have
        // to agree on where the now-lone CR's terminator actually ends.
        let mut t = table("a\r\nb");
        t.insert_at(2, "X").unwrap();
        assert_eq!(t.get_content(), "a\rX\nb");
        assert_eq!(t.get_raw_line(0).unwrap(), "a\r");
        assert_eq!(t.get_raw_line(1).unwrap(), "X\n");
        assert_eq!(t.get_raw_line(2).unwrap(), "b");
    }

    #[test]
    fn straddling_split_via_delete_leaves_line_boundaries_navigable() {
        // Deleting the middle of "a\r\nXXb" so the cut lands between the CR
        // and the LF exercises the same straddle case from delete_at's
        // same-node split path.
        let mut t = table("a\r\nXXb");
        t.delete_at(2, 2).unwrap();
        assert_eq!(t.get_content(), "a\rXb");
        assert_eq!(t.get_raw_line(0).unwrap(), "a\r");
        assert_eq!(t.get_raw_line(1).unwrap(), "Xb");
    }

    #[test]
    fn insert_crlf_seam_does_not_double_count_the_moved_byte() {
        let mut t = table("ab\r");
        t.insert_at(3, "\ncd").unwrap();
        assert_eq!(t.get_content(), "ab\r\ncd");
        assert_eq!(t.buffer_length(), 6);
    }

    #[test]
    fn insert_crlf_seam_from_the_right_does_not_double_count_the_moved_byte() {
        let mut t = table("\ncd");
        t.insert_at(0, "ab\r").unwrap();
        assert_eq!(t.get_content(), "ab\r\ncd");
        assert_eq!(t.buffer_length(), 6);
    }

    #[test]
    fn offset_at_clamps_into_the_terminator_not_just_up_to_it() {
        let t = table("ab\r\ncd");
        // Line 0 is "ab\r\n" (raw length 4, non-raw length 2); a column past
        // the non-raw length but within the terminator must still resolve
        // to a real offset inside line 0, not spill into line 1.
        assert_eq!(t.offset_at(0, 4).unwrap(), 4);
        assert_eq!(t.offset_at(0, 100).unwrap(), 4);
    }

    #[test]
    fn offset_and_position_round_trip() {
        let t = table("ab\ncdef\ngh");
        for offset in 0..=t.buffer_length() {
            let pos = t.position_at(offset);
            let back = t.offset_at(pos.line, pos.column).unwrap();
            assert_eq!(back, offset, "offset {offset} -> {pos:?} -> {back}");
        }
    }

    #[test]
    fn out_of_range_offset_is_an_error() {
        let t = table("abc");
        assert!(matches!(
            t.char_code_at_offset(10),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn out_of_range_line_is_an_error() {
        let t = table("abc");
        assert!(matches!(t.get_line(5), Err(Error::LineOutOfRange { .. })));
    }

    #[test]
    fn for_each_visits_every_piece_exactly_once() {
        let mut t = table("a");
        t.insert_at(1, "b").unwrap();
        t.insert_at(0, "c").unwrap();
        let mut count = 0;
        t.for_each(|_| count += 1);
        assert_eq!(count, self_len(&t));
        fn self_len(t: &PieceTable) -> usize {
            t.tree.len()
        }
    }
}
