//! Bytecode↔source location resolution.
//!
//! The engine encodes a pc→line table per function bytecode as a byte
//! stream of records. Each record advances a running
//! `(pc, packed line/col)` cursor:
//!
//! - `op == 0`: long form, `leb128(delta_pc)` then
//!   `sleb128(delta_line_col)` applied to the packed word;
//! - `op != 0`: short form, `delta_pc = (op - 1) / RANGE` and
//!   `delta_line_col = (op - 1) % RANGE + BASE`.
//!
//! Line and column travel as one 64-bit packed word: low 40 bits
//! column, 22 bits line above it, 2-bit type tag at the top.

use crate::engine::BytecodeInfo;

const PC2LINE_OP_FIRST: u8 = 1;
const PC2LINE_RANGE: i64 = 5;
const PC2LINE_BASE: i64 = -1;

const COLUMN_BITS: u32 = 40;
const LINE_BITS: u32 = 22;
const COLUMN_MASK: u64 = (1 << COLUMN_BITS) - 1;
const LINE_MASK: u64 = (1 << LINE_BITS) - 1;

/// Extract `(line, column)` from a packed line/col word, ignoring the
/// tag bits.
pub fn unpack_line_col(packed: u64) -> (u32, u32) {
    let column = (packed & COLUMN_MASK) as u32;
    let line = ((packed >> COLUMN_BITS) & LINE_MASK) as u32;
    (line, column)
}

/// Inverse of [`unpack_line_col`], with a zero tag.
pub fn pack_line_col(line: u32, column: u32) -> u64 {
    ((line as u64 & LINE_MASK) << COLUMN_BITS) | (column as u64 & COLUMN_MASK)
}

fn read_leb128(buf: &[u8], idx: &mut usize) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *buf.get(*idx)?;
        *idx += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

fn read_sleb128(buf: &[u8], idx: &mut usize) -> Option<i64> {
    let mut value: i64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *buf.get(*idx)?;
        *idx += 1;
        value |= i64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                value |= -1i64 << shift;
            }
            return Some(value);
        }
        if shift >= 64 {
            return None;
        }
    }
}

/// Append one table record, choosing the short form when the deltas
/// fit. Used by table producers (the engine writes tables in this
/// format; tests build fixtures with it).
pub fn encode_record(buf: &mut Vec<u8>, delta_pc: u32, delta_line_col: i64) {
    let diff = delta_line_col - PC2LINE_BASE;
    if (0..PC2LINE_RANGE).contains(&diff) {
        let op = i64::from(delta_pc) * PC2LINE_RANGE + diff + i64::from(PC2LINE_OP_FIRST);
        if op <= 255 {
            buf.push(op as u8);
            return;
        }
    }
    buf.push(0);
    let mut pc = delta_pc as u64;
    loop {
        let mut byte = (pc & 0x7f) as u8;
        pc >>= 7;
        if pc != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if pc == 0 {
            break;
        }
    }
    let mut v = delta_line_col;
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        let sign = byte & 0x40 != 0;
        if (v == 0 && !sign) || (v == -1 && sign) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// One resolved `(pc, line, column)` triple.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LinePoint {
    pub pc: u32,
    pub line: u32,
    pub column: u32,
}

/// Decode the full table into points, starting from the function's own
/// start position at pc 0. Decoding stops at the first malformed
/// record.
pub fn line_table_points(info: &BytecodeInfo) -> Vec<LinePoint> {
    let (line, column) = unpack_line_col(info.start_pos);
    let mut points = vec![LinePoint { pc: 0, line, column }];
    let mut pc: u32 = 0;
    let mut pos = info.start_pos as i64;
    let buf = &info.pc_to_line;
    let mut idx = 0usize;
    while idx < buf.len() {
        let op = buf[idx];
        idx += 1;
        let (delta_pc, delta_pos) = if op == 0 {
            let Some(dp) = read_leb128(buf, &mut idx) else {
                break;
            };
            let Some(dl) = read_sleb128(buf, &mut idx) else {
                break;
            };
            (dp as u32, dl)
        } else {
            let op = i64::from(op - PC2LINE_OP_FIRST);
            ((op / PC2LINE_RANGE) as u32, op % PC2LINE_RANGE + PC2LINE_BASE)
        };
        pc = pc.wrapping_add(delta_pc);
        pos = pos.wrapping_add(delta_pos);
        let (line, column) = unpack_line_col(pos as u64);
        points.push(LinePoint { pc, line, column });
    }
    points
}

/// Line/column for a given pc: the last table point at or before it.
pub fn resolve_pc(info: &BytecodeInfo, pc: u32) -> LinePoint {
    let points = line_table_points(info);
    let mut current = points[0];
    for point in points {
        if point.pc > pc {
            break;
        }
        current = point;
    }
    current
}

/// All table points whose source position falls inside the inclusive
/// `[start, end]` window, for `getPossibleBreakpoints`.
pub fn points_in_window(
    info: &BytecodeInfo,
    start: (u32, u32),
    end: (u32, u32),
) -> Vec<LinePoint> {
    line_table_points(info)
        .into_iter()
        .filter(|p| {
            let at = (p.line, p.column);
            at >= start && at <= end
        })
        .collect()
}

/// Nearest candidate at or after `(line, column)` that does not precede
/// the function's own start. Ties break on smaller line, then smaller
/// column.
pub fn nearest_candidate(info: &BytecodeInfo, line: u32, column: u32) -> Option<LinePoint> {
    let start = unpack_line_col(info.start_pos);
    let wanted = (line, column);
    let mut best: Option<LinePoint> = None;
    for point in line_table_points(info) {
        let at = (point.line, point.column);
        if at < wanted || at < start {
            continue;
        }
        match best {
            Some(b) if (b.line, b.column) <= at => {}
            _ => best = Some(point),
        }
    }
    best
}
