//! Z-string codec and ZSCII output
//!
//! Strings are sequences of 16 bit words holding three 5 bit codes each,
//! the last word flagged by its top bit. Codes 6-31 select a character from
//! one of three alphabets; the low codes are space, shifts and abbreviation
//! (synonym) references. Versions 1 and 2 have locking shifts, later
//! versions only one-shot shifts.

use crate::display_trait::Host;
use crate::error::ZError;
use crate::header::{Header, H_FLAGS, SCRIPTING_FLAG};
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::{debug, trace};

/// The three alphabets: lowercase, uppercase and punctuation. Entry 0 of
/// the punctuation row is the ZSCII escape and entry 1 a newline.
pub const LOOKUP_TABLE: [&[u8; 26]; 3] = [
    b"abcdefghijklmnopqrstuvwxyz",
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    b" \n0123456789.,!?_#'\"/\\-:()",
];

/// ZSCII newline
pub const ZSCII_NEWLINE: u8 = 13;

const MAX_NESTING: u8 = 3;

/// What the next code means, when it is not a plain character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Normal,
    /// Index into abbreviation table 1-3
    Synonym(u8),
    ZsciiHigh,
    ZsciiLow(u16),
}

/// Decode the z-string at `addr`, appending ZSCII to `out`. Returns the
/// address just past the string.
pub fn decode_text<M: AddressSpace + ?Sized>(
    mem: &mut M,
    header: &Header,
    addr: u32,
    out: &mut Vec<u8>,
) -> Result<u32, ZError> {
    decode_nested(mem, header, addr, 0, out)
}

fn decode_nested<M: AddressSpace + ?Sized>(
    mem: &mut M,
    header: &Header,
    start: u32,
    depth: u8,
    out: &mut Vec<u8>,
) -> Result<u32, ZError> {
    if depth > MAX_NESTING {
        return Err(ZError::NestedAbbreviation { addr: start });
    }

    let version = header.version;
    let mut shift_state = 0usize;
    let mut shift_lock = 0usize;
    let mut state = DecodeState::Normal;
    let mut addr = start;

    loop {
        let data = mem.get_word(addr)?;
        addr += 2;

        for shift in [10, 5, 0] {
            let code = ((data >> shift) & 0x1f) as u8;
            state = match state {
                DecodeState::Synonym(table) => {
                    let entry = header.synonyms_offset as u32
                        + (table as u32 - 1) * 64
                        + code as u32 * 2;
                    let target = mem.get_word(entry)? as u32 * 2;
                    trace!("abbreviation {}:{} at {:#06x}", table, code, target);
                    decode_nested(mem, header, target, depth + 1, out)?;
                    shift_state = shift_lock;
                    DecodeState::Normal
                }
                DecodeState::ZsciiHigh => DecodeState::ZsciiLow((code as u16) << 5),
                DecodeState::ZsciiLow(high) => {
                    out.push((high | code as u16) as u8);
                    DecodeState::Normal
                }
                DecodeState::Normal if code > 5 => {
                    let index = (code - 6) as usize;
                    let next = match (shift_state, index) {
                        (2, 0) => DecodeState::ZsciiHigh,
                        (2, 1) => {
                            out.push(ZSCII_NEWLINE);
                            DecodeState::Normal
                        }
                        _ => {
                            out.push(LOOKUP_TABLE[shift_state][index]);
                            DecodeState::Normal
                        }
                    };
                    shift_state = shift_lock;
                    next
                }
                DecodeState::Normal if code == 0 => {
                    out.push(b' ');
                    DecodeState::Normal
                }
                DecodeState::Normal if version < 3 => match code {
                    1 if version == 1 => {
                        out.push(ZSCII_NEWLINE);
                        DecodeState::Normal
                    }
                    1 => DecodeState::Synonym(1),
                    // One-shot shifts relative to the current lock
                    2 | 3 => {
                        shift_state = (shift_lock + code as usize + 2) % 3;
                        DecodeState::Normal
                    }
                    _ => {
                        shift_lock = (shift_lock + code as usize) % 3;
                        shift_state = shift_lock;
                        DecodeState::Normal
                    }
                },
                DecodeState::Normal if code < 4 => DecodeState::Synonym(code),
                DecodeState::Normal => {
                    shift_state = code as usize - 3;
                    shift_lock = 0;
                    DecodeState::Normal
                }
            };
        }

        if data & 0x8000 != 0 {
            return Ok(addr);
        }
    }
}

/// Alphabet row and code of `c`. Characters in no row map to the ZSCII
/// escape, row 2 code 0.
fn find_code(c: u8) -> (usize, u8) {
    let mut found = (2, 0);
    for (table, row) in LOOKUP_TABLE.iter().enumerate() {
        if let Some(code) = row.iter().rposition(|&x| x == c) {
            found = (table, code as u8);
        }
    }
    found
}

/// Translate `text` into z-characters for `version`, without padding
pub fn encode_zchars(text: &[u8], version: u8) -> Vec<u8> {
    let mut codes = Vec::with_capacity(text.len() * 2);
    let mut prev_table = 0;

    for (i, &c) in text.iter().enumerate() {
        if c == b' ' {
            codes.push(0);
            continue;
        }
        let (table, code) = find_code(c);

        if version < 3 {
            if table != prev_table {
                let next_table = match text.get(i + 1) {
                    Some(&next) => find_code(next).0,
                    None => 0,
                };
                let mut shift = (table + prev_table * 2) % 3;
                if shift != 0 {
                    // Lock the shift when the next character stays in this row
                    if next_table == table {
                        shift += 2;
                        prev_table = table;
                    } else {
                        prev_table = 0;
                    }
                    codes.push(shift as u8 + 1);
                }
            }
        } else if table != 0 {
            codes.push(table as u8 + 3);
        }

        codes.push(code + 6);
        if (table, code) == (2, 0) {
            codes.push((c >> 5) & 0x07);
            codes.push(c & 0x1f);
        }
    }
    codes
}

/// Pack z-characters into words, padding the last word with shift 5 and
/// marking it as the end of the string
pub fn pack_zchars(codes: &[u8]) -> Vec<u16> {
    let mut padded = codes.to_vec();
    while padded.is_empty() || padded.len() % 3 != 0 {
        padded.push(5);
    }
    let mut words: Vec<u16> = padded
        .chunks(3)
        .map(|c| ((c[0] as u16) << 10) | ((c[1] as u16) << 5) | c[2] as u16)
        .collect();
    if let Some(last) = words.last_mut() {
        *last |= 0x8000;
    }
    words
}

/// Encode up to nine z-characters into the three word dictionary form.
/// Before version 4 only the first two words are significant and the
/// second carries the end bit.
pub fn encode_text(text: &[u8], version: u8) -> [u16; 3] {
    let mut codes = encode_zchars(text, version);
    codes.resize(9, 5);
    let mut words = [0u16; 3];
    for (word, c) in words.iter_mut().zip(codes.chunks(3)) {
        *word = ((c[0] as u16) << 10) | ((c[1] as u16) << 5) | c[2] as u16;
    }
    if version < 4 {
        words[1] |= 0x8000;
    } else {
        words[2] |= 0x8000;
    }
    words
}

/// Map a ZSCII character to the bytes sent to the display. Printable ASCII
/// passes through; arrows, line drawing and German characters get ASCII
/// stand-ins, other control codes an octal escape.
pub fn translate_zchar(c: u8) -> ([u8; 4], usize) {
    match c {
        b' '..=b'~' => ([c, 0, 0, 0], 1),
        ZSCII_NEWLINE => ([b'\r', 0, 0, 0], 1),
        0 => ([0; 4], 0),
        24..=27 => ([b"\\/+-"[(c - 24) as usize], 0, 0, 0], 1),
        1..=31 => (
            [
                b'\\',
                b'0' + ((c >> 6) & 7),
                b'0' + ((c >> 3) & 7),
                b'0' + (c & 7),
            ],
            4,
        ),
        179..=218 => {
            let ascii = match c {
                179 => b'|',
                186 => b'#',
                196 => b'-',
                205 => b'=',
                _ => b'+',
            };
            ([ascii, 0, 0, 0], 1)
        }
        155..=163 => {
            let pairs = b"aeoeueAeOeUess>><<";
            let i = (c - 155) as usize * 2;
            ([pairs[i], pairs[i + 1], 0, 0], 2)
        }
        _ => ([b'?', 0, 0, 0], 1),
    }
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Output one ZSCII character to the active stream: the innermost
    /// memory table when stream 3 is open, otherwise the screen
    pub fn write_zchar(&mut self, c: u8) -> Result<(), ZError> {
        if let Some((table, count)) = self.streams.memory.last_mut() {
            let addr = *table + 2 + *count as u32;
            *count = count.wrapping_add(1);
            return self.mem.set_byte(addr, c);
        }
        if self.streams.screen_off {
            return Ok(());
        }
        let (bytes, len) = translate_zchar(c);
        for &b in &bytes[..len] {
            self.host.write_char(self.window, b)?;
        }
        Ok(())
    }

    /// 0OP:0x0B - new_line
    pub fn new_line(&mut self) -> Result<(), ZError> {
        self.write_zchar(ZSCII_NEWLINE)
    }

    /// Decode a z-string into ZSCII, returning it with the address after it
    pub fn decode_string(&mut self, addr: u32) -> Result<(Vec<u8>, u32), ZError> {
        let mut out = Vec::new();
        let next = decode_text(&mut self.mem, &self.header, addr, &mut out)?;
        Ok((out, next))
    }

    /// Print the z-string at `addr`, returning the address after it
    pub fn print_string(&mut self, addr: u32) -> Result<u32, ZError> {
        let (text, next) = self.decode_string(addr)?;
        for c in text {
            self.write_zchar(c)?;
        }
        Ok(next)
    }

    /// 0OP:0x02 - print: the string follows the opcode
    pub fn print_literal(&mut self) -> Result<(), ZError> {
        self.pc = self.print_string(self.pc)?;
        Ok(())
    }

    /// 0OP:0x03 - print_ret
    pub fn print_ret(&mut self) -> Result<(), ZError> {
        self.print_literal()?;
        self.new_line()?;
        self.ret(1)
    }

    /// 1OP:0x07 - print_addr
    pub fn print_addr(&mut self, addr: u16) -> Result<(), ZError> {
        self.print_string(addr as u32).map(|_| ())
    }

    /// 1OP:0x0D - print_paddr
    pub fn print_paddr(&mut self, packed: u16) -> Result<(), ZError> {
        let addr = self.header.unpack(packed);
        self.print_string(addr).map(|_| ())
    }

    /// VAR:0x26 - print_num, signed decimal
    pub fn print_num(&mut self, value: u16) -> Result<(), ZError> {
        for c in (value as i16).to_string().bytes() {
            self.write_zchar(c)?;
        }
        Ok(())
    }

    /// VAR:0x3C - encode_text: encode `len` bytes of `text + from` into
    /// three words at `dest`
    pub fn encode_to_memory(&mut self, text: u16, len: u16, from: u16, dest: u16) -> Result<(), ZError> {
        let start = text as u32 + from as u32;
        let mut word = Vec::with_capacity(len as usize);
        for i in 0..len as u32 {
            word.push(self.mem.get_byte(start + i)?);
        }
        let encoded = encode_text(&word, self.header.version);
        for (i, value) in encoded.iter().enumerate() {
            self.mem.set_word(dest as u32 + i as u32 * 2, *value)?;
        }
        Ok(())
    }

    /// VAR:0x33 - output_stream. Positive numbers select a stream, negative
    /// ones deselect it. Stream 3 needs a table whose first word receives
    /// the character count when the stream is closed.
    pub fn output_stream(&mut self, number: u16, table: u16) -> Result<(), ZError> {
        match number as i16 {
            1 => self.streams.screen_off = false,
            -1 => self.streams.screen_off = true,
            2 | -2 => {
                let flags = self.mem.get_word(H_FLAGS)?;
                let flags = if number as i16 > 0 {
                    flags | SCRIPTING_FLAG
                } else {
                    flags & !SCRIPTING_FLAG
                };
                self.mem.set_word(H_FLAGS, flags)?;
            }
            3 => {
                debug!("output_stream: redirect to {:#06x}", table);
                self.streams.memory.push((table as u32, 0));
            }
            -3 => {
                if let Some((table, count)) = self.streams.memory.pop() {
                    debug!("output_stream: {} chars written to {:#06x}", count, table);
                    self.mem.set_word(table, count)?;
                }
            }
            other => debug!("output_stream: stream {} ignored", other),
        }
        Ok(())
    }
}
