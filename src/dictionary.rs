use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::text::encode_text;
use crate::vm::Vm;
use log::{trace, warn};

/// Word separators every story gets. They end a word but are not tokens.
pub const SEPARATORS: &[u8] = b" \t\n\x0c.,?";

/// A dictionary header: game specific separators (which become tokens of
/// their own), the entry size and the entry count. A negative count marks
/// an unsorted dictionary that must be searched linearly.
#[derive(Debug, Clone)]
pub struct Dictionary {
    pub separators: Vec<u8>,
    pub entry_size: u32,
    pub count: i16,
    /// Address of the first entry
    pub entries: u32,
    /// Initial step of the binary chop, a power of two above `count / 2`
    chop: i32,
}

impl Dictionary {
    pub fn load<M: AddressSpace + ?Sized>(mem: &mut M, addr: u32) -> Result<Dictionary, ZError> {
        let mut cur_pos = addr;
        let n = mem.get_byte(cur_pos)?;
        cur_pos += 1;
        let mut separators = Vec::with_capacity(n as usize);
        for _ in 0..n {
            separators.push(mem.get_byte(cur_pos)?);
            cur_pos += 1;
        }
        let entry_size = mem.get_byte(cur_pos)? as u32;
        cur_pos += 1;
        let count = mem.get_word(cur_pos)? as i16;
        cur_pos += 2;

        let mut chop = 0;
        if count > 0 {
            let mut index = count as i32 / 2;
            chop = 1;
            loop {
                chop *= 2;
                index /= 2;
                if index == 0 {
                    break;
                }
            }
        }

        Ok(Dictionary {
            separators,
            entry_size,
            count,
            entries: cur_pos,
            chop,
        })
    }

    /// Signed difference between `word` and the entry at `offset`, zero on
    /// a match. Entries are compared on two words before version 4 and
    /// three afterwards.
    fn compare<M: AddressSpace + ?Sized>(
        &self,
        mem: &mut M,
        version: u8,
        word: &[u16; 3],
        offset: u32,
    ) -> Result<i32, ZError> {
        let significant = if version < 4 { 2 } else { 3 };
        for (i, &part) in word.iter().enumerate().take(significant) {
            let entry = mem.get_word(offset + i as u32 * 2)?;
            let status = part as i16 as i32 - entry as i16 as i32;
            if status != 0 {
                return Ok(status);
            }
        }
        Ok(0)
    }

    /// Dictionary address of `token`, or 0 when it is not listed
    pub fn find_word<M: AddressSpace + ?Sized>(
        &self,
        mem: &mut M,
        version: u8,
        token: &[u8],
    ) -> Result<u16, ZError> {
        if self.count == 0 {
            return Ok(0);
        }
        let word = encode_text(token, version);

        if self.count < 0 {
            for index in 0..(-(self.count as i32)) as u32 {
                let offset = self.entries + index * self.entry_size;
                if self.compare(mem, version, &word, offset)? == 0 {
                    return Ok(offset as u16);
                }
            }
            return Ok(0);
        }

        let last = self.count as i32 - 1;
        let mut chop = self.chop;
        let mut index = chop - 1;
        while chop != 0 {
            chop /= 2;
            index = index.min(last);
            let offset = self.entries + index as u32 * self.entry_size;
            let status = self.compare(mem, version, &word, offset)?;
            trace!("find_word: index {} status {}", index, status);
            if status == 0 {
                return Ok(offset as u16);
            }
            if status > 0 {
                index = (index + chop).min(last);
            } else {
                index = (index - chop).max(0);
            }
        }
        Ok(0)
    }
}

impl Display for Dictionary {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        writeln!(
            f,
            "Number of separators: {}, entry size: {}, entry count: {}",
            self.separators.len(),
            self.entry_size,
            self.count
        )?;
        writeln!(f, "separators:")?;
        for c in &self.separators {
            write!(f, "'{}' , ", *c as char)?;
        }
        Ok(())
    }
}

/// Find the next token in `text` starting at `pos`. Returns the position
/// to continue from and the token as (start, length). A game separator is
/// a one character token; a built-in separator only ends the current word.
pub fn next_token(text: &[u8], pos: usize, separators: &[u8]) -> (usize, Option<(usize, usize)>) {
    let mut start = pos;
    let mut length = 0;

    for (i, &c) in text.iter().enumerate().skip(pos) {
        if separators.contains(&c) {
            if length > 0 {
                return (i, Some((start, length)));
            }
            return (i + 1, Some((i, 1)));
        }
        if SEPARATORS.contains(&c) {
            if length > 0 {
                return (i + 1, Some((start, length)));
            }
        } else {
            if length == 0 {
                start = i;
            }
            length += 1;
        }
    }

    let end = text.len().max(pos);
    if length > 0 {
        (end, Some((start, length)))
    } else {
        (end, None)
    }
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Split the text in `char_buf` into words, look each one up in the
    /// dictionary at `dictionary` and fill `token_buf`. Byte 0 of the token
    /// buffer limits the number of entries; byte 1 receives the count. Each
    /// entry holds the dictionary address (left alone for unknown words
    /// when `flag` is set), the word length and its offset in `char_buf`.
    pub fn tokenise_line(
        &mut self,
        char_buf: u16,
        token_buf: u16,
        dictionary: u16,
        flag: bool,
    ) -> Result<(), ZError> {
        let char_buf = char_buf as u32;
        let token_buf = token_buf as u32;

        let (text_start, text) = if self.header.version > 4 {
            let len = self.mem.get_byte(char_buf + 1)? as u32;
            let mut text = Vec::with_capacity(len as usize);
            for i in 0..len {
                text.push(self.mem.get_byte(char_buf + 2 + i)?);
            }
            (char_buf + 2, text)
        } else {
            let mut text = Vec::new();
            let mut addr = char_buf + 1;
            loop {
                let c = self.mem.get_byte(addr)?;
                if c == 0 {
                    break;
                }
                text.push(c);
                addr += 1;
            }
            (char_buf + 1, text)
        };

        let dict = Dictionary::load(&mut self.mem, dictionary as u32)?;
        let max_words = self.mem.get_byte(token_buf)?;
        let mut words = 0u8;
        let mut entry = token_buf + 2;
        let mut pos = 0;

        loop {
            let (next, token) = next_token(&text, pos, &dict.separators);
            pos = next;
            let Some((start, length)) = token else {
                break;
            };
            if words >= max_words {
                warn!(
                    "tokenise: token buffer full, discarding '{}'",
                    String::from_utf8_lossy(&text[start..start + length])
                );
                continue;
            }

            let word = dict.find_word(&mut self.mem, self.header.version, &text[start..start + length])?;
            if word != 0 || !flag {
                self.mem.set_word(entry, word)?;
            }
            self.mem.set_byte(entry + 2, length as u8)?;
            self.mem.set_byte(entry + 3, (text_start + start as u32 - char_buf) as u8)?;
            entry += 4;
            words += 1;
        }

        self.mem.set_byte(token_buf + 1, words)
    }
}
