#![crate_name = "azip"]

#[macro_use]
extern crate lazy_static;

pub mod cache;
pub mod config;
pub mod control;
pub mod dictionary;
pub mod display_headless;
pub mod display_terminal;
pub mod display_trait;
pub mod error;
pub mod fileio;
pub mod header;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod opcodes_math;
pub mod opcodes_memory;
pub mod property;
pub mod screen;
pub mod storage;
pub mod text;
pub mod vm;
pub mod zobject;
pub mod zrand;

#[cfg(test)]
mod test_utils;


/*
Memory map of a version 3 story as the interpreter sees it
Dynamic	00000	header
        00040	abbreviation strings and table
        00102	property defaults
        00140	objects
        002f0	object descriptions and properties
        006e3	global variables
        008c3	arrays
Static	00b48	grammar tables
        0124d	dictionary
High	01a0a	Z-code
        05d56	static strings
        06ae6	end of file

Only dynamic memory may be written. Restart reloads it from the copy taken
when the story was loaded; static and high memory are read on demand
through the block cache when one is configured.
*/
