//! MeatPack decoder
//!
//! MeatPack packs the most frequent G-code characters into 4-bit symbols, two per
//! byte (low nibble first). A nibble of `0xF` escapes to a full literal byte that
//! follows in the stream. Mode switches travel in-band as two signal bytes
//! followed by a command byte.

const SIGNAL: u8 = 0xFF;
const CMD_ENABLE_PACKING: u8 = 0xFB;
const CMD_DISABLE_PACKING: u8 = 0xFA;
const CMD_NO_SPACES_ON: u8 = 0xF7;
const CMD_NO_SPACES_OFF: u8 = 0xF6;
const CMD_RESET: u8 = 0xF9;

const ESCAPE: u8 = 0x0F;

/// Parameter letters that get a separating space on G lines
const GLINE_PARAMS: &[u8] = b"XYZEFIJRSGPWHCA";

/// Decoder state machine
#[derive(Debug, Default)]
pub struct MeatPackDecoder {
    packing: bool,
    no_spaces: bool,
    signal_count: u8,
    command_pending: bool,
    full_char_queue: u8,
    char_buf: Option<u8>,
    last_char: Option<u8>,
    add_space: bool,
    output: Vec<u8>,
}

impl MeatPackDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of encoded bytes
    pub fn feed(&mut self, input: &[u8]) {
        for &c in input {
            if c == SIGNAL {
                if self.signal_count > 0 {
                    self.command_pending = true;
                    self.signal_count = 0;
                } else {
                    self.signal_count += 1;
                }
            } else if self.command_pending {
                self.handle_command(c);
                self.command_pending = false;
            } else {
                // A lone signal byte is data
                if self.signal_count > 0 {
                    self.handle_byte(SIGNAL);
                    self.signal_count = 0;
                }
                self.handle_byte(c);
            }
        }
    }

    /// Consume the decoder and return the decoded bytes
    pub fn finish(self) -> Vec<u8> {
        self.output
    }

    fn handle_command(&mut self, command: u8) {
        match command {
            CMD_ENABLE_PACKING => self.packing = true,
            CMD_DISABLE_PACKING => self.packing = false,
            CMD_NO_SPACES_ON => self.no_spaces = true,
            CMD_NO_SPACES_OFF => self.no_spaces = false,
            CMD_RESET => {
                self.packing = false;
                self.no_spaces = false;
            }
            _ => {}
        }
    }

    fn symbol(&self, nibble: u8) -> u8 {
        match nibble {
            0x0..=0x9 => b'0' + nibble,
            0xA => b'.',
            0xB => {
                if self.no_spaces {
                    b'E'
                } else {
                    b' '
                }
            }
            0xC => b'\n',
            0xD => b'G',
            0xE => b'X',
            _ => 0,
        }
    }

    fn handle_byte(&mut self, c: u8) {
        if !self.packing {
            self.emit(c);
            return;
        }

        if self.full_char_queue > 0 {
            self.emit(c);
            if let Some(buffered) = self.char_buf.take() {
                self.emit(buffered);
            }
            self.full_char_queue -= 1;
            return;
        }

        let lo = c & 0x0F;
        let hi = (c >> 4) & 0x0F;
        if lo == ESCAPE {
            self.full_char_queue += 1;
            if hi == ESCAPE {
                self.full_char_queue += 1;
            } else {
                self.char_buf = Some(self.symbol(hi));
            }
        } else {
            let first = self.symbol(lo);
            self.emit(first);
            // A newline ends the pair
            if first != b'\n' {
                if hi == ESCAPE {
                    self.full_char_queue += 1;
                } else {
                    let second = self.symbol(hi);
                    self.emit(second);
                }
            }
        }
    }

    fn emit(&mut self, ch: u8) {
        if ch == b'\n' && self.last_char == Some(b'\n') {
            return;
        }
        if ch == b'G' && (self.output.is_empty() || self.last_char == Some(b'\n')) {
            self.add_space = true;
        } else if ch == b'\n' {
            self.add_space = false;
        } else if self.add_space && self.last_char != Some(b' ') && GLINE_PARAMS.contains(&ch) {
            self.output.push(b' ');
            self.last_char = Some(b' ');
        }
        self.output.push(ch);
        self.last_char = Some(ch);
    }
}

/// Decode a complete MeatPack buffer
pub fn decode(input: &[u8]) -> Vec<u8> {
    let mut decoder = MeatPackDecoder::new();
    decoder.feed(input);
    decoder.finish()
}
