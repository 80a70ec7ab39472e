//! Reduction of raw terminal output to the text a reader would see.
//!
//! The transcript feeds tools that reason about what is *visible* on screen,
//! so escape sequences are removed outright and in-line edits are replayed: a
//! progress bar redrawn via carriage returns collapses to its final state,
//! backspace-corrected typos disappear, and color changes leave no residue.

const ESC: char = '\u{1b}';
const BEL: char = '\u{7}';

/// Collapses escape sequences and control-character edits into the plain text
/// that would remain visible on a terminal.
pub fn normalize(text: &str) -> String {
    simulate_line_edits(&strip_sequences(text))
}

enum SeqState {
    Ground,
    Escape,
    Csi,
    Osc,
    OscEscape,
}

/// Removes CSI and OSC sequences, single-character ESC sequences, and bare
/// BELs. Orphaned OSC payloads at line starts (the tail of a sequence whose
/// introducer landed in an earlier chunk) are dropped as well.
fn strip_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = SeqState::Ground;
    for line in text.split_inclusive('\n') {
        for ch in scrub_orphan_osc(line).chars() {
            state = match state {
                SeqState::Ground => match ch {
                    ESC => SeqState::Escape,
                    BEL => SeqState::Ground,
                    _ => {
                        out.push(ch);
                        SeqState::Ground
                    }
                },
                SeqState::Escape => match ch {
                    '[' => SeqState::Csi,
                    ']' => SeqState::Osc,
                    // Single-character sequence (cursor save/restore and
                    // friends): zero width.
                    _ => SeqState::Ground,
                },
                // Parameter and intermediate bytes continue the sequence; a
                // final byte in 0x40..=0x7e ends it.
                SeqState::Csi => {
                    if ('\u{40}'..='\u{7e}').contains(&ch) {
                        SeqState::Ground
                    } else {
                        SeqState::Csi
                    }
                }
                SeqState::Osc => match ch {
                    BEL => SeqState::Ground,
                    ESC => SeqState::OscEscape,
                    _ => SeqState::Osc,
                },
                // OSC may end with ESC-backslash (ST) instead of BEL.
                SeqState::OscEscape => match ch {
                    '\\' => SeqState::Ground,
                    _ => SeqState::Osc,
                },
            };
        }
    }
    out
}

/// A line beginning with digits and a semicolon is the payload of an OSC
/// sequence whose `ESC ]` introducer was consumed in a previous write. With a
/// BEL terminator present only the payload is dropped; without one the whole
/// line is non-printable lead-in.
fn scrub_orphan_osc(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || line.as_bytes().get(digits) != Some(&b';') {
        return line;
    }
    if let Some(pos) = line.find(BEL) {
        return &line[pos + BEL.len_utf8()..];
    }
    match line.find('\n') {
        Some(pos) => &line[pos..],
        None => "",
    }
}

/// Replays in-line editing controls: backspace deletes within the current
/// line, a carriage return not followed by a line feed restarts it, CRLF
/// collapses to one break, and VT/FF break lines. Remaining control
/// characters are stripped.
fn simulate_line_edits(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Byte offset where the current line begins; edits never cross it.
    let mut line_start = 0;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\u{8}' => {
                if out.len() > line_start {
                    out.pop();
                }
            }
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.truncate(line_start);
                }
            }
            '\n' | '\u{b}' | '\u{c}' => {
                out.push('\n');
                line_start = out.len();
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
