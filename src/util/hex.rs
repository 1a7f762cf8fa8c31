//! Hex dump formatting for the CLI inspectors.

/// Format bytes as a classic 16-per-line hex dump with an ASCII gutter.
///
/// `base` offsets the printed addresses, so a page dump can show absolute
/// in-page offsets.
pub fn hex_dump(data: &[u8], base: usize) -> String {
    let mut out = String::with_capacity(data.len() * 5);
    for (line, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", base + line * 16));
        for (i, byte) in chunk.iter().enumerate() {
            out.push_str(&format!("{:02x} ", byte));
            if i == 7 {
                out.push(' ');
            }
        }
        for i in chunk.len()..16 {
            out.push_str("   ");
            if i == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        for &byte in chunk {
            out.push(if (0x20..0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}
