//! Binary to C array source text.

use std::fmt::Write;

/// Render `data` as a C byte array, 16 bytes per line.
pub fn to_c_array(data: &[u8]) -> String {
    let mut out = String::with_capacity(128 + data.len() * 6);
    // fmt::Write into a String cannot fail.
    let _ = writeln!(out, "const unsigned long bindata_len = {};", data.len());
    out.push_str("const unsigned char bindata[] __attribute__((aligned(16))) = {");
    for (i, byte) in data.iter().enumerate() {
        if i % 16 == 0 {
            out.push('\n');
        }
        let _ = write!(out, "0x{:02x}, ", byte);
    }
    out.push_str("\n};\n");
    out
}
