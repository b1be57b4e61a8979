//! Record formatting: the timestamped header, per-level ANSI colors,
//! banner frames and payload truncation. Pure string building; the
//! logger decides which sink gets what.

use chrono::Local;

use crate::level::Level;

/// Payload bound in bytes. Longer payloads are cut (at a char
/// boundary); the trailing newline is still emitted.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

pub const COLOR_RESET: &str = "\x1b[0m";

/// Terminal 16-color foreground escapes. Different consoles render
/// these at different values.
pub fn level_color(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[34m",  // blue
        Level::Debug => "\x1b[37m",  // white
        Level::Info => "\x1b[32m",   // green
        Level::Warn => "\x1b[33m",   // yellow
        Level::Error => "\x1b[31m",  // red
        Level::Banner => "\x1b[36m", // cyan
        Level::Fatal => "\x1b[35m",  // magenta
        Level::Off => COLOR_RESET,
    }
}

/// `YYYY-MM-DD HH:MM:SS.mmm`, local time.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn format_header(ts: &str, level: Level, file: &str, func: &str, line: u32) -> String {
    format!("[{ts}] [{}] ({file}:{func}:{line}): ", level.tag())
}

/// Cut `s` down to at most `MAX_PAYLOAD_BYTES`, never splitting a
/// character.
pub fn truncate_payload(s: &str) -> &str {
    if s.len() <= MAX_PAYLOAD_BYTES {
        return s;
    }
    let mut end = MAX_PAYLOAD_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// The decorative border around a banner record: the fill pattern
/// tiled to `min(payload_len, MAX_PAYLOAD_BYTES - 1) + 10` bytes
/// (5 bytes of margin on each side of the payload).
pub fn banner_border(pattern: &str, payload_len: usize) -> String {
    let pattern = if pattern.is_empty() { "=" } else { pattern };
    let want = payload_len.min(MAX_PAYLOAD_BYTES - 1) + 10;
    let mut out = String::with_capacity(want);
    for c in pattern.chars().cycle() {
        if out.len() + c.len_utf8() > want {
            break;
        }
        out.push(c);
    }
    out
}

/// Render one complete record, newline-terminated. Banner records come
/// out as three lines (border, indented payload, border), everything
/// else as a single `header + payload` line. With `colored`, header
/// and body are wrapped in the level's escape; the left padding of
/// banner continuation lines stays uncolored.
pub fn render(
    ts: &str,
    level: Level,
    file: &str,
    func: &str,
    line: u32,
    payload: &str,
    banner_pattern: &str,
    colored: bool,
) -> String {
    let header = format_header(ts, level, file, func, line);
    let (c, r) = if colored {
        (level_color(level), COLOR_RESET)
    } else {
        ("", "")
    };
    if level == Level::Banner {
        let border = banner_border(banner_pattern, payload.len());
        let gap = " ".repeat(header.len());
        format!(
            "{c}{header}{r}{c}{border}{r}\n\
             {gap}{c}     {payload}{r}\n\
             {gap}{c}{border}{r}\n"
        )
    } else {
        format!("{c}{header}{r}{c}{payload}{r}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_shape() {
        let h = format_header("2026-08-01 10:20:30.456", Level::Info, "f.c", "main", 7);
        assert_eq!(h, "[2026-08-01 10:20:30.456] [INF] (f.c:main:7): ");
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = timestamp_now();
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ".");
        assert!(ts[20..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn plain_record_is_one_line() {
        let s = render("ts", Level::Info, "f.c", "main", 7, "hello world", "=", false);
        assert_eq!(s, "[ts] [INF] (f.c:main:7): hello world\n");
    }

    #[test]
    fn colored_record_wraps_header_and_payload() {
        let s = render("ts", Level::Error, "f.c", "main", 7, "boom", "=", true);
        assert_eq!(
            s,
            "\x1b[31m[ts] [ERR] (f.c:main:7): \x1b[0m\x1b[31mboom\x1b[0m\n"
        );
    }

    #[test]
    fn banner_border_tiles_the_pattern() {
        // payload "HI" (len 2): border is 2 + 10 = 12 bytes
        assert_eq!(banner_border("=-", 2), "=-=-=-=-=-=-");
        assert_eq!(banner_border("=", 0), "==========");
        // an empty pattern falls back to "="
        assert_eq!(banner_border("", 2), "============");
    }

    #[test]
    fn banner_record_has_three_aligned_lines() {
        let s = render("ts", Level::Banner, "f.c", "main", 1, "HI", "=-", false);
        let header = "[ts] [BNR] (f.c:main:1): ";
        let gap = " ".repeat(header.len());
        let lines: Vec<&str> = s.split_inclusive('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("{header}=-=-=-=-=-=-\n"));
        assert_eq!(lines[1], format!("{gap}     HI\n"));
        assert_eq!(lines[2], format!("{gap}=-=-=-=-=-=-\n"));
    }

    #[test]
    fn payload_at_bound_kept_one_over_cut() {
        let exact = "x".repeat(MAX_PAYLOAD_BYTES);
        assert_eq!(truncate_payload(&exact).len(), MAX_PAYLOAD_BYTES);
        let over = "x".repeat(MAX_PAYLOAD_BYTES + 1);
        assert_eq!(truncate_payload(&over).len(), MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 2-byte chars straddling the bound
        let s = "é".repeat(MAX_PAYLOAD_BYTES / 2 + 1);
        let t = truncate_payload(&s);
        assert!(t.len() <= MAX_PAYLOAD_BYTES);
        assert!(s.starts_with(t));
    }
}
