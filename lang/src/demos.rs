use std::fmt::Write;

use vm::Config;

/// Built-in programs, written against whatever field widths the machine has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Demo {
    /// A red, a green and a blue pixel on the diagonal
    Pixels,
    /// A red-to-green line down the diagonal
    Diagonal,
}

impl Demo {
    pub fn source(self, config: &Config) -> String {
        let px = &config.encoding.pixel;
        let fb = &config.framebuffer;
        let limit = [
            px.x.max(),
            px.y.max(),
            fb.width.saturating_sub(1) as u64,
            fb.height.saturating_sub(1) as u64,
        ]
        .into_iter()
        .min()
        .unwrap_or(0);
        let full = px.channels[0].max();
        let width = config.word.bytes();

        let mut src = String::new();
        let points = match self {
            Demo::Pixels => {
                let points = if limit >= 30 {
                    [10, 20, 30]
                } else {
                    [limit / 4, limit / 2, limit * 3 / 4]
                };
                let colours = [[full, 0, 0], [0, full, 0], [0, 0, full]];
                for (p, [r, g, b]) in points.iter().zip(colours) {
                    let _ = writeln!(src, "pixel {p} {p} {r} {g} {b} {full}");
                }
                points.len()
            }
            Demo::Diagonal => {
                let count = (limit + 1).min(32);
                let start = limit + 1 - count;
                for i in 0..count {
                    let r = full * i / count.max(1);
                    let g = full - r;
                    let p = start + i;
                    let _ = writeln!(src, "pixel {p} {p} {r} {g} 0 {full}");
                }
                count as usize
            }
        };
        // Park on a jump to itself once drawing is done
        let _ = writeln!(src, "jmp {}", points * width);
        src
    }
}
