use drawille::Canvas;
use vm::memory::Framebuffer;

/// Braille preview of a framebuffer: a dot wherever a pixel has any colour and non-zero alpha
pub fn render<B: AsRef<[u8]>>(fb: &Framebuffer<B>) -> String {
    let mut canvas = Canvas::new(fb.width() as u32, fb.height() as u32);
    for (y, row) in fb.rows().enumerate() {
        for (x, px) in row.chunks_exact(4).enumerate() {
            if px[3] != 0 && px[..3].iter().any(|&c| c != 0) {
                canvas.set(x as u32, y as u32);
            }
        }
    }
    canvas.frame()
}
