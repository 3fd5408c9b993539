//! Panel layout: side-by-side, stacked and grid arrangements of equally typed
//! images. Panels of differing size are top-left aligned on a zeroed canvas.

use image::{ImageBuffer, Pixel, imageops};

type Buffer<P> = ImageBuffer<P, Vec<u8>>;

pub fn hstack<P>(panels: &[&Buffer<P>]) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let width = panels.iter().map(|p| p.width()).sum();
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let mut canvas = Buffer::<P>::new(width, height);

    let mut x = 0i64;
    for panel in panels {
        imageops::replace(&mut canvas, *panel, x, 0);
        x += panel.width() as i64;
    }
    canvas
}

pub fn vstack<P>(panels: &[&Buffer<P>]) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let width = panels.iter().map(|p| p.width()).max().unwrap_or(0);
    let height = panels.iter().map(|p| p.height()).sum();
    let mut canvas = Buffer::<P>::new(width, height);

    let mut y = 0i64;
    for panel in panels {
        imageops::replace(&mut canvas, *panel, 0, y);
        y += panel.height() as i64;
    }
    canvas
}

/// Lays `panels` out row-major, `cols` per row.
pub fn grid<P>(panels: &[&Buffer<P>], cols: usize) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let rows: Vec<Buffer<P>> = panels.chunks(cols.max(1)).map(|row| hstack(row)).collect();
    let refs: Vec<&Buffer<P>> = rows.iter().collect();
    vstack(&refs)
}
