use lcdcast_core::{ChangeRecord, Geometry, Rgb};

/// What the remote display would be showing, at full 8-bit precision.
pub struct Framebuffer {
    geometry: Geometry,
    pixels: Vec<Rgb>,
}

/// Result of applying one datagram.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied {
    /// Terminal cells (col, row) touched, in record order, without repeats.
    pub cells: Vec<(u16, u16)>,
    /// Records whose coordinates fall outside the display.
    pub out_of_range: usize,
}

impl Framebuffer {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            pixels: vec![Rgb::BLACK; geometry.pixel_count()],
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn pixel(&self, x: u16, y: u16) -> Rgb {
        self.geometry
            .index(x, y)
            .map(|i| self.pixels[i])
            .unwrap_or(Rgb::BLACK)
    }

    /// Write each record's expanded colour into place.
    pub fn apply(&mut self, records: &[ChangeRecord]) -> Applied {
        let mut applied = Applied::default();
        for rec in records {
            let Some(index) = rec.index(self.geometry) else {
                applied.out_of_range += 1;
                continue;
            };
            self.pixels[index] = rec.color.to_rgb();
            let cell = (rec.x, rec.y / 2);
            if !applied.cells.contains(&cell) {
                applied.cells.push(cell);
            }
        }
        applied
    }
}
