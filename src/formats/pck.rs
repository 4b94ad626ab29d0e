use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use log::{trace, warn};
use thiserror::Error;

use crate::formats::bytes::{read_u16, read_u32, save_atomic};

pub const SPRITE_WIDTH: usize = 32;
pub const SPRITE_HEIGHT: usize = 40;
pub const SPRITE_PIXELS: usize = SPRITE_WIDTH * SPRITE_HEIGHT;

// TAB-less icon sets are fixed 16-byte records, 4x4 pixels, no compression
pub const ICON_WIDTH: usize = 4;
pub const ICON_HEIGHT: usize = 4;
pub const ICON_RECORD_SIZE: usize = ICON_WIDTH * ICON_HEIGHT;

pub const TRANSPARENT: u8 = 0;

// a run marker is always followed by a count byte, so an end marker
// right after a run marker is run data, not a sprite boundary
const MARKER_RLE: u8 = 0xFE;
const MARKER_EOS: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("pck holds {sprites} sprites but tab holds {offsets} offsets")]
    CountMismatch { sprites: usize, offsets: usize },

    #[error("sprite {index} decodes past {max} pixels")]
    SpriteOverflow { index: usize, max: usize },

    #[error("pck offset {offset} does not fit a 2-byte tab word")]
    OffsetOverflow { offset: usize },

    #[error("corrupt sprite data: {detail}")]
    CorruptFile { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// On-disk width of one offset-table entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TabwordLength {
    None,
    Two,
    Four,
}

impl TabwordLength {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            TabwordLength::None => 0,
            TabwordLength::Two => 2,
            TabwordLength::Four => 4,
        }
    }
}

/// A fixed-size grid of 8-bit palette indices. Owned by exactly one Spriteset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pixels: Vec<u8>,
}

impl Sprite {
    pub fn new(pixels: Vec<u8>) -> Self {
        Sprite { pixels }
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// A decoded PCK+TAB pair (or a TAB-less fixed-record icon set).
pub struct Spriteset {
    label: String,
    tabword: TabwordLength,
    width: usize,
    height: usize,
    sprites: Vec<Sprite>,
}

impl Spriteset {
    /// Decodes a PCK byte stream against its TAB offset table. `None` tab
    /// bytes select the fixed-record icon format.
    pub fn decode(label: &str, pck: &[u8], tab: Option<&[u8]>) -> Result<Self, SpriteError> {
        trace!("Spriteset::decode {label}");
        match tab {
            None => Self::decode_fixed(label, pck),
            Some(tab) => Self::decode_tabbed(label, pck, tab),
        }
    }

    fn decode_fixed(label: &str, pck: &[u8]) -> Result<Self, SpriteError> {
        if pck.len() % ICON_RECORD_SIZE != 0 {
            return Err(SpriteError::CorruptFile {
                detail: format!(
                    "length {} is not a multiple of {ICON_RECORD_SIZE}-byte icon records",
                    pck.len()
                ),
            });
        }

        let sprites = pck
            .chunks_exact(ICON_RECORD_SIZE)
            .map(|record| Sprite::new(record.to_vec()))
            .collect();

        Ok(Spriteset {
            label: label.to_owned(),
            tabword: TabwordLength::None,
            width: ICON_WIDTH,
            height: ICON_HEIGHT,
            sprites,
        })
    }

    fn decode_tabbed(label: &str, pck: &[u8], tab: &[u8]) -> Result<Self, SpriteError> {
        let tabword = infer_tabword(tab);
        let word = tabword.bytes();
        if tab.len() % word != 0 {
            return Err(SpriteError::CorruptFile {
                detail: format!("tab length {} is not a multiple of {word}", tab.len()),
            });
        }

        let count = tab.len() / word;
        let reader = &mut &tab[..];
        let mut offsets = Vec::with_capacity(count + 1);
        for _ in 0..count {
            let offset = match tabword {
                TabwordLength::Two => read_u16(reader)? as usize,
                TabwordLength::Four => read_u32(reader)? as usize,
                TabwordLength::None => unreachable!(),
            };
            offsets.push(offset);
        }
        offsets.push(pck.len()); // sentinel offset past the last sprite

        let sprites_in_pck = count_sprites(pck);
        if sprites_in_pck != count {
            return Err(SpriteError::CountMismatch {
                sprites: sprites_in_pck,
                offsets: count,
            });
        }

        let mut sprites = Vec::with_capacity(count);
        for (index, pair) in offsets.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            if start > end || end > pck.len() {
                return Err(SpriteError::CorruptFile {
                    detail: format!("offset {start}..{end} outside pck of {} bytes", pck.len()),
                });
            }
            sprites.push(decode_sprite(&pck[start..end], index)?);
        }

        Ok(Spriteset {
            label: label.to_owned(),
            tabword,
            width: SPRITE_WIDTH,
            height: SPRITE_HEIGHT,
            sprites,
        })
    }

    /// Encodes the set back into (pck, tab) byte streams. Decoded pixels
    /// round-trip; the compressed byte layout itself is not guaranteed to.
    pub fn encode(&self) -> Result<(Vec<u8>, Vec<u8>), SpriteError> {
        trace!("Spriteset::encode {}", self.label);
        if self.tabword == TabwordLength::None {
            let mut pck = Vec::with_capacity(self.sprites.len() * ICON_RECORD_SIZE);
            for sprite in &self.sprites {
                pck.extend_from_slice(sprite.pixels());
            }
            return Ok((pck, Vec::new()));
        }

        let mut pck = Vec::new();
        let mut tab = Vec::with_capacity(self.sprites.len() * self.tabword.bytes());

        for sprite in &self.sprites {
            let offset = pck.len();
            match self.tabword {
                TabwordLength::Two => {
                    if offset > u16::MAX as usize {
                        return Err(SpriteError::OffsetOverflow { offset });
                    }
                    tab.extend_from_slice(&(offset as u16).to_le_bytes());
                }
                TabwordLength::Four => tab.extend_from_slice(&(offset as u32).to_le_bytes()),
                TabwordLength::None => unreachable!(),
            }
            encode_sprite(&mut pck, sprite, &self.label);
        }

        Ok((pck, tab))
    }

    /// Reads `<label>.PCK` (+ `<label>.TAB` when present) from a terrain
    /// directory.
    pub fn read(dir: &Path, label: &str) -> Result<Self, SpriteError> {
        let pck = fs::read(dir.join(format!("{label}.PCK")))?;
        let tab = match fs::read(dir.join(format!("{label}.TAB"))) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Self::decode(label, &pck, tab.as_deref())
    }

    /// Writes both halves of the pair; neither file is touched unless the
    /// whole set encodes.
    pub fn write(&self, dir: &Path) -> Result<(), SpriteError> {
        let (pck, tab) = self.encode()?;
        save_atomic(&dir.join(format!("{}.PCK", self.label)), &pck)?;
        if self.tabword != TabwordLength::None {
            save_atomic(&dir.join(format!("{}.TAB", self.label)), &tab)?;
        }
        Ok(())
    }

    pub fn from_sprites(
        label: &str,
        tabword: TabwordLength,
        width: usize,
        height: usize,
        sprites: Vec<Sprite>,
    ) -> Self {
        Spriteset {
            label: label.to_owned(),
            tabword,
            width,
            height,
            sprites,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn tabword(&self) -> TabwordLength {
        self.tabword
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    #[inline]
    pub fn get(&self, id: usize) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Sprite> {
        self.sprites.iter()
    }
}

/// A tab longer than one 2-byte entry whose bytes 2..4 are both zero can only
/// be the high half of a leading 4-byte offset; real second offsets are never
/// zero because the smallest sprite is two bytes.
fn infer_tabword(tab: &[u8]) -> TabwordLength {
    if tab.len() > 2 && tab.get(2) == Some(&0) && tab.get(3) == Some(&0) {
        TabwordLength::Four
    } else {
        TabwordLength::Two
    }
}

/// Counts sprite boundaries: end markers not immediately preceded by a run
/// marker (a run count can legitimately hold the end-marker byte value).
fn count_sprites(pck: &[u8]) -> usize {
    pck.iter()
        .enumerate()
        .filter(|&(i, &b)| b == MARKER_EOS && (i == 0 || pck[i - 1] != MARKER_RLE))
        .count()
}

fn decode_sprite(span: &[u8], index: usize) -> Result<Sprite, SpriteError> {
    let mut pixels = Vec::with_capacity(SPRITE_PIXELS);

    if let Some(&skip_rows) = span.first() {
        let skip = skip_rows as usize * SPRITE_WIDTH;
        if skip > SPRITE_PIXELS {
            return Err(SpriteError::SpriteOverflow { index, max: SPRITE_PIXELS });
        }
        pixels.resize(skip, TRANSPARENT);

        let mut i = 1;
        while i < span.len() {
            match span[i] {
                MARKER_EOS => break,
                MARKER_RLE => {
                    let run = *span.get(i + 1).ok_or_else(|| SpriteError::CorruptFile {
                        detail: format!("sprite {index}: run marker at end of span"),
                    })? as usize;
                    if pixels.len() + run > SPRITE_PIXELS {
                        return Err(SpriteError::SpriteOverflow { index, max: SPRITE_PIXELS });
                    }
                    pixels.resize(pixels.len() + run, TRANSPARENT);
                    i += 2;
                }
                palette_index => {
                    if pixels.len() >= SPRITE_PIXELS {
                        return Err(SpriteError::SpriteOverflow { index, max: SPRITE_PIXELS });
                    }
                    pixels.push(palette_index);
                    i += 1;
                }
            }
        }
    }

    // the end marker implies transparency to the end of the grid
    pixels.resize(SPRITE_PIXELS, TRANSPARENT);
    Ok(Sprite::new(pixels))
}

fn encode_sprite(out: &mut Vec<u8>, sprite: &Sprite, label: &str) {
    let pixels = sprite.pixels();

    // whole leading transparent rows collapse into the first byte
    let leading = pixels.iter().take_while(|&&p| p == TRANSPARENT).count();
    let rows = leading / SPRITE_WIDTH;
    out.push(rows as u8);

    let mut i = rows * SPRITE_WIDTH;
    while i < pixels.len() {
        if pixels[i] == TRANSPARENT {
            let run = pixels[i..].iter().take_while(|&&p| p == TRANSPARENT).count();
            i += run;
            if i == pixels.len() {
                break; // trailing transparency is implied by the end marker
            }
            let mut left = run;
            while left > 0 {
                let n = left.min(u8::MAX as usize);
                out.push(MARKER_RLE);
                out.push(n as u8);
                left -= n;
            }
        } else {
            let mut p = pixels[i];
            if p >= MARKER_RLE {
                // the grammar reserves 0xFE/0xFF; such indices are not
                // representable as literals
                warn!("{label}: palette index {p:#04x} clamped to 0xFD");
                p = 0xFD;
            }
            out.push(p);
            i += 1;
        }
    }
    out.push(MARKER_EOS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite_with(pairs: &[(usize, u8)]) -> Sprite {
        let mut pixels = vec![TRANSPARENT; SPRITE_PIXELS];
        for &(at, value) in pairs {
            pixels[at] = value;
        }
        Sprite::new(pixels)
    }

    fn tab2(offsets: &[u16]) -> Vec<u8> {
        offsets.iter().flat_map(|o| o.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_two_sprites_with_two_byte_tab() {
        // sprite 0: one skipped row, then pixels 7 7, rest transparent
        // sprite 1: run of 3 transparent, pixel 9
        let pck = [1, 7, 7, MARKER_EOS, 0, MARKER_RLE, 3, 9, MARKER_EOS];
        let tab = tab2(&[0, 4]);

        let set = Spriteset::decode("TEST", &pck, Some(&tab)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.tabword(), TabwordLength::Two);

        let s0 = set.get(0).unwrap().pixels();
        assert_eq!(s0[SPRITE_WIDTH], 7);
        assert_eq!(s0[SPRITE_WIDTH + 1], 7);
        assert_eq!(s0[0], TRANSPARENT);

        let s1 = set.get(1).unwrap().pixels();
        assert_eq!(&s1[..4], &[0, 0, 0, 9]);
    }

    #[test]
    fn infers_four_byte_tab() {
        let pck = [0, 5, MARKER_EOS, 0, 6, MARKER_EOS];
        let tab: Vec<u8> = [0u32, 3]
            .iter()
            .flat_map(|o| o.to_le_bytes())
            .collect();

        let set = Spriteset::decode("TEST", &pck, Some(&tab)).unwrap();
        assert_eq!(set.tabword(), TabwordLength::Four);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().pixels()[0], 6);
    }

    #[test]
    fn count_mismatch_exposes_no_sprites() {
        // tab promises two sprites, pck holds one
        let pck = [0, 5, MARKER_EOS];
        let tab = tab2(&[0, 3]);

        match Spriteset::decode("TEST", &pck, Some(&tab)).err() {
            Some(SpriteError::CountMismatch { sprites: 1, offsets: 2 }) => {}
            other => panic!("expected CountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn run_data_equal_to_end_marker_is_not_a_boundary() {
        // a 255-pixel transparent run stores 0xFF as its count byte
        let pck = [0, MARKER_RLE, 0xFF, 1, MARKER_EOS];
        let tab = tab2(&[0]);

        let set = Spriteset::decode("TEST", &pck, Some(&tab)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().pixels()[255], 1);
    }

    #[test]
    fn overlong_span_fails() {
        // skip 40 rows fills the grid, one more pixel overflows
        let pck = [SPRITE_HEIGHT as u8, 3, MARKER_EOS];
        let tab = tab2(&[0]);

        match Spriteset::decode("TEST", &pck, Some(&tab)).err() {
            Some(SpriteError::SpriteOverflow { index: 0, .. }) => {}
            other => panic!("expected SpriteOverflow, got {other:?}"),
        }
    }

    #[test]
    fn encode_decode_roundtrips_pixels() {
        let sprites = vec![
            sprite_with(&[(0, 1), (31, 2), (SPRITE_PIXELS - 1, 3)]),
            sprite_with(&[(640, 10), (641, 11), (900, 12)]),
            sprite_with(&[]), // fully transparent
            sprite_with(&[(5, 0xFD)]),
        ];
        let set = Spriteset::from_sprites(
            "TEST",
            TabwordLength::Two,
            SPRITE_WIDTH,
            SPRITE_HEIGHT,
            sprites.clone(),
        );

        let (pck, tab) = set.encode().unwrap();
        let back = Spriteset::decode("TEST", &pck, Some(&tab)).unwrap();

        assert_eq!(back.len(), sprites.len());
        for (a, b) in back.iter().zip(&sprites) {
            assert_eq!(a.pixels(), b.pixels());
        }
    }

    #[test]
    fn two_byte_tab_overflow_detected() {
        // every full-literal sprite takes ~1300 pck bytes, so ~60 of them
        // push an offset past 65535
        let noisy = Sprite::new(vec![9; SPRITE_PIXELS]);
        let set = Spriteset::from_sprites(
            "TEST",
            TabwordLength::Two,
            SPRITE_WIDTH,
            SPRITE_HEIGHT,
            vec![noisy; 60],
        );

        match set.encode() {
            Err(SpriteError::OffsetOverflow { offset }) => assert!(offset > u16::MAX as usize),
            other => panic!("expected OffsetOverflow, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn four_byte_tab_carries_large_offsets() {
        let noisy = Sprite::new(vec![9; SPRITE_PIXELS]);
        let set = Spriteset::from_sprites(
            "TEST",
            TabwordLength::Four,
            SPRITE_WIDTH,
            SPRITE_HEIGHT,
            vec![noisy.clone(); 60],
        );

        let (pck, tab) = set.encode().unwrap();
        let back = Spriteset::decode("TEST", &pck, Some(&tab)).unwrap();
        assert_eq!(back.len(), 60);
        assert_eq!(back.get(59).unwrap().pixels(), noisy.pixels());
    }

    #[test]
    fn fixed_records_decode_without_tab() {
        let pck: Vec<u8> = (0..2 * ICON_RECORD_SIZE as u8).collect();
        let set = Spriteset::decode("SCANG", &pck, None).unwrap();

        assert_eq!(set.tabword(), TabwordLength::None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.width(), ICON_WIDTH);
        assert_eq!(set.get(1).unwrap().pixels()[0], ICON_RECORD_SIZE as u8);

        let (pck2, tab2) = set.encode().unwrap();
        assert_eq!(pck2, pck);
        assert!(tab2.is_empty());
    }

    #[test]
    fn fixed_records_reject_partial_record() {
        let pck = vec![0u8; ICON_RECORD_SIZE + 3];
        assert!(matches!(
            Spriteset::decode("SCANG", &pck, None),
            Err(SpriteError::CorruptFile { .. })
        ));
    }
}
