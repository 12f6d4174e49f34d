// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use core::fmt;

use crate::codec::thermal_to_celsius;
use crate::error::LibraryError;
use crate::util::Buffer;

/// The height of the full image in pixels.
pub const HEIGHT: usize = 24;

/// The width of the full image in pixels.
pub const WIDTH: usize = 32;

/// The number of pixels in one subpage, half of the full image.
pub const SUBPAGE_PIXELS: usize = HEIGHT * WIDTH / 2;

/// The number of words in the temperature summary.
const SUMMARY_WORDS: usize = 8;

/// The number of bytes read from the unit for one frame.
pub const FRAME_LENGTH: usize = (SUMMARY_WORDS + SUBPAGE_PIXELS) * 2;

/// Identify which half of the image a frame holds.
///
/// The sensor reads the pixels in a chess pattern, with each subpage holding every other pixel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Subpage {
    Zero,
    One,
}

impl From<u8> for Subpage {
    /// Only the lowest bit matters.
    fn from(raw: u8) -> Self {
        if raw & 1 == 0 {
            Self::Zero
        } else {
            Self::One
        }
    }
}

impl From<Subpage> for usize {
    fn from(subpage: Subpage) -> Self {
        match subpage {
            Subpage::Zero => 0,
            Subpage::One => 1,
        }
    }
}

/// A pixel position within the full image.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

/// One subpage worth of data, along with the summary the unit computed for it.
///
/// All temperatures are in degrees Celsius.
#[derive(Clone, PartialEq)]
pub struct Frame {
    subpage: Subpage,
    summary: [u16; SUMMARY_WORDS],
    pixels: [u16; SUBPAGE_PIXELS],
}

impl Frame {
    /// Parse the block read from the data registers.
    ///
    /// `bytes` has to be exactly [`FRAME_LENGTH`] bytes long.
    pub fn from_bytes(subpage: Subpage, bytes: &[u8]) -> Result<Self, LibraryError> {
        if bytes.len() != FRAME_LENGTH {
            return Err(LibraryError::InvalidData("Frame data is the wrong length"));
        }
        let mut buf = bytes;
        let mut summary = [0u16; SUMMARY_WORDS];
        summary.iter_mut().for_each(|word| *word = buf.get_u16_le());
        let mut pixels = [0u16; SUBPAGE_PIXELS];
        pixels.iter_mut().for_each(|pixel| *pixel = buf.get_u16_le());
        Ok(Self {
            subpage,
            summary,
            pixels,
        })
    }

    pub fn subpage(&self) -> Subpage {
        self.subpage
    }

    /// The raw summary words.
    pub fn summary_raw(&self) -> &[u16; SUMMARY_WORDS] {
        &self.summary
    }

    pub fn median(&self) -> f32 {
        thermal_to_celsius(self.summary[0])
    }

    pub fn average(&self) -> f32 {
        thermal_to_celsius(self.summary[1])
    }

    /// The temperature of the pixel that differs most from the median.
    pub fn most_different(&self) -> f32 {
        thermal_to_celsius(self.summary[2])
    }

    pub fn most_different_position(&self) -> Position {
        self.position(3)
    }

    pub fn lowest(&self) -> f32 {
        thermal_to_celsius(self.summary[4])
    }

    pub fn lowest_position(&self) -> Position {
        self.position(5)
    }

    pub fn highest(&self) -> f32 {
        thermal_to_celsius(self.summary[6])
    }

    pub fn highest_position(&self) -> Position {
        self.position(7)
    }

    fn position(&self, word: usize) -> Position {
        let [x, y] = self.summary[word].to_le_bytes();
        Position { x, y }
    }

    pub fn pixels_raw(&self) -> &[u16; SUBPAGE_PIXELS] {
        &self.pixels
    }

    pub fn pixel_raw(&self, index: usize) -> Option<u16> {
        self.pixels.get(index).copied()
    }

    /// The temperature of a pixel in this subpage, or NaN if `index` is out of range.
    pub fn pixel(&self, index: usize) -> f32 {
        self.pixel_raw(index).map_or(f32::NAN, thermal_to_celsius)
    }

    /// The temperature of every pixel in this subpage.
    pub fn temperatures(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels.iter().copied().map(thermal_to_celsius)
    }
}

// The pixel array is too long to be useful in debug output.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("subpage", &self.subpage)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}
