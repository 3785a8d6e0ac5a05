//! Binary PGM (P5) reading and writing.
//!
//! Only the subset the codec needs is supported: single channel, 8-bit,
//! square images with a power-of-two side. Header comments are tolerated
//! anywhere whitespace is allowed.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::raster::Raster;
use crate::{QtcError, Result};

/// Reads a binary PGM image into a raster.
///
/// # Errors
///
/// Malformed header syntax is [`QtcError::InvalidData`]; a non-square or
/// non-power-of-two image, or a max value above 255, is
/// [`QtcError::InvalidSize`].
pub fn read_pgm<R: Read>(reader: R) -> Result<Raster> {
    let mut reader = BufReader::new(reader);

    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic).map_err(map_eof)?;
    if &magic != b"P5" {
        return Err(QtcError::InvalidData(
            "not a binary PGM (P5) file".to_string(),
        ));
    }

    skip_whitespace_and_comments(&mut reader)?;
    let width = read_number(&mut reader)?;
    skip_whitespace_and_comments(&mut reader)?;
    let height = read_number(&mut reader)?;
    skip_whitespace_and_comments(&mut reader)?;
    let max_value = read_number(&mut reader)?;

    if width != height || width == 0 || !width.is_power_of_two() {
        return Err(QtcError::InvalidSize(format!(
            "image must be square with a power-of-two side, got {width}x{height}"
        )));
    }
    if max_value > 255 {
        return Err(QtcError::InvalidSize(format!(
            "max value {max_value} exceeds 255"
        )));
    }

    // Exactly one whitespace byte separates the max value from the pixels;
    // anything after it is data.
    let mut separator = [0u8; 1];
    reader.read_exact(&mut separator).map_err(map_eof)?;
    if !separator[0].is_ascii_whitespace() {
        return Err(QtcError::InvalidData(
            "missing whitespace after max value".to_string(),
        ));
    }

    let side = width;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(side * side)
        .map_err(|_| QtcError::AllocationFailed)?;
    pixels.resize(side * side, 0);
    reader.read_exact(&mut pixels).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            QtcError::InvalidData("truncated PGM pixel data".to_string())
        } else {
            QtcError::Io(err)
        }
    })?;

    Raster::from_pixels(side, pixels)
}

/// Writes a raster as a binary PGM image with max value 255.
pub fn write_pgm<W: Write>(raster: &Raster, mut writer: W) -> Result<()> {
    writer.write_all(b"P5\n")?;
    writeln!(writer, "{} {}", raster.side(), raster.side())?;
    writer.write_all(b"255\n")?;
    writer.write_all(raster.as_bytes())?;
    Ok(())
}

fn skip_whitespace_and_comments<R: BufRead>(reader: &mut R) -> Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf[0] {
            b'#' => {
                let mut comment = Vec::new();
                reader.read_until(b'\n', &mut comment)?;
            }
            byte if byte.is_ascii_whitespace() => reader.consume(1),
            _ => return Ok(()),
        }
    }
}

fn read_number<R: BufRead>(reader: &mut R) -> Result<usize> {
    let mut digits = String::new();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let byte = buf[0];
        if byte.is_ascii_digit() {
            digits.push(byte as char);
            reader.consume(1);
        } else {
            break;
        }
    }
    digits
        .parse()
        .map_err(|_| QtcError::InvalidData("malformed number in PGM header".to_string()))
}

fn map_eof(err: io::Error) -> QtcError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        QtcError::InvalidData("truncated PGM header".to_string())
    } else {
        QtcError::Io(err)
    }
}
