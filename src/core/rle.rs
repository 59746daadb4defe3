//! HxByteRLE run-length coding.
//!
//! A control byte `c` with the high bit set introduces a literal run of
//! `c & 0x7F` bytes copied verbatim. Otherwise the next byte is repeated
//! `c` times.

use crate::util::{Error, Result};

const LITERAL_FLAG: u8 = 0x80;
const MAX_RUN: usize = 0x7F;

/// Decode an HxByteRLE payload whose decoded size must be `expected` bytes.
pub fn rle_decode(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;
    while pos < data.len() {
        let control = data[pos];
        pos += 1;
        if control & LITERAL_FLAG != 0 {
            let n = (control & !LITERAL_FLAG) as usize;
            let run = data.get(pos..pos + n).ok_or_else(|| {
                Error::Compression(format!(
                    "HxByteRLE literal run of {} bytes overruns input at offset {}",
                    n, pos
                ))
            })?;
            out.extend_from_slice(run);
            pos += n;
        } else {
            let value = *data.get(pos).ok_or_else(|| {
                Error::Compression(format!("HxByteRLE repeat at offset {} has no value byte", pos - 1))
            })?;
            out.resize(out.len() + control as usize, value);
            pos += 1;
        }
    }
    if out.len() != expected {
        return Err(Error::RleLengthMismatch { expected, actual: out.len() });
    }
    Ok(out)
}

/// Encode bytes as HxByteRLE. Runs of three or more equal bytes are repeated,
/// everything else goes out as literals.
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    let mut literal_start = 0;
    let mut i = 0;

    let flush = |out: &mut Vec<u8>, lit: &[u8]| {
        for chunk in lit.chunks(MAX_RUN) {
            out.push(LITERAL_FLAG | chunk.len() as u8);
            out.extend_from_slice(chunk);
        }
    };

    while i < data.len() {
        let value = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == value && run < MAX_RUN {
            run += 1;
        }
        if run >= 3 {
            flush(&mut out, &data[literal_start..i]);
            out.push(run as u8);
            out.push(value);
            i += run;
            literal_start = i;
        } else {
            i += run;
        }
    }
    flush(&mut out, &data[literal_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_then_repeat() {
        let decoded = rle_decode(&[0x83, 1, 2, 3, 0x05, 0x09], 8).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = rle_decode(&[0x83, 1, 2, 3, 0x05, 0x09], 7).unwrap_err();
        assert!(matches!(err, Error::RleLengthMismatch { expected: 7, actual: 8 }));
        let err = rle_decode(&[0x83, 1, 2, 3, 0x05, 0x09], 9).unwrap_err();
        assert!(matches!(err, Error::RleLengthMismatch { expected: 9, actual: 8 }));
        let err = rle_decode(&[0x83, 1, 2, 3, 0x05, 0x09], 0).unwrap_err();
        assert!(matches!(err, Error::RleLengthMismatch { expected: 0, actual: 8 }));
        assert!(rle_decode(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(rle_decode(&[0x84, 1, 2], 4), Err(Error::Compression(_))));
        assert!(matches!(rle_decode(&[0x04], 4), Err(Error::Compression(_))));
    }

    #[test]
    fn test_encoder_output_decodes() {
        let mut data = vec![7u8; 300];
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend(std::iter::repeat(0).take(5));
        let encoded = rle_encode(&data);
        assert!(encoded.len() < data.len());
        assert_eq!(rle_decode(&encoded, data.len()).unwrap(), data);
    }
}
