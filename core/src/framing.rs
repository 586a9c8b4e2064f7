use crate::error::{HtmlWaveError, Result};
use crate::MAX_BLOCK_SIZE;

/// CRC-8 with polynomial 0x07 (x^8 + x^2 + x + 1), zero initial value, no final XOR
pub fn crc8(data: &[u8]) -> u8 {
    const POLYNOMIAL: u8 = 0x07;
    let mut crc = 0u8;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// One text block as it travels over the air: length, raw bytes, checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub payload: Vec<u8>,
    pub checksum: u8,
}

impl TextBlock {
    pub fn new(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_BLOCK_SIZE {
            return Err(HtmlWaveError::InvalidInputSize);
        }
        Ok(Self {
            payload: payload.to_vec(),
            checksum: crc8(payload),
        })
    }

    /// Length byte, payload bytes, CRC-8 byte
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 2);
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.checksum);
        bytes
    }
}

pub struct BlockEncoder;
pub struct BlockDecoder;

impl BlockEncoder {
    /// Split text into consecutive blocks of at most `block_size` bytes
    ///
    /// Empty text yields no blocks; the last block may be shorter than `block_size`.
    pub fn split(text: &[u8], block_size: usize) -> Result<Vec<TextBlock>> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(HtmlWaveError::InvalidConfig(format!(
                "block_size must be between 1 and {}, got {}",
                MAX_BLOCK_SIZE, block_size
            )));
        }
        text.chunks(block_size).map(TextBlock::new).collect()
    }

    /// Byte stream for a whole text: each block's length, payload and checksum in turn
    pub fn encode(text: &[u8], block_size: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for block in Self::split(text, block_size)? {
            bytes.extend_from_slice(&block.to_bytes());
        }
        Ok(bytes)
    }
}

impl BlockDecoder {
    /// Decode one block from the front of `data`, verifying its checksum
    ///
    /// Returns the block and the number of bytes consumed.
    pub fn decode_block(data: &[u8]) -> Result<(TextBlock, usize)> {
        let (&length, rest) = data.split_first().ok_or(HtmlWaveError::InsufficientData)?;
        let length = length as usize;

        // Need the payload and the trailing checksum byte
        if rest.len() < length + 1 {
            return Err(HtmlWaveError::InsufficientData);
        }

        let payload = &rest[..length];
        let expected = rest[length];
        let computed = crc8(payload);

        if expected != computed {
            log::warn!(
                "text block checksum mismatch: expected {:#04x}, computed {:#04x}",
                expected,
                computed
            );
            return Err(HtmlWaveError::PayloadCrcMismatch { expected, computed });
        }

        Ok((
            TextBlock {
                payload: payload.to_vec(),
                checksum: computed,
            },
            length + 2,
        ))
    }

    /// Decode a full byte stream of consecutive blocks back into the text bytes
    pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
        let mut text = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (block, consumed) = Self::decode_block(&data[offset..])?;
            text.extend_from_slice(&block.payload);
            offset += consumed;
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_crc8_known_vectors() {
        // CRC-8/SMBUS check value
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x07);
        assert_eq!(crc8(&[0x80]), 0x89);
    }

    #[test]
    fn test_crc8_detects_every_single_bit_flip() {
        let fixtures: [&[u8]; 4] = [b"A", b"Hi", b"abc", &[0x00, 0xFF, 0x55, 0xAA]];

        for fixture in fixtures {
            let mut crcs = vec![crc8(fixture)];
            for byte_idx in 0..fixture.len() {
                for bit in 0..8 {
                    let mut flipped = fixture.to_vec();
                    flipped[byte_idx] ^= 1 << bit;
                    crcs.push(crc8(&flipped));
                }
            }

            // Original and all single-bit variants must be pairwise distinct
            let mut sorted = crcs.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), crcs.len(), "collision for {:02X?}", fixture);
        }
    }

    #[test]
    fn test_block_split_sizes() {
        let text = b"The quick brown fox jumps over the lazy dog";
        let blocks = BlockEncoder::split(text, 16).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].payload.len(), 16);
        assert_eq!(blocks[1].payload.len(), 16);
        assert_eq!(blocks[2].payload.len(), text.len() - 32);

        assert!(BlockEncoder::split(b"", 16).unwrap().is_empty());
        assert!(BlockEncoder::split(text, 0).is_err());
        assert!(BlockEncoder::split(text, 256).is_err());
    }

    #[test]
    fn test_block_bytes_layout() {
        let block = TextBlock::new(b"Hi").unwrap();
        assert_eq!(block.to_bytes(), vec![2, b'H', b'i', crc8(b"Hi")]);
    }

    #[test]
    fn test_block_stream_decode() {
        let text = b"Hello, acoustic world!";
        let bytes = BlockEncoder::encode(text, 8).unwrap();
        assert_eq!(bytes.len(), text.len() + 3 * 2);
        assert_eq!(BlockDecoder::decode(&bytes).unwrap(), text.to_vec());
    }

    #[test]
    fn test_block_checksum_mismatch() {
        let mut bytes = TextBlock::new(b"Hello").unwrap().to_bytes();
        bytes[1] = b'G';

        match BlockDecoder::decode_block(&bytes) {
            Err(HtmlWaveError::PayloadCrcMismatch { expected, computed }) => {
                assert_eq!(expected, crc8(b"Hello"));
                assert_eq!(computed, crc8(b"Gello"));
            }
            other => panic!("Expected PayloadCrcMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_block_truncated() {
        let bytes = TextBlock::new(b"Hello").unwrap().to_bytes();
        assert!(matches!(
            BlockDecoder::decode_block(&bytes[..4]),
            Err(HtmlWaveError::InsufficientData)
        ));
        assert!(matches!(
            BlockDecoder::decode_block(&[]),
            Err(HtmlWaveError::InsufficientData)
        ));
    }
}
