//! PKCS#7 block padding.
//!
//! `pad` always appends between 1 and 16 bytes, so a block-aligned input
//! gets a whole extra block. `unpad` is deliberately lenient to stay
//! byte-compatible with ciphertexts already at rest: it trusts the last
//! byte and does not check the other padding bytes.

use filevault_common::{Error, Result};

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Append PKCS#7 padding.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip as many trailing bytes as the last byte says.
///
/// No check is made that the padding bytes agree or that the count is at
/// most one block. A wrong key therefore usually "succeeds" with garbage.
///
/// # Errors
/// - `MalformedCiphertext` if `data` is empty
/// - `MalformedCiphertext` if the padding byte exceeds the buffer length
pub fn unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let pad_len = match data.last() {
        Some(&last) => last as usize,
        None => {
            return Err(Error::MalformedCiphertext(
                "No padding byte present".to_string(),
            ))
        }
    };

    if pad_len > data.len() {
        return Err(Error::MalformedCiphertext(format!(
            "Padding length {} exceeds buffer length {}",
            pad_len,
            data.len()
        )));
    }

    data.truncate(data.len() - pad_len);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pad_partial_block() {
        let padded = pad(b"hello world");
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[..11], b"hello world");
        assert!(padded[11..].iter().all(|&b| b == 5));
    }

    #[test]
    fn test_pad_aligned_input_gets_full_block() {
        let padded = pad(&[0u8; 16]);
        assert_eq!(padded.len(), 32);
        assert!(padded[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn test_pad_empty() {
        assert_eq!(pad(b""), vec![16u8; 16]);
    }

    #[test]
    fn test_unpad_empty_is_malformed() {
        assert!(matches!(
            unpad(Vec::new()),
            Err(Error::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_unpad_overlong_is_malformed() {
        let mut data = vec![0u8; 16];
        data[15] = 200;
        assert!(matches!(unpad(data), Err(Error::MalformedCiphertext(_))));
    }

    #[test]
    fn test_unpad_is_lenient() {
        // Inconsistent padding bytes and a count above one block are accepted.
        let mut data = vec![1u8; 32];
        data[31] = 20;
        assert_eq!(unpad(data).unwrap().len(), 12);

        let mut zero = vec![9u8; 16];
        zero[15] = 0;
        assert_eq!(unpad(zero).unwrap().len(), 16);
    }

    proptest! {
        #[test]
        fn pad_unpad_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..200)) {
            let padded = pad(&data);
            prop_assert_eq!(padded.len() % BLOCK_SIZE, 0);
            prop_assert!(padded.len() > data.len());
            prop_assert!(padded.len() - data.len() <= BLOCK_SIZE);
            prop_assert_eq!(unpad(padded).unwrap(), data);
        }
    }
}
