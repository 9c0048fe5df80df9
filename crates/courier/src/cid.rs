//! Content-ID generation.

use rand::Rng;

/// Length of generated content-IDs.
pub const CID_LENGTH: usize = 10;

/// Generates a random content-ID of lowercase ASCII letters.
#[must_use]
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CID_LENGTH)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Formats a content-ID as a markup reference.
#[must_use]
pub fn reference(cid: &str) -> String {
    format!("cid:{cid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let cid = generate();
        assert_eq!(cid.len(), CID_LENGTH);
        assert!(cid.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_reference() {
        assert_eq!(reference("abcdefghij"), "cid:abcdefghij");
    }
}
