//! Synthetic payloads for `deliver_sm` traffic.
//!
//! The distributions match the classic stress harness: message bodies are
//! 1..=130 letters, and destination addresses are 12 decimal digits.

use rand::Rng;

/// Longest generated message body
pub const MAX_MESSAGE_LEN: usize = 130;

/// Number of digits in a generated destination address
pub const DEST_DIGITS: usize = 12;

/// Size of the destination field region: TON, NPI, digits, NUL
pub const DEST_FIELD_LEN: usize = 2 + DEST_DIGITS + 1;

const ALPHABET_SPAN: u8 = 57;
const ALPHABET_BASE: u8 = b'A';

/// Generate a message body of random length in `1..=130`
///
/// Each byte is `r + 'A'` for `r` uniform in `0..57`, so the highest letter
/// is `'y'`. Values of `r` in `26..=31` would land on the punctuation between
/// `'Z'` and `'a'`; the lower three collapse to `'Z'` and the upper three to
/// `'a'`.
pub fn random_message<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let len = rng.gen_range(1..=MAX_MESSAGE_LEN);
    (0..len).map(|_| message_byte(rng.gen_range(0..ALPHABET_SPAN))).collect()
}

fn message_byte(r: u8) -> u8 {
    let r = match r {
        26..=28 => 25,
        29..=31 => 32,
        other => other,
    };
    r + ALPHABET_BASE
}

/// True if `byte` is something [`random_message`] can produce
pub fn is_message_byte(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'y')
}

/// Generate a destination field region
///
/// Layout: `[ton, npi, d0 .. d11, 0]` where each `d` is an ASCII digit.
pub fn random_dest_addr<R: Rng + ?Sized>(rng: &mut R, ton: u8, npi: u8) -> [u8; DEST_FIELD_LEN] {
    let mut field = [0u8; DEST_FIELD_LEN];
    field[0] = ton;
    field[1] = npi;
    for digit in &mut field[2..2 + DEST_DIGITS] {
        *digit = rng.gen_range(b'0'..=b'9');
    }
    field
}

/// The digits of a destination field as a string
pub fn dest_digits(field: &[u8; DEST_FIELD_LEN]) -> String {
    field[2..2 + DEST_DIGITS].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_message_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut seen_short = false;
        let mut seen_long = false;

        for _ in 0..5_000 {
            let msg = random_message(&mut rng);
            assert!((1..=MAX_MESSAGE_LEN).contains(&msg.len()));
            seen_short |= msg.len() == 1;
            seen_long |= msg.len() == MAX_MESSAGE_LEN;
            for &b in &msg {
                assert!(is_message_byte(b), "unexpected byte {}", b);
            }
        }

        assert!(seen_short && seen_long);
    }

    #[test]
    fn test_message_byte_remapping() {
        assert_eq!(message_byte(0), b'A');
        assert_eq!(message_byte(25), b'Z');
        assert_eq!(message_byte(26), b'Z');
        assert_eq!(message_byte(28), b'Z');
        assert_eq!(message_byte(29), b'a');
        assert_eq!(message_byte(31), b'a');
        assert_eq!(message_byte(32), b'a');
        assert_eq!(message_byte(56), b'y');
        for r in 0..ALPHABET_SPAN {
            assert!(is_message_byte(message_byte(r)));
        }
        assert!(!is_message_byte(b'z'));
        assert!(!is_message_byte(b'['));
    }

    #[test]
    fn test_dest_addr_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let field = random_dest_addr(&mut rng, 1, 9);
            assert_eq!(field[0], 1);
            assert_eq!(field[1], 9);
            assert!(field[2..14].iter().all(|b| b.is_ascii_digit()));
            assert_eq!(field[14], 0);
            assert_eq!(dest_digits(&field).len(), DEST_DIGITS);
        }
    }
}
