// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame digests for determinism checks.

/// BLAKE3 digest of an encoded frame.
///
/// # Example
///
/// ```
/// use echo_dry_tests::frame_digest;
///
/// assert_eq!(frame_digest(&[0x02, 1]), frame_digest(&[0x02, 1]));
/// assert_ne!(frame_digest(&[0x02, 1]), frame_digest(&[0x02, 0]));
/// ```
pub fn frame_digest(bytes: &[u8]) -> [u8; 32] {
    blake3::hash(bytes).into()
}
