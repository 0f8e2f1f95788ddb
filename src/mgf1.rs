use digest::DynDigest;

/// MGF1 mask generation: stretches `seed` into `len` pseudorandom bytes.
///
/// # Arguments
///
/// * `seed` - The seed to expand
/// * `len` - Number of output bytes
/// * `hash` - The hash function to use
pub fn mgf1(seed: &[u8], len: usize, hash: &mut dyn DynDigest) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter: u32 = 0;
    while out.len() < len {
        let mut h = hash.box_clone();
        h.update(seed);
        h.update(&counter.to_be_bytes());
        let digest = h.finalize_reset();

        let chunk_len = digest.len().min(len - out.len());
        out.extend_from_slice(&digest[..chunk_len]);

        counter = counter.wrapping_add(1);
    }
    out
}
