use bytes::Bytes;
use tempstash_storage::traits::ObjectStore;

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i];
        }
    }

    Bytes::from(data)
}

/// Store `count` small objects named `{prefix}{index:05}` and return their names.
#[allow(dead_code)]
pub async fn populate(store: &dyn ObjectStore, prefix: &str, count: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(count);
    for i in 0..count {
        let name = format!("{prefix}{i:05}");
        store
            .put(&name, Bytes::from(vec![i as u8]))
            .await
            .expect("populate put");
        names.push(name);
    }
    names
}
