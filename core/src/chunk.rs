/// Splits a reply for delivery: anything at or under `threshold` scalar
/// values goes out as one message, longer replies are split into ordered
/// chunks of `chunk_size` scalar values. Never splits inside a code point.
#[must_use]
pub fn split_for_delivery(text: &str, threshold: usize, chunk_size: usize) -> Vec<String> {
    debug_assert!(chunk_size > 0 && chunk_size <= threshold);
    if text.chars().count() <= threshold {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
