//! Picking the DKIM key out of the TXT records published at a `_domainkey` name.

/// Join the character-strings of one TXT record.
/// Long keys are split into several 255 byte strings by the publisher.
pub fn join_txt_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> String {
    let bytes: Vec<u8> = chunks
        .iter()
        .flat_map(|chunk| chunk.as_ref().iter().copied())
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Whether a TXT value looks like a DKIM key record.
///
/// Either the `v=DKIM1` version tag leads the record or it carries a `p=` public key tag.
pub fn is_dkim_key(value: &str) -> bool {
    let mut tags = value
        .split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter_map(|tag| tag.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()));

    let first = tags.next();
    if let Some(("v", version)) = first {
        if version.eq_ignore_ascii_case("DKIM1") {
            return true;
        }
    }
    first.into_iter().chain(tags).any(|(name, _)| name == "p")
}

/// First DKIM shaped value among the TXT records of a name.
pub fn select_dkim_value<I>(records: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    records.into_iter().find(|value| is_dkim_key(value))
}
