/// Key layout of the `marks` partition
///
/// - `chapter:{site}:{chapter_id}` -> MarkRecord (JSON)
/// - `manga:{site}:{manga_id}:{chapter_id}` -> mark name, secondary index

/// Encode a chapter key: chapter:{site}:{chapter_id}
pub fn encode_chapter_key(site: &str, chapter_id: &str) -> Vec<u8> {
    format!("chapter:{site}:{chapter_id}").into_bytes()
}

/// Encode a manga index key: manga:{site}:{manga_id}:{chapter_id}
pub fn encode_manga_key(site: &str, manga_id: &str, chapter_id: &str) -> Vec<u8> {
    format!("manga:{site}:{manga_id}:{chapter_id}").into_bytes()
}

/// Prefix selecting every indexed chapter of a manga
pub fn encode_manga_prefix(site: &str, manga_id: &str) -> Vec<u8> {
    format!("manga:{site}:{manga_id}:").into_bytes()
}

/// Chapter id from a manga index key
pub fn decode_manga_key(key: &[u8], prefix: &[u8]) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    std::str::from_utf8(rest).ok().map(String::from)
}
