use crate::stored_object;

stored_object!(CacheEntry, "cache_entry", {
    area: String,
    key: String,
    payload: String,
    expires_at: i64
});

impl CacheEntry {
    pub fn new(area: &str, key: &str, payload: String, ttl_secs: u64) -> Self {
        let now = Utc::now();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            id: Self::record_id(area, key),
            created_at: now,
            updated_at: now,
            area: area.to_string(),
            key: key.to_string(),
            payload,
            expires_at: now.timestamp().saturating_add(ttl),
        }
    }

    /// One record per `(area, key)` pair.
    pub fn record_id(area: &str, key: &str) -> String {
        format!("{area}__{key}")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }
}
