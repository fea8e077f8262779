fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use chunkrelay_protocol::{ContentEncoding, FileMeta, Headers, PartMeta};
    use chunkrelay_relay::{AckPolicy, RelayConfig};
    use chunkrelay_transfer::{DigestAlgorithm, digest_bytes};

    /// Source bytes the fixtures describe.
    const SOURCE: &[u8] = b"abcdefghijklmnopqrstuvwxy";

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    /// Parses a header fixture into `PartMeta` and maps it back.
    fn header_roundtrip(name: &str) -> PartMeta {
        let headers: Headers = roundtrip_test(name);
        let part = PartMeta::from_headers(&headers)
            .unwrap_or_else(|e| panic!("failed to decode headers {name}: {e}"));
        assert_eq!(part.to_headers(), headers, "header mapping mismatch for {name}");
        part
    }

    // --- File records ---

    #[test]
    fn fixture_file_meta_complete() {
        let meta: FileMeta = roundtrip_test("file_meta.json");
        meta.validate().unwrap();
        assert!(meta.is_complete());
        assert_eq!(meta.first_sequence, Some(4));
        assert_eq!(
            meta.digest_value.as_deref(),
            Some(digest_bytes(DigestAlgorithm::Sha256, SOURCE).as_str())
        );
    }

    #[test]
    fn fixture_file_meta_incomplete() {
        let meta: FileMeta = roundtrip_test("file_meta_incomplete.json");
        meta.validate().unwrap();
        assert!(!meta.is_complete());
        assert!(meta.description.is_empty());
        assert_eq!(meta.first_sequence, None);
    }

    #[test]
    fn file_id_derivation_is_stable() {
        let meta: FileMeta = roundtrip_test("file_meta.json");
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(meta.file_date, date);
        assert_eq!(
            FileMeta::derive_id("report.txt", "text/plain", 25, &date),
            meta.id
        );
    }

    // --- Part headers ---

    #[test]
    fn fixture_part_headers_plain() {
        let part = header_roundtrip("part_meta_headers.json");
        assert_eq!(part.part_number, 3);
        assert_eq!(part.start, 20);
        assert_eq!(part.length, 5);
        assert_eq!(part.content_encoding, None);
        assert_eq!(part.digest.algorithm, "SHA-256");
        assert_eq!(
            part.digest.value,
            digest_bytes(DigestAlgorithm::Sha256, &SOURCE[20..])
        );
    }

    #[test]
    fn fixture_part_headers_zstd() {
        let part = header_roundtrip("part_meta_zstd_headers.json");
        assert_eq!(part.part_number, 1);
        assert_eq!(part.content_encoding, Some(ContentEncoding::Zstd));
        assert_eq!(part.encoded_length, Some(19));
        assert_eq!(
            part.digest.value,
            digest_bytes(DigestAlgorithm::Sha256, &SOURCE[..10])
        );
    }

    #[test]
    fn part_headers_reference_file_record() {
        let meta: FileMeta = roundtrip_test("file_meta.json");
        let part = header_roundtrip("part_meta_headers.json");
        assert_eq!(part.file_id, meta.id);
        assert_eq!(meta.part_start(part.part_number), Some(part.start));
        assert_eq!(meta.part_length(part.part_number), Some(part.length));
    }

    // --- Configuration ---

    #[test]
    fn fixture_relay_config() {
        let config: RelayConfig = roundtrip_test("relay_config.json");
        config.validate().unwrap();
        assert_eq!(config.part_prefix, "files");
        assert_eq!(config.compression, Some(ContentEncoding::Zstd));
        assert_eq!(config.ack_policy, AckPolicy::None);
    }
}
